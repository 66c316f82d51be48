// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! Core instrument abstractions

use crate::timeframe::TimeFrame;
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Borrow;
use std::fmt::{Display, Formatter};

/// Unique instrument identifier within an account, also the tick-file name
/// used by the simulator source directory.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default, Display,
)]
pub struct InstrumentName(pub SmolStr);

impl InstrumentName {
    pub fn new<S: Into<SmolStr>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for InstrumentName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for InstrumentName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl Borrow<str> for InstrumentName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

/// Instrument classes supported by the terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum InstrumentKind {
    #[default]
    Equity,
    Future,
    Option,
    Fx,
    Crypto,
}

impl Display for InstrumentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentKind::Equity => write!(f, "equity"),
            InstrumentKind::Future => write!(f, "future"),
            InstrumentKind::Option => write!(f, "option"),
            InstrumentKind::Fx => write!(f, "fx"),
            InstrumentKind::Crypto => write!(f, "crypto"),
        }
    }
}

/// Static instrument descriptor.
///
/// Derivatives reference their underlying via `basis` by name only; the
/// account resolves the reference when it needs the underlying series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub name: InstrumentName,
    pub exchange: Option<SmolStr>,
    pub kind: InstrumentKind,
    pub time_frame: TimeFrame,
    pub basis: Option<InstrumentName>,
    /// Contract multiplier applied to P&L. `None` is treated as 1.
    pub contract_size: Option<Decimal>,
}

impl Instrument {
    pub fn new<N: Into<InstrumentName>>(name: N, kind: InstrumentKind) -> Self {
        Self {
            name: name.into(),
            exchange: None,
            kind,
            time_frame: TimeFrame::default(),
            basis: None,
            contract_size: None,
        }
    }

    pub fn with_exchange<S: Into<SmolStr>>(mut self, exchange: S) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn with_time_frame(mut self, time_frame: TimeFrame) -> Self {
        self.time_frame = time_frame;
        self
    }

    pub fn with_basis<N: Into<InstrumentName>>(mut self, basis: N) -> Self {
        self.basis = Some(basis.into());
        self
    }

    pub fn with_contract_size(mut self, contract_size: Decimal) -> Self {
        self.contract_size = Some(contract_size);
        self
    }

    /// Contract multiplier with the default applied.
    pub fn contract_size_or_one(&self) -> Decimal {
        self.contract_size.unwrap_or(Decimal::ONE)
    }
}

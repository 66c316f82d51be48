// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! Order model: kinds, lifecycle status, embedded execution record and
//! bracket children.

use crate::error::ExecutionError;
use arara_integration::Validator;
use arara_markets::{InstrumentName, Side};
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};

/// Caller-provided order identifier, unique within an account.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct OrderId(pub SmolStr);

impl OrderId {
    pub fn new<S: Into<SmolStr>>(id: S) -> Self {
        Self(id.into())
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum OrderKind {
    #[default]
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderKind {
    /// Resting kinds require a declared price at admission.
    pub fn requires_price(&self) -> bool {
        !matches!(self, OrderKind::Market)
    }
}

impl Display for OrderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Market => write!(f, "Market"),
            OrderKind::Limit => write!(f, "Limit"),
            OrderKind::Stop => write!(f, "Stop"),
            OrderKind::StopLimit => write!(f, "StopLimit"),
        }
    }
}

/// How the order relates to its parent, if any.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum OrderInstruction {
    /// Standalone directional order.
    #[default]
    Side,
    /// Bracket child (take-profit / stop-loss) attached to a parent.
    Brace,
    /// Member of a caller-defined order group.
    Group,
}

/// Order lifecycle. Transitions only move forward:
/// `New → Placed → {Filled | Cancelled | Rejected}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum OrderStatus {
    #[default]
    New,
    Placed,
    /// Partially filled at the venue. The simulator never produces this;
    /// live brokers may report it.
    Partitioned,
    Filled,
    Cancelled,
    Closed,
    Rejected,
}

impl OrderStatus {
    fn rank(&self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::Placed => 1,
            OrderStatus::Partitioned => 2,
            OrderStatus::Filled
            | OrderStatus::Cancelled
            | OrderStatus::Closed
            | OrderStatus::Rejected => 3,
        }
    }

    /// Whether moving from `self` to `next` respects forward monotonicity.
    pub fn can_become(&self, next: OrderStatus) -> bool {
        if self.rank() == 3 {
            return *self == next;
        }
        self.rank() <= next.rank()
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 3
    }
}

/// Embedded execution record of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Constructor)]
pub struct Transaction {
    pub time: DateTime<Utc>,
    pub price: Decimal,
    pub volume: Decimal,
}

/// A trading order, possibly carrying bracket children placed on fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Instrument key; resolved through the owning account.
    pub name: InstrumentName,
    pub side: Side,
    pub kind: OrderKind,
    pub instruction: OrderInstruction,
    pub volume: Decimal,
    /// Declared price; required for every kind except `Market`.
    pub price: Option<Decimal>,
    pub status: OrderStatus,
    pub time: Option<DateTime<Utc>>,
    pub transaction: Option<Transaction>,
    /// Bracket children, admitted when the parent fill creates a position.
    #[serde(default = "Vec::new")]
    pub orders: Vec<Order>,
}

impl Order {
    pub fn market<I, N>(id: I, name: N, side: Side, volume: Decimal) -> Self
    where
        I: Into<OrderId>,
        N: Into<InstrumentName>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            side,
            kind: OrderKind::Market,
            instruction: OrderInstruction::default(),
            volume,
            price: None,
            status: OrderStatus::New,
            time: None,
            transaction: None,
            orders: Vec::new(),
        }
    }

    pub fn limit<I, N>(id: I, name: N, side: Side, volume: Decimal, price: Decimal) -> Self
    where
        I: Into<OrderId>,
        N: Into<InstrumentName>,
    {
        Self {
            kind: OrderKind::Limit,
            price: Some(price),
            ..Self::market(id, name, side, volume)
        }
    }

    pub fn stop<I, N>(id: I, name: N, side: Side, volume: Decimal, price: Decimal) -> Self
    where
        I: Into<OrderId>,
        N: Into<InstrumentName>,
    {
        Self {
            kind: OrderKind::Stop,
            price: Some(price),
            ..Self::market(id, name, side, volume)
        }
    }

    pub fn stop_limit<I, N>(id: I, name: N, side: Side, volume: Decimal, price: Decimal) -> Self
    where
        I: Into<OrderId>,
        N: Into<InstrumentName>,
    {
        Self {
            kind: OrderKind::StopLimit,
            price: Some(price),
            ..Self::market(id, name, side, volume)
        }
    }

    /// Attach a bracket child (take-profit or stop-loss).
    pub fn with_bracket(mut self, child: Order) -> Self {
        self.orders.push(child);
        self
    }
}

impl Validator for Order {
    type Error = ExecutionError;

    fn validate(self) -> Result<Self, ExecutionError> {
        if self.name.is_empty() {
            return Err(ExecutionError::validation("order without instrument"));
        }
        if self.volume <= Decimal::ZERO {
            return Err(ExecutionError::Validation(format!(
                "order {} volume must be positive: {}",
                self.id, self.volume
            )));
        }
        if self.kind.requires_price() {
            match self.price {
                Some(price) if price > Decimal::ZERO => {}
                Some(price) => {
                    return Err(ExecutionError::Validation(format!(
                        "order {} price must be positive: {price}",
                        self.id
                    )))
                }
                None => {
                    return Err(ExecutionError::Validation(format!(
                        "order {} of kind {} requires a price",
                        self.id, self.kind
                    )))
                }
            }
        }
        Ok(self)
    }
}

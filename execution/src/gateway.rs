// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! The uniform broker-facing contract.
//!
//! Every adapter — the local [`Simulator`](crate::simulator::Simulator) and
//! each live broker — implements [`Gateway`]. Strategy code holds a
//! `dyn Gateway` (or a generic) and behaves identically against either.
//! All calls answer through the [`Response`] envelope; adapters never panic
//! across this boundary.

use crate::{
    account::{Account, Deal},
    error::ExecutionError,
    order::Order,
    position::Position,
};
use arara_data::Point;
use arara_integration::{response::Response, stream::EventStream};
use arara_markets::{Instrument, InstrumentName};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};

/// Connection state reported by [`Gateway::connect`] / [`Gateway::disconnect`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl Display for ConnectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Filter for [`Gateway::account`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountCriteria {
    /// Restrict to this account descriptor; `None` matches the adapter's own.
    pub descriptor: Option<SmolStr>,
}

/// Immutable snapshot of account state handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub descriptor: SmolStr,
    pub initial_balance: Decimal,
    pub balance: Decimal,
    pub instruments: Vec<InstrumentName>,
    /// Working orders.
    pub orders: Vec<Order>,
    /// Active positions.
    pub positions: Vec<Position>,
    pub deals: Vec<Deal>,
}

impl AccountSnapshot {
    pub fn from_account(account: &Account) -> Self {
        Self {
            descriptor: account.descriptor().into(),
            initial_balance: account.initial_balance(),
            balance: account.balance(),
            instruments: account
                .instruments()
                .map(|state| state.instrument.name.clone())
                .collect(),
            orders: account.active_orders().cloned().collect(),
            positions: account.active_positions().cloned().collect(),
            deals: account.deals().to_vec(),
        }
    }
}

/// Top-of-book depth-of-market view. Only one level is modeled.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dom {
    pub bids: Vec<Point>,
    pub asks: Vec<Point>,
}

/// Event outputs every gateway exposes.
///
/// Cloning shares the underlying streams, so an engine task can publish to
/// the same streams callers subscribed to before connecting.
#[derive(Debug, Clone, Default)]
pub struct GatewayStreams {
    /// Tick series append events.
    pub points: EventStream<Point>,
    /// Order lifecycle events, causal per order id.
    pub orders: EventStream<Order>,
    /// Position deltas: one event per fill.
    pub positions: EventStream<Position>,
    /// Non-fatal adapter errors and the fatal invariant violations.
    pub errors: EventStream<ExecutionError>,
}

impl GatewayStreams {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The uniform adapter contract.
///
/// `connect` is idempotent (it tears the previous session down first);
/// `disconnect` is the universal cancel and is safe on an already
/// disconnected adapter. Read-only queries default to a not-implemented
/// envelope so adapters only implement what the venue supports.
#[async_trait]
pub trait Gateway: Send {
    async fn connect(&mut self) -> Response<ConnectionStatus>;

    async fn disconnect(&mut self) -> Response<ConnectionStatus>;

    /// Add an instrument to the active feed.
    async fn subscribe(&mut self, instrument: Instrument) -> Response<InstrumentName>;

    /// Remove an instrument from the active feed.
    async fn unsubscribe(&mut self, instrument: &InstrumentName) -> Response<InstrumentName>;

    /// Refresh balance, orders and positions from the authoritative source.
    async fn account(&mut self, criteria: AccountCriteria) -> Response<AccountSnapshot>;

    /// Submit orders; each returned order carries its admitted status.
    async fn create_orders(&mut self, orders: Vec<Order>) -> Response<Vec<Order>>;

    /// Cancel orders. Cancelling an already-cancelled order is a no-op.
    async fn delete_orders(&mut self, orders: Vec<Order>) -> Response<Vec<Order>>;

    async fn points(&mut self, _instrument: &InstrumentName) -> Response<Vec<Point>> {
        Response::error(ExecutionError::not_implemented("points"))
    }

    async fn dom(&mut self, _instrument: &InstrumentName) -> Response<Dom> {
        Response::error(ExecutionError::not_implemented("dom"))
    }

    async fn options(&mut self, _instrument: &InstrumentName) -> Response<Vec<Instrument>> {
        Response::error(ExecutionError::not_implemented("options"))
    }

    async fn positions(&mut self) -> Response<Vec<Position>> {
        Response::error(ExecutionError::not_implemented("positions"))
    }

    async fn orders(&mut self) -> Response<Vec<Order>> {
        Response::error(ExecutionError::not_implemented("orders"))
    }

    /// Event outputs; subscribe before `connect` to observe a full session.
    fn streams(&self) -> &GatewayStreams;
}

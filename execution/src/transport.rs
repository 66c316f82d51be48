// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! Transport layer abstraction for live broker gateways.
//!
//! Isolates connectivity and protocol (HTTP, WS, FIX bridges) from the
//! account logic in [`LiveGateway`](crate::live::LiveGateway):
//! * Swapping implementations (mock, REST, streaming) without touching
//!   account state handling
//! * Easier testing (inject a scripted [`MockTransport`])
//!
//! The surface is deliberately wire-shaped: plain symbols, broker-assigned
//! order ids and decimal quantities. Mapping to the internal model lives in
//! the gateway's mapper layer, which is lossless for every field the core
//! requires and drops unknown fields.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Broker-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireOrderId(pub String);

/// Broker-visible account routing information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAccount {
    pub account: String,
    pub broker: String,
}

impl WireAccount {
    pub fn new(account: impl Into<String>, broker: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            broker: broker.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireInstrument {
    pub symbol: String,
    pub exchange: String,
}

impl WireInstrument {
    pub fn new(symbol: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireOrderKind {
    Market,
    Limit,
    Stop,
    StopLimit,
}

/// Acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOpenOrder {
    pub id: WireOrderId,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connectivity: {0}")]
    Connectivity(String),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Inbound wire events a transport surfaces to its gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// Top-of-book quote for a subscribed symbol.
    Point {
        symbol: String,
        time: DateTime<Utc>,
        bid: Decimal,
        bid_size: Decimal,
        ask: Decimal,
        ask_size: Decimal,
    },
    OrderAccepted {
        cid: String,
        id: WireOrderId,
    },
    OrderRejected {
        cid: String,
        reason: String,
    },
    /// Partial or full execution of a working order.
    Trade {
        order_id: WireOrderId,
        price: Decimal,
        volume: Decimal,
        time: DateTime<Utc>,
    },
    OrderCancelled {
        order_id: WireOrderId,
        time: DateTime<Utc>,
    },
    Heartbeat,
}

/// Broker connectivity surface.
///
/// Implementations own the sockets; `events` hands the gateway a receiver
/// it drains from its single engine task.
pub trait Transport: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn connect(&self) -> BoxFuture<'_, Result<(), TransportError>>;

    fn disconnect(&self) -> BoxFuture<'_, Result<(), TransportError>>;

    fn subscribe<'a>(
        &'a self,
        instrument: &'a WireInstrument,
    ) -> BoxFuture<'a, Result<(), TransportError>>;

    fn unsubscribe<'a>(
        &'a self,
        instrument: &'a WireInstrument,
    ) -> BoxFuture<'a, Result<(), TransportError>>;

    fn events(
        &self,
    ) -> BoxFuture<'_, Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError>>;

    fn open_order<'a>(
        &'a self,
        instrument: &'a WireInstrument,
        side: WireSide,
        volume: Decimal,
        kind: WireOrderKind,
        price: Option<Decimal>,
        cid: &'a str,
        account: &'a WireAccount,
    ) -> BoxFuture<'a, Result<WireOpenOrder, TransportError>>;

    fn cancel_order<'a>(
        &'a self,
        id: &'a WireOrderId,
    ) -> BoxFuture<'a, Result<(), TransportError>>;
}

/// A mock transport for tests and initial integration.
///
/// Tests script inbound wire traffic through [`MockTransport::push`]. Each
/// call to [`Transport::events`] starts a fresh event channel, so the mock
/// survives reconnects.
#[derive(Debug)]
pub struct MockTransport {
    tx: Mutex<mpsc::UnboundedSender<TransportEvent>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(tx),
            rx: Mutex::new(Some(rx)),
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject an inbound wire event, as if the broker had sent it.
    pub fn push(&self, event: TransportEvent) {
        let _ = self.tx.lock().send(event);
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn connect(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async { Ok(()) })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async { Ok(()) })
    }

    fn subscribe<'a>(
        &'a self,
        _instrument: &'a WireInstrument,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async { Ok(()) })
    }

    fn unsubscribe<'a>(
        &'a self,
        _instrument: &'a WireInstrument,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async { Ok(()) })
    }

    fn events(
        &self,
    ) -> BoxFuture<'_, Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError>> {
        Box::pin(async {
            if let Some(rx) = self.rx.lock().take() {
                return Ok(rx);
            }
            let (tx, rx) = mpsc::unbounded_channel();
            *self.tx.lock() = tx;
            Ok(rx)
        })
    }

    fn open_order<'a>(
        &'a self,
        _instrument: &'a WireInstrument,
        _side: WireSide,
        _volume: Decimal,
        _kind: WireOrderKind,
        _price: Option<Decimal>,
        cid: &'a str,
        _account: &'a WireAccount,
    ) -> BoxFuture<'a, Result<WireOpenOrder, TransportError>> {
        Box::pin(async move {
            Ok(WireOpenOrder {
                id: WireOrderId(format!("MOCK-{cid}")),
                submitted_at: Utc::now(),
            })
        })
    }

    fn cancel_order<'a>(
        &'a self,
        _id: &'a WireOrderId,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async { Ok(()) })
    }
}

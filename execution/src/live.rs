// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! Live broker gateway base.
//!
//! [`LiveGateway`] adapts any [`Transport`] to the [`Gateway`] contract:
//! inbound wire messages are translated to the core's point/order model by
//! the mapper layer (lossless for required fields, unknown fields dropped),
//! broker-assigned ids are reconciled onto submitted orders, and the same
//! [`Account`] mutation paths and event streams the simulator uses apply
//! the same lifecycle invariants.
//!
//! Like the simulator, one engine task owns the account; transport events
//! and gateway commands drain through it FIFO.

use crate::{
    account::{Account, NettingOutcome},
    error::ExecutionError,
    gateway::{
        AccountCriteria, AccountSnapshot, ConnectionStatus, Gateway, GatewayStreams,
    },
    order::{Order, OrderId, OrderInstruction, OrderKind, OrderStatus, Transaction},
    position::Position,
    transport::{
        Transport, TransportError, TransportEvent, WireAccount, WireInstrument, WireOrderId,
        WireOrderKind, WireSide,
    },
};
use arara_data::Point;
use arara_integration::{collection::FnvIndexMap, response::Response, stream::StreamEvent, Terminal, Validator};
use arara_markets::{Instrument, InstrumentName, Side};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tracing::warn;

const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

/// Live session parameters.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Broker-visible account routing identifiers.
    pub account: WireAccount,
    pub initial_balance: Decimal,
}

#[derive(Debug)]
enum LiveCommand {
    CreateOrders(Vec<Order>, oneshot::Sender<Vec<Order>>),
    DeleteOrders(Vec<Order>, oneshot::Sender<Vec<Order>>),
    FetchAccount(oneshot::Sender<AccountSnapshot>),
    Track(Instrument),
    Shutdown,
}

#[derive(Debug)]
struct Running {
    commands: mpsc::UnboundedSender<LiveCommand>,
    handle: JoinHandle<()>,
}

/// Gateway over a live broker [`Transport`].
#[derive(Debug)]
pub struct LiveGateway<T> {
    transport: Arc<T>,
    config: LiveConfig,
    streams: GatewayStreams,
    subscriptions: FnvIndexMap<InstrumentName, Instrument>,
    running: Option<Running>,
}

impl<T: Transport> LiveGateway<T> {
    pub fn new(transport: T, config: LiveConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
            streams: GatewayStreams::new(),
            subscriptions: FnvIndexMap::default(),
            running: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.running.is_some()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// The underlying transport, eg/ for test hooks.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn shutdown_engine(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        let _ = running.commands.send(LiveCommand::Shutdown);
        if timeout(DISCONNECT_GRACE, &mut running.handle).await.is_err() {
            warn!(transport = self.transport.name(), "engine did not drain; aborting");
            running.handle.abort();
        }
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> LiveCommand,
    ) -> Result<R, ExecutionError> {
        let running = self
            .running
            .as_ref()
            .ok_or_else(|| ExecutionError::Connection("not connected".to_string()))?;
        let (tx, rx) = oneshot::channel();
        running
            .commands
            .send(build(tx))
            .map_err(|_| ExecutionError::Connection("engine stopped".to_string()))?;
        rx.await
            .map_err(|_| ExecutionError::Connection("engine stopped".to_string()))
    }
}

#[async_trait]
impl<T: Transport> Gateway for LiveGateway<T> {
    async fn connect(&mut self) -> Response<ConnectionStatus> {
        // Idempotent: tear any previous session down first.
        self.shutdown_engine().await;

        if let Err(error) = self.transport.connect().await {
            return Response::error(ExecutionError::Connection(error.to_string()));
        }
        let events = match self.transport.events().await {
            Ok(events) => events,
            Err(error) => {
                return Response::error(ExecutionError::Connection(error.to_string()))
            }
        };

        let mut account = Account::new(
            self.config.account.account.as_str(),
            self.config.initial_balance,
        );
        for instrument in self.subscriptions.values() {
            if let Err(error) = self.transport.subscribe(&wire_instrument(instrument)).await {
                return Response::error(ExecutionError::Connection(error.to_string()));
            }
            account.add_instrument(instrument.clone());
        }

        let (commands, receiver) = mpsc::unbounded_channel();
        let engine = LiveEngine {
            transport: Arc::clone(&self.transport),
            wire_account: self.config.account.clone(),
            account,
            streams: self.streams.clone(),
            our_ids: FnvIndexMap::default(),
            wire_ids: FnvIndexMap::default(),
        };
        let handle = tokio::spawn(engine.run(receiver, events));
        self.running = Some(Running { commands, handle });
        Response::ok(ConnectionStatus::Connected)
    }

    async fn disconnect(&mut self) -> Response<ConnectionStatus> {
        self.shutdown_engine().await;
        if let Err(error) = self.transport.disconnect().await {
            warn!(transport = self.transport.name(), %error, "disconnect");
        }
        self.subscriptions.clear();
        Response::ok(ConnectionStatus::Disconnected)
    }

    async fn subscribe(&mut self, instrument: Instrument) -> Response<InstrumentName> {
        let name = instrument.name.clone();
        if self.running.is_some() {
            if let Err(error) = self.transport.subscribe(&wire_instrument(&instrument)).await {
                return Response::error(ExecutionError::Connection(error.to_string()));
            }
            if let Some(running) = self.running.as_ref() {
                let _ = running.commands.send(LiveCommand::Track(instrument.clone()));
            }
        }
        self.subscriptions.insert(name.clone(), instrument);
        Response::ok(name)
    }

    async fn unsubscribe(&mut self, instrument: &InstrumentName) -> Response<InstrumentName> {
        if let Some(subscribed) = self.subscriptions.shift_remove(instrument) {
            if self.running.is_some() {
                if let Err(error) = self
                    .transport
                    .unsubscribe(&wire_instrument(&subscribed))
                    .await
                {
                    warn!(%instrument, %error, "unsubscribe");
                }
            }
        }
        Response::ok(instrument.clone())
    }

    async fn account(&mut self, criteria: AccountCriteria) -> Response<AccountSnapshot> {
        if let Some(descriptor) = criteria.descriptor {
            if descriptor.as_str() != self.config.account.account.as_str() {
                return Response::error(ExecutionError::Validation(format!(
                    "unknown account: {descriptor}"
                )));
            }
        }
        self.request(LiveCommand::FetchAccount).await.into()
    }

    async fn create_orders(&mut self, orders: Vec<Order>) -> Response<Vec<Order>> {
        self.request(|reply| LiveCommand::CreateOrders(orders, reply))
            .await
            .into()
    }

    async fn delete_orders(&mut self, orders: Vec<Order>) -> Response<Vec<Order>> {
        self.request(|reply| LiveCommand::DeleteOrders(orders, reply))
            .await
            .into()
    }

    async fn positions(&mut self) -> Response<Vec<Position>> {
        self.request(LiveCommand::FetchAccount)
            .await
            .map(|snapshot| snapshot.positions)
            .into()
    }

    async fn orders(&mut self) -> Response<Vec<Order>> {
        self.request(LiveCommand::FetchAccount)
            .await
            .map(|snapshot| snapshot.orders)
            .into()
    }

    fn streams(&self) -> &GatewayStreams {
        &self.streams
    }
}

// ---------------------------------------------------------------------
// Engine task
// ---------------------------------------------------------------------

struct LiveEngine<T> {
    transport: Arc<T>,
    wire_account: WireAccount,
    account: Account,
    streams: GatewayStreams,
    /// Broker wire id → our order id.
    our_ids: FnvIndexMap<String, OrderId>,
    /// Our order id → broker wire id.
    wire_ids: FnvIndexMap<OrderId, WireOrderId>,
}

impl<T: Transport> LiveEngine<T> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<LiveCommand>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        loop {
            let result = tokio::select! {
                biased;
                command = commands.recv() => match command {
                    None | Some(LiveCommand::Shutdown) => break,
                    Some(command) => self.command(command).await,
                },
                event = events.recv() => match event {
                    None | Some(TransportEvent::Disconnected) => {
                        self.streams.errors.publish(StreamEvent::create(
                            ExecutionError::Connection("transport disconnected".to_string()),
                        ));
                        break;
                    }
                    Some(event) => self.event(event).await,
                },
            };

            if let Err(error) = result {
                self.streams.errors.publish(StreamEvent::create(error.clone()));
                if error.is_terminal() {
                    warn!(%error, "aborting live session");
                    break;
                }
            }
        }
    }

    async fn command(&mut self, command: LiveCommand) -> Result<(), ExecutionError> {
        match command {
            LiveCommand::CreateOrders(orders, reply) => {
                let mut results = Vec::with_capacity(orders.len());
                for order in orders {
                    results.push(self.submit(order).await?);
                }
                let _ = reply.send(results);
            }
            LiveCommand::DeleteOrders(orders, reply) => {
                let mut results = Vec::with_capacity(orders.len());
                for order in orders {
                    results.push(self.cancel(order).await);
                }
                let _ = reply.send(results);
            }
            LiveCommand::FetchAccount(reply) => {
                self.account.recompute();
                let _ = reply.send(AccountSnapshot::from_account(&self.account));
            }
            LiveCommand::Track(instrument) => {
                self.account.add_instrument(instrument);
            }
            LiveCommand::Shutdown => unreachable!("handled by the run loop"),
        }
        Ok(())
    }

    /// Submit one order to the broker, reconciling the assigned wire id.
    async fn submit(&mut self, order: Order) -> Result<Order, ExecutionError> {
        if let Err(error) = order.clone().validate() {
            return match error {
                ExecutionError::Validation(reason) => Ok(self.reject(order, &reason)),
                other => Err(other),
            };
        }
        let Some(state) = self.account.instrument(&order.name) else {
            return Ok(self.reject(order, "unknown instrument"));
        };
        let wire = wire_instrument(&state.instrument);

        let submitted = self
            .transport
            .open_order(
                &wire,
                wire_side(order.side),
                order.volume,
                wire_kind(order.kind),
                order.price,
                order.id.0.as_str(),
                &self.wire_account,
            )
            .await;

        match submitted {
            Ok(open) => {
                self.our_ids.insert(open.id.0.clone(), order.id.clone());
                self.wire_ids.insert(order.id.clone(), open.id);
                let mut placed = order;
                placed.status = OrderStatus::Placed;
                placed.time = Some(open.submitted_at);
                match self.account.add_order(placed.clone()) {
                    Ok(()) => {
                        self.streams
                            .orders
                            .publish(StreamEvent::create(placed.clone()));
                        Ok(placed)
                    }
                    Err(ExecutionError::Validation(reason)) => Ok(self.reject(placed, &reason)),
                    Err(other) => Err(other),
                }
            }
            Err(TransportError::Rejected(reason)) => Ok(self.reject(order, &reason)),
            Err(error) => {
                self.streams.errors.publish(StreamEvent::create(
                    ExecutionError::Connection(error.to_string()),
                ));
                Ok(self.reject(order, "transport failure"))
            }
        }
    }

    fn reject(&mut self, mut order: Order, reason: &str) -> Order {
        warn!(id = %order.id, reason, "order rejected");
        order.status = OrderStatus::Rejected;
        self.account.archive_order(order.clone());
        self.streams.orders.publish(StreamEvent::create(order.clone()));
        order
    }

    async fn cancel(&mut self, order: Order) -> Order {
        if let Some(wire_id) = self.wire_ids.get(&order.id) {
            if let Err(error) = self.transport.cancel_order(wire_id).await {
                warn!(id = %order.id, %error, "broker cancel failed");
            }
        }
        self.cancel_active(&order.id).unwrap_or(order)
    }

    fn cancel_active(&mut self, id: &OrderId) -> Option<Order> {
        let mut order = self.account.remove_order(id)?;
        order.status = OrderStatus::Cancelled;
        self.account.archive_order(order.clone());
        self.streams.orders.publish(StreamEvent::delete(order.clone()));
        Some(order)
    }

    async fn event(&mut self, event: TransportEvent) -> Result<(), ExecutionError> {
        match event {
            TransportEvent::Point {
                symbol,
                time,
                bid,
                bid_size,
                ask,
                ask_size,
            } => {
                let point = point_from_wire(symbol, time, bid, bid_size, ask, ask_size);
                if self.account.apply_point(&point).is_some() {
                    self.streams.points.publish(StreamEvent::create(point));
                }
                // Unknown symbols are dropped.
                Ok(())
            }
            TransportEvent::OrderAccepted { cid, id } => {
                let our_id = OrderId::new(cid);
                if self.account.active_order(&our_id).is_some() {
                    self.our_ids.insert(id.0.clone(), our_id.clone());
                    self.wire_ids.insert(our_id, id);
                }
                Ok(())
            }
            TransportEvent::OrderRejected { cid, reason } => {
                let our_id = OrderId::new(cid);
                if let Some(mut order) = self.account.remove_order(&our_id) {
                    let placed = order.clone();
                    order.status = OrderStatus::Rejected;
                    self.account.archive_order(order.clone());
                    self.streams
                        .orders
                        .publish(StreamEvent::update(placed, order));
                    warn!(id = %our_id, %reason, "order rejected by broker");
                }
                Ok(())
            }
            TransportEvent::Trade {
                order_id,
                price,
                volume,
                time,
            } => self.trade(order_id, price, volume, time).await,
            TransportEvent::OrderCancelled { order_id, .. } => {
                if let Some(our_id) = self.our_ids.get(&order_id.0).cloned() {
                    self.cancel_active(&our_id);
                }
                Ok(())
            }
            TransportEvent::Connected | TransportEvent::Heartbeat => Ok(()),
            TransportEvent::Disconnected => Ok(()),
        }
    }

    /// Apply a broker execution to the working order it belongs to.
    async fn trade(
        &mut self,
        order_id: WireOrderId,
        price: Decimal,
        volume: Decimal,
        time: DateTime<Utc>,
    ) -> Result<(), ExecutionError> {
        let Some(our_id) = self.our_ids.get(&order_id.0).cloned() else {
            warn!(wire_id = %order_id.0, "trade for unknown order dropped");
            return Ok(());
        };
        let Some(mut order) = self.account.remove_order(&our_id) else {
            warn!(id = %our_id, "trade for inactive order dropped");
            return Ok(());
        };

        let placed = order.clone();
        order.transaction = Some(Transaction {
            time,
            price,
            volume,
        });
        order.status = OrderStatus::Filled;
        self.account.record_fill(&order)?;
        self.streams
            .orders
            .publish(StreamEvent::update(placed, order.clone()));

        let outcome = self.account.open_position(&order)?;
        self.settle(&order, outcome).await
    }

    async fn settle(
        &mut self,
        order: &Order,
        outcome: NettingOutcome,
    ) -> Result<(), ExecutionError> {
        if let Some(archived) = outcome.archived() {
            for bracket in archived.brackets.clone() {
                if let Some(wire_id) = self.wire_ids.get(&bracket) {
                    if let Err(error) = self.transport.cancel_order(wire_id).await {
                        warn!(id = %bracket, %error, "bracket cancel failed");
                    }
                }
                self.cancel_active(&bracket);
            }
        }

        match &outcome {
            NettingOutcome::Opened(active) => {
                self.streams
                    .positions
                    .publish(StreamEvent::create(active.clone()));
            }
            NettingOutcome::Closed(archived) => {
                self.streams
                    .positions
                    .publish(StreamEvent::delete(archived.clone()));
            }
            NettingOutcome::Increased { archived, active }
            | NettingOutcome::Reduced { archived, active }
            | NettingOutcome::Reversed { archived, active } => {
                self.streams
                    .positions
                    .publish(StreamEvent::update(archived.clone(), active.clone()));
            }
        }

        if let Some(active) = outcome.active() {
            let name = active.name.clone();
            let mut brackets = Vec::with_capacity(order.orders.len());
            for mut child in order.orders.clone() {
                child.name = order.name.clone();
                child.instruction = OrderInstruction::Brace;
                let submitted = self.submit(child).await?;
                if submitted.status == OrderStatus::Placed {
                    brackets.push(submitted.id);
                }
            }
            if !brackets.is_empty() {
                self.account.set_position_brackets(&name, brackets)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Mapper layer: core model <-> wire shapes
// ---------------------------------------------------------------------

fn wire_instrument(instrument: &Instrument) -> WireInstrument {
    WireInstrument::new(
        instrument.name.as_str(),
        instrument.exchange.as_deref().unwrap_or_default(),
    )
}

fn wire_side(side: Side) -> WireSide {
    match side {
        Side::Buy => WireSide::Buy,
        Side::Sell => WireSide::Sell,
    }
}

fn wire_kind(kind: OrderKind) -> WireOrderKind {
    match kind {
        OrderKind::Market => WireOrderKind::Market,
        OrderKind::Limit => WireOrderKind::Limit,
        OrderKind::Stop => WireOrderKind::Stop,
        OrderKind::StopLimit => WireOrderKind::StopLimit,
    }
}

fn point_from_wire(
    symbol: String,
    time: DateTime<Utc>,
    bid: Decimal,
    bid_size: Decimal,
    ask: Decimal,
    ask_size: Decimal,
) -> Point {
    Point::new(
        InstrumentName::from(symbol),
        time,
        Some(bid),
        bid_size,
        Some(ask),
        ask_size,
    )
}

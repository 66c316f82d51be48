// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! Single-task matching engine behind the [`Simulator`](super::Simulator).
//!
//! Commands and replayed ticks drain FIFO through one `select!` loop, so
//! every account mutation between "read order" and "emit updated account"
//! runs without yielding. Nothing unwinds past this task: per-order failures
//! become `Rejected` statuses, background failures go to the error stream,
//! and only an invariant violation aborts the session.

use crate::{
    account::{Account, NettingOutcome},
    error::ExecutionError,
    gateway::{AccountSnapshot, Dom, GatewayStreams},
    order::{Order, OrderId, OrderInstruction, OrderKind, OrderStatus, Transaction},
};
use arara_data::{FileTickSource, Point, Replay};
use arara_integration::{stream::StreamEvent, Terminal, Validator};
use arara_markets::{Instrument, InstrumentName, Side};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Requests serialized onto the engine task.
#[derive(Debug)]
pub(super) enum EngineCommand {
    CreateOrders(Vec<Order>, oneshot::Sender<Vec<Order>>),
    DeleteOrders(Vec<Order>, oneshot::Sender<Vec<Order>>),
    FetchAccount(oneshot::Sender<AccountSnapshot>),
    FetchPoints(InstrumentName, oneshot::Sender<Option<Vec<Point>>>),
    FetchDom(InstrumentName, oneshot::Sender<Option<Dom>>),
    Attach(Instrument, oneshot::Sender<Result<(), ExecutionError>>),
    Detach(InstrumentName),
    Shutdown,
}

pub(super) struct Engine {
    account: Account,
    replay: Replay,
    streams: GatewayStreams,
    source_dir: PathBuf,
    feed_ended: bool,
}

impl Engine {
    pub(super) fn new(
        account: Account,
        replay: Replay,
        streams: GatewayStreams,
        source_dir: PathBuf,
    ) -> Self {
        Self {
            account,
            replay,
            streams,
            source_dir,
            feed_ended: false,
        }
    }

    pub(super) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<EngineCommand>) {
        loop {
            let result = tokio::select! {
                biased;
                command = commands.recv() => match command {
                    None | Some(EngineCommand::Shutdown) => break,
                    Some(command) => self.command(command),
                },
                point = self.replay.next_point(), if !self.feed_ended => match point {
                    Some(point) => self.point(point),
                    None => {
                        debug!("replay feed ended");
                        self.feed_ended = true;
                        Ok(())
                    }
                },
            };

            if let Err(error) = result {
                self.streams.errors.publish(StreamEvent::create(error.clone()));
                if error.is_terminal() {
                    warn!(%error, "aborting simulator session");
                    break;
                }
            }
        }
    }

    fn command(&mut self, command: EngineCommand) -> Result<(), ExecutionError> {
        match command {
            EngineCommand::CreateOrders(orders, reply) => {
                let mut results = Vec::with_capacity(orders.len());
                for order in orders {
                    results.push(self.create_order(order)?);
                }
                let _ = reply.send(results);
            }
            EngineCommand::DeleteOrders(orders, reply) => {
                let results = orders
                    .into_iter()
                    .map(|order| self.delete_order(order))
                    .collect();
                let _ = reply.send(results);
            }
            EngineCommand::FetchAccount(reply) => {
                self.account.recompute();
                let _ = reply.send(AccountSnapshot::from_account(&self.account));
            }
            EngineCommand::FetchPoints(name, reply) => {
                let points = self
                    .account
                    .instrument(&name)
                    .map(|state| state.points.clone());
                let _ = reply.send(points);
            }
            EngineCommand::FetchDom(name, reply) => {
                let dom = self.account.latest_point(&name).map(|point| Dom {
                    bids: vec![point.clone()],
                    asks: vec![point.clone()],
                });
                let _ = reply.send(dom);
            }
            EngineCommand::Attach(instrument, reply) => {
                let source = FileTickSource::new(&self.source_dir, instrument.name.clone());
                let result = self
                    .replay
                    .attach(&source)
                    .map_err(ExecutionError::from)
                    .map(|()| {
                        self.account.add_instrument(instrument);
                        self.feed_ended = false;
                    });
                let _ = reply.send(result);
            }
            EngineCommand::Detach(name) => {
                self.replay.detach(&name);
            }
            EngineCommand::Shutdown => unreachable!("handled by the run loop"),
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Market data
    // -----------------------------------------------------------------

    fn point(&mut self, point: Point) -> Result<(), ExecutionError> {
        if self.account.apply_point(&point).is_none() {
            warn!(instrument = %point.instrument, "tick for unknown instrument dropped");
            return Ok(());
        }
        self.streams.points.publish(StreamEvent::create(point.clone()));
        self.evaluate_resting(&point)
    }

    /// Evaluate every resting order on the tick's instrument and route the
    /// triggered ones as market orders at this tick.
    fn evaluate_resting(&mut self, point: &Point) -> Result<(), ExecutionError> {
        let triggered: Vec<Order> = self
            .account
            .active_orders()
            .filter(|order| order.name == point.instrument && Self::triggers(order, point))
            .cloned()
            .collect();

        for placed in triggered {
            // A fill earlier in this pass may have cancelled it (eg/ the
            // sibling bracket of a take-profit that just closed).
            if self.account.remove_order(&placed.id).is_none() {
                continue;
            }
            self.fill_market(placed.clone(), Some(placed))?;
        }
        Ok(())
    }

    fn triggers(order: &Order, point: &Point) -> bool {
        let Some(price) = order.price else {
            return false;
        };
        match (order.side, order.kind) {
            // Buy-Stop / Sell-Limit wait for the ask to rise to the price.
            (Side::Buy, OrderKind::Stop | OrderKind::StopLimit)
            | (Side::Sell, OrderKind::Limit) => {
                point.ask.is_some_and(|ask| ask >= price)
            }
            // Sell-Stop / Buy-Limit wait for the bid to fall to the price.
            (Side::Sell, OrderKind::Stop | OrderKind::StopLimit)
            | (Side::Buy, OrderKind::Limit) => {
                point.bid.is_some_and(|bid| bid <= price)
            }
            (_, OrderKind::Market) => false,
        }
    }

    // -----------------------------------------------------------------
    // Order admission & routing
    // -----------------------------------------------------------------

    fn create_order(&mut self, order: Order) -> Result<Order, ExecutionError> {
        if let Err(error) = self.admission(&order) {
            return match error {
                ExecutionError::Validation(reason) => Ok(self.reject(order, &reason)),
                other => Err(other),
            };
        }
        match order.kind {
            OrderKind::Market => self.fill_market(order, None),
            // Resting kinds are never filled at admission, even if
            // immediately executable; first evaluated on the next tick.
            _ => self.place(order),
        }
    }

    fn admission(&self, order: &Order) -> Result<(), ExecutionError> {
        order.clone().validate()?;
        if self.account.instrument(&order.name).is_none() {
            return Err(ExecutionError::Validation(format!(
                "unknown instrument: {}",
                order.name
            )));
        }
        if self.account.id_in_use(&order.id) {
            return Err(ExecutionError::Validation(format!(
                "duplicate order id: {}",
                order.id
            )));
        }
        Ok(())
    }

    fn reject(&mut self, mut order: Order, reason: &str) -> Order {
        warn!(id = %order.id, reason, "order rejected");
        order.status = OrderStatus::Rejected;
        self.account.archive_order(order.clone());
        self.streams.orders.publish(StreamEvent::create(order.clone()));
        order
    }

    fn place(&mut self, mut order: Order) -> Result<Order, ExecutionError> {
        order.status = OrderStatus::Placed;
        if order.time.is_none() {
            order.time = self.account.latest_point(&order.name).map(|point| point.time);
        }
        match self.account.add_order(order.clone()) {
            Ok(()) => {
                self.streams.orders.publish(StreamEvent::create(order.clone()));
                Ok(order)
            }
            Err(ExecutionError::Validation(reason)) => Ok(self.reject(order, &reason)),
            Err(other) => Err(other),
        }
    }

    /// Fill `order` at the current top-of-book and net the fill into the
    /// account. `previous` carries the placed snapshot of a triggered
    /// resting order so its event history stays causal.
    fn fill_market(
        &mut self,
        mut order: Order,
        previous: Option<Order>,
    ) -> Result<Order, ExecutionError> {
        let Some(point) = self.account.latest_point(&order.name).cloned() else {
            return Ok(self.reject(order, "no market data"));
        };
        let price = match order.side {
            Side::Buy => point.ask,
            Side::Sell => point.bid,
        };
        let Some(price) = price else {
            return Ok(self.reject(order, "no opposing quote"));
        };

        order.transaction = Some(Transaction {
            time: point.time,
            price,
            volume: order.volume,
        });
        order.status = OrderStatus::Filled;
        order.time = Some(point.time);

        self.account.record_fill(&order)?;
        let event = match previous {
            Some(previous) => StreamEvent::update(previous, order.clone()),
            None => StreamEvent::create(order.clone()),
        };
        self.streams.orders.publish(event);

        let outcome = self.account.open_position(&order)?;
        self.settle(&order, outcome)
    }

    // -----------------------------------------------------------------
    // Position settlement & brackets
    // -----------------------------------------------------------------

    fn settle(&mut self, order: &Order, outcome: NettingOutcome) -> Result<Order, ExecutionError> {
        if let Some(archived) = outcome.archived() {
            for bracket in archived.brackets.clone() {
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
            self.place_brackets(order, active.name.clone())?;
        }
        Ok(order.clone())
    }

    /// Admit the filled order's bracket children through the normal path and
    /// attach the placed ones to the active position.
    fn place_brackets(
        &mut self,
        parent: &Order,
        position: InstrumentName,
    ) -> Result<(), ExecutionError> {
        if parent.orders.is_empty() {
            return Ok(());
        }
        let mut brackets: Vec<OrderId> = Vec::with_capacity(parent.orders.len());
        for mut child in parent.orders.clone() {
            child.name = parent.name.clone();
            child.instruction = OrderInstruction::Brace;
            let admitted = self.create_order(child)?;
            if admitted.status == OrderStatus::Placed {
                brackets.push(admitted.id);
            }
        }
        self.account.set_position_brackets(&position, brackets)
    }

    fn delete_order(&mut self, order: Order) -> Order {
        // Unknown or already-cancelled ids are a no-op.
        self.cancel_active(&order.id).unwrap_or(order)
    }

    fn cancel_active(&mut self, id: &OrderId) -> Option<Order> {
        let mut order = self.account.remove_order(id)?;
        order.status = OrderStatus::Cancelled;
        self.account.archive_order(order.clone());
        let children: Vec<OrderId> = order.orders.iter().map(|child| child.id.clone()).collect();
        for child in children {
            self.cancel_active(&child);
        }
        self.streams.orders.publish(StreamEvent::delete(order.clone()));
        Some(order)
    }
}

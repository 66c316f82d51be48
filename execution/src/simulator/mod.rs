// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! Local simulator gateway: tick-file replay driving a deterministic
//! matching engine.
//!
//! Subscribed instruments map to tick files under the configured source
//! directory (filename = instrument name). `connect` merges the per-file
//! streams on a virtual clock and spawns the engine task; strategy code
//! then talks to it through the same [`Gateway`] contract as a live broker.

mod engine;

use crate::{
    account::Account,
    error::ExecutionError,
    gateway::{
        AccountCriteria, AccountSnapshot, ConnectionStatus, Dom, Gateway, GatewayStreams,
    },
    order::Order,
    position::Position,
};
use arara_data::{FileTickSource, Point, Replay};
use arara_integration::{collection::FnvIndexMap, response::Response};
use arara_markets::{Instrument, InstrumentName};
use async_trait::async_trait;
use engine::{Engine, EngineCommand};
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::{path::PathBuf, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tracing::warn;

/// Grace period allowed for the engine task to drain on disconnect.
const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

/// Simulator session parameters.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Virtual-clock period between tick emissions.
    pub speed: Duration,
    /// Directory of per-instrument tick files.
    pub source: PathBuf,
    pub initial_balance: Decimal,
    /// Account descriptor reported in snapshots.
    pub descriptor: SmolStr,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            speed: Duration::from_millis(100),
            source: PathBuf::from("."),
            initial_balance: Decimal::ZERO,
            descriptor: SmolStr::new("simulator"),
        }
    }
}

#[derive(Debug)]
struct Running {
    commands: mpsc::UnboundedSender<EngineCommand>,
    handle: JoinHandle<()>,
}

/// Simulated broker implementing the full [`Gateway`] contract.
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    streams: GatewayStreams,
    subscriptions: FnvIndexMap<InstrumentName, Instrument>,
    running: Option<Running>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
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

    /// Stop the engine task, waiting up to the grace period before aborting.
    async fn shutdown_engine(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        let _ = running.commands.send(EngineCommand::Shutdown);
        if timeout(DISCONNECT_GRACE, &mut running.handle).await.is_err() {
            warn!("engine did not drain within grace period; aborting");
            running.handle.abort();
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, ExecutionError> {
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
impl Gateway for Simulator {
    async fn connect(&mut self) -> Response<ConnectionStatus> {
        // Idempotent: tear any previous session down first.
        self.shutdown_engine().await;

        let mut account = Account::new(self.config.descriptor.clone(), self.config.initial_balance);
        let mut replay = Replay::new(self.config.speed);
        for instrument in self.subscriptions.values() {
            let source = FileTickSource::new(&self.config.source, instrument.name.clone());
            if let Err(error) = replay.attach(&source) {
                return Response::error(ExecutionError::from(error));
            }
            account.add_instrument(instrument.clone());
        }

        let (commands, receiver) = mpsc::unbounded_channel();
        let engine = Engine::new(
            account,
            replay,
            self.streams.clone(),
            self.config.source.clone(),
        );
        let handle = tokio::spawn(engine.run(receiver));
        self.running = Some(Running { commands, handle });
        Response::ok(ConnectionStatus::Connected)
    }

    async fn disconnect(&mut self) -> Response<ConnectionStatus> {
        self.shutdown_engine().await;
        self.subscriptions.clear();
        Response::ok(ConnectionStatus::Disconnected)
    }

    async fn subscribe(&mut self, instrument: Instrument) -> Response<InstrumentName> {
        let name = instrument.name.clone();
        self.subscriptions.insert(name.clone(), instrument.clone());
        if self.running.is_some() {
            let attached = self
                .request(|reply| EngineCommand::Attach(instrument, reply))
                .await;
            if let Err(error) = attached.and_then(|result| result) {
                self.subscriptions.shift_remove(&name);
                return Response::error(error);
            }
        }
        Response::ok(name)
    }

    async fn unsubscribe(&mut self, instrument: &InstrumentName) -> Response<InstrumentName> {
        self.subscriptions.shift_remove(instrument);
        if let Some(running) = self.running.as_ref() {
            let _ = running.commands.send(EngineCommand::Detach(instrument.clone()));
        }
        Response::ok(instrument.clone())
    }

    async fn account(&mut self, criteria: AccountCriteria) -> Response<AccountSnapshot> {
        if let Some(descriptor) = criteria.descriptor {
            if descriptor != self.config.descriptor {
                return Response::error(ExecutionError::Validation(format!(
                    "unknown account: {descriptor}"
                )));
            }
        }
        self.request(EngineCommand::FetchAccount).await.into()
    }

    async fn create_orders(&mut self, orders: Vec<Order>) -> Response<Vec<Order>> {
        self.request(|reply| EngineCommand::CreateOrders(orders, reply))
            .await
            .into()
    }

    async fn delete_orders(&mut self, orders: Vec<Order>) -> Response<Vec<Order>> {
        self.request(|reply| EngineCommand::DeleteOrders(orders, reply))
            .await
            .into()
    }

    async fn points(&mut self, instrument: &InstrumentName) -> Response<Vec<Point>> {
        match self
            .request(|reply| EngineCommand::FetchPoints(instrument.clone(), reply))
            .await
        {
            Ok(Some(points)) => Response::ok(points),
            Ok(None) => Response::error(ExecutionError::Validation(format!(
                "unknown instrument: {instrument}"
            ))),
            Err(error) => Response::error(error),
        }
    }

    async fn dom(&mut self, instrument: &InstrumentName) -> Response<Dom> {
        match self
            .request(|reply| EngineCommand::FetchDom(instrument.clone(), reply))
            .await
        {
            Ok(Some(dom)) => Response::ok(dom),
            Ok(None) => Response::error(ExecutionError::Validation(format!(
                "no market data for: {instrument}"
            ))),
            Err(error) => Response::error(error),
        }
    }

    async fn positions(&mut self) -> Response<Vec<Position>> {
        self.request(EngineCommand::FetchAccount)
            .await
            .map(|snapshot| snapshot.positions)
            .into()
    }

    async fn orders(&mut self) -> Response<Vec<Order>> {
        self.request(EngineCommand::FetchAccount)
            .await
            .map(|snapshot| snapshot.orders)
            .into()
    }

    fn streams(&self) -> &GatewayStreams {
        &self.streams
    }
}

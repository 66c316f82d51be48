#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # ⚡ Execution - Account State & Order Execution
//!
//! Account data and order execution for the Arara terminal, live or
//! simulated. The [`gateway::Gateway`] trait provides a unified language to
//! interact with brokers; the [`simulator::Simulator`] is a feature-complete
//! implementation backed by tick-file replay, and [`live::LiveGateway`]
//! adapts any [`transport::Transport`] to the same contract.
//!
//! ## 🎯 Main Features
//!
//! * **🚀 Simplicity**: the `Gateway` trait lets strategy code talk to the
//!   simulator and to live brokers through one interface
//! * **🔄 One state model**: every adapter mutates the same [`account::Account`]
//!   and therefore preserves the same lifecycle invariants — at most one net
//!   position per instrument, append-only history, balance driven only by
//!   realised P&L
//! * **🔧 Extensibility**: new brokers implement the small `Transport`
//!   surface and inherit the rest
//!
//! ## 🏗️ Main Components
//!
//! ### Gateway
//! Connect/disconnect, instrument subscription, order submission and
//! cancellation, read-only queries, and typed event streams — all answered
//! through the [`Response`](arara_integration::response::Response) envelope.
//! Adapters never panic across this boundary.
//!
//! ### Simulator
//! A deterministic matching engine replaying merged tick streams on a
//! virtual clock: resting orders trigger on bid/ask crossings, fills net
//! into volume-weighted positions, bracket children are placed on fill and
//! cancelled on close.

use crate::error::ExecutionError;
use arara_integration::stream::EventStream;

pub mod account;
pub mod error;
pub mod gateway;
pub mod live;
pub mod order;
pub mod position;
pub mod simulator;
pub mod transport;

pub use account::Account;
pub use gateway::{Gateway, GatewayStreams};
pub use order::{Order, OrderId, OrderKind, OrderStatus};
pub use position::Position;
pub use simulator::{Simulator, SimulatorConfig};

/// Convenient type alias for the error stream every gateway exposes.
pub type ErrorStream = EventStream<ExecutionError>;

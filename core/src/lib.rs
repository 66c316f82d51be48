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

//! # 🦜 Core - Terminal Glue
//!
//! Top-level glue for the Arara trading terminal: the [`config::SystemConfig`]
//! recognized by the core, standardized [`logging`] initialisation and the
//! aggregated [`error::AraraError`].
//!
//! The terminal itself is a library: there is no CLI surface here. A host
//! application loads a `SystemConfig`, builds a
//! [`Simulator`](arara_execution::Simulator) (or a live gateway) from it and
//! drives everything through the
//! [`Gateway`](arara_execution::Gateway) contract.

/// Configuration recognized by the core: `Speed`, `Source`, `InitialBalance`,
/// `Account.Descriptor`.
pub mod config;

/// Central error type aggregating the subsystem errors.
pub mod error;

/// Standardized logging configuration.
pub mod logging;

pub use config::SystemConfig;
pub use error::AraraError;

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

//! # 🔄 Integration - Stream & Channel Primitives
//!
//! Low-level building blocks shared by every Arara crate: typed
//! publish-subscribe [`stream::EventStream`]s, [`channel`] wrappers over
//! tokio mpsc, the [`response::Response`] envelope used at every gateway
//! boundary, and small validation traits.
//!
//! ## 🏗️ Core Abstractions
//!
//! ### EventStream
//! A typed pub/sub stream carrying `{action, previous?, next}` messages.
//! Subscribing returns a scoped handle; dropping the handle guarantees no
//! further delivery. Delivery is in publish order per stream, and multiple
//! streams merge into one ordered flow via `select_all`.
//!
//! ### Response
//! The envelope every gateway call answers with: `{data?, errors}`. Adapters
//! never panic across the boundary; all failures are captured as
//! [`response::ResponseError`] entries.

/// Defines a trait [`Tx`](channel::Tx) abstraction over different channel kinds, as well as
/// other channel utilities.
///
/// eg/ `UnboundedTx`, `UnboundedRx`, etc.
pub mod channel;

pub mod collection;

/// The `{data?, errors}` envelope answered by every gateway call.
pub mod response;

/// Typed publish-subscribe event streams and merging utilities.
pub mod stream;

/// [`Validator`]s are capable of determining if their internal state is satisfactory to fulfill
/// some use case defined by the implementor.
pub trait Validator {
    type Error;

    /// Check if `Self` is valid for some use case.
    fn validate(self) -> Result<Self, Self::Error>
    where
        Self: Sized;
}

/// Trait that communicates if something is terminal (eg/ requires shutdown or restart).
pub trait Terminal {
    fn is_terminal(&self) -> bool;
}

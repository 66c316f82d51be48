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

//! # 🏛️ Markets - Instrument Identity
//!
//! Core instrument data structures shared by every Arara crate: the
//! [`Instrument`] descriptor, the [`InstrumentName`] key it is looked up by,
//! trade [`Side`], and the [`TimeFrame`] aggregation bucket.
//!
//! Ownership is deliberately flat: derivatives reference their underlying by
//! [`InstrumentName`] (`basis`), never by an owning reference back up the
//! tree. All per-instrument state (tick series, positions) is keyed on the
//! name and resolved through the owning account.

/// Defines the [`Instrument`](instrument::Instrument) descriptor,
/// [`InstrumentKind`](instrument::InstrumentKind) and the
/// [`InstrumentName`](instrument::InstrumentName) key newtype.
pub mod instrument;

/// Operation side (Buy or Sell).
pub mod side;

/// Time-bucket duration used to aggregate ticks into point groups.
pub mod timeframe;

pub use instrument::{Instrument, InstrumentKind, InstrumentName};
pub use side::Side;
pub use timeframe::TimeFrame;

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

//! # 📊 Data - Market Data Ingestion & Replay
//!
//! Market-data side of the Arara terminal: the normalised [`point::Point`]
//! tick model, restartable [`source::TickSource`]s (tick files and in-memory
//! vectors), the k-way [`merge::TickMerge`] producing one globally
//! time-ordered flow, and the [`replay::Replay`] virtual clock that gates
//! emissions to a configurable rate.
//!
//! ## Merge ordering
//!
//! The merge keeps a one-element look-ahead per source and always emits the
//! minimum `(time, instrument)` pair — ties break deterministically to the
//! lexicographically smallest instrument name. Within a source, the original
//! order is preserved untouched.

/// All [`Error`](std::error::Error)s generated by market-data handling.
pub mod error;

/// Time-bucketed aggregation of points into groups (bars).
pub mod group;

/// K-way merge over per-instrument tick sources.
pub mod merge;

/// Normalised top-of-book tick model and its text line format.
pub mod point;

/// Virtual-clock pacing over a [`merge::TickMerge`].
pub mod replay;

/// Lazy, restartable per-instrument tick sources.
pub mod source;

pub use error::DataError;
pub use merge::TickMerge;
pub use point::Point;
pub use replay::Replay;
pub use source::{FileTickSource, TickSource, VecTickSource};

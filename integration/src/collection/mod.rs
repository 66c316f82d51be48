// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! # Collection Module
//!
//! Specialized collection aliases used throughout the Arara crates for
//! keyed account state (instruments, active orders, active positions).
//!
//! The FNV hasher types provide better performance than the default hasher
//! for the small keys common here (instrument names, order ids), while the
//! IndexMap base preserves deterministic insertion-order iteration —
//! snapshots and test assertions rely on that ordering.

/// Fast IndexMap using FNV hasher for better performance with small keys
pub type FnvIndexMap<K, V> = indexmap::IndexMap<K, V, fnv::FnvBuildHasher>;

/// Fast IndexSet using FNV hasher for better performance with small keys
pub type FnvIndexSet<T> = indexmap::IndexSet<T, fnv::FnvBuildHasher>;

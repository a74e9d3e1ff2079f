//! Top-level module of the Markov chain model.
//!
//! From the leaves up:
//! - Token interning (`SymbolPool`)
//! - N-gram keys, sentinels and pair utilities
//! - Sparse transition rows (`TransitionRow`)
//! - The chain itself (`Chain`)
//! - Draw sources used for sampling
//! - A full-sequence driver (`Generator`)

/// Bidirectional mapping between tokens and dense ids.
pub mod pool;

/// N-gram keys, sentinel tokens and sliding-window helpers.
pub mod ngram;

/// Sparse per-state transition counts.
///
/// Tracks outgoing transitions and supports ordered weighted sampling.
pub mod state;

/// Fixed-order chain: ingestion, probability queries, single-step generation,
/// merging and persistence.
pub mod chain;

/// Integer draw sources (`rand` generators or scripted values).
pub mod rng;

/// Drives a chain step by step until it stops.
pub mod generator;

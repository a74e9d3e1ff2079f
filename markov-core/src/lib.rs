//! Word-level Markov chain library.
//!
//! This crate provides an n-gram Markov chain over arbitrary string tokens:
//! - A symbol pool interning tokens into dense ids
//! - Sparse transition rows counting observed successors
//! - Frequency-weighted sampling with an injectable draw source
//! - Chain merging, parallel training and binary persistence
//! - Corpus file utilities

/// Core chain model and generation logic.
pub mod model;

/// Error types of the chain and its persistence.
pub mod error;

/// I/O utilities (corpus loading, path helpers, binary cache).
pub mod io;

pub use error::{ChainError, PersistError};
pub use model::chain::Chain;
pub use model::generator::Generator;
pub use model::ngram::{END_TOKEN, START_TOKEN};
pub use model::rng::{DrawSource, ScriptedDraws};

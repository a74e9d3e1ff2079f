use thiserror::Error;

/// Errors reported by chain queries and generation.
///
/// Terminal states, dead ends and unknown tokens in a probability query are
/// not errors: they yield an empty token or a zero probability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
	/// The n-gram passed in does not have exactly `order` tokens.
	#[error("n-gram length mismatch: expected {expected} tokens, got {got}")]
	NgramLengthMismatch { expected: usize, got: usize },

	/// Generation was asked to step from a state never observed in training.
	#[error("unknown n-gram state: {0:?}")]
	UnknownNgramState(Vec<String>),

	/// Two chains of different orders cannot be merged.
	#[error("order mismatch: {left} vs {right}")]
	OrderMismatch { left: usize, right: usize },
}

/// Errors raised while saving or loading a chain.
#[derive(Debug, Error)]
pub enum PersistError {
	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),

	#[error("encoding error: {0}")]
	Encoding(#[from] postcard::Error),

	/// The decoded data does not describe a valid chain.
	#[error("corrupt chain: {0}")]
	Corrupt(String),
}

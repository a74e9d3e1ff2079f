use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use super::ngram::{END_TOKEN, NGramKey, START_TOKEN, make_pairs, pad, repeat_token};
use super::pool::{SymbolPool, TokenId};
use super::rng::DrawSource;
use super::state::TransitionRow;
use crate::error::{ChainError, PersistError};

/// Word-level Markov chain of a fixed order.
///
/// The chain stores, for every observed n-gram of `order` tokens, how many
/// times each next token followed it. Generation samples the next token in
/// proportion to those counts.
///
/// # Responsibilities
/// - Ingest token sequences, padded with start/end sentinels
/// - Report transition probabilities
/// - Step generation one token at a time
/// - Merge with another chain of the same order (parallel training support)
///
/// # Invariants
/// - `order` is always >= 1 and never changes
/// - Every state key has exactly `order` ids, all registered in `pool`
/// - Counts only increase and the pool only grows
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Chain {
	order: usize,
	pool: SymbolPool,
	states: HashMap<NGramKey, TransitionRow>,
}

impl Chain {
	/// Creates an empty chain of order `order`.
	///
	/// An order of 0 is coerced to 1.
	pub fn new(order: usize) -> Self {
		Self { order: order.max(1), pool: SymbolPool::new(), states: HashMap::new() }
	}

	/// Number of tokens in a state.
	pub fn order(&self) -> usize {
		self.order
	}

	/// Number of distinct states observed so far.
	pub fn state_count(&self) -> usize {
		self.states.len()
	}

	/// Number of distinct tokens known to the chain, sentinels included.
	pub fn vocabulary_len(&self) -> usize {
		self.pool.len()
	}

	/// Read-only access to the symbol pool.
	pub fn pool(&self) -> &SymbolPool {
		&self.pool
	}

	/// The state every traversal starts from: `order` start sentinels.
	pub fn initial_state(&self) -> Vec<String> {
		repeat_token(START_TOKEN, self.order)
	}

	/// Adds a token sequence to the chain.
	///
	/// The sequence is padded with `order` start sentinels and one end
	/// sentinel, then every `(state, next)` pair increments one count. An empty
	/// sequence still records the transition from the initial state to the end
	/// sentinel.
	///
	/// # Notes
	/// - Tokens are taken verbatim, no normalization is applied.
	/// - Tokens equal to a sentinel are not rejected and count as that sentinel.
	pub fn add<S: AsRef<str>>(&mut self, tokens: &[S]) {
		let padded = pad(tokens, self.order);
		for (state, next) in make_pairs(&padded, self.order) {
			let key = NGramKey::intern(&mut self.pool, state);
			let next = self.pool.add(next);
			self.states.entry(key).or_default().increment(next);
		}
	}

	fn check_len<S>(&self, current: &[S]) -> Result<(), ChainError> {
		if current.len() != self.order {
			return Err(ChainError::NgramLengthMismatch { expected: self.order, got: current.len() });
		}
		Ok(())
	}

	fn row<S: AsRef<str>>(&self, current: &[S]) -> Option<&TransitionRow> {
		let key = NGramKey::lookup(&self.pool, current)?;
		self.states.get(&key)
	}

	/// Probability that `next` follows the state `current`.
	///
	/// Unknown states or tokens have probability 0.
	///
	/// # Errors
	/// Returns [`ChainError::NgramLengthMismatch`] if `current` does not hold
	/// exactly `order` tokens.
	pub fn transition_probability<S: AsRef<str>>(&self, next: &str, current: &[S]) -> Result<f64, ChainError> {
		self.check_len(current)?;

		let (Some(row), Some(next)) = (self.row(current), self.pool.get(next)) else {
			return Ok(0.0);
		};

		let sum = row.sum();
		if sum == 0 {
			return Ok(0.0);
		}
		Ok(row.count(next) as f64 / sum as f64)
	}

	/// Samples the token following `current` using a thread-local generator.
	///
	/// See [`Chain::generate_deterministic`] for the semantics.
	pub fn generate<S: AsRef<str>>(&self, current: &[S]) -> Result<String, ChainError> {
		self.generate_deterministic(current, &mut rand::rng())
	}

	/// Samples the token following `current`, drawing from `source`.
	///
	/// An empty string means "stop": either `current` ends with the end
	/// sentinel, or the state has no outgoing weight. Given the same chain and
	/// the same draws, the result is always the same since the transition row
	/// is walked in ascending id order.
	///
	/// # Errors
	/// - [`ChainError::NgramLengthMismatch`] if `current` does not hold exactly
	///   `order` tokens
	/// - [`ChainError::UnknownNgramState`] if `current` was never observed
	pub fn generate_deterministic<S, D>(&self, current: &[S], source: &mut D) -> Result<String, ChainError>
	where
		S: AsRef<str>,
		D: DrawSource + ?Sized,
	{
		self.check_len(current)?;

		if current.last().is_some_and(|last| last.as_ref() == END_TOKEN) {
			return Ok(String::new());
		}

		let Some(row) = self.row(current) else {
			return Err(ChainError::UnknownNgramState(
				current.iter().map(|token| token.as_ref().to_owned()).collect(),
			));
		};

		let sum = row.sum();
		if sum == 0 {
			return Ok(String::new());
		}

		let draw = source.draw(sum);
		let next = row.sample(draw).and_then(|id| self.pool.resolve(id));
		trace!("draw {draw}/{sum} -> {next:?}");

		match next {
			Some(token) => Ok(token.to_owned()),
			None => {
				warn!("draw {draw} out of range for row of weight {sum}");
				Ok(String::new())
			}
		}
	}

	/// Merges another chain into this one.
	///
	/// Tokens of `other` are registered in its id order, so merging chains
	/// built from consecutive chunks of a corpus yields the same ids and counts
	/// as ingesting the whole corpus sequentially.
	///
	/// # Errors
	/// Returns [`ChainError::OrderMismatch`] if the orders differ.
	pub fn merge(&mut self, other: &Self) -> Result<(), ChainError> {
		if self.order != other.order {
			return Err(ChainError::OrderMismatch { left: self.order, right: other.order });
		}

		let remap: Vec<TokenId> = other.pool.iter().map(|(_, token)| self.pool.add(token)).collect();
		for (key, row) in &other.states {
			let ids: Vec<TokenId> = key.ids().iter().map(|id| remap[id.as_usize()]).collect();
			self.states
				.entry(NGramKey::from_ids(&ids))
				.or_default()
				.merge(row, |id| remap[id.as_usize()]);
		}

		debug!("merged chain with {} states into {} states", other.states.len(), self.states.len());
		Ok(())
	}

	/// Trains a chain on many sequences using every available core.
	///
	/// The sequences are split into `cpus * 8` chunks, each chunk is learned
	/// into a partial chain on its own thread, and the partial chains are
	/// merged back in chunk order. The result equals sequential ingestion.
	pub fn train_parallel<S>(sequences: &[Vec<S>], order: usize) -> Self
	where
		S: AsRef<str> + Sync,
	{
		let mut chain = Chain::new(order);
		if sequences.is_empty() {
			return chain;
		}

		let cpus = num_cpus::get();
		let factor = 8;
		let chunks = cpus * factor;
		let chunk_size = sequences.len().div_ceil(chunks);

		let (tx, rx) = mpsc::channel();
		thread::scope(|scope| {
			for (index, chunk) in sequences.chunks(chunk_size).enumerate() {
				let tx = tx.clone();
				scope.spawn(move || {
					let mut partial = Chain::new(order);
					for sequence in chunk {
						partial.add(sequence);
					}
					if tx.send((index, partial)).is_err() {
						warn!("partial chain {index} dropped");
					}
				});
			}
		});
		drop(tx);

		let mut partials: Vec<(usize, Chain)> = rx.iter().collect();
		partials.sort_unstable_by_key(|(index, _)| *index);
		debug!("training {} sequences in {} chunks", sequences.len(), partials.len());

		for (_, partial) in &partials {
			// Orders are equal by construction.
			if let Err(e) = chain.merge(partial) {
				warn!("skipping partial chain: {e}");
			}
		}
		chain
	}

	/// Encodes the chain with `postcard`.
	pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
		Ok(postcard::to_stdvec(self)?)
	}

	/// Decodes a chain produced by [`Chain::to_bytes`].
	///
	/// # Errors
	/// Returns [`PersistError::Corrupt`] if the decoded chain breaks one of the
	/// chain invariants.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
		let chain: Chain = postcard::from_bytes(bytes)?;
		chain.validate()?;
		Ok(chain)
	}

	/// Writes the encoded chain to `path`.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistError> {
		std::fs::write(&path, self.to_bytes()?)?;
		debug!("saved chain to {}", path.as_ref().display());
		Ok(())
	}

	/// Reads a chain previously written by [`Chain::save`].
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PersistError> {
		let bytes = std::fs::read(&path)?;
		let chain = Self::from_bytes(&bytes)?;
		debug!("loaded chain of order {} from {}", chain.order, path.as_ref().display());
		Ok(chain)
	}

	fn validate(&self) -> Result<(), PersistError> {
		if self.order == 0 {
			return Err(PersistError::Corrupt("order is 0".to_owned()));
		}
		let known = |id: &TokenId| id.as_usize() < self.pool.len();
		for (key, row) in &self.states {
			if key.len() != self.order {
				return Err(PersistError::Corrupt(format!("state of length {} in chain of order {}", key.len(), self.order)));
			}
			if !key.ids().iter().all(known) || !row.ordered_keys().iter().all(known) {
				return Err(PersistError::Corrupt("token id outside of pool".to_owned()));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::rng::ScriptedDraws;

	fn sam_chain() -> Chain {
		let mut chain = Chain::new(2);
		chain.add(&["I", "am", "Sam", "Sam", "I", "am"]);
		chain
	}

	#[test]
	fn order_zero_is_coerced_to_one() {
		let chain = Chain::new(0);
		assert_eq!(chain.order(), 1);
		assert_eq!(chain.initial_state(), vec![START_TOKEN]);
	}

	#[test]
	fn empty_add_records_start_to_end() {
		let mut chain = Chain::new(1);
		chain.add::<&str>(&[]);

		assert_eq!(chain.transition_probability(END_TOKEN, &[START_TOKEN]), Ok(1.0));

		let mut draws = ScriptedDraws::new([0]);
		assert_eq!(chain.generate_deterministic(&[START_TOKEN], &mut draws), Ok(END_TOKEN.to_owned()));
	}

	#[test]
	fn add_counts_every_pair() {
		let chain = sam_chain();
		// S S, S I, I am, am Sam, Sam Sam, Sam I
		assert_eq!(chain.state_count(), 6);
		// <START>, I, am, Sam, <END>
		assert_eq!(chain.vocabulary_len(), 5);
	}

	#[test]
	fn probability_is_count_over_sum() {
		let chain = sam_chain();
		assert_eq!(chain.transition_probability("Sam", &["I", "am"]), Ok(0.5));
		assert_eq!(chain.transition_probability(END_TOKEN, &["I", "am"]), Ok(0.5));
		assert_eq!(chain.transition_probability("I", &[START_TOKEN, START_TOKEN]), Ok(1.0));
		assert_eq!(chain.transition_probability("I", &["I", "am"]), Ok(0.0));
	}

	#[test]
	fn probability_of_unknowns_is_zero() {
		let chain = sam_chain();
		assert_eq!(chain.transition_probability("nobody", &["I", "am"]), Ok(0.0));
		assert_eq!(chain.transition_probability("Sam", &["am", "I"]), Ok(0.0));
		assert_eq!(chain.transition_probability("Sam", &["who", "am"]), Ok(0.0));
	}

	#[test]
	fn probability_rejects_wrong_length() {
		let chain = sam_chain();
		let expected = Err(ChainError::NgramLengthMismatch { expected: 2, got: 1 });
		assert_eq!(chain.transition_probability("am", &["I"]), expected);
		assert_eq!(
			chain.transition_probability("am", &["I", "am", "Sam"]),
			Err(ChainError::NgramLengthMismatch { expected: 2, got: 3 })
		);
	}

	#[test]
	fn generate_rejects_wrong_length() {
		let chain = sam_chain();
		let mut draws = ScriptedDraws::new([0]);
		assert_eq!(
			chain.generate_deterministic(&[START_TOKEN], &mut draws),
			Err(ChainError::NgramLengthMismatch { expected: 2, got: 1 })
		);
		// Length is checked before the terminal shortcut.
		assert_eq!(
			chain.generate(&[END_TOKEN]),
			Err(ChainError::NgramLengthMismatch { expected: 2, got: 1 })
		);
	}

	#[test]
	fn generate_stops_on_end_token() {
		let chain = sam_chain();
		assert_eq!(chain.generate(&["am", END_TOKEN]), Ok(String::new()));
		// Even for states that were never observed.
		assert_eq!(chain.generate(&["nobody", END_TOKEN]), Ok(String::new()));
	}

	#[test]
	fn generate_rejects_unknown_state() {
		let chain = sam_chain();
		assert_eq!(
			chain.generate(&["am", "I"]),
			Err(ChainError::UnknownNgramState(vec!["am".to_owned(), "I".to_owned()]))
		);
		assert!(matches!(chain.generate(&["who", "am"]), Err(ChainError::UnknownNgramState(_))));
	}

	#[test]
	fn fresh_chain_has_no_initial_state() {
		let chain = Chain::new(1);
		assert!(matches!(chain.generate(&[START_TOKEN]), Err(ChainError::UnknownNgramState(_))));
	}

	#[test]
	fn deterministic_steps_follow_draws() {
		let chain = sam_chain();
		// Sam was pooled before <END>, so it owns the lower draw.
		let mut draws = ScriptedDraws::new([0, 1]);
		assert_eq!(chain.generate_deterministic(&["I", "am"], &mut draws), Ok("Sam".to_owned()));
		assert_eq!(chain.generate_deterministic(&["I", "am"], &mut draws), Ok(END_TOKEN.to_owned()));
	}

	#[test]
	fn sentinel_tokens_in_input_are_not_rejected() {
		let mut chain = Chain::new(1);
		chain.add(&["a", END_TOKEN, "b"]);
		assert_eq!(chain.transition_probability(END_TOKEN, &["a"]), Ok(1.0));
		// The embedded end sentinel is a terminal state, so "b" is unreachable.
		assert_eq!(chain.generate(&[END_TOKEN]), Ok(String::new()));
	}

	#[test]
	fn merge_equals_sequential_add() {
		let first = vec!["the", "cat", "sat"];
		let second = vec!["the", "dog", "sat", "down"];

		let mut sequential = Chain::new(2);
		sequential.add(&first);
		sequential.add(&second);

		let mut left = Chain::new(2);
		left.add(&first);
		let mut right = Chain::new(2);
		right.add(&second);
		left.merge(&right).unwrap();

		assert_eq!(left, sequential);
	}

	#[test]
	fn merge_rejects_other_orders() {
		let mut left = Chain::new(1);
		let right = Chain::new(3);
		assert_eq!(left.merge(&right), Err(ChainError::OrderMismatch { left: 1, right: 3 }));
	}

	#[test]
	fn train_parallel_equals_sequential_add() {
		let sequences: Vec<Vec<String>> = (0..100)
			.map(|i| (0..(i % 7)).map(|j| format!("w{}", (i * j) % 13)).collect())
			.collect();

		let mut sequential = Chain::new(2);
		for sequence in &sequences {
			sequential.add(sequence);
		}

		assert_eq!(Chain::train_parallel(&sequences, 2), sequential);
	}

	#[test]
	fn train_parallel_on_nothing() {
		let chain = Chain::train_parallel::<String>(&[], 0);
		assert_eq!(chain.order(), 1);
		assert_eq!(chain.state_count(), 0);
	}

	#[test]
	fn bytes_roundtrip_preserves_generation() {
		let chain = sam_chain();
		let back = Chain::from_bytes(&chain.to_bytes().unwrap()).unwrap();
		assert_eq!(back, chain);

		let mut draws = ScriptedDraws::new([1]);
		assert_eq!(back.generate_deterministic(&["I", "am"], &mut draws), Ok(END_TOKEN.to_owned()));
	}

	#[test]
	fn from_bytes_rejects_garbage() {
		assert!(Chain::from_bytes(&[0xff, 0xff, 0xff]).is_err());
	}

	#[test]
	fn from_bytes_rejects_zero_order() {
		let mut chain = Chain::new(1);
		chain.order = 0;
		let bytes = postcard::to_stdvec(&chain).unwrap();
		assert!(matches!(Chain::from_bytes(&bytes), Err(PersistError::Corrupt(_))));
	}
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::pool::TokenId;

/// Sparse transition row of a single chain state.
///
/// Maps each observed next token to the number of times it followed the
/// state. Conceptually this is a node of the Markov chain whose outgoing edges
/// are weighted by their number of observations.
///
/// # Invariants
/// - Each stored count is strictly positive
/// - `sum()` is the number of times the state was observed
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionRow {
	/// Example: { TokenId(3) => 42, TokenId(7) => 3 }
	transitions: HashMap<TokenId, u64>,
}

impl TransitionRow {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records one occurrence of a transition toward `next`.
	///
	/// An absent key starts at 1.
	pub fn increment(&mut self, next: TokenId) {
		self.add_count(next, 1);
	}

	fn add_count(&mut self, next: TokenId, count: u64) {
		if count > 0 {
			*self.transitions.entry(next).or_insert(0) += count;
		}
	}

	/// Observed count of `next`, 0 if never seen.
	pub fn count(&self, next: TokenId) -> u64 {
		self.transitions.get(&next).copied().unwrap_or(0)
	}

	/// Total of all counts, 0 for an empty row.
	pub fn sum(&self) -> u64 {
		self.transitions.values().sum()
	}

	/// Number of distinct next tokens.
	pub fn len(&self) -> usize {
		self.transitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.transitions.is_empty()
	}

	/// Keys in ascending id order.
	///
	/// Sampling iterates in this order so that a given draw always selects
	/// the same key, whatever the hash map's iteration order.
	pub fn ordered_keys(&self) -> Vec<TokenId> {
		let mut keys: Vec<TokenId> = self.transitions.keys().copied().collect();
		keys.sort_unstable();
		keys
	}

	/// Iterates over `(next, count)` pairs in ascending id order.
	pub fn ordered_entries(&self) -> impl Iterator<Item = (TokenId, u64)> + '_ {
		self.ordered_keys().into_iter().map(|key| (key, self.count(key)))
	}

	/// Selects the key reached by `draw` in a cumulative walk.
	///
	/// Keys are visited in ascending order and each count is subtracted from
	/// `draw`; the key at which the remainder would go below zero is returned.
	/// `draw` is expected in `[0, sum())`. Returns `None` if the row is empty
	/// or the draw is out of range.
	pub fn sample(&self, draw: u64) -> Option<TokenId> {
		let mut remaining = draw;
		for (key, count) in self.ordered_entries() {
			if remaining < count {
				return Some(key);
			}
			remaining -= count;
		}
		None
	}

	/// Merges another row into this one.
	///
	/// `remap` translates the other row's ids into this row's id space, which
	/// lets rows coming from a different symbol pool be combined. Counts of
	/// matching keys are summed.
	pub fn merge<F>(&mut self, other: &Self, mut remap: F)
	where
		F: FnMut(TokenId) -> TokenId,
	{
		for (next, count) in other.ordered_entries() {
			self.add_count(remap(next), count);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn row(entries: &[(u32, u64)]) -> TransitionRow {
		let mut row = TransitionRow::new();
		for &(key, count) in entries {
			for _ in 0..count {
				row.increment(TokenId(key));
			}
		}
		row
	}

	#[test]
	fn increment_starts_at_one() {
		let mut row = TransitionRow::new();
		assert_eq!(row.count(TokenId(4)), 0);
		row.increment(TokenId(4));
		assert_eq!(row.count(TokenId(4)), 1);
		row.increment(TokenId(4));
		assert_eq!(row.count(TokenId(4)), 2);
	}

	#[test]
	fn sum_of_empty_row_is_zero() {
		let row = TransitionRow::new();
		assert_eq!(row.sum(), 0);
		assert!(row.is_empty());
	}

	#[test]
	fn sum_totals_counts() {
		let row = row(&[(1, 3), (9, 2), (4, 1)]);
		assert_eq!(row.sum(), 6);
		assert_eq!(row.len(), 3);
	}

	#[test]
	fn ordered_keys_are_ascending() {
		let row = row(&[(9, 1), (2, 1), (5, 1), (0, 1)]);
		assert_eq!(row.ordered_keys(), vec![TokenId(0), TokenId(2), TokenId(5), TokenId(9)]);
	}

	#[test]
	fn sample_walks_keys_in_ascending_order() {
		// id 2 covers draws 0..3, id 5 covers 3..4, id 9 covers 4..6
		let row = row(&[(9, 2), (2, 3), (5, 1)]);
		assert_eq!(row.sample(0), Some(TokenId(2)));
		assert_eq!(row.sample(2), Some(TokenId(2)));
		assert_eq!(row.sample(3), Some(TokenId(5)));
		assert_eq!(row.sample(4), Some(TokenId(9)));
		assert_eq!(row.sample(5), Some(TokenId(9)));
		assert_eq!(row.sample(6), None);
	}

	#[test]
	fn sample_of_empty_row() {
		assert_eq!(TransitionRow::new().sample(0), None);
	}

	#[test]
	fn merge_sums_and_remaps() {
		let mut left = row(&[(0, 1), (1, 2)]);
		let right = row(&[(0, 4), (3, 1)]);
		// right's id 0 is left's id 1, right's id 3 is new id 2
		left.merge(&right, |id| match id.0 {
			0 => TokenId(1),
			_ => TokenId(2),
		});
		assert_eq!(left.count(TokenId(0)), 1);
		assert_eq!(left.count(TokenId(1)), 6);
		assert_eq!(left.count(TokenId(2)), 1);
		assert_eq!(left.sum(), 8);
	}
}

use serde::{Deserialize, Serialize};

use super::pool::{SymbolPool, TokenId};

/// Token prepended `order` times to every ingested sequence.
pub const START_TOKEN: &str = "<START>";

/// Token appended once to every ingested sequence.
pub const END_TOKEN: &str = "<END>";

/// Canonical, collision-free key of an n-gram.
///
/// The key is the tuple of pooled token ids, so two n-grams share a key iff
/// their token sequences are equal. No delimiter is involved: a token that
/// happens to contain a separator character cannot alias a multi-token state.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct NGramKey(Box<[TokenId]>);

impl NGramKey {
	/// Builds a key from already pooled ids.
	pub fn from_ids(ids: &[TokenId]) -> Self {
		Self(ids.into())
	}

	/// Pools every token of `ngram` and returns the resulting key.
	pub fn intern<S: AsRef<str>>(pool: &mut SymbolPool, ngram: &[S]) -> Self {
		Self(ngram.iter().map(|token| pool.add(token.as_ref())).collect())
	}

	/// Builds the key of `ngram` without touching the pool.
	///
	/// Returns `None` if any token was never pooled, in which case the
	/// n-gram cannot be a known state.
	pub fn lookup<S: AsRef<str>>(pool: &SymbolPool, ngram: &[S]) -> Option<Self> {
		ngram
			.iter()
			.map(|token| pool.get(token.as_ref()))
			.collect::<Option<Box<[TokenId]>>>()
			.map(Self)
	}

	/// Ids of the key, in n-gram order.
	#[inline]
	pub fn ids(&self) -> &[TokenId] {
		&self.0
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// The empty n-gram has the empty key.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Slides a window of width `order` across `tokens`.
///
/// Produces one `(state, next)` pair per position where a complete window is
/// followed by one more token. Returns no pairs when `tokens.len() <= order`.
pub fn make_pairs<T>(tokens: &[T], order: usize) -> Vec<(&[T], &T)> {
	tokens
		.windows(order + 1)
		.map(|window| (&window[..order], &window[order]))
		.collect()
}

/// Builds a sequence made of `count` copies of `token`.
pub fn repeat_token(token: &str, count: usize) -> Vec<String> {
	vec![token.to_owned(); count]
}

/// Surrounds `tokens` with `order` start sentinels and one end sentinel.
pub fn pad<S: AsRef<str>>(tokens: &[S], order: usize) -> Vec<String> {
	let mut padded = repeat_token(START_TOKEN, order);
	padded.reserve(tokens.len() + 1);
	padded.extend(tokens.iter().map(|token| token.as_ref().to_owned()));
	padded.extend(repeat_token(END_TOKEN, 1));
	padded
}

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Compact identifier assigned to a token by a [`SymbolPool`].
///
/// Ids are dense and assigned in first-seen order, starting at 0.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct TokenId(pub u32);

impl TokenId {
	/// Converts a dense index into an id, or `None` if it does not fit in a `u32`.
	#[inline]
	pub fn try_from_usize(index: usize) -> Option<Self> {
		u32::try_from(index).ok().map(TokenId)
	}

	/// Converts a dense pool index into an id.
	///
	/// Pool indices stay below `u32::MAX`; overflow is only checked in debug builds.
	#[inline]
	pub fn from_usize(index: usize) -> Self {
		debug_assert!(index <= u32::MAX as usize, "TokenId overflow: {index}");
		TokenId(index as u32)
	}

	/// Converts the id back into an index into the pool.
	#[inline]
	pub fn as_usize(self) -> usize {
		self.0 as usize
	}
}

/// Bidirectional registry between token strings and dense [`TokenId`]s.
///
/// The forward direction is a hash map, the reverse direction a plain vector
/// indexed by id, since ids are dense and sequential.
///
/// # Invariants
/// - Every registered token maps to exactly one id and vice versa
/// - Ids are never reused or reassigned; the pool only grows
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolPool {
	/// Token for each id. `tokens[id.as_usize()]` is the token of `id`.
	tokens: Vec<String>,
	/// Reverse lookup from token to its id.
	ids: HashMap<String, TokenId>,
}

impl SymbolPool {
	/// Creates an empty pool.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `token` if needed and returns its id.
	///
	/// Idempotent: a token already in the pool keeps the id it was given the
	/// first time. New tokens get the next sequential id (the pool size before
	/// insertion).
	pub fn add(&mut self, token: &str) -> TokenId {
		if let Some(id) = self.ids.get(token) {
			return *id;
		}
		let id = TokenId::from_usize(self.tokens.len());
		self.tokens.push(token.to_owned());
		self.ids.insert(token.to_owned(), id);
		id
	}

	/// Looks up `token` without registering it.
	pub fn get(&self, token: &str) -> Option<TokenId> {
		self.ids.get(token).copied()
	}

	/// Resolves an id back to its token.
	///
	/// Returns `None` for ids this pool never handed out.
	pub fn resolve(&self, id: TokenId) -> Option<&str> {
		self.tokens.get(id.as_usize()).map(String::as_str)
	}

	/// Number of registered tokens.
	#[inline]
	pub fn len(&self) -> usize {
		self.tokens.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}

	/// Iterates over `(id, token)` in id order.
	pub fn iter(&self) -> impl Iterator<Item = (TokenId, &str)> {
		self.tokens
			.iter()
			.enumerate()
			.map(|(index, token)| (TokenId::from_usize(index), token.as_str()))
	}
}

// Only the dense token list is written out. The forward map is rebuilt on
// load so a decoded pool is a bijection even if the input repeats tokens.
impl Serialize for SymbolPool {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.tokens.serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for SymbolPool {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let tokens = Vec::<String>::deserialize(deserializer)?;
		if !tokens.is_empty() && TokenId::try_from_usize(tokens.len() - 1).is_none() {
			return Err(serde::de::Error::custom(format!("pool too large: {} tokens", tokens.len())));
		}
		let mut pool = SymbolPool::new();
		for token in &tokens {
			if pool.get(token).is_some() {
				return Err(serde::de::Error::custom(format!("duplicate token in pool: {token}")));
			}
			pool.add(token);
		}
		Ok(pool)
	}
}

use log::debug;

use super::chain::Chain;
use super::ngram::{END_TOKEN, START_TOKEN};
use super::rng::DrawSource;
use crate::error::ChainError;

/// Default cap on the number of generated tokens.
pub const DEFAULT_MAX_TOKENS: usize = 256;

/// Drives a [`Chain`] over a whole sequence.
///
/// The chain only ever advances one step. The generator slides the state
/// window forward by each generated token and keeps stepping until the chain
/// says stop (empty token or end sentinel) or `max_tokens` is reached.
///
/// # Example
/// ```
/// use markov_core::model::chain::Chain;
/// use markov_core::model::generator::Generator;
/// use markov_core::model::rng::ScriptedDraws;
///
/// let mut chain = Chain::new(1);
/// chain.add(&["hello", "world"]);
///
/// let words = Generator::new(&chain).walk(None::<&[&str]>, &mut ScriptedDraws::default()).unwrap();
/// assert_eq!(words, vec!["hello", "world"]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Generator<'a> {
	chain: &'a Chain,
	max_tokens: usize,
}

impl<'a> Generator<'a> {
	pub fn new(chain: &'a Chain) -> Self {
		Self { chain, max_tokens: DEFAULT_MAX_TOKENS }
	}

	/// Caps the number of generated tokens. 0 means no cap.
	pub fn max_tokens(mut self, max_tokens: usize) -> Self {
		self.max_tokens = max_tokens;
		self
	}

	/// Generates tokens starting from `seed`, or from the chain's initial
	/// state when `seed` is `None`.
	///
	/// The returned tokens exclude the seed and the end sentinel.
	///
	/// # Errors
	/// Propagates the chain's errors: a seed of the wrong length, or a state
	/// the chain never observed.
	pub fn walk<S, D>(&self, seed: Option<&[S]>, source: &mut D) -> Result<Vec<String>, ChainError>
	where
		S: AsRef<str>,
		D: DrawSource + ?Sized,
	{
		let mut state: Vec<String> = match seed {
			Some(seed) => seed.iter().map(|token| token.as_ref().to_owned()).collect(),
			None => self.chain.initial_state(),
		};

		let mut generated: Vec<String> = Vec::new();
		while self.max_tokens == 0 || generated.len() < self.max_tokens {
			let next = self.chain.generate_deterministic(&state, source)?;
			if next.is_empty() || next == END_TOKEN {
				break;
			}
			if !state.is_empty() {
				state.remove(0);
			}
			state.push(next.clone());
			generated.push(next);
		}

		debug!("generated {} tokens", generated.len());
		Ok(generated)
	}

	/// Generates a space-joined sentence.
	///
	/// Seed tokens other than the start sentinel are kept at the front.
	pub fn sentence<S, D>(&self, seed: Option<&[S]>, source: &mut D) -> Result<String, ChainError>
	where
		S: AsRef<str>,
		D: DrawSource + ?Sized,
	{
		let generated = self.walk(seed, source)?;
		let words: Vec<&str> = seed
			.unwrap_or_default()
			.iter()
			.map(|token| token.as_ref())
			.filter(|token| *token != START_TOKEN)
			.chain(generated.iter().map(String::as_str))
			.collect();
		Ok(words.join(" "))
	}
}

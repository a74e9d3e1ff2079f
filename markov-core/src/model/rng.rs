use rand::{Rng, RngCore};

/// Source of uniform integer draws used when sampling a transition.
///
/// Any `rand` generator is a draw source. [`ScriptedDraws`] replays a fixed
/// list of values, which makes generation reproducible.
pub trait DrawSource {
	/// Returns an integer in `[0, bound)`. A `bound` of 0 yields 0.
	fn draw(&mut self, bound: u64) -> u64;
}

impl<R: RngCore> DrawSource for R {
	fn draw(&mut self, bound: u64) -> u64 {
		if bound == 0 {
			return 0;
		}
		self.random_range(0..bound)
	}
}

/// Draw source replaying a scripted sequence of values.
///
/// Each value is reduced modulo the requested bound. Once the script is
/// exhausted every draw returns 0.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDraws {
	values: Vec<u64>,
	position: usize,
}

impl ScriptedDraws {
	pub fn new<I: IntoIterator<Item = u64>>(values: I) -> Self {
		Self { values: values.into_iter().collect(), position: 0 }
	}

	/// Number of scripted values not yet consumed.
	pub fn remaining(&self) -> usize {
		self.values.len().saturating_sub(self.position)
	}
}

impl DrawSource for ScriptedDraws {
	fn draw(&mut self, bound: u64) -> u64 {
		let value = self.values.get(self.position).copied().unwrap_or(0);
		self.position += 1;
		if bound == 0 { 0 } else { value % bound }
	}
}

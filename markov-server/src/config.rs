use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use log::warn;
use markov_core::io::normalize_folder;
use markov_core::model::generator::DEFAULT_MAX_TOKENS;

/// Server settings, read from `MARKOV_*` environment variables.
///
/// | Variable               | Default          |
/// |------------------------|------------------|
/// | `MARKOV_BIND`          | `127.0.0.1:5000` |
/// | `MARKOV_DATA_DIR`      | `./data`         |
/// | `MARKOV_DEFAULT_ORDER` | `2`              |
/// | `MARKOV_MAX_TOKENS`    | `256`            |
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
	pub bind: SocketAddr,
	/// Directory holding the `.txt` corpora.
	pub data_dir: PathBuf,
	/// Order used when a request does not give one.
	pub default_order: usize,
	/// Upper bound on generated tokens per request. Always positive.
	pub max_tokens: usize,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
			data_dir: PathBuf::from("./data"),
			default_order: 2,
			max_tokens: DEFAULT_MAX_TOKENS,
		}
	}
}

impl ServerConfig {
	pub fn from_env() -> Self {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Builds the configuration from an arbitrary variable lookup.
	///
	/// Unset variables keep their default; unparsable ones are logged and
	/// keep their default too.
	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		let defaults = Self::default();
		Self {
			bind: parse_or(&lookup, "MARKOV_BIND", defaults.bind),
			data_dir: lookup("MARKOV_DATA_DIR").map(|dir| normalize_folder(&dir)).unwrap_or(defaults.data_dir),
			default_order: parse_or(&lookup, "MARKOV_DEFAULT_ORDER", defaults.default_order).max(1),
			max_tokens: match parse_or(&lookup, "MARKOV_MAX_TOKENS", defaults.max_tokens) {
				0 => {
					warn!("MARKOV_MAX_TOKENS must be positive, using {}", defaults.max_tokens);
					defaults.max_tokens
				}
				n => n,
			},
		}
	}
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
	F: Fn(&str) -> Option<String>,
	T: FromStr,
{
	match lookup(key) {
		None => default,
		Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
			warn!("ignoring invalid {key}={raw:?}");
			default
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		move |key| vars.get(key).cloned()
	}

	#[test]
	fn defaults_when_unset() {
		assert_eq!(ServerConfig::from_lookup(lookup(&[])), ServerConfig::default());
	}

	#[test]
	fn reads_every_variable() {
		let config = ServerConfig::from_lookup(lookup(&[
			("MARKOV_BIND", "0.0.0.0:8080"),
			("MARKOV_DATA_DIR", "/srv/corpora"),
			("MARKOV_DEFAULT_ORDER", "3"),
			("MARKOV_MAX_TOKENS", "10"),
		]));
		assert_eq!(config.bind, SocketAddr::from(([0, 0, 0, 0], 8080)));
		assert_eq!(config.data_dir, PathBuf::from("/srv/corpora"));
		assert_eq!(config.default_order, 3);
		assert_eq!(config.max_tokens, 10);
	}

	#[test]
	fn invalid_values_fall_back() {
		let config = ServerConfig::from_lookup(lookup(&[("MARKOV_BIND", "nowhere"), ("MARKOV_MAX_TOKENS", "-4")]));
		assert_eq!(config.bind, ServerConfig::default().bind);
		assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
	}

	#[test]
	fn zero_max_tokens_keeps_the_default() {
		let config = ServerConfig::from_lookup(lookup(&[("MARKOV_MAX_TOKENS", "0")]));
		assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
	}

	#[test]
	fn order_zero_is_coerced() {
		let config = ServerConfig::from_lookup(lookup(&[("MARKOV_DEFAULT_ORDER", "0")]));
		assert_eq!(config.default_order, 1);
	}
}

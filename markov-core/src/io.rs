use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use log::{debug, warn};

use crate::error::PersistError;
use crate::model::chain::Chain;

/// Extension of corpus files: one token sequence per line.
pub const CORPUS_EXTENSION: &str = "txt";

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub fn read_lines<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Splits a line into whitespace-separated tokens.
///
/// Tokens are kept verbatim (no case folding, no punctuation handling).
pub fn tokenize(line: &str) -> Vec<String> {
	line.split_whitespace().map(str::to_owned).collect()
}

/// Tokenizes every line of `text`, skipping blank lines.
pub fn tokenize_lines(text: &str) -> Vec<Vec<String>> {
	text.lines().map(tokenize).filter(|tokens| !tokens.is_empty()).collect()
}

/// Reads a corpus file: one tokenized sequence per non-blank line.
pub fn read_corpus<P: AsRef<Path>>(filename: P) -> io::Result<Vec<Vec<String>>> {
	Ok(read_lines(filename)?
		.iter()
		.map(|line| tokenize(line))
		.filter(|tokens| !tokens.is_empty())
		.collect())
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/input.txt` + `"bin"` → `data/input.bin`
pub fn build_output_path<P: AsRef<Path>>(input_path: P, output_extension: &str) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Normalize a folder path.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub fn normalize_folder(input: &str) -> PathBuf {
	if input == "." || input == "./" {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		PathBuf::from(input)
	}
}

/// Lists all files with a given extension in a directory.
///
/// Returns file names only (no paths), sorted.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<String>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}

	files.sort();
	Ok(files)
}

/// Path of the binary cache of a corpus trained at `order`.
///
/// `data/poems.txt` at order 2 → `data/poems.o2.bin`
pub fn cache_path<P: AsRef<Path>>(corpus_path: P, order: usize) -> io::Result<PathBuf> {
	build_output_path(corpus_path, &format!("o{order}.bin"))
}

/// Loads the chain of a corpus file.
///
/// If a binary cache exists next to the corpus it is decoded, otherwise the
/// corpus is read, trained in parallel and the cache is written for the next
/// load. A cache that fails to decode is rebuilt; failing to write the cache
/// is not fatal.
pub fn load_corpus<P: AsRef<Path>>(corpus_path: P, order: usize) -> Result<Chain, PersistError> {
	let order = order.max(1);
	let binary_path = cache_path(&corpus_path, order)?;

	if binary_path.exists() {
		match Chain::load(&binary_path) {
			Ok(chain) if chain.order() == order => return Ok(chain),
			Ok(chain) => warn!("cache {} has order {}, rebuilding", binary_path.display(), chain.order()),
			Err(e) => warn!("cache {} unreadable ({e}), rebuilding", binary_path.display()),
		}
	}

	let sequences = read_corpus(&corpus_path)?;
	debug!("read {} sequences from {}", sequences.len(), corpus_path.as_ref().display());
	let chain = Chain::train_parallel(&sequences, order);

	if let Err(e) = chain.save(&binary_path) {
		warn!("could not write cache {}: {e}", binary_path.display());
	}
	Ok(chain)
}

//! Ordered, comment-preserving env-file model
//!
//! An [`EnvFile`] keeps variables in the insertion order of their first
//! occurrence, remembers each variable's source line for round-trip
//! serialization, and stores standalone comments keyed by line number.

pub mod parser;
pub mod streaming;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::error::{file_read_error, file_write_error, EnvyResult};
use self::parser::{parse_line, quote_value, ParsedLine};

pub use self::parser::is_identifier;
pub use self::streaming::{StreamingParser, StreamingOptions};

/// A single `KEY=VALUE` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
	/// Identifier matching `[A-Za-z_][A-Za-z0-9_]*`
	pub key: String,
	/// Unquoted value
	pub value: String,
	/// Trailing inline comment without the leading `#`
	pub comment: String,
	/// Source line number (1-based); assigned past the end for new keys
	pub line: usize,
}

/// Ordered mapping of variables plus standalone comments
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
	variables: HashMap<String, Variable>,
	/// Key order: insertion order of first occurrence
	order: Vec<String>,
	/// Standalone comments keyed by source line number
	comments: BTreeMap<usize, String>,
	/// Keys that appeared more than once during parsing
	duplicates: Vec<String>,
	/// Highest line number seen, for appending new entries
	max_line: usize,
}

impl EnvFile {
	/// Create an empty file
	pub fn new() -> Self {
		EnvFile::default()
	}

	/// Parse env-file content
	///
	/// Unknown line forms are skipped; the parse itself never fails.
	/// Duplicate keys keep their first line number but take the last
	/// value; the affected keys are reported by [`EnvFile::duplicates`].
	pub fn parse_str(content: &str) -> Self {
		let mut file = EnvFile::new();
		for (idx, raw) in content.lines().enumerate() {
			let line_no = idx + 1;
			file.max_line = line_no;
			match parse_line(raw) {
				ParsedLine::Blank | ParsedLine::Other => {}
				ParsedLine::Comment(text) => {
					file.comments.insert(line_no, text);
				}
				ParsedLine::Assignment { key, value, comment } => {
					file.insert_parsed(key, value, comment, line_no);
				}
			}
		}
		file
	}

	/// Load and parse a file from disk
	pub fn load(path: impl AsRef<Path>) -> EnvyResult<Self> {
		let path = path.as_ref();
		let content = fs::read_to_string(path)
			.map_err(|e| file_read_error(path.display(), e))?;
		Ok(EnvFile::parse_str(&content))
	}

	fn insert_parsed(&mut self, key: String, value: String, comment: String, line: usize) {
		match self.variables.get_mut(&key) {
			Some(existing) => {
				// Duplicate: first line wins, last value wins
				existing.value = value;
				if !comment.is_empty() {
					existing.comment = comment;
				}
				if !self.duplicates.contains(&key) {
					self.duplicates.push(key);
				}
			}
			None => {
				self.order.push(key.clone());
				self.variables.insert(key.clone(), Variable { key, value, comment, line });
			}
		}
	}

	/// Look up a variable's value
	pub fn get(&self, key: &str) -> Option<&str> {
		self.variables.get(key).map(|v| v.value.as_str())
	}

	/// Look up the full variable entry
	pub fn get_variable(&self, key: &str) -> Option<&Variable> {
		self.variables.get(key)
	}

	/// Set a value
	///
	/// An existing key is updated in place without changing its order or
	/// source line; a new key is appended at the end.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.set_with_comment(key, value, "")
	}

	/// Set a value with an inline comment
	pub fn set_with_comment(
		&mut self,
		key: impl Into<String>,
		value: impl Into<String>,
		comment: impl Into<String>,
	) {
		let key = key.into();
		let value = value.into();
		let comment = comment.into();
		match self.variables.get_mut(&key) {
			Some(existing) => {
				existing.value = value;
				if !comment.is_empty() {
					existing.comment = comment;
				}
			}
			None => {
				self.max_line += 1;
				self.order.push(key.clone());
				self.variables
					.insert(key.clone(), Variable { key, value, comment, line: self.max_line });
			}
		}
	}

	/// Remove a variable from both the map and the order
	pub fn delete(&mut self, key: &str) -> bool {
		if self.variables.remove(key).is_some() {
			self.order.retain(|k| k != key);
			true
		} else {
			false
		}
	}

	/// Overlay another file's values onto this one
	///
	/// Iterates `other` in its order. Values of shared keys are
	/// overwritten; a non-empty comment from `other` is adopted when this
	/// side has none. Key order here is unchanged; new keys are appended.
	pub fn merge(&mut self, other: &EnvFile) {
		for key in other.keys() {
			let theirs = &other.variables[key];
			match self.variables.get_mut(key) {
				Some(ours) => {
					ours.value = theirs.value.clone();
					if ours.comment.is_empty() && !theirs.comment.is_empty() {
						ours.comment = theirs.comment.clone();
					}
				}
				None => {
					self.max_line += 1;
					self.order.push(key.clone());
					self.variables.insert(
						key.clone(),
						Variable {
							key: key.clone(),
							value: theirs.value.clone(),
							comment: theirs.comment.clone(),
							line: self.max_line,
						},
					);
				}
			}
		}
	}

	/// Keys in insertion order
	pub fn keys(&self) -> impl Iterator<Item = &String> {
		self.order.iter()
	}

	/// Variables in insertion order
	pub fn iter(&self) -> impl Iterator<Item = &Variable> {
		self.order.iter().filter_map(move |k| self.variables.get(k))
	}

	/// Number of variables
	pub fn len(&self) -> usize {
		self.order.len()
	}

	/// Whether the file holds no variables
	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	/// Keys that occurred more than once in the parsed input
	pub fn duplicates(&self) -> &[String] {
		&self.duplicates
	}

	/// Key/value snapshot, sorted by key
	pub fn to_map(&self) -> BTreeMap<String, String> {
		self.iter().map(|v| (v.key.clone(), v.value.clone())).collect()
	}

	/// Serialize back to env-file text
	///
	/// Lines are emitted in ascending source line number, interleaving
	/// standalone comments with assignments.
	pub fn to_string(&self) -> String {
		#[derive(Debug)]
		enum Item<'a> {
			Comment(&'a str),
			Var(&'a Variable),
		}

		let mut items: Vec<(usize, Item<'_>)> = Vec::new();
		for (line, text) in &self.comments {
			items.push((*line, Item::Comment(text)));
		}
		for var in self.iter() {
			items.push((var.line, Item::Var(var)));
		}
		items.sort_by_key(|(line, _)| *line);

		let mut out = String::new();
		for (_, item) in items {
			match item {
				Item::Comment(text) => {
					out.push_str("# ");
					out.push_str(text);
					out.push('\n');
				}
				Item::Var(var) => {
					out.push_str(&var.key);
					out.push('=');
					out.push_str(&quote_value(&var.value));
					if !var.comment.is_empty() {
						out.push_str(" # ");
						out.push_str(&var.comment);
					}
					out.push('\n');
				}
			}
		}
		out
	}

	/// Write to disk with mode 0600
	#[cfg(unix)]
	pub fn write(&self, path: impl AsRef<Path>) -> EnvyResult<()> {
		use std::io::Write;
		use std::os::unix::fs::OpenOptionsExt;
		let path = path.as_ref();
		let mut file = fs::OpenOptions::new()
			.write(true)
			.create(true)
			.truncate(true)
			.mode(0o600)
			.open(path)
			.map_err(|e| file_write_error(path.display(), e))?;
		file.write_all(self.to_string().as_bytes())
			.map_err(|e| file_write_error(path.display(), e))?;
		// mode() only applies on creation; force it for pre-existing files
		use std::os::unix::fs::PermissionsExt;
		fs::set_permissions(path, fs::Permissions::from_mode(0o600))
			.map_err(|e| file_write_error(path.display(), e))
	}

	/// Write to disk
	#[cfg(not(unix))]
	pub fn write(&self, path: impl AsRef<Path>) -> EnvyResult<()> {
		let path = path.as_ref();
		fs::write(path, self.to_string()).map_err(|e| file_write_error(path.display(), e))
	}
}


// vim: ts=4

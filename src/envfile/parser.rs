//! Line grammar for env files
//!
//! The format is line-oriented: blank lines, standalone comments,
//! `KEY=VALUE` assignments with an optional trailing inline comment,
//! and anything else, which is skipped without failing the parse.

/// One classified input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
	/// Empty or whitespace-only line
	Blank,
	/// `# ...` line; payload is the trimmed comment text
	Comment(String),
	/// `KEY=VALUE` assignment
	Assignment {
		key: String,
		value: String,
		/// Trailing inline comment without the leading `#`
		comment: String,
	},
	/// Unrecognized line form, skipped by callers
	Other,
}

/// Classify a single line
pub fn parse_line(line: &str) -> ParsedLine {
	let trimmed = line.trim();
	if trimmed.is_empty() {
		return ParsedLine::Blank;
	}
	if let Some(rest) = trimmed.strip_prefix('#') {
		return ParsedLine::Comment(rest.trim().to_string());
	}

	let eq = match trimmed.find('=') {
		Some(pos) => pos,
		None => return ParsedLine::Other,
	};
	let key = trimmed[..eq].trim();
	if !is_identifier(key) {
		return ParsedLine::Other;
	}

	let raw_value = trimmed[eq + 1..].trim_start();
	let (value_part, comment) = split_inline_comment(raw_value);
	let value = unquote(value_part.trim_end());

	ParsedLine::Assignment { key: key.to_string(), value, comment }
}

/// Check the `[A-Za-z_][A-Za-z0-9_]*` identifier shape
pub fn is_identifier(name: &str) -> bool {
	let mut chars = name.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
		_ => return false,
	}
	chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a raw value at the first ` #` occurrence
///
/// The separator is the literal two-character sequence, so a quoted
/// value containing `" #"` is truncated at it. This matches the
/// documented extraction rule.
fn split_inline_comment(raw: &str) -> (&str, String) {
	match raw.find(" #") {
		Some(pos) => {
			let comment = raw[pos + 2..].trim_start_matches('#').trim().to_string();
			(&raw[..pos], comment)
		}
		None => (raw, String::new()),
	}
}

/// Strip one pair of matching surrounding quotes
///
/// Escaped `\"` inside a double-quoted value is unescaped so that
/// written files read back to the same value.
fn unquote(value: &str) -> String {
	let bytes = value.as_bytes();
	if bytes.len() >= 2 {
		if bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
			return value[1..value.len() - 1].replace("\\\"", "\"");
		}
		if bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'' {
			return value[1..value.len() - 1].to_string();
		}
	}
	value.to_string()
}

/// Quote a value for serialization when it needs quoting
///
/// A value is quoted iff it contains whitespace, `#`, `"`, `'`, or is
/// empty. Embedded double quotes are escaped as `\"`.
pub fn quote_value(value: &str) -> String {
	let needs_quoting = value.is_empty()
		|| value.chars().any(|c| c.is_whitespace() || c == '#' || c == '"' || c == '\'');
	if needs_quoting {
		format!("\"{}\"", value.replace('"', "\\\""))
	} else {
		value.to_string()
	}
}


// vim: ts=4

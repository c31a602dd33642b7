//! Env-file parsing and serialization scenarios
//!
//! Covers the documented round-trip guarantees: key order and values
//! survive a parse/serialize/parse cycle, standalone comments
//! round-trip exactly, and inline comments are preserved best-effort.

use envy::envfile::{EnvFile, StreamingParser};
use tokio_util::sync::CancellationToken;

#[test]
fn test_round_trip_parse_scenario() {
	let input = "# top\nA=1\nB=\"two words\" # inline\nC=\n";
	let file = EnvFile::parse_str(input);

	let keys: Vec<_> = file.keys().cloned().collect();
	assert_eq!(keys, vec!["A", "B", "C"]);
	assert_eq!(file.get("A"), Some("1"));
	assert_eq!(file.get("B"), Some("two words"));
	assert_eq!(file.get_variable("B").unwrap().comment, "inline");
	assert_eq!(file.get("C"), Some(""));

	let serialized = file.to_string();
	let lines: Vec<&str> = serialized.lines().collect();
	assert_eq!(lines, vec!["# top", "A=1", "B=\"two words\" # inline", "C=\"\""]);
}

#[test]
fn test_parse_serialize_parse_is_stable() {
	let input = "\
# database settings
DB_HOST=localhost
DB_PORT=5432
DB_PASSWORD=\"p@ss word\" # rotate quarterly

# feature flags
FEATURE_X=true
EMPTY=
QUOTED='single'
";
	let first = EnvFile::parse_str(input);
	let second = EnvFile::parse_str(&first.to_string());

	assert_eq!(
		first.keys().collect::<Vec<_>>(),
		second.keys().collect::<Vec<_>>()
	);
	assert_eq!(first.to_map(), second.to_map());
	// Standalone comments round-trip exactly
	assert!(second.to_string().contains("# database settings"));
	assert!(second.to_string().contains("# feature flags"));
}

#[test]
fn test_values_needing_quotes_survive() {
	let mut file = EnvFile::new();
	file.set("SPACES", "a b c");
	file.set("HASH", "left#right");
	file.set("QUOTE", "say \"hi\"");
	file.set("EMPTY", "");

	let reparsed = EnvFile::parse_str(&file.to_string());
	assert_eq!(reparsed.get("SPACES"), Some("a b c"));
	assert_eq!(reparsed.get("HASH"), Some("left#right"));
	assert_eq!(reparsed.get("QUOTE"), Some("say \"hi\""));
	assert_eq!(reparsed.get("EMPTY"), Some(""));
}

#[test]
fn test_merge_properties_on_key_values() {
	let a = EnvFile::parse_str("A=1\nB=2\n");
	let b = EnvFile::parse_str("B=20\nC=30\n");
	let c = EnvFile::parse_str("C=300\nD=400\n");
	let empty = EnvFile::new();

	// Identity
	let mut left = a.clone();
	left.merge(&empty);
	assert_eq!(left.to_map(), a.to_map());
	let mut right = EnvFile::new();
	right.merge(&a);
	assert_eq!(right.to_map(), a.to_map());

	// Associativity on key -> value
	let mut ab_c = {
		let mut ab = a.clone();
		ab.merge(&b);
		ab
	};
	ab_c.merge(&c);

	let mut a_bc = a.clone();
	let bc = {
		let mut bc = b.clone();
		bc.merge(&c);
		bc
	};
	a_bc.merge(&bc);

	assert_eq!(ab_c.to_map(), a_bc.to_map());
}

#[tokio::test]
async fn test_streaming_matches_materialized_parse() {
	let input = "# header\nA=1\nB=\"two words\" # x\n\nnot a var\nC=3\n";

	let materialized = EnvFile::parse_str(input);
	let parser = StreamingParser::new();
	let cancel = CancellationToken::new();

	let mut streamed = EnvFile::new();
	let count = parser
		.parse(input.as_bytes(), &cancel, |var| {
			streamed.set_with_comment(var.key, var.value, var.comment);
			Ok(())
		})
		.await
		.unwrap();

	assert_eq!(count, materialized.len());
	assert_eq!(streamed.to_map(), materialized.to_map());
	assert_eq!(
		streamed.keys().collect::<Vec<_>>(),
		materialized.keys().collect::<Vec<_>>()
	);
}

#[cfg(unix)]
#[test]
fn test_written_file_is_private() {
	use std::os::unix::fs::PermissionsExt;
	let dir = tempfile::TempDir::new().unwrap();
	let path = dir.path().join(".env");

	let file = EnvFile::parse_str("A=1\nTOKEN=abc\n");
	file.write(&path).unwrap();

	let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
	assert_eq!(mode, 0o600);

	let reloaded = EnvFile::load(&path).unwrap();
	assert_eq!(reloaded.to_map(), file.to_map());
}

// vim: ts=4

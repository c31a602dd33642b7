//! Difference between two variable snapshots
//!
//! Partitions the union of keys into added, modified, unchanged, and
//! deleted, read as the change from `from` to `to`.

use std::collections::BTreeMap;

/// Result of diffing two snapshots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
	/// Present only in `to`
	pub added: BTreeMap<String, String>,
	/// Present in both with different values: `name -> (old, new)`
	pub modified: BTreeMap<String, (String, String)>,
	/// Present in both with equal values
	pub unchanged: BTreeMap<String, String>,
	/// Present only in `from`
	pub deleted: BTreeMap<String, String>,
}

impl DiffResult {
	pub fn is_empty(&self) -> bool {
		self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
	}

	/// Number of entries that differ
	pub fn change_count(&self) -> usize {
		self.added.len() + self.modified.len() + self.deleted.len()
	}
}

/// Compute the change from `from` to `to`
pub fn diff(from: &BTreeMap<String, String>, to: &BTreeMap<String, String>) -> DiffResult {
	let mut result = DiffResult::default();

	for (key, new_value) in to {
		match from.get(key) {
			None => {
				result.added.insert(key.clone(), new_value.clone());
			}
			Some(old_value) if old_value != new_value => {
				result.modified.insert(key.clone(), (old_value.clone(), new_value.clone()));
			}
			Some(_) => {
				result.unchanged.insert(key.clone(), new_value.clone());
			}
		}
	}

	for (key, old_value) in from {
		if !to.contains_key(key) {
			result.deleted.insert(key.clone(), old_value.clone());
		}
	}

	result
}


// vim: ts=4

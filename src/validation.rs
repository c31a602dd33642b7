//! Rule-driven validation of env variables
//!
//! Validation is pure: the same variables and rules always produce the
//! same outcome. Problems are returned as data, split into errors,
//! warnings, and applicable auto-fixes; nothing here fails the call
//! that requested the validation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value type a rule enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RuleType {
	#[default]
	String,
	Int,
	Float,
	Bool,
	Url,
	Email,
	Json,
}

/// Constraints for one variable
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Rule {
	#[serde(rename = "type")]
	pub kind: RuleType,
	/// Regex the value must match
	pub pattern: Option<String>,
	/// Lower bound, int/float only
	pub min: Option<f64>,
	/// Upper bound, int/float only
	pub max: Option<f64>,
	/// Allowed values (case-sensitive)
	pub allowed: Option<Vec<String>>,
	pub required: bool,
	/// Default offered as a fix for missing/undefined variables
	pub default: Option<String>,
}

/// A validation schema: rules, extra required names, deprecations
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleSet {
	pub rules: BTreeMap<String, Rule>,
	/// Names required even without a rule entry
	pub required: Vec<String>,
	/// Deprecated names mapped to their replacement note
	pub deprecated: BTreeMap<String, String>,
}

/// Category of a single finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
	MissingRequired,
	TypeError,
	PatternError,
	EnumError,
	RangeError,
	Deprecated,
	Undefined,
}

/// One finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
	pub variable: String,
	pub kind: IssueKind,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<String>,
}

/// Kind of applicable auto-fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixKind {
	SetDefault,
	Remove,
}

/// One applicable auto-fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
	pub variable: String,
	pub kind: FixKind,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<String>,
	pub description: String,
}

/// Everything a validation run found
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
	pub errors: Vec<Issue>,
	pub warnings: Vec<Issue>,
	pub fixes: Vec<Fix>,
}

impl ValidationOutcome {
	pub fn is_valid(&self) -> bool {
		self.errors.is_empty()
	}
}

/// Well-known variable names that warrant an `undefined` warning when
/// present without a rule
const COMMON_VARIABLE_NAMES: &[&str] = &[
	"DATABASE_URL",
	"REDIS_URL",
	"API_KEY",
	"SECRET_KEY",
	"PORT",
	"HOST",
	"NODE_ENV",
	"ENVIRONMENT",
	"DEBUG",
	"LOG_LEVEL",
	"AWS_REGION",
	"AWS_ACCESS_KEY_ID",
	"AWS_SECRET_ACCESS_KEY",
];

/// Suffixes that mark a name as worth defining a rule for
const COMMON_VARIABLE_SUFFIXES: &[&str] =
	&["_key", "_secret", "_token", "_url", "_host", "_port"];

fn looks_common(name: &str) -> bool {
	COMMON_VARIABLE_NAMES.contains(&name)
		|| COMMON_VARIABLE_SUFFIXES.iter().any(|s| name.to_lowercase().ends_with(s))
}

/// Validate variables against a rule set
pub fn validate(vars: &BTreeMap<String, String>, rules: &RuleSet) -> ValidationOutcome {
	let mut outcome = ValidationOutcome::default();

	// Required names: the explicit list plus rules flagged required
	let mut required: Vec<&String> = rules.required.iter().collect();
	for (name, rule) in &rules.rules {
		if rule.required && !rules.required.contains(name) {
			required.push(name);
		}
	}
	required.sort();
	required.dedup();

	for name in required {
		if !vars.contains_key(name) {
			outcome.errors.push(Issue {
				variable: name.clone(),
				kind: IssueKind::MissingRequired,
				message: format!("Required variable '{}' is missing", name),
				details: None,
			});
			if let Some(default) = rules.rules.get(name).and_then(|r| r.default.clone()) {
				outcome.fixes.push(Fix {
					variable: name.clone(),
					kind: FixKind::SetDefault,
					description: format!("Set '{}' to its default '{}'", name, default),
					value: Some(default),
				});
			}
		}
	}

	// Per-variable checks, in rule order for determinism
	for (name, rule) in &rules.rules {
		let value = match vars.get(name) {
			Some(value) => value,
			None => {
				// Missing optional variable with a default: offer the fix
				if !rule.required && !rules.required.contains(name) {
					if let Some(default) = &rule.default {
						outcome.fixes.push(Fix {
							variable: name.clone(),
							kind: FixKind::SetDefault,
							description: format!(
								"Set '{}' to its default '{}'",
								name, default
							),
							value: Some(default.clone()),
						});
					}
				}
				continue;
			}
		};

		if let Some(issue) = check_type(name, value, rule.kind) {
			outcome.errors.push(issue);
			continue;
		}
		if let Some(issue) = check_pattern(name, value, rule.pattern.as_deref()) {
			outcome.errors.push(issue);
			continue;
		}
		if let Some(issue) = check_enum(name, value, rule.allowed.as_deref()) {
			outcome.errors.push(issue);
			continue;
		}
		if let Some(issue) = check_range(name, value, rule) {
			outcome.errors.push(issue);
		}
	}

	// Deprecations
	for (name, note) in &rules.deprecated {
		if vars.contains_key(name) {
			outcome.warnings.push(Issue {
				variable: name.clone(),
				kind: IssueKind::Deprecated,
				message: format!("Variable '{}' is deprecated", name),
				details: if note.is_empty() { None } else { Some(note.clone()) },
			});
			outcome.fixes.push(Fix {
				variable: name.clone(),
				kind: FixKind::Remove,
				value: None,
				description: format!("Remove deprecated variable '{}'", name),
			});
		}
	}

	// Common-looking variables with no rule
	for name in vars.keys() {
		if !rules.rules.contains_key(name)
			&& !rules.deprecated.contains_key(name)
			&& looks_common(name)
		{
			outcome.warnings.push(Issue {
				variable: name.clone(),
				kind: IssueKind::Undefined,
				message: format!("Variable '{}' has no validation rule", name),
				details: None,
			});
		}
	}

	outcome
}

fn type_error(name: &str, value: &str, expected: &str) -> Issue {
	Issue {
		variable: name.to_string(),
		kind: IssueKind::TypeError,
		message: format!("'{}' is not a valid {} for '{}'", value, expected, name),
		details: None,
	}
}

fn check_type(name: &str, value: &str, kind: RuleType) -> Option<Issue> {
	match kind {
		RuleType::String => None,
		RuleType::Int => value.parse::<i64>().err().map(|_| type_error(name, value, "integer")),
		RuleType::Float => value.parse::<f64>().err().map(|_| type_error(name, value, "number")),
		RuleType::Bool => {
			if matches!(value, "true" | "false" | "1" | "0" | "TRUE" | "FALSE") {
				None
			} else {
				Some(type_error(name, value, "boolean"))
			}
		}
		RuleType::Url => match url::Url::parse(value) {
			Ok(parsed) if parsed.has_host() => None,
			_ => Some(type_error(name, value, "URL")),
		},
		RuleType::Email => {
			// RFC 5322 lite: local part, one @, dotted domain
			let ok = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
				.map(|re| re.is_match(value))
				.unwrap_or(false);
			if ok {
				None
			} else {
				Some(type_error(name, value, "email address"))
			}
		}
		RuleType::Json => serde_json::from_str::<serde_json::Value>(value)
			.err()
			.map(|_| type_error(name, value, "JSON value")),
	}
}

fn check_pattern(name: &str, value: &str, pattern: Option<&str>) -> Option<Issue> {
	let pattern = pattern?;
	match Regex::new(pattern) {
		Ok(re) if re.is_match(value) => None,
		Ok(_) => Some(Issue {
			variable: name.to_string(),
			kind: IssueKind::PatternError,
			message: format!("'{}' does not match pattern '{}'", name, pattern),
			details: Some(value.to_string()),
		}),
		Err(err) => Some(Issue {
			variable: name.to_string(),
			kind: IssueKind::PatternError,
			message: format!("Rule pattern '{}' is not a valid regex", pattern),
			details: Some(err.to_string()),
		}),
	}
}

fn check_enum(name: &str, value: &str, allowed: Option<&[String]>) -> Option<Issue> {
	let allowed = allowed?;
	if allowed.iter().any(|a| a == value) {
		None
	} else {
		Some(Issue {
			variable: name.to_string(),
			kind: IssueKind::EnumError,
			message: format!("'{}' must be one of: {}", name, allowed.join(", ")),
			details: Some(value.to_string()),
		})
	}
}

fn check_range(name: &str, value: &str, rule: &Rule) -> Option<Issue> {
	if !matches!(rule.kind, RuleType::Int | RuleType::Float) {
		return None;
	}
	if rule.min.is_none() && rule.max.is_none() {
		return None;
	}
	let number: f64 = value.parse().ok()?;
	let below = rule.min.map(|min| number < min).unwrap_or(false);
	let above = rule.max.map(|max| number > max).unwrap_or(false);
	if below || above {
		Some(Issue {
			variable: name.to_string(),
			kind: IssueKind::RangeError,
			message: format!(
				"'{}' must be between {} and {}",
				name,
				rule.min.map(|m| m.to_string()).unwrap_or_else(|| "-inf".to_string()),
				rule.max.map(|m| m.to_string()).unwrap_or_else(|| "inf".to_string()),
			),
			details: Some(value.to_string()),
		})
	} else {
		None
	}
}


// vim: ts=4

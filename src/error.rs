use serde::Serialize;
use thiserror::Error;

use crate::rules::RuleCategory;

/// Rejected rule registration. Only the `register` call fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleValidationError {
    #[error("rule must have a non-empty name")]
    MissingName,
    #[error("a {category} rule named `{name}` is already registered")]
    DuplicateName { category: RuleCategory, name: String },
    #[error("rule `{name}` evaluates {found} subjects and cannot join the {expected} category")]
    CategoryMismatch {
        name: String,
        expected: RuleCategory,
        found: &'static str,
    },
}

/// Failure raised from inside a rule condition or action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RuleFault(pub String);

impl RuleFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RulePhase {
    Condition,
    Action,
}

impl std::fmt::Display for RulePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulePhase::Condition => f.write_str("condition"),
            RulePhase::Action => f.write_str("action"),
        }
    }
}

/// A rule fault, tagged with where it happened. Evaluation of the category
/// stops and keeps its last good value.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{category} rule `{rule}` failed in {phase}: {message}")]
pub struct RuleExecutionError {
    pub category: RuleCategory,
    pub rule: String,
    pub phase: RulePhase,
    pub message: String,
}

/// A record skipped because its declared type is not drawable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("unsupported device type `{}` at index {index}", .device_type.as_deref().unwrap_or("<missing>"))]
pub struct UnsupportedDeviceType {
    pub index: usize,
    pub id: Option<String>,
    pub device_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownVerb(String),
    #[error("`{verb}` expects {expected} fields, got {found}")]
    Arity {
        verb: String,
        expected: &'static str,
        found: usize,
    },
    #[error("invalid {field} `{value}`")]
    InvalidField { field: &'static str, value: String },
}

//! Feature vector validation

use super::{FeatureMap, MESSAGES, MESSAGES_MAX_CHARS, REQUIRED_NUMERIC_FIELDS};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Why a field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    Missing,
    NotNumeric,
    TooLong { max_chars: usize },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::NotNumeric => write!(f, "not numeric"),
            Self::TooLong { max_chars } => write!(f, "exceeds {} characters", max_chars),
        }
    }
}

/// Field name to rejection reason; empty means valid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, ValidationIssue>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<ValidationIssue> {
        self.0.get(field).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn flag(&mut self, field: &str, issue: ValidationIssue) {
        self.0.insert(field.to_string(), issue);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, issue)| format!("{}: {}", field, issue))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, issue) in &self.0 {
            map.serialize_entry(field, &issue.to_string())?;
        }
        map.end()
    }
}

/// A feature map that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFeatures(FeatureMap);

impl ValidatedFeatures {
    pub fn features(&self) -> &FeatureMap {
        &self.0
    }

    pub fn into_inner(self) -> FeatureMap {
        self.0
    }
}

/// Checks required numeric fields and the size of free-text fields
#[derive(Debug, Clone)]
pub struct FeatureValidator {
    max_messages_chars: usize,
}

impl Default for FeatureValidator {
    fn default() -> Self {
        Self {
            max_messages_chars: MESSAGES_MAX_CHARS,
        }
    }
}

impl FeatureValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every problem in `features`
    pub fn validate(&self, features: &FeatureMap) -> ValidationErrors {
        let mut errors = ValidationErrors::default();

        for field in REQUIRED_NUMERIC_FIELDS {
            match features.get(field) {
                None => errors.flag(field, ValidationIssue::Missing),
                Some(value) if value.as_f64().is_none() => {
                    errors.flag(field, ValidationIssue::NotNumeric)
                }
                Some(_) => {}
            }
        }

        if let Some(messages) = features.get(MESSAGES) {
            if messages.char_len() > self.max_messages_chars {
                errors.flag(
                    MESSAGES,
                    ValidationIssue::TooLong {
                        max_chars: self.max_messages_chars,
                    },
                );
            }
        }

        errors
    }

    /// Validate and wrap; the only way to obtain [`ValidatedFeatures`]
    pub fn check(&self, features: FeatureMap) -> Result<ValidatedFeatures, ValidationErrors> {
        let errors = self.validate(&features);
        if errors.is_empty() {
            Ok(ValidatedFeatures(features))
        } else {
            Err(errors)
        }
    }
}

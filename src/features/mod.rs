//! Feature vector assembly and validation

pub mod builder;
pub mod validator;

pub use builder::{Enrichment, FeatureVectorBuilder};
pub use validator::{FeatureValidator, ValidatedFeatures, ValidationErrors, ValidationIssue};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Numeric business fields every scoring request must carry, in canonical
/// (lexicographic) order. The order drives the argument order of the
/// scoring invocation.
pub const REQUIRED_NUMERIC_FIELDS: [&str; 11] = [
    "delai_traitement_devis_hrs",
    "moyenne_montant_commande",
    "nb_produits_deja_achetes",
    "nb_produits_devis",
    "ratio_produits_achetes",
    "taux_conversion",
    "temps_dans_application_min",
    "temps_reponse_messagerie_min",
    "totalCommandes",
    "totalDevis",
    "totalMontantCommandes",
];

pub const DEVIS_ID: &str = "devisId";
pub const MESSAGES: &str = "messages";
pub const MESSAGE_COUNT: &str = "messageCount";
pub const SENTIMENT_SCORE: &str = "sentimentScore";
pub const NEGOTIATION_INDICATORS: &str = "negotiationIndicators";
pub const OBJECTION_INDICATORS: &str = "objectionIndicators";

/// Optional fields forwarded to the scoring process when present, in argument order
pub const OPTIONAL_ENRICHMENT_FIELDS: [&str; 5] = [
    MESSAGES,
    MESSAGE_COUNT,
    SENTIMENT_SCORE,
    NEGOTIATION_INDICATORS,
    OBJECTION_INDICATORS,
];

/// Longest accepted caller-supplied `messages` value
pub const MESSAGES_MAX_CHARS: usize = 10_000;

/// A single feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl FeatureValue {
    /// Numeric reading of the value; strings are trimmed and parsed
    pub fn as_f64(&self) -> Option<f64> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Bool(_) => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Rendering used on the scoring command line
    pub fn to_arg(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Length in characters of the rendered value
    pub fn char_len(&self) -> usize {
        match self {
            Self::Text(s) => s.chars().count(),
            other => other.to_arg().chars().count(),
        }
    }

    /// Convert a JSON value; `null` has no feature representation
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => Some(match n.as_f64() {
                Some(f) => Self::Number(f),
                None => Self::Text(n.to_string()),
            }),
            Value::String(s) => Some(Self::Text(s)),
            nested => Some(Self::Text(nested.to_string())),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<usize> for FeatureValue {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Field name to value, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureMap(IndexMap<String, FeatureValue>);

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object, dropping `null` entries
    pub fn from_json(object: serde_json::Map<String, Value>) -> Self {
        Self(
            object
                .into_iter()
                .filter_map(|(k, v)| FeatureValue::from_json(v).map(|v| (k, v)))
                .collect(),
        )
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FeatureValue>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FeatureValue> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<FeatureValue> {
        self.0.shift_remove(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureValue)> {
        self.0.iter()
    }

    /// Quote id used for conversation lookup; `Err` carries the unparseable raw value
    pub fn devis_id(&self) -> Option<Result<i64, String>> {
        let value = self.get(DEVIS_ID)?;
        let parsed = match value {
            FeatureValue::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            FeatureValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        Some(parsed.ok_or_else(|| value.to_arg()))
    }
}

impl<K: Into<String>, V: Into<FeatureValue>> FromIterator<(K, V)> for FeatureMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_fields_are_sorted() {
        let mut sorted = REQUIRED_NUMERIC_FIELDS;
        sorted.sort_unstable();
        assert_eq!(sorted, REQUIRED_NUMERIC_FIELDS);
    }

    #[test]
    fn test_numeric_reading() {
        assert_eq!(FeatureValue::Number(3.5).as_f64(), Some(3.5));
        assert_eq!(FeatureValue::from(" 42 ").as_f64(), Some(42.0));
        assert_eq!(FeatureValue::from("abc").as_f64(), None);
        assert_eq!(FeatureValue::from("NaN").as_f64(), None);
        assert_eq!(FeatureValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_argument_rendering() {
        assert_eq!(FeatureValue::Number(12.0).to_arg(), "12");
        assert_eq!(FeatureValue::Number(0.25).to_arg(), "0.25");
        assert_eq!(FeatureValue::from("7").to_arg(), "7");
    }

    #[test]
    fn test_from_json_drops_nulls() {
        let object = json!({
            "totalDevis": 4,
            "messages": null,
            "taux_conversion": "50.0",
            "flag": true,
            "nested": [1, 2]
        });
        let map = FeatureMap::from_json(object.as_object().unwrap().clone());

        assert_eq!(map.len(), 4);
        assert!(!map.contains("messages"));
        assert_eq!(map.get("totalDevis"), Some(&FeatureValue::Number(4.0)));
        assert_eq!(map.get("nested"), Some(&FeatureValue::Text("[1,2]".to_string())));
    }

    #[test]
    fn test_devis_id_parsing() {
        let map: FeatureMap = [(DEVIS_ID, FeatureValue::Number(17.0))].into_iter().collect();
        assert_eq!(map.devis_id(), Some(Ok(17)));

        let map: FeatureMap = [(DEVIS_ID, "23")].into_iter().collect();
        assert_eq!(map.devis_id(), Some(Ok(23)));

        let map: FeatureMap = [(DEVIS_ID, "D-23")].into_iter().collect();
        assert_eq!(map.devis_id(), Some(Err("D-23".to_string())));

        assert_eq!(FeatureMap::new().devis_id(), None);
    }
}

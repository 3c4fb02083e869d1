use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::reference::ReferenceInput;

/// Request parameter names read by the interpreter.
pub const PERMITTED_SEARCH_PARAMS: [&str; 8] = [
    "query",
    "manufacturer",
    "location",
    "distance",
    "serial",
    "stolenness",
    "query_items",
    "colors",
];

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?(\d+\.?\d*|\.\d+)").expect("valid regex"));

/// A parameter that may arrive as a scalar or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        match self {
            Self::One(value) => std::slice::from_ref(value).iter(),
            Self::Many(values) => values.iter(),
        }
    }
}

impl OneOrMany<ReferenceInput> {
    /// Individual references. A scalar string is split on commas; list entries
    /// are taken whole. Blank entries are dropped.
    #[must_use]
    pub fn references(&self) -> Vec<ReferenceInput> {
        match self {
            Self::One(ReferenceInput::Text(text)) => text
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(ReferenceInput::from)
                .collect(),
            _ => self
                .iter()
                .filter(|input| !matches!(input, ReferenceInput::Text(t) if t.trim().is_empty()))
                .cloned()
                .collect(),
        }
    }
}

/// Text form of a scalar JSON value. Nulls, lists and objects have none.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(&Value::deserialize(deserializer)?))
}

fn lenient_items<'de, D>(deserializer: D) -> Result<Option<OneOrMany<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => Some(OneOrMany::Many(
            values.iter().filter_map(scalar_text).collect(),
        )),
        value => scalar_text(&value).map(OneOrMany::One),
    })
}

fn lenient_references<'de, D>(
    deserializer: D,
) -> Result<Option<OneOrMany<ReferenceInput>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => Some(OneOrMany::Many(
            values.iter().filter_map(ReferenceInput::from_json).collect(),
        )),
        value => ReferenceInput::from_json(&value).map(OneOrMany::One),
    })
}

fn lenient_distance<'de, D>(deserializer: D) -> Result<Option<DistanceParam>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64().map(DistanceParam::Number),
        Value::String(text) => Some(DistanceParam::Text(text)),
        _ => None,
    })
}

/// Distance as a number or as loosely formatted text (`"10"`, `"10 miles"`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DistanceParam {
    Number(f64),
    Text(String),
}

impl DistanceParam {
    /// Leading number of the value, if there is one.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(text) => LEADING_NUMBER
                .find(text.trim())
                .and_then(|m| m.as_str().parse().ok()),
        }
    }
}

/// Raw search request parameters.
///
/// Every field is optional and unknown fields are ignored. Numbers are accepted
/// wherever text is expected (`{"serial": 12345}`), and values of an unusable
/// shape are dropped instead of failing the request, so any JSON object
/// deserializes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawSearchParams {
    #[serde(deserialize_with = "lenient_text")]
    pub serial: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub query: Option<String>,
    #[serde(deserialize_with = "lenient_items")]
    pub query_items: Option<OneOrMany<String>>,
    #[serde(deserialize_with = "lenient_references")]
    pub manufacturer: Option<OneOrMany<ReferenceInput>>,
    #[serde(deserialize_with = "lenient_references")]
    pub colors: Option<OneOrMany<ReferenceInput>>,
    #[serde(deserialize_with = "lenient_text")]
    pub stolenness: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient_distance")]
    pub distance: Option<DistanceParam>,
}

impl RawSearchParams {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn query_items(&self) -> impl Iterator<Item = &str> {
        self.query_items
            .iter()
            .flat_map(OneOrMany::iter)
            .map(String::as_str)
    }

    /// Explicit manufacturer references; `None` when the parameter is blank.
    #[must_use]
    pub fn manufacturer_references(&self) -> Option<Vec<ReferenceInput>> {
        Self::present(self.manufacturer.as_ref())
    }

    /// Explicit color references; `None` when the parameter is blank.
    #[must_use]
    pub fn color_references(&self) -> Option<Vec<ReferenceInput>> {
        Self::present(self.colors.as_ref())
    }

    #[must_use]
    pub fn distance(&self) -> Option<f64> {
        self.distance.as_ref().and_then(DistanceParam::value)
    }

    fn present(value: Option<&OneOrMany<ReferenceInput>>) -> Option<Vec<ReferenceInput>> {
        value
            .map(OneOrMany::references)
            .filter(|references| !references.is_empty())
    }
}

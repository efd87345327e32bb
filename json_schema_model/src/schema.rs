use serde::Deserialize;
use serde_json::{Map, Value};

/// Wraps keywords whose value may legitimately be `null` (`default`, `const`).
/// Serde deserializes `Option<Value>` with JSON null as `None`; we need to
/// distinguish an absent key from `"default": null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum KeywordValue {
    /// The keyword was absent from the schema.
    #[default]
    Absent,
    /// The keyword was present; the value may be `Value::Null`.
    Present(Value),
}

impl KeywordValue {
    #[must_use]
    pub const fn as_option(&self) -> Option<&Value> {
        match self {
            Self::Absent => None,
            Self::Present(value) => Some(value),
        }
    }
}

impl<'de> Deserialize<'de> for KeywordValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v: Value = Deserialize::deserialize(deserializer)?;
        Ok(Self::Present(v))
    }
}

/// The `type` keyword: a single name or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TypeKeyword {
    Single(String),
    Multiple(Vec<String>),
}

impl TypeKeyword {
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Single(name) => vec![name.as_str()],
            Self::Multiple(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Typed view of one JSON Schema node.
///
/// Only the keywords used by the compiler are modeled; extra keys are
/// ignored. Sub-schemas stay raw `Value`s so the processor can track their
/// JSON Pointers and keep the originating JSON on every compiled schema.
/// Maps keep document order (`serde_json` `preserve_order`).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSchema {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub r#type: Option<TypeKeyword>,

    #[serde(default)]
    pub properties: Option<Map<String, Value>>,

    #[serde(default)]
    pub pattern_properties: Option<Map<String, Value>>,

    #[serde(default)]
    pub additional_properties: Option<Value>,

    #[serde(default)]
    pub required: Vec<String>,

    #[serde(default)]
    pub min_properties: Option<u64>,

    #[serde(default)]
    pub max_properties: Option<u64>,

    #[serde(default)]
    pub items: Option<Value>,

    #[serde(default)]
    pub additional_items: Option<Value>,

    #[serde(default)]
    pub min_items: Option<u64>,

    #[serde(default)]
    pub max_items: Option<u64>,

    #[serde(default)]
    pub unique_items: bool,

    #[serde(default)]
    pub min_length: Option<u64>,

    #[serde(default)]
    pub max_length: Option<u64>,

    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub minimum: Option<f64>,

    #[serde(default)]
    pub maximum: Option<f64>,

    #[serde(default)]
    pub exclusive_minimum: Option<f64>,

    #[serde(default)]
    pub exclusive_maximum: Option<f64>,

    #[serde(default)]
    pub multiple_of: Option<f64>,

    #[serde(default)]
    pub r#enum: Option<Vec<Value>>,

    #[serde(default)]
    pub r#const: KeywordValue,

    #[serde(default)]
    pub default: KeywordValue,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default)]
    pub all_of: Option<Vec<Value>>,

    #[serde(default)]
    pub any_of: Option<Vec<Value>>,

    #[serde(default)]
    pub one_of: Option<Vec<Value>>,

    #[serde(default)]
    pub not: Option<Value>,

    #[serde(default, rename = "$ref")]
    pub reference: Option<String>,

    #[serde(default)]
    pub filter: Option<Value>,

    /// Accessor key of a pattern property.
    #[serde(default)]
    pub key: Option<String>,
}

impl JsonSchema {
    /// Reads the typed view of a node. Boolean schemas read as empty schemas.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if a modeled keyword has the wrong shape.
    pub fn from_value(json: &Value) -> Result<Self, serde_json::Error> {
        match json {
            Value::Bool(_) => Ok(Self::default()),
            other => Self::deserialize(other),
        }
    }

    /// Declared type names, empty when `type` is absent.
    #[must_use]
    pub fn type_names(&self) -> Vec<&str> {
        self.r#type.as_ref().map(TypeKeyword::names).unwrap_or_default()
    }

    /// Describes an object: `type: object` (optionally with `null`), or
    /// untyped with object keywords.
    #[must_use]
    pub fn is_object(&self) -> bool {
        let names: Vec<&str> = self.type_names();
        if names.is_empty() {
            self.properties.is_some()
                || self.pattern_properties.is_some()
                || self.additional_properties.is_some()
                || self.min_properties.is_some()
                || self.max_properties.is_some()
        } else {
            let non_null: Vec<&str> = names.into_iter().filter(|name| *name != "null").collect();
            non_null == ["object"]
        }
    }

    /// True if `type` lists `null`.
    #[must_use]
    pub fn allows_null(&self) -> bool {
        self.type_names().contains(&"null")
    }

    /// Composition keywords present on this node, in keyword order.
    #[must_use]
    pub fn compositions(&self) -> Vec<(crate::validator::CompositionKind, Vec<Value>)> {
        use crate::validator::CompositionKind;
        let mut compositions: Vec<(CompositionKind, Vec<Value>)> = Vec::new();
        if let Some(branches) = &self.all_of {
            compositions.push((CompositionKind::AllOf, branches.clone()));
        }
        if let Some(branches) = &self.any_of {
            compositions.push((CompositionKind::AnyOf, branches.clone()));
        }
        if let Some(branches) = &self.one_of {
            compositions.push((CompositionKind::OneOf, branches.clone()));
        }
        if let Some(branch) = &self.not {
            compositions.push((CompositionKind::Not, vec![branch.clone()]));
        }
        compositions
    }
}

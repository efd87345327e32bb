//! Value filters referenced by the `filter` keyword.
//!
//! A filter either only checks or normalises a value (`Validating`) or
//! changes its stored representation (`Transforming`). Transforming filters
//! name the serializer that turns the stored value back into JSON.

use crate::property::JsonType;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Class + method reference of a transforming filter's serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerializerRef {
    pub class: String,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    Validating,
    Transforming {
        output_type: String,
        serializer: SerializerRef,
    },
}

/// What the filter does to a value at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum FilterOperation {
    Trim,
    NotEmpty,
    DateTime,
    /// Implemented by the renderer's runtime library under this callable name.
    External { callable: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    token: String,
    accepted_types: Vec<JsonType>,
    kind: FilterKind,
    operation: FilterOperation,
}

impl Filter {
    #[must_use]
    pub fn new(
        token: impl Into<String>,
        accepted_types: Vec<JsonType>,
        kind: FilterKind,
        operation: FilterOperation,
    ) -> Self {
        Self {
            token: token.into(),
            accepted_types,
            kind,
            operation,
        }
    }

    #[must_use]
    pub fn trim() -> Self {
        Self::new(
            "trim",
            vec![JsonType::String],
            FilterKind::Validating,
            FilterOperation::Trim,
        )
    }

    #[must_use]
    pub fn not_empty() -> Self {
        Self::new(
            "notEmpty",
            vec![JsonType::String, JsonType::Array],
            FilterKind::Validating,
            FilterOperation::NotEmpty,
        )
    }

    #[must_use]
    pub fn date_time() -> Self {
        Self::new(
            "dateTime",
            vec![JsonType::String],
            FilterKind::Transforming {
                output_type: "DateTime".to_string(),
                serializer: SerializerRef {
                    class: "DateTimeFilter".to_string(),
                    method: "serialize".to_string(),
                },
            },
            FilterOperation::DateTime,
        )
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Types the filter may be applied to. `null` is always passed through.
    #[must_use]
    pub fn accepted_types(&self) -> &[JsonType] {
        &self.accepted_types
    }

    #[must_use]
    pub const fn kind(&self) -> &FilterKind {
        &self.kind
    }

    #[must_use]
    pub const fn operation(&self) -> &FilterOperation {
        &self.operation
    }

    #[must_use]
    pub const fn is_transforming(&self) -> bool {
        matches!(self.kind, FilterKind::Transforming { .. })
    }

    #[must_use]
    pub fn accepts(&self, ty: JsonType) -> bool {
        ty == JsonType::Null
            || self.accepted_types.contains(&ty)
            || (ty == JsonType::Integer && self.accepted_types.contains(&JsonType::Number))
    }
}

/// Filters known to the compiler, keyed by token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Filter>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        let mut registry = Self {
            filters: BTreeMap::new(),
        };
        registry.register(Filter::trim());
        registry.register(Filter::not_empty());
        registry.register(Filter::date_time());
        registry
    }
}

impl FilterRegistry {
    /// Adds or replaces the filter registered under its token.
    pub fn register(&mut self, filter: Filter) {
        self.filters.insert(filter.token.clone(), filter);
    }

    #[must_use]
    pub fn get(&self, token: &str) -> Option<&Filter> {
        self.filters.get(token)
    }
}

/// One `filter` keyword entry: token plus its options object.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDeclaration {
    pub token: String,
    pub options: serde_json::Map<String, Value>,
}

/// Parses the `filter` keyword: `"trim"`, `{"filter": "dateTime", ...}` or a list of both.
/// Returns `None` if the keyword has another shape.
#[must_use]
pub fn parse_declarations(keyword: &Value) -> Option<Vec<FilterDeclaration>> {
    match keyword {
        Value::Array(entries) => entries.iter().map(parse_declaration).collect(),
        other => parse_declaration(other).map(|declaration| vec![declaration]),
    }
}

fn parse_declaration(entry: &Value) -> Option<FilterDeclaration> {
    match entry {
        Value::String(token) => Some(FilterDeclaration {
            token: token.clone(),
            options: serde_json::Map::new(),
        }),
        Value::Object(object) => {
            let token: String = object.get("filter")?.as_str()?.to_string();
            let options: serde_json::Map<String, Value> = object
                .iter()
                .filter(|(key, _)| key.as_str() != "filter")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Some(FilterDeclaration { token, options })
        }
        _ => None,
    }
}

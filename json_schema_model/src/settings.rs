//! Settings for schema compilation.

use crate::filter::{Filter, FilterRegistry};
use serde::Serialize;
use std::collections::BTreeMap;

/// How a registered `format` is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FormatValidator {
    /// ECMA-262 regular expression the string value must match.
    Pattern(String),
    /// External template implementing the check.
    Template(String),
}

/// Read-only configuration threaded through every compilation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorConfiguration {
    /// Reject unknown keys of schemas without an `additionalProperties` keyword.
    ///
    /// **Default: false.**
    deny_additional_properties: bool,

    /// Suppress mutator generation (setters, removers).
    ///
    /// **Default: true.**
    immutable: bool,

    /// Emit serialization methods.
    ///
    /// **Default: false.**
    serialization: bool,

    /// Optional properties accept an explicit `null`.
    ///
    /// **Default: true.**
    implicit_null: bool,

    /// Generated models report every violation instead of the first one.
    ///
    /// **Default: true.**
    collect_errors: bool,

    #[serde(skip)]
    filters: FilterRegistry,

    formats: BTreeMap<String, FormatValidator>,
}

impl Default for GeneratorConfiguration {
    fn default() -> Self {
        Self {
            deny_additional_properties: false,
            immutable: true,
            serialization: false,
            implicit_null: true,
            collect_errors: true,
            filters: FilterRegistry::default(),
            formats: BTreeMap::new(),
        }
    }
}

impl GeneratorConfiguration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_deny_additional_properties(mut self, deny: bool) -> Self {
        self.deny_additional_properties = deny;
        self
    }

    #[must_use]
    pub fn with_immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    #[must_use]
    pub fn with_serialization(mut self, serialization: bool) -> Self {
        self.serialization = serialization;
        self
    }

    #[must_use]
    pub fn with_implicit_null(mut self, implicit_null: bool) -> Self {
        self.implicit_null = implicit_null;
        self
    }

    #[must_use]
    pub fn with_collect_errors(mut self, collect_errors: bool) -> Self {
        self.collect_errors = collect_errors;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.register(filter);
        self
    }

    #[must_use]
    pub fn with_format(mut self, name: &str, format: FormatValidator) -> Self {
        self.formats.insert(name.to_string(), format);
        self
    }

    #[must_use]
    pub const fn deny_additional_properties(&self) -> bool {
        self.deny_additional_properties
    }

    #[must_use]
    pub const fn is_immutable(&self) -> bool {
        self.immutable
    }

    #[must_use]
    pub const fn has_serialization_enabled(&self) -> bool {
        self.serialization
    }

    #[must_use]
    pub const fn has_implicit_null(&self) -> bool {
        self.implicit_null
    }

    #[must_use]
    pub const fn collect_errors(&self) -> bool {
        self.collect_errors
    }

    #[must_use]
    pub const fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    #[must_use]
    pub fn format(&self, name: &str) -> Option<&FormatValidator> {
        self.formats.get(name)
    }
}

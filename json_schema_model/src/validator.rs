//! Validator model: one compiled constraint per schema keyword instance.

use crate::expr::{CmpOp, Expr};
use crate::filter::{Filter, SerializerRef};
use crate::model::SchemaId;
use crate::pattern::Pattern;
use crate::property::{JsonType, Property};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Runtime error raised by generated code when a validator fails.
///
/// Each kind owns a message template; `{name}` placeholders are filled from
/// the validator parameters plus the runtime parameters (`property`,
/// `actual`, ...) supplied at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RequiredValue,
    Forbidden,
    InvalidType,
    InvalidPatternPropertyType,
    PatternMismatch,
    MinLength,
    MaxLength,
    Minimum,
    Maximum,
    ExclusiveMinimum,
    ExclusiveMaximum,
    MultipleOf,
    MinItems,
    MaxItems,
    UniqueItems,
    InvalidItem,
    AdditionalItems,
    InvalidAdditionalItem,
    Enum,
    Const,
    Format,
    MinProperties,
    MaxProperties,
    AdditionalProperties,
    InvalidAdditionalProperty,
    InvalidObject,
    AllOf,
    AnyOf,
    OneOf,
    Not,
    Filter,
    RegularPropertyAsAdditionalProperty,
}

impl ErrorKind {
    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::RequiredValue => "Missing required value for {property}",
            Self::Forbidden => "Value for {property} is not allowed",
            Self::InvalidType => "Invalid type for {property}. Requires {expected}, got {actual}",
            Self::InvalidPatternPropertyType => {
                "Invalid type for pattern property. Requires {expected}, got {actual}"
            }
            Self::PatternMismatch => "{property} doesn't match pattern {pattern}",
            Self::MinLength => "Value for {property} must not be shorter than {limit}",
            Self::MaxLength => "Value for {property} must not be longer than {limit}",
            Self::Minimum => "Value for {property} must not be smaller than {limit}",
            Self::Maximum => "Value for {property} must not be larger than {limit}",
            Self::ExclusiveMinimum => "Value for {property} must be larger than {limit}",
            Self::ExclusiveMaximum => "Value for {property} must be smaller than {limit}",
            Self::MultipleOf => "Value for {property} must be a multiple of {limit}",
            Self::MinItems => "{property} must not contain less than {limit} items",
            Self::MaxItems => "{property} must not contain more than {limit} items",
            Self::UniqueItems => "Items of array {property} are not unique",
            Self::InvalidItem => "Invalid item at index {index} of array {property}",
            Self::AdditionalItems => {
                "Tuple array {property} contains not allowed additional items. Expected {limit} items, got {count}"
            }
            Self::InvalidAdditionalItem => {
                "Tuple array {property} contains invalid additional item at index {index}"
            }
            Self::Enum => "Invalid value for {property} declined by enum constraint",
            Self::Const => "Invalid value for {property} declined by const constraint",
            Self::Format => "Value for {property} must match the format {format}",
            Self::MinProperties => "{property} must not contain less than {limit} properties",
            Self::MaxProperties => "{property} must not contain more than {limit} properties",
            Self::AdditionalProperties => {
                "Provided JSON for {property} contains not allowed additional properties [{keys}]"
            }
            Self::InvalidAdditionalProperty => {
                "Provided JSON for {property} contains invalid additional property {key}"
            }
            Self::InvalidObject => "Invalid nested object for {property}",
            Self::AllOf => {
                "Invalid value for {property} declined by composition constraint. Requires to match all composition elements but matched {succeeded} elements."
            }
            Self::AnyOf => {
                "Invalid value for {property} declined by composition constraint. Requires to match at least one composition element."
            }
            Self::OneOf => {
                "Invalid value for {property} declined by composition constraint. Requires to match one composition element but matched {succeeded} elements."
            }
            Self::Not => {
                "Invalid value for {property} declined by composition constraint. Requires to not match the composition element."
            }
            Self::Filter => "Invalid value for {property} denied by filter {filter}",
            Self::RegularPropertyAsAdditionalProperty => {
                "Couldn't add regular property {key} as additional property to object {class}"
            }
        }
    }

    /// Fills the message template. Unknown placeholders are left untouched.
    #[must_use]
    pub fn render(self, params: &BTreeMap<String, String>) -> String {
        let mut message: String = self.template().to_string();
        for (name, value) in params {
            message = message.replace(&format!("{{{name}}}"), value);
        }
        message
    }
}

/// Generic constraint: the expression must hold for the value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyValidator {
    pub check: Expr,
    pub error: ErrorKind,
    pub params: BTreeMap<String, String>,
}

impl PropertyValidator {
    #[must_use]
    pub fn new(check: Expr, error: ErrorKind) -> Self {
        Self {
            check,
            error,
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }
}

/// Applies a registered filter with the options given in the schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterValidator {
    pub filter: Filter,
    pub options: serde_json::Map<String, Value>,
}

impl FilterValidator {
    #[must_use]
    pub const fn is_transforming(&self) -> bool {
        self.filter.is_transforming()
    }

    #[must_use]
    pub fn serializer(&self) -> Option<&SerializerRef> {
        match self.filter.kind() {
            crate::filter::FilterKind::Transforming { serializer, .. } => Some(serializer),
            crate::filter::FilterKind::Validating => None,
        }
    }
}

/// Validator whose logic lives in an external template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyTemplateValidator {
    pub template: String,
    pub variables: BTreeMap<String, Value>,
    pub error: ErrorKind,
}

/// What happens to keys (or tuple positions) not covered by declarations.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "policy", content = "property", rename_all = "snake_case")]
pub enum AdditionalPolicy {
    Deny,
    Validate(Box<Property>),
}

#[derive(Debug, Clone, Serialize)]
pub struct AdditionalPropertiesValidator {
    pub declared_properties: Vec<String>,
    pub patterns: Vec<Pattern>,
    pub policy: AdditionalPolicy,
    /// Set by the accessor post-processor; the runtime then keeps the values.
    pub collect: bool,
}

impl AdditionalPropertiesValidator {
    /// Keys of `object` matched by neither a declared property nor a pattern.
    pub fn additional_keys<'o>(
        &self,
        object: &'o serde_json::Map<String, Value>,
    ) -> impl Iterator<Item = &'o String> {
        let declared: Vec<String> = self.declared_properties.clone();
        let patterns: Vec<Pattern> = self.patterns.clone();
        object
            .keys()
            .filter(move |key| is_additional_key(key, &declared, &patterns))
    }

    /// Property additional values are validated against, if any.
    #[must_use]
    pub fn validation_property(&self) -> Option<&Property> {
        match &self.policy {
            AdditionalPolicy::Deny => None,
            AdditionalPolicy::Validate(property) => Some(property),
        }
    }
}

/// True if `key` is neither declared nor matched by any pattern.
#[must_use]
pub fn is_additional_key(key: &str, declared: &[String], patterns: &[Pattern]) -> bool {
    !declared.iter().any(|name| name == key) && !patterns.iter().any(|p| p.is_match(key))
}

/// Tuple positions past the declared items.
#[derive(Debug, Clone, Serialize)]
pub struct AdditionalItemsValidator {
    pub tuple_length: usize,
    pub policy: AdditionalPolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternPropertiesValidator {
    pub pattern: Pattern,
    /// Accessor key (`key` keyword) or the pattern source.
    pub key: String,
    pub property: Box<Property>,
    /// Declared type of the sub-schema, checked with a dedicated error.
    pub types: Option<Vec<JsonType>>,
}

/// Every array item validates against the item property.
#[derive(Debug, Clone, Serialize)]
pub struct ArrayItemsValidator {
    pub item: Box<Property>,
}

/// Positional item schemas (`items` given as an array).
#[derive(Debug, Clone, Serialize)]
pub struct TupleItemsValidator {
    pub items: Vec<Property>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompositionKind {
    AllOf,
    AnyOf,
    OneOf,
    Not,
}

impl CompositionKind {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::AllOf => "allOf",
            Self::AnyOf => "anyOf",
            Self::OneOf => "oneOf",
            Self::Not => "not",
        }
    }

    /// Success predicate over the number of succeeded branches out of `branches`.
    #[must_use]
    pub const fn predicate(self, branches: usize) -> SuccessPredicate {
        match self {
            Self::AllOf => SuccessPredicate {
                cmp: CmpOp::Eq,
                expected: branches,
            },
            Self::AnyOf => SuccessPredicate {
                cmp: CmpOp::Ge,
                expected: 1,
            },
            Self::OneOf => SuccessPredicate {
                cmp: CmpOp::Eq,
                expected: 1,
            },
            Self::Not => SuccessPredicate {
                cmp: CmpOp::Eq,
                expected: 0,
            },
        }
    }

    #[must_use]
    pub const fn error(self) -> ErrorKind {
        match self {
            Self::AllOf => ErrorKind::AllOf,
            Self::AnyOf => ErrorKind::AnyOf,
            Self::OneOf => ErrorKind::OneOf,
            Self::Not => ErrorKind::Not,
        }
    }

    /// Contributed properties stay non-null only when every branch must succeed.
    #[must_use]
    pub const fn keeps_contributions_non_null(self) -> bool {
        matches!(self, Self::AllOf)
    }

    /// Object branches of these keywords are merged into one class.
    #[must_use]
    pub const fn merges_branches(self) -> bool {
        matches!(self, Self::AllOf | Self::AnyOf)
    }
}

/// `succeeded <cmp> expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuccessPredicate {
    pub cmp: CmpOp,
    pub expected: usize,
}

impl SuccessPredicate {
    #[must_use]
    pub fn accepts(self, succeeded: usize) -> bool {
        self.cmp.compare(succeeded, self.expected)
    }
}

/// Property contributed to the parent schema by composition branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedProperty {
    pub name: String,
    pub branches: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComposedValidator {
    pub kind: CompositionKind,
    pub branches: Vec<Property>,
    pub predicate: SuccessPredicate,
    pub affected_properties: Vec<AffectedProperty>,
    /// Class merging all object branches, when the keyword merges.
    pub merged: Option<SchemaId>,
}

impl ComposedValidator {
    /// Names of affected properties to reset to null for a given outcome.
    ///
    /// If the composition failed, every affected property is reset;
    /// otherwise only those whose contributing branches all failed.
    #[must_use]
    pub fn properties_to_reset(&self, succeeded_branches: &[bool]) -> Vec<&str> {
        let succeeded: usize = succeeded_branches.iter().filter(|ok| **ok).count();
        let passed: bool = self.predicate.accepts(succeeded);
        self.affected_properties
            .iter()
            .filter(|affected| {
                !passed
                    || !affected
                        .branches
                        .iter()
                        .any(|branch| succeeded_branches.get(*branch).copied().unwrap_or(false))
            })
            .map(|affected| affected.name.as_str())
            .collect()
    }
}

/// Keeps the additional-property storage of a model in sync with its raw
/// input when no `AdditionalPropertiesValidator` exists.
#[derive(Debug, Clone, Serialize)]
pub struct AdditionalPropertiesUpdate {
    pub pattern_properties: Vec<Pattern>,
    pub declared_properties: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "validator", rename_all = "snake_case")]
pub enum ValidatorKind {
    Property(PropertyValidator),
    Filter(FilterValidator),
    Template(PropertyTemplateValidator),
    AdditionalProperties(AdditionalPropertiesValidator),
    AdditionalItems(AdditionalItemsValidator),
    PatternProperties(PatternPropertiesValidator),
    ArrayItems(ArrayItemsValidator),
    TupleItems(TupleItemsValidator),
    Composed(ComposedValidator),
    AdditionalPropertiesUpdate(AdditionalPropertiesUpdate),
}

/// A compiled constraint plus the keyword it was compiled from.
#[derive(Debug, Clone, Serialize)]
pub struct Validator {
    /// JSON Pointer of the keyword.
    pub keyword: String,
    #[serde(flatten)]
    pub kind: ValidatorKind,
}

impl Validator {
    #[must_use]
    pub fn new(keyword: impl Into<String>, kind: ValidatorKind) -> Self {
        Self {
            keyword: keyword.into(),
            kind,
        }
    }

    #[must_use]
    pub fn property(keyword: impl Into<String>, validator: PropertyValidator) -> Self {
        Self::new(keyword, ValidatorKind::Property(validator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_placeholders() {
        let mut params: BTreeMap<String, String> = BTreeMap::new();
        params.insert("expected".to_string(), "string".to_string());
        params.insert("actual".to_string(), "integer".to_string());
        assert_eq!(
            ErrorKind::InvalidPatternPropertyType.render(&params),
            "Invalid type for pattern property. Requires string, got integer"
        );
    }

    #[test]
    fn all_of_requires_every_branch() {
        let predicate = CompositionKind::AllOf.predicate(2);
        assert!(predicate.accepts(2));
        assert!(!predicate.accepts(1));
        assert!(!predicate.accepts(0));
    }

    #[test]
    fn one_of_requires_exactly_one_branch() {
        let predicate = CompositionKind::OneOf.predicate(3);
        assert!(!predicate.accepts(0));
        assert!(predicate.accepts(1));
        assert!(!predicate.accepts(2));
        assert!(!predicate.accepts(3));
    }

    #[test]
    fn any_of_requires_at_least_one_branch() {
        let predicate = CompositionKind::AnyOf.predicate(3);
        assert!(!predicate.accepts(0));
        assert!(predicate.accepts(1));
        assert!(predicate.accepts(3));
    }

    #[test]
    fn not_requires_no_branch() {
        let predicate = CompositionKind::Not.predicate(1);
        assert!(predicate.accepts(0));
        assert!(!predicate.accepts(1));
    }

    fn any_of_with_affected() -> ComposedValidator {
        ComposedValidator {
            kind: CompositionKind::AnyOf,
            branches: Vec::new(),
            predicate: CompositionKind::AnyOf.predicate(2),
            affected_properties: vec![
                AffectedProperty {
                    name: "a".to_string(),
                    branches: vec![0],
                },
                AffectedProperty {
                    name: "b".to_string(),
                    branches: vec![1],
                },
                AffectedProperty {
                    name: "shared".to_string(),
                    branches: vec![0, 1],
                },
            ],
            merged: None,
        }
    }

    #[test]
    fn reset_only_properties_of_failed_branches() {
        let composed = any_of_with_affected();
        assert_eq!(composed.properties_to_reset(&[true, false]), vec!["b"]);
    }

    #[test]
    fn reset_every_affected_property_when_composition_fails() {
        let composed = any_of_with_affected();
        assert_eq!(
            composed.properties_to_reset(&[false, false]),
            vec!["a", "b", "shared"]
        );
    }

    #[test]
    fn additional_keys_skip_declared_and_pattern_keys() {
        let validator = AdditionalPropertiesValidator {
            declared_properties: vec!["name".to_string()],
            patterns: vec![Pattern::new("^x-").expect("valid pattern")],
            policy: AdditionalPolicy::Deny,
            collect: false,
        };
        let object = serde_json::json!({ "name": 1, "x-trace": 2, "other": 3 });
        let keys: Vec<&String> = validator
            .additional_keys(object.as_object().expect("object"))
            .collect();
        assert_eq!(keys, vec!["other"]);
    }
}

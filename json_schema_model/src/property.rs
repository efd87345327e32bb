//! Property type model: named, typed slots of a compiled schema.

use crate::model::SchemaId;
use crate::validator::{Validator, ValidatorKind};
use heck::ToLowerCamelCase;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// JSON value types as named by the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let ty = match name {
            "null" => Self::Null,
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "string" => Self::String,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => return None,
        };
        Some(ty)
    }

    /// Runtime type of a JSON value. Integral numbers report `integer`.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Structural type check. `number` also accepts integers.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        let actual: Self = Self::of(value);
        actual == self || (self == Self::Number && actual == Self::Integer)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders a type list the way error messages expect it: `string` or `[string, null]`.
#[must_use]
pub fn describe_types(types: &[JsonType]) -> String {
    match types {
        [single] => single.to_string(),
        _ => format!(
            "[{}]",
            types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<String>>()
                .join(", ")
        ),
    }
}

/// One entry of a property's declared type set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum TypeName {
    Json(JsonType),
    /// Generated class of a nested object schema.
    Class(SchemaId),
    /// Output type of a transforming filter (e.g. `DateTime`).
    Native(String),
}

/// Ordered set of declared types plus nullability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertyType {
    names: Vec<TypeName>,
    nullable: bool,
}

impl PropertyType {
    #[must_use]
    pub fn new(names: Vec<TypeName>, nullable: bool) -> Self {
        let mut property_type = Self::default();
        for name in names {
            property_type.push(name);
        }
        property_type.nullable = nullable;
        property_type
    }

    #[must_use]
    pub fn from_json_types(types: &[JsonType]) -> Self {
        let nullable: bool = types.contains(&JsonType::Null);
        Self::new(
            types
                .iter()
                .filter(|ty| **ty != JsonType::Null)
                .map(|ty| TypeName::Json(*ty))
                .collect(),
            nullable,
        )
    }

    /// Adds a type name, keeping insertion order and skipping duplicates.
    pub fn push(&mut self, name: TypeName) {
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    /// Union with another type set; nullable if either side is.
    pub fn merge(&mut self, other: &Self) {
        for name in &other.names {
            self.push(name.clone());
        }
        self.nullable |= other.nullable;
    }

    #[must_use]
    pub fn names(&self) -> &[TypeName] {
        &self.names
    }

    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub const fn set_nullable(&mut self, nullable: bool) {
        self.nullable = nullable;
    }

    /// JSON types the raw value may have, classes counting as `object`.
    #[must_use]
    pub fn json_types(&self) -> Vec<JsonType> {
        let mut types: Vec<JsonType> = Vec::new();
        for name in &self.names {
            let ty: Option<JsonType> = match name {
                TypeName::Json(ty) => Some(*ty),
                TypeName::Class(_) => Some(JsonType::Object),
                TypeName::Native(_) => None,
            };
            if let Some(ty) = ty
                && !types.contains(&ty)
            {
                types.push(ty);
            }
        }
        if self.nullable && !types.contains(&JsonType::Null) {
            types.push(JsonType::Null);
        }
        types
    }

    /// Class of the property if its only non-null type is a generated class.
    #[must_use]
    pub fn class(&self) -> Option<SchemaId> {
        match self.names.as_slice() {
            [TypeName::Class(id)] => Some(*id),
            _ => None,
        }
    }

    /// True if at least one raw JSON type is shared with `other`.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let mine: Vec<JsonType> = self.json_types();
        other.json_types().iter().any(|ty| {
            mine.contains(ty)
                || (*ty == JsonType::Integer && mine.contains(&JsonType::Number))
                || (*ty == JsonType::Number && mine.contains(&JsonType::Integer))
        })
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .names
            .iter()
            .map(|name| match name {
                TypeName::Json(ty) => ty.to_string(),
                TypeName::Class(id) => format!("class#{}", id.index()),
                TypeName::Native(native) => native.clone(),
            })
            .collect();
        if self.nullable {
            parts.push("null".to_string());
        }
        if parts.len() == 1 {
            f.write_str(&parts[0])
        } else {
            write!(f, "[{}]", parts.join(", "))
        }
    }
}

/// Post-hoc transformation applied to a validated value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decorator", rename_all = "snake_case")]
pub enum PropertyDecorator {
    /// Integral input for a `number` property is stored as a float.
    IntToFloat,
    /// The value is instantiated as the given class.
    InstantiateObject { class: SchemaId },
}

/// Back-reference from a property contributed by a composition branch to the
/// composition that owns it. The composition is identified by the pointer of
/// its keyword, the branches by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositionLink {
    pub composition: String,
    pub branches: Vec<usize>,
}

/// A named, typed slot within a compiled schema.
#[derive(Debug, Clone, Serialize)]
pub struct Property {
    name: String,
    attribute: String,
    property_type: Option<PropertyType>,
    required: bool,
    read_only: bool,
    internal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    validators: Vec<Validator>,
    decorators: Vec<PropertyDecorator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    composition: Option<CompositionLink>,
}

impl Property {
    #[must_use]
    pub fn new(name: impl Into<String>, property_type: Option<PropertyType>) -> Self {
        let name: String = name.into();
        let attribute: String = attribute_name(&name);
        Self {
            name,
            attribute,
            property_type,
            required: false,
            read_only: false,
            internal: false,
            default: None,
            description: None,
            validators: Vec::new(),
            decorators: Vec::new(),
            composition: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier used for the generated accessor.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    #[must_use]
    pub const fn property_type(&self) -> Option<&PropertyType> {
        self.property_type.as_ref()
    }

    pub const fn property_type_mut(&mut self) -> Option<&mut PropertyType> {
        self.property_type.as_mut()
    }

    pub fn set_property_type(&mut self, property_type: Option<PropertyType>) {
        self.property_type = property_type;
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub const fn set_required(&mut self, required: bool) {
        self.required = required;
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Generator-synthesised slot (not backed by a schema keyword).
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        self.internal
    }

    #[must_use]
    pub fn with_internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    #[must_use]
    pub const fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn set_default_value(&mut self, default: Option<Value>) {
        self.default = default;
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Accepts null: nullable type, untyped, or a declared `null` type.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.property_type
            .as_ref()
            .is_none_or(PropertyType::is_nullable)
    }

    #[must_use]
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn add_validator(&mut self, validator: Validator) {
        self.validators.push(validator);
    }

    pub fn clear_validators(&mut self) {
        self.validators.clear();
    }

    /// Validators of the filter kind that change the value representation.
    #[must_use]
    pub fn transforming_filter_count(&self) -> usize {
        self.validators
            .iter()
            .filter(|validator| {
                matches!(&validator.kind, ValidatorKind::Filter(filter) if filter.is_transforming())
            })
            .count()
    }

    #[must_use]
    pub fn decorators(&self) -> &[PropertyDecorator] {
        &self.decorators
    }

    pub fn add_decorator(&mut self, decorator: PropertyDecorator) {
        if !self.decorators.contains(&decorator) {
            self.decorators.push(decorator);
        }
    }

    #[must_use]
    pub const fn composition(&self) -> Option<&CompositionLink> {
        self.composition.as_ref()
    }

    pub fn set_composition(&mut self, composition: Option<CompositionLink>) {
        self.composition = composition;
    }

    pub const fn composition_mut(&mut self) -> Option<&mut CompositionLink> {
        self.composition.as_mut()
    }

    /// Nested class instantiated for this property, if any.
    #[must_use]
    pub fn nested_class(&self) -> Option<SchemaId> {
        self.decorators.iter().find_map(|decorator| match decorator {
            PropertyDecorator::InstantiateObject { class } => Some(*class),
            PropertyDecorator::IntToFloat => None,
        })
    }
}

/// Converts a JSON key into an accessor identifier (`first-name` -> `firstName`).
/// Prefixes with `_` if the result is empty or starts with a digit.
#[must_use]
pub fn attribute_name(key: &str) -> String {
    let base: String = key.to_lower_camel_case();
    if base.is_empty() || base.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("_{base}")
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_type_of_distinguishes_integer_and_number() {
        assert_eq!(JsonType::of(&json!(1)), JsonType::Integer);
        assert_eq!(JsonType::of(&json!(1.5)), JsonType::Number);
        assert_eq!(JsonType::of(&json!("")), JsonType::String);
        assert_eq!(JsonType::of(&json!(null)), JsonType::Null);
    }

    #[test]
    fn number_accepts_integer_but_not_vice_versa() {
        assert!(JsonType::Number.accepts(&json!(3)));
        assert!(!JsonType::Integer.accepts(&json!(3.5)));
    }

    #[test]
    fn string_accepts_any_string_content() {
        for value in [json!(""), json!("   "), json!("Hello")] {
            assert!(JsonType::String.accepts(&value));
        }
    }

    #[test]
    fn property_type_is_an_ordered_set() {
        let mut property_type = PropertyType::from_json_types(&[
            JsonType::String,
            JsonType::Null,
            JsonType::Integer,
        ]);
        property_type.push(TypeName::Json(JsonType::String));
        assert_eq!(
            property_type.names(),
            &[
                TypeName::Json(JsonType::String),
                TypeName::Json(JsonType::Integer)
            ]
        );
        assert!(property_type.is_nullable());
        assert_eq!(property_type.to_string(), "[string, integer, null]");
    }

    #[test]
    fn overlap_treats_integer_as_number() {
        let number = PropertyType::from_json_types(&[JsonType::Number]);
        let integer = PropertyType::from_json_types(&[JsonType::Integer]);
        let string = PropertyType::from_json_types(&[JsonType::String]);
        assert!(number.overlaps(&integer));
        assert!(!string.overlaps(&integer));
    }

    #[test]
    fn describe_types_brackets_lists() {
        assert_eq!(describe_types(&[JsonType::String]), "string");
        assert_eq!(
            describe_types(&[JsonType::String, JsonType::Null]),
            "[string, null]"
        );
    }

    #[test]
    fn attribute_names_are_identifiers() {
        assert_eq!(attribute_name("first-name"), "firstName");
        assert_eq!(attribute_name("foo_bar"), "fooBar");
        assert_eq!(attribute_name("1st"), "_1st");
    }

    #[test]
    fn untyped_property_is_nullable() {
        assert!(Property::new("any", None).is_nullable());
        let typed = Property::new("name", Some(PropertyType::from_json_types(&[JsonType::String])));
        assert!(!typed.is_nullable());
    }
}

//! Compiled schemas and the per-document arena holding them.

use crate::filter::SerializerRef;
use crate::property::{Property, PropertyType};
use crate::settings::GeneratorConfiguration;
use crate::validator::{Validator, ValidatorKind};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Index of a schema within its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SchemaId(usize);

impl SchemaId {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Template a renderer uses for a generated method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MethodTemplate {
    GetAdditionalProperty,
    SetAdditionalProperty,
    RemoveAdditionalProperty,
    SerializeAdditionalProperties,
    GetPatternProperties,
}

impl MethodTemplate {
    /// Stable template identifier.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::GetAdditionalProperty => "getAdditionalProperty",
            Self::SetAdditionalProperty => "setAdditionalProperty",
            Self::RemoveAdditionalProperty => "removeAdditionalProperty",
            Self::SerializeAdditionalProperties => "serializeAdditionalProperties",
            Self::GetPatternProperties => "getPatternProperties",
        }
    }
}

/// Substitution value handed to the renderer.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Null,
    Integer(u64),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Type(PropertyType),
    Property(Box<Property>),
    Serializer(SerializerRef),
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedMethod {
    pub template: MethodTemplate,
    pub values: BTreeMap<String, TemplateValue>,
}

impl GeneratedMethod {
    #[must_use]
    pub const fn new(template: MethodTemplate) -> Self {
        Self {
            template,
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, name: &str, value: TemplateValue) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<&TemplateValue> {
        self.values.get(name)
    }
}

/// Compiled representation of one class-producing JSON Schema node.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    id: SchemaId,
    class_name: String,
    file: String,
    /// JSON Pointer of the node within its file.
    pointer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    properties: Vec<Property>,
    base_validators: Vec<Validator>,
    methods: Vec<GeneratedMethod>,
    #[serde(skip)]
    json: Value,
}

impl Schema {
    #[must_use]
    pub fn new(id: SchemaId, class_name: String, file: String, pointer: String, json: Value) -> Self {
        Self {
            id,
            class_name,
            file,
            pointer,
            description: None,
            properties: Vec::new(),
            base_validators: Vec::new(),
            methods: Vec::new(),
            json,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SchemaId {
        self.id
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    /// Raw JSON this schema was compiled from.
    #[must_use]
    pub const fn json(&self) -> &Value {
        &self.json
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|property| property.name() == name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties
            .iter_mut()
            .find(|property| property.name() == name)
    }

    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Adds a property. Returns false (and drops it) if the name is taken.
    #[must_use]
    pub fn add_property(&mut self, property: Property) -> bool {
        if self.has_property(property.name()) {
            return false;
        }
        self.properties.push(property);
        true
    }

    /// Names of properties backed by the schema (internal slots excluded).
    #[must_use]
    pub fn declared_property_names(&self) -> Vec<String> {
        self.properties
            .iter()
            .filter(|property| !property.is_internal())
            .map(|property| property.name().to_string())
            .collect()
    }

    #[must_use]
    pub fn base_validators(&self) -> &[Validator] {
        &self.base_validators
    }

    pub fn base_validators_mut(&mut self) -> &mut [Validator] {
        &mut self.base_validators
    }

    pub fn add_base_validator(&mut self, validator: Validator) {
        self.base_validators.push(validator);
    }

    /// True if any base validator matches `predicate`.
    pub fn has_base_validator(&self, predicate: impl Fn(&ValidatorKind) -> bool) -> bool {
        self.base_validators
            .iter()
            .any(|validator| predicate(&validator.kind))
    }

    #[must_use]
    pub fn methods(&self) -> &[GeneratedMethod] {
        &self.methods
    }

    #[must_use]
    pub fn method(&self, template: MethodTemplate) -> Option<&GeneratedMethod> {
        self.methods.iter().find(|method| method.template == template)
    }

    pub fn add_method(&mut self, method: GeneratedMethod) {
        self.methods.push(method);
    }
}

/// Result of compiling one schema document.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledModel {
    root: SchemaId,
    configuration: GeneratorConfiguration,
    schemas: Vec<Schema>,
}

impl CompiledModel {
    #[must_use]
    pub const fn new(root: SchemaId, configuration: GeneratorConfiguration, schemas: Vec<Schema>) -> Self {
        Self {
            root,
            configuration,
            schemas,
        }
    }

    #[must_use]
    pub const fn root(&self) -> SchemaId {
        self.root
    }

    #[must_use]
    pub fn root_schema(&self) -> &Schema {
        &self.schemas[self.root.index()]
    }

    #[must_use]
    pub const fn configuration(&self) -> &GeneratorConfiguration {
        &self.configuration
    }

    #[must_use]
    pub fn schema(&self, id: SchemaId) -> Option<&Schema> {
        self.schemas.get(id.index())
    }

    #[must_use]
    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_keep_declaration_order_and_unique_names() {
        let mut schema = Schema::new(
            SchemaId::new(0),
            "Person".to_string(),
            "person.json".to_string(),
            String::new(),
            Value::Null,
        );
        for name in ["zeta", "alpha", "mid"] {
            assert!(schema.add_property(Property::new(name, None)));
        }
        assert!(!schema.add_property(Property::new("alpha", None)));
        let names: Vec<&str> = schema.properties().iter().map(Property::name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn declared_names_skip_internal_properties() {
        let mut schema = Schema::new(
            SchemaId::new(0),
            "Person".to_string(),
            "person.json".to_string(),
            String::new(),
            Value::Null,
        );
        assert!(schema.add_property(Property::new("name", None)));
        assert!(schema.add_property(Property::new("additionalProperties", None).with_internal(true)));
        assert_eq!(schema.declared_property_names(), vec!["name".to_string()]);
    }

    #[test]
    fn template_ids_are_stable() {
        assert_eq!(MethodTemplate::GetAdditionalProperty.id(), "getAdditionalProperty");
        assert_eq!(
            serde_json::to_value(MethodTemplate::RemoveAdditionalProperty).expect("serializable"),
            serde_json::json!("removeAdditionalProperty")
        );
    }
}

//! Second pass over every compiled schema of a document.

use crate::error::SchemaError;
use crate::filter::SerializerRef;
use crate::json_pointer;
use crate::model::{GeneratedMethod, MethodTemplate, Schema, TemplateValue};
use crate::pattern::Pattern;
use crate::property::{JsonType, Property, PropertyType};
use crate::settings::GeneratorConfiguration;
use crate::validator::{AdditionalPropertiesUpdate, Validator, ValidatorKind};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Name of the internal slot holding additional properties.
pub const ADDITIONAL_PROPERTIES_SLOT: &str = "additionalProperties";

/// Schema-level pass that augments an already compiled [`Schema`].
pub trait PostProcessor: Send + Sync {
    /// # Errors
    ///
    /// Returns a `SchemaError` if the schema cannot be augmented.
    fn process(&self, schema: &mut Schema, configuration: &GeneratorConfiguration) -> Result<(), SchemaError>;
}

/// Adds storage and accessors for additional properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdditionalPropertiesAccessorPostProcessor {
    add_for_models_without_definition: bool,
}

impl AdditionalPropertiesAccessorPostProcessor {
    /// `add_for_models_without_definition`: also handle schemas that have no
    /// `additionalProperties` keyword.
    #[must_use]
    pub const fn new(add_for_models_without_definition: bool) -> Self {
        Self {
            add_for_models_without_definition,
        }
    }
}

impl PostProcessor for AdditionalPropertiesAccessorPostProcessor {
    fn process(&self, schema: &mut Schema, configuration: &GeneratorConfiguration) -> Result<(), SchemaError> {
        let keyword: Option<&Value> = schema.json().get("additionalProperties");
        let skip: bool = match keyword {
            None => !self.add_for_models_without_definition || configuration.deny_additional_properties(),
            Some(Value::Bool(false)) => true,
            Some(_) => false,
        };
        if skip {
            return Ok(());
        }

        if schema.has_property(ADDITIONAL_PROPERTIES_SLOT) {
            return Err(SchemaError::KeywordConflict {
                keyword: "additionalProperties".to_string(),
                other: "properties".to_string(),
                pointer: json_pointer::format(schema.pointer(), "properties"),
                file: schema.file().to_string(),
            });
        }

        let validation_property: Option<Property> = collecting_validation_property(schema);
        let declared_properties: Vec<String> = schema.declared_property_names();
        let min_properties: Option<u64> = schema
            .json()
            .get("minProperties")
            .and_then(Value::as_u64);

        let mut slot: Property = Property::new(
            ADDITIONAL_PROPERTIES_SLOT,
            Some(PropertyType::from_json_types(&[JsonType::Object])),
        )
        .with_read_only(true)
        .with_internal(true);
        slot.set_default_value(Some(Value::Object(Map::new())));
        let added: bool = schema.add_property(slot);
        debug_assert!(added, "slot name checked above");

        let property_value: TemplateValue = validation_property
            .clone()
            .map_or(TemplateValue::Null, |property| TemplateValue::Property(Box::new(property)));
        let return_type: TemplateValue = validation_property
            .as_ref()
            .and_then(Property::property_type)
            .map_or(TemplateValue::Null, |property_type| {
                let mut nullable: PropertyType = property_type.clone();
                nullable.set_nullable(true);
                TemplateValue::Type(nullable)
            });

        schema.add_method(
            GeneratedMethod::new(MethodTemplate::GetAdditionalProperty)
                .with_value("validationProperty", property_value.clone())
                .with_value("returnType", return_type),
        );

        if configuration.has_serialization_enabled() {
            let serializer: TemplateValue = validation_property
                .as_ref()
                .and_then(transforming_serializer)
                .map_or(TemplateValue::Null, TemplateValue::Serializer);
            schema.add_method(
                GeneratedMethod::new(MethodTemplate::SerializeAdditionalProperties)
                    .with_value("serializer", serializer),
            );
        }

        if !configuration.is_immutable() {
            schema.add_method(
                GeneratedMethod::new(MethodTemplate::SetAdditionalProperty)
                    .with_value("validationProperty", property_value)
                    .with_value("declaredProperties", TemplateValue::List(declared_properties)),
            );
            schema.add_method(
                GeneratedMethod::new(MethodTemplate::RemoveAdditionalProperty).with_value(
                    "minProperties",
                    min_properties.map_or(TemplateValue::Null, TemplateValue::Integer),
                ),
            );
        }

        debug!(
            class = %schema.class_name(),
            mutable = !configuration.is_immutable(),
            serialization = configuration.has_serialization_enabled(),
            "added additional properties accessors"
        );
        Ok(())
    }
}

/// Marks the schema's `AdditionalPropertiesValidator` as collecting and
/// returns its validation property. Without one, an update validator keeping
/// the storage in sync is attached instead.
fn collecting_validation_property(schema: &mut Schema) -> Option<Property> {
    let mut found: bool = false;
    let mut validation_property: Option<Property> = None;
    for validator in schema.base_validators_mut() {
        if let ValidatorKind::AdditionalProperties(additional) = &mut validator.kind {
            additional.collect = true;
            validation_property = additional.validation_property().cloned();
            found = true;
        }
    }
    if !found {
        let pattern_properties: Vec<Pattern> = schema
            .base_validators()
            .iter()
            .filter_map(|validator| match &validator.kind {
                ValidatorKind::PatternProperties(pattern) => Some(pattern.pattern.clone()),
                _ => None,
            })
            .collect();
        let declared_properties: Vec<String> = schema.declared_property_names();
        let keyword: String = json_pointer::format(schema.pointer(), "additionalProperties");
        schema.add_base_validator(Validator::new(
            keyword,
            ValidatorKind::AdditionalPropertiesUpdate(AdditionalPropertiesUpdate {
                pattern_properties,
                declared_properties,
            }),
        ));
    }
    validation_property
}

fn transforming_serializer(property: &Property) -> Option<SerializerRef> {
    property.validators().iter().find_map(|validator| match &validator.kind {
        ValidatorKind::Filter(filter) => filter.serializer().cloned(),
        _ => None,
    })
}

/// Adds a getter returning all values whose keys match a pattern property.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternPropertiesAccessorPostProcessor;

impl PostProcessor for PatternPropertiesAccessorPostProcessor {
    fn process(&self, schema: &mut Schema, _configuration: &GeneratorConfiguration) -> Result<(), SchemaError> {
        let keys: BTreeMap<String, String> = schema
            .base_validators()
            .iter()
            .filter_map(|validator| match &validator.kind {
                ValidatorKind::PatternProperties(pattern) => {
                    Some((pattern.key.clone(), pattern.pattern.source().to_string()))
                }
                _ => None,
            })
            .collect();
        if keys.is_empty() {
            return Ok(());
        }
        debug!(class = %schema.class_name(), keys = keys.len(), "added pattern properties accessor");
        schema.add_method(
            GeneratedMethod::new(MethodTemplate::GetPatternProperties)
                .with_value("keys", TemplateValue::Map(keys)),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::SchemaProcessor;
    use serde_json::json;

    fn root_schema(json: &Value, configuration: &GeneratorConfiguration) -> Schema {
        let (root, schemas) = SchemaProcessor::new("test.json", json, configuration)
            .process()
            .expect("schema compiles");
        schemas.into_iter().nth(root.index()).expect("root schema")
    }

    fn templates(schema: &Schema) -> Vec<MethodTemplate> {
        schema.methods().iter().map(|method| method.template).collect()
    }

    #[test]
    fn skips_models_without_keyword_by_default() {
        let configuration = GeneratorConfiguration::default();
        let mut schema = root_schema(&json!({ "properties": { "a": {} } }), &configuration);
        AdditionalPropertiesAccessorPostProcessor::default()
            .process(&mut schema, &configuration)
            .expect("processed");
        assert!(schema.methods().is_empty());
        assert!(!schema.has_property(ADDITIONAL_PROPERTIES_SLOT));
    }

    #[test]
    fn skips_denied_additional_properties() {
        let configuration = GeneratorConfiguration::default();
        let mut schema = root_schema(&json!({ "additionalProperties": false }), &configuration);
        AdditionalPropertiesAccessorPostProcessor::new(true)
            .process(&mut schema, &configuration)
            .expect("processed");
        assert!(schema.methods().is_empty());

        let deny = GeneratorConfiguration::default().with_deny_additional_properties(true);
        let mut schema = root_schema(&json!({ "type": "object" }), &deny);
        AdditionalPropertiesAccessorPostProcessor::new(true)
            .process(&mut schema, &deny)
            .expect("processed");
        assert!(schema.methods().is_empty());
    }

    #[test]
    fn immutable_models_only_get_a_getter() {
        let configuration = GeneratorConfiguration::default();
        let mut schema = root_schema(&json!({ "additionalProperties": true }), &configuration);
        AdditionalPropertiesAccessorPostProcessor::default()
            .process(&mut schema, &configuration)
            .expect("processed");
        assert_eq!(templates(&schema), vec![MethodTemplate::GetAdditionalProperty]);

        let slot = schema.property(ADDITIONAL_PROPERTIES_SLOT).expect("slot");
        assert!(slot.is_internal());
        assert!(slot.is_read_only());
        assert!(schema.declared_property_names().is_empty());
        assert!(schema.has_base_validator(|kind| matches!(kind, ValidatorKind::AdditionalPropertiesUpdate(_))));
    }

    #[test]
    fn mutable_models_get_setter_and_remover() {
        let configuration = GeneratorConfiguration::default()
            .with_immutable(false)
            .with_serialization(true);
        let mut schema = root_schema(
            &json!({
                "properties": { "name": { "type": "string" } },
                "additionalProperties": { "type": "string", "filter": "dateTime" },
                "minProperties": 2
            }),
            &configuration,
        );
        AdditionalPropertiesAccessorPostProcessor::default()
            .process(&mut schema, &configuration)
            .expect("processed");
        assert_eq!(
            templates(&schema),
            vec![
                MethodTemplate::GetAdditionalProperty,
                MethodTemplate::SerializeAdditionalProperties,
                MethodTemplate::SetAdditionalProperty,
                MethodTemplate::RemoveAdditionalProperty,
            ]
        );

        let remover = schema
            .method(MethodTemplate::RemoveAdditionalProperty)
            .expect("remover");
        assert!(matches!(remover.value("minProperties"), Some(TemplateValue::Integer(2))));
        let serializer = schema
            .method(MethodTemplate::SerializeAdditionalProperties)
            .expect("serializer");
        assert!(matches!(
            serializer.value("serializer"),
            Some(TemplateValue::Serializer(reference)) if reference.class == "DateTimeFilter"
        ));
        let getter = schema.method(MethodTemplate::GetAdditionalProperty).expect("getter");
        assert!(matches!(
            getter.value("returnType"),
            Some(TemplateValue::Type(return_type)) if return_type.is_nullable()
        ));
        assert!(schema.has_base_validator(|kind| matches!(
            kind,
            ValidatorKind::AdditionalProperties(additional) if additional.collect
        )));
    }

    #[test]
    fn property_named_like_the_slot_conflicts() {
        let configuration = GeneratorConfiguration::default();
        let mut schema = root_schema(
            &json!({
                "properties": { "additionalProperties": { "type": "string" } },
                "additionalProperties": true
            }),
            &configuration,
        );
        let error = AdditionalPropertiesAccessorPostProcessor::default()
            .process(&mut schema, &configuration)
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Keyword additionalProperties conflicts with properties at #/properties in file test.json"
        );
    }

    #[test]
    fn pattern_properties_getter_is_keyed() {
        let configuration = GeneratorConfiguration::default();
        let mut schema = root_schema(
            &json!({
                "patternProperties": {
                    "^x-": { "key": "extensions" },
                    "^s_": { "type": "string" }
                }
            }),
            &configuration,
        );
        PatternPropertiesAccessorPostProcessor
            .process(&mut schema, &configuration)
            .expect("processed");
        let method = schema
            .method(MethodTemplate::GetPatternProperties)
            .expect("pattern getter");
        let Some(TemplateValue::Map(keys)) = method.value("keys") else {
            panic!("keys map expected");
        };
        assert_eq!(keys.get("extensions").map(String::as_str), Some("^x-"));
        assert_eq!(keys.get("^s_").map(String::as_str), Some("^s_"));
    }
}

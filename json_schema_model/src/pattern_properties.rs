//! `patternProperties`, `additionalProperties` and `additionalItems`.

use crate::error::{PatternContext, SchemaError};
use crate::json_pointer;
use crate::model::Schema;
use crate::pattern::Pattern;
use crate::processor::{PropertyContext, SchemaProcessor};
use crate::property::{JsonType, Property, PropertyType, describe_types};
use crate::validator::{
    AdditionalItemsValidator, AdditionalPolicy, AdditionalPropertiesValidator, FilterValidator,
    PatternPropertiesValidator, Validator, ValidatorKind,
};
use serde_json::{Map, Value};
use tracing::{debug, trace};

impl SchemaProcessor<'_> {
    /// Compiles every pattern property into a base validator and hands the
    /// pattern's filters to the declared properties it matches. Returns the
    /// compiled patterns for the additional-properties check.
    pub(crate) fn process_pattern_properties(
        &mut self,
        schema: &mut Schema,
        pattern_properties: Option<&Map<String, Value>>,
        pointer: &str,
    ) -> Result<Vec<Pattern>, SchemaError> {
        let Some(pattern_properties) = pattern_properties else {
            return Ok(Vec::new());
        };
        let keyword_pointer: String = json_pointer::format(pointer, "patternProperties");
        let class_name: String = schema.class_name().to_string();

        let mut patterns: Vec<Pattern> = Vec::with_capacity(pattern_properties.len());
        for (source, sub_schema) in pattern_properties {
            let pattern: Pattern = Pattern::new(source).map_err(|error| {
                debug!(pattern = %source, %error, "invalid pattern property");
                SchemaError::InvalidPattern {
                    pattern: source.clone(),
                    context: PatternContext::PatternProperty,
                    file: self.file().to_string(),
                }
            })?;
            let sub_pointer: String = json_pointer::format(&keyword_pointer, source);
            let key: String = self
                .read(sub_schema, &sub_pointer)?
                .key
                .unwrap_or_else(|| source.clone());
            let property: Property = self.process_property(
                &class_name,
                &key,
                sub_schema,
                &sub_pointer,
                PropertyContext::pattern_property(),
            )?;
            let types: Option<Vec<JsonType>> = property.property_type().map(PropertyType::json_types);

            self.apply_to_matching_properties(schema, &pattern, &property)?;
            debug!(class = %class_name, pattern = %source, key = %key, "pattern property");
            schema.add_base_validator(Validator::new(
                sub_pointer,
                ValidatorKind::PatternProperties(PatternPropertiesValidator {
                    pattern: pattern.clone(),
                    key,
                    property: Box::new(property),
                    types,
                }),
            ));
            patterns.push(pattern);
        }
        Ok(patterns)
    }

    /// Declared properties whose name matches `pattern` must share a type with
    /// the pattern property and receive its filters.
    fn apply_to_matching_properties(
        &self,
        schema: &mut Schema,
        pattern: &Pattern,
        pattern_property: &Property,
    ) -> Result<(), SchemaError> {
        let filters: Vec<(String, FilterValidator)> = pattern_property
            .validators()
            .iter()
            .filter_map(|validator| match &validator.kind {
                ValidatorKind::Filter(filter) => Some((validator.keyword.clone(), filter.clone())),
                _ => None,
            })
            .collect();
        let matching: Vec<String> = schema
            .declared_property_names()
            .into_iter()
            .filter(|name| pattern.is_match(name))
            .collect();

        for name in matching {
            let Some(declared) = schema.property_mut(&name) else {
                continue;
            };
            if let (Some(expected), Some(actual)) = (pattern_property.property_type(), declared.property_type())
                && !actual.overlaps(expected)
            {
                return Err(SchemaError::IncompatiblePatternPropertyType {
                    property: name,
                    pattern: pattern.source().to_string(),
                    expected: describe_types(&expected.json_types()),
                    actual: describe_types(&actual.json_types()),
                    file: self.file().to_string(),
                });
            }
            for (keyword, filter) in &filters {
                self.attach_filter(declared, filter.clone(), keyword)?;
            }
            trace!(property = %name, pattern = %pattern, filters = filters.len(), "pattern applies to declared property");
        }
        Ok(())
    }

    pub(crate) fn process_additional_properties(
        &mut self,
        schema: &mut Schema,
        keyword: Option<&Value>,
        patterns: Vec<Pattern>,
        pointer: &str,
    ) -> Result<(), SchemaError> {
        let keyword_pointer: String = json_pointer::format(pointer, "additionalProperties");
        let policy: AdditionalPolicy = match keyword {
            Some(Value::Bool(false)) => AdditionalPolicy::Deny,
            None if self.denies_additional_properties(schema.pointer()) => AdditionalPolicy::Deny,
            Some(Value::Bool(true)) | None => return Ok(()),
            Some(sub_schema) => {
                let class_name: String = schema.class_name().to_string();
                let property: Property = self.process_property(
                    &class_name,
                    "additional property",
                    sub_schema,
                    &keyword_pointer,
                    PropertyContext::declared(true),
                )?;
                AdditionalPolicy::Validate(Box::new(property))
            }
        };

        debug!(class = %schema.class_name(), deny = matches!(policy, AdditionalPolicy::Deny), "additional properties");
        let declared_properties: Vec<String> = schema.declared_property_names();
        schema.add_base_validator(Validator::new(
            keyword_pointer,
            ValidatorKind::AdditionalProperties(AdditionalPropertiesValidator {
                declared_properties,
                patterns,
                policy,
                collect: false,
            }),
        ));
        Ok(())
    }

    /// Extra positions of a tuple array (`items` given as a list).
    pub(crate) fn process_additional_items(
        &mut self,
        property: &mut Property,
        owner: &str,
        keyword: Option<&Value>,
        tuple_length: usize,
        pointer: &str,
    ) -> Result<(), SchemaError> {
        let keyword_pointer: String = json_pointer::format(pointer, "additionalItems");
        let policy: AdditionalPolicy = match keyword {
            Some(Value::Bool(false)) => AdditionalPolicy::Deny,
            Some(Value::Bool(true)) | None => return Ok(()),
            Some(sub_schema) => AdditionalPolicy::Validate(Box::new(self.process_property(
                owner,
                "additional item",
                sub_schema,
                &keyword_pointer,
                PropertyContext::declared(true),
            )?)),
        };
        property.add_validator(Validator::new(
            keyword_pointer,
            ValidatorKind::AdditionalItems(AdditionalItemsValidator {
                tuple_length,
                policy,
            }),
        ));
        Ok(())
    }
}

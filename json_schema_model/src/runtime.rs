//! Reference interpreter for a [`CompiledModel`].
//!
//! Generated classes validate their raw input when they are constructed.
//! [`ModelInstance`] evaluates the compiled validators, decorators, filters
//! and composition outcomes in the same order, so the behaviour a renderer
//! has to reproduce can be exercised directly.

use crate::filter::FilterOperation;
use crate::model::{CompiledModel, GeneratedMethod, MethodTemplate, Schema, SchemaId, TemplateValue};
use crate::property::{JsonType, Property, PropertyDecorator, PropertyType};
use crate::validator::{
    AdditionalItemsValidator, AdditionalPolicy, ArrayItemsValidator, ComposedValidator,
    CompositionKind, ErrorKind, FilterValidator, PropertyValidator, TupleItemsValidator,
    ValidatorKind, is_additional_key,
};
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// A failed constraint, reported by generated code at runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Violation {
    pub kind: ErrorKind,
    pub params: BTreeMap<String, String>,
    pub message: String,
    /// Violations of a nested object, array item or additional value.
    pub nested: Vec<Violation>,
}

impl Violation {
    #[must_use]
    pub fn new(kind: ErrorKind, params: BTreeMap<String, String>) -> Self {
        let message: String = kind.render(&params);
        Self {
            kind,
            params,
            message,
            nested: Vec::new(),
        }
    }

    fn of<const N: usize>(kind: ErrorKind, params: [(&str, String); N]) -> Self {
        Self::new(
            kind,
            params
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    fn with_nested(mut self, nested: Vec<Self>) -> Self {
        self.nested = nested;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("{}", format_violations(.0))]
    Validation(Vec<Violation>),

    #[error("Method {template} is not generated for class {class}")]
    MethodNotGenerated { template: &'static str, class: String },

    #[error("Serialization is not enabled for class {class}")]
    SerializationDisabled { class: String },

    #[error("Unknown pattern property key {key} for class {class}")]
    UnknownPatternProperty { key: String, class: String },

    #[error("Unknown schema #{0}")]
    UnknownSchema(usize),

    #[error("Provided JSON for {class} must be an object, got {actual}")]
    NotAnObject { class: String, actual: String },
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|violation| violation.message.as_str())
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Stored value of a property.
#[derive(Debug, Clone)]
pub enum FieldValue<'m> {
    Json(Value),
    Object(Box<ModelInstance<'m>>),
    /// Output of the `dateTime` filter.
    DateTime(DateTime<FixedOffset>),
}

impl<'m> FieldValue<'m> {
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Object(_) | Self::DateTime(_) => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ModelInstance<'m>> {
        match self {
            Self::Object(instance) => Some(instance.as_ref()),
            Self::Json(_) | Self::DateTime(_) => None,
        }
    }

    #[must_use]
    pub const fn as_date_time(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::DateTime(date_time) => Some(date_time),
            Self::Json(_) | Self::Object(_) => None,
        }
    }

    /// JSON form, with transformed values run through their serializer.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Object(instance) => Value::Object(instance.to_json_map()),
            Self::DateTime(date_time) => Value::String(date_time.to_rfc3339()),
        }
    }
}

type Entries<'m> = Vec<(String, FieldValue<'m>)>;

/// A validated instance of one compiled class.
#[derive(Debug, Clone)]
pub struct ModelInstance<'m> {
    model: &'m CompiledModel,
    schema: &'m Schema,
    raw: Map<String, Value>,
    fields: Entries<'m>,
    additional: Entries<'m>,
    /// Matched values per pattern accessor key.
    pattern_values: BTreeMap<String, Entries<'m>>,
}

impl<'m> ModelInstance<'m> {
    /// Validates `raw` against the class `id` and builds the instance.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Validation` with every violation (or only the
    /// first one when the model was compiled with `collect_errors` off).
    pub fn from_raw(model: &'m CompiledModel, id: SchemaId, raw: Value) -> Result<Self, RuntimeError> {
        let schema: &'m Schema = model
            .schema(id)
            .ok_or(RuntimeError::UnknownSchema(id.index()))?;
        let raw: Map<String, Value> = match raw {
            Value::Object(raw) => raw,
            other => {
                return Err(RuntimeError::NotAnObject {
                    class: schema.class_name().to_string(),
                    actual: JsonType::of(&other).to_string(),
                });
            }
        };

        let evaluator: Evaluator<'m> = Evaluator::new(model);
        let mut violations: Violations = Violations::new(evaluator.collect);
        let instance: Option<Self> = evaluator.instantiate(schema, raw, &mut violations).ok();
        match instance {
            Some(instance) if violations.items.is_empty() => {
                debug!(class = %schema.class_name(), "instantiated model");
                Ok(instance)
            }
            _ => Err(RuntimeError::Validation(violations.items)),
        }
    }

    #[must_use]
    pub const fn schema(&self) -> &'m Schema {
        self.schema
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        self.schema.class_name()
    }

    /// The input exactly as provided (plus additional properties set later).
    #[must_use]
    pub const fn raw_input(&self) -> &Map<String, Value> {
        &self.raw
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue<'m>> {
        entry(&self.fields, name)
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::MethodNotGenerated` if the class has no
    /// additional-properties accessors.
    pub fn additional_properties(&self) -> Result<&[(String, FieldValue<'m>)], RuntimeError> {
        self.method(MethodTemplate::GetAdditionalProperty)?;
        Ok(&self.additional)
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::MethodNotGenerated` if the class has no
    /// additional-properties getter.
    pub fn additional_property(&self, key: &str) -> Result<Option<&FieldValue<'m>>, RuntimeError> {
        self.method(MethodTemplate::GetAdditionalProperty)?;
        Ok(entry(&self.additional, key))
    }

    /// Adds or replaces an additional property.
    ///
    /// # Errors
    ///
    /// Rejects keys of declared properties and values failing the
    /// additional-properties schema. Returns `RuntimeError::MethodNotGenerated`
    /// for immutable models.
    pub fn set_additional_property(&mut self, key: &str, value: Value) -> Result<(), RuntimeError> {
        let method: &'m GeneratedMethod = self.method(MethodTemplate::SetAdditionalProperty)?;
        let declared: bool = match method.value("declaredProperties") {
            Some(TemplateValue::List(names)) => names.iter().any(|name| name == key),
            _ => self.schema.has_property(key),
        };
        if declared {
            return Err(RuntimeError::Validation(vec![Violation::of(
                ErrorKind::RegularPropertyAsAdditionalProperty,
                [("key", key.to_string()), ("class", self.class_name().to_string())],
            )]));
        }

        let field: FieldValue<'m> = match method.value("validationProperty") {
            Some(TemplateValue::Property(property)) => {
                let evaluator: Evaluator<'m> = Evaluator::new(self.model);
                let (field, nested) =
                    isolated(evaluator.collect, |violations| evaluator.property_value(property, key, &value, violations));
                match field {
                    Some(field) if nested.is_empty() => field,
                    _ => {
                        return Err(RuntimeError::Validation(vec![
                            Violation::of(
                                ErrorKind::InvalidAdditionalProperty,
                                [("property", self.class_name().to_string()), ("key", key.to_string())],
                            )
                            .with_nested(nested),
                        ]));
                    }
                }
            }
            _ => FieldValue::Json(value.clone()),
        };

        self.raw.insert(key.to_string(), value);
        match self.additional.iter_mut().find(|(name, _)| name == key) {
            Some((_, existing)) => *existing = field,
            None => self.additional.push((key.to_string(), field)),
        }
        debug!(class = %self.class_name(), key, "set additional property");
        Ok(())
    }

    /// Removes an additional property. Returns false if it was not set.
    ///
    /// # Errors
    ///
    /// Fails if the object would be left with fewer properties than
    /// `minProperties`. Returns `RuntimeError::MethodNotGenerated` for
    /// immutable models.
    pub fn remove_additional_property(&mut self, key: &str) -> Result<bool, RuntimeError> {
        let method: &'m GeneratedMethod = self.method(MethodTemplate::RemoveAdditionalProperty)?;
        let Some(position) = self.additional.iter().position(|(name, _)| name == key) else {
            return Ok(false);
        };
        let remaining: u64 = u64::try_from(self.raw.len().saturating_sub(1)).unwrap_or(u64::MAX);
        if let Some(TemplateValue::Integer(min)) = method.value("minProperties")
            && remaining < *min
        {
            return Err(RuntimeError::Validation(vec![Violation::of(
                ErrorKind::MinProperties,
                [("property", self.class_name().to_string()), ("limit", min.to_string())],
            )]));
        }
        self.additional.remove(position);
        self.raw.remove(key);
        debug!(class = %self.class_name(), key, "removed additional property");
        Ok(true)
    }

    /// Values whose keys match the pattern registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::UnknownPatternProperty` for keys the class does
    /// not declare.
    pub fn pattern_properties(&self, key: &str) -> Result<&[(String, FieldValue<'m>)], RuntimeError> {
        let method: &'m GeneratedMethod = self.method(MethodTemplate::GetPatternProperties)?;
        let known: bool = matches!(
            method.value("keys"),
            Some(TemplateValue::Map(keys)) if keys.contains_key(key)
        );
        if !known {
            return Err(RuntimeError::UnknownPatternProperty {
                key: key.to_string(),
                class: self.class_name().to_string(),
            });
        }
        Ok(self.pattern_values.get(key).map(Vec::as_slice).unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::SerializationDisabled` unless the model was
    /// compiled with serialization enabled.
    pub fn serialize(&self) -> Result<Value, RuntimeError> {
        if !self.model.configuration().has_serialization_enabled() {
            return Err(RuntimeError::SerializationDisabled {
                class: self.class_name().to_string(),
            });
        }
        Ok(Value::Object(self.to_json_map()))
    }

    fn method(&self, template: MethodTemplate) -> Result<&'m GeneratedMethod, RuntimeError> {
        self.schema
            .method(template)
            .ok_or_else(|| RuntimeError::MethodNotGenerated {
                template: template.id(),
                class: self.class_name().to_string(),
            })
    }

    fn to_json_map(&self) -> Map<String, Value> {
        let mut json: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        if self.schema.method(MethodTemplate::SerializeAdditionalProperties).is_some() {
            for (key, value) in &self.additional {
                json.entry(key.clone()).or_insert_with(|| value.to_json());
            }
        }
        json
    }

    fn reset(&mut self, names: &[String]) {
        for (name, value) in &mut self.fields {
            if names.contains(name) {
                trace!(class = %self.schema.class_name(), property = %name, "reset composition property");
                *value = FieldValue::Json(Value::Null);
            }
        }
    }
}

fn entry<'a, 'm>(entries: &'a [(String, FieldValue<'m>)], key: &str) -> Option<&'a FieldValue<'m>> {
    entries
        .iter()
        .find_map(|(name, value)| (name == key).then_some(value))
}

/// Marks a run stopped by its first violation.
struct Halt;

struct Violations {
    collect: bool,
    items: Vec<Violation>,
}

impl Violations {
    const fn new(collect: bool) -> Self {
        Self {
            collect,
            items: Vec::new(),
        }
    }

    fn push(&mut self, violation: Violation) -> Result<(), Halt> {
        trace!(kind = ?violation.kind, message = %violation.message, "violation");
        self.items.push(violation);
        if self.collect { Ok(()) } else { Err(Halt) }
    }
}

/// Runs `run` against a fresh collector and hands back its violations.
fn isolated<T>(collect: bool, run: impl FnOnce(&mut Violations) -> Result<T, Halt>) -> (Option<T>, Vec<Violation>) {
    let mut violations: Violations = Violations::new(collect);
    let result: Option<T> = run(&mut violations).ok();
    (result, violations.items)
}

/// What a composition leaves behind for the value it validated.
struct CompositionOutcome<'m> {
    /// Affected properties to reset to null.
    reset: Vec<String>,
    /// Instance of the single succeeded `oneOf` object branch.
    instance: Option<ModelInstance<'m>>,
}

#[derive(Clone, Copy)]
struct Evaluator<'m> {
    model: &'m CompiledModel,
    collect: bool,
}

impl<'m> Evaluator<'m> {
    fn new(model: &'m CompiledModel) -> Self {
        Self {
            model,
            collect: model.configuration().collect_errors(),
        }
    }

    fn instantiate(
        self,
        schema: &'m Schema,
        raw: Map<String, Value>,
        violations: &mut Violations,
    ) -> Result<ModelInstance<'m>, Halt> {
        let object: Value = Value::Object(raw.clone());
        let mut instance: ModelInstance<'m> = ModelInstance {
            model: self.model,
            schema,
            raw,
            fields: Vec::new(),
            additional: Vec::new(),
            pattern_values: BTreeMap::new(),
        };

        for property in schema.properties().iter().filter(|property| !property.is_internal()) {
            let value: FieldValue<'m> = match instance.raw.get(property.name()) {
                Some(value) => self.property_value(property, property.name(), value, violations)?,
                None => {
                    if property.is_required() {
                        violations.push(Violation::of(
                            ErrorKind::RequiredValue,
                            [("property", property.name().to_string())],
                        ))?;
                    }
                    FieldValue::Json(property.default_value().cloned().unwrap_or(Value::Null))
                }
            };
            instance.fields.push((property.name().to_string(), value));
        }

        let class: &'m str = schema.class_name();
        for validator in schema.base_validators() {
            match &validator.kind {
                ValidatorKind::Property(check) => self.check(check, class, &object, violations)?,
                ValidatorKind::Composed(composed) => {
                    let outcome: CompositionOutcome<'m> = self.composition(composed, class, &object, violations)?;
                    instance.reset(&outcome.reset);
                }
                ValidatorKind::AdditionalProperties(additional) => {
                    let keys: Vec<String> = additional.additional_keys(&instance.raw).cloned().collect();
                    match &additional.policy {
                        AdditionalPolicy::Deny => {
                            if !keys.is_empty() {
                                violations.push(Violation::of(
                                    ErrorKind::AdditionalProperties,
                                    [("property", class.to_string()), ("keys", keys.join(", "))],
                                ))?;
                            }
                        }
                        AdditionalPolicy::Validate(property) => {
                            for key in keys {
                                let value: Value = instance.raw.get(&key).cloned().unwrap_or(Value::Null);
                                let (field, nested) = isolated(self.collect, |nested| {
                                    self.property_value(property, &key, &value, nested)
                                });
                                if !nested.is_empty() {
                                    violations.push(
                                        Violation::of(
                                            ErrorKind::InvalidAdditionalProperty,
                                            [("property", class.to_string()), ("key", key)],
                                        )
                                        .with_nested(nested),
                                    )?;
                                } else if additional.collect
                                    && let Some(field) = field
                                {
                                    instance.additional.push((key, field));
                                }
                            }
                        }
                    }
                }
                ValidatorKind::AdditionalPropertiesUpdate(update) => {
                    let entries: Entries<'m> = instance
                        .raw
                        .iter()
                        .filter(|(key, _)| {
                            is_additional_key(key, &update.declared_properties, &update.pattern_properties)
                        })
                        .map(|(key, value)| (key.clone(), FieldValue::Json(value.clone())))
                        .collect();
                    instance.additional.extend(entries);
                }
                ValidatorKind::PatternProperties(pattern) => {
                    let matched: Vec<(String, Value)> = instance
                        .raw
                        .iter()
                        .filter(|(key, _)| pattern.pattern.is_match(key))
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    let mut entries: Entries<'m> = Vec::with_capacity(matched.len());
                    for (key, value) in matched {
                        let (field, nested) = isolated(self.collect, |nested| {
                            self.property_value(&pattern.property, &key, &value, nested)
                        });
                        if nested.is_empty() {
                            if let Some(field) = field {
                                entries.push((key, field));
                            }
                        } else {
                            for violation in nested {
                                violations.push(violation)?;
                            }
                        }
                    }
                    instance
                        .pattern_values
                        .entry(pattern.key.clone())
                        .or_default()
                        .extend(entries);
                }
                ValidatorKind::Filter(_)
                | ValidatorKind::Template(_)
                | ValidatorKind::AdditionalItems(_)
                | ValidatorKind::ArrayItems(_)
                | ValidatorKind::TupleItems(_) => {
                    trace!(class, keyword = %validator.keyword, "property validator on schema ignored");
                }
            }
        }
        Ok(instance)
    }

    /// Validates one present value: validating filters, validators,
    /// transforming filter, decorators.
    fn property_value(
        self,
        property: &Property,
        label: &str,
        value: &Value,
        violations: &mut Violations,
    ) -> Result<FieldValue<'m>, Halt> {
        if value.is_null() && property.property_type().is_some_and(PropertyType::is_nullable) {
            return Ok(FieldValue::Json(Value::Null));
        }

        let mut current: Value = value.clone();
        for validator in property.validators() {
            if let ValidatorKind::Filter(filter) = &validator.kind
                && !filter.is_transforming()
            {
                self.validating_filter(filter, label, &mut current, violations)?;
            }
        }

        let mut outcome: CompositionOutcome<'m> = CompositionOutcome {
            reset: Vec::new(),
            instance: None,
        };
        for validator in property.validators() {
            match &validator.kind {
                ValidatorKind::Property(check) => self.check(check, label, &current, violations)?,
                ValidatorKind::ArrayItems(items) => self.array_items(items, label, &current, violations)?,
                ValidatorKind::TupleItems(tuple) => self.tuple_items(tuple, label, &current, violations)?,
                ValidatorKind::AdditionalItems(additional) => {
                    self.additional_items(additional, label, &current, violations)?;
                }
                ValidatorKind::Composed(composed) => {
                    let composition: CompositionOutcome<'m> =
                        self.composition(composed, label, &current, violations)?;
                    outcome.reset.extend(composition.reset);
                    if outcome.instance.is_none() {
                        outcome.instance = composition.instance;
                    }
                }
                ValidatorKind::Template(template) => {
                    trace!(property = %label, template = %template.template, "template validator left to the renderer");
                }
                ValidatorKind::Filter(_)
                | ValidatorKind::AdditionalProperties(_)
                | ValidatorKind::AdditionalPropertiesUpdate(_)
                | ValidatorKind::PatternProperties(_) => {}
            }
        }

        for validator in property.validators() {
            if let ValidatorKind::Filter(filter) = &validator.kind
                && filter.is_transforming()
                && let Some(transformed) = self.transforming_filter(filter, label, &current, violations)?
            {
                return Ok(transformed);
            }
        }
        self.decorate(property, label, current, outcome, violations)
    }

    fn decorate(
        self,
        property: &Property,
        label: &str,
        mut current: Value,
        outcome: CompositionOutcome<'m>,
        violations: &mut Violations,
    ) -> Result<FieldValue<'m>, Halt> {
        for decorator in property.decorators() {
            match decorator {
                PropertyDecorator::IntToFloat => {
                    if (current.is_i64() || current.is_u64())
                        && let Some(float) = current.as_f64().and_then(Number::from_f64)
                    {
                        current = Value::Number(float);
                    }
                }
                PropertyDecorator::InstantiateObject { class } => {
                    let (Value::Object(object), Some(schema)) = (&current, self.model.schema(*class)) else {
                        continue;
                    };
                    let (instance, nested) =
                        isolated(self.collect, |nested| self.instantiate(schema, object.clone(), nested));
                    if nested.is_empty() {
                        if let Some(mut instance) = instance {
                            instance.reset(&outcome.reset);
                            return Ok(FieldValue::Object(Box::new(instance)));
                        }
                    } else if property.composition().is_some() {
                        // The owning composition reports the failure.
                        trace!(property = %label, "contributed property keeps its raw value");
                    } else {
                        violations.push(
                            Violation::of(ErrorKind::InvalidObject, [("property", label.to_string())])
                                .with_nested(nested),
                        )?;
                    }
                }
            }
        }
        if let Some(instance) = outcome.instance {
            return Ok(FieldValue::Object(Box::new(instance)));
        }
        Ok(FieldValue::Json(current))
    }

    fn check(
        self,
        check: &PropertyValidator,
        label: &str,
        value: &Value,
        violations: &mut Violations,
    ) -> Result<(), Halt> {
        if check.check.holds(value) {
            return Ok(());
        }
        let mut params: BTreeMap<String, String> = check.params.clone();
        params.insert("property".to_string(), label.to_string());
        params.insert("actual".to_string(), JsonType::of(value).to_string());
        violations.push(Violation::new(check.error, params))
    }

    fn validating_filter(
        self,
        filter: &FilterValidator,
        label: &str,
        current: &mut Value,
        violations: &mut Violations,
    ) -> Result<(), Halt> {
        match filter.filter.operation() {
            FilterOperation::Trim => {
                if let Value::String(text) = current {
                    *text = text.trim().to_string();
                }
            }
            FilterOperation::NotEmpty => {
                let empty: bool = match current {
                    Value::String(text) => text.is_empty(),
                    Value::Array(items) => items.is_empty(),
                    _ => false,
                };
                if empty {
                    violations.push(filter_violation(filter, label))?;
                }
            }
            FilterOperation::DateTime | FilterOperation::External { .. } => {
                trace!(property = %label, filter = %filter.filter.token(), "filter left to the renderer");
            }
        }
        Ok(())
    }

    fn transforming_filter(
        self,
        filter: &FilterValidator,
        label: &str,
        current: &Value,
        violations: &mut Violations,
    ) -> Result<Option<FieldValue<'m>>, Halt> {
        match (filter.filter.operation(), current) {
            (FilterOperation::DateTime, Value::String(text)) => match DateTime::parse_from_rfc3339(text) {
                Ok(date_time) => Ok(Some(FieldValue::DateTime(date_time))),
                Err(error) => {
                    trace!(property = %label, %error, "dateTime filter rejected value");
                    violations.push(filter_violation(filter, label))?;
                    Ok(None)
                }
            },
            _ => {
                trace!(property = %label, filter = %filter.filter.token(), "filter left to the renderer");
                Ok(None)
            }
        }
    }

    fn array_items(
        self,
        items: &ArrayItemsValidator,
        label: &str,
        value: &Value,
        violations: &mut Violations,
    ) -> Result<(), Halt> {
        let Some(array) = value.as_array() else {
            return Ok(());
        };
        for (index, item) in array.iter().enumerate() {
            let (_, nested) = isolated(self.collect, |nested| {
                self.property_value(&items.item, items.item.name(), item, nested)
            });
            if !nested.is_empty() {
                violations.push(item_violation(ErrorKind::InvalidItem, label, index).with_nested(nested))?;
            }
        }
        Ok(())
    }

    fn tuple_items(
        self,
        tuple: &TupleItemsValidator,
        label: &str,
        value: &Value,
        violations: &mut Violations,
    ) -> Result<(), Halt> {
        let Some(array) = value.as_array() else {
            return Ok(());
        };
        for (index, (item, property)) in array.iter().zip(&tuple.items).enumerate() {
            let (_, nested) =
                isolated(self.collect, |nested| self.property_value(property, property.name(), item, nested));
            if !nested.is_empty() {
                violations.push(item_violation(ErrorKind::InvalidItem, label, index).with_nested(nested))?;
            }
        }
        Ok(())
    }

    fn additional_items(
        self,
        additional: &AdditionalItemsValidator,
        label: &str,
        value: &Value,
        violations: &mut Violations,
    ) -> Result<(), Halt> {
        let Some(array) = value.as_array() else {
            return Ok(());
        };
        if array.len() <= additional.tuple_length {
            return Ok(());
        }
        match &additional.policy {
            AdditionalPolicy::Deny => violations.push(Violation::of(
                ErrorKind::AdditionalItems,
                [
                    ("property", label.to_string()),
                    ("limit", additional.tuple_length.to_string()),
                    ("count", array.len().to_string()),
                ],
            )),
            AdditionalPolicy::Validate(property) => {
                for (index, item) in array.iter().enumerate().skip(additional.tuple_length) {
                    let (_, nested) =
                        isolated(self.collect, |nested| self.property_value(property, property.name(), item, nested));
                    if !nested.is_empty() {
                        violations.push(
                            item_violation(ErrorKind::InvalidAdditionalItem, label, index).with_nested(nested),
                        )?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Evaluates every branch against `value` and checks the success count.
    fn composition(
        self,
        composed: &ComposedValidator,
        label: &str,
        value: &Value,
        violations: &mut Violations,
    ) -> Result<CompositionOutcome<'m>, Halt> {
        let mut succeeded: Vec<bool> = Vec::with_capacity(composed.branches.len());
        let mut instance: Option<ModelInstance<'m>> = None;
        for branch in &composed.branches {
            let (field, failures) = isolated(false, |nested| self.property_value(branch, label, value, nested));
            let passed: bool = failures.is_empty();
            if passed
                && instance.is_none()
                && let Some(FieldValue::Object(branch_instance)) = field
            {
                instance = Some(*branch_instance);
            }
            succeeded.push(passed);
        }

        let count: usize = succeeded.iter().filter(|passed| **passed).count();
        trace!(
            property = %label,
            keyword = composed.kind.keyword(),
            succeeded = count,
            branches = succeeded.len(),
            "evaluated composition"
        );
        if !composed.predicate.accepts(count) {
            violations.push(Violation::of(
                composed.kind.error(),
                [("property", label.to_string()), ("succeeded", count.to_string())],
            ))?;
        }
        Ok(CompositionOutcome {
            reset: composed
                .properties_to_reset(&succeeded)
                .into_iter()
                .map(str::to_string)
                .collect(),
            instance: instance.filter(|_| composed.kind == CompositionKind::OneOf),
        })
    }
}

fn filter_violation(filter: &FilterValidator, label: &str) -> Violation {
    Violation::of(
        ErrorKind::Filter,
        [("property", label.to_string()), ("filter", filter.filter.token().to_string())],
    )
}

fn item_violation(kind: ErrorKind, label: &str, index: usize) -> Violation {
    Violation::of(kind, [("property", label.to_string()), ("index", index.to_string())])
}

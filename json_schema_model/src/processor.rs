//! Schema processor: walks one schema document depth-first and builds the
//! arena of compiled [`Schema`]s.
//!
//! Every class-producing node is keyed by its JSON Pointer. An id is reserved
//! before the node is processed, so recursive `$ref`s to an object schema
//! resolve to the reserved id instead of recursing forever. References to
//! non-object schemas are inlined; the `resolving` set detects cycles among
//! those.

use crate::error::{PatternContext, SchemaError, SchemaIssue, SchemaIssueKind};
use crate::expr::{CmpOp, Expr};
use crate::filter::{self, FilterKind};
use crate::json_pointer;
use crate::model::{Schema, SchemaId};
use crate::pattern::Pattern;
use crate::property::{
    JsonType, Property, PropertyDecorator, PropertyType, TypeName, describe_types,
};
use crate::schema::{JsonSchema, KeywordValue};
use crate::settings::{FormatValidator, GeneratorConfiguration};
use crate::validator::{
    ArrayItemsValidator, ErrorKind, FilterValidator, PropertyTemplateValidator,
    PropertyValidator, TupleItemsValidator, Validator, ValidatorKind,
};
use heck::ToUpperCamelCase;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, trace};

/// How a property slot is being compiled.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PropertyContext {
    pub required: bool,
    /// Error raised when the value has the wrong type.
    pub type_error: ErrorKind,
}

impl PropertyContext {
    pub(crate) const fn declared(required: bool) -> Self {
        Self {
            required,
            type_error: ErrorKind::InvalidType,
        }
    }

    pub(crate) const fn pattern_property() -> Self {
        Self {
            required: true,
            type_error: ErrorKind::InvalidPatternPropertyType,
        }
    }
}

pub struct SchemaProcessor<'a> {
    file: String,
    document: &'a Value,
    configuration: &'a GeneratorConfiguration,
    schemas: Vec<Option<Schema>>,
    by_pointer: BTreeMap<String, SchemaId>,
    /// Non-object `$ref` targets currently being inlined.
    resolving: BTreeSet<String>,
    /// Pointers compiled as object-level composition branches.
    composition_branches: BTreeSet<String>,
    class_names: BTreeMap<String, usize>,
}

impl<'a> SchemaProcessor<'a> {
    #[must_use]
    pub fn new(file: &str, document: &'a Value, configuration: &'a GeneratorConfiguration) -> Self {
        Self {
            file: file.to_string(),
            document,
            configuration,
            schemas: Vec::new(),
            by_pointer: BTreeMap::new(),
            resolving: BTreeSet::new(),
            composition_branches: BTreeSet::new(),
            class_names: BTreeMap::new(),
        }
    }

    /// Compiles the whole document starting at its root.
    ///
    /// # Errors
    ///
    /// Returns the first `SchemaError` hit while walking the document.
    pub fn process(mut self) -> Result<(SchemaId, Vec<Schema>), SchemaError> {
        let document: &Value = self.document;
        let (pointer, root) = self.dereference("", document)?;
        let keywords: JsonSchema = self.read(&root, &pointer)?;
        let names: Vec<&str> = keywords.type_names();
        if !names.is_empty() && !keywords.is_object() {
            return Err(SchemaError::InvalidRoot {
                file: self.file.clone(),
            });
        }

        let hint: String = Path::new(&self.file)
            .file_stem()
            .map_or_else(|| "Schema".to_string(), |stem| stem.to_string_lossy().into_owned());
        self.collect_composition_branches("", document);
        let root_id: SchemaId = self.process_schema(&pointer, &root, &hint)?;
        debug!(file = %self.file, schemas = self.schemas.len(), "processed schema document");
        Ok((root_id, self.schemas.into_iter().flatten().collect()))
    }

    pub(crate) fn file(&self) -> &str {
        &self.file
    }

    /// Compiled schema for `id`, or `None` while it is still being processed.
    pub(crate) fn schema(&self, id: SchemaId) -> Option<&Schema> {
        self.schemas.get(id.index()).and_then(Option::as_ref)
    }

    /// Reserves an arena slot for `pointer`.
    pub(crate) fn reserve(&mut self, pointer: &str) -> SchemaId {
        let id: SchemaId = SchemaId::new(self.schemas.len());
        self.schemas.push(None);
        self.by_pointer.insert(pointer.to_string(), id);
        id
    }

    pub(crate) fn reserved(&self, pointer: &str) -> Option<SchemaId> {
        self.by_pointer.get(pointer).copied()
    }

    pub(crate) fn store(&mut self, schema: Schema) {
        let index: usize = schema.id().index();
        if let Some(slot) = self.schemas.get_mut(index) {
            *slot = Some(schema);
        }
    }

    /// Records the target of every composition branch before any class is
    /// built, so a definition reached both as a property and as a branch is
    /// treated the same whichever use is compiled first.
    fn collect_composition_branches(&mut self, pointer: &str, json: &Value) {
        match json {
            Value::Object(keywords) => {
                for (keyword, value) in keywords {
                    let mut child: String = json_pointer::format(pointer, keyword);
                    match (keyword.as_str(), value) {
                        ("enum" | "const" | "default" | "examples", _) => continue,
                        ("properties" | "patternProperties" | "definitions" | "$defs", Value::Object(named)) => {
                            for (name, schema) in named {
                                self.collect_composition_branches(&json_pointer::format(&child, name), schema);
                            }
                            continue;
                        }
                        ("allOf" | "anyOf" | "oneOf", Value::Array(branches)) => {
                            for (index, branch) in branches.iter().enumerate() {
                                self.mark_composition_branch(&json_pointer::format(&child, &index.to_string()), branch);
                            }
                        }
                        // A `not` branch is compiled as branch 0 of the keyword.
                        ("not", branch) => {
                            child = json_pointer::format(&child, "0");
                            self.mark_composition_branch(&child, branch);
                        }
                        _ => {}
                    }
                    self.collect_composition_branches(&child, value);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.collect_composition_branches(&json_pointer::format(pointer, &index.to_string()), item);
                }
            }
            _ => {}
        }
    }

    fn mark_composition_branch(&mut self, pointer: &str, branch: &Value) {
        // Broken references are reported when the branch is compiled.
        if let Ok((target, _)) = self.dereference(pointer, branch) {
            self.composition_branches.insert(target);
        }
    }

    /// Unknown keys are denied by default, except on composition branches
    /// which only see part of the object.
    pub(crate) fn denies_additional_properties(&self, pointer: &str) -> bool {
        self.configuration.deny_additional_properties() && !self.composition_branches.contains(pointer)
    }

    /// Unique class name derived from `hint`.
    pub(crate) fn class_name(&mut self, hint: &str) -> String {
        let mut base: String = hint.to_upper_camel_case();
        if base.is_empty() || base.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            base = format!("Schema{base}");
        }
        let count: &mut usize = self.class_names.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}{count}")
        }
    }

    pub(crate) fn read(&self, json: &Value, pointer: &str) -> Result<JsonSchema, SchemaError> {
        JsonSchema::from_value(json).map_err(|error| SchemaError::MalformedSchema {
            file: self.file.clone(),
            issues: vec![SchemaIssue {
                path: pointer.to_string(),
                kind: SchemaIssueKind::Unreadable(error.to_string()),
            }],
        })
    }

    /// Follows a chain of in-document `$ref`s to the schema they point at.
    pub(crate) fn dereference(&self, pointer: &str, json: &Value) -> Result<(String, Value), SchemaError> {
        let mut pointer: String = pointer.to_string();
        let mut current: Value = json.clone();
        let mut seen: BTreeSet<String> = BTreeSet::new();

        while let Some(reference) = current.get("$ref").and_then(Value::as_str) {
            let reference: String = reference.to_string();
            let unresolved = || SchemaError::UnresolvedReference {
                reference: reference.clone(),
                file: self.file.clone(),
            };
            let target: &str = json_pointer::from_reference(&reference).ok_or_else(unresolved)?;
            if !seen.insert(target.to_string()) {
                return Err(SchemaError::CyclicReference {
                    reference: reference.clone(),
                    file: self.file.clone(),
                });
            }
            current = self.document.pointer(target).cloned().ok_or_else(unresolved)?;
            pointer = target.to_string();
            trace!(reference = %reference, "followed reference");
        }
        Ok((pointer, current))
    }

    /// Compiles an object schema into a class. Memoised by pointer.
    pub(crate) fn process_schema(
        &mut self,
        pointer: &str,
        json: &Value,
        class_hint: &str,
    ) -> Result<SchemaId, SchemaError> {
        if let Some(id) = self.reserved(pointer) {
            return Ok(id);
        }
        let keywords: JsonSchema = self.read(json, pointer)?;
        let id: SchemaId = self.reserve(pointer);
        let class_name: String = self.class_name(keywords.title.as_deref().unwrap_or(class_hint));
        debug!(class = %class_name, pointer, "creating schema");

        let mut schema: Schema = Schema::new(
            id,
            class_name.clone(),
            self.file.clone(),
            pointer.to_string(),
            json.clone(),
        );
        schema.set_description(keywords.description.clone());

        if let Some(properties) = &keywords.properties {
            let properties_pointer: String = json_pointer::format(pointer, "properties");
            for (name, property_json) in properties {
                let property_pointer: String = json_pointer::format(&properties_pointer, name);
                let context: PropertyContext =
                    PropertyContext::declared(keywords.required.contains(name));
                let property: Property =
                    self.process_property(&class_name, name, property_json, &property_pointer, context)?;
                let added: bool = schema.add_property(property);
                debug_assert!(added, "map keys are unique");
            }
        }
        for name in &keywords.required {
            if schema.add_property(Property::new(name.clone(), None).with_required(true)) {
                trace!(class = %class_name, property = %name, "required property without declaration");
            }
        }

        self.process_object_keywords(&mut schema, &keywords, pointer)?;
        for (kind, branches) in keywords.compositions() {
            self.process_object_composition(&mut schema, kind, &branches, pointer)?;
        }
        let patterns: Vec<Pattern> =
            self.process_pattern_properties(&mut schema, keywords.pattern_properties.as_ref(), pointer)?;
        self.process_additional_properties(
            &mut schema,
            keywords.additional_properties.as_ref(),
            patterns,
            pointer,
        )?;

        self.store(schema);
        Ok(id)
    }

    fn process_object_keywords(
        &self,
        schema: &mut Schema,
        keywords: &JsonSchema,
        pointer: &str,
    ) -> Result<(), SchemaError> {
        self.check_range(
            keywords.min_properties,
            keywords.max_properties,
            "minProperties",
            "maxProperties",
            pointer,
        )?;
        if let Some(min) = keywords.min_properties {
            schema.add_base_validator(Validator::property(
                json_pointer::format(pointer, "minProperties"),
                PropertyValidator::new(
                    Expr::PropertyCount {
                        cmp: CmpOp::Ge,
                        bound: min,
                    },
                    ErrorKind::MinProperties,
                )
                .with_param("limit", min),
            ));
        }
        if let Some(max) = keywords.max_properties {
            schema.add_base_validator(Validator::property(
                json_pointer::format(pointer, "maxProperties"),
                PropertyValidator::new(
                    Expr::PropertyCount {
                        cmp: CmpOp::Le,
                        bound: max,
                    },
                    ErrorKind::MaxProperties,
                )
                .with_param("limit", max),
            ));
        }
        Ok(())
    }

    /// Compiles one property slot: type, nested class, keyword validators,
    /// items, compositions and filters.
    pub(crate) fn process_property(
        &mut self,
        parent: &str,
        name: &str,
        json: &Value,
        pointer: &str,
        context: PropertyContext,
    ) -> Result<Property, SchemaError> {
        if json == &Value::Bool(false) {
            trace!(property = %name, "false schema");
            let mut property: Property = Property::new(name, None).with_required(context.required);
            property.add_validator(Validator::property(
                pointer,
                PropertyValidator::new(Expr::Any { exprs: Vec::new() }, ErrorKind::Forbidden),
            ));
            return Ok(property);
        }

        let keywords: JsonSchema = self.read(json, pointer)?;
        if let Some(reference) = &keywords.reference {
            return self.process_reference(parent, name, reference, &keywords, json, pointer, context);
        }

        let mut property: Property = Property::new(name, None)
            .with_required(context.required)
            .with_read_only(keywords.read_only);
        property.set_description(keywords.description.clone());
        property.set_default_value(keywords.default.as_option().cloned());

        if keywords.is_object() {
            let class: SchemaId =
                self.process_schema(pointer, json, &class_hint(parent, name, pointer))?;
            property.set_property_type(Some(PropertyType::new(
                vec![TypeName::Class(class)],
                keywords.allows_null(),
            )));
            property.add_decorator(PropertyDecorator::InstantiateObject { class });
        } else if keywords.r#type.is_some() {
            let types: Vec<JsonType> = keywords
                .type_names()
                .into_iter()
                .filter_map(JsonType::parse)
                .collect();
            property.set_property_type(Some(PropertyType::from_json_types(&types)));
        }

        // Object schemas handle their compositions in `process_schema`.
        if !keywords.is_object() {
            let owner: String = format!("{parent} {name}");
            for (kind, branches) in keywords.compositions() {
                self.process_property_composition(&mut property, &owner, kind, &branches, pointer)?;
            }
        }

        if !context.required
            && self.configuration.has_implicit_null()
            && let Some(property_type) = property.property_type_mut()
        {
            property_type.set_nullable(true);
        }

        if let Some(property_type) = property.property_type() {
            let types: Vec<JsonType> = property_type.json_types();
            if types.contains(&JsonType::Number) {
                property.add_decorator(PropertyDecorator::IntToFloat);
            }
            let keyword: String = if keywords.r#type.is_some() {
                json_pointer::format(pointer, "type")
            } else {
                pointer.to_string()
            };
            let expected: String = describe_types(&types);
            trace!(property = %name, expected = %expected, "type validator");
            property.add_validator(Validator::property(
                keyword,
                PropertyValidator::new(Expr::TypeOf { types }, context.type_error)
                    .with_param("expected", expected),
            ));
        }

        self.add_keyword_validators(&mut property, &keywords, pointer)?;
        self.process_items(&mut property, parent, &keywords, pointer)?;
        self.process_filters(&mut property, keywords.filter.as_ref(), pointer)?;
        Ok(property)
    }

    #[expect(clippy::too_many_arguments)]
    fn process_reference(
        &mut self,
        parent: &str,
        name: &str,
        reference: &str,
        keywords: &JsonSchema,
        json: &Value,
        pointer: &str,
        context: PropertyContext,
    ) -> Result<Property, SchemaError> {
        let (target_pointer, target) = self.dereference(pointer, json)?;
        debug!(property = %name, reference, target = %target_pointer, "resolved reference");

        let resolved: Property = if self.read(&target, &target_pointer)?.is_object() {
            self.process_property(parent, name, &target, &target_pointer, context)?
        } else {
            if !self.resolving.insert(target_pointer.clone()) {
                return Err(SchemaError::CyclicReference {
                    reference: reference.to_string(),
                    file: self.file.clone(),
                });
            }
            let result: Result<Property, SchemaError> =
                self.process_property(parent, name, &target, &target_pointer, context);
            self.resolving.remove(&target_pointer);
            result?
        };

        let mut property: Property = resolved.with_read_only(keywords.read_only);
        if keywords.description.is_some() {
            property.set_description(keywords.description.clone());
        }
        if let KeywordValue::Present(default) = &keywords.default {
            property.set_default_value(Some(default.clone()));
        }
        Ok(property)
    }

    fn check_range<T: PartialOrd>(
        &self,
        min: Option<T>,
        max: Option<T>,
        keyword: &str,
        other: &str,
        pointer: &str,
    ) -> Result<(), SchemaError> {
        if let (Some(min), Some(max)) = (min, max)
            && min > max
        {
            return Err(SchemaError::KeywordConflict {
                keyword: keyword.to_string(),
                other: other.to_string(),
                pointer: pointer.to_string(),
                file: self.file.clone(),
            });
        }
        Ok(())
    }

    fn add_keyword_validators(
        &self,
        property: &mut Property,
        keywords: &JsonSchema,
        pointer: &str,
    ) -> Result<(), SchemaError> {
        self.check_range(keywords.min_length, keywords.max_length, "minLength", "maxLength", pointer)?;
        self.check_range(keywords.minimum, keywords.maximum, "minimum", "maximum", pointer)?;
        self.check_range(keywords.min_items, keywords.max_items, "minItems", "maxItems", pointer)?;

        let mut add = |keyword: &str, validator: PropertyValidator| {
            trace!(property = %property.name(), keyword, "keyword validator");
            property.add_validator(Validator::property(
                json_pointer::format(pointer, keyword),
                validator,
            ));
        };

        if let Some(source) = &keywords.pattern {
            let pattern: Pattern = Pattern::new(source).map_err(|_| SchemaError::InvalidPattern {
                pattern: source.clone(),
                context: PatternContext::Property(property_name_of(pointer)),
                file: self.file.clone(),
            })?;
            add(
                "pattern",
                PropertyValidator::new(Expr::Matches { pattern }, ErrorKind::PatternMismatch)
                    .with_param("pattern", source),
            );
        }

        let lengths: [(&str, Option<u64>, CmpOp, ErrorKind); 2] = [
            ("minLength", keywords.min_length, CmpOp::Ge, ErrorKind::MinLength),
            ("maxLength", keywords.max_length, CmpOp::Le, ErrorKind::MaxLength),
        ];
        for (keyword, bound, cmp, error) in lengths {
            if let Some(bound) = bound {
                add(
                    keyword,
                    PropertyValidator::new(Expr::Length { cmp, bound }, error).with_param("limit", bound),
                );
            }
        }

        let bounds: [(&str, Option<f64>, CmpOp, ErrorKind); 4] = [
            ("minimum", keywords.minimum, CmpOp::Ge, ErrorKind::Minimum),
            ("maximum", keywords.maximum, CmpOp::Le, ErrorKind::Maximum),
            ("exclusiveMinimum", keywords.exclusive_minimum, CmpOp::Gt, ErrorKind::ExclusiveMinimum),
            ("exclusiveMaximum", keywords.exclusive_maximum, CmpOp::Lt, ErrorKind::ExclusiveMaximum),
        ];
        for (keyword, bound, cmp, error) in bounds {
            if let Some(bound) = bound {
                add(
                    keyword,
                    PropertyValidator::new(Expr::Number { cmp, bound }, error).with_param("limit", bound),
                );
            }
        }

        if let Some(divisor) = keywords.multiple_of {
            add(
                "multipleOf",
                PropertyValidator::new(Expr::MultipleOf { divisor }, ErrorKind::MultipleOf)
                    .with_param("limit", divisor),
            );
        }

        let item_counts: [(&str, Option<u64>, CmpOp, ErrorKind); 2] = [
            ("minItems", keywords.min_items, CmpOp::Ge, ErrorKind::MinItems),
            ("maxItems", keywords.max_items, CmpOp::Le, ErrorKind::MaxItems),
        ];
        for (keyword, bound, cmp, error) in item_counts {
            if let Some(bound) = bound {
                add(
                    keyword,
                    PropertyValidator::new(Expr::ItemCount { cmp, bound }, error).with_param("limit", bound),
                );
            }
        }

        if keywords.unique_items {
            add(
                "uniqueItems",
                PropertyValidator::new(Expr::UniqueItems, ErrorKind::UniqueItems),
            );
        }
        if let Some(values) = &keywords.r#enum {
            add(
                "enum",
                PropertyValidator::new(
                    Expr::InSet {
                        values: values.clone(),
                    },
                    ErrorKind::Enum,
                ),
            );
        }
        if let KeywordValue::Present(value) = &keywords.r#const {
            add(
                "const",
                PropertyValidator::new(
                    Expr::Equals {
                        value: value.clone(),
                    },
                    ErrorKind::Const,
                ),
            );
        }

        if let Some(format) = &keywords.format {
            match self.configuration.format(format) {
                Some(FormatValidator::Pattern(source)) => {
                    let pattern: Pattern =
                        Pattern::new(source).map_err(|_| SchemaError::InvalidPattern {
                            pattern: source.clone(),
                            context: PatternContext::Format(format.clone()),
                            file: self.file.clone(),
                        })?;
                    add(
                        "format",
                        PropertyValidator::new(Expr::Matches { pattern }, ErrorKind::Format)
                            .with_param("format", format),
                    );
                }
                Some(FormatValidator::Template(template)) => {
                    property.add_validator(Validator::new(
                        json_pointer::format(pointer, "format"),
                        ValidatorKind::Template(PropertyTemplateValidator {
                            template: template.clone(),
                            variables: BTreeMap::from([(
                                "format".to_string(),
                                Value::String(format.clone()),
                            )]),
                            error: ErrorKind::Format,
                        }),
                    ));
                }
                None => {
                    return Err(SchemaError::UnsupportedFormat {
                        format: format.clone(),
                        property: property.name().to_string(),
                        file: self.file.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn process_items(
        &mut self,
        property: &mut Property,
        parent: &str,
        keywords: &JsonSchema,
        pointer: &str,
    ) -> Result<(), SchemaError> {
        let items_pointer: String = json_pointer::format(pointer, "items");
        let owner: String = format!("{parent} {}", property.name());
        match &keywords.items {
            Some(Value::Array(items)) => {
                let mut tuple: Vec<Property> = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let item_pointer: String = json_pointer::format(&items_pointer, &index.to_string());
                    tuple.push(self.process_property(
                        &owner,
                        &format!("item {index}"),
                        item,
                        &item_pointer,
                        PropertyContext::declared(true),
                    )?);
                }
                let tuple_length: usize = tuple.len();
                property.add_validator(Validator::new(
                    items_pointer,
                    ValidatorKind::TupleItems(TupleItemsValidator { items: tuple }),
                ));
                self.process_additional_items(
                    property,
                    &owner,
                    keywords.additional_items.as_ref(),
                    tuple_length,
                    pointer,
                )?;
            }
            Some(item) => {
                let item: Property = self.process_property(
                    &owner,
                    "item",
                    item,
                    &items_pointer,
                    PropertyContext::declared(true),
                )?;
                property.add_validator(Validator::new(
                    items_pointer,
                    ValidatorKind::ArrayItems(ArrayItemsValidator {
                        item: Box::new(item),
                    }),
                ));
            }
            None => {}
        }
        Ok(())
    }

    fn process_filters(
        &self,
        property: &mut Property,
        keyword: Option<&Value>,
        pointer: &str,
    ) -> Result<(), SchemaError> {
        let Some(keyword) = keyword else {
            return Ok(());
        };
        let filter_pointer: String = json_pointer::format(pointer, "filter");
        let declarations: Vec<filter::FilterDeclaration> = filter::parse_declarations(keyword)
            .ok_or_else(|| SchemaError::MalformedSchema {
                file: self.file.clone(),
                issues: vec![SchemaIssue {
                    path: filter_pointer.clone(),
                    kind: SchemaIssueKind::InvalidFilter,
                }],
            })?;

        for declaration in declarations {
            let filter: filter::Filter = self
                .configuration
                .filters()
                .get(&declaration.token)
                .cloned()
                .ok_or_else(|| SchemaError::UnsupportedFilter {
                    filter: declaration.token.clone(),
                    property: property.name().to_string(),
                    file: self.file.clone(),
                })?;
            self.attach_filter(
                property,
                FilterValidator {
                    filter,
                    options: declaration.options,
                },
                &filter_pointer,
            )?;
        }
        Ok(())
    }

    /// Adds a filter to a property, checking type compatibility and the
    /// single-transforming-filter rule.
    pub(crate) fn attach_filter(
        &self,
        property: &mut Property,
        filter: FilterValidator,
        keyword: &str,
    ) -> Result<(), SchemaError> {
        if let Some(property_type) = property.property_type() {
            let types: Vec<JsonType> = property_type.json_types();
            if types.iter().any(|ty| !filter.filter.accepts(*ty)) {
                return Err(SchemaError::IncompatibleFilter {
                    filter: filter.filter.token().to_string(),
                    property: property.name().to_string(),
                    property_type: describe_types(&types),
                });
            }
        }

        let output_type: Option<String> = match filter.filter.kind() {
            FilterKind::Transforming { output_type, .. } => Some(output_type.clone()),
            FilterKind::Validating => None,
        };
        trace!(property = %property.name(), filter = %filter.filter.token(), "attach filter");
        property.add_validator(Validator::new(keyword, ValidatorKind::Filter(filter)));

        if property.transforming_filter_count() > 1 {
            return Err(SchemaError::MultipleTransformingFilters {
                property: property.name().to_string(),
            });
        }
        if let Some(output_type) = output_type
            && let Some(property_type) = property.property_type_mut()
        {
            property_type.push(TypeName::Native(output_type));
        }
        Ok(())
    }
}

/// Class name hint for a nested schema. Definitions are named after their key.
pub(crate) fn class_hint(parent: &str, name: &str, pointer: &str) -> String {
    match pointer.rsplit_once('/') {
        Some((container, _))
            if container.ends_with("/definitions") || container.ends_with("/$defs") =>
        {
            json_pointer::last_segment(pointer).unwrap_or_else(|| format!("{parent} {name}"))
        }
        _ => format!("{parent} {name}"),
    }
}

fn property_name_of(pointer: &str) -> String {
    json_pointer::last_segment(pointer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::CompositionKind;
    use serde_json::json;

    fn process(json: &Value) -> Result<(SchemaId, Vec<Schema>), SchemaError> {
        let configuration = GeneratorConfiguration::default();
        SchemaProcessor::new("test.json", json, &configuration).process()
    }

    fn process_ok(json: &Value) -> (SchemaId, Vec<Schema>) {
        process(json).expect("schema compiles")
    }

    #[test]
    fn root_class_named_after_file_or_title() {
        let (root, schemas) = process_ok(&json!({ "type": "object" }));
        assert_eq!(schemas[root.index()].class_name(), "Test");

        let (root, schemas) = process_ok(&json!({ "title": "the person", "type": "object" }));
        assert_eq!(schemas[root.index()].class_name(), "ThePerson");
    }

    #[test]
    fn false_property_schema_compiles_to_forbidding_validator() {
        let (root, schemas) = process_ok(&json!({ "properties": { "legacy": false } }));
        let property = schemas[root.index()].property("legacy").expect("legacy");
        assert!(property.property_type().is_none());
        assert_eq!(property.validators().len(), 1);
        assert_eq!(property.validators()[0].keyword, "/properties/legacy");
        let ValidatorKind::Property(check) = &property.validators()[0].kind else {
            panic!("expected a property validator");
        };
        assert_eq!(check.error, ErrorKind::Forbidden);
        assert!(!check.check.holds(&json!(null)));
        assert!(!check.check.holds(&json!("value")));
    }

    #[test]
    fn non_object_root_is_rejected() {
        let error = process(&json!({ "type": "string" })).unwrap_err();
        assert_eq!(error.to_string(), "Root schema of file test.json must describe an object");
    }

    #[test]
    fn properties_in_declaration_order_with_required_flags() {
        let (root, schemas) = process_ok(&json!({
            "type": "object",
            "properties": {
                "zeta": { "type": "string" },
                "alpha": { "type": "integer" }
            },
            "required": ["alpha", "undeclared"]
        }));
        let schema = &schemas[root.index()];
        let names: Vec<&str> = schema.properties().iter().map(Property::name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "undeclared"]);
        assert!(!schema.property("zeta").expect("zeta").is_required());
        assert!(schema.property("alpha").expect("alpha").is_required());
        assert!(schema.property("undeclared").expect("undeclared").property_type().is_none());
    }

    #[test]
    fn optional_properties_are_implicitly_nullable() {
        let (root, schemas) = process_ok(&json!({
            "properties": {
                "optional": { "type": "string" },
                "required": { "type": "string" }
            },
            "required": ["required"]
        }));
        let schema = &schemas[root.index()];
        assert!(schema.property("optional").expect("optional").is_nullable());
        assert!(!schema.property("required").expect("required").is_nullable());
    }

    #[test]
    fn number_properties_widen_integers() {
        let (root, schemas) = process_ok(&json!({
            "properties": { "price": { "type": "number" } }
        }));
        let property = schemas[root.index()].property("price").expect("price");
        assert!(property.decorators().contains(&PropertyDecorator::IntToFloat));
    }

    #[test]
    fn nested_object_becomes_class() {
        let (root, schemas) = process_ok(&json!({
            "title": "Person",
            "properties": {
                "address": {
                    "type": "object",
                    "properties": { "street": { "type": "string" } }
                }
            }
        }));
        let property = schemas[root.index()].property("address").expect("address");
        let class = property.nested_class().expect("nested class");
        assert_eq!(schemas[class.index()].class_name(), "PersonAddress");
        assert_eq!(schemas[class.index()].pointer(), "/properties/address");
    }

    #[test]
    fn definitions_are_memoised_and_named_after_their_key() {
        let (root, schemas) = process_ok(&json!({
            "properties": {
                "home": { "$ref": "#/definitions/address" },
                "work": { "$ref": "#/definitions/address" }
            },
            "definitions": {
                "address": { "type": "object", "properties": { "street": { "type": "string" } } }
            }
        }));
        let schema = &schemas[root.index()];
        let home = schema.property("home").expect("home").nested_class();
        let work = schema.property("work").expect("work").nested_class();
        assert_eq!(home, work);
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[home.expect("class").index()].class_name(), "Address");
    }

    #[test]
    fn recursive_object_reference_resolves_to_reserved_id() {
        let (_, schemas) = process_ok(&json!({
            "properties": { "root": { "$ref": "#/definitions/node" } },
            "definitions": {
                "node": {
                    "type": "object",
                    "properties": { "child": { "$ref": "#/definitions/node" } }
                }
            }
        }));
        let node = schemas
            .iter()
            .find(|schema| schema.class_name() == "Node")
            .expect("node class");
        assert_eq!(
            node.property("child").expect("child").nested_class(),
            Some(node.id())
        );
    }

    #[test]
    fn scalar_references_are_inlined() {
        let (root, schemas) = process_ok(&json!({
            "properties": { "code": { "$ref": "#/definitions/code", "description": "local" } },
            "definitions": { "code": { "type": "string", "maxLength": 3 } }
        }));
        let property = schemas[root.index()].property("code").expect("code");
        assert_eq!(property.description(), Some("local"));
        assert!(property.validators().iter().any(|validator| validator.keyword == "/definitions/code/maxLength"));
    }

    #[test]
    fn unresolved_reference() {
        let error = process(&json!({
            "properties": { "a": { "$ref": "#/definitions/missing" } }
        }))
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Unresolved schema reference #/definitions/missing in file test.json"
        );
    }

    #[test]
    fn external_reference_is_unresolved() {
        let error = process(&json!({
            "properties": { "a": { "$ref": "other.json#/definitions/a" } }
        }))
        .unwrap_err();
        assert!(matches!(error, SchemaError::UnresolvedReference { .. }));
    }

    #[test]
    fn cyclic_scalar_reference() {
        let error = process(&json!({
            "properties": { "a": { "$ref": "#/definitions/a" } },
            "definitions": {
                "a": { "$ref": "#/definitions/b" },
                "b": { "$ref": "#/definitions/a" }
            }
        }))
        .unwrap_err();
        assert!(matches!(error, SchemaError::CyclicReference { .. }));
    }

    #[test]
    fn min_greater_than_max_conflicts() {
        let error = process(&json!({
            "properties": { "name": { "type": "string", "minLength": 5, "maxLength": 2 } }
        }))
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Keyword minLength conflicts with maxLength at #/properties/name in file test.json"
        );
    }

    #[test]
    fn invalid_property_pattern_names_property() {
        let error = process(&json!({
            "properties": { "name": { "type": "string", "pattern": "(" } }
        }))
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid pattern '(' for property 'name' in file test.json"
        );
    }

    #[test]
    fn unsupported_format() {
        let error = process(&json!({
            "properties": { "mail": { "type": "string", "format": "email" } }
        }))
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Unsupported format email for property mail in file test.json"
        );
    }

    #[test]
    fn registered_format_pattern_compiles_to_validator() {
        let configuration = GeneratorConfiguration::default()
            .with_format("zip", FormatValidator::Pattern("^[0-9]{5}$".to_string()));
        let json = json!({ "properties": { "zip": { "type": "string", "format": "zip" } } });
        let (root, schemas) = SchemaProcessor::new("test.json", &json, &configuration)
            .process()
            .expect("schema compiles");
        let property = schemas[root.index()].property("zip").expect("zip");
        assert!(property.validators().iter().any(|validator| matches!(
            &validator.kind,
            ValidatorKind::Property(PropertyValidator { error: ErrorKind::Format, .. })
        )));
    }

    #[test]
    fn unsupported_and_incompatible_filters() {
        let error = process(&json!({
            "properties": { "a": { "type": "string", "filter": "unknown" } }
        }))
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Unsupported filter unknown for property a in file test.json"
        );

        let error = process(&json!({
            "properties": { "a": { "type": "integer", "filter": "trim" } },
            "required": ["a"]
        }))
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Filter trim is not compatible with property type integer for property a"
        );
    }

    #[test]
    fn transforming_filter_adds_native_output_type() {
        let (root, schemas) = process_ok(&json!({
            "properties": { "created": { "type": "string", "filter": "dateTime" } },
            "required": ["created"]
        }));
        let property = schemas[root.index()].property("created").expect("created");
        assert_eq!(property.transforming_filter_count(), 1);
        assert!(
            property
                .property_type()
                .expect("typed")
                .names()
                .contains(&TypeName::Native("DateTime".to_string()))
        );
    }

    #[test]
    fn two_transforming_filters_on_one_property_fail() {
        let error = process(&json!({
            "properties": { "created": { "type": "string", "filter": ["dateTime", "dateTime"] } }
        }))
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Applying multiple transforming filters for property created is not supported"
        );
    }

    #[test]
    fn tuple_items_with_additional_items() {
        let (root, schemas) = process_ok(&json!({
            "properties": {
                "point": {
                    "type": "array",
                    "items": [{ "type": "number" }, { "type": "number" }],
                    "additionalItems": false
                }
            }
        }));
        let property = schemas[root.index()].property("point").expect("point");
        let kinds: Vec<&str> = property
            .validators()
            .iter()
            .map(|validator| match &validator.kind {
                ValidatorKind::TupleItems(_) => "tuple",
                ValidatorKind::AdditionalItems(_) => "additional",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["other", "tuple", "additional"]);
    }

    #[test]
    fn min_and_max_properties_are_base_validators() {
        let (root, schemas) = process_ok(&json!({
            "type": "object",
            "minProperties": 1,
            "maxProperties": 3
        }));
        assert_eq!(schemas[root.index()].base_validators().len(), 2);
    }

    #[test]
    fn object_composition_is_a_base_validator() {
        let (root, schemas) = process_ok(&json!({
            "allOf": [
                { "properties": { "a": { "type": "string" } } },
                { "properties": { "b": { "type": "string" } } }
            ]
        }));
        let schema = &schemas[root.index()];
        assert!(schema.has_base_validator(|kind| matches!(
            kind,
            ValidatorKind::Composed(composed) if composed.kind == CompositionKind::AllOf
        )));
    }

    #[test]
    fn class_names_are_unique() {
        let (_, schemas) = process_ok(&json!({
            "title": "Item",
            "properties": {
                "next": { "title": "Item", "type": "object" }
            }
        }));
        let names: Vec<&str> = schemas.iter().map(Schema::class_name).collect();
        assert_eq!(names, vec!["Item", "Item2"]);
    }
}

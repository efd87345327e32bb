//! `allOf` / `anyOf` / `oneOf` / `not` at object and at property level.
//!
//! Object level: each branch is compiled to a class validating the whole
//! object. Properties a branch declares that the parent lacks are
//! contributed to the parent, linked back to the composition by keyword
//! pointer, so they can be reset when their branches fail.
//!
//! Property level: each branch is compiled to a branch property. Merging
//! keywords with object branches get a merged class holding the union of the
//! branch classes' properties.

use crate::error::SchemaError;
use crate::json_pointer;
use crate::model::{Schema, SchemaId};
use crate::processor::{PropertyContext, SchemaProcessor, class_hint};
use crate::property::{CompositionLink, Property, PropertyDecorator, PropertyType, TypeName};
use crate::validator::{AffectedProperty, ComposedValidator, CompositionKind, Validator, ValidatorKind};
use serde_json::{Map, Value};
use tracing::{debug, trace};

impl SchemaProcessor<'_> {
    pub(crate) fn process_object_composition(
        &mut self,
        schema: &mut Schema,
        kind: CompositionKind,
        branches: &[Value],
        pointer: &str,
    ) -> Result<(), SchemaError> {
        let keyword_pointer: String = json_pointer::format(pointer, kind.keyword());
        let class_name: String = schema.class_name().to_string();

        let mut branch_properties: Vec<Property> = Vec::with_capacity(branches.len());
        for (index, branch) in branches.iter().enumerate() {
            let branch_pointer: String = json_pointer::format(&keyword_pointer, &index.to_string());
            let property: Property =
                self.process_object_branch(&class_name, kind, index, branch, &branch_pointer)?;
            // `not` branches only have to fail; their properties are not the parent's.
            if kind != CompositionKind::Not
                && let Some(class) = property.nested_class()
                && let Some(branch_schema) = self.schema(class)
            {
                contribute(schema, branch_schema.properties(), &keyword_pointer, index, kind);
            }
            branch_properties.push(property);
        }

        let affected_properties: Vec<AffectedProperty> =
            affected_properties(schema.properties(), &keyword_pointer);
        debug!(
            class = %class_name,
            keyword = kind.keyword(),
            branches = branch_properties.len(),
            affected = affected_properties.len(),
            "processed object composition"
        );
        schema.add_base_validator(Validator::new(
            keyword_pointer,
            ValidatorKind::Composed(ComposedValidator {
                kind,
                predicate: kind.predicate(branch_properties.len()),
                branches: branch_properties,
                affected_properties,
                merged: None,
            }),
        ));
        Ok(())
    }

    /// Object-level branches that are untyped or `object` validate the parent
    /// object itself and are compiled to classes.
    fn process_object_branch(
        &mut self,
        parent: &str,
        kind: CompositionKind,
        index: usize,
        branch: &Value,
        branch_pointer: &str,
    ) -> Result<Property, SchemaError> {
        let name: String = branch_name(kind, index);
        let (target_pointer, target) = self.dereference(branch_pointer, branch)?;
        let keywords = self.read(&target, &target_pointer)?;
        let names: Vec<&str> = keywords.type_names();
        if target == Value::Bool(false) || !(names.is_empty() || keywords.is_object()) {
            return self.process_property(parent, &name, branch, branch_pointer, PropertyContext::declared(true));
        }

        let class: SchemaId = self.process_schema(
            &target_pointer,
            &target,
            &class_hint(parent, &name, &target_pointer),
        )?;
        let mut property: Property = Property::new(
            name,
            Some(PropertyType::new(vec![TypeName::Class(class)], false)),
        )
        .with_required(true);
        property.add_decorator(PropertyDecorator::InstantiateObject { class });
        Ok(property)
    }

    pub(crate) fn process_property_composition(
        &mut self,
        property: &mut Property,
        owner: &str,
        kind: CompositionKind,
        branches: &[Value],
        pointer: &str,
    ) -> Result<(), SchemaError> {
        let keyword_pointer: String = json_pointer::format(pointer, kind.keyword());

        let mut branch_properties: Vec<Property> = Vec::with_capacity(branches.len());
        for (index, branch) in branches.iter().enumerate() {
            let branch_pointer: String = json_pointer::format(&keyword_pointer, &index.to_string());
            branch_properties.push(self.process_property(
                owner,
                &branch_name(kind, index),
                branch,
                &branch_pointer,
                PropertyContext::declared(true),
            )?);
        }

        let branch_classes: Vec<(usize, SchemaId)> = branch_properties
            .iter()
            .enumerate()
            .filter_map(|(index, branch)| branch.nested_class().map(|class| (index, class)))
            .collect();
        let merged: Option<SchemaId> = if kind.merges_branches() && !branch_classes.is_empty() {
            Some(self.merge_branch_classes(owner, kind, branches, &keyword_pointer, &branch_classes))
        } else {
            None
        };

        if property.property_type().is_none() && kind != CompositionKind::Not {
            property.set_property_type(composed_type(&branch_properties, merged));
            if let Some(class) = merged {
                property.add_decorator(PropertyDecorator::InstantiateObject { class });
            }
        }

        let affected_properties: Vec<AffectedProperty> = merged
            .and_then(|class| self.schema(class))
            .map(|schema| affected_properties(schema.properties(), &keyword_pointer))
            .unwrap_or_default();
        debug!(
            property = %property.name(),
            keyword = kind.keyword(),
            branches = branch_properties.len(),
            merged = merged.is_some(),
            "processed property composition"
        );
        property.add_validator(Validator::new(
            keyword_pointer,
            ValidatorKind::Composed(ComposedValidator {
                kind,
                predicate: kind.predicate(branch_properties.len()),
                branches: branch_properties,
                affected_properties,
                merged,
            }),
        ));
        Ok(())
    }

    /// Creates (once per composition) the class holding the union of the
    /// properties of all object branches.
    fn merge_branch_classes(
        &mut self,
        owner: &str,
        kind: CompositionKind,
        branches: &[Value],
        keyword_pointer: &str,
        branch_classes: &[(usize, SchemaId)],
    ) -> SchemaId {
        if let Some(id) = self.reserved(keyword_pointer) {
            return id;
        }
        let id: SchemaId = self.reserve(keyword_pointer);
        let class_name: String = self.class_name(&format!("{owner} merged"));
        let mut raw: Map<String, Value> = Map::new();
        raw.insert(kind.keyword().to_string(), Value::Array(branches.to_vec()));
        let mut merged: Schema = Schema::new(
            id,
            class_name,
            self.file().to_string(),
            keyword_pointer.to_string(),
            Value::Object(raw),
        );

        for (index, class) in branch_classes {
            if let Some(branch_schema) = self.schema(*class) {
                contribute(&mut merged, branch_schema.properties(), keyword_pointer, *index, kind);
            }
        }
        debug!(
            class = %merged.class_name(),
            properties = merged.properties().len(),
            "created merged composition class"
        );
        self.store(merged);
        id
    }
}

fn branch_name(kind: CompositionKind, index: usize) -> String {
    format!("{} {index}", kind.keyword())
}

/// Adds the branch properties `target` lacks, linked to the composition.
/// Properties already contributed by the same composition gain the branch index.
fn contribute(
    target: &mut Schema,
    branch_properties: &[Property],
    keyword_pointer: &str,
    index: usize,
    kind: CompositionKind,
) {
    for branch_property in branch_properties.iter().filter(|property| !property.is_internal()) {
        if let Some(existing) = target.property_mut(branch_property.name()) {
            if let Some(link) = existing.composition_mut()
                && link.composition == keyword_pointer
                && !link.branches.contains(&index)
            {
                link.branches.push(index);
            }
            continue;
        }

        let mut property: Property = branch_property.clone();
        property.clear_validators();
        property.set_required(false);
        if !kind.keeps_contributions_non_null()
            && let Some(property_type) = property.property_type_mut()
        {
            property_type.set_nullable(true);
        }
        property.set_composition(Some(CompositionLink {
            composition: keyword_pointer.to_string(),
            branches: vec![index],
        }));
        trace!(class = %target.class_name(), property = %property.name(), branch = index, "contributed property");
        let added: bool = target.add_property(property);
        debug_assert!(added, "existing names are linked above");
    }
}

fn affected_properties(properties: &[Property], keyword_pointer: &str) -> Vec<AffectedProperty> {
    properties
        .iter()
        .filter_map(|property| {
            let link: &CompositionLink = property.composition()?;
            (link.composition == keyword_pointer).then(|| AffectedProperty {
                name: property.name().to_string(),
                branches: link.branches.clone(),
            })
        })
        .collect()
}

/// Union of the branch types. Object branches collapse into the merged class
/// when there is one; an untyped branch leaves the property untyped.
fn composed_type(branches: &[Property], merged: Option<SchemaId>) -> Option<PropertyType> {
    let mut composed: PropertyType = PropertyType::default();
    if let Some(class) = merged {
        composed.push(TypeName::Class(class));
    }
    for branch in branches {
        let branch_type: &PropertyType = branch.property_type()?;
        if merged.is_some() && branch_type.class().is_some() {
            continue;
        }
        composed.merge(branch_type);
    }
    Some(composed)
}

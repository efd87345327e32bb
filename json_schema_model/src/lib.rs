//! Compile JSON Schema documents into a typed class model with embedded
//! validation rules.
//!
//! A document is checked for keyword shape, walked depth-first into an arena
//! of [`Schema`]s, then augmented by the [`PostProcessor`]s. The resulting
//! [`CompiledModel`] is handed to a renderer, written as a JSON manifest, or
//! evaluated with the reference [`runtime`].

mod composition;
mod error;
mod expr;
mod filter;
mod json_pointer;
mod model;
mod pattern;
mod pattern_properties;
mod post_processor;
mod processor;
mod property;
pub mod runtime;
mod schema;
mod settings;
mod validate;
mod validator;

pub use error::{JsonSchemaModelError, PatternContext, SchemaError, SchemaIssue, SchemaIssueKind};
pub use expr::{CmpOp, Expr};
pub use filter::{Filter, FilterKind, FilterOperation, FilterRegistry, SerializerRef};
pub use model::{CompiledModel, GeneratedMethod, MethodTemplate, Schema, SchemaId, TemplateValue};
pub use pattern::Pattern;
pub use post_processor::{
    ADDITIONAL_PROPERTIES_SLOT, AdditionalPropertiesAccessorPostProcessor, PatternPropertiesAccessorPostProcessor,
    PostProcessor,
};
pub use processor::SchemaProcessor;
pub use property::{CompositionLink, JsonType, Property, PropertyDecorator, PropertyType, TypeName};
pub use schema::JsonSchema;
pub use settings::{FormatValidator, GeneratorConfiguration};
pub use validate::validate_schema;
pub use validator::{
    AdditionalPolicy, ComposedValidator, CompositionKind, ErrorKind, Validator, ValidatorKind,
};

use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Compilation pipeline: keyword checks, schema processing, post-processing.
pub struct SchemaCompiler {
    configuration: GeneratorConfiguration,
    post_processors: Vec<Box<dyn PostProcessor>>,
}

impl SchemaCompiler {
    /// A compiler without post-processors.
    #[must_use]
    pub fn new(configuration: GeneratorConfiguration) -> Self {
        Self {
            configuration,
            post_processors: Vec::new(),
        }
    }

    /// Adds the additional-properties and pattern-properties accessors.
    ///
    /// `accessors_for_all_models` also equips schemas without an
    /// `additionalProperties` keyword.
    #[must_use]
    pub fn with_default_post_processors(self, accessors_for_all_models: bool) -> Self {
        self.with_post_processor(AdditionalPropertiesAccessorPostProcessor::new(accessors_for_all_models))
            .with_post_processor(PatternPropertiesAccessorPostProcessor)
    }

    /// Appends a post-processor. Post-processors run in insertion order.
    #[must_use]
    pub fn with_post_processor(mut self, post_processor: impl PostProcessor + 'static) -> Self {
        self.post_processors.push(Box::new(post_processor));
        self
    }

    #[must_use]
    pub const fn configuration(&self) -> &GeneratorConfiguration {
        &self.configuration
    }

    /// Compiles one schema document. `file` names the document in errors and
    /// provides the root class name when the schema has no `title`.
    ///
    /// # Errors
    ///
    /// Returns the first `SchemaError` of the document.
    pub fn compile(&self, json: &Value, file: &str) -> Result<CompiledModel, SchemaError> {
        validate_schema(json, file)?;
        let (root, mut schemas) = SchemaProcessor::new(file, json, &self.configuration).process()?;
        for schema in &mut schemas {
            for post_processor in &self.post_processors {
                post_processor.process(schema, &self.configuration)?;
            }
        }
        debug!(file, schemas = schemas.len(), "compiled schema document");
        Ok(CompiledModel::new(root, self.configuration.clone(), schemas))
    }
}

/// Compiles a parsed schema document with the default post-processors.
///
/// # Errors
///
/// Returns the first `SchemaError` of the document.
pub fn compile(json: &Value, file: &str, configuration: GeneratorConfiguration) -> Result<CompiledModel, SchemaError> {
    SchemaCompiler::new(configuration)
        .with_default_post_processors(false)
        .compile(json, file)
}

/// Parses and compiles a schema document.
///
/// # Errors
///
/// Returns `JsonSchemaModelError` if the input is not JSON or the schema does
/// not compile.
pub fn compile_str(
    schema_json: &str,
    file: &str,
    configuration: GeneratorConfiguration,
) -> Result<CompiledModel, JsonSchemaModelError> {
    let json: Value = serde_json::from_str(schema_json)?;
    Ok(compile(&json, file, configuration)?)
}

/// Compiles a schema document and writes the model as a pretty JSON manifest.
///
/// Tests pass a `Vec<u8>`; the CLI passes a `File` or stdout.
///
/// # Errors
///
/// Returns `JsonSchemaModelError` if the input is not JSON, the schema does
/// not compile, or writing to the writer fails.
pub fn compile_to_writer<W: Write>(
    schema_json: &str,
    file: &str,
    configuration: GeneratorConfiguration,
    writer: &mut W,
) -> Result<(), JsonSchemaModelError> {
    let model: CompiledModel = compile_str(schema_json, file, configuration)?;
    write_manifest(&model, writer)
}

/// Writes a compiled model as a pretty JSON manifest.
///
/// # Errors
///
/// Returns `JsonSchemaModelError` if serialization or writing fails.
pub fn write_manifest<W: Write>(model: &CompiledModel, writer: &mut W) -> Result<(), JsonSchemaModelError> {
    serde_json::to_writer_pretty(&mut *writer, model)?;
    writeln!(writer)?;
    Ok(())
}

/// Reads and compiles a schema file. The file name is used in errors and for
/// the root class name.
///
/// # Errors
///
/// Returns `JsonSchemaModelError` if reading the file fails, the content is
/// not JSON, or the schema does not compile.
pub fn compile_from_file(
    input_path: impl AsRef<Path>,
    configuration: GeneratorConfiguration,
) -> Result<CompiledModel, JsonSchemaModelError> {
    let input_path: &Path = input_path.as_ref();
    let schema_json: String = std::fs::read_to_string(input_path)?;
    let file: String = input_path
        .file_name()
        .map_or_else(|| input_path.display().to_string(), |name| name.to_string_lossy().into_owned());
    compile_str(&schema_json, &file, configuration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compile_runs_default_post_processors() {
        let model = compile(
            &json!({
                "properties": { "name": { "type": "string" } },
                "additionalProperties": { "type": "string" },
                "patternProperties": { "^x-": {} }
            }),
            "person.json",
            GeneratorConfiguration::default(),
        )
        .expect("schema compiles");
        let root: &Schema = model.root_schema();
        assert_eq!(root.class_name(), "Person");
        assert!(root.method(MethodTemplate::GetAdditionalProperty).is_some());
        assert!(root.method(MethodTemplate::GetPatternProperties).is_some());
        assert!(root.has_property(ADDITIONAL_PROPERTIES_SLOT));
    }

    #[test]
    fn accessors_for_all_models() {
        let json = json!({
            "properties": { "address": { "type": "object", "properties": { "city": { "type": "string" } } } }
        });
        let model = SchemaCompiler::new(GeneratorConfiguration::default())
            .with_default_post_processors(true)
            .compile(&json, "person.json")
            .expect("schema compiles");
        for schema in model.schemas() {
            assert!(schema.method(MethodTemplate::GetAdditionalProperty).is_some(), "{}", schema.class_name());
        }

        let bare = SchemaCompiler::new(GeneratorConfiguration::default())
            .compile(&json, "person.json")
            .expect("schema compiles");
        assert!(bare.schemas().iter().all(|schema| schema.methods().is_empty()));
    }

    #[test]
    fn malformed_keywords_are_reported_before_processing() {
        let error = compile(&json!({ "minProperties": -1 }), "a.json", GeneratorConfiguration::default())
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Malformed schema in file a.json: #/minProperties: expected a non-negative integer"
        );
    }

    #[test]
    fn compile_str_rejects_invalid_json() {
        let error = compile_str("{", "a.json", GeneratorConfiguration::default()).unwrap_err();
        assert!(matches!(error, JsonSchemaModelError::Json(_)));
    }

    #[test]
    fn manifest_lists_schemas_and_delimited_patterns() {
        let mut out: Vec<u8> = Vec::new();
        compile_to_writer(
            r#"{ "properties": { "path": { "type": "string", "pattern": "a/b" } } }"#,
            "doc.json",
            GeneratorConfiguration::default(),
            &mut out,
        )
        .expect("manifest written");
        let manifest: Value = serde_json::from_slice(&out).expect("manifest is JSON");
        assert_eq!(manifest["root"], json!(0));
        assert_eq!(manifest["schemas"][0]["class_name"], json!("Doc"));
        let validators = manifest["schemas"][0]["properties"][0]["validators"]
            .as_array()
            .expect("validators");
        let pattern = validators
            .iter()
            .find_map(|validator| validator["check"]["pattern"].as_object())
            .expect("pattern validator");
        assert_eq!(pattern["delimited"], json!(r"/a\/b/"));
        assert_eq!(manifest["configuration"]["immutable"], json!(true));
    }

    #[test]
    fn compile_from_file_names_root_after_file() {
        let mut file = tempfile::Builder::new()
            .prefix("order-item")
            .suffix(".json")
            .tempfile()
            .expect("temp file");
        write!(file, r#"{{ "type": "object", "properties": {{ "id": {{ "type": "integer" }} }} }}"#)
            .expect("schema written");
        let model = compile_from_file(file.path(), GeneratorConfiguration::default()).expect("schema compiles");
        assert!(model.root_schema().class_name().starts_with("OrderItem"));
        assert!(model.root_schema().has_property("id"));
    }

    #[test]
    fn compile_from_file_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let error = compile_from_file(dir.path().join("missing.json"), GeneratorConfiguration::default())
            .unwrap_err();
        assert!(matches!(error, JsonSchemaModelError::Io(_)));
    }
}

//! Binary to compile a JSON Schema into a class model manifest.
//!
//! Usage: `json-schema-model person.json --output person.model.json`
//!
//! Reads the schema from INPUT (`-` for stdin) and writes the compiled model
//! as pretty JSON to `--output` or stdout.

use std::fs::File;
use std::io::{read_to_string, stdin, stdout};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use json_schema_model::{
    CompiledModel, GeneratorConfiguration, JsonSchemaModelError, SchemaCompiler, write_manifest,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "json-schema-model", version, about)]
struct Args {
    /// Schema file, or `-` to read stdin.
    input: PathBuf,

    /// Write the manifest here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Reject unknown keys of schemas without an `additionalProperties` keyword.
    #[arg(long)]
    deny_additional_properties: bool,

    /// Generate setters and removers.
    #[arg(long)]
    mutable: bool,

    /// Generate serialization methods.
    #[arg(long)]
    serialization: bool,

    /// Optional properties do not accept an explicit null.
    #[arg(long)]
    no_implicit_null: bool,

    /// Generated models stop at the first violation.
    #[arg(long)]
    fail_fast: bool,

    /// Add additional-properties accessors to schemas without the keyword.
    #[arg(long)]
    accessors_for_all_models: bool,
}

impl Args {
    fn configuration(&self) -> GeneratorConfiguration {
        GeneratorConfiguration::default()
            .with_deny_additional_properties(self.deny_additional_properties)
            .with_immutable(!self.mutable)
            .with_serialization(self.serialization)
            .with_implicit_null(!self.no_implicit_null)
            .with_collect_errors(!self.fail_fast)
    }

    /// Name used in errors and for the root class.
    fn file_name(&self) -> String {
        if self.reads_stdin() {
            return "stdin.json".to_string();
        }
        self.input
            .file_name()
            .map_or_else(|| self.input.display().to_string(), |name| name.to_string_lossy().into_owned())
    }

    fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }
}

fn run(args: &Args) -> Result<(), JsonSchemaModelError> {
    let schema_json: String = if args.reads_stdin() {
        read_to_string(stdin())?
    } else {
        std::fs::read_to_string(&args.input)?
    };
    let json: serde_json::Value = serde_json::from_str(&schema_json)?;
    let model: CompiledModel = SchemaCompiler::new(args.configuration())
        .with_default_post_processors(args.accessors_for_all_models)
        .compile(&json, &args.file_name())?;
    debug!(schemas = model.schemas().len(), "writing manifest");

    match &args.output {
        Some(path) => write_manifest(&model, &mut File::create(path)?),
        None => write_manifest(&model, &mut stdout()),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_defaults() {
        let args = Args::try_parse_from(["json-schema-model", "person.json"]).expect("valid arguments");
        assert_eq!(args.configuration(), GeneratorConfiguration::default());
        assert_eq!(args.file_name(), "person.json");
        assert!(args.output.is_none());
        assert!(!args.accessors_for_all_models);
    }

    #[test]
    fn flags_map_to_configuration() {
        let args = Args::try_parse_from([
            "json-schema-model",
            "schemas/person.json",
            "--output",
            "out.json",
            "--deny-additional-properties",
            "--mutable",
            "--serialization",
            "--no-implicit-null",
            "--fail-fast",
            "--accessors-for-all-models",
        ])
        .expect("valid arguments");
        let configuration = args.configuration();
        assert!(configuration.deny_additional_properties());
        assert!(!configuration.is_immutable());
        assert!(configuration.has_serialization_enabled());
        assert!(!configuration.has_implicit_null());
        assert!(!configuration.collect_errors());
        assert!(args.accessors_for_all_models);
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
        assert_eq!(args.file_name(), "person.json");
    }

    #[test]
    fn dash_reads_stdin() {
        let args = Args::try_parse_from(["json-schema-model", "-"]).expect("valid arguments");
        assert!(args.reads_stdin());
        assert_eq!(args.file_name(), "stdin.json");
    }

    #[test]
    fn input_is_required() {
        assert!(Args::try_parse_from(["json-schema-model"]).is_err());
    }

    #[test]
    fn run_writes_manifest_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let input = dir.path().join("person.json");
        let output = dir.path().join("person.model.json");
        std::fs::write(&input, r#"{ "properties": { "name": { "type": "string" } } }"#).expect("schema written");
        let args = Args::try_parse_from([
            "json-schema-model",
            input.to_str().expect("utf-8 path"),
            "--output",
            output.to_str().expect("utf-8 path"),
        ])
        .expect("valid arguments");
        run(&args).expect("compiles");

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).expect("manifest")).expect("manifest is JSON");
        assert_eq!(manifest["schemas"][0]["class_name"], serde_json::json!("Person"));
    }

    #[test]
    fn run_reports_schema_errors() {
        let dir = tempfile::tempdir().expect("temp dir");
        let input = dir.path().join("broken.json");
        std::fs::write(&input, r#"{ "patternProperties": { "[": {} } }"#).expect("schema written");
        let args = Args::try_parse_from(["json-schema-model", input.to_str().expect("utf-8 path")]).expect("valid arguments");
        let error = run(&args).unwrap_err();
        assert_eq!(error.to_string(), "Invalid pattern '[' for pattern property in file broken.json");
    }
}

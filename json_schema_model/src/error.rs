use std::fmt;

/// Top-level error for the file and string based entry points.
#[derive(Debug, thiserror::Error)]
pub enum JsonSchemaModelError {
    /// The schema document could not be compiled.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// I/O error (e.g., reading the schema file, writing the manifest).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON parsing or manifest serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Where an invalid regular expression was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternContext {
    /// Key of a `patternProperties` entry.
    PatternProperty,
    /// `pattern` keyword of a property.
    Property(String),
    /// Regular expression registered for a `format`.
    Format(String),
}

impl fmt::Display for PatternContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PatternProperty => write!(f, "pattern property"),
            Self::Property(name) => write!(f, "property '{name}'"),
            Self::Format(format) => write!(f, "format '{format}'"),
        }
    }
}

/// Compile-time schema error. Aborts compilation of the current document.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Invalid pattern '{pattern}' for {context} in file {file}")]
    InvalidPattern {
        pattern: String,
        context: PatternContext,
        file: String,
    },

    #[error(
        "Property '{property}' of type {actual} is incompatible with pattern property '{pattern}' requiring {expected} in file {file}"
    )]
    IncompatiblePatternPropertyType {
        property: String,
        pattern: String,
        expected: String,
        actual: String,
        file: String,
    },

    #[error("Applying multiple transforming filters for property {property} is not supported")]
    MultipleTransformingFilters { property: String },

    #[error("Unsupported filter {filter} for property {property} in file {file}")]
    UnsupportedFilter {
        filter: String,
        property: String,
        file: String,
    },

    #[error("Filter {filter} is not compatible with property type {property_type} for property {property}")]
    IncompatibleFilter {
        filter: String,
        property: String,
        property_type: String,
    },

    #[error("Unsupported format {format} for property {property} in file {file}")]
    UnsupportedFormat {
        format: String,
        property: String,
        file: String,
    },

    #[error("Unresolved schema reference {reference} in file {file}")]
    UnresolvedReference { reference: String, file: String },

    #[error("Cyclic schema reference {reference} in file {file}")]
    CyclicReference { reference: String, file: String },

    #[error("Keyword {keyword} conflicts with {other} at #{pointer} in file {file}")]
    KeywordConflict {
        keyword: String,
        other: String,
        pointer: String,
        file: String,
    },

    #[error("Root schema of file {file} must describe an object")]
    InvalidRoot { file: String },

    #[error("Malformed schema in file {file}: {}", format_issues(.issues))]
    MalformedSchema {
        file: String,
        issues: Vec<SchemaIssue>,
    },
}

fn format_issues(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<String>>()
        .join("; ")
}

/// A single keyword shape problem found before compilation starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// JSON Pointer to the offending keyword.
    pub path: String,
    pub kind: SchemaIssueKind,
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}: {}", self.path, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaIssueKind {
    RootNotObject,
    InvalidTypeValue,
    UnknownType(String),
    ExpectedObject,
    ExpectedSchema,
    ExpectedStringArray,
    ExpectedNonEmptyArray,
    ExpectedNonNegativeInteger,
    ExpectedNumber,
    ExpectedString,
    ExpectedBoolean,
    InvalidFilter,
    /// Keywords could not be read into the typed schema view.
    Unreadable(String),
}

impl fmt::Display for SchemaIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotObject => write!(f, "root must be a JSON object"),
            Self::InvalidTypeValue => write!(f, "type must be a string or an array of strings"),
            Self::UnknownType(ty) => write!(f, "unknown type {ty}"),
            Self::ExpectedObject => write!(f, "expected an object"),
            Self::ExpectedSchema => write!(f, "expected a schema or boolean"),
            Self::ExpectedStringArray => write!(f, "expected an array of strings"),
            Self::ExpectedNonEmptyArray => write!(f, "expected a non-empty array"),
            Self::ExpectedNonNegativeInteger => write!(f, "expected a non-negative integer"),
            Self::ExpectedNumber => write!(f, "expected a number"),
            Self::ExpectedString => write!(f, "expected a string"),
            Self::ExpectedBoolean => write!(f, "expected a boolean"),
            Self::InvalidFilter => {
                write!(f, "filter must be a token, a filter object or a list of them")
            }
            Self::Unreadable(reason) => write!(f, "cannot read keywords: {reason}"),
        }
    }
}

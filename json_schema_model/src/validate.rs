//! Keyword shape checks run before compilation.
//!
//! Walks the raw JSON Schema (as `serde_json::Value`) and collects every
//! malformed keyword without panicking, so a broken document reports all of
//! its problems at once instead of the first one the processor trips over.

use crate::error::{SchemaError, SchemaIssue, SchemaIssueKind};
use crate::filter;
use crate::json_pointer;
use crate::property::JsonType;
use serde_json::Value;

/// Keywords holding a map of name -> sub-schema.
const SCHEMA_MAP_KEYWORDS: &[&str] = &["properties", "patternProperties", "definitions", "$defs"];

/// Keywords holding a single sub-schema (or boolean schema).
const SCHEMA_KEYWORDS: &[&str] = &["additionalProperties", "additionalItems", "not"];

/// Keywords holding a non-empty list of sub-schemas.
const COMPOSITION_KEYWORDS: &[&str] = &["allOf", "anyOf", "oneOf"];

const NON_NEGATIVE_INTEGER_KEYWORDS: &[&str] = &[
    "minLength",
    "maxLength",
    "minItems",
    "maxItems",
    "minProperties",
    "maxProperties",
];

const NUMBER_KEYWORDS: &[&str] = &[
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];

const STRING_KEYWORDS: &[&str] = &["title", "description", "pattern", "format", "$ref", "key"];

const BOOLEAN_KEYWORDS: &[&str] = &["uniqueItems", "readOnly"];

/// Checks the shape of every known keyword. Returns `Ok(())` if no issues
/// were found, or `SchemaError::MalformedSchema` listing all of them.
///
/// # Errors
///
/// Returns `SchemaError::MalformedSchema` if the root is not a JSON object or
/// any keyword has the wrong shape.
pub fn validate_schema(value: &Value, file: &str) -> Result<(), SchemaError> {
    let mut issues: Vec<SchemaIssue> = Vec::new();

    if value.is_object() {
        collect_issues(value, "", &mut issues);
    } else {
        push_issue(&mut issues, "", SchemaIssueKind::RootNotObject);
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::MalformedSchema {
            file: file.to_string(),
            issues,
        })
    }
}

fn push_issue(issues: &mut Vec<SchemaIssue>, path: &str, kind: SchemaIssueKind) {
    issues.push(SchemaIssue {
        path: path.to_string(),
        kind,
    });
}

fn collect_issues(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
    let Some(obj) = value.as_object() else {
        return;
    };

    for (key, val) in obj {
        let key_path: String = json_pointer::format(path, key);
        let keyword: &str = key.as_str();

        if SCHEMA_MAP_KEYWORDS.contains(&keyword) {
            validate_schema_map(val, &key_path, issues);
        } else if SCHEMA_KEYWORDS.contains(&keyword) {
            validate_sub_schema(val, &key_path, issues);
        } else if COMPOSITION_KEYWORDS.contains(&keyword) {
            validate_schema_list(val, &key_path, issues);
        } else if NON_NEGATIVE_INTEGER_KEYWORDS.contains(&keyword) {
            if !val.is_u64() {
                push_issue(issues, &key_path, SchemaIssueKind::ExpectedNonNegativeInteger);
            }
        } else if NUMBER_KEYWORDS.contains(&keyword) {
            if !val.is_number() {
                push_issue(issues, &key_path, SchemaIssueKind::ExpectedNumber);
            }
        } else if STRING_KEYWORDS.contains(&keyword) {
            if !val.is_string() {
                push_issue(issues, &key_path, SchemaIssueKind::ExpectedString);
            }
        } else if BOOLEAN_KEYWORDS.contains(&keyword) {
            if !val.is_boolean() {
                push_issue(issues, &key_path, SchemaIssueKind::ExpectedBoolean);
            }
        } else {
            match keyword {
                "type" => validate_type(val, &key_path, issues),
                "required" => validate_required(val, &key_path, issues),
                "enum" => validate_enum(val, &key_path, issues),
                "items" => validate_items(val, &key_path, issues),
                "filter" => {
                    if filter::parse_declarations(val).is_none() {
                        push_issue(issues, &key_path, SchemaIssueKind::InvalidFilter);
                    }
                }
                // Unknown keywords are annotations; const and default take any value.
                _ => {}
            }
        }
    }
}

fn validate_type(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
    let names: Vec<&Value> = match value {
        Value::String(_) => vec![value],
        Value::Array(items) => items.iter().collect(),
        _ => {
            push_issue(issues, path, SchemaIssueKind::InvalidTypeValue);
            return;
        }
    };
    for name in names {
        match name.as_str() {
            Some(ty) if JsonType::parse(ty).is_some() => {}
            Some(ty) => push_issue(issues, path, SchemaIssueKind::UnknownType(ty.to_string())),
            None => {
                push_issue(issues, path, SchemaIssueKind::InvalidTypeValue);
                break;
            }
        }
    }
}

fn validate_required(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
    let is_string_array: bool = value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string));
    if !is_string_array {
        push_issue(issues, path, SchemaIssueKind::ExpectedStringArray);
    }
}

fn validate_enum(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
    if value.as_array().is_none_or(Vec::is_empty) {
        push_issue(issues, path, SchemaIssueKind::ExpectedNonEmptyArray);
    }
}

fn validate_items(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
    if value.is_array() {
        validate_schema_list(value, path, issues);
    } else {
        validate_sub_schema(value, path, issues);
    }
}

fn validate_sub_schema(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
    match value {
        Value::Bool(_) => {}
        Value::Object(_) => collect_issues(value, path, issues),
        _ => push_issue(issues, path, SchemaIssueKind::ExpectedSchema),
    }
}

fn validate_schema_map(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
    let Some(entries) = value.as_object() else {
        push_issue(issues, path, SchemaIssueKind::ExpectedObject);
        return;
    };
    for (name, schema) in entries {
        let entry_path: String = json_pointer::format(path, name);
        validate_sub_schema(schema, &entry_path, issues);
    }
}

fn validate_schema_list(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
    let Some(branches) = value.as_array().filter(|items| !items.is_empty()) else {
        push_issue(issues, path, SchemaIssueKind::ExpectedNonEmptyArray);
        return;
    };
    for (index, branch) in branches.iter().enumerate() {
        let branch_path: String = json_pointer::format(path, &index.to_string());
        validate_sub_schema(branch, &branch_path, issues);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issues_of(value: &Value) -> Vec<SchemaIssue> {
        match validate_schema(value, "test.json") {
            Ok(()) => Vec::new(),
            Err(SchemaError::MalformedSchema { issues, .. }) => issues,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn root_not_object() {
        let issues = issues_of(&json!("string"));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, SchemaIssueKind::RootNotObject);
    }

    #[test]
    fn valid_minimal_schema_passes() {
        let v = json!({
            "type": "object",
            "properties": {
                "foo": { "type": "string", "filter": ["trim", { "filter": "notEmpty" }] }
            },
            "allOf": [{ "required": ["foo"] }],
            "additionalProperties": false
        });
        assert!(validate_schema(&v, "test.json").is_ok());
    }

    #[test]
    fn unknown_type_is_reported_with_its_path() {
        let issues = issues_of(&json!({
            "properties": { "name": { "type": "text" } }
        }));
        assert_eq!(
            issues,
            vec![SchemaIssue {
                path: "/properties/name/type".to_string(),
                kind: SchemaIssueKind::UnknownType("text".to_string()),
            }]
        );
    }

    #[test]
    fn multiple_issues_collected() {
        let issues = issues_of(&json!({
            "type": "object",
            "minProperties": -1,
            "required": "name",
            "oneOf": [],
            "patternProperties": { "^a": 5 }
        }));
        let kinds: Vec<&SchemaIssueKind> = issues.iter().map(|i| &i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &SchemaIssueKind::ExpectedNonNegativeInteger,
                &SchemaIssueKind::ExpectedStringArray,
                &SchemaIssueKind::ExpectedNonEmptyArray,
                &SchemaIssueKind::ExpectedSchema,
            ]
        );
    }

    #[test]
    fn composition_branches_are_walked() {
        let issues = issues_of(&json!({
            "anyOf": [{ "type": "string" }, { "maxLength": "3" }]
        }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "/anyOf/1/maxLength");
    }

    #[test]
    fn pattern_property_keys_are_escaped_in_paths() {
        let issues = issues_of(&json!({
            "patternProperties": { "a/b": { "minimum": "x" } }
        }));
        assert_eq!(issues[0].path, "/patternProperties/a~1b/minimum");
    }

    #[test]
    fn invalid_filter_shape() {
        let issues = issues_of(&json!({
            "properties": { "a": { "filter": 3 } }
        }));
        assert_eq!(issues[0].kind, SchemaIssueKind::InvalidFilter);
    }

    #[test]
    fn boolean_sub_schemas_are_accepted() {
        let v = json!({
            "additionalProperties": true,
            "properties": { "any": true },
            "items": [true, { "type": "string" }],
            "additionalItems": false
        });
        assert!(validate_schema(&v, "test.json").is_ok());
    }
}

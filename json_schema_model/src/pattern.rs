//! Compiled regular expressions for `pattern` and `patternProperties`.
//!
//! Patterns are ECMA-262 (the JSON Schema dialect) and are compiled with
//! `regress` when the schema is compiled, so an invalid pattern can never
//! reach generated code.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// Delimiter used by the target validation-expression dialect.
pub const DEFAULT_DELIMITER: char = '/';

#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: regress::Regex,
}

impl Pattern {
    /// Compiles `source`.
    ///
    /// # Errors
    ///
    /// Returns the `regress` error if `source` is not a valid ECMA-262 pattern.
    pub fn new(source: &str) -> Result<Self, regress::Error> {
        let regex: regress::Regex = regress::Regex::new(source)?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Unanchored search, as JSON Schema defines pattern matching.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.find(text).is_some()
    }

    /// Renders the pattern for a delimited regex dialect (`/a\/b/`).
    ///
    /// Unescaped occurrences of the delimiter are escaped; existing escape
    /// sequences are copied untouched.
    #[must_use]
    pub fn delimited(&self, delimiter: char) -> String {
        let mut out: String = String::with_capacity(self.source.len() + 2);
        out.push(delimiter);
        let mut escaped: bool = false;
        for c in self.source.chars() {
            if escaped {
                out.push(c);
                escaped = false;
                continue;
            }
            if c == '\\' {
                escaped = true;
            } else if c == delimiter {
                out.push('\\');
            }
            out.push(c);
        }
        out.push(delimiter);
        out
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Pattern {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Pattern", 2)?;
        state.serialize_field("pattern", &self.source)?;
        state.serialize_field("delimited", &self.delimited(DEFAULT_DELIMITER))?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_fails_to_compile() {
        for source in ["[", "(", ")", "(ab"] {
            assert!(Pattern::new(source).is_err(), "{source} must not compile");
        }
    }

    #[test]
    fn matching_is_unanchored() {
        let pattern = Pattern::new("^S_").expect("valid pattern");
        assert!(pattern.is_match("S_name"));
        assert!(!pattern.is_match("name"));
        let pattern = Pattern::new("b").expect("valid pattern");
        assert!(pattern.is_match("abc"));
    }

    #[test]
    fn literal_slash_matches_keys_containing_slash() {
        let pattern = Pattern::new("a/(b|c)").expect("valid pattern");
        assert!(pattern.is_match("a/b"));
        assert!(pattern.is_match("a/c"));
        assert!(!pattern.is_match("a/d"));
    }

    #[test]
    fn delimited_escapes_unescaped_delimiter() {
        let pattern = Pattern::new("a/(b|c)").expect("valid pattern");
        assert_eq!(pattern.delimited('/'), r"/a\/(b|c)/");
    }

    #[test]
    fn delimited_keeps_existing_escapes() {
        let pattern = Pattern::new(r"a\/b").expect("valid pattern");
        assert_eq!(pattern.delimited('/'), r"/a\/b/");
        let pattern = Pattern::new(r"a\\/b").expect("valid pattern");
        assert_eq!(pattern.delimited('/'), r"/a\\\/b/");
    }

    #[test]
    fn serializes_source_and_delimited_form() {
        let pattern = Pattern::new("a/b").expect("valid pattern");
        let json: serde_json::Value = serde_json::to_value(&pattern).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({ "pattern": "a/b", "delimited": r"/a\/b/" })
        );
    }
}

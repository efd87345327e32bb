//! RFC 6901 pointers into a schema document.
//!
//! Every compiled schema node is keyed by the pointer of the keyword object it
//! was built from (`""` for the root, `/definitions/Address`, ...). In-document
//! `$ref`s resolve against the same keys.

/// Escapes one reference token: `~` becomes `~0`, `/` becomes `~1`.
fn escape(token: &str, out: &mut String) {
    for c in token.chars() {
        match c {
            '~' => out.push_str("~0"),
            '/' => out.push_str("~1"),
            other => out.push(other),
        }
    }
}

/// Undoes [`escape`]. `~1` is replaced before `~0` so `~01` stays `~1`.
fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Pointer of the child `token` below `parent`.
#[must_use]
pub fn format(parent: &str, token: &str) -> String {
    let mut pointer: String = String::with_capacity(parent.len() + token.len() + 1);
    pointer.push_str(parent);
    pointer.push('/');
    escape(token, &mut pointer);
    pointer
}

/// Pointer part of an in-document `$ref` such as `#` or `#/definitions/Foo`.
///
/// `None` for references into other documents and for plain-name fragments
/// like `#anchor`.
#[must_use]
pub fn from_reference(reference: &str) -> Option<&str> {
    reference
        .strip_prefix('#')
        .filter(|pointer| pointer.is_empty() || pointer.starts_with('/'))
}

/// Unescaped final token, used to name classes after definitions.
#[must_use]
pub fn last_segment(pointer: &str) -> Option<String> {
    pointer.rsplit_once('/').map(|(_, token)| unescape(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_pointer_below_root() {
        let properties: String = format("", "properties");
        assert_eq!(format(&properties, "firstName"), "/properties/firstName");
    }

    #[test]
    fn pattern_property_keys_are_escaped() {
        assert_eq!(
            format("/patternProperties", "^/api/~v[0-9]+$"),
            "/patternProperties/^~1api~1~0v[0-9]+$"
        );
    }

    #[test]
    fn composition_branch_index() {
        assert_eq!(format("/properties/pet/oneOf", "1"), "/properties/pet/oneOf/1");
    }

    #[test]
    fn empty_property_name() {
        assert_eq!(format("/properties", ""), "/properties/");
    }

    #[test]
    fn in_document_references() {
        assert_eq!(from_reference("#"), Some(""));
        assert_eq!(from_reference("#/definitions/Address"), Some("/definitions/Address"));
    }

    #[test]
    fn foreign_references_are_not_pointers() {
        assert_eq!(from_reference("address.json#/definitions/Address"), None);
        assert_eq!(from_reference("#anchor"), None);
        assert_eq!(from_reference("/definitions/Address"), None);
    }

    #[test]
    fn last_segment_reverses_escaping() {
        let pointer: String = format("/definitions", "a/b~c");
        assert_eq!(pointer, "/definitions/a~1b~0c");
        assert_eq!(last_segment(&pointer), Some("a/b~c".to_string()));
        assert_eq!(last_segment("/definitions/~01"), Some("~1".to_string()));
    }

    #[test]
    fn root_has_no_last_segment() {
        assert_eq!(last_segment(""), None);
    }
}

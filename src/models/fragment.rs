//! Represents one completed fragment of a multipart upload.

use serde::{Deserialize, Serialize};

/// A single fragment of a fragmented upload, as supplied by the client at
/// finalize time. Ephemeral — never persisted.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct FragmentDescriptor {
    /// 1-based part number within the session.
    pub part_number: i32,

    /// Integrity tag returned by the store after the fragment transfer,
    /// normalized to its unquoted form.
    pub entity_tag: String,
}

impl FragmentDescriptor {
    pub fn new(part_number: i32, entity_tag: &str) -> Self {
        Self {
            part_number,
            entity_tag: normalize_entity_tag(entity_tag).to_string(),
        }
    }
}

/// Strip a single pair of enclosing double-quotes from an entity tag.
///
/// Store-returned tags arrive sometimes quoted and sometimes not; the
/// finalize call requires the unquoted form, so both inputs normalize to
/// the same value. Inner quotes are left untouched.
pub fn normalize_entity_tag(tag: &str) -> &str {
    tag.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_and_unquoted_tags_normalize_identically() {
        assert_eq!(normalize_entity_tag("\"abc123\""), "abc123");
        assert_eq!(normalize_entity_tag("abc123"), "abc123");
    }

    #[test]
    fn only_one_enclosing_pair_is_stripped() {
        assert_eq!(normalize_entity_tag("\"\"abc\"\""), "\"abc\"");
    }

    #[test]
    fn unbalanced_quotes_are_preserved() {
        assert_eq!(normalize_entity_tag("\"abc"), "\"abc");
        assert_eq!(normalize_entity_tag("abc\""), "abc\"");
    }
}

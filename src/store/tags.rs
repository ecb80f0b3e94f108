//! Tag identity, colors, and find-or-create resolution.

use super::TaskStore;
use crate::types::Tag;

/// Derive the content-addressed id for a tag name.
///
/// Trims the name, lower-cases it, and replaces every whitespace character
/// with `-`. Two names that normalize alike always map to the same id.
pub fn tag_id(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

/// Derive a stable `#rrggbb` color from a tag name.
///
/// Rolling string hash over UTF-16 code units. The shift operates on the
/// 32-bit truncation of the accumulator while the subtraction does not, so
/// the accumulator is kept in an `i64`.
pub fn tag_color(name: &str) -> String {
    let mut hash: i64 = 0;
    for unit in name.encode_utf16() {
        let shifted = (hash as i32).wrapping_shl(5) as i64;
        hash = unit as i64 + (shifted - hash);
    }
    let hash = hash as i32;
    let mut color = String::from("#");
    for i in 0..3 {
        let value = (hash >> (i * 8)) & 0xFF;
        color.push_str(&format!("{:02x}", value));
    }
    color
}

impl TaskStore {
    /// Resolve tag names to ids, creating any tag that does not exist yet.
    ///
    /// Blank names are skipped. Returns one id per non-blank input, in input
    /// order; names that normalize to the same id resolve to that single id.
    pub fn find_or_create_tags(&mut self, names: &[String]) -> Vec<String> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let display = name.trim();
            if display.is_empty() {
                continue;
            }
            let id = tag_id(display);
            if self.get_tag_by_id(&id).is_none() {
                tracing::debug!(tag_id = %id, "Creating tag");
                self.tags.push(Tag {
                    id: id.clone(),
                    name: display.to_string(),
                    color: tag_color(display),
                });
            }
            ids.push(id);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_id_normalizes_case_and_whitespace() {
        assert_eq!(tag_id("Project Phoenix"), "project-phoenix");
        assert_eq!(tag_id("  Personal "), "personal");
        assert_eq!(tag_id("Q3\tMarketing"), "q3-marketing");
    }

    #[test]
    fn tag_color_is_deterministic_hex() {
        let a = tag_color("Personal");
        assert_eq!(a, tag_color("Personal"));
        assert_eq!(a.len(), 7);
        assert!(a.starts_with('#'));
        assert!(a[1..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, tag_color("Work"));
    }

    #[test]
    fn tag_color_known_values() {
        assert_eq!(tag_color(""), "#000000");
        assert_eq!(tag_color("a"), "#610000");
        assert_eq!(tag_color("Personal"), "#608a44");
        assert_eq!(tag_color("Work"), "#313b29");
    }

    #[test]
    fn find_or_create_is_idempotent() {
        let mut store = TaskStore::new();
        let first = store.find_or_create_tags(&["Personal".to_string()]);
        let second = store.find_or_create_tags(&[" personal ".to_string()]);
        assert_eq!(first, vec!["personal"]);
        assert_eq!(first, second);
        assert_eq!(store.tags().len(), 1);
        // Display name of the first creation wins.
        assert_eq!(store.tags()[0].name, "Personal");
    }

    #[test]
    fn find_or_create_dedupes_within_one_call_and_skips_blanks() {
        let mut store = TaskStore::new();
        let ids = store.find_or_create_tags(&[
            "Deep Work".to_string(),
            "".to_string(),
            "deep work".to_string(),
            "   ".to_string(),
        ]);
        assert_eq!(ids, vec!["deep-work", "deep-work"]);
        assert_eq!(store.tags().len(), 1);
    }
}

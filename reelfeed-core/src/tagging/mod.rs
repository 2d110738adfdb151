//! Content tag extraction for newly published videos.
//!
//! Tags come from two places: a curated keyword dictionary matched against
//! case-folded content, and user-written hashtags read from the original
//! text. The result feeds the recommender as cold-start item labels.

pub mod dictionary;

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

pub use dictionary::{DEFAULT_KEYWORDS, KeywordEntry};

/// Tag used when nothing else matched.
pub const GENERAL_TAG: &str = "general";

// Latin letters, digits and CJK unified ideographs.
static HASHTAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#([A-Za-z0-9\x{4e00}-\x{9fa5}]+)").expect("hashtag pattern is valid")
});

/// Derives a deterministic, non-empty tag set from a title and description.
#[derive(Debug, Clone, Copy)]
pub struct TagExtractor {
    keywords: &'static [KeywordEntry],
}

impl Default for TagExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TagExtractor {
    /// Creates an extractor over the built-in dictionary.
    pub fn new() -> Self {
        Self::with_table(DEFAULT_KEYWORDS)
    }

    /// Creates an extractor over a custom keyword table.
    ///
    /// Keys must be lowercase; they are compared against folded content.
    pub fn with_table(keywords: &'static [KeywordEntry]) -> Self {
        Self { keywords }
    }

    /// Extracts tags from a video's title and description.
    ///
    /// Never fails and never returns an empty set.
    pub fn extract_tags(&self, title: &str, description: &str) -> BTreeSet<String> {
        let content = format!("{title} {description}");
        let folded = content.to_lowercase();

        let mut tags: BTreeSet<String> = self
            .keywords
            .iter()
            .filter(|(keyword, _)| folded.contains(keyword))
            .flat_map(|(_, mapped)| mapped.iter().map(|tag| (*tag).to_string()))
            .collect();

        // Hashtags keep their original casing and script.
        tags.extend(extract_hashtags(&content));

        if tags.is_empty() {
            tags.insert(GENERAL_TAG.to_string());
        }

        tags
    }
}

/// Returns hashtag bodies in order of appearance, without the leading `#`.
pub fn extract_hashtags(content: &str) -> impl Iterator<Item = String> + '_ {
    HASHTAG_PATTERN
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .map(|body| body.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn tags(title: &str, description: &str) -> BTreeSet<String> {
        TagExtractor::new().extract_tags(title, description)
    }

    #[test]
    fn test_hashtags_from_description() {
        let result = tags("", "#foo bar #bar2");
        assert!(result.contains("foo"));
        assert!(result.contains("bar2"));
        assert!(!result.contains("bar"));
    }

    #[test]
    fn test_keyword_maps_to_domain_tags() {
        let result = tags("今天学做美食", "");
        assert!(result.contains("food"));
        assert!(result.contains("cooking"));
        // "学" alone is not a keyword, "学做" does not contain "学习"
        assert!(!result.contains("education"));
    }

    #[test]
    fn test_empty_input_falls_back_to_general() {
        let result = tags("", "");
        assert_eq!(result.len(), 1);
        assert!(result.contains(GENERAL_TAG));
    }

    #[test]
    fn test_overlapping_keywords_do_not_duplicate() {
        // Both keywords map to food/cooking/lifestyle.
        let result = tags("美食", "做饭");
        let expected: BTreeSet<String> = ["food", "cooking", "lifestyle"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let result = tags("New AI gadget", "");
        assert!(result.contains("technology"));
        assert!(result.contains("artificial-intelligence"));
    }

    #[test]
    fn test_hashtag_preserves_case_and_script() {
        let result = tags("周末 #RustLang", "#旅行日记 #x");
        assert!(result.contains("RustLang"));
        assert!(!result.contains("rustlang"));
        assert!(result.contains("旅行日记"));
        assert!(result.contains("x"));
        // "旅行" inside the hashtag also hits the dictionary.
        assert!(result.contains("travel"));
    }

    #[test]
    fn test_hashtag_stops_at_punctuation() {
        let hashtags: Vec<String> = extract_hashtags("#cat-video, #dog!#bird").collect();
        assert_eq!(hashtags, vec!["cat", "dog", "bird"]);
    }

    #[test]
    fn test_bare_hash_is_ignored() {
        assert_eq!(extract_hashtags("# nothing ## here").count(), 0);
    }

    #[test]
    fn test_custom_table() {
        static TABLE: &[KeywordEntry] = &[("rust", &["programming"])];
        let extractor = TagExtractor::with_table(TABLE);

        let result = extractor.extract_tags("Rust tips", "");
        assert_eq!(result.into_iter().collect::<Vec<_>>(), vec!["programming"]);

        let fallback = extractor.extract_tags("美食", "");
        assert!(fallback.contains(GENERAL_TAG));
    }

    proptest! {
        #[test]
        fn prop_extraction_is_deterministic(title in ".{0,40}", description in ".{0,80}") {
            let first = tags(&title, &description);
            let second = tags(&title, &description);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_extraction_is_never_empty(title in ".{0,40}", description in ".{0,80}") {
            prop_assert!(!tags(&title, &description).is_empty());
        }

        #[test]
        fn prop_ascii_hashtags_round_trip(body in "[A-Za-z0-9]{1,16}") {
            let result = tags("", &format!("look #{body} here"));
            prop_assert!(result.contains(&body));
        }
    }
}

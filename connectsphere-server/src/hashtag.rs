use once_cell::sync::Lazy;
use regex::Regex;

/// A tag as it may appear in a URL: optional leading `#`, then word characters
static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?(\w+)$").expect("Failed to compile hashtag regex"));

/// Normalize a hashtag path parameter
///
/// Strips one leading `#` and surrounding whitespace. Case is kept, since
/// hashtag lookups are a case-sensitive substring match on post content.
/// Returns `None` when the tag is empty or contains non-word characters.
///
/// ```
/// use connectsphere_server::hashtag::normalize_tag;
/// assert_eq!(normalize_tag("#world").as_deref(), Some("world"));
/// assert_eq!(normalize_tag("no spaces"), None);
/// ```
pub fn normalize_tag(raw: &str) -> Option<String> {
    TAG_REGEX
        .captures(raw.trim())
        .map(|cap| cap[1].to_string())
}

/// The substring a post's content must contain to match `tag`
pub fn tag_needle(tag: &str) -> String {
    format!("#{}", tag)
}

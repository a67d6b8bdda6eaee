use regex::Regex;
use std::sync::LazyLock;

static INCOMPLETE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*$").unwrap());
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[^>]*>").unwrap());
static SHORTCODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[/?[^\]]*\]").unwrap());
static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&#(\d+);").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const NAMED_ENTITIES: [(&str, &str); 13] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#039;", "'"),
    ("&apos;", "'"),
    ("&rsquo;", "'"),
    ("&lsquo;", "'"),
    ("&mdash;", "—"),
    ("&ndash;", "–"),
    ("&hellip;", "…"),
    ("&copy;", "©"),
];

/// Flatten scraped WordPress text into a single clean line.
///
/// Page excerpts and meta descriptions sometimes carry stray markup through the
/// HTML parser (double-escaped entities, `[caption]` shortcodes, tags cut off at
/// a truncation point). This removes:
///
/// - complete and self-closing HTML tags
/// - a dangling, unterminated tag at the end of the text
/// - WordPress shortcodes (`[caption]`, `[/caption]`, ...)
/// - named and numeric HTML entities, decoded to their characters
///
/// and collapses every run of whitespace into a single space.
pub fn clean_html_tags(text: &str) -> String {
    let cleaned = INCOMPLETE_TAG.replace_all(text, "");
    let cleaned = HTML_TAG.replace_all(&cleaned, "");
    let cleaned = SHORTCODE.replace_all(&cleaned, "");

    let mut cleaned = cleaned.into_owned();
    for (entity, replacement) in NAMED_ENTITIES {
        cleaned = cleaned.replace(entity, replacement);
    }

    let cleaned = NUMERIC_ENTITY.replace_all(&cleaned, |caps: &regex::Captures| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
}

/// The first `max` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Like [`truncate_chars`], but backs off to the last space when one exists.
pub fn truncate_at_word(text: &str, max: usize) -> &str {
    let cut = truncate_chars(text, max);
    if cut.len() == text.len() {
        return cut;
    }
    match cut.rsplit_once(' ') {
        Some((head, _)) if !head.trim().is_empty() => head.trim_end(),
        _ => cut,
    }
}

//! Markdown sanitizer for assistant replies.
//!
//! The provider tends to decorate answers with markdown even when asked not
//! to. Replies are flattened to plain text before they are persisted, as an
//! ordered sequence of regex substitutions rather than a markdown parser.

use regex::Regex;
use std::sync::LazyLock;

// =============================================================================
// Compiled patterns (compiled once, reused across calls)
// =============================================================================

struct MarkdownPatterns {
    bold: Regex,
    italic_star: Regex,
    italic_underscore: Regex,
    heading: Regex,
    list_dash: Regex,
}

static MARKDOWN_PATTERNS: LazyLock<MarkdownPatterns> = LazyLock::new(|| MarkdownPatterns {
    bold: Regex::new(r"\*\*(.*?)\*\*").expect("Invalid bold regex"),
    italic_star: Regex::new(r"\*(.*?)\*").expect("Invalid italic regex"),
    italic_underscore: Regex::new(r"_(.*?)_").expect("Invalid underscore regex"),
    heading: Regex::new(r"(?m)^#{1,6}\s+").expect("Invalid heading regex"),
    list_dash: Regex::new(r"(?m)^-\s+").expect("Invalid list regex"),
});

/// Strip markdown decoration from a provider reply.
///
/// Substitution order matters: the bold pass must run before the italic pass
/// so `**text**` loses both stars instead of degenerating into stray single
/// stars. Unbalanced markers are left partially stripped, exactly as the
/// regexes fall out; words containing a lone `*` or `_` pass through intact.
/// The transform is idempotent.
pub fn sanitize(input: &str) -> String {
    let patterns = &*MARKDOWN_PATTERNS;
    let text = patterns.bold.replace_all(input, "$1");
    let text = patterns.italic_star.replace_all(&text, "$1");
    let text = patterns.italic_underscore.replace_all(&text, "$1");
    let text = patterns.heading.replace_all(&text, "");
    let text = patterns.list_dash.replace_all(&text, "");
    text.trim().to_string()
}

//! Post-processing: deterministic text cleanup around the tree stages.
//!
//! Vision models wrap their answer in code fences more often than not, and
//! the projector's per-tag rules append blank lines freely. The rules here
//! fix both without looking at content.
//!
//! ## Rule Order
//!
//! Input side: strip fences, then normalise line endings.
//! Output side: collapse blank-line runs, then trim.

use once_cell::sync::Lazy;
use regex::Regex;

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:html|HTML|markdown)?[ \t]*\r?\n(.*?)\r?\n?```\s*$").unwrap()
});

// Output cut off at the token limit keeps its opening fence only.
static RE_OPEN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```(?:html|HTML|markdown)?[ \t]*\r?\n").unwrap());

/// Remove a fence wrapping the whole input, if present.
///
/// Accepts ```` ```html ````, ```` ```markdown ```` and bare fences. Line
/// endings are normalised on the way out.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    let inner = match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => RE_OPEN_FENCE
            .find(trimmed)
            .map_or(input, |m| &trimmed[m.end()..]),
    };
    normalise_line_endings(inner)
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Reduce every run of three or more newlines to exactly two.
pub fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 4: Final trim ───────────────────────────────────────────────────────

/// Output-side cleanup applied to projected Markdown.
pub fn finish_markdown(input: &str) -> String {
    collapse_blank_lines(input).trim().to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_fence() {
        let input = "```html\n<p>Hello</p>\n```";
        assert_eq!(strip_code_fences(input), "<p>Hello</p>");
    }

    #[test]
    fn test_strip_fences_no_lang() {
        let input = "```\n<p>a</p>\n<p>b</p>\n```\n";
        assert_eq!(strip_code_fences(input), "<p>a</p>\n<p>b</p>");
    }

    #[test]
    fn test_no_fences_passthrough() {
        let input = "<html><body><p>x</p></body></html>";
        assert_eq!(strip_code_fences(input), input);
    }

    #[test]
    fn test_strip_fences_crlf() {
        let input = "```html\r\n<p>a</p>\r\n<p>b</p>\r\n```";
        assert_eq!(strip_code_fences(input), "<p>a</p>\n<p>b</p>");
    }

    #[test]
    fn test_strip_unclosed_fence() {
        let input = "```html\n<p>a</p><p>trunc";
        assert_eq!(strip_code_fences(input), "<p>a</p><p>trunc");
    }

    #[test]
    fn test_inner_fence_is_not_outer() {
        let input = "<p>before</p>\n```\ncode\n```";
        assert_eq!(strip_code_fences(input), input);
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb\nc"), "a\n\nb\nc");
    }

    #[test]
    fn test_finish_markdown() {
        assert_eq!(finish_markdown("\n\n# T\n\n\n\ntext\n\n"), "# T\n\ntext");
    }
}

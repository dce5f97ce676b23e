//! Text clean-up between the model and the renderer.
//!
//! [`sanitize`] prepares raw message text for a markdown renderer with
//! `$$...$$` / `$...$` math support:
//! - trims surrounding whitespace
//! - drops one pair of enclosing square brackets
//! - turns every newline into a markdown hard break (`"  \n"`)
//! - rewrites `\[...\]` to `$$...$$` and `\(...\)` to `$...$`
//!
//! Each step is a separate function; unmatched delimiters are left as they are.
//! [`strip_think_blocks`] removes `<think>...</think>` reasoning output and is
//! applied to model replies before sanitizing.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Markdown hard line break
const HARD_BREAK: &str = "  \n";

lazy_static! {
    // Spaces/tabs before a newline are folded into the hard break
    static ref NEWLINE_REGEX: Regex =
        Regex::new(r"[ \t]*\r?\n").expect("NEWLINE_REGEX pattern is valid");

    // Non-greedy, never crosses a newline
    static ref BLOCK_MATH_REGEX: Regex =
        Regex::new(r"\\\[(.*?)\\\]").expect("BLOCK_MATH_REGEX pattern is valid");

    static ref INLINE_MATH_REGEX: Regex =
        Regex::new(r"\\\((.*?)\\\)").expect("INLINE_MATH_REGEX pattern is valid");

    static ref THINK_BLOCK_REGEX: Regex =
        Regex::new(r"(?s)<think>.*?</think>").expect("THINK_BLOCK_REGEX pattern is valid");
}

/// Normalize message text for the markdown renderer
pub fn sanitize(raw: &str) -> String {
    let text = strip_enclosing_brackets(raw.trim());
    let text = hard_line_breaks(text);
    let text = convert_block_math(&text);
    convert_inline_math(&text)
}

/// Remove every `<think>...</think>` span, including ones spanning lines
pub fn strip_think_blocks(raw: &str) -> String {
    THINK_BLOCK_REGEX.replace_all(raw, "").trim().to_string()
}

/// Drop one enclosing `[` `]` pair along with the whitespace just inside it.
///
/// The pair is kept when the enclosed text is itself bracketed (starts with
/// `[` or ends with a bare `]`), so the step never peels more than one layer.
fn strip_enclosing_brackets(text: &str) -> &str {
    let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) else {
        return text;
    };

    let inner = inner.trim();
    let nested_open = inner.starts_with('[');
    let nested_close = inner.ends_with(']') && !inner.ends_with("\\]");

    if nested_open || nested_close {
        text
    } else {
        inner
    }
}

fn hard_line_breaks(text: &str) -> String {
    NEWLINE_REGEX.replace_all(text, HARD_BREAK).into_owned()
}

fn convert_block_math(text: &str) -> String {
    replace_delimiters(&BLOCK_MATH_REGEX, text, "$$")
}

fn convert_inline_math(text: &str) -> String {
    replace_delimiters(&INLINE_MATH_REGEX, text, "$")
}

/// Rewrite matched spans as `{delimiter}{body}{delimiter}`.
///
/// Repeats until nothing matches: an opener left inside a converted span
/// (`\[a\[b\]`) can pair with a later closer once the first span is gone.
/// Every pass removes delimiters, so the loop terminates.
fn replace_delimiters(regex: &Regex, text: &str, delimiter: &str) -> String {
    let mut current = text.to_string();
    while regex.is_match(&current) {
        current = regex
            .replace_all(&current, |caps: &Captures| {
                format!("{delimiter}{}{delimiter}", &caps[1])
            })
            .into_owned();
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================
    // sanitize
    // ==========================================

    #[test]
    fn test_block_math() {
        assert_eq!(sanitize("\\[x^2\\]"), "$$x^2$$");
    }

    #[test]
    fn test_inline_math() {
        assert_eq!(sanitize("\\(x\\)"), "$x$");
    }

    #[test]
    fn test_plain_text_is_trimmed_only() {
        assert_eq!(sanitize("  Hello, world!  "), "Hello, world!");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize(" \n\t "), "");
    }

    #[test]
    fn test_mixed_content() {
        let raw = "Area is \\(\\pi r^2\\).\nFormally:\n\\[A = \\int_0^r 2\\pi t\\,dt\\]";
        assert_eq!(
            sanitize(raw),
            "Area is $\\pi r^2$.  \nFormally:  \n$$A = \\int_0^r 2\\pi t\\,dt$$"
        );
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let corpus = [
            "",
            "plain",
            "  padded  ",
            "[wrapped]",
            "[ wrapped with space ]",
            "[[nested]]",
            "[a] and [b]",
            "[a \\[x\\]]",
            "[[\\[a\\]]",
            "[a \\[x\\]]]",
            "[]",
            "[",
            "]",
            "line one\nline two",
            "trailing spaces  \nkept",
            "windows\r\nline",
            "\\[x^2\\]",
            "\\(x\\)",
            "\\[a\\[b\\]c\\]",
            "\\(a\\(b\\)c\\)",
            "\\[unterminated",
            "closing only\\]",
            "\\[ multi\nline \\]",
            "\\\\[a\\]",
            "$$already$$ and $x$",
            "[\\(x\\)]",
            "mixed \\[a\\] then \\(b\\) then \\[c\\]",
        ];

        for raw in corpus {
            let once = sanitize(raw);
            let twice = sanitize(&once);
            assert_eq!(twice, once, "not idempotent for {:?}", raw);
        }
    }

    // ==========================================
    // Brackets
    // ==========================================

    #[test]
    fn test_strips_single_enclosing_pair() {
        assert_eq!(sanitize("[Hello]"), "Hello");
        assert_eq!(sanitize("  [ Hello ]  "), "Hello");
    }

    #[test]
    fn test_does_not_recurse_into_nested_brackets() {
        assert_eq!(sanitize("[[Hello]]"), "[[Hello]]");
    }

    #[test]
    fn test_brackets_must_enclose_whole_text() {
        assert_eq!(sanitize("[Hello] world"), "[Hello] world");
        assert_eq!(sanitize("Hello [world]"), "Hello [world]");
    }

    #[test]
    fn test_lone_bracket_passes_through() {
        assert_eq!(sanitize("["), "[");
        assert_eq!(sanitize("[]"), "");
    }

    // ==========================================
    // Line breaks
    // ==========================================

    #[test]
    fn test_newlines_become_hard_breaks() {
        assert_eq!(sanitize("a\nb\nc"), "a  \nb  \nc");
    }

    #[test]
    fn test_existing_trailing_spaces_are_folded() {
        assert_eq!(sanitize("a   \nb"), "a  \nb");
        assert_eq!(sanitize("a\r\nb"), "a  \nb");
    }

    #[test]
    fn test_blank_lines_survive() {
        assert_eq!(sanitize("a\n\nb"), "a  \n  \nb");
    }

    // ==========================================
    // Math delimiters
    // ==========================================

    #[test]
    fn test_multiple_block_math_spans() {
        assert_eq!(sanitize("\\[a\\] and \\[b\\]"), "$$a$$ and $$b$$");
    }

    #[test]
    fn test_multiple_inline_math_spans() {
        assert_eq!(sanitize("\\(a\\), \\(b\\)"), "$a$, $b$");
    }

    #[test]
    fn test_block_math_is_non_greedy() {
        assert_eq!(sanitize("\\[a\\] x \\]"), "$$a$$ x \\]");
    }

    #[test]
    fn test_unterminated_delimiters_pass_through() {
        assert_eq!(sanitize("\\[x^2"), "\\[x^2");
        assert_eq!(sanitize("\\(x"), "\\(x");
        assert_eq!(sanitize("x\\)"), "x\\)");
    }

    #[test]
    fn test_mismatched_delimiters_pass_through() {
        assert_eq!(sanitize("\\[x\\)"), "\\[x\\)");
        assert_eq!(sanitize("\\(x\\]"), "\\(x\\]");
    }

    #[test]
    fn test_math_does_not_cross_lines() {
        assert_eq!(sanitize("\\[a\nb\\]"), "\\[a  \nb\\]");
    }

    #[test]
    fn test_latex_commands_inside_math_are_kept() {
        assert_eq!(sanitize("\\(\\frac{a}{b}\\)"), "$\\frac{a}{b}$");
        assert_eq!(sanitize("\\[\\sum_{i=1}^n i\\]"), "$$\\sum_{i=1}^n i$$");
    }

    #[test]
    fn test_bracketed_math_keeps_delimiters() {
        assert_eq!(sanitize("[\\(x\\)]"), "$x$");
    }

    // ==========================================
    // Think blocks
    // ==========================================

    #[test]
    fn test_strip_think_block() {
        assert_eq!(strip_think_blocks("<think>plan</think>Hello"), "Hello");
    }

    #[test]
    fn test_strip_multiline_think_block() {
        let raw = "<think>\nstep one\nstep two\n</think>\n\nThe answer is 4.";
        assert_eq!(strip_think_blocks(raw), "The answer is 4.");
    }

    #[test]
    fn test_strip_all_think_blocks() {
        let raw = "<think>a</think>First. <think>b\nc</think>Second.";
        assert_eq!(strip_think_blocks(raw), "First. Second.");
    }

    #[test]
    fn test_unterminated_think_is_kept() {
        assert_eq!(strip_think_blocks("<think>still going"), "<think>still going");
    }

    #[test]
    fn test_think_strip_then_sanitize() {
        let raw = "<think>x</think>\n\\(y\\)";
        assert_eq!(sanitize(&strip_think_blocks(raw)), "$y$");
    }
}

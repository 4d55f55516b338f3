//! Pre-conversion rewrites: author-convenience syntax → canonical Markdown.
//!
//! These passes run on raw Markdown before the CommonMark parser sees it,
//! because the parser has no notion of admonitions, highlight marks or emoji
//! shortcodes. Every rewrite targets a shape the parser already understands
//! (blockquotes, inline HTML, literal characters) so the HTML post-pass can
//! recognise the result.
//!
//! ## Rule Order
//!
//! 1. Admonitions → `> [!TYPE]` blockquotes
//! 2. `==text==` → `<mark>text</mark>`
//! 3. `:shortcode:` → emoji
//!
//! Unknown directive keywords and unknown shortcodes pass through as text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Apply all pre-conversion rules in order.
pub fn preprocess_markdown(input: &str) -> String {
    let s = rewrite_admonitions(input);
    let s = rewrite_highlights(&s);
    rewrite_emoji(&s)
}

// ── Rule 1: Admonitions ─────────────────────────────────────────────────────

/// Map a fenced-directive keyword (`:::tip`) to its canonical alert tag.
fn directive_tag(keyword: &str) -> Option<&'static str> {
    match keyword {
        "note" | "info" => Some("NOTE"),
        "tip" => Some("TIP"),
        "warning" => Some("WARNING"),
        "danger" | "caution" => Some("CAUTION"),
        _ => None,
    }
}

/// Split the text after `:::` into a lowercase keyword and an optional `[title]`.
fn parse_directive_opener(rest: &str) -> (String, Option<&str>) {
    match rest.find('[') {
        Some(open) => {
            let title = rest[open + 1..].find(']').map(|close| &rest[open + 1..open + 1 + close]);
            (rest[..open].trim().to_lowercase(), title)
        }
        None => (rest.trim().to_lowercase(), None),
    }
}

/// Rewrite both admonition families into `> [!TYPE]` blockquotes.
///
/// * Fenced directives: `:::warning[Title]` … `:::`. Every interior line is
///   forced into the blockquote; blank interior lines become a bare `>` so
///   paragraphs stay separate. The closing fence becomes a blank line.
/// * Prefix callouts: `!> text` (IMPORTANT) and `?> text` (TIP). Following
///   non-blank lines continue the blockquote until the next blank line.
pub fn rewrite_admonitions(input: &str) -> String {
    let mut out: Vec<String> = Vec::with_capacity(input.lines().count());
    let mut in_directive = false;
    let mut in_callout = false;

    for line in input.split('\n') {
        let trimmed = line.trim();

        if trimmed.starts_with(":::") && !trimmed.ends_with(":::") {
            let (keyword, title) = parse_directive_opener(&trimmed[3..]);
            if let Some(tag) = directive_tag(&keyword) {
                in_directive = true;
                match title {
                    Some(t) if !t.is_empty() => out.push(format!("> [!{tag}] **{t}**")),
                    _ => out.push(format!("> [!{tag}]")),
                }
                continue;
            }
        }

        if in_directive {
            if trimmed == ":::" {
                in_directive = false;
                out.push(String::new());
            } else if trimmed.is_empty() {
                out.push(">".to_string());
            } else {
                out.push(format!("> {line}"));
            }
            continue;
        }

        if let Some(text) = trimmed.strip_prefix("!> ") {
            in_callout = true;
            out.push(format!("> [!IMPORTANT] {text}"));
        } else if let Some(text) = trimmed.strip_prefix("?> ") {
            in_callout = true;
            out.push(format!("> [!TIP] {text}"));
        } else if in_callout {
            if trimmed.is_empty() {
                in_callout = false;
                out.push(String::new());
            } else {
                out.push(format!("> {line}"));
            }
        } else {
            out.push(line.to_string());
        }
    }

    out.join("\n")
}

// ── Rule 2: Highlight marks ─────────────────────────────────────────────────

static RE_HIGHLIGHT: Lazy<Regex> = Lazy::new(|| Regex::new(r"==([^=]+)==").unwrap());

pub fn rewrite_highlights(input: &str) -> String {
    RE_HIGHLIGHT.replace_all(input, "<mark>$1</mark>").into_owned()
}

// ── Rule 3: Emoji shortcodes ────────────────────────────────────────────────

static RE_SHORTCODE: Lazy<Regex> = Lazy::new(|| Regex::new(r":([a-z0-9_+-]+):").unwrap());

static EMOJI: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("+1", "👍"), ("-1", "👎"), ("heart", "❤️"), ("star", "⭐"),
        ("fire", "🔥"), ("rocket", "🚀"), ("sparkles", "✨"), ("eyes", "👀"),
        ("clap", "👏"), ("muscle", "💪"), ("pray", "🙏"), ("wave", "👋"),
        ("warning", "⚠️"), ("x", "❌"), ("white_check_mark", "✅"), ("heavy_check_mark", "✔️"),
        ("question", "❓"), ("exclamation", "❗"), ("bangbang", "‼️"),
        ("info", "ℹ️"), ("bulb", "💡"), ("memo", "📝"), ("book", "📖"),
        ("smile", "😊"), ("grin", "😁"), ("joy", "😂"), ("thinking", "🤔"),
        ("sunglasses", "😎"), ("sob", "😭"), ("confused", "😕"), ("rage", "😡"),
        ("bug", "🐛"), ("wrench", "🔧"), ("hammer", "🔨"), ("gear", "⚙️"),
        ("lock", "🔒"), ("key", "🔑"), ("package", "📦"), ("link", "🔗"),
        ("zap", "⚡"), ("construction", "🚧"), ("recycle", "♻️"), ("trash", "🗑️"),
        ("arrow_right", "➡️"), ("arrow_left", "⬅️"), ("arrow_up", "⬆️"), ("arrow_down", "⬇️"),
        ("point_right", "👉"), ("point_left", "👈"), ("point_up", "👆"), ("point_down", "👇"),
    ])
});

pub fn rewrite_emoji(input: &str) -> String {
    RE_SHORTCODE
        .replace_all(input, |caps: &regex::Captures| match EMOJI.get(&caps[1]) {
            Some(emoji) => (*emoji).to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_with_title() {
        let input = ":::warning[Heads up]\nDisk is full.\n\nFree space first.\n:::\nAfter";
        let out = rewrite_admonitions(input);
        assert_eq!(
            out,
            "> [!WARNING] **Heads up**\n> Disk is full.\n>\n> Free space first.\n\nAfter"
        );
    }

    #[test]
    fn test_directive_type_mapping() {
        assert!(rewrite_admonitions(":::info\nx\n:::").starts_with("> [!NOTE]"));
        assert!(rewrite_admonitions(":::danger\nx\n:::").starts_with("> [!CAUTION]"));
        assert!(rewrite_admonitions(":::Tip\nx\n:::").starts_with("> [!TIP]"));
    }

    #[test]
    fn test_unknown_directive_passes_through() {
        let input = ":::details\nbody\n:::";
        assert_eq!(rewrite_admonitions(input), input);
    }

    #[test]
    fn test_prefix_callouts_continue_until_blank() {
        let input = "!> Back up first\nthen upgrade\n\nplain\n?> Use the CLI";
        let out = rewrite_admonitions(input);
        assert_eq!(
            out,
            "> [!IMPORTANT] Back up first\n> then upgrade\n\nplain\n> [!TIP] Use the CLI"
        );
    }

    #[test]
    fn test_highlight() {
        assert_eq!(
            rewrite_highlights("a ==key point== b"),
            "a <mark>key point</mark> b"
        );
        assert_eq!(rewrite_highlights("x == y"), "x == y");
    }

    #[test]
    fn test_emoji_known_and_unknown() {
        assert_eq!(rewrite_emoji("Ship it :rocket: :+1:"), "Ship it 🚀 👍");
        assert_eq!(rewrite_emoji("keep :not_an_emoji: as is"), "keep :not_an_emoji: as is");
    }

    #[test]
    fn test_full_pass() {
        let out = preprocess_markdown("?> ==Tip== :bulb:");
        assert_eq!(out, "> [!TIP] <mark>Tip</mark> 💡");
    }
}

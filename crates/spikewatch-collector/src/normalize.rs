//! Scraped-text cleanup.
//!
//! Feed pages interleave the post body with UI chrome: the author's handle
//! repeated above the text and bare relative-time tokens ("3h", "5 min",
//! "2 days ago"). Cleanup here is deliberately light — real tokenization
//! and stop-word removal happen downstream, outside this crate.

use std::sync::LazyLock;

use regex::Regex;

static REL_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+\s*(s|m|h|d|w|sec|secs|min|mins|hr|hrs|hour|hours|day|days|week|weeks)\.?\s*(ago)?$")
        .expect("relative-time regex is valid")
});

/// Cleans one post body.
///
/// - Drops leading repetitions of `author` at the start of each line.
/// - Drops lines that are nothing but a relative-time token.
/// - Trims per-line whitespace and collapses empty lines.
#[must_use]
pub fn clean_content(content: &str, author: &str) -> String {
    let mut cleaned: Vec<String> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let line = if author.is_empty() {
            line.to_string()
        } else {
            let mut tokens = line.split_whitespace().peekable();
            while tokens.peek().copied() == Some(author) {
                tokens.next();
            }
            tokens.collect::<Vec<_>>().join(" ")
        };

        if line.is_empty() || REL_TIME_RE.is_match(&line) {
            continue;
        }

        cleaned.push(line);
    }

    cleaned.join("\n")
}

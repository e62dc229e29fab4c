//! Text normalization: word counting, tier-limit truncation, blank-line
//! collapsing. Pure functions, no state.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Two or more consecutive newline sequences, any platform convention.
    static ref BLANK_LINES: Regex = Regex::new(r"(\r\n|\n|\r){2,}").unwrap();
}

/// Count words as non-empty tokens split on whitespace runs.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Truncate to at most `max_words` words, preserving the original whitespace
/// and newlines byte-for-byte. The cut lands one character into the final
/// word, so the result is always a strict prefix of the input.
///
/// Returns the (possibly shortened) text and whether truncation occurred.
pub fn truncate_to_word_limit(text: &str, max_words: usize) -> (String, bool) {
    if count_words(text) <= max_words {
        return (text.to_string(), false);
    }
    if max_words == 0 {
        return (String::new(), true);
    }

    let mut words_seen = 0;
    let mut end = text.len();
    let mut prev_was_whitespace = true;
    for (idx, ch) in text.char_indices() {
        if !ch.is_whitespace() && prev_was_whitespace {
            words_seen += 1;
        }
        prev_was_whitespace = ch.is_whitespace();
        if words_seen == max_words {
            end = idx + ch.len_utf8();
            break;
        }
    }

    (text[..end].to_string(), true)
}

/// Collapse runs of blank lines into single newlines and trim the result.
/// Applied on the plain-copy clipboard path only; rich copies keep the
/// original layout.
pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_LINES.replace_all(text, "\n").trim().to_string()
}

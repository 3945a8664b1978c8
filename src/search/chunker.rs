//! Sentence-aware text chunking
//!
//! Text is segmented into sentences, then sentences are packed greedily
//! into chunks of at most `chunk_size` characters. A sentence is never
//! split: one longer than the limit becomes a chunk on its own.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    /// Terminal punctuation (with trailing quotes/brackets) followed by
    /// whitespace, or a blank line
    static ref SENTENCE_END_RE: Regex =
        Regex::new(r#"[.!?…]+["'»”)\]]*\s+|\n[ \t]*\n\s*"#).unwrap();
}

/// Abbreviations that end in a period without ending the sentence
/// (compared lower-cased, without the final period)
const ABBREVIATIONS: &[&str] = &[
    "т.е", "т.д", "т.п", "т.к", "т.н", "т.ч", "и.т.д", "др", "пр", "см", "ср", "стр", "рис",
    "табл", "гг", "вв", "им", "проф", "акад", "доц", "напр", "ок", "прим", "англ", "лат",
    "e.g", "i.e", "etc", "vs", "dr", "mr", "mrs", "prof", "fig",
];

/// Split `text` into sentences, trimmed and non-empty, in order
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END_RE.find_iter(text) {
        if !is_boundary(&text[start..m.start()], m.as_str(), &text[m.end()..]) {
            continue;
        }
        let sentence = text[start..m.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn is_boundary(before: &str, terminator: &str, after: &str) -> bool {
    let mark = terminator.trim_end();
    if mark.is_empty() {
        // blank line
        return true;
    }
    if mark.contains(&['!', '?', '…'][..]) {
        return true;
    }

    let mut words = before.split_whitespace().rev();
    let last_word = words
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| !c.is_alphanumeric());

    if ABBREVIATIONS.contains(&last_word.to_lowercase().as_str()) {
        return false;
    }

    // Initials: "Т. Н. Иванова". A lone capital only counts when another
    // initial follows or precedes it, so "витамин С. Магний" still splits.
    if is_single_capital(last_word) {
        let next_is_initial = after
            .split_whitespace()
            .next()
            .and_then(|w| w.strip_suffix('.'))
            .map(is_single_capital)
            .unwrap_or(false);
        let prev_is_initial = words
            .next()
            .and_then(|w| w.strip_suffix('.'))
            .map(is_single_capital)
            .unwrap_or(false);
        if next_is_initial || prev_is_initial {
            return false;
        }
    }

    // Lower-case continuation: not a new sentence
    !after
        .chars()
        .next()
        .map(char::is_lowercase)
        .unwrap_or(false)
}

fn is_single_capital(word: &str) -> bool {
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase())
}

/// Greedily pack whole sentences into chunks of at most `chunk_size` chars
///
/// Sentences inside a chunk are joined by a single space. Empty input
/// yields no chunks.
pub fn split_into_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let len = sentence.chars().count();
        if current_len == 0 {
            current.push_str(sentence);
            current_len = len;
        } else if current_len + 1 + len <= chunk_size {
            current.push(' ');
            current.push_str(sentence);
            current_len += 1 + len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    debug!(chunks = chunks.len(), chunk_size, "text split into chunks");
    chunks
}

pub mod ingest;
pub mod init;
pub mod learn;
pub mod optimize;
pub mod search;
pub mod stats;

use colored::{ColoredString, Colorize};

/// Char-aware truncation for terminal output
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

pub(crate) fn colored_score(score: f32) -> ColoredString {
    let s = format!("{:.2}", score);
    if score > 0.8 {
        s.green()
    } else if score > 0.6 {
        s.yellow()
    } else {
        s.dimmed()
    }
}

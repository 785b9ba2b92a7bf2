use std::sync::OnceLock;

use regex::Regex;

/// Collapse every run of spaces, tabs, and newlines into one space.
pub fn collapse(text: &str) -> String {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    let runs = RUNS.get_or_init(|| Regex::new(r"[ \t\r\n]+").expect("Invalid whitespace regex"));
    runs.replace_all(text, " ").into_owned()
}

/// Whether text is nothing but one collapsed space.
pub fn is_separator(text: &str) -> bool {
    text == " "
}

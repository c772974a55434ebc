//! Text normalization shared by the entity resolver and intent classifier.
//!
//! The canonical form is: NFD-decomposed with combining marks removed (so
//! `"Muñoz"` and `"Munoz"` compare equal), lower-cased, with runs of
//! whitespace collapsed to single spaces.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use unicode_segmentation::UnicodeSegmentation;

pub fn fold(text: &str) -> String {
    let stripped: String = text.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace tokens of the folded form, punctuation trimmed from the edges.
pub fn tokens(text: &str) -> Vec<String> {
    fold(text)
        .unicode_words()
        .map(|word| word.to_string())
        .collect()
}

/// Case- and diacritic-insensitive equality.
pub fn eq_fold(a: &str, b: &str) -> bool {
    fold(a) == fold(b)
}

//! Text analysis for `text` fields.

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Split text into lowercase terms.
///
/// Text is NFKC-normalized first so that compatibility forms (full-width
/// letters, ligatures) index the same as their plain counterparts.
pub fn analyze(text: &str) -> Vec<String> {
    let normalized: String = text.nfkc().collect();
    normalized
        .unicode_words()
        .map(|word| word.to_lowercase())
        .collect()
}

/// Normalize a single term without splitting it. Used for patterns, where
/// wildcard characters must survive.
pub fn normalize_term(term: &str) -> String {
    term.nfkc().collect::<String>().to_lowercase()
}

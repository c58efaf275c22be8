//! crates/vocab_reader_core/src/lexicon/mod.rs
//!
//! Word lookup. Two interchangeable strategies implement the `Lexicon` port:
//! the bulk dataset (`DatasetLexicon`) and a generative lookup (`GenerativeLexicon`).
//! Which one serves readers is a deployment-time choice.

pub mod dataset;
pub mod generative;

pub use dataset::{DatasetLexicon, DictionaryIndex};
pub use generative::GenerativeLexicon;

/// Canonical form used for every lookup and de-duplication comparison:
/// trimmed, lowercased, with every non-letter character removed.
pub fn normalize_word(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}

//! crates/vocab_reader_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An article available for reading. Paragraphs are separated by `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A resolved dictionary entry, either from the bulk dataset or synthesized
/// by a generative lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DictionaryEntry {
    /// `csv_<line>` for dataset rows, `generated_<uuid>` for generative lookups.
    pub id: String,
    pub word: String,
    pub phonetic: Option<String>,
    pub definition: Option<String>,
    pub translation: Option<String>,
    pub part_of_speech: Option<String>,
    pub collins: Option<i32>,
    pub oxford: Option<i32>,
    pub tag: Option<String>,
    pub bnc: Option<i32>,
    pub frq: Option<i32>,
    pub exchange: Option<String>,
    pub detail: Option<String>,
    pub audio: Option<String>,
}

impl DictionaryEntry {
    /// The inflected forms listed in the `exchange` column, e.g. `p:ran/3:runs`.
    pub fn exchange_forms(&self) -> impl Iterator<Item = &str> {
        self.exchange
            .as_deref()
            .unwrap_or_default()
            .split('/')
            .filter_map(|part| part.split_once(':'))
            // `0` names the lemma and `1` the inflection kinds, neither is a form.
            .filter(|(kind, _)| *kind != "0" && *kind != "1")
            .map(|(_, form)| form.trim())
            .filter(|form| !form.is_empty())
    }
}

/// A word the reader flagged for practice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnfamiliarWord {
    pub id: Uuid,
    pub word: String,
    pub phonetic: Option<String>,
    pub definition: Option<String>,
    pub translation: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The fields supplied when flagging a word.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewUnfamiliarWord {
    pub word: String,
    pub phonetic: Option<String>,
    pub definition: Option<String>,
    pub translation: Option<String>,
}

impl From<&DictionaryEntry> for NewUnfamiliarWord {
    fn from(entry: &DictionaryEntry) -> Self {
        Self {
            word: entry.word.clone(),
            phonetic: entry.phonetic.clone(),
            definition: entry.definition.clone(),
            translation: entry.translation.clone(),
        }
    }
}

/// Timing of a single sentence within one reading session.
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceTiming {
    pub sentence_index: usize,
    pub display_time: DateTime<Utc>,
    pub read_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub word_count: usize,
    pub words_per_minute: Option<f64>,
}

impl SentenceTiming {
    pub fn is_complete(&self) -> bool {
        self.words_per_minute.is_some()
    }
}

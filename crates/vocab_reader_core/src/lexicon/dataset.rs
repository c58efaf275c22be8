//! crates/vocab_reader_core/src/lexicon/dataset.rs
//!
//! The static-dataset lookup strategy. The bulk word list is parsed once into a
//! `DictionaryIndex`; concurrent callers that arrive while the load is running
//! all await the same in-flight future.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error, info, warn};

use crate::domain::DictionaryEntry;
use crate::lexicon::normalize_word;
use crate::ports::{DictionarySource, Lexicon, PortError, PortResult};

/// Literal name of the first column when the dataset carries a header line.
const HEADER_WORD_COLUMN: &str = "word";

/// Regular English suffixes tried, in order, when nothing else matched.
/// The flag says whether a trailing `e` may have been dropped (`liked` -> `like`).
const INFLECTION_SUFFIXES: [(&str, bool); 4] =
    [("ing", true), ("ed", true), ("es", false), ("s", false)];

//=========================================================================================
// Row Parsing
//=========================================================================================

/// Splits one dataset row into trimmed fields. Commas inside double quotes do
/// not split; the quote characters themselves are dropped.
pub fn parse_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn text_field(fields: &[String], idx: usize) -> Option<String> {
    fields
        .get(idx)
        .filter(|value| !value.is_empty())
        .cloned()
}

fn int_field(fields: &[String], idx: usize) -> Option<i32> {
    fields.get(idx).and_then(|value| value.parse().ok())
}

fn entry_from_row(line_no: usize, fields: &[String]) -> Option<DictionaryEntry> {
    let word = text_field(fields, 0)?;
    Some(DictionaryEntry {
        id: format!("csv_{line_no}"),
        word,
        phonetic: text_field(fields, 1),
        definition: text_field(fields, 2),
        translation: text_field(fields, 3),
        part_of_speech: text_field(fields, 4),
        collins: int_field(fields, 5),
        oxford: int_field(fields, 6),
        tag: text_field(fields, 7),
        bnc: int_field(fields, 8),
        frq: int_field(fields, 9),
        exchange: text_field(fields, 10),
        detail: text_field(fields, 11),
        audio: text_field(fields, 12),
    })
}

//=========================================================================================
// The Index
//=========================================================================================

/// An immutable, in-memory index over the dataset. Entry order is the dataset
/// order and decides which entry wins a prefix or inflection match.
#[derive(Debug, Default)]
pub struct DictionaryIndex {
    entries: Vec<DictionaryEntry>,
    /// Lowercase word -> position of its first occurrence.
    by_word: BTreeMap<String, usize>,
    /// Lowercase inflected form -> position of the first entry listing it.
    by_form: HashMap<String, usize>,
}

impl DictionaryIndex {
    /// Parses the raw dataset text. A header line is detected by its first field.
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text
            .split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .collect();

        let has_header = lines.first().is_some_and(|first| {
            parse_row(first).first().map(String::as_str) == Some(HEADER_WORD_COLUMN)
        });
        let start = usize::from(has_header);

        let entries = lines
            .iter()
            .enumerate()
            .skip(start)
            .filter_map(|(line_no, line)| entry_from_row(line_no, &parse_row(line)))
            .collect();

        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<DictionaryEntry>) -> Self {
        let mut by_word = BTreeMap::new();
        let mut by_form = HashMap::new();
        for (pos, entry) in entries.iter().enumerate() {
            by_word.entry(entry.word.to_lowercase()).or_insert(pos);
            for form in entry.exchange_forms() {
                by_form.entry(form.to_lowercase()).or_insert(pos);
            }
        }
        Self {
            entries,
            by_word,
            by_form,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves an already-normalized word: exact match, then the first entry in
    /// dataset order starting with it, then inflected forms.
    pub fn find(&self, normalized: &str) -> Option<&DictionaryEntry> {
        if normalized.is_empty() {
            return None;
        }
        self.exact(normalized)
            .or_else(|| self.prefix(normalized))
            .or_else(|| self.inflected(normalized))
            .map(|pos| &self.entries[pos])
    }

    fn exact(&self, word: &str) -> Option<usize> {
        self.by_word.get(word).copied()
    }

    fn prefix(&self, word: &str) -> Option<usize> {
        self.by_word
            .range::<str, _>((std::ops::Bound::Included(word), std::ops::Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(word))
            .map(|(_, pos)| *pos)
            .min()
    }

    fn inflected(&self, word: &str) -> Option<usize> {
        if let Some(pos) = self.by_form.get(word) {
            return Some(*pos);
        }
        INFLECTION_SUFFIXES.iter().find_map(|(suffix, restore_e)| {
            let stem = word.strip_suffix(suffix).filter(|stem| stem.len() >= 2)?;
            self.exact(stem).or_else(|| {
                if *restore_e {
                    self.exact(&format!("{stem}e"))
                } else {
                    None
                }
            })
        })
    }
}

//=========================================================================================
// The Lexicon Strategy
//=========================================================================================

type LoadFuture = Shared<BoxFuture<'static, PortResult<Arc<DictionaryIndex>>>>;

enum LoadState {
    Unloaded,
    Loading(LoadFuture),
    Ready(Arc<DictionaryIndex>),
}

/// Implements `Lexicon` over the bulk dataset, loaded lazily on first use.
pub struct DatasetLexicon {
    source: Arc<dyn DictionarySource>,
    state: Mutex<LoadState>,
}

impl DatasetLexicon {
    pub fn new(source: Arc<dyn DictionarySource>) -> Self {
        Self {
            source,
            state: Mutex::new(LoadState::Unloaded),
        }
    }

    /// Starts (or joins) the load and returns the number of entries.
    pub async fn preload(&self) -> PortResult<usize> {
        Ok(self.index().await?.len())
    }

    pub fn is_ready(&self) -> bool {
        self.state
            .lock()
            .map(|state| matches!(*state, LoadState::Ready(_)))
            .unwrap_or(false)
    }

    async fn index(&self) -> PortResult<Arc<DictionaryIndex>> {
        let pending = {
            let mut state = self.lock_state()?;
            match &*state {
                LoadState::Ready(index) => return Ok(index.clone()),
                LoadState::Loading(pending) => {
                    debug!("Dictionary load already in flight, joining it.");
                    pending.clone()
                }
                LoadState::Unloaded => {
                    let pending = load_index(self.source.clone()).boxed().shared();
                    *state = LoadState::Loading(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut state = self.lock_state()?;
        let settled_by_us =
            matches!(&*state, LoadState::Loading(current) if current.ptr_eq(&pending));
        if settled_by_us {
            *state = match &result {
                Ok(index) => LoadState::Ready(index.clone()),
                // A failed load is not cached; the next lookup tries again.
                Err(_) => LoadState::Unloaded,
            };
        }
        result
    }

    fn lock_state(&self) -> PortResult<std::sync::MutexGuard<'_, LoadState>> {
        self.state
            .lock()
            .map_err(|_| PortError::Unexpected("dictionary cache lock poisoned".to_string()))
    }
}

async fn load_index(source: Arc<dyn DictionarySource>) -> PortResult<Arc<DictionaryIndex>> {
    let started = Instant::now();
    info!("Loading dictionary dataset...");
    let text = source.load_dataset().await.map_err(|e| {
        error!("Failed to load dictionary dataset: {}", e);
        e
    })?;
    let index = DictionaryIndex::parse(&text);
    if index.is_empty() {
        warn!("Dictionary dataset parsed to zero entries.");
    }
    info!(
        "Dictionary dataset ready: {} entries in {:?}",
        index.len(),
        started.elapsed()
    );
    Ok(Arc::new(index))
}

#[async_trait]
impl Lexicon for DatasetLexicon {
    async fn lookup(&self, word: &str) -> PortResult<Option<DictionaryEntry>> {
        let normalized = normalize_word(word);
        if normalized.is_empty() {
            return Ok(None);
        }
        let index = self.index().await?;
        let found = index.find(&normalized).cloned();
        debug!(
            "Dataset lookup '{}' -> {:?}",
            normalized,
            found.as_ref().map(|entry| &entry.word)
        );
        Ok(found)
    }
}

//! crates/vocab_reader_core/src/reading_speed.rs
//!
//! Per-sentence reading speed. Every sentence gets a display time when it is
//! revealed and a read time when the reader moves past it; completed sentences
//! are banded by quartile so the slowest quarter can be offered for review.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::SentenceTiming;

/// Words per minute for `word_count` words read in `elapsed_ms`. Zero words or a
/// non-positive duration give zero.
pub fn words_per_minute(word_count: usize, elapsed_ms: i64) -> f64 {
    if word_count == 0 || elapsed_ms <= 0 {
        return 0.0;
    }
    word_count as f64 * 60_000.0 / elapsed_ms as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeedBand {
    Slow,
    Medium,
    Fast,
    VeryFast,
}

/// One completed sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceSpeed {
    pub sentence_index: usize,
    pub word_count: usize,
    pub duration_ms: i64,
    pub words_per_minute: f64,
}

/// Nearest-rank thresholds at the 25th, 50th and 75th percentiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

impl Quartiles {
    /// `sorted` must be ascending and non-empty.
    fn nearest_rank(sorted: &[f64]) -> Self {
        let at = |fraction: f64| {
            let rank = ((sorted.len() as f64 * fraction).floor() as usize).max(1);
            sorted[rank - 1]
        };
        Self {
            q1: at(0.25),
            q2: at(0.5),
            q3: at(0.75),
        }
    }

    pub fn band_of(&self, words_per_minute: f64) -> SpeedBand {
        if words_per_minute <= self.q1 {
            SpeedBand::Slow
        } else if words_per_minute <= self.q2 {
            SpeedBand::Medium
        } else if words_per_minute <= self.q3 {
            SpeedBand::Fast
        } else {
            SpeedBand::VeryFast
        }
    }
}

/// Completed sentences partitioned by band, each band in ascending speed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeedBands {
    pub slow: Vec<SentenceSpeed>,
    pub medium: Vec<SentenceSpeed>,
    pub fast: Vec<SentenceSpeed>,
    pub very_fast: Vec<SentenceSpeed>,
}

impl SpeedBands {
    fn push(&mut self, band: SpeedBand, speed: SentenceSpeed) {
        match band {
            SpeedBand::Slow => self.slow.push(speed),
            SpeedBand::Medium => self.medium.push(speed),
            SpeedBand::Fast => self.fast.push(speed),
            SpeedBand::VeryFast => self.very_fast.push(speed),
        }
    }

    pub fn get(&self, band: SpeedBand) -> &[SentenceSpeed] {
        match band {
            SpeedBand::Slow => &self.slow,
            SpeedBand::Medium => &self.medium,
            SpeedBand::Fast => &self.fast,
            SpeedBand::VeryFast => &self.very_fast,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeedSummary {
    /// Completed sentences in sentence order.
    pub sentence_speeds: Vec<SentenceSpeed>,
    pub average_wpm: f64,
    pub quartiles: Option<Quartiles>,
    pub bands: SpeedBands,
    pub total_words: usize,
    pub total_duration_ms: i64,
}

impl SpeedSummary {
    /// Sentence indexes flagged for review: exactly the slow band, in sentence order.
    pub fn unfamiliar_sentences(&self) -> Vec<usize> {
        let mut indexes: Vec<usize> = self.bands.slow.iter().map(|s| s.sentence_index).collect();
        indexes.sort_unstable();
        indexes
    }

    pub fn band_of_sentence(&self, sentence_index: usize) -> Option<SpeedBand> {
        [
            SpeedBand::Slow,
            SpeedBand::Medium,
            SpeedBand::Fast,
            SpeedBand::VeryFast,
        ]
        .into_iter()
        .find(|band| {
            self.bands
                .get(*band)
                .iter()
                .any(|s| s.sentence_index == sentence_index)
        })
    }
}

/// Collects sentence timings for one session. `summarize` is a pure function
/// of the recorded history.
#[derive(Debug, Clone, Default)]
pub struct ReadingSpeedAnalyzer {
    timings: BTreeMap<usize, SentenceTiming>,
}

impl ReadingSpeedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or reopens) the timing record of a sentence.
    pub fn record_display(&mut self, sentence_index: usize, word_count: usize, at: DateTime<Utc>) {
        self.timings.insert(
            sentence_index,
            SentenceTiming {
                sentence_index,
                display_time: at,
                read_time: None,
                duration_ms: None,
                word_count,
                words_per_minute: None,
            },
        );
    }

    /// Closes the timing record of a sentence and returns its speed. A record
    /// that is missing or already closed is left alone.
    pub fn record_advance(&mut self, sentence_index: usize, at: DateTime<Utc>) -> Option<f64> {
        let Some(timing) = self.timings.get_mut(&sentence_index) else {
            warn!("Advance recorded for sentence {} that was never displayed.", sentence_index);
            return None;
        };
        if timing.is_complete() {
            return None;
        }
        let elapsed_ms = (at - timing.display_time).num_milliseconds();
        let speed = words_per_minute(timing.word_count, elapsed_ms);
        timing.read_time = Some(at);
        timing.duration_ms = Some(elapsed_ms.max(0));
        timing.words_per_minute = Some(speed);
        Some(speed)
    }

    pub fn timings(&self) -> impl Iterator<Item = &SentenceTiming> {
        self.timings.values()
    }

    pub fn clear(&mut self) {
        self.timings.clear();
    }

    pub fn summarize(&self) -> SpeedSummary {
        let sentence_speeds: Vec<SentenceSpeed> = self
            .timings
            .values()
            .filter_map(|t| {
                Some(SentenceSpeed {
                    sentence_index: t.sentence_index,
                    word_count: t.word_count,
                    duration_ms: t.duration_ms?,
                    words_per_minute: t.words_per_minute?,
                })
            })
            .collect();

        if sentence_speeds.is_empty() {
            return SpeedSummary::default();
        }

        let total_words = sentence_speeds.iter().map(|s| s.word_count).sum();
        let total_duration_ms = sentence_speeds.iter().map(|s| s.duration_ms).sum();
        let average_wpm = sentence_speeds.iter().map(|s| s.words_per_minute).sum::<f64>()
            / sentence_speeds.len() as f64;

        let mut by_speed = sentence_speeds.clone();
        by_speed.sort_by(|a, b| {
            a.words_per_minute
                .total_cmp(&b.words_per_minute)
                .then(a.sentence_index.cmp(&b.sentence_index))
        });
        let sorted: Vec<f64> = by_speed.iter().map(|s| s.words_per_minute).collect();
        let quartiles = Quartiles::nearest_rank(&sorted);

        let mut bands = SpeedBands::default();
        for speed in by_speed {
            bands.push(quartiles.band_of(speed.words_per_minute), speed);
        }

        SpeedSummary {
            sentence_speeds,
            average_wpm,
            quartiles: Some(quartiles),
            bands,
            total_words,
            total_duration_ms,
        }
    }
}

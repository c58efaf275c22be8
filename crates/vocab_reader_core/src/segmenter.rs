//! crates/vocab_reader_core/src/segmenter.rs
//!
//! Splits article text into sentences and sentences into renderable tokens.
//!
//! Sentence splitting is a punctuation heuristic: abbreviations ("Dr.") and
//! decimals ("3.5") over-split. Tokenization is lossless, so concatenating the
//! tokens of a sentence gives the sentence back.

use std::sync::LazyLock;

use regex::Regex;

use crate::lexicon::normalize_word;

/// A run of non-terminators followed by one or more terminators.
static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]+").expect("sentence pattern is valid"));

/// Bracket markers, whitespace runs, bracket-free chunks, or a stray `[`.
/// Every character of the input belongs to exactly one match.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<marked>\[[^\[\]]+\])|(?P<space>\s+)|(?P<chunk>[^\s\[]+)|(?P<stray>\[)")
        .expect("token pattern is valid")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// One renderable piece of a sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A chunk containing at least one letter, possibly with attached punctuation.
    Word(String),
    /// A `[word]` marker written by the rewrite step. Holds the brackets.
    Marked(String),
    Whitespace(String),
    /// Anything else, passed through unchanged.
    Punctuation(String),
}

impl Token {
    /// The original text of the token, brackets included.
    pub fn as_str(&self) -> &str {
        match self {
            Token::Word(s) | Token::Marked(s) | Token::Whitespace(s) | Token::Punctuation(s) => s,
        }
    }

    pub fn is_clickable(&self) -> bool {
        matches!(self, Token::Word(_) | Token::Marked(_))
    }

    /// The word to look up when the token is activated.
    pub fn lookup_text(&self) -> Option<String> {
        if !self.is_clickable() {
            return None;
        }
        let word = normalize_word(self.as_str());
        (!word.is_empty()).then_some(word)
    }
}

/// Splits text into sentences: paragraphs first (on `\n`), then terminator runs.
/// A paragraph without terminators is one sentence; text after the last
/// terminator of a paragraph is kept as a final sentence.
pub fn segment_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for paragraph in text.split('\n').filter(|p| !p.trim().is_empty()) {
        let mut consumed = 0;
        for found in SENTENCE.find_iter(paragraph) {
            sentences.push(found.as_str().trim().to_string());
            consumed = found.end();
        }
        let rest = paragraph[consumed..].trim();
        if !rest.is_empty() {
            sentences.push(rest.to_string());
        }
    }

    sentences.retain(|s| !s.is_empty());
    sentences
}

/// Splits a sentence into tokens, preserving order and spacing.
pub fn tokenize(sentence: &str) -> Vec<Token> {
    TOKEN
        .captures_iter(sentence)
        .filter_map(|caps| {
            if let Some(m) = caps.name("marked") {
                Some(Token::Marked(m.as_str().to_string()))
            } else if let Some(m) = caps.name("space") {
                Some(Token::Whitespace(m.as_str().to_string()))
            } else if let Some(m) = caps.name("chunk") {
                let text = m.as_str().to_string();
                if text.chars().any(char::is_alphabetic) {
                    Some(Token::Word(text))
                } else {
                    Some(Token::Punctuation(text))
                }
            } else {
                caps.name("stray")
                    .map(|m| Token::Punctuation(m.as_str().to_string()))
            }
        })
        .collect()
}

/// Counts words for reading-speed purposes: tags and non-letters are dropped,
/// then whitespace-separated fragments are counted.
pub fn count_words(sentence: &str) -> usize {
    let without_tags = TAG.replace_all(sentence, " ");
    let letters: String = without_tags
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_whitespace())
        .collect();
    letters.split_whitespace().count()
}

//! services/api/src/web/protocol.rs
//!
//! Defines the JSON shapes exchanged with the browser: the REST payloads and the
//! WebSocket message protocol of a reading session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use vocab_reader_core::domain::{Article, DictionaryEntry, NewUnfamiliarWord, UnfamiliarWord};
use vocab_reader_core::reading_speed::{SentenceSpeed, SpeedSummary};
use vocab_reader_core::segmenter::Token;
use vocab_reader_core::session::{ReadingText, Sentence};

//=========================================================================================
// Shared Payloads
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ArticleDto {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Article> for ArticleDto {
    fn from(a: Article) -> Self {
        Self {
            id: a.id,
            title: a.title,
            content: a.content,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct CreateArticleRequest {
    pub title: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DictionaryEntryDto {
    pub id: String,
    pub word: String,
    pub phonetic: Option<String>,
    pub definition: Option<String>,
    pub translation: Option<String>,
    pub pos: Option<String>,
    pub collins: Option<i32>,
    pub oxford: Option<i32>,
    pub tag: Option<String>,
    pub bnc: Option<i32>,
    pub frq: Option<i32>,
    pub exchange: Option<String>,
    pub detail: Option<String>,
    pub audio: Option<String>,
}

impl From<DictionaryEntry> for DictionaryEntryDto {
    fn from(e: DictionaryEntry) -> Self {
        Self {
            id: e.id,
            word: e.word,
            phonetic: e.phonetic,
            definition: e.definition,
            translation: e.translation,
            pos: e.part_of_speech,
            collins: e.collins,
            oxford: e.oxford,
            tag: e.tag,
            bnc: e.bnc,
            frq: e.frq,
            exchange: e.exchange,
            detail: e.detail,
            audio: e.audio,
        }
    }
}

impl From<DictionaryEntryDto> for DictionaryEntry {
    fn from(e: DictionaryEntryDto) -> Self {
        Self {
            id: e.id,
            word: e.word,
            phonetic: e.phonetic,
            definition: e.definition,
            translation: e.translation,
            part_of_speech: e.pos,
            collins: e.collins,
            oxford: e.oxford,
            tag: e.tag,
            bnc: e.bnc,
            frq: e.frq,
            exchange: e.exchange,
            detail: e.detail,
            audio: e.audio,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct UnfamiliarWordDto {
    pub id: Uuid,
    pub word: String,
    pub phonetic: Option<String>,
    pub definition: Option<String>,
    pub translation: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UnfamiliarWord> for UnfamiliarWordDto {
    fn from(w: UnfamiliarWord) -> Self {
        Self {
            id: w.id,
            word: w.word,
            phonetic: w.phonetic,
            definition: w.definition,
            translation: w.translation,
            created_at: w.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct AddUnfamiliarWordRequest {
    pub word: String,
    pub phonetic: Option<String>,
    pub definition: Option<String>,
    pub translation: Option<String>,
}

impl From<AddUnfamiliarWordRequest> for NewUnfamiliarWord {
    fn from(r: AddUnfamiliarWordRequest) -> Self {
        Self {
            word: r.word,
            phonetic: r.phonetic,
            definition: r.definition,
            translation: r.translation,
        }
    }
}

//=========================================================================================
// Reading Session Payloads
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Word,
    Marked,
    Whitespace,
    Punctuation,
}

/// One renderable token. `lookup` is the word sent back on activation.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TokenDto {
    pub kind: TokenKind,
    pub text: String,
    pub lookup: Option<String>,
}

impl From<&Token> for TokenDto {
    fn from(token: &Token) -> Self {
        let kind = match token {
            Token::Word(_) => TokenKind::Word,
            Token::Marked(_) => TokenKind::Marked,
            Token::Whitespace(_) => TokenKind::Whitespace,
            Token::Punctuation(_) => TokenKind::Punctuation,
        };
        Self {
            kind,
            text: token.as_str().to_string(),
            lookup: token.lookup_text(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SentenceDto {
    pub text: String,
    pub tokens: Vec<TokenDto>,
    pub word_count: usize,
}

impl From<&Sentence> for SentenceDto {
    fn from(s: &Sentence) -> Self {
        Self {
            text: s.text.clone(),
            tokens: s.tokens.iter().map(TokenDto::from).collect(),
            word_count: s.word_count,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SentenceSpeedDto {
    pub sentence_index: usize,
    pub word_count: usize,
    pub duration_ms: i64,
    pub words_per_minute: f64,
}

impl From<&SentenceSpeed> for SentenceSpeedDto {
    fn from(s: &SentenceSpeed) -> Self {
        Self {
            sentence_index: s.sentence_index,
            word_count: s.word_count,
            duration_ms: s.duration_ms,
            words_per_minute: s.words_per_minute,
        }
    }
}

/// Sentence indexes per band, each in ascending speed order.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct BandsDto {
    pub slow: Vec<usize>,
    pub medium: Vec<usize>,
    pub fast: Vec<usize>,
    pub very_fast: Vec<usize>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SummaryDto {
    pub sentence_speeds: Vec<SentenceSpeedDto>,
    pub average_wpm: f64,
    /// `[q1, q2, q3]`, absent when no sentence was completed.
    pub quartiles: Option<[f64; 3]>,
    pub bands: BandsDto,
    pub unfamiliar_sentences: Vec<usize>,
    pub total_words: usize,
    pub total_duration_ms: i64,
}

impl From<&SpeedSummary> for SummaryDto {
    fn from(s: &SpeedSummary) -> Self {
        let indexes = |band: &[SentenceSpeed]| -> Vec<usize> {
            band.iter().map(|speed| speed.sentence_index).collect()
        };
        Self {
            sentence_speeds: s.sentence_speeds.iter().map(SentenceSpeedDto::from).collect(),
            average_wpm: s.average_wpm,
            quartiles: s.quartiles.map(|q| [q.q1, q.q2, q.q3]),
            bands: BandsDto {
                slow: indexes(&s.bands.slow),
                medium: indexes(&s.bands.medium),
                fast: indexes(&s.bands.fast),
                very_fast: indexes(&s.bands.very_fast),
            },
            unfamiliar_sentences: s.unfamiliar_sentences(),
            total_words: s.total_words,
            total_duration_ms: s.total_duration_ms,
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// Timestamps are the client's key-press times; when absent the server clock is used.
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts a session on an article. This must be the first message sent on the connection.
    Init { article_id: Uuid },

    /// Reveals the next sentence.
    Advance {
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },

    /// Looks up a token's word and opens the popup.
    Lookup { word: String },

    ClosePopup,

    /// Adds the looked-up entry to the reader's unfamiliar words.
    MarkUnfamiliar { entry: DictionaryEntryDto },

    Finish {
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },

    Restart {
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },

    /// Saves the rewritten text as a new article.
    SaveRewritten { title: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The article is being rewritten around the reader's unfamiliar words.
    Rewriting,

    /// The text is segmented and the first sentence is visible.
    Ready {
        article_id: Uuid,
        title: String,
        rewritten: bool,
        sentences: Vec<SentenceDto>,
        visible_sentence_count: usize,
        /// Why the original text is shown instead of a rewrite.
        rewrite_error: Option<String>,
        highlighted_words: Vec<String>,
    },

    Revealed {
        visible_sentence_count: usize,
        can_finish: bool,
    },

    LookupResult {
        word: String,
        entry: Option<DictionaryEntryDto>,
        error: Option<String>,
    },

    WordMarked { word: String, success: bool },

    Summary { summary: SummaryDto },

    ArticleSaved { article: ArticleDto },

    /// Reports an error to the client, which should display the message.
    Error { message: String },
}

impl ServerMessage {
    pub fn ready(text: &ReadingText, visible_sentence_count: usize) -> Self {
        ServerMessage::Ready {
            article_id: text.article.id,
            title: text.article.title.clone(),
            rewritten: text.rewritten,
            sentences: text.sentences.iter().map(SentenceDto::from).collect(),
            visible_sentence_count,
            rewrite_error: text
                .rewrite_error
                .as_ref()
                .map(|e| e.user_message().to_string()),
            highlighted_words: text.highlighted_words.clone(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

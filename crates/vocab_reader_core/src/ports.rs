//! crates/vocab_reader_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the article store, the word store, the dictionary dataset
//! and the generative-text backend.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Article, DictionaryEntry, NewUnfamiliarWord, UnfamiliarWord};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// Every failure of an asynchronous boundary call is converted into one of these
/// kinds. None of them is fatal to a reading session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// A required backend credential is absent. Detected before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The backend answered with a non-success status, or the call itself failed.
    #[error("Upstream error (status {status:?}): {message}")]
    Upstream { status: Option<u16>, message: String },
    /// The payload parsed at the transport level but broke the expected contract.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The owning session was abandoned while the call was in flight.
    #[error("Cancelled")]
    Cancelled,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// The short message shown to the reader. Diagnostic detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "The text service is not configured yet.",
            Self::Upstream { .. } => "The text service is unavailable right now. Please try again.",
            Self::MalformedResponse(_) => "The text service returned an unexpected answer.",
            Self::NotFound(_) => "Nothing was found.",
            Self::Cancelled => "The request was cancelled.",
            Self::Unexpected(_) => "Something went wrong.",
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn get_article_by_id(&self, article_id: Uuid) -> PortResult<Article>;

    /// All articles, newest first.
    async fn list_articles(&self) -> PortResult<Vec<Article>>;

    /// Articles whose title contains `title_substring` (case-insensitive), newest first.
    async fn search_articles(&self, title_substring: &str) -> PortResult<Vec<Article>>;

    /// Persists a rewritten text as a new article.
    async fn save_rewritten_article(&self, title: &str, content: &str) -> PortResult<Article>;
}

#[async_trait]
pub trait UnfamiliarWordStore: Send + Sync {
    /// Adds a word to the reader's collection. Adding a word that is already
    /// present succeeds without creating a new record.
    async fn add_unfamiliar_word(&self, word: NewUnfamiliarWord) -> PortResult<bool>;

    /// The reader's collection, newest first.
    async fn list_unfamiliar_words(&self) -> PortResult<Vec<UnfamiliarWord>>;

    async fn remove_unfamiliar_word(&self, word_id: Uuid) -> PortResult<bool>;
}

/// Resolves a raw token into a dictionary entry.
#[async_trait]
pub trait Lexicon: Send + Sync {
    /// Returns `Ok(None)` when the word is simply absent.
    async fn lookup(&self, word: &str) -> PortResult<Option<DictionaryEntry>>;
}

/// Provides the raw text of the bulk dictionary dataset.
#[async_trait]
pub trait DictionarySource: Send + Sync {
    async fn load_dataset(&self) -> PortResult<String>;
}

/// A single-instruction request to a generative-text backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// The model identifiers this service was configured with.
    fn lookup_model(&self) -> &str;
    fn rewrite_model(&self) -> &str;

    /// Whether the backend credential is present.
    fn is_configured(&self) -> bool;

    /// Sends the request and returns the first completion's message content.
    async fn complete(&self, request: CompletionRequest) -> PortResult<String>;
}

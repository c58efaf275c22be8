//! crates/vocab_reader_core/src/session.rs
//!
//! The reading-session state machine:
//! `Loading -> (Rewriting) -> Reading -> Finished`, with restart back into `Reading`.
//!
//! The controller is driven by one owner (a connection handler). Abandoning a
//! session cancels whatever boundary call is in flight and drops all timing state.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Article, DictionaryEntry, NewUnfamiliarWord};
use crate::ports::{
    ArticleStore, Lexicon, PortError, PortResult, TextGenerationService, UnfamiliarWordStore,
};
use crate::reading_speed::{ReadingSpeedAnalyzer, SpeedSummary};
use crate::rewrite::{extract_highlighted_words, RewriteOrchestrator, RewriteResult};
use crate::segmenter::{count_words, segment_into_sentences, tokenize, Token};

//=========================================================================================
// Collaborators
//=========================================================================================

/// A source of "now", swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The ports a session needs.
#[derive(Clone)]
pub struct SessionServices {
    pub articles: Arc<dyn ArticleStore>,
    pub words: Arc<dyn UnfamiliarWordStore>,
    pub lexicon: Arc<dyn Lexicon>,
    pub generator: Arc<dyn TextGenerationService>,
}

//=========================================================================================
// State
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    pub text: String,
    pub tokens: Vec<Token>,
    pub word_count: usize,
}

impl Sentence {
    pub fn new(text: String) -> Self {
        Self {
            tokens: tokenize(&text),
            word_count: count_words(&text),
            text,
        }
    }
}

/// The text being read, after the rewrite step (or its fallback).
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingText {
    pub article: Article,
    /// The rewritten text, or the original content when no rewrite happened.
    pub text: String,
    pub rewritten: bool,
    /// Why the rewrite fell back to the original, if it did.
    pub rewrite_error: Option<PortError>,
    pub highlighted_words: Vec<String>,
    pub sentences: Vec<Sentence>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    Rewriting {
        article: Article,
        target_words: Vec<String>,
    },
    Reading {
        text: ReadingText,
        visible_sentence_count: usize,
        popup_open: bool,
    },
    Finished {
        text: ReadingText,
        summary: SpeedSummary,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Rewriting { .. } => "rewriting",
            SessionState::Reading { .. } => "reading",
            SessionState::Finished { .. } => "finished",
        }
    }

    pub fn text(&self) -> Option<&ReadingText> {
        match self {
            SessionState::Reading { text, .. } | SessionState::Finished { text, .. } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} while the session is {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
    #[error("{remaining} sentence(s) are still hidden")]
    SentencesRemaining { remaining: usize },
    #[error(transparent)]
    Port(#[from] PortError),
}

impl SessionError {
    /// A message safe to show the reader.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Port(e) => e.user_message().to_string(),
            other => other.to_string(),
        }
    }
}

/// What an advance signal did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Revealed { visible_sentence_count: usize },
    /// Every sentence is already visible; the reader may finish.
    AtEnd,
    /// A lookup popup is open and swallows the signal.
    Blocked,
}

//=========================================================================================
// The Controller
//=========================================================================================

pub struct SessionController {
    services: SessionServices,
    rewriter: RewriteOrchestrator,
    clock: Arc<dyn Clock>,
    state: SessionState,
    analyzer: ReadingSpeedAnalyzer,
    cancel: CancellationToken,
    phase: watch::Sender<&'static str>,
}

impl SessionController {
    pub fn new(services: SessionServices) -> Self {
        Self::with_clock(services, Arc::new(SystemClock))
    }

    pub fn with_clock(services: SessionServices, clock: Arc<dyn Clock>) -> Self {
        let rewriter = RewriteOrchestrator::new(services.generator.clone());
        let (phase, _) = watch::channel(SessionState::Loading.name());
        Self {
            services,
            rewriter,
            clock,
            state: SessionState::Loading,
            analyzer: ReadingSpeedAnalyzer::new(),
            cancel: CancellationToken::new(),
            phase,
        }
    }

    fn set_state(&mut self, state: SessionState) {
        self.phase.send_replace(state.name());
        self.state = state;
    }

    /// Follows the name of the current state, including the transient
    /// `rewriting` state that `load` passes through.
    pub fn watch_state(&self) -> watch::Receiver<&'static str> {
        self.phase.subscribe()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn analyzer(&self) -> &ReadingSpeedAnalyzer {
        &self.analyzer
    }

    /// A handle that abandons the in-flight boundary call when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn guarded<T>(&self, call: impl Future<Output = PortResult<T>>) -> PortResult<T> {
        let token = self.cancel.clone();
        tokio::select! {
            _ = token.cancelled() => Err(PortError::Cancelled),
            result = call => result,
        }
    }

    /// Loads an article, fetches the reader's unfamiliar words, rewrites the
    /// article around them, and starts reading at the first sentence.
    ///
    /// Only a missing article (or cancellation) is an error; a failed word fetch
    /// reads the article without targets, a failed rewrite reads the original.
    pub async fn load(&mut self, article_id: Uuid) -> PortResult<&ReadingText> {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.set_state(SessionState::Loading);
        self.analyzer.clear();

        let article = self
            .guarded(self.services.articles.get_article_by_id(article_id))
            .await?;

        // The rewrite needs this list, so it is awaited before the rewrite starts.
        let target_words: Vec<String> = match self
            .guarded(self.services.words.list_unfamiliar_words())
            .await
        {
            Ok(words) => words.into_iter().map(|w| w.word).collect(),
            Err(PortError::Cancelled) => return Err(PortError::Cancelled),
            Err(e) => {
                warn!("Unfamiliar words unavailable, reading without targets: {}", e);
                Vec::new()
            }
        };

        let (text, rewritten, rewrite_error) = if target_words.is_empty() {
            (article.content.clone(), false, None)
        } else {
            self.set_state(SessionState::Rewriting {
                article: article.clone(),
                target_words: target_words.clone(),
            });
            let result = self
                .guarded(async { Ok(self.rewriter.rewrite(&article.content, &target_words).await) })
                .await;
            match result {
                Ok(RewriteResult::Success { rewritten_text }) => (rewritten_text, true, None),
                Ok(RewriteResult::Failure { error }) => {
                    warn!("Falling back to the original article: {}", error);
                    (article.content.clone(), false, Some(error))
                }
                Err(e) => {
                    self.set_state(SessionState::Loading);
                    return Err(e);
                }
            }
        };

        let sentences: Vec<Sentence> = segment_into_sentences(&text)
            .into_iter()
            .map(Sentence::new)
            .collect();
        info!(
            "Article {} ready: {} sentences (rewritten: {})",
            article.id,
            sentences.len(),
            rewritten
        );

        let reading = ReadingText {
            highlighted_words: if rewritten {
                extract_highlighted_words(&text)
            } else {
                Vec::new()
            },
            article,
            text,
            rewritten,
            rewrite_error,
            sentences,
        };
        self.begin_reading(reading, self.clock.now());

        match &self.state {
            SessionState::Reading { text, .. } => Ok(text),
            _ => Err(PortError::Unexpected("session did not enter reading".to_string())),
        }
    }

    fn begin_reading(&mut self, text: ReadingText, at: DateTime<Utc>) {
        self.analyzer.clear();
        let visible_sentence_count = match text.sentences.first() {
            Some(first) => {
                self.analyzer.record_display(0, first.word_count, at);
                1
            }
            None => 0,
        };
        self.set_state(SessionState::Reading {
            text,
            visible_sentence_count,
            popup_open: false,
        });
    }

    /// Reveals the next sentence, closing the timing of the one just left.
    pub fn advance(&mut self, at: DateTime<Utc>) -> Result<AdvanceOutcome, SessionError> {
        let state = self.state.name();
        let SessionState::Reading {
            text,
            visible_sentence_count,
            popup_open,
        } = &mut self.state
        else {
            return Err(SessionError::InvalidTransition {
                state,
                action: "advance",
            });
        };

        if *popup_open {
            return Ok(AdvanceOutcome::Blocked);
        }
        if *visible_sentence_count >= text.sentences.len() {
            return Ok(AdvanceOutcome::AtEnd);
        }

        self.analyzer.record_advance(*visible_sentence_count - 1, at);
        *visible_sentence_count += 1;
        let revealed = *visible_sentence_count - 1;
        self.analyzer
            .record_display(revealed, text.sentences[revealed].word_count, at);

        Ok(AdvanceOutcome::Revealed {
            visible_sentence_count: *visible_sentence_count,
        })
    }

    pub fn can_finish(&self) -> bool {
        matches!(
            &self.state,
            SessionState::Reading { text, visible_sentence_count, .. }
                if *visible_sentence_count >= text.sentences.len()
        )
    }

    /// Closes the last timing record and computes the summary.
    pub fn finish(&mut self, at: DateTime<Utc>) -> Result<&SpeedSummary, SessionError> {
        let (visible, total) = match &self.state {
            SessionState::Reading {
                text,
                visible_sentence_count,
                ..
            } => (*visible_sentence_count, text.sentences.len()),
            other => {
                return Err(SessionError::InvalidTransition {
                    state: other.name(),
                    action: "finish",
                })
            }
        };
        if visible < total {
            return Err(SessionError::SentencesRemaining {
                remaining: total - visible,
            });
        }

        if visible > 0 {
            self.analyzer.record_advance(visible - 1, at);
        }
        let summary = self.analyzer.summarize();
        info!(
            "Session finished: {} sentences timed, average {:.1} wpm, {} flagged for review",
            summary.sentence_speeds.len(),
            summary.average_wpm,
            summary.bands.slow.len()
        );

        if let SessionState::Reading { text, .. } =
            std::mem::replace(&mut self.state, SessionState::Loading)
        {
            self.set_state(SessionState::Finished { text, summary });
        }
        match &self.state {
            SessionState::Finished { summary, .. } => Ok(summary),
            other => Err(SessionError::InvalidTransition {
                state: other.name(),
                action: "finish",
            }),
        }
    }

    /// Starts the same text over from the first sentence with fresh timings.
    pub fn restart(&mut self, at: DateTime<Utc>) -> Result<(), SessionError> {
        let text = match std::mem::replace(&mut self.state, SessionState::Loading) {
            SessionState::Reading { text, .. } | SessionState::Finished { text, .. } => text,
            other => {
                let state = other.name();
                self.state = other;
                return Err(SessionError::InvalidTransition {
                    state,
                    action: "restart",
                });
            }
        };
        self.begin_reading(text, at);
        Ok(())
    }

    /// Leaves the session: cancels any in-flight call and drops all state.
    pub fn abandon(&mut self) {
        self.cancel.cancel();
        self.analyzer.clear();
        self.set_state(SessionState::Loading);
    }

    /// Looks up an activated token's word. Opens the popup while reading.
    pub async fn lookup(
        &mut self,
        raw_word: &str,
    ) -> Result<Option<DictionaryEntry>, SessionError> {
        match &mut self.state {
            SessionState::Reading { popup_open, .. } => *popup_open = true,
            SessionState::Finished { .. } => {}
            other => {
                return Err(SessionError::InvalidTransition {
                    state: other.name(),
                    action: "look up a word",
                })
            }
        }
        let result = self.guarded(self.services.lexicon.lookup(raw_word)).await;
        if let Err(e) = &result {
            warn!("Lookup for '{}' failed: {}", raw_word, e);
        }
        Ok(result?)
    }

    pub fn close_popup(&mut self) {
        if let SessionState::Reading { popup_open, .. } = &mut self.state {
            *popup_open = false;
        }
    }

    /// Adds a looked-up word to the reader's collection. Duplicates succeed.
    pub async fn mark_unfamiliar(&self, entry: &DictionaryEntry) -> PortResult<bool> {
        self.guarded(
            self.services
                .words
                .add_unfamiliar_word(NewUnfamiliarWord::from(entry)),
        )
        .await
    }

    /// Saves the rewritten text as a new article.
    pub async fn save_rewritten(&self, title: &str) -> PortResult<Article> {
        let text = match self.state.text() {
            Some(text) if text.rewritten => text,
            Some(_) => {
                return Err(PortError::Unexpected(
                    "the article was not rewritten".to_string(),
                ))
            }
            None => {
                return Err(PortError::Unexpected(format!(
                    "nothing to save while {}",
                    self.state.name()
                )))
            }
        };
        self.guarded(self.services.articles.save_rewritten_article(title, &text.text))
            .await
    }
}

//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use vocab_reader_core::ports::{ArticleStore, Lexicon, TextGenerationService, UnfamiliarWordStore};
use vocab_reader_core::session::SessionServices;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub articles: Arc<dyn ArticleStore>,
    pub words: Arc<dyn UnfamiliarWordStore>,
    pub lexicon: Arc<dyn Lexicon>,
    pub generator: Arc<dyn TextGenerationService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// The ports handed to each reading session.
    pub fn session_services(&self) -> SessionServices {
        SessionServices {
            articles: self.articles.clone(),
            words: self.words.clone(),
            lexicon: self.lexicon.clone(),
            generator: self.generator.clone(),
        }
    }
}

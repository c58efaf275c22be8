pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    routing::{delete, get},
    Router,
};
use std::sync::Arc;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that will build the web server router.
pub use ws_handler::ws_handler;

use rest::{
    add_unfamiliar_word_handler, create_article_handler, get_article_handler, health_handler,
    list_articles_handler, list_unfamiliar_words_handler, lookup_handler,
    remove_unfamiliar_word_handler,
};
use state::AppState;

/// All REST routes plus the reading-session WebSocket.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/articles", get(list_articles_handler).post(create_article_handler))
        .route("/articles/{id}", get(get_article_handler))
        .route("/lookup/{word}", get(lookup_handler))
        .route(
            "/unfamiliar-words",
            get(list_unfamiliar_words_handler).post(add_unfamiliar_word_handler),
        )
        .route("/unfamiliar-words/{id}", delete(remove_unfamiliar_word_handler))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}

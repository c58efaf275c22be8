//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::protocol::{
    AddUnfamiliarWordRequest, ArticleDto, CreateArticleRequest, DictionaryEntryDto,
    UnfamiliarWordDto,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;
use vocab_reader_core::domain::NewUnfamiliarWord;
use vocab_reader_core::ports::PortError;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_articles_handler,
        get_article_handler,
        create_article_handler,
        lookup_handler,
        list_unfamiliar_words_handler,
        add_unfamiliar_word_handler,
        remove_unfamiliar_word_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ArticleDto,
            CreateArticleRequest,
            DictionaryEntryDto,
            UnfamiliarWordDto,
            AddUnfamiliarWordRequest,
            WordAddedResponse,
        )
    ),
    tags(
        (name = "Vocabulary Reader API", description = "Articles, word lookups and the reader's unfamiliar words. Reading sessions run over the /ws WebSocket.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    generative_backend_configured: bool,
    lookup_strategy: String,
}

#[derive(Deserialize, IntoParams)]
pub struct ArticleQuery {
    /// Case-insensitive title substring.
    q: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct WordAddedResponse {
    word: String,
    success: bool,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Report whether the generative backend has a credential.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        generative_backend_configured: app_state.generator.is_configured(),
        lookup_strategy: format!("{:?}", app_state.config.lookup_strategy).to_lowercase(),
    })
}

/// List articles, newest first, optionally filtered by title.
#[utoipa::path(
    get,
    path = "/articles",
    params(ArticleQuery),
    responses(
        (status = 200, description = "Articles, newest first", body = [ArticleDto]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_articles_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ArticleQuery>,
) -> Result<Json<Vec<ArticleDto>>, ApiError> {
    let articles = match query.q.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => app_state.articles.search_articles(term).await?,
        _ => app_state.articles.list_articles().await?,
    };
    Ok(Json(articles.into_iter().map(ArticleDto::from).collect()))
}

/// Get a single article.
#[utoipa::path(
    get,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "The article id")),
    responses(
        (status = 200, description = "The article", body = ArticleDto),
        (status = 404, description = "No such article")
    )
)]
pub async fn get_article_handler(
    State(app_state): State<Arc<AppState>>,
    Path(article_id): Path<Uuid>,
) -> Result<Json<ArticleDto>, ApiError> {
    let article = app_state.articles.get_article_by_id(article_id).await?;
    Ok(Json(article.into()))
}

/// Save a text (typically a rewritten article) as a new article.
#[utoipa::path(
    post,
    path = "/articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Article created", body = ArticleDto),
        (status = 400, description = "Empty title or content")
    )
)]
pub async fn create_article_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CreateArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.title.trim().is_empty() || request.content.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "title and content are required".to_string(),
        ));
    }
    let article = app_state
        .articles
        .save_rewritten_article(request.title.trim(), &request.content)
        .await?;
    info!("Created article {}", article.id);
    Ok((StatusCode::CREATED, Json(ArticleDto::from(article))))
}

/// Look up a word with the configured lexicon.
#[utoipa::path(
    get,
    path = "/lookup/{word}",
    params(("word" = String, Path, description = "The raw token; case and punctuation are ignored")),
    responses(
        (status = 200, description = "The dictionary entry", body = DictionaryEntryDto),
        (status = 404, description = "The word is not in the dictionary"),
        (status = 502, description = "The dictionary backend failed"),
        (status = 503, description = "The generative backend has no credential")
    )
)]
pub async fn lookup_handler(
    State(app_state): State<Arc<AppState>>,
    Path(word): Path<String>,
) -> Result<Json<DictionaryEntryDto>, ApiError> {
    let entry = app_state
        .lexicon
        .lookup(&word)
        .await?
        .ok_or_else(|| PortError::NotFound(format!("'{}' is not in the dictionary", word)))?;
    Ok(Json(entry.into()))
}

/// List the reader's unfamiliar words, newest first.
#[utoipa::path(
    get,
    path = "/unfamiliar-words",
    responses((status = 200, description = "The collection", body = [UnfamiliarWordDto]))
)]
pub async fn list_unfamiliar_words_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<UnfamiliarWordDto>>, ApiError> {
    let words = app_state.words.list_unfamiliar_words().await?;
    Ok(Json(words.into_iter().map(UnfamiliarWordDto::from).collect()))
}

/// Add a word to the collection. Adding a word twice succeeds and keeps one record.
#[utoipa::path(
    post,
    path = "/unfamiliar-words",
    request_body = AddUnfamiliarWordRequest,
    responses((status = 200, description = "Whether the word is in the collection", body = WordAddedResponse))
)]
pub async fn add_unfamiliar_word_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<AddUnfamiliarWordRequest>,
) -> Result<Json<WordAddedResponse>, ApiError> {
    let new_word = NewUnfamiliarWord::from(request);
    let word = new_word.word.clone();
    let success = app_state.words.add_unfamiliar_word(new_word).await?;
    Ok(Json(WordAddedResponse { word, success }))
}

/// Remove a word from the collection.
#[utoipa::path(
    delete,
    path = "/unfamiliar-words/{id}",
    params(("id" = Uuid, Path, description = "The unfamiliar word id")),
    responses(
        (status = 204, description = "Removed"),
        (status = 404, description = "No such word")
    )
)]
pub async fn remove_unfamiliar_word_handler(
    State(app_state): State<Arc<AppState>>,
    Path(word_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if app_state.words.remove_unfamiliar_word(word_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(PortError::NotFound(format!("Unfamiliar word {} not found", word_id)).into())
    }
}

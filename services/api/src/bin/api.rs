//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{ChatCompletionAdapter, DbAdapter, FileDictionarySource, MemoryStore},
    config::{Config, LookupStrategy},
    error::ApiError,
    web::{api_router, rest::ApiDoc, state::AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use vocab_reader_core::lexicon::{DatasetLexicon, GenerativeLexicon};
use vocab_reader_core::ports::{ArticleStore, Lexicon, UnfamiliarWordStore};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to the Store ---
    let (articles, words): (Arc<dyn ArticleStore>, Arc<dyn UnfamiliarWordStore>) =
        match &config.database_url {
            Some(database_url) => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await?;
                let db_adapter = Arc::new(DbAdapter::new(db_pool));
                info!("Running database migrations...");
                db_adapter.run_migrations().await?;
                info!("Database migrations complete.");
                let articles: Arc<dyn ArticleStore> = db_adapter.clone();
                let words: Arc<dyn UnfamiliarWordStore> = db_adapter;
                (articles, words)
            }
            None => {
                warn!("DATABASE_URL is not set; articles and words are kept in memory.");
                let store = Arc::new(MemoryStore::new());
                let articles: Arc<dyn ArticleStore> = store.clone();
                let words: Arc<dyn UnfamiliarWordStore> = store;
                (articles, words)
            }
        };

    // --- 3. Initialize Service Adapters ---
    let generator = Arc::new(
        ChatCompletionAdapter::new(
            config.openai_api_key.clone(),
            config.openai_api_url.clone(),
            config.lookup_model.clone(),
            config.rewrite_model.clone(),
            config.request_timeout,
        )
        .map_err(|e| ApiError::Internal(format!("Failed to build the HTTP client: {}", e)))?,
    );
    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; rewrites and generative lookups will be unavailable.");
    }

    let lexicon: Arc<dyn Lexicon> = match config.lookup_strategy {
        LookupStrategy::Dataset => {
            let dataset = Arc::new(DatasetLexicon::new(Arc::new(FileDictionarySource::new(
                config.dictionary_path.clone(),
            ))));
            // Warm the index in the background; lookups arriving first join the same load.
            let warming = dataset.clone();
            tokio::spawn(async move {
                if let Err(e) = warming.preload().await {
                    warn!("Dictionary preload failed, will retry on first lookup: {}", e);
                }
            });
            dataset
        }
        LookupStrategy::Generative => Arc::new(GenerativeLexicon::new(generator.clone())),
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        articles,
        words,
        lexicon,
        generator,
        config: config.clone(),
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

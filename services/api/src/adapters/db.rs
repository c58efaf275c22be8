//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ArticleStore` and `UnfamiliarWordStore` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;
use vocab_reader_core::domain::{Article, NewUnfamiliarWord, UnfamiliarWord};
use vocab_reader_core::lexicon::normalize_word;
use vocab_reader_core::ports::{ArticleStore, PortError, PortResult, UnfamiliarWordStore};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements both storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn db_error(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Escapes `LIKE` wildcards so the search term matches literally.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ArticleRecord {
    id: Uuid,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ArticleRecord {
    fn to_domain(self) -> Article {
        Article {
            id: self.id,
            title: self.title,
            content: self.content,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct UnfamiliarWordRecord {
    id: Uuid,
    word: String,
    phonetic: Option<String>,
    definition: Option<String>,
    translation: Option<String>,
    created_at: DateTime<Utc>,
}
impl UnfamiliarWordRecord {
    fn to_domain(self) -> UnfamiliarWord {
        UnfamiliarWord {
            id: self.id,
            word: self.word,
            phonetic: self.phonetic,
            definition: self.definition,
            translation: self.translation,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `ArticleStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ArticleStore for DbAdapter {
    async fn get_article_by_id(&self, article_id: Uuid) -> PortResult<Article> {
        let record = sqlx::query_as::<_, ArticleRecord>(
            "SELECT id, title, content, created_at, updated_at FROM articles WHERE id = $1",
        )
        .bind(article_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Article {} not found", article_id))
            }
            _ => db_error(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_articles(&self) -> PortResult<Vec<Article>> {
        let records = sqlx::query_as::<_, ArticleRecord>(
            "SELECT id, title, content, created_at, updated_at FROM articles ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn search_articles(&self, title_substring: &str) -> PortResult<Vec<Article>> {
        let records = sqlx::query_as::<_, ArticleRecord>(
            "SELECT id, title, content, created_at, updated_at FROM articles WHERE title ILIKE $1 ORDER BY created_at DESC",
        )
        .bind(contains_pattern(title_substring))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_rewritten_article(&self, title: &str, content: &str) -> PortResult<Article> {
        let record = sqlx::query_as::<_, ArticleRecord>(
            "INSERT INTO articles (id, title, content) VALUES ($1, $2, $3) RETURNING id, title, content, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        info!("Saved article {} ('{}')", record.id, record.title);
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `UnfamiliarWordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl UnfamiliarWordStore for DbAdapter {
    async fn add_unfamiliar_word(&self, word: NewUnfamiliarWord) -> PortResult<bool> {
        let normalized = normalize_word(&word.word);
        if normalized.is_empty() {
            return Ok(false);
        }
        let result = sqlx::query(
            "INSERT INTO unfamiliar_words (id, word, phonetic, definition, translation) VALUES ($1, $2, $3, $4, $5) ON CONFLICT (word) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(&normalized)
        .bind(word.phonetic)
        .bind(word.definition)
        .bind(word.translation)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            info!("'{}' is already in the collection", normalized);
        }
        Ok(true)
    }

    async fn list_unfamiliar_words(&self) -> PortResult<Vec<UnfamiliarWord>> {
        let records = sqlx::query_as::<_, UnfamiliarWordRecord>(
            "SELECT id, word, phonetic, definition, translation, created_at FROM unfamiliar_words ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn remove_unfamiliar_word(&self, word_id: Uuid) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM unfamiliar_words WHERE id = $1")
            .bind(word_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::contains_pattern;

    #[test]
    fn search_terms_match_literally() {
        assert_eq!(contains_pattern("cat"), "%cat%");
        assert_eq!(contains_pattern("100%_done"), "%100\\%\\_done%");
    }
}

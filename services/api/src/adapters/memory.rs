//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of both storage ports, used when no database is
//! configured. Contents last for the life of the process.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;
use vocab_reader_core::domain::{Article, NewUnfamiliarWord, UnfamiliarWord};
use vocab_reader_core::lexicon::normalize_word;
use vocab_reader_core::ports::{ArticleStore, PortError, PortResult, UnfamiliarWordStore};

#[derive(Default)]
pub struct MemoryStore {
    articles: RwLock<Vec<Article>>,
    words: RwLock<Vec<UnfamiliarWord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with articles, e.g. a welcome article for local runs.
    pub async fn insert_article(&self, title: &str, content: &str) -> Article {
        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.articles.write().await.push(article.clone());
        article
    }
}

/// Newest first; ties keep insertion order reversed.
fn newest_first(mut articles: Vec<Article>) -> Vec<Article> {
    articles.reverse();
    articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    articles
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn get_article_by_id(&self, article_id: Uuid) -> PortResult<Article> {
        self.articles
            .read()
            .await
            .iter()
            .find(|a| a.id == article_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Article {} not found", article_id)))
    }

    async fn list_articles(&self) -> PortResult<Vec<Article>> {
        Ok(newest_first(self.articles.read().await.clone()))
    }

    async fn search_articles(&self, title_substring: &str) -> PortResult<Vec<Article>> {
        let needle = title_substring.to_lowercase();
        let found = self
            .articles
            .read()
            .await
            .iter()
            .filter(|a| a.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(newest_first(found))
    }

    async fn save_rewritten_article(&self, title: &str, content: &str) -> PortResult<Article> {
        Ok(self.insert_article(title, content).await)
    }
}

#[async_trait]
impl UnfamiliarWordStore for MemoryStore {
    async fn add_unfamiliar_word(&self, word: NewUnfamiliarWord) -> PortResult<bool> {
        let normalized = normalize_word(&word.word);
        if normalized.is_empty() {
            return Ok(false);
        }
        let mut words = self.words.write().await;
        if !words.iter().any(|w| w.word == normalized) {
            words.push(UnfamiliarWord {
                id: Uuid::new_v4(),
                word: normalized,
                phonetic: word.phonetic,
                definition: word.definition,
                translation: word.translation,
                created_at: Utc::now(),
            });
        }
        Ok(true)
    }

    async fn list_unfamiliar_words(&self) -> PortResult<Vec<UnfamiliarWord>> {
        let mut words = self.words.read().await.clone();
        words.reverse();
        Ok(words)
    }

    async fn remove_unfamiliar_word(&self, word_id: Uuid) -> PortResult<bool> {
        let mut words = self.words.write().await;
        let before = words.len();
        words.retain(|w| w.id != word_id);
        Ok(words.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_word(word: &str) -> NewUnfamiliarWord {
        NewUnfamiliarWord {
            word: word.to_string(),
            translation: Some("狗".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn adding_a_word_twice_keeps_one_record() {
        let store = MemoryStore::new();
        assert!(store.add_unfamiliar_word(new_word("Dog")).await.unwrap());
        assert!(store.add_unfamiliar_word(new_word("dog!")).await.unwrap());
        let words = store.list_unfamiliar_words().await.unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "dog");
    }

    #[tokio::test]
    async fn blank_words_are_rejected() {
        let store = MemoryStore::new();
        assert!(!store.add_unfamiliar_word(new_word("  42 ")).await.unwrap());
        assert!(store.list_unfamiliar_words().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn words_list_newest_first_and_can_be_removed() {
        let store = MemoryStore::new();
        store.add_unfamiliar_word(new_word("cat")).await.unwrap();
        store.add_unfamiliar_word(new_word("dog")).await.unwrap();
        let words = store.list_unfamiliar_words().await.unwrap();
        assert_eq!(words[0].word, "dog");

        assert!(store.remove_unfamiliar_word(words[0].id).await.unwrap());
        assert!(!store.remove_unfamiliar_word(words[0].id).await.unwrap());
        assert_eq!(store.list_unfamiliar_words().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn articles_are_searched_by_title_case_insensitively() {
        let store = MemoryStore::new();
        let cats = store.insert_article("Cats at Home", "Cats run fast.").await;
        store.insert_article("Dogs outside", "Dogs bark loud.").await;

        let found = store.search_articles("cats").await.unwrap();
        assert_eq!(found, vec![cats.clone()]);
        assert_eq!(store.get_article_by_id(cats.id).await.unwrap(), cats);
        assert_eq!(store.list_articles().await.unwrap().len(), 2);
        assert!(matches!(
            store.get_article_by_id(Uuid::new_v4()).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn newest_article_lists_first() {
        let store = MemoryStore::new();
        store.insert_article("First", "One.").await;
        let second = store.save_rewritten_article("Second", "Two.").await.unwrap();
        assert_eq!(store.list_articles().await.unwrap()[0].id, second.id);
    }
}

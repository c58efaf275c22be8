//! services/api/src/adapters/dictionary.rs
//!
//! Reads the bulk dictionary dataset from a file. Implements `DictionarySource`.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;
use vocab_reader_core::ports::{DictionarySource, PortError, PortResult};

pub struct FileDictionarySource {
    path: PathBuf,
}

impl FileDictionarySource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DictionarySource for FileDictionarySource {
    async fn load_dataset(&self) -> PortResult<String> {
        info!("Reading dictionary dataset from {}", self.path.display());
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            let status = match e.kind() {
                std::io::ErrorKind::NotFound => Some(404),
                _ => None,
            };
            PortError::upstream(
                status,
                format!("could not read {}: {}", self.path.display(), e),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_the_file() {
        let path = std::env::temp_dir().join(format!("vocab-dict-{}.csv", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "dog,dɒg,a domesticated animal,狗\n")
            .await
            .unwrap();
        let text = FileDictionarySource::new(path.clone())
            .load_dataset()
            .await
            .unwrap();
        assert!(text.starts_with("dog,"));
        tokio::fs::remove_file(path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_an_upstream_failure() {
        let err = FileDictionarySource::new(PathBuf::from("/definitely/not/here.csv"))
            .load_dataset()
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Upstream { status: Some(404), .. }));
    }
}

//! crates/vocab_reader_core/src/lexicon/generative.rs
//!
//! The generative lookup strategy: asks the text-generation backend for a
//! structured record describing the word, then checks it against a strict schema.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::DictionaryEntry;
use crate::lexicon::normalize_word;
use crate::ports::{CompletionRequest, Lexicon, PortError, PortResult, TextGenerationService};

const LOOKUP_MAX_TOKENS: u32 = 800;
const LOOKUP_TEMPERATURE: f32 = 0.3;

const WORD_LOOKUP_TEMPLATE: &str = r#"Describe the English word "{word}".

Answer with a single JSON object and nothing else, using exactly these keys:
{
  "word": "the word in lowercase",
  "phonetic": "its pronunciation, in IPA where possible",
  "definition": "an English definition with a short usage example",
  "translation": "a Chinese translation with a brief explanation",
  "pos": "its part of speech (noun, verb, adjective, ...)"
}"#;

/// The record shape the backend is asked to produce.
#[derive(Debug, Deserialize)]
struct LookupRecord {
    word: Option<String>,
    phonetic: Option<String>,
    definition: Option<String>,
    translation: Option<String>,
    pos: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Removes a surrounding Markdown code fence, if the model added one.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.trim_start_matches("json");
            body.strip_suffix("```").unwrap_or(body).trim()
        }
        None => trimmed,
    }
}

pub fn build_lookup_prompt(normalized_word: &str) -> String {
    WORD_LOOKUP_TEMPLATE.replace("{word}", normalized_word)
}

/// Decodes the completion into an entry. `word`, `definition` and `translation`
/// are required; anything else missing is simply absent.
pub fn parse_lookup_record(content: &str) -> PortResult<DictionaryEntry> {
    let record: LookupRecord = serde_json::from_str(strip_code_fence(content)).map_err(|e| {
        PortError::MalformedResponse(format!("lookup record is not valid JSON: {e}"))
    })?;

    let (word, definition, translation) = match (
        non_empty(record.word),
        non_empty(record.definition),
        non_empty(record.translation),
    ) {
        (Some(w), Some(d), Some(t)) => (w, d, t),
        _ => {
            return Err(PortError::MalformedResponse(
                "lookup record is missing word, definition or translation".to_string(),
            ))
        }
    };

    Ok(DictionaryEntry {
        id: format!("generated_{}", Uuid::new_v4()),
        word: word.to_lowercase(),
        phonetic: non_empty(record.phonetic),
        definition: Some(definition),
        translation: Some(translation),
        part_of_speech: non_empty(record.pos),
        ..Default::default()
    })
}

/// Implements `Lexicon` by asking the text-generation backend. Nothing is cached.
#[derive(Clone)]
pub struct GenerativeLexicon {
    service: Arc<dyn TextGenerationService>,
}

impl GenerativeLexicon {
    pub fn new(service: Arc<dyn TextGenerationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Lexicon for GenerativeLexicon {
    async fn lookup(&self, word: &str) -> PortResult<Option<DictionaryEntry>> {
        let normalized = normalize_word(word);
        if normalized.is_empty() {
            return Ok(None);
        }
        if !self.service.is_configured() {
            return Err(PortError::Configuration(
                "generative backend credential is not set".to_string(),
            ));
        }

        info!("Generative lookup for '{}'", normalized);
        let request = CompletionRequest {
            model: self.service.lookup_model().to_string(),
            prompt: build_lookup_prompt(&normalized),
            max_tokens: LOOKUP_MAX_TOKENS,
            temperature: LOOKUP_TEMPERATURE,
        };
        let content = self.service.complete(request).await?;

        parse_lookup_record(&content).map(Some).map_err(|e| {
            error!("Lookup record for '{}' rejected: {}. Raw: {}", normalized, e, content);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedService {
        configured: bool,
        reply: PortResult<String>,
        prompts: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedService {
        fn replying(reply: PortResult<String>) -> Self {
            Self {
                configured: true,
                reply,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerationService for ScriptedService {
        fn lookup_model(&self) -> &str {
            "lookup-model"
        }
        fn rewrite_model(&self) -> &str {
            "rewrite-model"
        }
        fn is_configured(&self) -> bool {
            self.configured
        }
        async fn complete(&self, request: CompletionRequest) -> PortResult<String> {
            self.prompts.lock().unwrap().push(request);
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn parses_a_complete_record() {
        let service = Arc::new(ScriptedService::replying(Ok(r#"```json
{"word":"Serendipity","phonetic":"/ˌserənˈdɪpəti/","definition":"luck in finding good things","translation":"意外发现","pos":"noun"}
```"#
            .to_string())));
        let lexicon = GenerativeLexicon::new(service.clone());

        let entry = lexicon.lookup(" Serendipity! ").await.unwrap().unwrap();
        assert_eq!(entry.word, "serendipity");
        assert_eq!(entry.part_of_speech.as_deref(), Some("noun"));
        assert!(entry.id.starts_with("generated_"));

        let sent = service.prompts.lock().unwrap();
        assert_eq!(sent[0].model, "lookup-model");
        assert_eq!(sent[0].max_tokens, 800);
        assert!(sent[0].prompt.contains("\"serendipity\""));
    }

    #[tokio::test]
    async fn each_lookup_gets_a_fresh_identifier() {
        let reply = r#"{"word":"cat","definition":"a small feline","translation":"猫"}"#;
        let lexicon = GenerativeLexicon::new(Arc::new(ScriptedService::replying(Ok(reply.into()))));
        let first = lexicon.lookup("cat").await.unwrap().unwrap();
        let second = lexicon.lookup("cat").await.unwrap().unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn missing_required_fields_are_malformed() {
        let err =
            parse_lookup_record(r#"{"word":"cat","definition":"a small feline"}"#).unwrap_err();
        assert!(matches!(err, PortError::MalformedResponse(_)));

        let err = parse_lookup_record("Sorry, I cannot help with that.").unwrap_err();
        assert!(matches!(err, PortError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn upstream_failures_pass_through() {
        let lexicon = GenerativeLexicon::new(Arc::new(ScriptedService::replying(Err(
            PortError::upstream(Some(500), "server error"),
        ))));
        let err = lexicon.lookup("cat").await.unwrap_err();
        assert_eq!(err, PortError::upstream(Some(500), "server error"));
    }

    #[tokio::test]
    async fn missing_credential_is_reported_before_any_call() {
        let service = Arc::new(ScriptedService {
            configured: false,
            reply: Ok(String::new()),
            prompts: Mutex::new(Vec::new()),
        });
        let lexicon = GenerativeLexicon::new(service.clone());
        let err = lexicon.lookup("cat").await.unwrap_err();
        assert!(matches!(err, PortError::Configuration(_)));
        assert!(service.prompts.lock().unwrap().is_empty());
    }
}

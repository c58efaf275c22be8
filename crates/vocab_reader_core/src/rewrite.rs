//! crates/vocab_reader_core/src/rewrite.rs
//!
//! Rewrites an article so that a reader's unfamiliar words appear in it, each
//! wrapped in `[...]` markers. The output is trusted as returned by the model;
//! only transport and contract failures are reported.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{error, info};

use crate::lexicon::normalize_word;
use crate::ports::{CompletionRequest, PortError, TextGenerationService};

const REWRITE_MAX_TOKENS: u32 = 2000;
const REWRITE_TEMPERATURE: f32 = 0.7;

const REWRITE_TEMPLATE: &str = r#"Rewrite the article below so that it uses {count} target {noun}: {words}

Rules:
1. Keep the overall meaning of the article.
2. Use every target word exactly once.
3. Keep the phrasing natural and the difficulty close to the original article.
4. Wrap every target word you use in square brackets, like [word].
   If a target word already appears in the original text, leave it where it is and only wrap it in brackets. Do not rewrite it or add it a second time.

Article:
{article}

Reply with the rewritten article only."#;

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("marker pattern is valid"));

/// The outcome of one rewrite. A failure keeps its error so the caller can fall
/// back to the original text and show a message.
#[derive(Debug, Clone, PartialEq)]
pub enum RewriteResult {
    Success { rewritten_text: String },
    Failure { error: PortError },
}

impl RewriteResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RewriteResult::Success { .. })
    }

    pub fn rewritten_text(&self) -> Option<&str> {
        match self {
            RewriteResult::Success { rewritten_text } => Some(rewritten_text),
            RewriteResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&PortError> {
        match self {
            RewriteResult::Failure { error } => Some(error),
            RewriteResult::Success { .. } => None,
        }
    }
}

/// Removes repeated target words, keeping first occurrences. Words are
/// compared by their normalized form, and words with no letters are dropped.
pub fn dedup_targets(target_words: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    target_words
        .iter()
        .map(|w| w.trim())
        .filter(|w| {
            let key = normalize_word(w);
            !key.is_empty() && seen.insert(key)
        })
        .map(str::to_string)
        .collect()
}

pub fn build_rewrite_prompt(original_text: &str, target_words: &[String]) -> String {
    REWRITE_TEMPLATE
        .replace("{count}", &target_words.len().to_string())
        .replace("{noun}", if target_words.len() == 1 { "word" } else { "words" })
        .replace("{words}", &target_words.join(", "))
        .replace("{article}", original_text)
}

/// The words inside `[...]` markers, in order of appearance.
pub fn extract_highlighted_words(text: &str) -> Vec<String> {
    MARKER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Builds rewrite instructions and calls the text-generation backend.
#[derive(Clone)]
pub struct RewriteOrchestrator {
    service: Arc<dyn TextGenerationService>,
}

impl RewriteOrchestrator {
    pub fn new(service: Arc<dyn TextGenerationService>) -> Self {
        Self { service }
    }

    /// With no target words the original text comes back untouched and the
    /// backend is never called.
    pub async fn rewrite(&self, original_text: &str, target_words: &[String]) -> RewriteResult {
        let targets = dedup_targets(target_words);
        if targets.is_empty() {
            return RewriteResult::Success {
                rewritten_text: original_text.to_string(),
            };
        }

        if !self.service.is_configured() {
            error!("Rewrite requested but the generative backend has no credential.");
            return RewriteResult::Failure {
                error: PortError::Configuration(
                    "generative backend credential is not set".to_string(),
                ),
            };
        }

        info!(
            "Rewriting article ({} chars) with {} target words: {}",
            original_text.len(),
            targets.len(),
            targets.join(", ")
        );
        let request = CompletionRequest {
            model: self.service.rewrite_model().to_string(),
            prompt: build_rewrite_prompt(original_text, &targets),
            max_tokens: REWRITE_MAX_TOKENS,
            temperature: REWRITE_TEMPERATURE,
        };

        match self.service.complete(request).await {
            Ok(content) => {
                let rewritten_text = content.trim().to_string();
                if rewritten_text.is_empty() {
                    error!("Rewrite completion was empty.");
                    return RewriteResult::Failure {
                        error: PortError::MalformedResponse("empty rewrite".to_string()),
                    };
                }
                info!(
                    "Rewrite finished: {} chars, {} bracket markers",
                    rewritten_text.len(),
                    extract_highlighted_words(&rewritten_text).len()
                );
                RewriteResult::Success { rewritten_text }
            }
            Err(e) => {
                error!("Rewrite failed: {}", e);
                RewriteResult::Failure { error: e }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn prompt_names_count_words_rules_and_article() {
        let prompt = build_rewrite_prompt(
            "Cats run fast.",
            &["run".to_string(), "swift".to_string()],
        );
        assert!(prompt.contains("uses 2 target words: run, swift"));
        assert!(prompt.contains("Use every target word exactly once"));
        assert!(prompt.contains("Wrap every target word you use in square brackets"));
        assert!(prompt.contains("only wrap it in brackets"));
        assert!(prompt.contains("Article:\nCats run fast."));
    }

    #[test]
    fn targets_are_an_ordered_set() {
        let words: Vec<String> = ["Run", "fast", "run!", " ", "42", "FAST", "swift"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(dedup_targets(&words), vec!["Run", "fast", "swift"]);
    }

    #[test]
    fn a_single_target_word_reads_singular() {
        let prompt = build_rewrite_prompt("Cats run fast.", &["run".to_string()]);
        assert!(prompt.contains("uses 1 target word: run\n"));
    }

    #[test]
    fn extracts_marked_words_in_order() {
        assert_eq!(
            extract_highlighted_words("The [swift] fox [ran] past [ice cream]. [unclosed"),
            vec!["swift", "ran", "ice cream"]
        );
        assert!(extract_highlighted_words("no markers").is_empty());
    }

    struct CountingService {
        configured: bool,
        reply: PortResult<String>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl CountingService {
        fn replying(reply: PortResult<String>) -> Arc<Self> {
            Arc::new(Self {
                configured: true,
                reply,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerationService for CountingService {
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
            self.requests.lock().unwrap().push(request);
            self.reply.clone()
        }
    }

    fn targets(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn no_targets_returns_the_original_without_a_call() {
        let service = CountingService::replying(Ok("unused".into()));
        let orchestrator = RewriteOrchestrator::new(service.clone());

        let result = orchestrator.rewrite("Cats run fast.", &targets(&[" ", "!"])).await;

        assert_eq!(
            result,
            RewriteResult::Success {
                rewritten_text: "Cats run fast.".into()
            }
        );
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn sends_the_rewrite_prompt_and_trims_the_reply() {
        let service = CountingService::replying(Ok("  Cats [sprint] fast.\n".into()));
        let orchestrator = RewriteOrchestrator::new(service.clone());

        let result = orchestrator
            .rewrite("Cats run fast.", &targets(&["sprint", "Sprint!"]))
            .await;

        assert_eq!(result.rewritten_text(), Some("Cats [sprint] fast."));
        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "rewrite-model");
        assert_eq!(requests[0].max_tokens, REWRITE_MAX_TOKENS);
        assert!(requests[0].prompt.contains("uses 1 target word: sprint"));
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_request() {
        let service = Arc::new(CountingService {
            configured: false,
            reply: Ok("unused".into()),
            requests: Mutex::new(Vec::new()),
        });
        let orchestrator = RewriteOrchestrator::new(service.clone());

        let result = orchestrator.rewrite("Cats run fast.", &targets(&["sprint"])).await;

        assert!(matches!(result.error(), Some(PortError::Configuration(_))));
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn blank_completion_is_malformed() {
        let service = CountingService::replying(Ok(" \n ".into()));
        let orchestrator = RewriteOrchestrator::new(service.clone());

        let result = orchestrator.rewrite("Cats run fast.", &targets(&["sprint"])).await;

        assert!(matches!(result.error(), Some(PortError::MalformedResponse(_))));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn backend_errors_pass_through() {
        let upstream = PortError::Upstream {
            status: Some(429),
            message: "rate limited".into(),
        };
        let service = CountingService::replying(Err(upstream.clone()));
        let orchestrator = RewriteOrchestrator::new(service);

        let result = orchestrator.rewrite("Cats run fast.", &targets(&["sprint"])).await;

        assert!(!result.is_success());
        assert_eq!(result.error(), Some(&upstream));
    }
}

//! End-to-end reading sessions over in-memory ports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;
use vocab_reader_core::domain::{Article, DictionaryEntry, NewUnfamiliarWord, UnfamiliarWord};
use vocab_reader_core::lexicon::DatasetLexicon;
use vocab_reader_core::ports::{
    ArticleStore, CompletionRequest, DictionarySource, Lexicon, PortError, PortResult,
    TextGenerationService, UnfamiliarWordStore,
};
use vocab_reader_core::segmenter::Token;
use vocab_reader_core::session::{
    AdvanceOutcome, Clock, SessionController, SessionError, SessionServices, SessionState,
};

//=========================================================================================
// Test Doubles
//=========================================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

struct Articles {
    article: Article,
    saved: Mutex<Vec<(String, String)>>,
    hang: bool,
}

#[async_trait]
impl ArticleStore for Articles {
    async fn get_article_by_id(&self, article_id: Uuid) -> PortResult<Article> {
        if self.hang {
            futures::future::pending::<()>().await;
        }
        if article_id == self.article.id {
            Ok(self.article.clone())
        } else {
            Err(PortError::NotFound(format!("article {article_id}")))
        }
    }

    async fn list_articles(&self) -> PortResult<Vec<Article>> {
        Ok(vec![self.article.clone()])
    }

    async fn search_articles(&self, _title_substring: &str) -> PortResult<Vec<Article>> {
        Ok(vec![self.article.clone()])
    }

    async fn save_rewritten_article(&self, title: &str, content: &str) -> PortResult<Article> {
        self.saved
            .lock()
            .unwrap()
            .push((title.to_string(), content.to_string()));
        Ok(Article {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: t0(),
            updated_at: t0(),
        })
    }
}

#[derive(Default)]
struct Words {
    words: Mutex<Vec<UnfamiliarWord>>,
    unavailable: bool,
}

impl Words {
    fn with(words: &[&str]) -> Self {
        let words = words
            .iter()
            .map(|w| UnfamiliarWord {
                id: Uuid::new_v4(),
                word: w.to_string(),
                phonetic: None,
                definition: None,
                translation: None,
                created_at: t0(),
            })
            .collect();
        Self {
            words: Mutex::new(words),
            unavailable: false,
        }
    }
}

#[async_trait]
impl UnfamiliarWordStore for Words {
    async fn add_unfamiliar_word(&self, word: NewUnfamiliarWord) -> PortResult<bool> {
        let mut words = self.words.lock().unwrap();
        if !words.iter().any(|w| w.word == word.word) {
            words.push(UnfamiliarWord {
                id: Uuid::new_v4(),
                word: word.word,
                phonetic: word.phonetic,
                definition: word.definition,
                translation: word.translation,
                created_at: t0(),
            });
        }
        Ok(true)
    }

    async fn list_unfamiliar_words(&self) -> PortResult<Vec<UnfamiliarWord>> {
        if self.unavailable {
            return Err(PortError::upstream(None, "word store offline"));
        }
        Ok(self.words.lock().unwrap().clone())
    }

    async fn remove_unfamiliar_word(&self, word_id: Uuid) -> PortResult<bool> {
        let mut words = self.words.lock().unwrap();
        let before = words.len();
        words.retain(|w| w.id != word_id);
        Ok(words.len() != before)
    }
}

/// Replies with a fixed completion and records every request.
struct Generator {
    reply: PortResult<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Generator {
    fn replying(reply: PortResult<String>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextGenerationService for Generator {
    fn lookup_model(&self) -> &str {
        "test-lookup"
    }
    fn rewrite_model(&self) -> &str {
        "test-rewrite"
    }
    fn is_configured(&self) -> bool {
        true
    }
    async fn complete(&self, request: CompletionRequest) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        self.reply.clone()
    }
}

struct InlineDataset;

#[async_trait]
impl DictionarySource for InlineDataset {
    async fn load_dataset(&self) -> PortResult<String> {
        Ok("dog,dɒg,a domesticated animal,狗,noun,,,,,,,,\n".to_string())
    }
}

struct Fixture {
    articles: Arc<Articles>,
    words: Arc<Words>,
    generator: Arc<Generator>,
    controller: SessionController,
}

fn article(content: &str) -> Article {
    Article {
        id: Uuid::new_v4(),
        title: "Animals".to_string(),
        content: content.to_string(),
        created_at: t0(),
        updated_at: t0(),
    }
}

fn fixture(content: &str, words: Words, reply: PortResult<String>) -> Fixture {
    let articles = Arc::new(Articles {
        article: article(content),
        saved: Mutex::new(Vec::new()),
        hang: false,
    });
    build(articles, Arc::new(words), Arc::new(Generator::replying(reply)))
}

fn build(articles: Arc<Articles>, words: Arc<Words>, generator: Arc<Generator>) -> Fixture {
    let lexicon: Arc<dyn Lexicon> = Arc::new(DatasetLexicon::new(Arc::new(InlineDataset)));
    let services = SessionServices {
        articles: articles.clone(),
        words: words.clone(),
        lexicon,
        generator: generator.clone(),
    };
    Fixture {
        articles,
        words,
        generator,
        controller: SessionController::with_clock(services, Arc::new(FixedClock(t0()))),
    }
}

//=========================================================================================
// Scenarios
//=========================================================================================

#[tokio::test]
async fn two_sentences_are_timed_and_banded() {
    let mut fx = fixture(
        "One two three four five. Six seven eight nine ten.",
        Words::default(),
        Ok(String::new()),
    );
    let id = fx.articles.article.id;

    let text = fx.controller.load(id).await.unwrap();
    assert!(!text.rewritten);
    assert_eq!(text.sentences.len(), 2);
    assert_eq!(fx.generator.calls.load(Ordering::SeqCst), 0);

    assert_eq!(
        fx.controller.advance(t0() + Duration::milliseconds(2000)).unwrap(),
        AdvanceOutcome::Revealed {
            visible_sentence_count: 2
        }
    );
    assert_eq!(
        fx.controller.advance(t0() + Duration::milliseconds(2500)).unwrap(),
        AdvanceOutcome::AtEnd
    );
    assert!(fx.controller.can_finish());

    let summary = fx
        .controller
        .finish(t0() + Duration::milliseconds(3000))
        .unwrap()
        .clone();
    let speeds: Vec<f64> = summary
        .sentence_speeds
        .iter()
        .map(|s| s.words_per_minute)
        .collect();
    assert_eq!(speeds, vec![150.0, 300.0]);
    assert_eq!(summary.average_wpm, 225.0);
    assert_eq!(summary.unfamiliar_sentences(), vec![0]);
    assert_eq!(summary.bands.very_fast.len(), 1);
    assert_eq!(fx.controller.state().name(), "finished");
}

#[tokio::test]
async fn rewrite_marks_target_words() {
    let mut fx = fixture(
        "Cats run fast. Dogs bark loud.",
        Words::with(&["run"]),
        Ok("Cats [run] fast. Dogs bark loud.".to_string()),
    );
    let id = fx.articles.article.id;
    let phase = fx.controller.watch_state();

    let text = fx.controller.load(id).await.unwrap().clone();
    assert_eq!(*phase.borrow(), "reading");
    assert!(text.rewritten);
    assert_eq!(text.rewrite_error, None);
    assert_eq!(text.highlighted_words, vec!["run"]);
    assert_eq!(text.sentences[0].tokens[2], Token::Marked("[run]".into()));
    assert_eq!(text.sentences[0].word_count, 3);

    let requests = fx.generator.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "test-rewrite");
    assert!(requests[0].prompt.contains("uses 1 target word: run"));
    assert!(requests[0].prompt.contains("Cats run fast. Dogs bark loud."));
}

#[tokio::test]
async fn failed_rewrite_reads_the_original_and_keeps_the_error() {
    let mut fx = fixture(
        "Cats run fast. Dogs bark loud.",
        Words::with(&["run"]),
        Err(PortError::upstream(Some(429), "rate limited")),
    );
    let id = fx.articles.article.id;

    let text = fx.controller.load(id).await.unwrap();
    assert!(!text.rewritten);
    assert_eq!(text.text, "Cats run fast. Dogs bark loud.");
    assert!(matches!(
        text.rewrite_error,
        Some(PortError::Upstream {
            status: Some(429),
            ..
        })
    ));
    assert!(text.highlighted_words.is_empty());

    let err = fx.controller.save_rewritten("Copy").await.unwrap_err();
    assert!(matches!(err, PortError::Unexpected(_)));
}

#[tokio::test]
async fn unavailable_word_store_reads_without_targets() {
    let words = Words {
        unavailable: true,
        ..Words::with(&["run"])
    };
    let mut fx = fixture("Cats run fast.", words, Ok("unused".to_string()));
    let id = fx.articles.article.id;

    let text = fx.controller.load(id).await.unwrap();
    assert!(!text.rewritten);
    assert_eq!(fx.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_article_fails_the_load() {
    let mut fx = fixture("Cats run fast.", Words::default(), Ok(String::new()));
    let err = fx.controller.load(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
    assert_eq!(fx.controller.state(), &SessionState::Loading);
}

#[tokio::test]
async fn open_popup_swallows_advance() {
    let mut fx = fixture(
        "Dogs bark. Cats purr.",
        Words::default(),
        Ok(String::new()),
    );
    let id = fx.articles.article.id;
    fx.controller.load(id).await.unwrap();

    let entry = fx.controller.lookup("Dogs!").await.unwrap().unwrap();
    assert_eq!(entry.word, "dog");
    assert_eq!(entry.translation.as_deref(), Some("狗"));
    assert_eq!(
        fx.controller.advance(t0() + Duration::seconds(1)).unwrap(),
        AdvanceOutcome::Blocked
    );

    fx.controller.close_popup();
    assert_eq!(
        fx.controller.advance(t0() + Duration::seconds(2)).unwrap(),
        AdvanceOutcome::Revealed {
            visible_sentence_count: 2
        }
    );
}

#[tokio::test]
async fn marking_a_word_twice_keeps_one_record() {
    let mut fx = fixture("Dogs bark.", Words::default(), Ok(String::new()));
    let id = fx.articles.article.id;
    fx.controller.load(id).await.unwrap();

    let entry = DictionaryEntry {
        id: "csv_0".into(),
        word: "dog".into(),
        translation: Some("狗".into()),
        ..Default::default()
    };
    assert!(fx.controller.mark_unfamiliar(&entry).await.unwrap());
    assert!(fx.controller.mark_unfamiliar(&entry).await.unwrap());
    assert_eq!(fx.words.words.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn finishing_early_is_refused() {
    let mut fx = fixture("One. Two. Three.", Words::default(), Ok(String::new()));
    let id = fx.articles.article.id;
    fx.controller.load(id).await.unwrap();

    assert_eq!(
        fx.controller.finish(t0() + Duration::seconds(1)).unwrap_err(),
        SessionError::SentencesRemaining { remaining: 2 }
    );
}

#[tokio::test]
async fn advancing_before_load_is_an_invalid_transition() {
    let mut fx = fixture("One.", Words::default(), Ok(String::new()));
    assert_eq!(
        fx.controller.advance(t0()).unwrap_err(),
        SessionError::InvalidTransition {
            state: "loading",
            action: "advance"
        }
    );
}

#[tokio::test]
async fn looking_up_before_load_is_an_invalid_transition() {
    let mut fx = fixture("One.", Words::default(), Ok(String::new()));
    assert_eq!(
        fx.controller.lookup("dog").await.unwrap_err(),
        SessionError::InvalidTransition {
            state: "loading",
            action: "look up a word"
        }
    );
}

#[tokio::test]
async fn restart_clears_timings_and_returns_to_the_first_sentence() {
    let mut fx = fixture("One two. Three four.", Words::default(), Ok(String::new()));
    let id = fx.articles.article.id;
    fx.controller.load(id).await.unwrap();
    fx.controller.advance(t0() + Duration::seconds(1)).unwrap();
    fx.controller.finish(t0() + Duration::seconds(2)).unwrap();

    let restarted_at = t0() + Duration::seconds(60);
    fx.controller.restart(restarted_at).unwrap();
    match fx.controller.state() {
        SessionState::Reading {
            visible_sentence_count,
            popup_open,
            ..
        } => {
            assert_eq!(*visible_sentence_count, 1);
            assert!(!popup_open);
        }
        other => panic!("expected reading, got {}", other.name()),
    }
    let timings: Vec<_> = fx.controller.analyzer().timings().collect();
    assert_eq!(timings.len(), 1);
    assert_eq!(timings[0].display_time, restarted_at);
    assert!(!timings[0].is_complete());
}

#[tokio::test]
async fn abandoning_cancels_an_in_flight_load() {
    let articles = Arc::new(Articles {
        article: article("Never shown."),
        saved: Mutex::new(Vec::new()),
        hang: true,
    });
    let mut fx = build(
        articles.clone(),
        Arc::new(Words::default()),
        Arc::new(Generator::replying(Ok(String::new()))),
    );
    let token = fx.controller.cancellation_token();

    let (result, _) = tokio::join!(fx.controller.load(articles.article.id), async {
        tokio::task::yield_now().await;
        token.cancel();
    });
    assert_eq!(result.unwrap_err(), PortError::Cancelled);
}

#[tokio::test]
async fn saving_the_rewrite_creates_an_article() {
    let mut fx = fixture(
        "Cats run fast.",
        Words::with(&["run"]),
        Ok("Cats [run] fast.".to_string()),
    );
    let id = fx.articles.article.id;
    fx.controller.load(id).await.unwrap();

    let saved = fx.controller.save_rewritten("Animals (practice)").await.unwrap();
    assert_eq!(saved.content, "Cats [run] fast.");
    assert_eq!(fx.articles.saved.lock().unwrap().len(), 1);
}

pub mod domain;
pub mod lexicon;
pub mod ports;
pub mod reading_speed;
pub mod rewrite;
pub mod segmenter;
pub mod session;

pub use domain::{Article, DictionaryEntry, NewUnfamiliarWord, SentenceTiming, UnfamiliarWord};
pub use lexicon::{normalize_word, DatasetLexicon, DictionaryIndex, GenerativeLexicon};
pub use ports::{
    ArticleStore, CompletionRequest, DictionarySource, Lexicon, PortError, PortResult,
    TextGenerationService, UnfamiliarWordStore,
};
pub use reading_speed::{ReadingSpeedAnalyzer, SpeedBand, SpeedSummary};
pub use rewrite::{RewriteOrchestrator, RewriteResult};
pub use session::{
    AdvanceOutcome, SessionController, SessionError, SessionServices, SessionState,
};

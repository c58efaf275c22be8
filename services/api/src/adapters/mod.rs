pub mod completion;
pub mod db;
pub mod dictionary;
pub mod memory;

pub use completion::ChatCompletionAdapter;
pub use db::DbAdapter;
pub use dictionary::FileDictionarySource;
pub use memory::MemoryStore;

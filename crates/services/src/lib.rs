//! Persistence for the chat panel: conversations, settings, and the
//! key-value backends they write through to.

pub mod conversation_store;
pub mod kv;
pub mod schema;
pub mod settings_store;

pub use conversation_store::{
    Conversation, ConversationStore, ConversationSummary, ExportFormat, SaveStatus, SearchHit,
    StoreError,
};
pub use kv::{FileStore, KeyValueStore, KvError, MemoryStore};
pub use settings_store::SettingsStore;

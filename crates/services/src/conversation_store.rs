//! Conversation store with write-through persistence.
//!
//! Conversations live in memory in insertion order; every mutation
//! serializes the whole set into the key-value backend. Backend failures
//! are logged and reported as [`SaveStatus::Failed`], never as errors, so a
//! full disk can't break the chat flow.

use crate::kv::{KeyValueStore, KvError};
use crate::schema::{SchemaError, SchemaLoader};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::agent_api::{ChatMessage, Role};
use std::sync::Arc;
use uuid::Uuid;

/// Current storage key for conversations.
pub const CONVERSATIONS_KEY: &str = "enhanced_chat_memory";
/// Flat message array written by the first panel releases.
pub const LEGACY_HISTORY_KEY: &str = "ae_chat_history";

const DEFAULT_TITLE: &str = "New conversation";
const IMPORTED_TITLE: &str = "Imported chat";
const TITLE_MAX_CHARS: usize = 40;
const MAX_SEARCH_RESULTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),

    #[error(transparent)]
    Storage(#[from] KvError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid conversation data: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Outcome of the write-through after a mutation.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    Failed(String),
}

impl SaveStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveStatus::Saved)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    fn new(title: &str) -> Self {
        let now = Utc::now();
        let title = title.trim();
        Self {
            id: Uuid::new_v4().to_string(),
            title: if title.is_empty() {
                DEFAULT_TITLE.to_string()
            } else {
                title.to_string()
            },
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    fn push(&mut self, msg: ChatMessage) {
        if self.title == DEFAULT_TITLE && msg.role == Role::User {
            let trimmed = msg.content.trim();
            let mut title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
            title = title.trim().to_string();
            if trimmed.chars().count() > TITLE_MAX_CHARS {
                title.push_str("...");
            }
            if !title.is_empty() {
                self.title = title;
            }
        }
        self.messages.push(msg);
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            updated_at: self.updated_at,
            message_count: self.messages.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub conversation_id: String,
    pub conversation_title: String,
    pub message_index: usize,
    pub snippet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
    Text,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "text" | "txt" => Ok(ExportFormat::Text),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredConversations {
    #[serde(default)]
    conversations: Vec<Conversation>,
}

// ── Schema upgrades ──────────────────────────────────────────────────

/// v0 → v1: a bare array of legacy messages becomes one imported conversation.
fn upgrade_v0(value: Value) -> Result<Value, String> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Ok(json!({ "conversations": [] }));
            }
            let messages: Vec<Value> = items.into_iter().map(normalize_legacy_message).collect();
            let created_at = messages
                .first()
                .and_then(|m| m.get("timestamp").cloned())
                .unwrap_or_else(|| json!(Utc::now()));
            Ok(json!({
                "conversations": [{
                    "id": Uuid::new_v4().to_string(),
                    "title": IMPORTED_TITLE,
                    "created_at": created_at,
                    "messages": messages,
                }]
            }))
        }
        Value::Object(map) if map.contains_key("conversations") => Ok(Value::Object(map)),
        other => Err(format!("unexpected legacy history shape: {}", type_name(&other))),
    }
}

/// v1 → v2: fill in `updated_at` from the newest message or the creation time.
fn upgrade_v1(mut value: Value) -> Result<Value, String> {
    let list = value
        .get_mut("conversations")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| "missing conversations array".to_string())?;
    for conv in list.iter_mut() {
        let obj = conv
            .as_object_mut()
            .ok_or_else(|| "conversation is not an object".to_string())?;
        if !obj.contains_key("created_at") {
            obj.insert("created_at".into(), json!(Utc::now()));
        }
        if !obj.contains_key("updated_at") {
            let last = obj
                .get("messages")
                .and_then(Value::as_array)
                .and_then(|m| m.last())
                .and_then(|m| m.get("timestamp"))
                .cloned();
            let fallback = obj.get("created_at").cloned().unwrap_or(Value::Null);
            obj.insert("updated_at".into(), last.unwrap_or(fallback));
        }
    }
    Ok(value)
}

/// Legacy entries used "ai"/"bot" roles and millisecond timestamps.
fn normalize_legacy_message(item: Value) -> Value {
    let role = item
        .get("role")
        .or_else(|| item.get("sender"))
        .and_then(Value::as_str)
        .map(|r| match r.to_ascii_lowercase().as_str() {
            "user" | "human" => "user",
            "system" | "error" => "system",
            _ => "assistant",
        })
        .unwrap_or("user");
    let content = item
        .get("content")
        .or_else(|| item.get("text"))
        .or_else(|| item.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let timestamp = match item.get("timestamp") {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        _ => Utc::now(),
    };
    json!({ "role": role, "content": content, "timestamp": timestamp })
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn conversation_loader() -> SchemaLoader {
    SchemaLoader::new(vec![upgrade_v0, upgrade_v1])
}

// ── Store ────────────────────────────────────────────────────────────

pub struct ConversationStore {
    backend: Arc<dyn KeyValueStore>,
    loader: SchemaLoader,
    conversations: Vec<Conversation>,
    /// `None` keeps every message.
    max_messages: Option<usize>,
    last_save: SaveStatus,
}

impl ConversationStore {
    /// Load conversations from `backend`, migrating older layouts once.
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let loader = conversation_loader();
        let mut store = Self {
            backend,
            loader,
            conversations: Vec::new(),
            max_messages: None,
            last_save: SaveStatus::Saved,
        };

        if let Some(raw) = store.backend.get(CONVERSATIONS_KEY)? {
            let loaded = store.loader.load(&raw)?;
            let migrated = loaded.migrated(store.loader.current_version());
            store.conversations = serde_json::from_value::<StoredConversations>(loaded.data)?.conversations;
            if migrated {
                let _ = store.persist_logged();
            }
        } else if let Some(raw) = store.backend.get(LEGACY_HISTORY_KEY)? {
            let loaded = store.loader.load(&raw)?;
            store.conversations = serde_json::from_value::<StoredConversations>(loaded.data)?.conversations;
            tracing::info!(
                conversations = store.conversations.len(),
                "imported legacy chat history"
            );
            if store.persist_logged().is_saved() {
                if let Err(e) = store.backend.remove(LEGACY_HISTORY_KEY) {
                    tracing::warn!(error = %e, "could not remove legacy chat history");
                }
            }
        }

        tracing::debug!(conversations = store.conversations.len(), "conversation store opened");
        Ok(store)
    }

    /// Drop the oldest messages once a conversation grows past `limit`.
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.max_messages = limit.filter(|l| *l > 0);
        self
    }

    pub fn create_conversation(&mut self, title: &str) -> String {
        let conv = Conversation::new(title);
        let id = conv.id.clone();
        self.conversations.push(conv);
        let _ = self.persist_logged();
        id
    }

    pub fn append_message(
        &mut self,
        conversation_id: &str,
        message: ChatMessage,
    ) -> Result<SaveStatus, StoreError> {
        let limit = self.max_messages;
        let conv = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| StoreError::UnknownConversation(conversation_id.to_string()))?;
        conv.push(message);
        if let Some(limit) = limit {
            let excess = conv.messages.len().saturating_sub(limit);
            if excess > 0 {
                conv.messages.drain(..excess);
            }
        }
        Ok(self.persist_logged())
    }

    /// Summaries of every conversation, most recently updated first.
    pub fn get_conversation_list(&self) -> Vec<ConversationSummary> {
        let mut list: Vec<ConversationSummary> =
            self.conversations.iter().map(Conversation::summary).collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        list
    }

    pub fn get_conversation(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn delete_conversation(&mut self, conversation_id: &str) -> Result<SaveStatus, StoreError> {
        let pos = self
            .conversations
            .iter()
            .position(|c| c.id == conversation_id)
            .ok_or_else(|| StoreError::UnknownConversation(conversation_id.to_string()))?;
        self.conversations.remove(pos);
        Ok(self.persist_logged())
    }

    /// Erase every conversation, in memory and in the backend.
    pub fn clear_all(&mut self) -> SaveStatus {
        self.conversations.clear();
        let status = match self.backend.remove(CONVERSATIONS_KEY) {
            Ok(()) => SaveStatus::Saved,
            Err(e) => {
                tracing::warn!(error = %e, "failed to clear stored conversations");
                SaveStatus::Failed(e.to_string())
            }
        };
        self.last_save = status.clone();
        status
    }

    /// The most recent `max` messages of a conversation, oldest first.
    pub fn context_messages(&self, conversation_id: &str, max: usize) -> Vec<ChatMessage> {
        match self.get_conversation(conversation_id) {
            Some(conv) => {
                let start = conv.messages.len().saturating_sub(max);
                conv.messages[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// The last `max` user and assistant turns. System notices are skipped
    /// before the window is taken.
    pub fn dialogue_messages(&self, conversation_id: &str, max: usize) -> Vec<ChatMessage> {
        let Some(conv) = self.get_conversation(conversation_id) else {
            return Vec::new();
        };
        let mut tail: Vec<ChatMessage> = conv
            .messages
            .iter()
            .rev()
            .filter(|m| m.role != Role::System)
            .take(max)
            .cloned()
            .collect();
        tail.reverse();
        tail
    }

    /// Case-insensitive keyword search over message contents.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let lowered = query.trim().to_lowercase();
        if lowered.is_empty() {
            return Vec::new();
        }
        let needle = lowered.as_str();
        self.conversations
            .iter()
            .flat_map(|conv| {
                conv.messages
                    .iter()
                    .enumerate()
                    .filter(move |(_, m)| m.content.to_lowercase().contains(needle))
                    .map(move |(i, m)| SearchHit {
                        conversation_id: conv.id.clone(),
                        conversation_title: conv.title.clone(),
                        message_index: i,
                        snippet: extract_snippet(&m.content, needle),
                    })
            })
            .take(MAX_SEARCH_RESULTS)
            .collect()
    }

    pub fn export_conversation(
        &self,
        conversation_id: &str,
        format: ExportFormat,
    ) -> Result<String, StoreError> {
        let conv = self
            .get_conversation(conversation_id)
            .ok_or_else(|| StoreError::UnknownConversation(conversation_id.to_string()))?;
        Ok(match format {
            ExportFormat::Json => serde_json::to_string_pretty(conv)?,
            ExportFormat::Markdown => export_markdown(conv),
            ExportFormat::Text => export_text(conv),
        })
    }

    /// Every conversation as one JSON document that `import_conversations` accepts.
    pub fn export_all(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&json!({
            "schema_version": self.loader.current_version(),
            "data": { "conversations": self.conversations },
        }))?)
    }

    /// Merge conversations from an export. Ids already present are skipped.
    ///
    /// Accepts `export_all` output, a single exported conversation, or a
    /// legacy flat message array. Returns how many conversations were added.
    pub fn import_conversations(&mut self, raw: &str) -> Result<usize, StoreError> {
        let value: Value = serde_json::from_str(raw)?;
        let incoming = match serde_json::from_value::<Conversation>(value.clone()) {
            Ok(single) => vec![single],
            Err(_) => {
                let loaded = self.loader.upgrade(value)?;
                serde_json::from_value::<StoredConversations>(loaded.data)?.conversations
            }
        };

        let mut added = 0;
        for conv in incoming {
            if self.get_conversation(&conv.id).is_none() {
                self.conversations.push(conv);
                added += 1;
            }
        }
        if added > 0 {
            let _ = self.persist_logged();
        }
        Ok(added)
    }

    /// Status of the most recent write-through.
    pub fn last_save(&self) -> &SaveStatus {
        &self.last_save
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    fn persist(&self) -> Result<(), String> {
        let doc = StoredConversations {
            conversations: self.conversations.clone(),
        };
        let raw = self.loader.wrap(&doc).map_err(|e| e.to_string())?;
        self.backend
            .set(CONVERSATIONS_KEY, &raw)
            .map_err(|e| e.to_string())
    }

    fn persist_logged(&mut self) -> SaveStatus {
        let status = match self.persist() {
            Ok(()) => SaveStatus::Saved,
            Err(reason) => {
                tracing::warn!(%reason, "failed to persist conversations");
                SaveStatus::Failed(reason)
            }
        };
        self.last_save = status.clone();
        status
    }
}

fn export_markdown(conv: &Conversation) -> String {
    let mut out = format!("# {}\n\n", conv.title);
    for m in &conv.messages {
        let who = match m.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        };
        out.push_str(&format!(
            "**{}** ({}):\n\n{}\n\n",
            who,
            m.timestamp.format("%Y-%m-%d %H:%M"),
            m.content
        ));
    }
    out
}

fn export_text(conv: &Conversation) -> String {
    let mut out = format!("{}\n", conv.title);
    for m in &conv.messages {
        out.push_str(&format!(
            "[{}] {}: {}\n",
            m.timestamp.format("%Y-%m-%d %H:%M"),
            m.role.as_str(),
            m.content
        ));
    }
    out
}

fn extract_snippet(content: &str, needle: &str) -> String {
    // Positions are counted in the original text; lowercasing can change
    // both byte and char lengths.
    let found = content
        .char_indices()
        .enumerate()
        .find_map(|(char_pos, (byte, _))| {
            match_len(&content[byte..], needle).map(|len| (char_pos, len))
        });
    let Some((char_pos, match_chars)) = found else {
        return content.chars().take(60).collect();
    };
    let total = content.chars().count();
    let start = char_pos.saturating_sub(30);
    let end = (char_pos + match_chars + 30).min(total).max(start);
    let mut snippet: String = content.chars().skip(start).take(end - start).collect();
    if start > 0 {
        snippet = format!("...{}", snippet);
    }
    if end < total {
        snippet.push_str("...");
    }
    snippet
}

/// Chars of `text` consumed when its lowercase form starts with `needle`.
fn match_len(text: &str, needle: &str) -> Option<usize> {
    let mut lowered = String::with_capacity(needle.len());
    let mut consumed = 0;
    for c in text.chars() {
        if lowered.len() >= needle.len() {
            break;
        }
        lowered.extend(c.to_lowercase());
        consumed += 1;
    }
    lowered.starts_with(needle).then_some(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    fn open_memory() -> (Arc<MemoryStore>, ConversationStore) {
        let backend = Arc::new(MemoryStore::new());
        let store = ConversationStore::open(backend.clone()).unwrap();
        (backend, store)
    }

    #[test]
    fn test_append_preserves_order() {
        let (_backend, mut store) = open_memory();
        let id = store.create_conversation("Expressions");
        let contents = ["one", "two", "three", "four", "five"];
        for (i, c) in contents.iter().enumerate() {
            let msg = if i % 2 == 0 {
                ChatMessage::user(*c)
            } else {
                ChatMessage::assistant(*c)
            };
            assert!(store.append_message(&id, msg).unwrap().is_saved());
        }

        let list = store.get_conversation_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].message_count, 5);
        let conv = store.get_conversation(&list[0].id).unwrap();
        let got: Vec<&str> = conv.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(got, contents);
    }

    #[test]
    fn test_reload_reproduces_messages() {
        let (backend, mut store) = open_memory();
        let id = store.create_conversation("");
        store
            .append_message(&id, ChatMessage::user("make it bounce"))
            .unwrap();
        store
            .append_message(&id, ChatMessage::assistant("```js\nwiggle(2,30)\n```"))
            .unwrap();
        let before = store.get_conversation(&id).unwrap().clone();

        let reopened = ConversationStore::open(backend).unwrap();
        assert_eq!(reopened.get_conversation(&id), Some(&before));
    }

    #[test]
    fn test_unknown_conversation_is_rejected() {
        let (_backend, mut store) = open_memory();
        let err = store
            .append_message("nope", ChatMessage::user("hi"))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownConversation(ref id) if id == "nope"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_first_user_message_sets_title() {
        let (_backend, mut store) = open_memory();
        let id = store.create_conversation("  ");
        store
            .append_message(
                &id,
                ChatMessage::user("How do I loop a keyframe animation forever in this comp?"),
            )
            .unwrap();
        let title = &store.get_conversation(&id).unwrap().title;
        assert_eq!(title, "How do I loop a keyframe animation forev...");
    }

    #[test]
    fn test_list_is_most_recent_first() {
        let (_backend, mut store) = open_memory();
        let first = store.create_conversation("first");
        let second = store.create_conversation("second");
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.append_message(&first, ChatMessage::user("bump")).unwrap();
        let ids: Vec<String> = store
            .get_conversation_list()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn test_clear_all_erases_backend() {
        let (backend, mut store) = open_memory();
        let id = store.create_conversation("x");
        store.append_message(&id, ChatMessage::user("hi")).unwrap();
        assert!(store.clear_all().is_saved());
        assert!(store.get_conversation_list().is_empty());
        assert_eq!(backend.get(CONVERSATIONS_KEY).unwrap(), None);
        assert!(ConversationStore::open(backend).unwrap().is_empty());
    }

    #[test]
    fn test_quota_failure_is_reported_not_fatal() {
        let backend = Arc::new(MemoryStore::with_quota(400));
        let mut store = ConversationStore::open(backend).unwrap();
        let id = store.create_conversation("small");
        assert!(store.last_save().is_saved());

        let status = store
            .append_message(&id, ChatMessage::user("x".repeat(500)))
            .unwrap();
        assert!(matches!(status, SaveStatus::Failed(ref r) if r.contains("quota")));
        // In-memory state still has the message.
        assert_eq!(store.get_conversation(&id).unwrap().messages.len(), 1);
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let (_backend, store) = open_memory();
        let mut store = store.with_history_limit(Some(3));
        let id = store.create_conversation("bounded");
        for i in 0..5 {
            store
                .append_message(&id, ChatMessage::user(format!("m{}", i)))
                .unwrap();
        }
        let got: Vec<String> = store
            .get_conversation(&id)
            .unwrap()
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect();
        assert_eq!(got, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_legacy_history_is_migrated_once() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set(
                LEGACY_HISTORY_KEY,
                r#"[{"role":"user","content":"hi","timestamp":1700000000000},
                    {"role":"ai","content":"hello"}]"#,
            )
            .unwrap();

        let store = ConversationStore::open(backend.clone()).unwrap();
        let list = store.get_conversation_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, IMPORTED_TITLE);
        let conv = store.get_conversation(&list[0].id).unwrap();
        assert_eq!(conv.messages[1].role, Role::Assistant);
        assert_eq!(conv.messages[0].timestamp.timestamp(), 1_700_000_000);

        assert_eq!(backend.get(LEGACY_HISTORY_KEY).unwrap(), None);
        let raw = backend.get(CONVERSATIONS_KEY).unwrap().unwrap();
        assert!(raw.starts_with(r#"{"schema_version":2"#));
    }

    #[test]
    fn test_v1_document_gains_updated_at() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set(
                CONVERSATIONS_KEY,
                r#"{"schema_version":1,"data":{"conversations":[{
                    "id":"c1","title":"old","created_at":"2024-01-01T00:00:00Z",
                    "messages":[{"role":"user","content":"a","timestamp":"2024-01-02T00:00:00Z"}]
                }]}}"#,
            )
            .unwrap();
        let store = ConversationStore::open(backend).unwrap();
        let conv = store.get_conversation("c1").unwrap();
        assert_eq!(conv.updated_at.to_rfc3339(), "2024-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_export_and_import() {
        let (_backend, mut store) = open_memory();
        let id = store.create_conversation("Export me");
        store.append_message(&id, ChatMessage::user("hi")).unwrap();
        store
            .append_message(&id, ChatMessage::assistant("**hello**"))
            .unwrap();

        let md = store.export_conversation(&id, ExportFormat::Markdown).unwrap();
        assert!(md.starts_with("# Export me\n"));
        assert!(md.contains("**Assistant**"));
        let text = store.export_conversation(&id, ExportFormat::Text).unwrap();
        assert!(text.contains("user: hi"));

        let all = store.export_all().unwrap();
        let (_b, mut other) = open_memory();
        assert_eq!(other.import_conversations(&all).unwrap(), 1);
        assert_eq!(other.import_conversations(&all).unwrap(), 0);
        assert_eq!(other.get_conversation(&id), store.get_conversation(&id));

        let single = store.export_conversation(&id, ExportFormat::Json).unwrap();
        let (_c, mut third) = open_memory();
        assert_eq!(third.import_conversations(&single).unwrap(), 1);
    }

    #[test]
    fn test_search_finds_snippets() {
        let (_backend, mut store) = open_memory();
        let id = store.create_conversation("s");
        store
            .append_message(&id, ChatMessage::user("apply a Wiggle to position"))
            .unwrap();
        store.append_message(&id, ChatMessage::assistant("done")).unwrap();
        let hits = store.search("wiggle");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message_index, 0);
        assert!(hits[0].snippet.contains("Wiggle"));
        assert!(store.search("   ").is_empty());
    }

    #[test]
    fn test_search_snippet_with_case_expanding_text() {
        let (_backend, mut store) = open_memory();
        let id = store.create_conversation("s");
        let content = format!("{}x", "İ".repeat(40));
        store.append_message(&id, ChatMessage::user(content)).unwrap();

        let hits = store.search("x");
        assert_eq!(hits.len(), 1);
        let snippet = &hits[0].snippet;
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with('x'));
        assert_eq!(snippet.chars().filter(|c| *c == 'İ').count(), 30);

        store
            .append_message(&id, ChatMessage::assistant("Straße und GRÜN"))
            .unwrap();
        let hits = store.search("grün");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].snippet.contains("GRÜN"));
    }

    #[test]
    fn test_dialogue_messages_skip_notices_before_window() {
        let (_backend, mut store) = open_memory();
        let id = store.create_conversation("d");
        store.append_message(&id, ChatMessage::user("a")).unwrap();
        store.append_message(&id, ChatMessage::assistant("b")).unwrap();
        store.append_message(&id, ChatMessage::user("c")).unwrap();
        store.append_message(&id, ChatMessage::system("failed")).unwrap();

        let tail: Vec<String> = store
            .dialogue_messages(&id, 2)
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(tail, vec!["b", "c"]);
        assert!(store.dialogue_messages("missing", 2).is_empty());
    }

    #[test]
    fn test_context_messages_takes_tail() {
        let (_backend, mut store) = open_memory();
        let id = store.create_conversation("c");
        for i in 0..4 {
            store
                .append_message(&id, ChatMessage::user(format!("m{}", i)))
                .unwrap();
        }
        let ctx = store.context_messages(&id, 2);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx[0].content, "m2");
        assert!(store.context_messages("missing", 2).is_empty());
    }
}

//! Opens the stores for one CLI invocation.

use anyhow::{Context, Result};
use panel_host::ChatService;
use providers::{Dispatcher, RequestQueue};
use services::{ConversationStore, FileStore, KeyValueStore, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;

pub struct PanelContext {
    pub data_dir: PathBuf,
    backend: Arc<dyn KeyValueStore>,
}

impl PanelContext {
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(FileStore::default_dir);
        tracing::debug!(dir = %data_dir.display(), "using data directory");
        let backend: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(data_dir.clone()));
        Self { data_dir, backend }
    }

    pub fn conversations(&self) -> Result<ConversationStore> {
        ConversationStore::open(self.backend.clone()).with_context(|| {
            format!("failed to load conversations from {}", self.data_dir.display())
        })
    }

    pub fn settings(&self) -> Result<SettingsStore> {
        SettingsStore::open(self.backend.clone())
            .with_context(|| format!("failed to load settings from {}", self.data_dir.display()))
    }

    /// Requests go through the paced queue, the same path the panel uses.
    /// Must be called inside the tokio runtime.
    pub fn chat_service(&self) -> Result<ChatService> {
        let queue = RequestQueue::spawn(Arc::new(Dispatcher::new()));
        Ok(ChatService::new(
            self.conversations()?,
            self.settings()?,
            Arc::new(queue),
        ))
    }
}

//! The send path: prompt in, stored and rendered reply out.

use crate::bridge::{self, BridgeError, ScriptBridge};
use parking_lot::{Mutex, MutexGuard, RwLock};
use providers::{Dispatch, DispatchError, ImageData, RequestOptions};
use render::CodeBlock;
use services::{ConversationStore, SaveStatus, SettingsStore, StoreError};
use shared::agent_api::{ChatMessage, MessageMetadata};
use shared::settings::Settings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("a request is already in flight")]
    Busy,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// A file the user attached to a prompt.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub image: ImageData,
}

#[derive(Debug, Clone)]
pub struct RenderedReply {
    /// The assistant message as stored.
    pub message: ChatMessage,
    pub html: String,
    pub code_blocks: Vec<CodeBlock>,
    pub save_status: SaveStatus,
}

/// Clears the in-flight flag when the send finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ChatService {
    store: Mutex<ConversationStore>,
    settings: RwLock<SettingsStore>,
    dispatcher: Arc<dyn Dispatch>,
    bridge: Option<Arc<dyn ScriptBridge>>,
    in_flight: AtomicBool,
}

impl ChatService {
    pub fn new(
        store: ConversationStore,
        settings: SettingsStore,
        dispatcher: Arc<dyn Dispatch>,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            settings: RwLock::new(settings),
            dispatcher,
            bridge: None,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn ScriptBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Direct access to the store for listing, export and the like.
    pub fn store(&self) -> MutexGuard<'_, ConversationStore> {
        self.store.lock()
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().get().clone()
    }

    pub fn update_settings(&self, f: impl FnOnce(&mut Settings)) -> SaveStatus {
        self.settings.write().update(f)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn send(
        &self,
        conversation_id: &str,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<RenderedReply, SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        let _guard = InFlight::acquire(&self.in_flight).ok_or(SendError::Busy)?;

        let settings = self.settings();
        let provider = settings.provider;
        let model = settings.effective_model().to_string();

        let history = {
            let mut store = self.store.lock();
            let history =
                store.dialogue_messages(conversation_id, settings.max_history_messages);
            let mut user = ChatMessage::user(text);
            if let Some(a) = &attachment {
                user = user.with_metadata(MessageMetadata {
                    attachments: vec![a.file_name.clone()],
                    ..Default::default()
                });
            }
            let _ = store.append_message(conversation_id, user)?;
            history
        };

        let options = RequestOptions::from_settings(&settings).with_history(history);
        let api_key = settings.api_key_for(provider);
        let key = api_key.as_ref().map(|k| k.expose()).unwrap_or("");
        let image = attachment.as_ref().map(|a| &a.image);

        let reply = match self
            .dispatcher
            .dispatch(provider.as_str(), text, key, &options, image)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                let kind = err.kind();
                tracing::warn!(%provider, ?kind, error = %err, "send failed");
                let notice = ChatMessage::system(kind.user_message());
                if let Err(e) = self.store.lock().append_message(conversation_id, notice) {
                    tracing::warn!(error = %e, "could not record failure notice");
                }
                return Err(SendError::Dispatch(err));
            }
        };

        let message = ChatMessage::assistant(reply.text).with_metadata(MessageMetadata {
            provider: Some(provider.as_str().to_string()),
            model: Some(model),
            usage: reply.usage,
            ..Default::default()
        });
        let save_status = self
            .store
            .lock()
            .append_message(conversation_id, message.clone())?;

        let rendered = render::render_message_with_blocks(&message.content);
        tracing::info!(
            %provider,
            chars = message.content.len(),
            code_blocks = rendered.code_blocks.len(),
            "reply stored"
        );
        Ok(RenderedReply {
            message,
            html: rendered.html,
            code_blocks: rendered.code_blocks,
            save_status,
        })
    }

    /// Send a code block from a stored message to the host application.
    pub async fn apply_code_block(
        &self,
        conversation_id: &str,
        message_index: usize,
        block_index: usize,
    ) -> Result<String, BridgeError> {
        let bridge = self.bridge.clone().ok_or(BridgeError::Unavailable)?;
        let content = self
            .store
            .lock()
            .get_conversation(conversation_id)
            .and_then(|c| c.messages.get(message_index))
            .map(|m| m.content.clone())
            .ok_or_else(|| BridgeError::MessageNotFound {
                conversation_id: conversation_id.to_string(),
                index: message_index,
            })?;
        bridge::apply_code_block(bridge.as_ref(), &content, block_index).await
    }
}

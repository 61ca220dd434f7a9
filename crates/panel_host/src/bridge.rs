//! Seam to the host application's script engine.
//!
//! Hosts expose a callback API, `evalScript(code, callback)`, where the
//! callback receives the result as a string. [`CallbackBridge`] turns that
//! into an awaitable call.

use async_trait::async_trait;
use tokio::sync::oneshot;

/// What the host passes back when the script threw.
pub const EVAL_SCRIPT_ERROR: &str = "EvalScript error.";

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("host script failed: {0}")]
    Script(String),

    #[error("host bridge dropped the result callback")]
    Disconnected,

    #[error("no host bridge is attached")]
    Unavailable,

    #[error("message {index} not found in conversation {conversation_id}")]
    MessageNotFound {
        conversation_id: String,
        index: usize,
    },

    #[error("no code block at index {index} ({available} in reply)")]
    NoSuchBlock { index: usize, available: usize },
}

#[async_trait]
pub trait ScriptBridge: Send + Sync {
    /// Evaluate `code` in the host and return its string result.
    async fn eval_script(&self, code: &str) -> Result<String, BridgeError>;
}

pub type EvalCallback = Box<dyn FnOnce(String) + Send>;

/// Adapts a callback-style `evalScript` function.
pub struct CallbackBridge<F> {
    eval: F,
}

impl<F> CallbackBridge<F>
where
    F: Fn(String, EvalCallback) + Send + Sync,
{
    pub fn new(eval: F) -> Self {
        Self { eval }
    }
}

#[async_trait]
impl<F> ScriptBridge for CallbackBridge<F>
where
    F: Fn(String, EvalCallback) + Send + Sync,
{
    async fn eval_script(&self, code: &str) -> Result<String, BridgeError> {
        let (tx, rx) = oneshot::channel();
        (self.eval)(
            code.to_string(),
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        let result = rx.await.map_err(|_| BridgeError::Disconnected)?;
        check_host_result(result)
    }
}

fn check_host_result(result: String) -> Result<String, BridgeError> {
    if result.trim() == EVAL_SCRIPT_ERROR || result.trim_start().starts_with("Error:") {
        tracing::warn!(%result, "host script failed");
        Err(BridgeError::Script(result))
    } else {
        Ok(result)
    }
}

/// Send the `index`-th fenced block of `reply` to the host.
pub async fn apply_code_block(
    bridge: &dyn ScriptBridge,
    reply: &str,
    index: usize,
) -> Result<String, BridgeError> {
    let blocks = render::extract_code_blocks(reply);
    let block = blocks.get(index).ok_or(BridgeError::NoSuchBlock {
        index,
        available: blocks.len(),
    })?;
    tracing::info!(
        index,
        language = block.language_or_default(),
        bytes = block.code.len(),
        "applying code block to host"
    );
    bridge.eval_script(&block.code).await
}

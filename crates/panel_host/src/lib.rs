//! Panel host - the chat panel's send path and host-application seam
//!
//! This crate wires the pieces together:
//! - [`ChatService`] validates input, guards against overlapping requests,
//!   stores both sides of the exchange and renders the reply
//! - [`bridge`] hands generated scripts to the host application

pub mod bridge;
pub mod chat_service;

pub use bridge::{apply_code_block, BridgeError, CallbackBridge, EvalCallback, ScriptBridge};
pub use chat_service::{Attachment, ChatService, RenderedReply, SendError};

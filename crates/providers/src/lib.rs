//! Provider clients for the hosted LLM APIs the chat panel talks to.
//!
//! [`Dispatcher`] is the entry point: give it a provider identifier, a
//! prompt, a key and options, and it performs exactly one request against
//! that vendor's REST API.

pub mod anthropic;
pub mod cohere;
pub mod dispatcher;
pub mod error;
pub mod gemini;
mod http;
pub mod huggingface;
pub mod ollama;
pub mod openai;
pub mod queue;
pub mod request;
pub mod validate;

pub use dispatcher::{Dispatch, Dispatcher};
pub use error::DispatchError;
pub use queue::RequestQueue;
pub use request::{ImageData, Reply, RequestOptions};
pub use validate::validate_key;

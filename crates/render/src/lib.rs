//! Assistant-reply renderer.
//!
//! Turns the light markdown that models produce into HTML for the chat
//! panel. Fenced code blocks are pulled out first and rendered as
//! interactive containers with copy/save/apply actions; everything else
//! is escaped once and then given a small set of inline rules.

pub mod code_block;
pub mod escape;
pub mod markdown;
pub mod youtube;

pub use code_block::{extract_code_blocks, CodeBlock};
pub use escape::{escape_html, unescape_html};
pub use markdown::{render_message, render_message_with_blocks, RenderedMessage};

// Public modules
pub mod chat;
pub mod client;
pub mod conversation;
pub mod error;
pub mod observability;
pub mod provider;
pub mod render;
pub mod stream;
pub mod types;

// Re-exports
pub use client::{ByteStream, HttpTransport, Transport};
pub use conversation::{ConversationChange, ConversationObserver, ConversationStore};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use provider::ProviderSelector;
pub use render::{Block, Inline, Rendered, format_terminal, render};
pub use stream::{SessionState, StreamConsumer, StreamReport};
pub use types::*;

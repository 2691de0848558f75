// Public modules
pub mod chat_request;
pub mod message;
pub mod provider;

// Re-exports
pub use chat_request::{ChatRequest, HealthStatus};
pub use message::{Message, Role};
pub use provider::{Provider, RequestParams};

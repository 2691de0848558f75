use serde::{Deserialize, Serialize};

use crate::types::{Message, RequestParams};

/// Body of `POST /api/v1/chat/message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// The full conversation, oldest first.
    pub messages: Vec<Message>,

    /// Model identifier resolved from the active provider.
    pub model: String,

    /// Backend routing name resolved from the active provider.
    pub provider: String,
}

impl ChatRequest {
    /// Create a new `ChatRequest` from a conversation snapshot and resolved parameters.
    pub fn new(messages: Vec<Message>, params: &RequestParams) -> Self {
        Self {
            messages,
            model: params.model_identifier.clone(),
            provider: params.provider.clone(),
        }
    }
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    /// Reported status, `"ok"` when healthy.
    pub status: String,

    /// Name of the answering service.
    #[serde(default)]
    pub service: Option<String>,
}

impl HealthStatus {
    /// Returns true if the backend reported itself healthy.
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

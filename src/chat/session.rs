//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which ties the conversation
//! store, the provider selector and the stream consumer together behind the
//! operations the REPL needs.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::chat::config::ChatConfig;
use crate::client::{HttpTransport, Transport};
use crate::conversation::{ConversationObserver, ConversationStore};
use crate::error::Result;
use crate::observability::{
    CHAT_EMPTY_SUBMISSIONS, CHAT_HEALTH_CHECKS, CHAT_PROVIDER_SWITCHES, CHAT_SUBMISSIONS,
};
use crate::provider::ProviderSelector;
use crate::stream::{StreamConsumer, StreamReport};
use crate::types::{HealthStatus, Message, Provider, Role};

/// A chat session that manages conversation state and backend interactions.
pub struct ChatSession {
    store: ConversationStore,
    selector: ProviderSelector,
    consumer: StreamConsumer,
    transport: Arc<dyn Transport>,
    request_count: u64,
    completed_count: u64,
    failed_count: u64,
    bytes_received: u64,
    chunks_received: u64,
    last_elapsed: Option<Duration>,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The number of messages in the conversation.
    pub message_count: usize,
    /// The number of user messages.
    pub user_messages: usize,
    /// The number of assistant messages, failure notices included.
    pub assistant_messages: usize,
    /// The active provider.
    pub provider: Provider,
    /// The model identifier sent for the active provider.
    pub model: String,
    /// Where requests go, e.g. `Localhost:8000`.
    pub endpoint: String,
    /// Total number of chat requests made.
    pub total_requests: u64,
    /// Requests whose reply streamed to the end.
    pub completed: u64,
    /// Requests that failed to connect or were cut short.
    pub failed: u64,
    /// Total reply bytes received.
    pub bytes_received: u64,
    /// Total reply chunks received.
    pub chunks_received: u64,
    /// Duration of the most recent request, if any.
    pub last_elapsed: Option<Duration>,
}

impl ChatSession {
    /// Creates a new chat session talking HTTP to the configured backend.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let selector = config.selector()?;
        let transport = HttpTransport::with_timeout(Some(config.connect_timeout))?;
        Ok(Self::with_transport(Arc::new(transport), selector))
    }

    /// Creates a new chat session over a custom transport.
    pub fn with_transport(transport: Arc<dyn Transport>, selector: ProviderSelector) -> Self {
        Self {
            store: ConversationStore::new(),
            selector,
            consumer: StreamConsumer::new(Arc::clone(&transport)),
            transport,
            request_count: 0,
            completed_count: 0,
            failed_count: 0,
            bytes_received: 0,
            chunks_received: 0,
            last_elapsed: None,
        }
    }

    /// Attaches a flag that stops the streaming reply when set.
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.consumer = self.consumer.with_interrupt(interrupt);
        self
    }

    /// Registers an observer for conversation changes.
    pub fn subscribe(&mut self, observer: Box<dyn ConversationObserver>) {
        self.store.subscribe(observer);
    }

    /// Sends a user message and streams the reply into the conversation.
    ///
    /// Blank input is ignored and yields `Ok(None)`. Backend failures are
    /// recorded in the conversation and described by the returned report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TurnInProgress`](crate::Error::TurnInProgress) if a
    /// reply is still streaming.
    pub async fn submit(&mut self, user_input: &str) -> Result<Option<StreamReport>> {
        match self.store.append_user(user_input) {
            Ok(_) => {}
            Err(err) if err.is_empty_submission() => {
                CHAT_EMPTY_SUBMISSIONS.click();
                return Ok(None);
            }
            Err(err) => return Err(err),
        }
        CHAT_SUBMISSIONS.click();

        let params = self.selector.resolve_request_params();
        let report = self.consumer.send(&mut self.store, &params).await?;
        self.record(&report);
        Ok(Some(report))
    }

    fn record(&mut self, report: &StreamReport) {
        self.request_count = self.request_count.saturating_add(1);
        if report.is_completed() {
            self.completed_count = self.completed_count.saturating_add(1);
        } else {
            self.failed_count = self.failed_count.saturating_add(1);
        }
        self.bytes_received = self.bytes_received.saturating_add(report.bytes);
        self.chunks_received = self.chunks_received.saturating_add(report.chunks);
        self.last_elapsed = Some(report.elapsed);
    }

    /// Switches provider by name; history is left untouched.
    pub fn set_provider(&mut self, name: &str) -> Result<Provider> {
        let provider = self.selector.set_provider(name)?;
        CHAT_PROVIDER_SWITCHES.click();
        tracing::info!(
            provider = %provider,
            model = provider.model_identifier(),
            "provider switched"
        );
        Ok(provider)
    }

    /// Returns the active provider.
    pub fn provider(&self) -> Provider {
        self.selector.active()
    }

    /// Returns the provider selector.
    pub fn selector(&self) -> &ProviderSelector {
        &self.selector
    }

    /// Returns the conversation so far.
    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.store.len()
    }

    /// Returns true while a reply is streaming.
    pub fn is_streaming(&self) -> bool {
        self.store.is_in_progress() || self.consumer.is_active()
    }

    /// Queries the backend health endpoint.
    pub async fn health(&self) -> Result<HealthStatus> {
        CHAT_HEALTH_CHECKS.click();
        self.transport.health(self.selector.endpoint_base()).await
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        let provider = self.selector.active();
        SessionStats {
            message_count: self.store.len(),
            user_messages: self.store.count_role(Role::User),
            assistant_messages: self.store.count_role(Role::Assistant),
            provider,
            model: provider.model_identifier().to_string(),
            endpoint: self.selector.endpoint_label(),
            total_requests: self.request_count,
            completed: self.completed_count,
            failed: self.failed_count,
            bytes_received: self.bytes_received,
            chunks_received: self.chunks_received,
            last_elapsed: self.last_elapsed,
        }
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("store", &self.store)
            .field("selector", &self.selector)
            .field("consumer", &self.consumer)
            .field("request_count", &self.request_count)
            .finish()
    }
}

//! Conversation state.
//!
//! [`ConversationStore`] owns the ordered message history and the in-progress
//! flag for the assistant turn currently being streamed. It performs no I/O;
//! every successful mutation is pushed synchronously to the subscribed
//! [`ConversationObserver`]s so a renderer can redraw without polling.

use std::fmt;

use crate::error::{Error, Result};
use crate::types::{Message, Role};

/// A single mutation applied to a [`ConversationStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationChange<'a> {
    /// A user message was appended at `index`.
    UserAppended {
        /// Position of the new message.
        index: usize,
    },

    /// An empty assistant message was appended at `index` and marked in progress.
    AssistantStarted {
        /// Position of the new message.
        index: usize,
    },

    /// `delta` was appended to the in-progress assistant message at `index`.
    AssistantExtended {
        /// Position of the extended message.
        index: usize,
        /// The text that was appended.
        delta: &'a str,
    },

    /// The assistant message at `index` is no longer in progress.
    AssistantEnded {
        /// Position of the finished message.
        index: usize,
    },
}

impl ConversationChange<'_> {
    /// Position of the message this change touched.
    pub fn index(&self) -> usize {
        match self {
            ConversationChange::UserAppended { index }
            | ConversationChange::AssistantStarted { index }
            | ConversationChange::AssistantExtended { index, .. }
            | ConversationChange::AssistantEnded { index } => *index,
        }
    }
}

/// Receives every change made to a [`ConversationStore`].
pub trait ConversationObserver: Send {
    /// Called after `change` has been applied; `messages` is the full updated history.
    fn on_change(&mut self, change: &ConversationChange<'_>, messages: &[Message]);
}

/// Ordered, append-only conversation history.
///
/// At most one assistant message is in progress at a time. While one is, user
/// submissions and new assistant turns are rejected.
#[derive(Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
    in_progress: Option<usize>,
    observers: Vec<Box<dyn ConversationObserver>>,
}

impl ConversationStore {
    /// Creates an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer that is notified of every later mutation.
    pub fn subscribe(&mut self, observer: Box<dyn ConversationObserver>) {
        self.observers.push(observer);
    }

    /// Appends a user message.
    ///
    /// Fails with [`Error::EmptySubmission`] for blank text and with
    /// [`Error::TurnInProgress`] while an assistant turn is streaming. Neither
    /// failure mutates the conversation.
    pub fn append_user(&mut self, text: &str) -> Result<&[Message]> {
        if text.trim().is_empty() {
            return Err(Error::EmptySubmission);
        }
        if self.in_progress.is_some() {
            return Err(Error::TurnInProgress);
        }
        let index = self.messages.len();
        self.messages.push(Message::user(text));
        self.notify(ConversationChange::UserAppended { index });
        Ok(&self.messages)
    }

    /// Appends an empty assistant message and marks it in progress.
    pub fn begin_assistant_turn(&mut self) -> Result<usize> {
        if self.in_progress.is_some() {
            return Err(Error::TurnInProgress);
        }
        let index = self.messages.len();
        self.messages.push(Message::assistant(String::new()));
        self.in_progress = Some(index);
        self.notify(ConversationChange::AssistantStarted { index });
        Ok(index)
    }

    /// Appends `delta` to the in-progress assistant message.
    pub fn extend_assistant_turn(&mut self, delta: &str) -> Result<()> {
        let Some(index) = self.in_progress else {
            return Err(Error::NoTurnInProgress);
        };
        self.messages[index].content.push_str(delta);
        self.notify(ConversationChange::AssistantExtended { index, delta });
        Ok(())
    }

    /// Clears the in-progress flag.
    ///
    /// Returns false, without notifying, when no turn was in progress.
    pub fn end_assistant_turn(&mut self) -> bool {
        let Some(index) = self.in_progress.take() else {
            return false;
        };
        self.notify(ConversationChange::AssistantEnded { index });
        true
    }

    /// Returns true while an assistant turn is receiving stream chunks.
    pub fn is_in_progress(&self) -> bool {
        self.in_progress.is_some()
    }

    /// Returns the full history in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns an owned copy of the history, suitable for a request payload.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Returns the most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if nothing has been said yet.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Counts messages with the given role.
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    fn notify(&mut self, change: ConversationChange<'_>) {
        for observer in self.observers.iter_mut() {
            observer.on_change(&change, &self.messages);
        }
    }
}

impl fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationStore")
            .field("messages", &self.messages)
            .field("in_progress", &self.in_progress)
            .field("observers", &self.observers.len())
            .finish()
    }
}

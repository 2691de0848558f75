//! Chat application module for interactive conversations with the AION core.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! conversation store and stream consumer. It supports:
//!
//! - Streaming replies printed line by line as they arrive
//! - Switching between the local and cloud model providers
//! - Slash commands for session control
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Chat session wiring and statistics
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::TerminalRenderer;
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use session::{ChatSession, SessionStats};

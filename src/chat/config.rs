//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration used to build a [`ChatSession`](super::ChatSession).

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::error::Result;
use crate::provider::{ENDPOINT_ENV_VAR, ProviderSelector};
use crate::types::Provider;

/// Default connect timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Command-line arguments for the aion-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base address of the AION backend.
    #[arrrg(optional, "Backend base URL (default: $AION_API_URL or http://localhost:8000)", "URL")]
    pub api_url: Option<String>,

    /// Provider to start with.
    #[arrrg(optional, "Initial provider: local-model or cloud-model", "PROVIDER")]
    pub provider: Option<String>,

    /// Connect timeout in seconds.
    #[arrrg(optional, "Connect timeout in seconds (default: 30)", "SECONDS")]
    pub timeout: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Backend base address; `None` means the local default.
    pub api_url: Option<String>,

    /// Provider to start with; `None` picks one from the endpoint.
    pub provider: Option<String>,

    /// Connect timeout for backend requests.
    pub connect_timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Endpoint: local default
    /// - Provider: chosen from the endpoint
    /// - Connect timeout: 30 seconds
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            api_url: None,
            provider: None,
            connect_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            use_color: true,
        }
    }

    /// Sets the backend base address.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    /// Sets the initial provider by name.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Fills in the endpoint from `AION_API_URL` when none was given.
    pub fn with_env_fallback(mut self) -> Self {
        if self.api_url.is_none() {
            self.api_url = std::env::var(ENDPOINT_ENV_VAR).ok();
        }
        self
    }

    /// Builds the provider selector this configuration describes.
    ///
    /// Fails on a malformed endpoint or an unknown provider name.
    pub fn selector(&self) -> Result<ProviderSelector> {
        let mut selector = ProviderSelector::new(self.api_url.as_deref())?;
        if let Some(name) = self.provider.as_deref() {
            selector.set_provider(name)?;
        }
        Ok(selector)
    }

    /// Returns the provider a new session starts with.
    pub fn initial_provider(&self) -> Result<Provider> {
        Ok(self.selector()?.active())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        ChatConfig {
            api_url: args.api_url,
            provider: args.provider,
            connect_timeout: Duration::from_secs(args.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            use_color: !args.no_color,
        }
    }
}

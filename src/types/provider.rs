use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A named backend configuration.
///
/// The set is closed: the backend only knows how to route these two.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    /// Llama 3 served by a local Ollama instance behind the backend.
    LocalModel,

    /// GPT-4o served by OpenAI behind the backend.
    CloudModel,
}

impl Provider {
    /// Every selectable provider, in menu order.
    pub const ALL: [Provider; 2] = [Provider::LocalModel, Provider::CloudModel];

    /// The selection name accepted by [`Provider::from_str`].
    pub fn name(&self) -> &'static str {
        match self {
            Provider::LocalModel => "local-model",
            Provider::CloudModel => "cloud-model",
        }
    }

    /// The model identifier sent in the `model` field of a chat request.
    pub fn model_identifier(&self) -> &'static str {
        match self {
            Provider::LocalModel => "llama3",
            Provider::CloudModel => "gpt-4o",
        }
    }

    /// The value the backend expects in the `provider` field of a chat request.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Provider::LocalModel => "ollama",
            Provider::CloudModel => "openai",
        }
    }

    /// A short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Provider::LocalModel => "Llama 3 (local)",
            Provider::CloudModel => "GPT-4o (cloud)",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "local-model" => Ok(Provider::LocalModel),
            "cloud-model" => Ok(Provider::CloudModel),
            other => Err(Error::invalid_provider(other)),
        }
    }
}

/// Concrete request parameters derived from the active provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    /// Model identifier for the `model` field.
    pub model_identifier: String,

    /// Backend routing name for the `provider` field.
    pub provider: String,

    /// Base address of the backend, without the API path.
    pub endpoint_base: url::Url,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_providers() {
        assert_eq!("local-model".parse::<Provider>().unwrap(), Provider::LocalModel);
        assert_eq!(" cloud-model ".parse::<Provider>().unwrap(), Provider::CloudModel);
    }

    #[test]
    fn parse_rejects_backend_names() {
        let err = "ollama".parse::<Provider>().unwrap_err();
        assert!(err.is_invalid_provider());
        assert!("Cloud-Model".parse::<Provider>().is_err());
        assert!("".parse::<Provider>().is_err());
    }

    #[test]
    fn provider_mappings() {
        assert_eq!(Provider::LocalModel.model_identifier(), "llama3");
        assert_eq!(Provider::LocalModel.wire_name(), "ollama");
        assert_eq!(Provider::CloudModel.model_identifier(), "gpt-4o");
        assert_eq!(Provider::CloudModel.wire_name(), "openai");
    }

    #[test]
    fn display_round_trips_through_parse() {
        for provider in Provider::ALL {
            assert_eq!(provider.to_string().parse::<Provider>().unwrap(), provider);
        }
    }
}

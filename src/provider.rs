//! Provider selection.
//!
//! The selector holds the single active [`Provider`] and the backend base
//! address, and turns them into the [`RequestParams`] used for each request.

use url::Url;

use crate::error::{Error, Result};
use crate::types::{Provider, RequestParams};

/// Base address used when no endpoint is configured.
pub const DEFAULT_ENDPOINT_BASE: &str = "http://localhost:8000";

/// Environment variable that overrides [`DEFAULT_ENDPOINT_BASE`].
pub const ENDPOINT_ENV_VAR: &str = "AION_API_URL";

/// Holds the active provider and the endpoint base it resolves against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelector {
    active: Provider,
    endpoint_base: Url,
    configured: bool,
}

impl ProviderSelector {
    /// Creates a selector.
    ///
    /// With `endpoint_base` set the backend is considered remote and the cloud
    /// provider is selected; otherwise the local default address and the local
    /// provider are used.
    pub fn new(endpoint_base: Option<&str>) -> Result<Self> {
        match endpoint_base.map(str::trim).filter(|s| !s.is_empty()) {
            Some(base) => Ok(Self {
                active: Provider::CloudModel,
                endpoint_base: parse_endpoint_base(base)?,
                configured: true,
            }),
            None => Ok(Self {
                active: Provider::LocalModel,
                endpoint_base: parse_endpoint_base(DEFAULT_ENDPOINT_BASE)?,
                configured: false,
            }),
        }
    }

    /// Creates a selector from the `AION_API_URL` environment variable.
    pub fn from_env() -> Result<Self> {
        let configured = std::env::var(ENDPOINT_ENV_VAR).ok();
        Self::new(configured.as_deref())
    }

    /// Selects a provider by name.
    ///
    /// Only `local-model` and `cloud-model` are accepted; anything else fails
    /// with [`Error::InvalidProvider`] and keeps the current selection.
    pub fn set_provider(&mut self, name: &str) -> Result<Provider> {
        let provider = name.parse::<Provider>()?;
        self.active = provider;
        Ok(provider)
    }

    /// Selects a provider.
    pub fn set_active(&mut self, provider: Provider) {
        self.active = provider;
    }

    /// Returns the active provider.
    pub fn active(&self) -> Provider {
        self.active
    }

    /// Returns the backend base address.
    pub fn endpoint_base(&self) -> &Url {
        &self.endpoint_base
    }

    /// Returns true if the endpoint came from configuration rather than the default.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Describes where requests go, e.g. `Cloud: api.example.com` or `Localhost:8000`.
    pub fn endpoint_label(&self) -> String {
        let host = self.endpoint_base.host_str().unwrap_or("unknown");
        let host = match self.endpoint_base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        if self.configured {
            format!("Cloud: {host}")
        } else {
            let mut label = host;
            if let Some(first) = label.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            label
        }
    }

    /// Resolves the parameters for the next request from the current selection.
    pub fn resolve_request_params(&self) -> RequestParams {
        RequestParams {
            model_identifier: self.active.model_identifier().to_string(),
            provider: self.active.wire_name().to_string(),
            endpoint_base: self.endpoint_base.clone(),
        }
    }
}

/// Parses and validates a backend base address.
pub fn parse_endpoint_base(base: &str) -> Result<Url> {
    let url = Url::parse(base.trim())?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::url(
                format!("endpoint base must use http or https, got {other}"),
                None,
            ));
        }
    }
    if url.host_str().is_none() {
        return Err(Error::url(format!("endpoint base has no host: {base}"), None));
    }
    Ok(url)
}

/// Joins an API path onto a base address, keeping any path prefix of the base.
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Ok(Url::parse(&joined)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_model_and_local_address() {
        let selector = ProviderSelector::new(None).unwrap();
        assert_eq!(selector.active(), Provider::LocalModel);
        assert!(!selector.is_configured());
        assert_eq!(selector.endpoint_base().as_str(), "http://localhost:8000/");
        assert_eq!(selector.endpoint_label(), "Localhost:8000");
    }

    #[test]
    fn configured_endpoint_selects_cloud_model() {
        let selector = ProviderSelector::new(Some("https://aion.example.com")).unwrap();
        assert_eq!(selector.active(), Provider::CloudModel);
        assert!(selector.is_configured());
        assert_eq!(selector.endpoint_label(), "Cloud: aion.example.com");
    }

    #[test]
    fn blank_configuration_falls_back_to_default() {
        let selector = ProviderSelector::new(Some("   ")).unwrap();
        assert!(!selector.is_configured());
        assert_eq!(selector.active(), Provider::LocalModel);
    }

    #[test]
    fn rejects_non_http_endpoints() {
        assert!(matches!(
            ProviderSelector::new(Some("ftp://example.com")),
            Err(Error::Url { .. })
        ));
        assert!(matches!(
            ProviderSelector::new(Some("not a url")),
            Err(Error::Url { .. })
        ));
    }

    #[test]
    fn set_provider_accepts_closed_set() {
        let mut selector = ProviderSelector::new(None).unwrap();
        assert_eq!(selector.set_provider("cloud-model").unwrap(), Provider::CloudModel);
        assert_eq!(selector.active(), Provider::CloudModel);
        assert_eq!(selector.set_provider("local-model").unwrap(), Provider::LocalModel);
    }

    #[test]
    fn set_provider_rejects_unknown_and_keeps_selection() {
        let mut selector = ProviderSelector::new(None).unwrap();
        let err = selector.set_provider("mistral").unwrap_err();
        assert!(err.is_invalid_provider());
        assert_eq!(selector.active(), Provider::LocalModel);
    }

    #[test]
    fn resolve_is_deterministic() {
        let mut selector = ProviderSelector::new(Some("http://10.0.0.2:9000")).unwrap();
        let first = selector.resolve_request_params();
        assert_eq!(first, selector.resolve_request_params());
        assert_eq!(first.model_identifier, "gpt-4o");
        assert_eq!(first.provider, "openai");
        assert_eq!(first.endpoint_base.as_str(), "http://10.0.0.2:9000/");

        selector.set_active(Provider::LocalModel);
        let second = selector.resolve_request_params();
        assert_eq!(second.model_identifier, "llama3");
        assert_eq!(second.provider, "ollama");
        assert_eq!(second.endpoint_base, first.endpoint_base);
    }

    #[test]
    fn endpoint_url_keeps_prefix() {
        let base = Url::parse("https://example.com/aion/").unwrap();
        assert_eq!(
            endpoint_url(&base, "/api/v1/chat/message").unwrap().as_str(),
            "https://example.com/aion/api/v1/chat/message"
        );
        let base = Url::parse("http://localhost:8000").unwrap();
        assert_eq!(
            endpoint_url(&base, "health").unwrap().as_str(),
            "http://localhost:8000/health"
        );
    }
}

use std::fmt;

use thiserror::Error;

use crate::AuthProperties;

/// The `error`, `error_description` and `error_uri` triple an authorization
/// server sends back on a failed callback or token request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderErrorDetails {
    pub error: String,
    pub description: Option<String>,
    pub uri: Option<String>,
}

impl ProviderErrorDetails {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            description: None,
            uri: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|value| !value.is_empty());
        self
    }

    pub fn with_uri(mut self, uri: Option<String>) -> Self {
        self.uri = uri.filter(|value| !value.is_empty());
        self
    }
}

impl fmt::Display for ProviderErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error)?;
        if let Some(description) = &self.description {
            write!(f, ";Description={description}")?;
        }
        if let Some(uri) = &self.uri {
            write!(f, ";Uri={uri}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("the oauth state was missing or invalid")]
    StateInvalid,

    #[error("correlation failed")]
    CorrelationMismatch,

    #[error("access was denied by the resource owner or by the remote server ({0})")]
    AccessDenied(ProviderErrorDetails),

    #[error("{0}")]
    Provider(ProviderErrorDetails),

    #[error("code was not found")]
    MissingAuthorizationCode,

    #[error("token exchange failed: {message}")]
    TokenExchange { message: String },

    #[error("token endpoint returned http status {status}: {body}")]
    TokenExchangeHttp { status: u16, body: String },

    #[error("failed to retrieve {resource} resource (http status {status}): {body}")]
    ResourceFetchHttp {
        resource: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected response shape: {message}")]
    Decode { message: String, body: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("os rng error: {message}")]
    OsRng { message: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid header: {name}={value}")]
    InvalidHeader { name: String, value: String },

    #[error("authentication hook failed: {message}")]
    Hook { message: String },

    #[error("authentication was cancelled")]
    Cancelled,

    #[cfg(feature = "local-server")]
    #[error("local server timed out after {timeout:?}")]
    LocalServerTimeout { timeout: std::time::Duration },
}

impl AuthError {
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }

    /// Provider-supplied error fields, for callback errors only.
    pub fn provider_details(&self) -> Option<&ProviderErrorDetails> {
        match self {
            Self::AccessDenied(details) | Self::Provider(details) => Some(details),
            _ => None,
        }
    }
}

/// A failed authentication attempt, with whatever properties could be
/// recovered from the state parameter before it failed.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct AuthFailure {
    #[source]
    pub error: AuthError,
    pub properties: Option<AuthProperties>,
}

impl AuthFailure {
    pub fn new(error: AuthError, properties: Option<AuthProperties>) -> Self {
        Self { error, properties }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_message_appends_present_fields() {
        let details = ProviderErrorDetails::new("server_error")
            .with_description(Some("boom".to_string()))
            .with_uri(Some(String::new()));
        assert_eq!(details.to_string(), "server_error;Description=boom");

        let details = details.with_uri(Some("https://docs".to_string()));
        assert_eq!(
            AuthError::Provider(details).to_string(),
            "server_error;Description=boom;Uri=https://docs"
        );
    }

    #[test]
    fn access_denied_is_distinguishable() {
        let denied = AuthError::AccessDenied(ProviderErrorDetails::new("access_denied"));
        assert!(denied.is_access_denied());
        assert!(!AuthError::Provider(ProviderErrorDetails::new("x")).is_access_denied());
        assert_eq!(
            denied.provider_details().map(|d| d.error.as_str()),
            Some("access_denied")
        );
    }
}

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::{
    AuthError, AuthHook, CorrelationStore, HmacStateCodec, InMemoryCorrelationStore,
    OAuthHandler, ProviderDescriptor, StateCodec,
};

const DEFAULT_CORRELATION_TTL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_USER_AGENT: &str = concat!("github-connect/", env!("CARGO_PKG_VERSION"));

/// Validated, immutable handler settings.
#[derive(Clone)]
pub struct AuthOptions {
    client_id: String,
    client_secret: String,
    callback_path: String,
    scopes: Vec<String>,
    use_pkce: bool,
    save_tokens: bool,
    authorize_params: Vec<(String, String)>,
    default_redirect_uri: Option<String>,
    claims_issuer: String,
    correlation_ttl: Duration,
    user_agent: String,
}

impl std::fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOptions")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("callback_path", &self.callback_path)
            .field("scopes", &self.scopes)
            .field("use_pkce", &self.use_pkce)
            .field("save_tokens", &self.save_tokens)
            .field("authorize_params", &self.authorize_params)
            .field("default_redirect_uri", &self.default_redirect_uri)
            .field("claims_issuer", &self.claims_issuer)
            .field("correlation_ttl", &self.correlation_ttl)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl AuthOptions {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn use_pkce(&self) -> bool {
        self.use_pkce
    }

    pub fn save_tokens(&self) -> bool {
        self.save_tokens
    }

    pub fn authorize_params(&self) -> &[(String, String)] {
        &self.authorize_params
    }

    pub fn default_redirect_uri(&self) -> Option<&str> {
        self.default_redirect_uri.as_deref()
    }

    pub fn claims_issuer(&self) -> &str {
        &self.claims_issuer
    }

    pub fn correlation_ttl(&self) -> Duration {
        self.correlation_ttl
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

pub struct OAuthHandlerBuilder {
    descriptor: ProviderDescriptor,
    client_id: Option<String>,
    client_secret: Option<String>,
    callback_path: Option<String>,
    scopes: Vec<String>,
    use_pkce: Option<bool>,
    save_tokens: bool,
    authorize_params: Vec<(String, String)>,
    default_redirect_uri: Option<String>,
    claims_issuer: Option<String>,
    state_key: Option<Vec<u8>>,
    correlation_ttl: Duration,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    http: Option<Client>,
    state_codec: Option<Arc<dyn StateCodec>>,
    correlation_store: Option<Arc<dyn CorrelationStore>>,
    hooks: Vec<Arc<dyn AuthHook>>,
}

impl OAuthHandlerBuilder {
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self {
            scopes: descriptor.default_scopes().to_vec(),
            descriptor,
            client_id: None,
            client_secret: None,
            callback_path: None,
            use_pkce: None,
            save_tokens: false,
            authorize_params: Vec::new(),
            default_redirect_uri: None,
            claims_issuer: None,
            state_key: None,
            correlation_ttl: DEFAULT_CORRELATION_TTL,
            timeout: None,
            user_agent: None,
            http: None,
            state_codec: None,
            correlation_store: None,
            hooks: Vec::new(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_callback_path(mut self, callback_path: impl Into<String>) -> Self {
        self.callback_path = Some(callback_path.into());
        self
    }

    /// Adds a scope on top of the provider defaults. Duplicates are ignored.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    pub fn with_scopes<I, S>(self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        scopes.into_iter().fold(self, |builder, scope| builder.with_scope(scope))
    }

    pub fn clear_scopes(mut self) -> Self {
        self.scopes.clear();
        self
    }

    pub fn with_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = Some(use_pkce);
        self
    }

    pub fn with_save_tokens(mut self, save_tokens: bool) -> Self {
        self.save_tokens = save_tokens;
        self
    }

    /// A parameter sent on every authorization redirect unless the
    /// challenge properties carry their own value for it.
    pub fn with_authorize_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.authorize_params.push((key.into(), value.into()));
        self
    }

    pub fn with_access_type(self, access_type: impl Into<String>) -> Self {
        self.with_authorize_param(crate::properties::ACCESS_TYPE, access_type)
    }

    pub fn with_default_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.default_redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn with_claims_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.claims_issuer = Some(issuer.into());
        self
    }

    /// HMAC key for the built-in state codec.
    pub fn with_state_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.state_key = Some(key.into());
        self
    }

    pub fn with_correlation_ttl(mut self, ttl: Duration) -> Self {
        self.correlation_ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_state_codec(mut self, codec: Arc<dyn StateCodec>) -> Self {
        self.state_codec = Some(codec);
        self
    }

    pub fn with_correlation_store(mut self, store: Arc<dyn CorrelationStore>) -> Self {
        self.correlation_store = Some(store);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn AuthHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<OAuthHandler, AuthError> {
        self.descriptor.validate()?;

        let client_id = required(self.client_id, "client id")?;
        let client_secret = required(self.client_secret, "client secret")?;

        let callback_path = self
            .callback_path
            .unwrap_or_else(|| self.descriptor.callback_path().to_string());
        if !callback_path.starts_with('/') {
            return Err(AuthError::Config(format!(
                "callback path must start with '/': {callback_path}"
            )));
        }

        let state_codec: Arc<dyn StateCodec> = match (self.state_codec, self.state_key) {
            (Some(codec), _) => codec,
            (None, Some(key)) => Arc::new(HmacStateCodec::new(key)?),
            (None, None) => Arc::new(HmacStateCodec::ephemeral()?),
        };

        let correlation_store = self
            .correlation_store
            .unwrap_or_else(|| Arc::new(InMemoryCorrelationStore::new()));

        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };

        let options = AuthOptions {
            claims_issuer: self
                .claims_issuer
                .unwrap_or_else(|| self.descriptor.scheme().to_string()),
            use_pkce: self.use_pkce.unwrap_or(self.descriptor.use_pkce()),
            client_id,
            client_secret,
            callback_path,
            scopes: self.scopes,
            save_tokens: self.save_tokens,
            authorize_params: self.authorize_params,
            default_redirect_uri: self.default_redirect_uri,
            correlation_ttl: self.correlation_ttl,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        };

        Ok(OAuthHandler::from_parts(
            Arc::new(self.descriptor),
            options,
            http,
            state_codec,
            correlation_store,
            self.hooks,
        ))
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, AuthError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AuthError::Config(format!("{name} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::github;

    fn builder() -> OAuthHandlerBuilder {
        OAuthHandlerBuilder::new(github().unwrap())
            .with_client_id("client-id")
            .with_client_secret("client-secret")
    }

    #[test]
    fn missing_credentials_fail_at_build() {
        let result = OAuthHandlerBuilder::new(github().unwrap())
            .with_client_secret("secret")
            .build();
        assert!(matches!(result, Err(AuthError::Config(message)) if message.contains("client id")));

        let result = OAuthHandlerBuilder::new(github().unwrap())
            .with_client_id("id")
            .with_client_secret("  ")
            .build();
        assert!(matches!(result, Err(AuthError::Config(message)) if message.contains("client secret")));
    }

    #[test]
    fn short_state_key_fails_at_build() {
        let result = builder().with_state_key(b"too short".to_vec()).build();
        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[test]
    fn relative_callback_path_fails_at_build() {
        let result = builder().with_callback_path("signin").build();
        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[test]
    fn options_inherit_provider_defaults() {
        let handler = builder()
            .with_scope("user:email")
            .with_scope("user")
            .with_save_tokens(true)
            .build()
            .unwrap();
        let options = handler.options();

        assert_eq!(options.scopes(), ["user".to_string(), "user:email".to_string()]);
        assert_eq!(options.callback_path(), "/signin-github");
        assert_eq!(options.claims_issuer(), "GitHub");
        assert!(options.use_pkce());
        assert!(options.save_tokens());
    }
}

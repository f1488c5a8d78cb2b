use std::collections::HashSet;

use url::Url;

use crate::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRequestFormat {
    Json,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeSeparator {
    Space,
    Comma,
}

impl ScopeSeparator {
    pub fn join(self, scopes: &[String]) -> String {
        match self {
            Self::Space => scopes.join(" "),
            Self::Comma => scopes.join(","),
        }
    }
}

/// Maps one top-level field of the user-information JSON to a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimMapping {
    pub claim_type: String,
    pub json_key: String,
}

impl ClaimMapping {
    pub fn new(claim_type: impl Into<String>, json_key: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            json_key: json_key.into(),
        }
    }
}

/// Everything that differs between identity providers. Built once at
/// startup and shared read-only by every flow.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    scheme: String,
    display_name: String,
    authorization_endpoint: Url,
    token_endpoint: Url,
    user_information_endpoint: Url,
    user_emails_endpoint: Option<Url>,
    default_scopes: Vec<String>,
    scope_separator: ScopeSeparator,
    claim_mappings: Vec<ClaimMapping>,
    use_pkce: bool,
    callback_path: String,
    token_request_format: TokenRequestFormat,
    token_headers: Vec<(String, String)>,
}

impl ProviderDescriptor {
    pub fn new(
        scheme: impl Into<String>,
        authorization_endpoint: &str,
        token_endpoint: &str,
        user_information_endpoint: &str,
    ) -> Result<Self, AuthError> {
        let scheme = scheme.into();
        Ok(Self {
            display_name: scheme.clone(),
            callback_path: format!("/signin-{}", scheme.to_ascii_lowercase()),
            scheme,
            authorization_endpoint: Url::parse(authorization_endpoint)?,
            token_endpoint: Url::parse(token_endpoint)?,
            user_information_endpoint: Url::parse(user_information_endpoint)?,
            user_emails_endpoint: None,
            default_scopes: Vec::new(),
            scope_separator: ScopeSeparator::Space,
            claim_mappings: Vec::new(),
            use_pkce: true,
            token_request_format: TokenRequestFormat::Form,
            token_headers: Vec::new(),
        })
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_user_emails_endpoint(mut self, endpoint: &str) -> Result<Self, AuthError> {
        self.user_emails_endpoint = Some(Url::parse(endpoint)?);
        Ok(self)
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scopes.push(scope.into());
        self
    }

    pub fn with_scope_separator(mut self, separator: ScopeSeparator) -> Self {
        self.scope_separator = separator;
        self
    }

    pub fn with_claim(mut self, claim_type: impl Into<String>, json_key: impl Into<String>) -> Self {
        self.claim_mappings.push(ClaimMapping::new(claim_type, json_key));
        self
    }

    pub fn with_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = use_pkce;
        self
    }

    pub fn with_callback_path(mut self, callback_path: impl Into<String>) -> Self {
        self.callback_path = callback_path.into();
        self
    }

    pub fn with_token_request_format(mut self, format: TokenRequestFormat) -> Self {
        self.token_request_format = format;
        self
    }

    pub fn with_token_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.token_headers.push((name.into(), value.into()));
        self
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn authorization_endpoint(&self) -> &Url {
        &self.authorization_endpoint
    }

    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    pub fn user_information_endpoint(&self) -> &Url {
        &self.user_information_endpoint
    }

    pub fn user_emails_endpoint(&self) -> Option<&Url> {
        self.user_emails_endpoint.as_ref()
    }

    pub fn default_scopes(&self) -> &[String] {
        &self.default_scopes
    }

    pub fn scope_separator(&self) -> ScopeSeparator {
        self.scope_separator
    }

    pub fn claim_mappings(&self) -> &[ClaimMapping] {
        &self.claim_mappings
    }

    pub fn use_pkce(&self) -> bool {
        self.use_pkce
    }

    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }

    pub fn token_request_format(&self) -> TokenRequestFormat {
        self.token_request_format
    }

    pub fn token_headers(&self) -> &[(String, String)] {
        &self.token_headers
    }

    pub(crate) fn validate(&self) -> Result<(), AuthError> {
        if self.scheme.is_empty() {
            return Err(AuthError::Config("scheme must not be empty".to_string()));
        }
        let mut seen = HashSet::new();
        for mapping in &self.claim_mappings {
            if !seen.insert(mapping.claim_type.as_str()) {
                return Err(AuthError::Config(format!(
                    "claim type {} is mapped more than once",
                    mapping.claim_type
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor::new(
            "Example",
            "https://example.com/authorize",
            "https://example.com/token",
            "https://api.example.com/me",
        )
        .unwrap()
    }

    #[test]
    fn defaults_callback_path_from_scheme() {
        assert_eq!(descriptor().callback_path(), "/signin-example");
        assert!(descriptor().use_pkce());
    }

    #[test]
    fn joins_scopes_with_separator() {
        let scopes = vec!["user".to_string(), "repo".to_string()];
        assert_eq!(ScopeSeparator::Space.join(&scopes), "user repo");
        assert_eq!(ScopeSeparator::Comma.join(&scopes), "user,repo");
    }

    #[test]
    fn duplicate_claim_types_fail_validation() {
        let result = descriptor()
            .with_claim("email", "email")
            .with_claim("email", "primary_email")
            .validate();
        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[test]
    fn rejects_bad_endpoints() {
        let result = ProviderDescriptor::new("x", "not a url", "https://t", "https://u");
        assert!(matches!(result, Err(AuthError::Url(_))));
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub(crate) const CORRELATION_KEY: &str = "correlation_id";
pub(crate) const CODE_VERIFIER_KEY: &str = "code_verifier";

pub const ACCESS_TYPE: &str = "access_type";
pub const APPROVAL_PROMPT: &str = "approval_prompt";
pub const INCLUDE_GRANTED_SCOPES: &str = "include_granted_scopes";
pub const LOGIN_HINT: &str = "login_hint";
pub const PROMPT: &str = "prompt";

/// A named token captured from the token response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub name: String,
    pub value: String,
}

/// State carried from the challenge, through the provider, back to the
/// callback, and finally attached to the ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub items: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<AuthToken>,
}

impl AuthProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn with_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.insert(key.into(), value.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_access_type(self, access_type: impl Into<String>) -> Self {
        self.with_parameter(ACCESS_TYPE, access_type)
    }

    pub fn with_approval_prompt(self, approval_prompt: impl Into<String>) -> Self {
        self.with_parameter(APPROVAL_PROMPT, approval_prompt)
    }

    pub fn with_include_granted_scopes(self, include: bool) -> Self {
        self.with_parameter(INCLUDE_GRANTED_SCOPES, include.to_string())
    }

    pub fn with_login_hint(self, login_hint: impl Into<String>) -> Self {
        self.with_parameter(LOGIN_HINT, login_hint)
    }

    pub fn with_prompt(self, prompt: impl Into<String>) -> Self {
        self.with_parameter(PROMPT, prompt)
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref().filter(|uri| !uri.is_empty())
    }

    pub fn item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.item(CORRELATION_KEY)
    }

    pub fn code_verifier(&self) -> Option<&str> {
        self.item(CODE_VERIFIER_KEY)
    }

    pub(crate) fn set_item(&mut self, key: &str, value: String) {
        self.items.insert(key.to_string(), value);
    }

    pub fn get_token(&self, name: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|token| token.name == name)
            .map(|token| token.value.as_str())
    }

    /// Replaces the stored token set.
    pub fn store_tokens(&mut self, tokens: Vec<AuthToken>) {
        self.tokens = tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_parameters_use_wire_names() {
        let properties = AuthProperties::new()
            .with_access_type("offline")
            .with_include_granted_scopes(true)
            .with_login_hint("octocat")
            .with_prompt("consent");

        assert_eq!(properties.parameter("access_type"), Some("offline"));
        assert_eq!(properties.parameter("include_granted_scopes"), Some("true"));
        assert_eq!(properties.parameter("login_hint"), Some("octocat"));
        assert_eq!(properties.parameter("prompt"), Some("consent"));
        assert_eq!(properties.parameter("approval_prompt"), None);
    }

    #[test]
    fn empty_redirect_uri_reads_as_unset() {
        let properties = AuthProperties::new().with_redirect_uri("");
        assert_eq!(properties.redirect_uri(), None);
    }

    #[test]
    fn store_tokens_replaces_previous_set() {
        let mut properties = AuthProperties::new();
        properties.store_tokens(vec![AuthToken {
            name: "access_token".to_string(),
            value: "one".to_string(),
        }]);
        properties.store_tokens(vec![AuthToken {
            name: "refresh_token".to_string(),
            value: "two".to_string(),
        }]);
        assert_eq!(properties.get_token("access_token"), None);
        assert_eq!(properties.get_token("refresh_token"), Some("two"));
    }
}

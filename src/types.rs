use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::{AuthError, AuthFailure, AuthProperties, Ticket};

/// Where the inbound request was received, used to build the local
/// `redirect_uri`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
    pub path_base: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path_base: String::new(),
        }
    }

    pub fn with_path_base(mut self, path_base: impl Into<String>) -> Self {
        self.path_base = path_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn redirect_uri(&self, callback_path: &str) -> String {
        format!(
            "{}://{}{}{}",
            self.scheme, self.host, self.path_base, callback_path
        )
    }
}

/// Query parameters the provider sends back to the callback path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}

impl CallbackQuery {
    /// Parses a raw query string, with or without the leading `?`.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    pub fn from_url(callback_url: &str) -> Result<Self, AuthError> {
        let url = Url::parse(callback_url)?;
        Ok(Self::from_pairs(url.query_pairs()))
    }

    fn from_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match &*key {
                "code" => &mut query.code,
                "state" => &mut query.state,
                "error" => &mut query.error,
                "error_description" => &mut query.error_description,
                "error_uri" => &mut query.error_uri,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub expires_in: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(value)) => Some(value),
        Some(serde_json::Value::Number(value)) => Some(value.to_string()),
        _ => None,
    })
}

/// One entry of the secondary email-list resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserEmail {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone)]
pub struct Challenge {
    pub authorization_url: String,
    pub properties: AuthProperties,
}

#[derive(Debug, Clone)]
pub enum ChallengeOutcome {
    /// Send the user agent to `authorization_url`.
    Redirect(Challenge),
    /// A redirect hook produced the response itself.
    Handled,
}

#[derive(Debug)]
pub enum CallbackOutcome {
    Success(Box<Ticket>),
    /// A hook took over the response; nothing further for the host to do.
    Handled { properties: Option<AuthProperties> },
    Failure(AuthFailure),
}

impl CallbackOutcome {
    pub fn ticket(&self) -> Option<&Ticket> {
        match self {
            Self::Success(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&AuthFailure> {
        match self {
            Self::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Option<Ticket>, AuthFailure> {
        match self {
            Self::Success(ticket) => Ok(Some(*ticket)),
            Self::Handled { .. } => Ok(None),
            Self::Failure(failure) => Err(failure),
        }
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::{
    Client, RequestBuilder, Response,
    header::{ACCEPT, AUTHORIZATION, HeaderName, HeaderValue, USER_AGENT},
};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::{AuthError, ProviderDescriptor, TokenRequestFormat, TokenResponse, UserEmail};

/// Inputs of one authorization-code exchange.
#[derive(Debug, Clone)]
pub struct CodeExchange<'a> {
    pub code: &'a str,
    pub redirect_uri: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub code_verifier: Option<&'a str>,
}

/// Outbound calls to the provider: token exchange and bearer-authenticated
/// resource fetches. Nothing is cached or retried.
#[derive(Debug, Clone)]
pub struct Backchannel {
    http: Client,
    descriptor: Arc<ProviderDescriptor>,
    user_agent: String,
}

impl Backchannel {
    pub fn new(http: Client, descriptor: Arc<ProviderDescriptor>, user_agent: String) -> Self {
        Self {
            http,
            descriptor,
            user_agent,
        }
    }

    pub async fn exchange_code(&self, exchange: CodeExchange<'_>) -> Result<TokenResponse, AuthError> {
        let mut payload = HashMap::new();
        payload.insert("grant_type", "authorization_code");
        payload.insert("code", exchange.code);
        payload.insert("redirect_uri", exchange.redirect_uri);
        payload.insert("client_id", exchange.client_id);
        payload.insert("client_secret", exchange.client_secret);
        if let Some(code_verifier) = exchange.code_verifier {
            payload.insert("code_verifier", code_verifier);
        }

        let mut builder = self
            .http
            .post(self.descriptor.token_endpoint().clone())
            .header(USER_AGENT, self.user_agent.as_str());
        builder = apply_headers(builder, self.descriptor.token_headers())?;

        debug!(
            scheme = self.descriptor.scheme(),
            endpoint = %self.descriptor.token_endpoint(),
            pkce = exchange.code_verifier.is_some(),
            "exchanging authorization code"
        );

        let response = match self.descriptor.token_request_format() {
            TokenRequestFormat::Json => builder.json(&payload).send().await?,
            TokenRequestFormat::Form => builder.form(&payload).send().await?,
        };

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AuthError::TokenExchangeHttp {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|err| AuthError::Decode {
            message: format!("token response: {err}"),
            body,
        })
    }

    /// The primary user resource, which must be a JSON object.
    pub async fn fetch_user(&self, access_token: &str) -> Result<Map<String, Value>, AuthError> {
        let url = self.descriptor.user_information_endpoint();
        let body = self.get_resource("user", url, access_token).await?;
        match serde_json::from_str(&body) {
            Ok(Value::Object(user)) => Ok(user),
            Ok(other) => Err(AuthError::Decode {
                message: format!("user resource: expected a json object, got {}", kind(&other)),
                body,
            }),
            Err(err) => Err(AuthError::Decode {
                message: format!("user resource: {err}"),
                body,
            }),
        }
    }

    pub async fn fetch_emails(&self, url: &Url, access_token: &str) -> Result<Vec<UserEmail>, AuthError> {
        let body = self.get_resource("emails", url, access_token).await?;
        serde_json::from_str(&body).map_err(|err| AuthError::Decode {
            message: format!("emails resource: {err}"),
            body,
        })
    }

    async fn get_resource(
        &self,
        resource: &'static str,
        url: &Url,
        access_token: &str,
    ) -> Result<String, AuthError> {
        debug!(scheme = self.descriptor.scheme(), resource, %url, "fetching resource");

        let response = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await?;

        read_success(response, resource).await
    }
}

async fn read_success(response: Response, resource: &'static str) -> Result<String, AuthError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(AuthError::ResourceFetchHttp {
            resource,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn apply_headers(
    mut builder: RequestBuilder,
    headers: &[(String, String)],
) -> Result<RequestBuilder, AuthError> {
    for (name, value) in headers {
        let name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| AuthError::InvalidHeader {
                name: name.clone(),
                value: value.clone(),
            })?;
        let value = HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeader {
            name: name.to_string(),
            value: value.clone(),
        })?;
        builder = builder.header(name, value);
    }
    Ok(builder)
}

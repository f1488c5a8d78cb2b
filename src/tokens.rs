use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::types::non_empty;
use crate::{AuthProperties, AuthToken, TokenResponse};

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const TOKEN_TYPE: &str = "token_type";
pub const EXPIRES_AT: &str = "expires_at";

/// Copies the token response into `properties.tokens`. `expires_at` is
/// `now + expires_in` as RFC 3339 with full sub-second precision, and is
/// skipped when `expires_in` is not an integer.
pub fn persist_tokens(properties: &mut AuthProperties, tokens: &TokenResponse, now: DateTime<Utc>) {
    let mut stored = Vec::with_capacity(4);

    if let Some(access_token) = non_empty(&tokens.access_token) {
        stored.push(token(ACCESS_TOKEN, access_token));
    }
    if let Some(refresh_token) = non_empty(&tokens.refresh_token) {
        stored.push(token(REFRESH_TOKEN, refresh_token));
    }
    if let Some(token_type) = non_empty(&tokens.token_type) {
        stored.push(token(TOKEN_TYPE, token_type));
    }
    if let Some(expires_at) = expires_at(tokens, now) {
        stored.push(token(
            EXPIRES_AT,
            &expires_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ));
    }

    properties.store_tokens(stored);
}

fn expires_at(tokens: &TokenResponse, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let seconds: i64 = non_empty(&tokens.expires_in)?.trim().parse().ok()?;
    now.checked_add_signed(Duration::try_seconds(seconds)?)
}

fn token(name: &str, value: &str) -> AuthToken {
    AuthToken {
        name: name.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(expires_in: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: Some("gho_access".to_string()),
            refresh_token: Some("ghr_refresh".to_string()),
            token_type: Some("bearer".to_string()),
            expires_in: expires_in.map(str::to_string),
            ..TokenResponse::default()
        }
    }

    #[test]
    fn expires_at_is_now_plus_expires_in() {
        let now = Utc::now();
        let mut properties = AuthProperties::new();
        persist_tokens(&mut properties, &response(Some("3600")), now);

        assert_eq!(properties.get_token(ACCESS_TOKEN), Some("gho_access"));
        assert_eq!(properties.get_token(REFRESH_TOKEN), Some("ghr_refresh"));
        assert_eq!(properties.get_token(TOKEN_TYPE), Some("bearer"));

        let expires_at = properties.get_token(EXPIRES_AT).unwrap();
        let parsed = DateTime::parse_from_rfc3339(expires_at).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), now + Duration::seconds(3600));
    }

    #[test]
    fn non_integer_expiry_is_skipped() {
        let mut properties = AuthProperties::new();
        persist_tokens(&mut properties, &response(Some("soon")), Utc::now());
        assert_eq!(properties.get_token(EXPIRES_AT), None);
        assert_eq!(properties.tokens.len(), 3);
    }

    #[test]
    fn optional_tokens_are_omitted_when_absent() {
        let tokens = TokenResponse {
            access_token: Some("gho_access".to_string()),
            refresh_token: Some(String::new()),
            ..TokenResponse::default()
        };
        let mut properties = AuthProperties::new();
        persist_tokens(&mut properties, &tokens, Utc::now());

        let names: Vec<_> = properties.tokens.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, [ACCESS_TOKEN]);
    }
}

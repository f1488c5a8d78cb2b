use crate::claims::claim_types;
use crate::{AuthError, ProviderDescriptor, TokenRequestFormat};

pub const SCHEME: &str = "GitHub";
pub const DISPLAY_NAME: &str = "GitHub";
pub const CALLBACK_PATH: &str = "/signin-github";

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";
const USER_EMAILS_URL: &str = "https://api.github.com/user/emails";

const DEFAULT_SCOPE: &str = "user";

/// GitHub against its public endpoints.
pub fn github() -> Result<ProviderDescriptor, AuthError> {
    github_with_endpoints(AUTHORIZE_URL, TOKEN_URL, USER_URL, USER_EMAILS_URL)
}

/// GitHub claim mapping and defaults against arbitrary endpoints, e.g. a
/// GitHub Enterprise host or a mock server.
pub fn github_with_endpoints(
    authorize_url: &str,
    token_url: &str,
    user_url: &str,
    user_emails_url: &str,
) -> Result<ProviderDescriptor, AuthError> {
    Ok(
        ProviderDescriptor::new(SCHEME, authorize_url, token_url, user_url)?
            .with_user_emails_endpoint(user_emails_url)?
            .with_display_name(DISPLAY_NAME)
            .with_callback_path(CALLBACK_PATH)
            .with_scope(DEFAULT_SCOPE)
            .with_pkce(true)
            // GitHub answers form-encoded unless asked for JSON.
            .with_token_request_format(TokenRequestFormat::Form)
            .with_token_header("Accept", "application/json")
            .with_claim(claim_types::NAME_IDENTIFIER, "id")
            .with_claim(claim_types::NAME, "login")
            .with_claim(claim_types::AVATAR, "avatar_url")
            .with_claim(claim_types::PROFILE, "html_url")
            .with_claim(claim_types::PROFILE_API, "url")
            .with_claim(claim_types::DISPLAY_NAME, "name")
            .with_claim(claim_types::EMAIL, "email"),
    )
}

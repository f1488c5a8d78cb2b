use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::claims::claim_types;
use crate::handler::{TicketStep, cancellable};
use crate::hooks::{CreatingTicketContext, HookControl};
use crate::{
    AuthError, AuthProperties, ClaimMapping, ClaimsIdentity, OAuthHandler, TokenResponse,
    UserEmail,
};

impl OAuthHandler {
    /// Fetches the user, maps claims, folds in the verified primary email and
    /// runs the creating-ticket hooks. Calls are strictly sequential so that
    /// a mapped email always takes precedence over the email list.
    pub(crate) async fn create_ticket(
        &self,
        properties: &mut AuthProperties,
        tokens: &TokenResponse,
        access_token: &str,
        cancel: &CancellationToken,
    ) -> Result<TicketStep, AuthError> {
        let user = cancellable(cancel, self.backchannel.fetch_user(access_token)).await?;

        let mut identity =
            ClaimsIdentity::new(self.descriptor.scheme(), self.options.claims_issuer());
        map_claims(&mut identity, self.descriptor.claim_mappings(), &user);

        if let Some(url) = self.descriptor.user_emails_endpoint() {
            let emails =
                cancellable(cancel, self.backchannel.fetch_emails(url, access_token)).await?;
            append_primary_email(&mut identity, &emails);
        }

        let mut context = CreatingTicketContext {
            descriptor: &self.descriptor,
            identity: &mut identity,
            properties,
            user: &user,
            tokens,
            access_token,
        };
        for hook in &self.hooks {
            match hook.on_creating_ticket(&mut context).await {
                HookControl::Continue => {}
                HookControl::Handled => return Ok(TicketStep::Handled),
                HookControl::Fail(message) => return Err(AuthError::Hook { message }),
            }
        }

        Ok(TicketStep::Identity(identity))
    }
}

/// One claim per mapping whose field is present and not null.
pub(crate) fn map_claims(
    identity: &mut ClaimsIdentity,
    mappings: &[ClaimMapping],
    user: &Map<String, Value>,
) {
    for mapping in mappings {
        let value = match user.get(&mapping.json_key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(value)) => value.clone(),
            Some(other) => other.to_string(),
        };
        identity.add_claim(mapping.claim_type.as_str(), value);
    }
}

pub(crate) fn primary_email(emails: &[UserEmail]) -> Option<&str> {
    emails
        .iter()
        .find(|email| email.primary && email.verified)
        .and_then(|email| email.email.as_deref())
        .filter(|email| !email.is_empty())
}

fn append_primary_email(identity: &mut ClaimsIdentity, emails: &[UserEmail]) {
    if identity.has_claim(claim_types::EMAIL) {
        return;
    }
    match primary_email(emails) {
        Some(email) => identity.add_claim(claim_types::EMAIL, email),
        None => debug!(
            scheme = identity.authentication_type(),
            "no verified primary email"
        ),
    }
}

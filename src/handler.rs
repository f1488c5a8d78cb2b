//! The callback side of the flow: validate the round-tripped state, branch on
//! provider errors, exchange the code and hand over to ticket creation.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{Backchannel, CodeExchange};
use crate::hooks::{AccessDeniedContext, HookControl};
use crate::properties::{CODE_VERIFIER_KEY, CORRELATION_KEY};
use crate::tokens::persist_tokens;
use crate::types::non_empty;
use crate::{
    AuthError, AuthFailure, AuthHook, AuthOptions, AuthProperties, CallbackOutcome,
    CallbackQuery, ClaimsIdentity, CorrelationStore, OAuthHandlerBuilder, ProviderDescriptor,
    ProviderErrorDetails, RequestOrigin, StateCodec, Ticket,
};

const ACCESS_DENIED: &str = "access_denied";

/// Generic OAuth 2.0 authorization-code handler for one provider.
#[derive(Clone)]
pub struct OAuthHandler {
    pub(crate) descriptor: Arc<ProviderDescriptor>,
    pub(crate) options: AuthOptions,
    pub(crate) backchannel: Backchannel,
    pub(crate) state_codec: Arc<dyn StateCodec>,
    pub(crate) correlations: Arc<dyn CorrelationStore>,
    pub(crate) hooks: Vec<Arc<dyn AuthHook>>,
}

impl std::fmt::Debug for OAuthHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthHandler")
            .field("scheme", &self.descriptor.scheme())
            .field("client_id", &self.options.client_id())
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

/// Where ticket creation ended up.
pub(crate) enum TicketStep {
    Identity(ClaimsIdentity),
    Handled,
}

impl OAuthHandler {
    pub fn builder(descriptor: ProviderDescriptor) -> OAuthHandlerBuilder {
        OAuthHandlerBuilder::new(descriptor)
    }

    pub(crate) fn from_parts(
        descriptor: Arc<ProviderDescriptor>,
        options: AuthOptions,
        http: Client,
        state_codec: Arc<dyn StateCodec>,
        correlations: Arc<dyn CorrelationStore>,
        hooks: Vec<Arc<dyn AuthHook>>,
    ) -> Self {
        let backchannel = Backchannel::new(
            http,
            Arc::clone(&descriptor),
            options.user_agent().to_string(),
        );
        Self {
            descriptor,
            options,
            backchannel,
            state_codec,
            correlations,
            hooks,
        }
    }

    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    /// Whether a request path is this handler's callback path.
    pub fn is_callback_path(&self, path: &str) -> bool {
        path == self.options.callback_path()
    }

    /// Runs the callback state machine to completion. Every failure is
    /// reported as [`CallbackOutcome::Failure`], carrying the recovered
    /// properties once the state parameter has been validated.
    pub async fn handle_callback(
        &self,
        query: &CallbackQuery,
        origin: &RequestOrigin,
        cancel: &CancellationToken,
    ) -> CallbackOutcome {
        let scheme = self.descriptor.scheme();

        let Some(mut properties) = non_empty(&query.state)
            .and_then(|state| self.state_codec.unprotect(state))
        else {
            warn!(scheme, "oauth state was missing or invalid");
            return CallbackOutcome::Failure(AuthFailure::new(AuthError::StateInvalid, None));
        };

        match self.process_callback(query, origin, cancel, &mut properties).await {
            Ok(TicketStep::Identity(identity)) => {
                info!(scheme, claims = identity.claims().len(), "authentication succeeded");
                CallbackOutcome::Success(Box::new(Ticket {
                    identity,
                    properties,
                    scheme: scheme.to_string(),
                }))
            }
            Ok(TicketStep::Handled) => {
                debug!(scheme, "callback handled by hook");
                CallbackOutcome::Handled {
                    properties: Some(properties),
                }
            }
            Err(error) => {
                warn!(scheme, %error, "authentication failed");
                CallbackOutcome::Failure(AuthFailure::new(error, Some(properties)))
            }
        }
    }

    async fn process_callback(
        &self,
        query: &CallbackQuery,
        origin: &RequestOrigin,
        cancel: &CancellationToken,
        properties: &mut AuthProperties,
    ) -> Result<TicketStep, AuthError> {
        let correlation_id = properties.items.remove(CORRELATION_KEY);
        let correlated = match correlation_id {
            Some(id) => self.correlations.consume(&id).await,
            None => false,
        };
        if !correlated {
            return Err(AuthError::CorrelationMismatch);
        }

        if let Some(error) = non_empty(&query.error) {
            let details = ProviderErrorDetails::new(error)
                .with_description(query.error_description.clone())
                .with_uri(query.error_uri.clone());

            if error == ACCESS_DENIED {
                return match self.run_access_denied_hooks(&details, properties).await {
                    HookControl::Continue => Err(AuthError::AccessDenied(details)),
                    HookControl::Handled => Ok(TicketStep::Handled),
                    HookControl::Fail(message) => Err(AuthError::Hook { message }),
                };
            }
            return Err(AuthError::Provider(details));
        }

        let code = non_empty(&query.code).ok_or(AuthError::MissingAuthorizationCode)?;

        let code_verifier = properties.items.remove(CODE_VERIFIER_KEY);
        let redirect_uri = origin.redirect_uri(self.options.callback_path());
        let exchange = CodeExchange {
            code,
            redirect_uri: &redirect_uri,
            client_id: self.options.client_id(),
            client_secret: self.options.client_secret(),
            code_verifier: code_verifier.as_deref(),
        };
        let tokens = cancellable(cancel, self.backchannel.exchange_code(exchange)).await?;

        if let Some(error) = non_empty(&tokens.error) {
            let details = ProviderErrorDetails::new(error)
                .with_description(tokens.error_description.clone())
                .with_uri(tokens.error_uri.clone());
            return Err(AuthError::TokenExchange {
                message: details.to_string(),
            });
        }

        let access_token = non_empty(&tokens.access_token).ok_or_else(|| AuthError::TokenExchange {
            message: "failed to retrieve access token".to_string(),
        })?;

        let step = self
            .create_ticket(properties, &tokens, access_token, cancel)
            .await?;

        if matches!(step, TicketStep::Identity(_)) && self.options.save_tokens() {
            persist_tokens(properties, &tokens, Utc::now());
        }
        Ok(step)
    }

    async fn run_access_denied_hooks(
        &self,
        details: &ProviderErrorDetails,
        properties: &mut AuthProperties,
    ) -> HookControl {
        let mut context = AccessDeniedContext {
            descriptor: &self.descriptor,
            details,
            properties,
        };
        for hook in &self.hooks {
            match hook.on_access_denied(&mut context).await {
                HookControl::Continue => {}
                control => return control,
            }
        }
        HookControl::Continue
    }
}

/// Races an outbound call against the inbound request's cancellation.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AuthError::Cancelled),
        result = call => result,
    }
}

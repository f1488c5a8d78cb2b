use chrono::Utc;
use tracing::debug;

use crate::hooks::{HookControl, RedirectContext};
use crate::pkce::{CHALLENGE_METHOD, random_token};
use crate::properties::{CODE_VERIFIER_KEY, CORRELATION_KEY};
use crate::{
    AuthError, AuthProperties, Challenge, ChallengeOutcome, OAuthHandler, PkcePair, RequestOrigin,
};

const CORRELATION_BYTES: usize = 32;

/// Parameters owned by the handler; custom parameters never set these.
const RESERVED_PARAMS: [&str; 7] = [
    "client_id",
    "redirect_uri",
    "response_type",
    "scope",
    "state",
    "code_challenge",
    "code_challenge_method",
];

impl OAuthHandler {
    /// Starts a sign-in: mints the correlation id and PKCE pair, protects the
    /// properties into `state` and builds the authorization endpoint URL.
    pub async fn challenge(
        &self,
        mut properties: AuthProperties,
        origin: &RequestOrigin,
    ) -> Result<ChallengeOutcome, AuthError> {
        if properties.redirect_uri().is_none() {
            let fallback = self
                .options
                .default_redirect_uri()
                .unwrap_or(self.options.callback_path());
            properties.redirect_uri = Some(fallback.to_string());
        }

        let correlation_id = random_token(CORRELATION_BYTES)?;
        let ttl = chrono::Duration::from_std(self.options.correlation_ttl())
            .map_err(|err| AuthError::Config(format!("correlation ttl: {err}")))?;
        properties.set_item(CORRELATION_KEY, correlation_id.clone());

        let redirect_uri = origin.redirect_uri(self.options.callback_path());

        let mut params = vec![
            ("client_id".to_string(), self.options.client_id().to_string()),
            ("redirect_uri".to_string(), redirect_uri),
            ("response_type".to_string(), "code".to_string()),
            (
                "scope".to_string(),
                self.descriptor.scope_separator().join(self.options.scopes()),
            ),
        ];

        if self.options.use_pkce() {
            let pkce = PkcePair::generate()?;
            params.push(("code_challenge".to_string(), pkce.code_challenge));
            params.push((
                "code_challenge_method".to_string(),
                CHALLENGE_METHOD.to_string(),
            ));
            properties.set_item(CODE_VERIFIER_KEY, pkce.code_verifier);
        }

        // Per-request values win over configured defaults.
        let custom = self
            .options
            .authorize_params()
            .iter()
            .map(|(key, value)| (key, value))
            .chain(properties.parameters.iter());
        for (key, value) in custom {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            set_param(&mut params, key, value.clone());
        }

        let mut authorization_url = self.descriptor.authorization_endpoint().clone();
        authorization_url.query_pairs_mut().extend_pairs(&params);

        let mut context = RedirectContext {
            descriptor: &self.descriptor,
            authorization_url,
            properties: &mut properties,
        };
        for hook in &self.hooks {
            match hook.on_redirect(&mut context).await {
                HookControl::Continue => {}
                HookControl::Handled => return Ok(ChallengeOutcome::Handled),
                HookControl::Fail(message) => return Err(AuthError::Hook { message }),
            }
        }
        let mut authorization_url = context.authorization_url;

        let state = self.state_codec.protect(&properties)?;
        authorization_url.query_pairs_mut().append_pair("state", &state);

        self.correlations
            .issue(&correlation_id, Utc::now() + ttl)
            .await;

        debug!(
            scheme = self.descriptor.scheme(),
            pkce = self.options.use_pkce(),
            "redirecting to authorization endpoint"
        );

        Ok(ChallengeOutcome::Redirect(Challenge {
            authorization_url: authorization_url.to_string(),
            properties,
        }))
    }
}

fn set_param(params: &mut Vec<(String, String)>, key: &str, value: String) {
    if let Some((_, existing)) = params.iter_mut().find(|(param, _)| param == key) {
        *existing = value;
    } else {
        params.push((key.to_string(), value));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use url::Url;

    use super::*;
    use crate::providers::github;
    use crate::{AuthHook, CorrelationStore, InMemoryCorrelationStore, OAuthHandlerBuilder};

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn builder() -> OAuthHandlerBuilder {
        OAuthHandler::builder(github().unwrap())
            .with_client_id("client-id")
            .with_client_secret("client-secret")
            .with_state_key(KEY.to_vec())
    }

    fn origin() -> RequestOrigin {
        RequestOrigin::new("https", "app.example.com")
    }

    async fn redirect(handler: &OAuthHandler, properties: AuthProperties) -> Challenge {
        match handler.challenge(properties, &origin()).await.unwrap() {
            ChallengeOutcome::Redirect(challenge) => challenge,
            ChallengeOutcome::Handled => panic!("expected a redirect"),
        }
    }

    fn pairs(challenge: &Challenge) -> Vec<(String, String)> {
        Url::parse(&challenge.authorization_url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect()
    }

    fn count(pairs: &[(String, String)], key: &str) -> usize {
        pairs.iter().filter(|(name, _)| name == key).count()
    }

    #[tokio::test]
    async fn authorization_url_includes_required_params_once() {
        let handler = builder().with_scope("user:email").build().unwrap();
        let challenge = redirect(&handler, AuthProperties::new()).await;
        let pairs = pairs(&challenge);

        for key in [
            "client_id",
            "redirect_uri",
            "response_type",
            "scope",
            "state",
            "code_challenge",
            "code_challenge_method",
        ] {
            assert_eq!(count(&pairs, key), 1, "{key} should appear exactly once");
        }

        let map: HashMap<_, _> = pairs.into_iter().collect();
        assert!(challenge.authorization_url.starts_with("https://github.com/login/oauth/authorize?"));
        assert_eq!(map["client_id"], "client-id");
        assert_eq!(map["redirect_uri"], "https://app.example.com/signin-github");
        assert_eq!(map["response_type"], "code");
        assert_eq!(map["scope"], "user user:email");
        assert_eq!(map["code_challenge_method"], "S256");

        let verifier = challenge.properties.code_verifier().unwrap();
        assert_eq!(
            map["code_challenge"],
            PkcePair::from_verifier(verifier).code_challenge
        );

        let recovered = handler.state_codec.unprotect(&map["state"]).unwrap();
        assert_eq!(recovered, challenge.properties);
        assert!(recovered.correlation_id().is_some());
    }

    #[tokio::test]
    async fn pkce_fields_absent_when_disabled() {
        let handler = builder()
            .with_pkce(false)
            .with_authorize_param("code_challenge_method", "plain")
            .build()
            .unwrap();
        let properties = AuthProperties::new()
            .with_parameter("code_challenge", "chosen-by-caller")
            .with_parameter("code_challenge_method", "plain")
            .with_parameter("state", "chosen-by-caller");
        let challenge = redirect(&handler, properties).await;
        let pairs = pairs(&challenge);

        assert_eq!(count(&pairs, "code_challenge"), 0);
        assert_eq!(count(&pairs, "code_challenge_method"), 0);
        assert_eq!(count(&pairs, "state"), 1);
        assert_eq!(challenge.properties.code_verifier(), None);
    }

    #[tokio::test]
    async fn custom_pkce_parameters_do_not_replace_generated_ones() {
        let handler = builder()
            .with_authorize_param("code_challenge_method", "plain")
            .build()
            .unwrap();
        let properties = AuthProperties::new().with_parameter("code_challenge", "chosen-by-caller");
        let pairs = pairs(&redirect(&handler, properties).await);
        let map: HashMap<_, _> = pairs.iter().cloned().collect();

        assert_eq!(count(&pairs, "code_challenge"), 1);
        assert_ne!(map["code_challenge"], "chosen-by-caller");
        assert_eq!(map["code_challenge_method"], "S256");
    }

    #[tokio::test]
    async fn redirect_uri_falls_back_to_callback_path() {
        let handler = builder().build().unwrap();
        let challenge = redirect(&handler, AuthProperties::new()).await;
        assert_eq!(challenge.properties.redirect_uri(), Some("/signin-github"));

        let challenge = redirect(&handler, AuthProperties::new().with_redirect_uri("/home")).await;
        assert_eq!(challenge.properties.redirect_uri(), Some("/home"));

        let handler = builder().with_default_redirect_uri("/dashboard").build().unwrap();
        let challenge = redirect(&handler, AuthProperties::new()).await;
        assert_eq!(challenge.properties.redirect_uri(), Some("/dashboard"));
    }

    #[tokio::test]
    async fn custom_parameters_overlay_configured_defaults() {
        let handler = builder()
            .with_access_type("offline")
            .with_authorize_param("allow_signup", "false")
            .build()
            .unwrap();
        let properties = AuthProperties::new()
            .with_access_type("online")
            .with_login_hint("octocat")
            .with_parameter("client_id", "spoofed");
        let pairs = pairs(&redirect(&handler, properties).await);
        let map: HashMap<_, _> = pairs.iter().cloned().collect();

        assert_eq!(count(&pairs, "access_type"), 1);
        assert_eq!(map["access_type"], "online");
        assert_eq!(map["allow_signup"], "false");
        assert_eq!(map["login_hint"], "octocat");
        assert_eq!(count(&pairs, "client_id"), 1);
        assert_eq!(map["client_id"], "client-id");
    }

    struct TagRedirect;

    #[async_trait]
    impl AuthHook for TagRedirect {
        async fn on_redirect(&self, context: &mut RedirectContext<'_>) -> HookControl {
            context
                .authorization_url
                .query_pairs_mut()
                .append_pair("allow_signup", "true");
            context.properties.items.insert("tagged".to_string(), "yes".to_string());
            HookControl::Continue
        }
    }

    struct TakeOver;

    #[async_trait]
    impl AuthHook for TakeOver {
        async fn on_redirect(&self, _context: &mut RedirectContext<'_>) -> HookControl {
            HookControl::Handled
        }
    }

    #[tokio::test]
    async fn redirect_hooks_edit_url_and_state() {
        let handler = builder().with_hook(Arc::new(TagRedirect)).build().unwrap();
        let challenge = redirect(&handler, AuthProperties::new()).await;
        let map: HashMap<_, _> = pairs(&challenge).into_iter().collect();

        assert_eq!(map["allow_signup"], "true");
        let recovered = handler.state_codec.unprotect(&map["state"]).unwrap();
        assert_eq!(recovered.item("tagged"), Some("yes"));
    }

    #[tokio::test]
    async fn redirect_hook_can_take_over() {
        let store = InMemoryCorrelationStore::new();
        let handler = builder()
            .with_correlation_store(Arc::new(store.clone()))
            .with_hook(Arc::new(TakeOver))
            .with_hook(Arc::new(TagRedirect))
            .build()
            .unwrap();
        let outcome = handler.challenge(AuthProperties::new(), &origin()).await.unwrap();
        assert!(matches!(outcome, ChallengeOutcome::Handled));
        assert_eq!(store.len().await, 0);
    }

    struct Refuse;

    #[async_trait]
    impl AuthHook for Refuse {
        async fn on_redirect(&self, _context: &mut RedirectContext<'_>) -> HookControl {
            HookControl::Fail("sign-ins are closed".to_string())
        }
    }

    #[tokio::test]
    async fn correlation_id_registered_only_for_issued_redirects() {
        let store = InMemoryCorrelationStore::new();
        let refusing = builder()
            .with_correlation_store(Arc::new(store.clone()))
            .with_hook(Arc::new(Refuse))
            .build()
            .unwrap();
        let result = refusing.challenge(AuthProperties::new(), &origin()).await;
        assert!(matches!(result, Err(AuthError::Hook { .. })));
        assert_eq!(store.len().await, 0);

        let handler = builder()
            .with_correlation_store(Arc::new(store.clone()))
            .build()
            .unwrap();
        let challenge = redirect(&handler, AuthProperties::new()).await;
        assert_eq!(store.len().await, 1);
        let correlation_id = challenge.properties.correlation_id().unwrap();
        assert!(store.consume(correlation_id).await);
    }
}

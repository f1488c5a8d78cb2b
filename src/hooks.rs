//! Extension points invoked at fixed steps of the flow.
//!
//! Hooks run in registration order. Returning anything but
//! [`HookControl::Continue`] stops the remaining hooks for that step.

use async_trait::async_trait;
use serde_json::{Map, Value};
use url::Url;

use crate::{
    AuthProperties, ClaimsIdentity, ProviderDescriptor, ProviderErrorDetails, TokenResponse,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookControl {
    Continue,
    /// The hook produced the host response itself; end the flow quietly.
    Handled,
    Fail(String),
}

/// Pre-redirect. `state` is appended to `authorization_url` after every hook
/// has run, so edits to `properties` are carried through the round trip.
pub struct RedirectContext<'a> {
    pub descriptor: &'a ProviderDescriptor,
    pub authorization_url: Url,
    pub properties: &'a mut AuthProperties,
}

pub struct AccessDeniedContext<'a> {
    pub descriptor: &'a ProviderDescriptor,
    pub details: &'a ProviderErrorDetails,
    pub properties: &'a mut AuthProperties,
}

/// Post-claim-mapping, before the ticket is sealed.
pub struct CreatingTicketContext<'a> {
    pub descriptor: &'a ProviderDescriptor,
    pub identity: &'a mut ClaimsIdentity,
    pub properties: &'a mut AuthProperties,
    pub user: &'a Map<String, Value>,
    pub tokens: &'a TokenResponse,
    pub access_token: &'a str,
}

#[async_trait]
pub trait AuthHook: Send + Sync {
    async fn on_redirect(&self, _context: &mut RedirectContext<'_>) -> HookControl {
        HookControl::Continue
    }

    async fn on_access_denied(&self, _context: &mut AccessDeniedContext<'_>) -> HookControl {
        HookControl::Continue
    }

    async fn on_creating_ticket(&self, _context: &mut CreatingTicketContext<'_>) -> HookControl {
        HookControl::Continue
    }
}

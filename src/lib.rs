//! OAuth 2.0 authorization-code + PKCE sign-in with GitHub (or any provider
//! described by a [`ProviderDescriptor`]).
//!
//! The crate covers the protocol only: [`OAuthHandler::challenge`] builds the
//! redirect to the provider and [`OAuthHandler::handle_callback`] turns the
//! provider's callback into a claims [`Ticket`]. Serving HTTP and storing
//! sessions is left to the host.

mod challenge;
mod claims;
mod client;
mod config;
mod correlation;
mod error;
mod handler;
pub mod hooks;
#[cfg(feature = "local-server")]
mod local_server;
mod pkce;
mod properties;
mod provider;
pub mod providers;
mod state;
mod ticket;
pub mod tokens;
mod types;

pub use claims::{Claim, ClaimsIdentity, Ticket, claim_types};
pub use client::{Backchannel, CodeExchange};
pub use config::{AuthOptions, OAuthHandlerBuilder};
pub use correlation::{CorrelationStore, InMemoryCorrelationStore};
pub use error::{AuthError, AuthFailure, ProviderErrorDetails};
pub use handler::OAuthHandler;
pub use hooks::{AuthHook, HookControl};
#[cfg(feature = "local-server")]
pub use local_server::{LocalServer, LocalServerConfig};
pub use pkce::PkcePair;
pub use properties::{AuthProperties, AuthToken};
pub use provider::{ClaimMapping, ProviderDescriptor, ScopeSeparator, TokenRequestFormat};
pub use state::{HmacStateCodec, StateCodec};
pub use types::{
    CallbackOutcome, CallbackQuery, Challenge, ChallengeOutcome, RequestOrigin, TokenResponse,
    UserEmail,
};

pub use tokio_util::sync::CancellationToken;

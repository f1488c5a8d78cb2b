use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Router, routing::get};
use tokio::net::TcpListener as TokioTcpListener;
use tokio::sync::oneshot;
use tracing::info;

use crate::{AuthError, CallbackQuery};

use super::config::{DEFAULT_ERROR_HTML, DEFAULT_SUCCESS_HTML, LocalServerConfig};
use super::http::{LocalServerState, callback_handler, fallback_handler, send_query, wait_for_query};
use super::target::RedirectTarget;

#[derive(Debug, Clone)]
pub struct LocalServer {
    target: RedirectTarget,
    success_html: String,
    error_html: String,
    timeout: Option<Duration>,
}

impl LocalServer {
    pub fn new(redirect_uri: impl Into<String>) -> Result<Self, AuthError> {
        let redirect_uri = redirect_uri.into();
        Ok(Self {
            target: RedirectTarget::parse(&redirect_uri)?,
            success_html: DEFAULT_SUCCESS_HTML.to_string(),
            error_html: DEFAULT_ERROR_HTML.to_string(),
            timeout: None,
        })
    }

    pub fn from_config(config: LocalServerConfig) -> Result<Self, AuthError> {
        let redirect_uri = config.redirect_uri();
        Ok(Self {
            target: RedirectTarget::parse(&redirect_uri)?,
            success_html: config.success_html,
            error_html: config.error_html,
            timeout: config.timeout,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn bind(&self) -> Result<TcpListener, AuthError> {
        TcpListener::bind((self.target.host.as_str(), self.target.port)).map_err(AuthError::from)
    }

    /// Serves until the first callback carrying `code` or `error` arrives,
    /// then shuts down and returns its query.
    pub async fn listen_with(&self, listener: TcpListener) -> Result<CallbackQuery, AuthError> {
        let (query_tx, query_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let query_tx = Arc::new(Mutex::new(Some(query_tx)));

        let state = LocalServerState {
            success_html: self.success_html.clone(),
            error_html: self.error_html.clone(),
            query_tx: query_tx.clone(),
        };

        let app = Router::new()
            .route(&self.target.path, get(callback_handler))
            .fallback(fallback_handler)
            .with_state(state);

        listener.set_nonblocking(true)?;
        let listener = TokioTcpListener::from_std(listener)?;
        info!(
            host = %self.target.host,
            port = self.target.port,
            path = %self.target.path,
            "waiting for oauth callback"
        );

        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        let server_handle = tokio::spawn(async move {
            if let Err(err) = server.await {
                send_query(&query_tx, Err(AuthError::Io(err)));
            }
        });

        let query = wait_for_query(query_rx, self.timeout).await;

        let _ = shutdown_tx.send(());
        let _ = server_handle.await;

        query
    }

    pub async fn listen_once(&self) -> Result<CallbackQuery, AuthError> {
        let listener = self.bind()?;
        self.listen_with(listener).await
    }
}

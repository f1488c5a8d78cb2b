use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use tokio::sync::oneshot;
use tracing::debug;

use crate::{AuthError, CallbackQuery};

type QueryResult = Result<CallbackQuery, AuthError>;
type QuerySender = oneshot::Sender<QueryResult>;
pub(super) type QueryReceiver = oneshot::Receiver<QueryResult>;
pub(super) type SharedQuerySender = Arc<Mutex<Option<QuerySender>>>;

#[derive(Clone)]
pub(super) struct LocalServerState {
    pub(super) success_html: String,
    pub(super) error_html: String,
    pub(super) query_tx: SharedQuerySender,
}

/// Delivers the first result only; later callbacks are ignored.
pub(super) fn send_query(query_tx: &SharedQuerySender, result: QueryResult) {
    if let Ok(mut guard) = query_tx.lock() {
        if let Some(sender) = guard.take() {
            let _ = sender.send(result);
        }
    }
}

pub(super) async fn callback_handler(
    State(state): State<LocalServerState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let query = CallbackQuery::parse(&query.unwrap_or_default());

    // Stray hits (favicon prefetches, reloads without parameters) keep the
    // server waiting for the real callback.
    if query.code.is_none() && query.error.is_none() {
        debug!("ignoring callback request without code or error");
        return (StatusCode::BAD_REQUEST, Html(state.error_html));
    }

    let html = if query.error.is_some() {
        state.error_html
    } else {
        state.success_html
    };
    send_query(&state.query_tx, Ok(query));
    (StatusCode::OK, Html(html))
}

pub(super) async fn fallback_handler(State(state): State<LocalServerState>) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(state.error_html))
}

pub(super) async fn wait_for_query(
    query_rx: QueryReceiver,
    timeout: Option<Duration>,
) -> Result<CallbackQuery, AuthError> {
    let received = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, query_rx)
            .await
            .map_err(|_| AuthError::LocalServerTimeout { timeout })?,
        None => query_rx.await,
    };
    received.map_err(|_| {
        AuthError::Io(std::io::Error::other(
            "local server closed before a callback arrived",
        ))
    })?
}

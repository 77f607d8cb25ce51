//! # HTTP Server
//!
//! The request handler boundary: an `axum` router that renders the status
//! page, hands submitted messages to the `Dispatcher`, proxies suggestion
//! requests and, when enabled, exposes Prometheus metrics.
//!
//! Requests are handled synchronously with respect to the dispatch: the
//! response is held open until every channel has reported.

use crate::config::ContactConfig;
use crate::core::Alert;
use crate::dispatch::Dispatcher;
use crate::internal_metrics;
use crate::page::render_status_page;
use crate::suggest::SuggestClient;
use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        ConnectInfo, Query, State,
    },
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, trace, warn};

/// Shared, read-only state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub suggester: Option<Arc<SuggestClient>>,
    pub contact: Arc<ContactConfig>,
}

/// The single recognised form parameter.
#[derive(Debug, Deserialize)]
pub struct PageForm {
    #[serde(default)]
    m: Option<String>,
}

/// Builds the application router.
pub fn router(state: AppState, prom_handle: Option<PrometheusHandle>) -> Router {
    let mut router = Router::new()
        .route("/", get(serve_root).post(serve_root))
        .route("/suggest", get(serve_suggest).post(serve_suggest))
        .with_state(state);

    if let Some(handle) = prom_handle {
        router = router.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }
    router
}

/// Runs the server until a shutdown signal is received.
pub async fn serve(listener: TcpListener, router: Router, mut shutdown_rx: watch::Receiver<bool>) {
    let shutdown = async move {
        let _ = shutdown_rx.changed().await;
        trace!("HTTP server received shutdown signal.");
    };
    let result = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await;

    if let Err(e) = result {
        error!("HTTP server error: {}", e);
    }
    trace!("HTTP server task finished.");
}

fn plain(status: StatusCode, body: String) -> Response {
    (status, body).into_response()
}

/// Reads `m` from a urlencoded body, falling back to the query string.
///
/// A POST whose body is not urlencoded is treated as carrying no body
/// parameters, so `POST /?m=...` works without a content type.
fn message_param(
    query: Result<Query<PageForm>, QueryRejection>,
    form: Result<Form<PageForm>, FormRejection>,
) -> Result<Option<String>, Response> {
    let Query(query) = query.map_err(|rejection| {
        plain(StatusCode::BAD_REQUEST, format!("invalid query: {}\n", rejection))
    })?;
    let body = match form {
        Ok(Form(form)) => form.m,
        Err(FormRejection::InvalidFormContentType(_)) => None,
        Err(rejection) => {
            return Err(plain(
                StatusCode::BAD_REQUEST,
                format!("invalid form: {}\n", rejection),
            ));
        }
    };
    Ok(body.or(query.m))
}

async fn serve_root(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    uri: Uri,
    query: Result<Query<PageForm>, QueryRejection>,
    form: Result<Form<PageForm>, FormRejection>,
) -> Response {
    let m = match message_param(query, form) {
        Ok(m) => m,
        Err(response) => return response,
    };

    info!(peer = %peer, path = %uri.path(), message = ?m, "page request");

    let message = match m {
        Some(m) if !m.is_empty() => m,
        _ => return Html(render_status_page(&state.contact)).into_response(),
    };

    let alert = Alert::new(message, Some(peer.to_string()));
    match state.dispatcher.dispatch(&alert).await {
        Ok(()) => plain(StatusCode::OK, "page sent\n".to_string()),
        Err(e) if e.is_invalid_input() => plain(StatusCode::BAD_REQUEST, format!("{}\n", e)),
        Err(e) => plain(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)),
    }
}

async fn serve_suggest(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    uri: Uri,
    query: Result<Query<PageForm>, QueryRejection>,
    form: Result<Form<PageForm>, FormRejection>,
) -> Response {
    let m = match message_param(query, form) {
        Ok(m) => m,
        Err(response) => return response,
    };

    info!(peer = %peer, path = %uri.path(), message = ?m, "suggest request");

    let draft = match m {
        Some(m) if !m.is_empty() => m,
        _ => return plain(StatusCode::BAD_REQUEST, "m param required\n".to_string()),
    };

    let Some(suggester) = &state.suggester else {
        return plain(
            StatusCode::SERVICE_UNAVAILABLE,
            "suggestions are not configured\n".to_string(),
        );
    };

    match suggester.suggest(&draft).await {
        Ok(suggestion) => {
            internal_metrics::record_suggestion("success");
            plain(StatusCode::OK, suggestion)
        }
        Err(e) => {
            internal_metrics::record_suggestion("failure");
            warn!(error = %e, "suggestion failed");
            plain(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

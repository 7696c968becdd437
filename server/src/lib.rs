//! HTTP host for the restgate core.
//!
//! # Design
//! Every request lands in one fallback handler. It buffers the body,
//! captures `TransportSignals`, and hands the rest to the core:
//! `normalize`, then `Dispatcher::dispatch`. The resulting envelope is
//! copied onto an axum `Response` unchanged. Routing lives in the core's
//! dispatcher, not in axum's router, so the same table answers in tests,
//! behind this server, or behind any other host.

pub mod config;
pub mod error;
pub mod logging;
pub mod signals;
pub mod widgets;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use restgate_core::{
    normalize, Controller, Cookie, Dispatcher, ExactPath, HttpError, PathPattern, Protocol,
    ResponseEnvelope, JSON_API_CONTENT_TYPE,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use config::Config;
pub use error::ServerError;

use crate::signals::CaptureOptions;
use crate::widgets::WidgetController;

/// Name of the cookie handed to clients that arrive without one.
pub const SESSION_COOKIE: &str = "session";

#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    capture: CaptureOptions,
    body_limit: usize,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, config: &Config) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            capture: CaptureOptions {
                local_port: None,
                trust_forwarded_headers: config.trust_forwarded_headers,
            },
            body_limit: config.body_limit,
        }
    }

    pub fn with_local_port(mut self, port: u16) -> Self {
        self.capture.local_port = Some(port);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn process(&self, parts: &Parts, body: &[u8]) -> ResponseEnvelope {
        let request = signals::capture(parts, body, self.capture)
            .and_then(|signals| normalize(&signals));
        match request {
            Ok(request) => {
                let envelope = self.dispatcher.dispatch(&request);
                with_session(&request, envelope)
            }
            Err(err) => ResponseEnvelope::from_error(&err),
        }
    }
}

/// The demo route table: one widget store behind the collection and item
/// routes.
pub fn dispatcher(base_url: impl Into<String>) -> Dispatcher {
    let widgets: Arc<dyn Controller> = Arc::new(WidgetController::new());
    Dispatcher::builder(base_url)
        .route_shared(PathPattern::new("/widgets/:id"), Arc::clone(&widgets))
        .route_shared(ExactPath::new("/widgets"), widgets)
        .build()
}

/// Router with the demo routes and `config`; used by tests that drive the
/// service without a listener.
pub fn app(config: &Config) -> Result<Router, ServerError> {
    let base_url = config.base_url_for(config.socket_addr())?;
    Ok(router(AppState::new(dispatcher(base_url), config)))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(handle)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(listener: TcpListener, config: &Config) -> Result<(), ServerError> {
    let local = listener.local_addr()?;
    let base_url = config.base_url_for(local)?;
    tracing::info!(%local, %base_url, "listening");

    let state = AppState::new(dispatcher(base_url), config).with_local_port(local.port());
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn handle(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let envelope = match to_bytes(body, state.body_limit).await {
        Ok(bytes) => state.process(&parts, &bytes),
        Err(e) => {
            tracing::warn!(error = %e, limit = state.body_limit, "could not read request body");
            ResponseEnvelope::from_error(&HttpError::payload_too_large(format!(
                "request body exceeds {} bytes",
                state.body_limit
            )))
        }
    };
    into_response(envelope)
}

/// Hand out a session cookie to clients that did not send one.
fn with_session(request: &restgate_core::Request, envelope: ResponseEnvelope) -> ResponseEnvelope {
    if request.cookie(SESSION_COOKIE).is_some() {
        return envelope;
    }
    let cookie = Cookie::named(SESSION_COOKIE, Uuid::new_v4().to_string())
        .with_path("/")
        .with_http_only(true)
        .with_secure(request.protocol() == Protocol::Https);
    envelope.with_cookie(&cookie)
}

fn into_response(envelope: ResponseEnvelope) -> Response {
    let http = envelope.into_http_response();
    let mut builder = Response::builder().status(http.status);
    for (name, value) in &http.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(Body::from(http.body)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "envelope is not a valid HTTP response");
        let fallback = ResponseEnvelope::from_error(&HttpError::Internal(e.to_string()));
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, JSON_API_CONTENT_TYPE)],
            fallback.body_json(),
        )
            .into_response()
    })
}

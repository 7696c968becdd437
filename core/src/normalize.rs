//! Normalization of transport signals into one canonical `Request`.
//!
//! # Design
//! The host captures whatever its transport exposes into a
//! `TransportSignals` value, once, at the I/O boundary. `normalize` reads
//! only that value: no environment, no globals, no shared state. Signals
//! may be missing or contradict each other; the rules below pick one
//! deterministic answer for each field.
//!
//! Only the method can fail. Every other signal is optional and defaults
//! to unset when absent.
//!
//! # Security detection
//! The protocol is upgraded to HTTPS when any of these holds, checked in
//! order: the connection itself is TLS, `X-Forwarded-Proto` says `https`,
//! `X-Forwarded-Ssl` says `on`, an SSL key size was reported, or the
//! server port is 443. The forwarded headers are only as trustworthy as
//! the proxy that set them; a misconfigured or compromised proxy can lie,
//! and hosts that are not behind a proxy they control should not collect
//! those headers at all.

use serde::{Deserialize, Serialize};

use crate::error::HttpError;
use crate::http::{Headers, HttpMethod, Protocol};
use crate::request::{Request, RequestData};

/// Everything the transport told us about one inbound call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSignals {
    /// Declared request method.
    pub method: Option<String>,
    /// Method override header value (`X-HTTP-Method-Override`).
    pub method_override: Option<String>,
    /// The connection itself is TLS.
    pub secure: bool,
    pub forwarded_proto: Option<String>,
    pub forwarded_ssl: Option<String>,
    pub ssl_key_size: Option<String>,
    /// Declared scheme, e.g. `http`.
    pub scheme: Option<String>,
    pub host: Option<String>,
    /// Port the server accepted the connection on.
    pub port: Option<u16>,
    /// Raw request target, path plus optional `?query`.
    pub request_target: Option<String>,
    /// Script and path info as one self-referencing path.
    pub self_path: Option<String>,
    pub script_name: Option<String>,
    pub path_info: Option<String>,
    pub query_string: Option<String>,
    /// Submitted parameters in receipt order; names may repeat.
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Build the canonical request for `signals`.
///
/// Fails with `InvalidMethod` when the declared method is missing or
/// unknown, or when a POST carries an override other than DELETE or PUT.
pub fn normalize(signals: &TransportSignals) -> Result<Request, HttpError> {
    let (method, is_tunnelled) = resolve_method(signals)?;
    let protocol = resolve_protocol(signals);
    let uri = resolve_uri(signals);
    let headers: Headers = signals.headers.iter().cloned().collect();
    let data: RequestData = signals.params.iter().cloned().collect();

    let mut builder = Request::builder(method)
        .tunnelled(is_tunnelled)
        .protocol(protocol)
        .uri(uri.clone())
        .data(data);

    if let Some(host) = signals.host.as_deref().or_else(|| headers.get("host")) {
        builder = builder.hostname(host);
    }
    if let Some(port) = signals.port {
        builder = builder.port(port);
    }
    if let Some(script) = signals.script_name.as_deref().filter(|s| *s != uri) {
        builder = builder.script(script);
    }
    if let Some(query) = resolve_query_string(signals) {
        builder = builder.query_string(query);
    }
    if let Some(body) = &signals.body {
        builder = builder.body(body.clone());
    }

    let request = builder.headers(headers).build();
    tracing::debug!(
        method = %request.method(),
        tunnelled = request.is_tunnelled(),
        protocol = %request.protocol(),
        uri = %request.uri(),
        params = request.data().len(),
        "request normalized"
    );
    Ok(request)
}

fn resolve_method(signals: &TransportSignals) -> Result<(HttpMethod, bool), HttpError> {
    let Some(declared) = signals.method.as_deref() else {
        tracing::warn!("request carried no method");
        return Err(HttpError::InvalidMethod(String::new()));
    };
    let method: HttpMethod = declared.parse().inspect_err(|_| {
        tracing::warn!(method = %declared, "rejected unknown request method");
    })?;

    match (method, signals.method_override.as_deref()) {
        (HttpMethod::Post, Some(raw)) => match raw.parse::<HttpMethod>() {
            Ok(tunnelled @ (HttpMethod::Delete | HttpMethod::Put)) => Ok((tunnelled, true)),
            _ => {
                tracing::warn!(method_override = %raw, "rejected tunnelled method");
                Err(HttpError::InvalidMethod(raw.to_string()))
            }
        },
        (method, _) => Ok((method, false)),
    }
}

fn resolve_protocol(signals: &TransportSignals) -> Protocol {
    if is_secure(signals) {
        return Protocol::Https;
    }
    signals
        .scheme
        .as_deref()
        .map(Protocol::from_scheme)
        .unwrap_or_default()
}

fn is_secure(signals: &TransportSignals) -> bool {
    // X-Forwarded-Proto may list one value per hop; the first is the client's.
    let forwarded_https = signals
        .forwarded_proto
        .as_deref()
        .and_then(|p| p.split(',').next())
        .is_some_and(|p| p.trim().eq_ignore_ascii_case("https"));
    let forwarded_ssl = signals
        .forwarded_ssl
        .as_deref()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("on"));

    signals.secure
        || forwarded_https
        || forwarded_ssl
        || signals.ssl_key_size.is_some()
        || signals.port == Some(443)
}

/// Exactly one source wins: raw target, then self path, then script name
/// plus path info.
fn resolve_uri(signals: &TransportSignals) -> String {
    if let Some(target) = &signals.request_target {
        return match target.split_once('?') {
            Some((path, _)) => path.to_string(),
            None => target.clone(),
        };
    }
    if let Some(self_path) = &signals.self_path {
        return self_path.clone();
    }
    if let Some(script) = &signals.script_name {
        return format!("{script}{}", signals.path_info.as_deref().unwrap_or_default());
    }
    String::new()
}

fn resolve_query_string(signals: &TransportSignals) -> Option<String> {
    signals.query_string.clone().or_else(|| {
        signals
            .request_target
            .as_deref()
            .and_then(|t| t.split_once('?'))
            .map(|(_, query)| query.to_string())
    })
}

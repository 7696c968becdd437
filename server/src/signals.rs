//! Capturing `TransportSignals` from a live axum request.
//!
//! This is the only place that looks at the raw HTTP request. Everything
//! after it works on the captured signals.

use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use restgate_core::{HttpError, TransportSignals};

const METHOD_OVERRIDE_HEADERS: [&str; 2] = ["x-http-method-override", "x-http-method"];
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// What the host knows beyond the request itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOptions {
    /// Port of the listener that accepted the connection.
    pub local_port: Option<u16>,
    pub trust_forwarded_headers: bool,
}

/// Record everything the request tells us. Query pairs come before body
/// pairs in `params`; a form body is consumed as parameters, any other body
/// is kept as text.
pub fn capture(
    parts: &Parts,
    body: &[u8],
    options: CaptureOptions,
) -> Result<TransportSignals, HttpError> {
    let headers = &parts.headers;
    let (host, host_port) = match header_str(headers, header::HOST.as_str()) {
        Some(raw) => split_host(raw),
        None => (None, None),
    };

    let mut params: Vec<(String, String)> = parts
        .uri
        .query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let mut text_body = None;
    if !body.is_empty() {
        if is_form(headers) {
            params.extend(form_urlencoded::parse(body).into_owned());
        } else {
            let text = std::str::from_utf8(body)
                .map_err(|e| HttpError::BadRequest(format!("request body is not UTF-8: {e}")))?;
            text_body = Some(text.to_string());
        }
    }

    let (forwarded_proto, forwarded_ssl) = if options.trust_forwarded_headers {
        (
            header_str(headers, "x-forwarded-proto").map(str::to_string),
            header_str(headers, "x-forwarded-ssl").map(str::to_string),
        )
    } else {
        (None, None)
    };

    Ok(TransportSignals {
        method: Some(parts.method.as_str().to_string()),
        method_override: METHOD_OVERRIDE_HEADERS
            .iter()
            .find_map(|name| header_str(headers, name))
            .map(str::to_string),
        secure: parts.uri.scheme_str() == Some("https"),
        forwarded_proto,
        forwarded_ssl,
        ssl_key_size: None,
        scheme: Some(parts.uri.scheme_str().unwrap_or("http").to_string()),
        host,
        port: options.local_port.or(host_port),
        request_target: parts.uri.path_and_query().map(|pq| pq.as_str().to_string()),
        self_path: None,
        script_name: None,
        path_info: None,
        query_string: parts.uri.query().map(str::to_string),
        params,
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        body: text_body,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn is_form(headers: &HeaderMap) -> bool {
    header_str(headers, header::CONTENT_TYPE.as_str()).is_some_and(|ct| {
        ct.split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
    })
}

/// `example.com:8080` → host and port. IPv6 literals keep their brackets.
fn split_host(raw: &str) -> (Option<String>, Option<u16>) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (None, None);
    }
    match raw.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !port.contains(']') => match port.parse() {
            Ok(port) => (Some(host.to_string()), Some(port)),
            Err(_) => (Some(raw.to_string()), None),
        },
        _ => (Some(raw.to_string()), None),
    }
}

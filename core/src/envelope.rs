//! Response envelopes and the error-to-response mapping.
//!
//! # Design
//! Every envelope, success or failure, carries
//! `Content-Type: application/vnd.api+json` and a complete JSON:API
//! document. `ResponseEnvelope::from_error` is the single place an
//! `HttpError` becomes a response: status from `HttpError::status`, one
//! `ErrorObject` with the client-safe detail, and an `Allow` header for 405s.

use crate::cookie::Cookie;
use crate::error::HttpError;
use crate::http::{status, Headers, HttpResponse, JSON_API_CONTENT_TYPE};
use crate::resource::{Document, ErrorObject, PrimaryData, Resource};

/// Methods that map onto a resource operation, as advertised in `Allow`.
pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE";

/// Last-resort body if a document cannot be serialized.
const FALLBACK_BODY: &str =
    r#"{"errors":[{"status":500,"detail":"Unexpected internal error"}]}"#;

impl From<&HttpError> for ErrorObject {
    fn from(err: &HttpError) -> Self {
        ErrorObject {
            status: err.status(),
            title: None,
            detail: err.detail(),
        }
    }
}

/// Status, headers and document of one response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub code: u16,
    pub headers: Headers,
    pub body: Document,
}

impl ResponseEnvelope {
    pub fn new(code: u16, body: Document) -> Self {
        let mut headers = Headers::new();
        headers.set("Content-Type", JSON_API_CONTENT_TYPE);
        Self {
            code,
            headers,
            body,
        }
    }

    /// 200 with `data`.
    pub fn ok(data: impl Into<PrimaryData>) -> Self {
        Self::new(status::OK, Document::Data(data.into()))
    }

    /// 201 with `data` and a `Location` header pointing at the new resource.
    pub fn created(resource: Resource, base_url: &str) -> Self {
        let location = format!("{}{}", base_url.trim_end_matches('/'), resource.uri());
        Self::new(status::CREATED, Document::Data(PrimaryData::One(resource)))
            .with_header("Location", location)
    }

    /// Error envelope for `err`.
    pub fn from_error(err: &HttpError) -> Self {
        match err {
            HttpError::Internal(message) => {
                tracing::error!(error = %message, "internal failure mapped to 500");
            }
            other => tracing::debug!(status = other.status(), error = %other, "request failed"),
        }

        let envelope = Self::errors(err.status(), vec![ErrorObject::from(err)]);
        if matches!(err, HttpError::UnsupportedMethod { .. }) {
            envelope.with_header("Allow", ALLOWED_METHODS)
        } else {
            envelope
        }
    }

    pub fn errors(code: u16, errors: Vec<ErrorObject>) -> Self {
        Self::new(code, Document::Errors(errors))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Append a `Set-Cookie` header; existing cookies are kept.
    pub fn with_cookie(self, cookie: &Cookie) -> Self {
        let value = cookie.format_for_response_header();
        self.with_header("Set-Cookie", value)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn body_json(&self) -> String {
        serde_json::to_string(&self.body).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize response document");
            FALLBACK_BODY.to_string()
        })
    }

    pub fn into_http_response(self) -> HttpResponse {
        let body = self.body_json();
        HttpResponse {
            status: self.code,
            headers: self.headers.into_pairs(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use serde_json::{json, Value};

    fn widget() -> Resource {
        let attrs = json!({"name": "sprocket"}).as_object().cloned().unwrap();
        Resource::new("widgets", attrs).unwrap().with_id("42")
    }

    fn body(envelope: &ResponseEnvelope) -> Value {
        serde_json::from_str(&envelope.body_json()).unwrap()
    }

    #[test]
    fn ok_envelope() {
        let envelope = ResponseEnvelope::ok(widget());
        assert_eq!(envelope.code, 200);
        assert_eq!(envelope.headers.get("content-type"), Some(JSON_API_CONTENT_TYPE));
        assert_eq!(body(&envelope)["data"]["id"], "42");
    }

    #[test]
    fn created_sets_location() {
        let envelope = ResponseEnvelope::created(widget(), "https://api.example.com/v1/");
        assert_eq!(envelope.code, 201);
        assert_eq!(
            envelope.headers.get("Location"),
            Some("https://api.example.com/v1/widgets/42")
        );
    }

    #[test]
    fn location_escapes_the_id() {
        let resource = widget().with_id("big gear\r\n");
        let envelope = ResponseEnvelope::created(resource, "https://api.example.com");
        assert_eq!(
            envelope.headers.get("Location"),
            Some("https://api.example.com/widgets/big%20gear%0D%0A")
        );
        assert_eq!(body(&envelope)["data"]["id"], "big gear\r\n");
    }

    #[test]
    fn error_envelope_shape() {
        let envelope = ResponseEnvelope::from_error(&HttpError::NotFound("nothing at '/x'".into()));
        assert_eq!(envelope.code, 404);
        assert_eq!(envelope.headers.get("Content-Type"), Some(JSON_API_CONTENT_TYPE));
        assert_eq!(
            body(&envelope),
            json!({"errors": [{"status": 404, "detail": "nothing at '/x'"}]})
        );
    }

    #[test]
    fn method_not_allowed_advertises_allow() {
        let err = HttpError::UnsupportedMethod {
            method: HttpMethod::Trace,
            uri: "/widgets".into(),
        };
        let envelope = ResponseEnvelope::from_error(&err);
        assert_eq!(envelope.code, 405);
        assert_eq!(envelope.headers.get("Allow"), Some(ALLOWED_METHODS));
    }

    #[test]
    fn internal_error_detail_is_generic() {
        let envelope = ResponseEnvelope::from_error(&HttpError::Internal("secret stack".into()));
        let json = body(&envelope);
        assert_eq!(envelope.code, 500);
        assert_eq!(json["errors"][0]["detail"], "Unexpected internal error");
        assert!(!envelope.body_json().contains("secret"));
    }

    #[test]
    fn cookies_become_set_cookie_headers() {
        let envelope = ResponseEnvelope::ok(PrimaryData::Empty)
            .with_cookie(&Cookie::named("a", "1").with_path("/"))
            .with_cookie(&Cookie::named("b", "2"));
        let values: Vec<_> = envelope.headers.get_all("set-cookie").collect();
        assert_eq!(values, vec!["a=1; path=/", "b=2"]);
    }

    #[test]
    fn into_http_response_keeps_headers() {
        let response = ResponseEnvelope::ok(widget()).into_http_response();
        assert_eq!(response.status, 200);
        assert!(response
            .headers
            .iter()
            .any(|(k, v)| k == "Content-Type" && v == JSON_API_CONTENT_TYPE));
        assert!(response.body.starts_with(r#"{"data":"#));
    }
}

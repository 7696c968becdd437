//! Cookie wire format: `Cookie` request headers and `Set-Cookie` response
//! headers.
//!
//! # Design
//! A `Cookie` is a transient value built fresh for every parse or format
//! call; the codec keeps no state between calls.
//!
//! Parsing never fails. The first `;`-separated crumb is the name/value
//! pair and is percent-decoded; later crumbs are attributes, matched
//! case-insensitively and taken verbatim. Unknown attributes are skipped so
//! newer servers can add attributes without breaking us, and an `expires`
//! value we cannot read becomes `Expires::Unparseable` instead of an error.
//!
//! Encoding escapes exactly the bytes that would break the header grammar:
//! controls and space (`<= 0x20`), DEL and above (`>= 0x7F`), `;` and `,`.
//! Every other byte, `%` included, passes through unchanged.
//!
//! `Set-Cookie` output is capped at `MAX_COOKIE_SIZE` bytes. When the cap
//! would be exceeded the name/value portion is cut down; the attributes are
//! always emitted whole.

use chrono::{DateTime, NaiveDateTime, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Conventional ceiling for a whole `Set-Cookie` value.
pub const MAX_COOKIE_SIZE: usize = 4096;

/// `CONTROLS` covers 0x00-0x1F and 0x7F; non-ASCII bytes are always encoded.
const RESERVED: &AsciiSet = &CONTROLS.add(b' ').add(b',').add(b';');

const RFC_1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const NETSCAPE_FORMAT: &str = "%a, %d-%b-%Y %H:%M:%S GMT";

/// Expiry attribute of a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expires {
    At(DateTime<Utc>),
    /// An `expires` attribute was present but not a date we understand.
    Unparseable,
}

impl Expires {
    pub fn at(&self) -> Option<DateTime<Utc>> {
        match self {
            Expires::At(at) => Some(*at),
            Expires::Unparseable => None,
        }
    }
}

/// A single HTTP cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    name: Option<String>,
    value: String,
    expires: Option<Expires>,
    domain: Option<String>,
    path: Option<String>,
    secure: bool,
    http_only: bool,
}

impl Cookie {
    /// Build a cookie from a value that may be a `name=value` pair.
    pub fn new(value: &str) -> Self {
        let mut cookie = Cookie::default();
        cookie.set_value(value);
        cookie
    }

    pub fn named(name: impl Into<String>, value: impl Into<String>) -> Self {
        Cookie {
            name: Some(name.into()),
            value: value.into(),
            ..Cookie::default()
        }
    }

    /// Replace the value. Text before the first `=` becomes the name; with
    /// no `=` the cookie is left unnamed.
    pub fn set_value(&mut self, value: &str) {
        match value.split_once('=') {
            Some((name, value)) => {
                self.name = Some(name.to_string());
                self.value = value.to_string();
            }
            None => {
                self.name = None;
                self.value = value.to_string();
            }
        }
    }

    pub fn with_expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(Expires::At(at));
        self
    }

    /// `;` and control characters are dropped from the domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(attribute_value(domain.into()));
        self
    }

    /// `;` and control characters are dropped from the path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(attribute_value(path.into()));
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires(&self) -> Option<Expires> {
        self.expires
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn http_only(&self) -> bool {
        self.http_only
    }

    /// Parse one cookie out of a `Cookie` or `Set-Cookie` header value.
    pub fn extract_from_header(header: &str) -> Cookie {
        let mut cookie = Cookie::default();
        let mut crumbs = header.split(';');

        if let Some(first) = crumbs.next() {
            let first = first.trim();
            match first.split_once('=') {
                Some((name, value)) => {
                    cookie.name = Some(decode(name));
                    cookie.value = decode(value);
                }
                None => cookie.value = decode(first),
            }
        }

        for crumb in crumbs {
            let crumb = crumb.trim();
            let (key, value) = match crumb.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (crumb, None),
            };
            match key.to_ascii_lowercase().as_str() {
                "expires" => {
                    cookie.expires = Some(value.map_or(Expires::Unparseable, parse_expires));
                }
                "domain" => cookie.domain = value.map(str::to_string),
                "path" => cookie.path = value.map(str::to_string),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }

        cookie
    }

    /// `name=value` as a client sends it in a `Cookie` header.
    pub fn format_for_request_header(&self) -> String {
        let mut encoded = match &self.name {
            Some(name) => format!("{}=", encode(name)),
            None => String::new(),
        };
        encoded.push_str(&encode(&self.value));
        encoded
    }

    /// Full `Set-Cookie` value, capped at `MAX_COOKIE_SIZE` bytes.
    pub fn format_for_response_header(&self) -> String {
        let mut encoded = self.format_for_request_header();
        let attributes = self.format_attributes();

        let budget = MAX_COOKIE_SIZE.saturating_sub(attributes.len());
        if encoded.len() > budget {
            tracing::debug!(
                original_len = encoded.len(),
                budget,
                "truncating cookie value to fit size ceiling"
            );
            truncate_encoded(&mut encoded, budget);
        }

        encoded.push_str(&attributes);
        encoded
    }

    fn format_attributes(&self) -> String {
        let mut formatted = String::new();
        if let Some(at) = self.expires.and_then(|e| e.at()) {
            formatted.push_str(&format!("; expires={}", at.format(RFC_1123_FORMAT)));
        }
        if let Some(domain) = &self.domain {
            formatted.push_str(&format!("; domain={domain}"));
        }
        if let Some(path) = &self.path {
            formatted.push_str(&format!("; path={path}"));
        }
        if self.secure {
            formatted.push_str("; secure");
        }
        if self.http_only {
            formatted.push_str("; HttpOnly");
        }
        formatted
    }
}

/// Percent-encode the bytes a cookie value may not carry literally.
pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, RESERVED).to_string()
}

/// Standard percent-decoding; invalid UTF-8 is replaced, not rejected.
pub fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

fn parse_expires(raw: &str) -> Expires {
    if let Ok(at) = DateTime::parse_from_rfc2822(raw) {
        return Expires::At(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, NETSCAPE_FORMAT)
        .map(|naive| Expires::At(naive.and_utc()))
        .unwrap_or(Expires::Unparseable)
}

/// Attribute values cannot be escaped, so anything that would end the
/// attribute early is removed.
fn attribute_value(raw: String) -> String {
    if raw.contains(|c: char| c == ';' || c.is_control()) {
        raw.chars().filter(|c| *c != ';' && !c.is_control()).collect()
    } else {
        raw
    }
}

/// Cut an encoded (pure ASCII) string to at most `budget` bytes without
/// leaving half of a `%XX` escape at the end.
fn truncate_encoded(encoded: &mut String, budget: usize) {
    let bytes = encoded.as_bytes();
    let mut cut = budget.min(bytes.len());
    if cut >= 1 && bytes[cut - 1] == b'%' {
        cut -= 1;
    } else if cut >= 2 && bytes[cut - 2] == b'%' {
        cut -= 2;
    }
    encoded.truncate(cut);
}

//! The canonical request model.
//!
//! # Design
//! A `Request` is built once per inbound call (by `normalize`) or once per
//! outbound call (by `RequestBuilder`) and is read-only afterwards: fields
//! are private and only exposed through accessors. The builder is the single
//! place where values are coerced: methods are validated, protocols
//! uppercased, port `0` dropped, and repeated parameters coalesced.
//!
//! URL layout, depending on `pre_fragment`:
//! ```text
//! false: protocol://hostname[:port]/uri[?queryString][#fragment]
//! true:  protocol://hostname[:port]/uri[#fragment][?queryString]
//! ```
//! The second form is for applications doing client-side routing, where the
//! fragment carries the route and the query string follows it.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::cookie::Cookie;
use crate::error::HttpError;
use crate::http::{Headers, HttpMethod, Protocol};

/// A submitted parameter: one value, or every value in receipt order when
/// the name was submitted more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    List(Vec<String>),
}

impl ParamValue {
    /// The value if exactly one was submitted.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Single(v) => Some(v),
            ParamValue::List(_) => None,
        }
    }

    /// The first submitted value.
    pub fn first(&self) -> Option<&str> {
        match self {
            ParamValue::Single(v) => Some(v),
            ParamValue::List(values) => values.first().map(String::as_str),
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Single(v) => vec![v.as_str()],
            ParamValue::List(values) => values.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            ParamValue::Single(prior) => {
                let prior = std::mem::take(prior);
                *self = ParamValue::List(vec![prior, value]);
            }
            ParamValue::List(values) => values.push(value),
        }
    }
}

/// Request parameters keyed by name, in first-seen order.
///
/// `add` coalesces: the first value for a name is stored as a scalar, the
/// second promotes it to a list `[first, second]`, later ones append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestData {
    entries: Vec<(String, ParamValue)>,
    // name -> position in `entries`
    index: HashMap<String, usize>,
}

impl RequestData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.index.get(&name) {
            Some(&pos) => self.entries[pos].1.push(value),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, ParamValue::Single(value)));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.index.get(name).map(|&pos| &self.entries[pos].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `application/x-www-form-urlencoded` rendering; list values repeat the
    /// name once per value.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in self.iter() {
            for v in value.values() {
                serializer.append_pair(name, v);
            }
        }
        serializer.finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = RequestData::new();
        for (k, v) in iter {
            data.add(k, v);
        }
        data
    }
}

impl Serialize for RequestData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// One inbound (or programmatically built outbound) HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: HttpMethod,
    is_tunnelled: bool,
    protocol: Protocol,
    hostname: Option<String>,
    port: Option<u16>,
    uri: String,
    script: Option<String>,
    query_string: Option<String>,
    data: RequestData,
    fragment: Option<String>,
    pre_fragment: bool,
    headers: Headers,
    body: Option<String>,
}

impl Request {
    pub fn builder(method: HttpMethod) -> RequestBuilder {
        RequestBuilder::new(method)
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// True when the method arrived through a POST override header.
    pub fn is_tunnelled(&self) -> bool {
        self.is_tunnelled
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Path up to (not including) the `?`.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Entry-point script, set only when it differs from `uri`.
    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    /// Raw, still-encoded query string.
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    pub fn data(&self) -> &RequestData {
        &self.data
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.data.get(name)
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn pre_fragment(&self) -> bool {
        self.pre_fragment
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn data_as_query_string(&self) -> String {
        self.data.to_query_string()
    }

    /// Every cookie carried by the `Cookie` header(s), one per `;` crumb.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.headers
            .get_all("cookie")
            .flat_map(|header| header.split(';'))
            .map(str::trim)
            .filter(|crumb| !crumb.is_empty())
            .map(Cookie::extract_from_header)
            .collect()
    }

    /// First cookie named `name`.
    pub fn cookie(&self, name: &str) -> Option<Cookie> {
        self.cookies()
            .into_iter()
            .find(|c| c.name() == Some(name))
    }

    /// Reassemble the full URL. The port is left out when it is the
    /// protocol's default; the query falls back to `data` when no raw query
    /// string was captured.
    pub fn url(&self) -> String {
        let mut url = format!(
            "{}://{}",
            self.protocol.as_str().to_ascii_lowercase(),
            self.hostname.as_deref().unwrap_or_default()
        );
        if let Some(port) = self.port.filter(|p| *p != self.protocol.default_port()) {
            url.push_str(&format!(":{port}"));
        }
        url.push_str(&self.uri);

        let query = match &self.query_string {
            Some(q) if !q.is_empty() => Some(q.clone()),
            _ if !self.data.is_empty() => Some(self.data.to_query_string()),
            _ => None,
        };
        let fragment = self.fragment.as_deref().filter(|f| !f.is_empty());

        if self.pre_fragment {
            if let Some(f) = fragment {
                url.push_str(&format!("#{f}"));
            }
            if let Some(q) = query {
                url.push_str(&format!("?{q}"));
            }
        } else {
            if let Some(q) = query {
                url.push_str(&format!("?{q}"));
            }
            if let Some(f) = fragment {
                url.push_str(&format!("#{f}"));
            }
        }
        url
    }
}

/// Consuming builder for `Request`.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            request: Request {
                method,
                is_tunnelled: false,
                protocol: Protocol::Http,
                hostname: None,
                port: None,
                uri: String::new(),
                script: None,
                query_string: None,
                data: RequestData::new(),
                fragment: None,
                pre_fragment: false,
                headers: Headers::new(),
                body: None,
            },
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.request.method = method;
        self
    }

    /// Set the method from its name; unknown names fail with `InvalidMethod`.
    pub fn method_str(self, method: &str) -> Result<Self, HttpError> {
        let method = method.parse()?;
        Ok(self.method(method))
    }

    /// Mark the method as tunnelled through POST. Ignored at `build` time
    /// when the method is POST itself.
    pub fn tunnelled(mut self, tunnelled: bool) -> Self {
        self.request.is_tunnelled = tunnelled;
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.request.protocol = protocol;
        self
    }

    pub fn protocol_str(self, protocol: &str) -> Self {
        self.protocol(Protocol::from_scheme(protocol))
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.request.hostname = Some(hostname.into());
        self
    }

    /// Port `0` is not a valid service port and leaves the port unset.
    pub fn port(mut self, port: u16) -> Self {
        self.request.port = (port != 0).then_some(port);
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.request.uri = uri.into();
        self
    }

    pub fn script(mut self, script: impl Into<String>) -> Self {
        self.request.script = Some(script.into());
        self
    }

    pub fn query_string(mut self, query_string: impl Into<String>) -> Self {
        self.request.query_string = Some(query_string.into());
        self
    }

    pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
        self.request.fragment = Some(fragment.into());
        self
    }

    pub fn pre_fragment(mut self, pre_fragment: bool) -> Self {
        self.request.pre_fragment = pre_fragment;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.append(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.request.headers = headers;
        self
    }

    /// Add a parameter, coalescing repeated names into a list.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.data.add(name, value);
        self
    }

    pub fn data(mut self, data: RequestData) -> Self {
        self.request.data = data;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    pub fn build(mut self) -> Request {
        if self.request.method == HttpMethod::Post {
            self.request.is_tunnelled = false;
        }
        self.request
    }
}

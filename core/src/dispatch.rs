//! Routing a canonical `Request` to a controller and turning the outcome
//! into a `ResponseEnvelope`.
//!
//! # Design
//! - The route table is an ordered list frozen by `DispatcherBuilder::build`.
//!   The first matcher that accepts the URI wins, so registration order is
//!   the tie-break between overlapping routes.
//! - Each call walks Received → Routed → Executing → Succeeded | Failed.
//!   Every failure, including a panicking controller, leaves through
//!   `ResponseEnvelope::from_error`; `dispatch` itself never fails.
//! - The dispatcher holds no mutable state. Share it behind an `Arc`.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::cookie::Cookie;
use crate::envelope::ResponseEnvelope;
use crate::error::HttpError;
use crate::http::{status, HttpMethod};
use crate::request::{ParamValue, Request, RequestData};
use crate::resource::{Document, PrimaryData, Resource};
use crate::routing::{PathParams, RouteMatcher};

/// What a controller operation hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub data: PrimaryData,
    /// Sent as `Set-Cookie` headers, in order.
    pub cookies: Vec<Cookie>,
}

impl Payload {
    pub fn new(data: impl Into<PrimaryData>) -> Self {
        Self {
            data: data.into(),
            cookies: Vec::new(),
        }
    }

    /// `"data": null`, the usual answer to a delete.
    pub fn empty() -> Self {
        Self::new(PrimaryData::Empty)
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }
}

impl From<PrimaryData> for Payload {
    fn from(data: PrimaryData) -> Self {
        Self::new(data)
    }
}

impl From<Resource> for Payload {
    fn from(resource: Resource) -> Self {
        Self::new(resource)
    }
}

impl From<Vec<Resource>> for Payload {
    fn from(resources: Vec<Resource>) -> Self {
        Self::new(resources)
    }
}

/// One routed call: the request plus whatever its route captured.
#[derive(Debug)]
pub struct Invocation<'a> {
    request: &'a Request,
    params: PathParams,
}

impl<'a> Invocation<'a> {
    pub fn new(request: &'a Request, params: PathParams) -> Self {
        Self { request, params }
    }

    pub fn request(&self) -> &'a Request {
        self.request
    }

    pub fn method(&self) -> HttpMethod {
        self.request.method()
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// A segment captured by the route, e.g. `id` for `/widgets/:id`.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Submitted parameter by name.
    pub fn param(&self, name: &str) -> Option<&'a ParamValue> {
        self.request.param(name)
    }

    pub fn data(&self) -> &'a RequestData {
        self.request.data()
    }

    /// The request body read as a single-resource JSON:API document.
    pub fn document(&self) -> Result<Resource, HttpError> {
        match self.request.body() {
            Some(body) if !body.trim().is_empty() => Resource::from_document(body),
            _ => Err(HttpError::BadRequest("request body is empty".into())),
        }
    }

    /// The error every operation a controller leaves out answers with.
    pub fn unsupported(&self) -> HttpError {
        HttpError::UnsupportedMethod {
            method: self.request.method(),
            uri: self.request.uri().to_string(),
        }
    }
}

/// The four resource operations. Anything not overridden answers 405.
pub trait Controller: Send + Sync {
    /// POST
    fn create(&self, call: &Invocation<'_>) -> Result<Payload, HttpError> {
        Err(call.unsupported())
    }

    /// GET
    fn retrieve(&self, call: &Invocation<'_>) -> Result<Payload, HttpError> {
        Err(call.unsupported())
    }

    /// PUT
    fn update(&self, call: &Invocation<'_>) -> Result<Payload, HttpError> {
        Err(call.unsupported())
    }

    /// DELETE
    fn delete(&self, call: &Invocation<'_>) -> Result<Payload, HttpError> {
        Err(call.unsupported())
    }
}

struct Route {
    matcher: Box<dyn RouteMatcher>,
    controller: Arc<dyn Controller>,
}

/// Ordered route table plus the base URL used for `Location` headers.
pub struct Dispatcher {
    base_url: String,
    routes: Vec<Route>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.base_url)
            .field(
                "routes",
                &self.routes.iter().map(|r| &r.matcher).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Dispatcher {
    pub fn builder(base_url: impl Into<String>) -> DispatcherBuilder {
        DispatcherBuilder {
            base_url: base_url.into(),
            routes: Vec::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Run `request` through the route table. Never fails: errors come back
    /// as error envelopes.
    pub fn dispatch(&self, request: &Request) -> ResponseEnvelope {
        let span = tracing::info_span!(
            "dispatch",
            method = %request.method(),
            uri = %request.uri(),
        );
        let _guard = span.enter();
        tracing::debug!("request received");

        match self.try_dispatch(request) {
            Ok(envelope) => {
                tracing::info!(status = envelope.code, "request succeeded");
                envelope
            }
            Err(err) => {
                let envelope = ResponseEnvelope::from_error(&err);
                tracing::info!(status = envelope.code, "request failed");
                envelope
            }
        }
    }

    fn try_dispatch(&self, request: &Request) -> Result<ResponseEnvelope, HttpError> {
        let (route, params) = self.find_route(request.uri()).ok_or_else(|| {
            HttpError::NotFound(format!(
                "No mapped controller for request URI '{}'",
                request.uri()
            ))
        })?;
        tracing::debug!(matcher = ?route.matcher, "request routed");

        let call = Invocation::new(request, params);
        tracing::debug!("executing controller");
        let payload = execute(route.controller.as_ref(), &call)?;
        Ok(self.success(request.method(), payload))
    }

    fn find_route(&self, uri: &str) -> Option<(&Route, PathParams)> {
        self.routes
            .iter()
            .find_map(|route| route.matcher.matches(uri).map(|params| (route, params)))
    }

    fn success(&self, method: HttpMethod, payload: Payload) -> ResponseEnvelope {
        let envelope = match (method, payload.data) {
            (HttpMethod::Post, PrimaryData::One(resource)) => {
                ResponseEnvelope::created(resource, &self.base_url)
            }
            (HttpMethod::Post, data) => ResponseEnvelope::new(status::CREATED, Document::Data(data)),
            (_, data) => ResponseEnvelope::ok(data),
        };
        payload
            .cookies
            .iter()
            .fold(envelope, |envelope, cookie| envelope.with_cookie(cookie))
    }
}

fn execute(controller: &dyn Controller, call: &Invocation<'_>) -> Result<Payload, HttpError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match call.method() {
        HttpMethod::Get => controller.retrieve(call),
        HttpMethod::Post => controller.create(call),
        HttpMethod::Put => controller.update(call),
        HttpMethod::Delete => controller.delete(call),
        HttpMethod::Head | HttpMethod::Options | HttpMethod::Trace => Err(call.unsupported()),
    }));
    outcome.unwrap_or_else(|panic| Err(HttpError::Internal(panic_message(panic.as_ref()))))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("controller panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("controller panicked: {s}")
    } else {
        "controller panicked".to_string()
    }
}

/// Collects routes in registration order.
pub struct DispatcherBuilder {
    base_url: String,
    routes: Vec<Route>,
}

impl DispatcherBuilder {
    pub fn route<M, C>(self, matcher: M, controller: C) -> Self
    where
        M: RouteMatcher + 'static,
        C: Controller + 'static,
    {
        self.route_shared(matcher, Arc::new(controller))
    }

    /// Register a controller that is already shared, e.g. one serving both
    /// a collection and its items.
    pub fn route_shared<M>(mut self, matcher: M, controller: Arc<dyn Controller>) -> Self
    where
        M: RouteMatcher + 'static,
    {
        self.routes.push(Route {
            matcher: Box::new(matcher),
            controller,
        });
        self
    }

    pub fn build(self) -> Dispatcher {
        tracing::debug!(routes = self.routes.len(), base_url = %self.base_url, "dispatcher built");
        Dispatcher {
            base_url: self.base_url,
            routes: self.routes,
        }
    }
}

//! Protocol core for a JSON:API service.
//!
//! # Overview
//! Turns whatever a transport knows about an inbound call into one
//! canonical `Request`, routes it to a `Controller`, and hands back a
//! `ResponseEnvelope` describing the HTTP response. Nothing here touches
//! the network: the host captures `TransportSignals`, calls `normalize`
//! and `Dispatcher::dispatch`, and writes the envelope itself.
//!
//! # Design
//! - Every step is a plain function over owned data, so the whole pipeline
//!   is deterministic and testable without a server.
//! - One error type, `HttpError`, and one place that turns it into a
//!   response, `ResponseEnvelope::from_error`.
//! - The cookie codec only deals in header strings; the `Cookie` and
//!   `Set-Cookie` headers travel with the request and the envelope.

pub mod cookie;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod http;
pub mod normalize;
pub mod request;
pub mod resource;
pub mod routing;

pub use cookie::{Cookie, Expires, MAX_COOKIE_SIZE};
pub use dispatch::{Controller, Dispatcher, DispatcherBuilder, Invocation, Payload};
pub use envelope::ResponseEnvelope;
pub use error::HttpError;
pub use http::{Headers, HttpMethod, HttpResponse, Protocol, JSON_API_CONTENT_TYPE};
pub use normalize::{normalize, TransportSignals};
pub use request::{ParamValue, Request, RequestBuilder, RequestData};
pub use resource::{
    Attributes, Document, ErrorObject, PrimaryData, Relationship, RelationshipData, Resource,
    ResourceIdentifier,
};
pub use routing::{ExactPath, PathParams, PathPattern, PathPrefix, RouteMatcher};

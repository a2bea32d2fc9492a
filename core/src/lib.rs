//! Declarative REST client engine.
//!
//! # Overview
//! A JSON route table describes every endpoint of a REST API: URL template,
//! method, parameter schema, body encoding and host overrides. `Registry`
//! loads and validates the table once; `Client` exposes one operation per
//! route and turns caller arguments into an `HttpRequest`, hands it to a
//! `Transport`, and classifies the `HttpResponse` that comes back.
//!
//! # Design
//! - Request assembly is pure. `Client::prepare` binds and builds without any
//!   I/O, and `Client::interpret` classifies a response a host fetched on its
//!   own, so the whole engine is deterministic and testable.
//! - `Client::invoke` sends exactly one request per call. Validation failures
//!   return before the transport is touched; there are no retries.
//! - The registry is immutable after loading and shared behind an `Arc`.
//!   The only mutable client state is the last-seen rate limit.
//! - Errors are a single `ApiError` enum so callers can tell validation,
//!   transport, auth, not-found and remote-validation failures apart.

pub mod args;
pub mod binder;
pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod interpret;
pub mod pagination;
pub mod registry;
pub mod response;
pub mod route;
pub mod schema;
pub mod transport;

pub use args::Arguments;
pub use client::{Client, Operation};
pub use config::{Auth, ClientConfig, ConfigOverrides};
pub use error::{ApiError, FieldError, Problem, RemoteFailure, ValidationError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use pagination::Pagination;
pub use registry::{ApiConstants, ConfigError, ConfigIssue, Registry, RouteDef};
pub use response::{Payload, RateLimit, ResponseEnvelope, ResponseMeta};
pub use route::{BodyEncoding, RouteDescriptor, RouteKey, UrlTemplate};
pub use schema::{ParamDef, ParamKind, ParamSpec, ParameterSchema};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{Transport, TransportError};

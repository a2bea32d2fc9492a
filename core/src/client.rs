//! Dispatch facade: one callable operation per route.
//!
//! # Design
//! `Client` keeps the split between building a request and parsing a
//! response. `prepare` binds and builds without touching the network and
//! `interpret` classifies a response, so a host can run the round trip
//! itself. `invoke` composes both around exactly one `Transport::send`.
//!
//! The only mutable state is the last-seen rate limit, written after every
//! interpreted response. The lock is never held across an await point, so
//! concurrent invocations never wait on each other.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn, Instrument};
use url::Url;

use crate::args::Arguments;
use crate::binder::bind;
use crate::builder::{build, encode_component};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HeaderSet, HttpMethod, HttpRequest, HttpResponse};
use crate::pagination::Pagination;
use crate::registry::Registry;
use crate::response::{RateLimit, ResponseEnvelope};
use crate::route::{RouteDescriptor, RouteKey};
use crate::transport::Transport;

/// Stateless-per-call dispatcher over a shared route registry.
#[derive(Debug)]
pub struct Client<T> {
    registry: Arc<Registry>,
    config: ClientConfig,
    transport: T,
    rate_limit: RwLock<Option<RateLimit>>,
}

impl<T: Transport> Client<T> {
    /// Client with configuration derived from the registry's constants.
    pub fn new(registry: Arc<Registry>, transport: T) -> Self {
        let config = ClientConfig::from_constants(registry.constants());
        Self::with_config(registry, config, transport)
    }

    pub fn with_config(registry: Arc<Registry>, config: ClientConfig, transport: T) -> Self {
        Self {
            registry,
            config,
            transport,
            rate_limit: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Last-seen rate-limit counters, if any response has carried them.
    pub fn rate_limit(&self) -> Option<RateLimit> {
        *self.rate_limit.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every route key, sorted.
    pub fn operations(&self) -> impl Iterator<Item = &RouteKey> {
        self.registry.routes().map(|route| &route.key)
    }

    /// Handle for the route named `key` (`group.operation`).
    pub fn operation(&self, key: &str) -> Result<Operation<'_, T>, ApiError> {
        let route = self.route(key)?;
        Ok(Operation {
            client: self,
            route,
        })
    }

    fn route(&self, key: &str) -> Result<&RouteDescriptor, ApiError> {
        key.parse::<RouteKey>()
            .ok()
            .and_then(|k| self.registry.route(&k))
            .ok_or_else(|| ApiError::UnknownRoute(key.to_string()))
    }

    /// Bind and build the request for `key` without sending it.
    pub fn prepare(&self, key: &str, args: &Arguments) -> Result<HttpRequest, ApiError> {
        self.prepare_route(self.route(key)?, args)
    }

    fn prepare_route(&self, route: &RouteDescriptor, args: &Arguments) -> Result<HttpRequest, ApiError> {
        let bound = bind(route, args)?;
        build(
            route,
            &bound,
            args.headers(),
            self.registry.request_headers(),
            &self.config,
        )
    }

    /// Classify a response and refresh the rate-limit counters from it,
    /// whatever its status.
    pub fn interpret(&self, response: HttpResponse) -> Result<ResponseEnvelope, ApiError> {
        self.record_rate_limit(&response.headers);
        crate::interpret::interpret(response, self.registry.response_headers())
    }

    fn record_rate_limit(&self, headers: &[(String, String)]) {
        let mut slot = self.rate_limit.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = RateLimit::refresh(*slot, headers) {
            *slot = Some(next);
        }
    }

    /// Issue exactly one request for `key`. Validation failures return before
    /// the transport is touched.
    pub async fn invoke(&self, key: &str, args: &Arguments) -> Result<ResponseEnvelope, ApiError> {
        let route = self.route(key)?;
        self.invoke_route(route, args).await
    }

    async fn invoke_route(
        &self,
        route: &RouteDescriptor,
        args: &Arguments,
    ) -> Result<ResponseEnvelope, ApiError> {
        let span = tracing::debug_span!("dispatch", route = %route.key, method = %route.method);
        async {
            let request = self.prepare_route(route, args)?;
            self.send(request).await
        }
        .instrument(span)
        .await
    }

    /// Fetch the page a pagination relation points at, with the client's
    /// usual headers. Returns `Ok(None)` when the relation is absent.
    pub async fn fetch_page(
        &self,
        pagination: &Pagination,
        rel: &str,
    ) -> Result<Option<ResponseEnvelope>, ApiError> {
        let Some(url) = pagination.get(rel) else {
            return Ok(None);
        };
        let request = self.page_request(url);
        let span = tracing::debug_span!("dispatch", page = rel);
        self.send(request).instrument(span).await.map(Some)
    }

    fn page_request(&self, url: &str) -> HttpRequest {
        let mut headers = HeaderSet::default();
        headers.insert("user-agent", self.config.user_agent.as_str());
        headers.insert("accept", self.config.accept.as_str());
        if let Some(authorization) = self.config.auth.header() {
            headers.insert("authorization", authorization);
        }
        for (name, value) in &self.config.headers {
            headers.insert(name, value.as_str());
        }

        // Re-attach query credentials unless the link already carries them.
        let present: Vec<String> = Url::parse(url)
            .map(|parsed| parsed.query_pairs().map(|(name, _)| name.into_owned()).collect())
            .unwrap_or_default();
        let mut url = url.to_string();
        for (name, value) in self.config.auth.query_pairs() {
            if present.iter().any(|existing| existing == name) {
                continue;
            }
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&format!("{name}={}", encode_component(value)));
        }

        HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: headers.into_vec(),
            body: None,
            timeout: self.config.timeout.filter(|t| !t.is_zero()),
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<ResponseEnvelope, ApiError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "transport failure");
                return Err(ApiError::Transport(err));
            }
        };
        debug!(status = response.status, "response received");

        let result = self.interpret(response);
        if let Err(err) = &result {
            warn!(status = ?err.status(), error = %err, "request failed");
        }
        result
    }
}

/// A single route bound to a client.
#[derive(Debug)]
pub struct Operation<'a, T> {
    client: &'a Client<T>,
    route: &'a RouteDescriptor,
}

impl<T> Clone for Operation<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Operation<'_, T> {}

impl<'a, T: Transport> Operation<'a, T> {
    pub fn route(&self) -> &'a RouteDescriptor {
        self.route
    }

    pub fn prepare(&self, args: &Arguments) -> Result<HttpRequest, ApiError> {
        self.client.prepare_route(self.route, args)
    }

    pub async fn invoke(&self, args: &Arguments) -> Result<ResponseEnvelope, ApiError> {
        self.client.invoke_route(self.route, args).await
    }
}

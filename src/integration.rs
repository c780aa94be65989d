//! Binds a [`Siteline`] tracker to a host's request pipeline.
//!
//! An [`Integration`] is created once at application start and shared by
//! every request. The tracker behind it is built lazily, on first use,
//! from explicit config with `SITELINE_*` environment variables as
//! fallback. Exactly one caller performs that initialization; if it fails
//! the integration stays disabled and requests pass through untracked.
//!
//! # Example
//!
//! ```rust,no_run
//! use siteline::{Integration, IntegrationConfig, Proxy};
//! use std::sync::Arc;
//!
//! let integration = Arc::new(Integration::new(IntegrationConfig::with_key("siteline_secret_abc")));
//! let proxy = Proxy::with_handler(integration, |_req: &http::Request<()>| {
//!     http::Response::new(String::from("hello"))
//! });
//!
//! let resp = proxy.call(&http::Request::new(()));
//! assert_eq!(resp.body(), "hello");
//! ```

use crate::client::Siteline;
use crate::constants::{
    env_vars, DEFAULT_SDK_NAME, DEFAULT_SDK_VERSION, DISPATCH_QUEUE_CAPACITY, DISPATCH_WORKERS,
};
use crate::dispatch::Dispatcher;
use crate::error::SitelineError;
use crate::ip::{extract_ip, HeaderSource};
use crate::transport::Transport;
use crate::types::{EnvLookup, PageviewData, SitelineConfig};

use http::{Request, Response, Uri};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{error, warn};

/// Caller-supplied integration settings. Unset fields fall back to the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct IntegrationConfig {
    pub website_key: Option<String>,
    pub endpoint: Option<String>,
    pub debug: Option<bool>,
}

/// Settings after explicit values and environment have been merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub website_key: String,
    pub endpoint: Option<String>,
    pub debug: bool,
}

impl IntegrationConfig {
    pub fn with_key(website_key: impl Into<String>) -> Self {
        Self {
            website_key: Some(website_key.into()),
            ..Self::default()
        }
    }

    /// Merge with the environment: explicit fields win, then `SITELINE_*`.
    pub fn resolve(&self, env: &EnvLookup) -> ResolvedConfig {
        ResolvedConfig {
            website_key: self
                .website_key
                .clone()
                .or_else(|| env(env_vars::WEBSITE_KEY))
                .unwrap_or_default(),
            endpoint: self.endpoint.clone().or_else(|| env(env_vars::ENDPOINT)),
            debug: self
                .debug
                .unwrap_or_else(|| env(env_vars::DEBUG).as_deref() == Some("true")),
        }
    }
}

/// SDK name, version and integration type reported by an integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkIdentity {
    pub sdk: String,
    pub sdk_version: String,
    pub integration_type: String,
}

impl SdkIdentity {
    /// This crate's name and version with the given integration type.
    pub fn for_integration(integration_type: impl Into<String>) -> Self {
        Self {
            sdk: DEFAULT_SDK_NAME.to_string(),
            sdk_version: DEFAULT_SDK_VERSION.to_string(),
            integration_type: integration_type.into(),
        }
    }
}

impl Default for SdkIdentity {
    fn default() -> Self {
        Self::for_integration("http")
    }
}

struct Active {
    dispatcher: Dispatcher,
}

/// One-time-initialized tracker shared across requests.
pub struct Integration {
    config: IntegrationConfig,
    identity: SdkIdentity,
    env: EnvLookup,
    transport: Option<Arc<dyn Transport>>,
    state: OnceLock<Option<Active>>,
}

impl Integration {
    pub fn new(config: IntegrationConfig) -> Self {
        Self {
            config,
            identity: SdkIdentity::default(),
            env: Box::new(|name: &str| std::env::var(name).ok()),
            transport: None,
            state: OnceLock::new(),
        }
    }

    /// Integration configured entirely from `SITELINE_*` variables.
    pub fn from_env() -> Self {
        Self::new(IntegrationConfig::default())
    }

    pub fn with_identity(mut self, identity: SdkIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Replace the environment lookup used during initialization.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    /// Send through a custom transport instead of `ureq`.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// The tracker, initializing it on first call. `None` when the
    /// integration is disabled (missing or invalid key).
    pub fn tracker(&self) -> Option<&Arc<Siteline>> {
        self.active().map(|a| a.dispatcher.tracker())
    }

    /// Run the one-time initialization now if it has not happened yet.
    /// Returns whether tracking is enabled.
    pub fn initialize(&self) -> bool {
        self.active().is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    pub fn identity(&self) -> &SdkIdentity {
        &self.identity
    }

    /// Capture the request side of a pageview.
    ///
    /// Returns `None` when tracking is disabled; callers then skip
    /// [`complete`](Integration::complete).
    pub fn begin<H>(
        &self,
        started: Instant,
        url: impl Into<String>,
        method: impl Into<String>,
        headers: &H,
    ) -> Option<PendingPageview>
    where
        H: HeaderSource + ?Sized,
    {
        self.active()?;
        Some(PendingPageview {
            started,
            data: PageviewData {
                url: url.into(),
                method: method.into(),
                user_agent: headers.header("user-agent").map(str::to_string),
                referrer: headers.header("referer").map(str::to_string),
                ip: extract_ip(headers),
                status: 0,
                duration: 0.0,
            },
        })
    }

    /// Finish a pageview with the response status and hand it off for
    /// sending. Does not wait for the send.
    pub fn complete(&self, pending: PendingPageview, status: u16) {
        let Some(active) = self.active() else {
            return;
        };
        let PendingPageview { started, mut data } = pending;
        data.status = i64::from(status);
        data.duration = started.elapsed().as_secs_f64() * 1000.0;
        active.dispatcher.dispatch(data);
    }

    /// Stop the dispatcher, sending queued events for at most
    /// [`SHUTDOWN_TIMEOUT`](crate::constants::SHUTDOWN_TIMEOUT).
    ///
    /// Dropping the integration closes the queue without waiting.
    pub fn shutdown(&self) {
        if let Some(active) = self.state.get().and_then(Option::as_ref) {
            active.dispatcher.shutdown();
        }
    }

    fn active(&self) -> Option<&Active> {
        self.state.get_or_init(|| self.build_active()).as_ref()
    }

    fn build_active(&self) -> Option<Active> {
        let resolved = self.config.resolve(&self.env);

        if resolved.website_key.is_empty() {
            warn!(target: "siteline", "Missing websiteKey in config or environment");
            return None;
        }

        match self.start(resolved) {
            Ok(active) => Some(active),
            Err(e) => {
                error!(target: "siteline", "Tracking disabled: {e}");
                None
            }
        }
    }

    fn start(&self, resolved: ResolvedConfig) -> Result<Active, SitelineError> {
        let config = SitelineConfig {
            website_key: resolved.website_key,
            endpoint: resolved.endpoint,
            debug: resolved.debug,
            sdk: Some(self.identity.sdk.clone()),
            sdk_version: Some(self.identity.sdk_version.clone()),
            integration_type: Some(self.identity.integration_type.clone()),
            timeout: None,
        };
        let tracker = match &self.transport {
            Some(transport) => Siteline::with_transport(config, Arc::clone(transport))?,
            None => Siteline::new(config)?,
        };
        let dispatcher = Dispatcher::new(Arc::new(tracker), DISPATCH_QUEUE_CAPACITY, DISPATCH_WORKERS)?;
        Ok(Active { dispatcher })
    }
}

/// Request-side pageview data waiting for its response.
#[derive(Debug, Clone)]
pub struct PendingPageview {
    started: Instant,
    data: PageviewData,
}

impl PendingPageview {
    pub fn data(&self) -> &PageviewData {
        &self.data
    }
}

/// Rebuild an absolute URL from request parts.
///
/// Servers usually see origin-form targets (`/path?q`). The scheme comes
/// from `scheme`, else `http`; without a host the target is returned as is.
/// Absolute-form targets (`http://host/path`) are returned unchanged.
pub fn absolute_url(scheme: Option<&str>, host: Option<&str>, target: &str) -> String {
    if is_absolute_form(target) {
        return target.to_string();
    }
    match host.filter(|h| !h.is_empty()) {
        Some(host) => format!("{}://{host}{target}", scheme.unwrap_or("http")),
        None => target.to_string(),
    }
}

fn is_absolute_form(target: &str) -> bool {
    !target.starts_with('/')
        && target
            .parse::<Uri>()
            .is_ok_and(|uri| uri.scheme().is_some() && uri.authority().is_some())
}

/// Absolute URL for an `http` request, using `x-forwarded-proto` and
/// `Host` when the URI itself carries no authority.
pub fn request_url(uri: &Uri, headers: &http::HeaderMap) -> String {
    if uri.authority().is_some() {
        return uri.to_string();
    }
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    absolute_url(
        headers.header("x-forwarded-proto"),
        headers.header("host"),
        path,
    )
}

/// Produces the response for a wrapped request.
pub trait Handler<B, R> {
    fn call(&self, req: &Request<B>) -> Response<R>;
}

impl<F, B, R> Handler<B, R> for F
where
    F: Fn(&Request<B>) -> Response<R>,
{
    fn call(&self, req: &Request<B>) -> Response<R> {
        self(req)
    }
}

/// Handler that lets the request through with a default `200` response.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl<B, R: Default> Handler<B, R> for PassThrough {
    fn call(&self, _req: &Request<B>) -> Response<R> {
        Response::default()
    }
}

/// Wraps a handler so every call is tracked.
///
/// The handler's response is returned untouched; tracking happens after it
/// is produced and is never awaited.
pub struct Proxy<H> {
    integration: Arc<Integration>,
    handler: H,
}

impl Proxy<PassThrough> {
    pub fn new(integration: Arc<Integration>) -> Self {
        Self::with_handler(integration, PassThrough)
    }
}

impl<H> Proxy<H> {
    pub fn with_handler(integration: Arc<Integration>, handler: H) -> Self {
        Self {
            integration,
            handler,
        }
    }

    pub fn integration(&self) -> &Arc<Integration> {
        &self.integration
    }

    pub fn call<B, R>(&self, req: &Request<B>) -> Response<R>
    where
        H: Handler<B, R>,
    {
        // Initialize first so setup is not counted in the first duration
        self.integration.initialize();
        let start = Instant::now();
        let pending = self.integration.begin(
            start,
            request_url(req.uri(), req.headers()),
            req.method().as_str(),
            req.headers(),
        );

        let resp = self.handler.call(req);

        if let Some(pending) = pending {
            self.integration.complete(pending, resp.status().as_u16());
        }
        resp
    }
}

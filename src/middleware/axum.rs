//! Axum middleware adapter (Tower Layer/Service).
//!
//! # Example
//!
//! ```rust,no_run
//! use siteline::IntegrationConfig;
//! use siteline::middleware::axum::SitelineLayer;
//! use axum::Router;
//!
//! let app: Router = Router::new().layer(SitelineLayer::from_config(IntegrationConfig::default()));
//! ```

use crate::integration::{request_url, Integration, IntegrationConfig, PendingPageview, SdkIdentity};

use axum::body::Body;
use http::Request;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

pub const INTEGRATION_TYPE: &str = "axum";

/// Tower Layer that wraps services with pageview tracking.
#[derive(Clone)]
pub struct SitelineLayer {
    integration: Arc<Integration>,
}

impl SitelineLayer {
    pub fn new(integration: Arc<Integration>) -> Self {
        Self { integration }
    }

    /// Build an integration reporting itself as `axum`.
    pub fn from_config(config: IntegrationConfig) -> Self {
        let integration =
            Integration::new(config).with_identity(SdkIdentity::for_integration(INTEGRATION_TYPE));
        Self::new(Arc::new(integration))
    }
}

impl<S> Layer<S> for SitelineLayer {
    type Service = SitelineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SitelineService {
            inner,
            integration: Arc::clone(&self.integration),
        }
    }
}

/// Tower Service that records a pageview per request.
#[derive(Clone)]
pub struct SitelineService<S> {
    inner: S,
    integration: Arc<Integration>,
}

impl<S> Service<Request<Body>> for SitelineService<S>
where
    S: Service<Request<Body>, Response = axum::response::Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = axum::response::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Initialize first so setup is not counted in the first duration
        self.integration.initialize();
        let start = Instant::now();
        let pending = self.integration.begin(
            start,
            request_url(req.uri(), req.headers()),
            req.method().as_str(),
            req.headers(),
        );

        let future = self.inner.call(req);

        ResponseFuture {
            inner: future,
            integration: Arc::clone(&self.integration),
            pending,
        }
    }
}

pin_project! {
    /// Future that records the pageview once the inner service responds.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        integration: Arc<Integration>,
        pending: Option<PendingPageview>,
    }
}

impl<F, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<axum::response::Response, E>>,
{
    type Output = Result<axum::response::Response, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.inner.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                if let Ok(ref resp) = result {
                    if let Some(pending) = this.pending.take() {
                        this.integration.complete(pending, resp.status().as_u16());
                    }
                }
                Poll::Ready(result)
            }
        }
    }
}

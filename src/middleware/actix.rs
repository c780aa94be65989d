//! Actix Web middleware adapter.
//!
//! # Example
//!
//! ```rust,no_run
//! use siteline::IntegrationConfig;
//! use siteline::middleware::actix::Siteline;
//!
//! let app = actix_web::App::new().wrap(Siteline::from_config(IntegrationConfig::default()));
//! ```

use crate::integration::{absolute_url, Integration, IntegrationConfig, SdkIdentity};
use crate::ip::HeaderSource;

use actix_service::{Service, Transform};
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::HeaderMap;
use actix_web::Error;
use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

pub const INTEGRATION_TYPE: &str = "actix";

impl HeaderSource for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
    }
}

/// Actix Web middleware that records a pageview per request.
pub struct Siteline {
    integration: Arc<Integration>,
}

impl Siteline {
    pub fn new(integration: Arc<Integration>) -> Self {
        Self { integration }
    }

    /// Build an integration reporting itself as `actix`.
    pub fn from_config(config: IntegrationConfig) -> Self {
        let integration =
            Integration::new(config).with_identity(SdkIdentity::for_integration(INTEGRATION_TYPE));
        Self::new(Arc::new(integration))
    }
}

impl<S, B> Transform<S, ServiceRequest> for Siteline
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SitelineService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SitelineService {
            service,
            integration: Arc::clone(&self.integration),
        }))
    }
}

pub struct SitelineService<S> {
    service: S,
    integration: Arc<Integration>,
}

impl<S, B> Service<ServiceRequest> for SitelineService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Initialize first so setup is not counted in the first duration
        self.integration.initialize();
        let start = Instant::now();
        let url = if req.uri().authority().is_some() {
            req.uri().to_string()
        } else {
            let info = req.connection_info();
            let target = req.uri().path_and_query().map_or("/", |pq| pq.as_str());
            absolute_url(Some(info.scheme()), Some(info.host()), target)
        };
        let pending = self
            .integration
            .begin(start, url, req.method().as_str(), req.headers());

        let integration = Arc::clone(&self.integration);
        let fut = self.service.call(req);

        Box::pin(async move {
            let resp = fut.await?;
            if let Some(pending) = pending {
                integration.complete(pending, resp.status().as_u16());
            }
            Ok::<_, Error>(resp)
        })
    }
}

//! Rocket fairing adapter.
//!
//! # Example
//!
//! ```rust,no_run
//! use siteline::IntegrationConfig;
//! use siteline::middleware::rocket::SitelineFairing;
//!
//! let rocket = rocket::build().attach(SitelineFairing::from_config(IntegrationConfig::default()));
//! ```

use crate::integration::{absolute_url, Integration, IntegrationConfig, SdkIdentity};
use crate::ip::HeaderSource;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::HeaderMap;
use rocket::{Data, Request, Response};
use std::sync::Arc;
use std::time::Instant;

pub const INTEGRATION_TYPE: &str = "rocket";

impl HeaderSource for HeaderMap<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get_one(name)
    }
}

/// Rocket fairing that records a pageview per request.
pub struct SitelineFairing {
    integration: Arc<Integration>,
}

impl SitelineFairing {
    pub fn new(integration: Arc<Integration>) -> Self {
        Self { integration }
    }

    /// Build an integration reporting itself as `rocket`.
    pub fn from_config(config: IntegrationConfig) -> Self {
        let integration =
            Integration::new(config).with_identity(SdkIdentity::for_integration(INTEGRATION_TYPE));
        Self::new(Arc::new(integration))
    }
}

#[rocket::async_trait]
impl Fairing for SitelineFairing {
    fn info(&self) -> Info {
        Info {
            name: "Siteline Pageview Tracking",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        // Initialize before timing so setup is not counted in the first duration
        self.integration.initialize();
        req.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, resp: &mut Response<'r>) {
        let start = *req.local_cache(Instant::now);

        let headers = req.headers();
        let url = absolute_url(
            headers.get_one("x-forwarded-proto"),
            headers.get_one("host"),
            &req.uri().to_string(),
        );

        if let Some(pending) = self
            .integration
            .begin(start, url, req.method().as_str(), headers)
        {
            self.integration.complete(pending, resp.status().code);
        }
    }
}

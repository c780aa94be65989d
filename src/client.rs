use crate::constants::{
    DEFAULT_ENDPOINT, DEFAULT_INTEGRATION_TYPE, DEFAULT_SDK_NAME, DEFAULT_SDK_VERSION,
    SEND_TIMEOUT,
};
use crate::error::{SitelineError, TransportError};
use crate::sanitize::{self, Identity};
use crate::transport::{IntakeRequest, Transport, UreqTransport};
use crate::types::{PageviewData, SanitizedEvent, SitelineConfig};
use crate::validate::validate_website_key;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Pageview tracker.
///
/// Each call to [`track`](Siteline::track) sanitizes one event and POSTs it
/// to the intake endpoint. Nothing is buffered or retried, and no failure
/// ever reaches the caller.
pub struct Siteline {
    identity: Identity,
    endpoint: String,
    debug: bool,
    timeout: Duration,
    user_agent: String,
    transport: Arc<dyn Transport>,
}

impl Siteline {
    /// Create a tracker that sends over HTTP with `ureq`.
    ///
    /// Fails with [`SitelineError::Validation`] when the site key is missing
    /// or malformed.
    pub fn new(config: SitelineConfig) -> Result<Self, SitelineError> {
        validate_website_key(&config.website_key)?;
        Ok(Self::build(config, Arc::new(UreqTransport::new())))
    }

    /// Create a tracker that sends through a custom [`Transport`].
    pub fn with_transport(
        config: SitelineConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SitelineError> {
        validate_website_key(&config.website_key)?;
        Ok(Self::build(config, transport))
    }

    fn build(config: SitelineConfig, transport: Arc<dyn Transport>) -> Self {
        let identity = Identity {
            website_key: config.website_key,
            sdk: or_default(config.sdk, DEFAULT_SDK_NAME),
            sdk_version: or_default(config.sdk_version, DEFAULT_SDK_VERSION),
            integration_type: or_default(config.integration_type, DEFAULT_INTEGRATION_TYPE),
        };
        let user_agent = format!("{}/{}", identity.sdk, identity.sdk_version);

        let tracker = Self {
            endpoint: or_default(config.endpoint, DEFAULT_ENDPOINT),
            debug: config.debug,
            timeout: config.timeout.unwrap_or(SEND_TIMEOUT),
            user_agent,
            identity,
            transport,
        };

        if tracker.debug {
            debug!(target: "siteline", endpoint = %tracker.endpoint, "Siteline initialized");
        }
        tracker
    }

    /// Send one pageview. Blocks until the attempt succeeds, fails or times
    /// out; failures are logged when debug is enabled and otherwise dropped.
    pub fn track(&self, data: PageviewData) {
        if let Err(e) = self.deliver(&data) {
            if self.debug {
                warn!(target: "siteline", url = %data.url, "Track failed: {e}");
            }
        }
    }

    /// Normalize raw data into the bounded wire format.
    pub fn sanitize(&self, data: &PageviewData) -> SanitizedEvent {
        sanitize::sanitize(data, &self.identity)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn sdk(&self) -> &str {
        &self.identity.sdk
    }

    pub fn sdk_version(&self) -> &str {
        &self.identity.sdk_version
    }

    pub fn integration_type(&self) -> &str {
        &self.identity.integration_type
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ------------------------------------------------------------------
    // Network
    // ------------------------------------------------------------------

    fn deliver(&self, data: &PageviewData) -> Result<(), SitelineError> {
        let event = self.sanitize(data);
        self.send(&event)?;
        Ok(())
    }

    fn send(&self, event: &SanitizedEvent) -> Result<(), TransportError> {
        let body = serde_json::to_vec(event)?;

        let status = self.transport.post(&IntakeRequest {
            endpoint: &self.endpoint,
            user_agent: &self.user_agent,
            body: &body,
            timeout: self.timeout,
        })?;

        if !(200..300).contains(&status) {
            return Err(TransportError::Status(status));
        }

        if self.debug {
            debug!(
                target: "siteline",
                endpoint = %self.endpoint,
                sdk = %self.identity.sdk,
                sdk_version = %self.identity.sdk_version,
                integration_type = %self.identity.integration_type,
                "Tracked: {}",
                event.url
            );
        }
        Ok(())
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

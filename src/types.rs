use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment lookup used by integrations to fill unset config fields.
///
/// Receives a variable name and returns its value, if any. The default reads
/// the process environment.
pub type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A single request/response summary, as observed by the host.
#[derive(Debug, Clone, Default)]
pub struct PageviewData {
    // Request
    pub url: String,
    pub method: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub ip: Option<String>,
    // Response
    pub status: i64,
    /// Elapsed time in milliseconds.
    pub duration: f64,
}

/// Wire-ready pageview. Every field is bounded by the limits table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedEvent {
    pub website_key: String,
    pub url: String,
    pub method: String,
    pub status: u16,
    pub duration: u32,
    pub user_agent: Option<String>,
    #[serde(rename = "ref")]
    pub referrer: Option<String>,
    pub ip: Option<String>,
    pub integration_type: String,
    pub sdk: String,
    pub sdk_version: String,
}

/// Configuration for a [`Siteline`](crate::Siteline) tracker.
#[derive(Debug, Clone, Default)]
pub struct SitelineConfig {
    /// Site key (required). Must start with `siteline_secret_` or `gptrends_secret_`.
    pub website_key: String,
    /// Intake URL. Default: the hosted pageview intake.
    pub endpoint: Option<String>,
    /// Log sends and failures through `tracing`.
    pub debug: bool,
    /// SDK name reported in the payload and `User-Agent`.
    pub sdk: Option<String>,
    pub sdk_version: Option<String>,
    /// Which integration produced the event (`custom`, `axum`, ...).
    pub integration_type: Option<String>,
    /// Upper bound for a single POST. Default: 5s.
    pub timeout: Option<Duration>,
}

impl SitelineConfig {
    /// Create a config with the site key only; everything else uses defaults.
    pub fn with_key(website_key: impl Into<String>) -> Self {
        Self {
            website_key: website_key.into(),
            ..Self::default()
        }
    }

    /// Create a config with a site key and an explicit intake endpoint.
    pub fn new(website_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            website_key: website_key.into(),
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }
}

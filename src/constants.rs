use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.gptrends.io/v1/intake/pageview";
pub const DEFAULT_SDK_NAME: &str = "siteline-rust";
pub const DEFAULT_SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DEFAULT_INTEGRATION_TYPE: &str = "custom";

/// Site keys must start with one of these.
pub const WEBSITE_KEY_PREFIXES: &[&str] = &["siteline_secret_", "gptrends_secret_"];

pub const SEND_TIMEOUT: Duration = Duration::from_millis(5000);

/// Pending events held by the dispatcher before new ones are dropped.
pub const DISPATCH_QUEUE_CAPACITY: usize = 1024;
pub const DISPATCH_WORKERS: usize = 2;
/// Longest `Dispatcher::shutdown` keeps sending queued events.
pub const SHUTDOWN_TIMEOUT: Duration = SEND_TIMEOUT;

/// Field bounds applied by the sanitizer. String maxima are in bytes.
pub mod limits {
    pub const URL_MAX_LENGTH: usize = 2048;
    pub const METHOD_MAX_LENGTH: usize = 10;
    pub const USER_AGENT_MAX_LENGTH: usize = 512;
    pub const REF_MAX_LENGTH: usize = 2048;
    pub const IP_MAX_LENGTH: usize = 45;
    pub const INTEGRATION_TYPE_MAX_LENGTH: usize = 50;
    pub const SDK_MAX_LENGTH: usize = 50;
    pub const SDK_VERSION_MAX_LENGTH: usize = 20;
    pub const STATUS_MIN: u16 = 0;
    pub const STATUS_MAX: u16 = 999;
    pub const DURATION_MIN: u32 = 0;
    pub const DURATION_MAX: u32 = 300_000;
}

/// Environment variables consulted when an integration config leaves a field unset.
pub mod env_vars {
    pub const WEBSITE_KEY: &str = "SITELINE_WEBSITE_KEY";
    pub const ENDPOINT: &str = "SITELINE_ENDPOINT";
    pub const DEBUG: &str = "SITELINE_DEBUG";
}

//! Siteline — pageview analytics SDK for Rust web services
//!
//! Records one event per request (URL, method, status, duration, user agent,
//! referrer, client IP), clamps it to bounded wire form and POSTs it to an
//! intake endpoint. Sends are fire-and-forget: they run on background
//! workers, are bounded by a timeout, and never fail the host request.

mod client;
pub mod constants;
mod dispatch;
mod error;
mod integration;
mod ip;
pub mod middleware;
mod sanitize;
mod transport;
mod types;
mod validate;

pub use client::Siteline;
pub use dispatch::Dispatcher;
pub use error::{SitelineError, TransportError};
pub use integration::{
    absolute_url, request_url, Handler, Integration, IntegrationConfig, PassThrough,
    PendingPageview, Proxy, ResolvedConfig, SdkIdentity,
};
pub use ip::{extract_ip, HeaderField, HeaderSource};
pub use sanitize::{sanitize, Identity};
pub use transport::{IntakeRequest, Transport, UreqTransport};
pub use types::{EnvLookup, PageviewData, SanitizedEvent, SitelineConfig};
pub use validate::validate_website_key;

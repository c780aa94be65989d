//! Maps raw pageview data onto the bounded wire format.

use crate::constants::limits;
use crate::types::{PageviewData, SanitizedEvent};

/// Tracker-owned fields stamped onto every event.
#[derive(Debug, Clone)]
pub struct Identity {
    pub website_key: String,
    pub integration_type: String,
    pub sdk: String,
    pub sdk_version: String,
}

/// Normalize `data` into a [`SanitizedEvent`]. Pure; never fails.
pub fn sanitize(data: &PageviewData, identity: &Identity) -> SanitizedEvent {
    SanitizedEvent {
        website_key: identity.website_key.clone(),
        url: clamp_str(&data.url, limits::URL_MAX_LENGTH),
        method: clamp_str(&data.method.to_uppercase(), limits::METHOD_MAX_LENGTH),
        status: clamp_status(data.status),
        duration: clamp_duration(data.duration),
        user_agent: clamp_optional(data.user_agent.as_deref(), limits::USER_AGENT_MAX_LENGTH),
        referrer: clamp_optional(data.referrer.as_deref(), limits::REF_MAX_LENGTH),
        ip: clamp_optional(data.ip.as_deref(), limits::IP_MAX_LENGTH),
        integration_type: clamp_str(
            &identity.integration_type,
            limits::INTEGRATION_TYPE_MAX_LENGTH,
        ),
        sdk: clamp_str(&identity.sdk, limits::SDK_MAX_LENGTH),
        sdk_version: clamp_str(&identity.sdk_version, limits::SDK_VERSION_MAX_LENGTH),
    }
}

/// Truncate to at most `max` bytes without splitting a character.
pub(crate) fn clamp_str(value: &str, max: usize) -> String {
    if value.len() <= max {
        return value.to_string();
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

fn clamp_optional(value: Option<&str>, max: usize) -> Option<String> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| clamp_str(v, max))
}

fn clamp_status(status: i64) -> u16 {
    status.clamp(i64::from(limits::STATUS_MIN), i64::from(limits::STATUS_MAX)) as u16
}

fn clamp_duration(duration: f64) -> u32 {
    if duration.is_nan() {
        return limits::DURATION_MIN;
    }
    duration
        .clamp(f64::from(limits::DURATION_MIN), f64::from(limits::DURATION_MAX))
        .round() as u32
}

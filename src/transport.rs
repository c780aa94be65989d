use crate::error::TransportError;

use std::io;
use std::time::Duration;

/// A single pageview POST, fully prepared by the tracker.
#[derive(Debug, Clone, Copy)]
pub struct IntakeRequest<'a> {
    pub endpoint: &'a str,
    pub user_agent: &'a str,
    /// Serialized JSON event.
    pub body: &'a [u8],
    pub timeout: Duration,
}

/// Sends an intake request and reports the HTTP status.
///
/// Any HTTP response, including 4xx/5xx, is `Ok(status)`; `Err` is reserved
/// for requests that never produced one. Implementations must give up once
/// `request.timeout` has elapsed.
pub trait Transport: Send + Sync {
    fn post(&self, request: &IntakeRequest<'_>) -> Result<u16, TransportError>;
}

/// Blocking HTTP transport backed by a shared `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn post(&self, request: &IntakeRequest<'_>) -> Result<u16, TransportError> {
        let result = self
            .agent
            .post(request.endpoint)
            .timeout(request.timeout)
            .set("Content-Type", "application/json")
            .set("User-Agent", request.user_agent)
            .send_bytes(request.body);

        match result {
            Ok(resp) => Ok(resp.status()),
            Err(ureq::Error::Status(status, _resp)) => Ok(status),
            Err(ureq::Error::Transport(e)) if is_timeout(&e) => {
                Err(TransportError::Timeout(request.timeout))
            }
            Err(ureq::Error::Transport(e)) => Err(TransportError::Network(e.to_string())),
        }
    }
}

fn is_timeout(err: &ureq::Transport) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(io_err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                return true;
            }
        }
        source = e.source();
    }
    false
}

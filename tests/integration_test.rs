use siteline::{
    IntakeRequest, Integration, IntegrationConfig, Proxy, SanitizedEvent, SdkIdentity, Transport,
    TransportError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const KEY: &str = "siteline_secret_abc";

/// Forwards every sent event to the test thread.
struct ChannelTransport {
    tx: Mutex<Sender<SanitizedEvent>>,
}

impl Transport for ChannelTransport {
    fn post(&self, request: &IntakeRequest<'_>) -> Result<u16, TransportError> {
        let event: SanitizedEvent = serde_json::from_slice(request.body).unwrap();
        let _ = self.tx.lock().unwrap().send(event);
        Ok(200)
    }
}

/// Never answers within the deadline.
struct HangingTransport;

impl Transport for HangingTransport {
    fn post(&self, request: &IntakeRequest<'_>) -> Result<u16, TransportError> {
        thread::sleep(Duration::from_millis(300));
        Err(TransportError::Timeout(request.timeout))
    }
}

fn channel_transport() -> (Arc<ChannelTransport>, Receiver<SanitizedEvent>) {
    let (tx, rx) = mpsc::channel();
    (Arc::new(ChannelTransport { tx: Mutex::new(tx) }), rx)
}

fn no_env(_: &str) -> Option<String> {
    None
}

fn request(uri: &str) -> http::Request<()> {
    http::Request::builder()
        .method("post")
        .uri(uri)
        .header("host", "example.com")
        .header("user-agent", "Mozilla/5.0")
        .header("referer", "https://google.com/")
        .header("x-forwarded-for", "203.0.113.1, 10.0.0.1")
        .body(())
        .unwrap()
}

#[test]
fn proxy_tracks_and_returns_response_unchanged() {
    let (transport, events) = channel_transport();
    let integration = Integration::new(IntegrationConfig::with_key(KEY))
        .with_env(no_env)
        .with_transport(transport);
    let proxy = Proxy::with_handler(Arc::new(integration), |_req: &http::Request<()>| {
        http::Response::builder()
            .status(404)
            .header("x-custom", "kept")
            .body("not here".to_string())
            .unwrap()
    });

    let resp = proxy.call(&request("/missing?q=1"));
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers()["x-custom"], "kept");
    assert_eq!(resp.body(), "not here");

    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.website_key, KEY);
    assert_eq!(event.url, "http://example.com/missing?q=1");
    assert_eq!(event.method, "POST");
    assert_eq!(event.status, 404);
    assert_eq!(event.user_agent.as_deref(), Some("Mozilla/5.0"));
    assert_eq!(event.referrer.as_deref(), Some("https://google.com/"));
    assert_eq!(event.ip.as_deref(), Some("203.0.113.1"));
    assert_eq!(event.integration_type, "http");
}

#[test]
fn pass_through_proxy_returns_default_response() {
    let (transport, events) = channel_transport();
    let integration = Integration::new(IntegrationConfig::with_key(KEY))
        .with_env(no_env)
        .with_transport(transport);
    let proxy = Proxy::new(Arc::new(integration));

    let resp: http::Response<String> = proxy.call(&request("https://example.com/"));
    assert_eq!(resp.status(), 200);
    assert!(resp.body().is_empty());

    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.url, "https://example.com/");
    assert_eq!(event.status, 200);
}

#[test]
fn proxy_duration_covers_handler() {
    let (transport, events) = channel_transport();
    let integration = Integration::new(IntegrationConfig::with_key(KEY))
        .with_env(no_env)
        .with_transport(transport);
    let proxy = Proxy::with_handler(Arc::new(integration), |_req: &http::Request<()>| {
        thread::sleep(Duration::from_millis(30));
        http::Response::new(())
    });

    proxy.call(&request("/slow"));

    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(event.duration >= 30, "duration was {}", event.duration);
}

#[test]
fn tracking_does_not_delay_response() {
    let integration = Integration::new(IntegrationConfig::with_key(KEY))
        .with_env(no_env)
        .with_transport(Arc::new(HangingTransport));
    let proxy = Proxy::with_handler(Arc::new(integration), |_req: &http::Request<()>| {
        http::Response::new(())
    });

    // Warm up so initialization is not part of the measurement
    proxy.call(&request("/warmup"));

    let start = Instant::now();
    for _ in 0..5 {
        proxy.call(&request("/fast"));
    }
    assert!(start.elapsed() < Duration::from_millis(300));
}

#[test]
fn missing_key_disables_tracking() {
    let (transport, events) = channel_transport();
    let integration = Arc::new(
        Integration::from_env()
            .with_env(no_env)
            .with_transport(transport),
    );
    let proxy = Proxy::with_handler(Arc::clone(&integration), |_req: &http::Request<()>| {
        http::Response::builder().status(201).body(()).unwrap()
    });

    let resp = proxy.call(&request("/"));
    assert_eq!(resp.status(), 201);
    assert!(integration.is_initialized());
    assert!(integration.tracker().is_none());
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn invalid_key_disables_tracking_without_failing_requests() {
    let (transport, events) = channel_transport();
    let integration = Arc::new(
        Integration::new(IntegrationConfig::with_key("not_a_site_key"))
            .with_env(no_env)
            .with_transport(transport),
    );
    let proxy = Proxy::with_handler(Arc::clone(&integration), |_req: &http::Request<()>| {
        http::Response::new("ok")
    });

    assert_eq!(*proxy.call(&request("/")).body(), "ok");
    assert_eq!(*proxy.call(&request("/again")).body(), "ok");
    assert!(integration.tracker().is_none());
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn env_supplies_key_and_debug() {
    let (transport, events) = channel_transport();
    let integration = Integration::from_env()
        .with_env(|name| match name {
            "SITELINE_WEBSITE_KEY" => Some("gptrends_secret_env".to_string()),
            "SITELINE_DEBUG" => Some("true".to_string()),
            _ => None,
        })
        .with_transport(transport);

    let tracker = integration.tracker().unwrap();
    assert!(tracker.debug());
    assert_eq!(
        tracker.endpoint(),
        siteline::constants::DEFAULT_ENDPOINT
    );

    let proxy = Proxy::new(Arc::new(integration));
    let _: http::Response<()> = proxy.call(&request("/"));
    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.website_key, "gptrends_secret_env");
}

#[test]
fn initializes_once_under_concurrency() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&lookups);
    let (transport, _events) = channel_transport();
    let integration = Arc::new(
        Integration::from_env()
            .with_env(move |name| {
                if name == "SITELINE_WEBSITE_KEY" {
                    counter.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    return Some(KEY.to_string());
                }
                None
            })
            .with_transport(transport),
    );
    assert!(!integration.is_initialized());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let integration = Arc::clone(&integration);
            thread::spawn(move || {
                let tracker = integration.tracker().unwrap();
                Arc::as_ptr(tracker) as usize
            })
        })
        .collect();
    let ptrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(lookups.load(Ordering::SeqCst), 1);
    assert!(ptrs.windows(2).all(|w| w[0] == w[1]));
    assert!(integration.is_initialized());
}

#[test]
fn custom_identity_is_reported() {
    let (transport, events) = channel_transport();
    let integration = Integration::new(IntegrationConfig::with_key(KEY))
        .with_env(no_env)
        .with_identity(SdkIdentity::for_integration("custom-host"))
        .with_transport(transport);
    assert_eq!(integration.identity().integration_type, "custom-host");

    let proxy = Proxy::new(Arc::new(integration));
    let _: http::Response<()> = proxy.call(&request("/"));

    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.integration_type, "custom-host");
}

#[test]
fn begin_and_complete_without_proxy() {
    let (transport, events) = channel_transport();
    let integration = Integration::new(IntegrationConfig::with_key(KEY))
        .with_env(no_env)
        .with_transport(transport);

    let headers = std::collections::HashMap::from([("x-real-ip", "198.51.100.7")]);
    let pending = integration
        .begin(Instant::now(), "https://example.com/a", "get", &headers)
        .unwrap();
    assert_eq!(pending.data().ip.as_deref(), Some("198.51.100.7"));
    assert!(pending.data().user_agent.is_none());

    integration.complete(pending, 302);

    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.status, 302);
    assert_eq!(event.method, "GET");
    assert!(event.user_agent.is_none());
}

#[test]
fn shutdown_flushes_pending_events() {
    let (transport, events) = channel_transport();
    let integration = Integration::new(IntegrationConfig::with_key(KEY))
        .with_env(no_env)
        .with_transport(transport);

    for i in 0..3 {
        let pending = integration
            .begin(Instant::now(), format!("https://example.com/{i}"), "GET", &http::HeaderMap::new())
            .unwrap();
        integration.complete(pending, 200);
    }
    integration.shutdown();

    assert_eq!(events.try_iter().count(), 3);
}

#[test]
fn dropping_integration_does_not_wait_for_queue() {
    let integration = Integration::new(IntegrationConfig::with_key(KEY))
        .with_env(no_env)
        .with_transport(Arc::new(HangingTransport));

    for i in 0..20 {
        let pending = integration
            .begin(Instant::now(), format!("https://example.com/{i}"), "GET", &http::HeaderMap::new())
            .unwrap();
        integration.complete(pending, 200);
    }

    let start = Instant::now();
    drop(integration);
    assert!(start.elapsed() < Duration::from_millis(200), "took {:?}", start.elapsed());
}

#[test]
fn first_duration_excludes_initialization() {
    let (transport, events) = channel_transport();
    let integration = Integration::from_env()
        .with_env(|name| {
            if name == "SITELINE_WEBSITE_KEY" {
                thread::sleep(Duration::from_millis(150));
                return Some(KEY.to_string());
            }
            None
        })
        .with_transport(transport);
    let proxy = Proxy::with_handler(Arc::new(integration), |_req: &http::Request<()>| {
        http::Response::new(())
    });

    proxy.call(&request("/first"));

    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(event.duration < 150, "duration was {}", event.duration);
}

#[test]
fn proxy_reports_utf8_user_agent() {
    let (transport, events) = channel_transport();
    let integration = Integration::new(IntegrationConfig::with_key(KEY))
        .with_env(no_env)
        .with_transport(transport);
    let proxy = Proxy::new(Arc::new(integration));

    let mut req = request("/");
    req.headers_mut().insert(
        "user-agent",
        http::HeaderValue::from_bytes("Mozilla/5.0 (Überbrowser)".as_bytes()).unwrap(),
    );
    let _: http::Response<()> = proxy.call(&req);

    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.user_agent.as_deref(), Some("Mozilla/5.0 (Überbrowser)"));
}

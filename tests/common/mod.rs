#![allow(dead_code)]

use async_trait::async_trait;
use gatewire::error::TransportError;
use gatewire::rest::{HttpRequest, HttpResponse, Transport};
use gatewire::{Client, ClientConfig, ManualClock, TrackingSleeper};
use http::{HeaderName, HeaderValue, StatusCode};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;

/// Epoch millis every test clock starts at.
pub const T0: u64 = 1_700_000_000_000;

type Scripted = Result<HttpResponse, TransportError>;

/// Transport that answers from a script, then with `200 {}` once the script runs out.
/// Clones share the script and the call log.
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<Mutex<Vec<HttpRequest>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call open for `latency` (tokio time, so pause the runtime).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push(&self, response: HttpResponse) -> &Self {
        self.script.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn push_json(&self, status: StatusCode, body: JsonValue) -> &Self {
        self.push(HttpResponse::json(status, &body))
    }

    pub fn push_err(&self, err: TransportError) -> &Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(request);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        next.unwrap_or_else(|| Ok(HttpResponse::json(StatusCode::OK, &serde_json::json!({}))))
    }
}

/// Response with rate-limit (or any other) headers.
pub fn with_headers(mut response: HttpResponse, pairs: &[(&str, &str)]) -> HttpResponse {
    for (k, v) in pairs {
        response
            .headers
            .insert(HeaderName::from_bytes(k.as_bytes()).unwrap(), HeaderValue::from_str(v).unwrap());
    }
    response
}

pub fn too_many_requests(retry_after_secs: &str, global: bool) -> HttpResponse {
    let mut pairs = vec![("Retry-After", retry_after_secs)];
    if global {
        pairs.push(("X-RateLimit-Global", "true"));
    }
    with_headers(
        HttpResponse::json(StatusCode::TOO_MANY_REQUESTS, &serde_json::json!({"message": "slow down"})),
        &pairs,
    )
}

pub struct Harness {
    pub client: Client,
    pub transport: MockTransport,
    pub clock: ManualClock,
    pub sleeper: TrackingSleeper,
}

/// Client on a manual clock whose limiter waits advance that clock instead of sleeping.
pub fn harness() -> Harness {
    harness_with(MockTransport::new(), |b| b)
}

pub fn harness_with(
    transport: MockTransport,
    configure: impl FnOnce(gatewire::ClientConfigBuilder) -> gatewire::ClientConfigBuilder,
) -> Harness {
    let clock = ManualClock::new(T0);
    let sleeper = TrackingSleeper::advancing(clock.clone());
    let builder = ClientConfig::builder("test-token")
        .api_base("https://api.test/v10")
        .with_clock(clock.clone())
        .with_sleeper(sleeper.clone());
    let config = configure(builder).build().unwrap();
    let client = Client::new(config, transport.clone());
    Harness { client, transport, clock, sleeper }
}

#[derive(Clone)]
pub struct SharedWriter(pub Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedGuard;
    fn make_writer(&'a self) -> Self::Writer {
        SharedGuard(self.0.clone())
    }
}

pub struct SharedGuard(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Install a capturing subscriber for the current thread; read the buffer for log lines.
pub fn capture_logs() -> (Arc<Mutex<Vec<u8>>>, tracing::subscriber::DefaultGuard) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_writer(BoxMakeWriter::new(SharedWriter(buffer.clone())))
        .with_target(true)
        .with_max_level(tracing::Level::DEBUG)
        .without_time()
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

pub fn logs(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
}

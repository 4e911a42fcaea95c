use std::sync::Once;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nimbus::request::PreparedRequest;
use nimbus::transport::{RawResponse, Transport, TransportError};
use nimbus::Config;

static TRACING_INITIALIZED: Once = Once::new();

// Help function to add tracing to tests
// Note: This is safe to use for multiple tests, but since tests are run concurrently the
// output may be interleaved
#[allow(dead_code)]
pub fn enable_tracing() {
    TRACING_INITIALIZED.call_once(|| {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "nimbus=trace".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}

#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        access_key: "ak".to_string(),
        secret_key: "sk".to_string(),
        bucket: "photos".to_string(),
        ..Config::default()
    }
}

/// Scripted stand-in for the HTTP transport. Records every prepared request
/// it sees.
#[allow(dead_code)]
pub enum Behavior {
    /// Every dispatch fails at the connection level.
    FailAll,
    /// Connection-level failure everywhere except the named host, which
    /// answers 200 with a JSON body.
    SucceedOn(String),
    /// Every dispatch completes with the given status/content-type/body.
    Respond(u16, String, Vec<u8>),
}

pub struct MockTransport {
    behavior: Behavior,
    pub requests: Mutex<Vec<PreparedRequest>>,
}

impl MockTransport {
    #[allow(dead_code)]
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn hosts_seen(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter_map(|req| req.url.host_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn perform(&self, req: PreparedRequest) -> Result<RawResponse, TransportError> {
        let host = req.url.host_str().map(str::to_string);
        self.requests.lock().push(req);

        match &self.behavior {
            Behavior::FailAll => Err(TransportError {
                message: "connection refused".to_string(),
            }),
            Behavior::SucceedOn(target) => {
                if host.as_deref() == Some(target.as_str()) {
                    Ok(RawResponse {
                        status: 200,
                        content_type: "application/json".to_string(),
                        body: br#"{"ok":true}"#.to_vec(),
                    })
                } else {
                    Err(TransportError {
                        message: format!("no route to {}", host.unwrap_or_default()),
                    })
                }
            }
            Behavior::Respond(status, content_type, body) => Ok(RawResponse {
                status: *status,
                content_type: content_type.clone(),
                body: body.clone(),
            }),
        }
    }
}

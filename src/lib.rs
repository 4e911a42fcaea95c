pub mod affinity;
pub mod auth;
pub mod error;
pub mod executor;
pub mod fileop;
pub mod request;
pub mod response;
pub mod service;
pub mod token;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::affinity::{AffinityStore, FileAffinityStore};
use crate::auth::Signer;
use crate::transport::{HttpTransport, Transport};

pub use crate::auth::{urlsafe_encode, AuthScheme, Credentials, MacAlgorithm};
pub use crate::error::{Error, Result};
pub use crate::executor::Executor;
pub use crate::request::{FormEncoding, Params, RequestSpec};
pub use crate::response::{NormalizedBody, ResponseEnvelope};
pub use crate::service::{BatchEntry, CallResult, Service};
pub use crate::token::TokenIssuer;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub rs_host: String,
    pub io_host: String,
    pub up_host: String,
    pub timeout_ms: u64,
    /// Accept any TLS certificate. The single trust toggle; anything finer
    /// belongs to the deployment.
    pub insecure_skip_verify: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            rs_host: "http://rs.nimbus.dev".to_string(),
            io_host: "http://io.nimbus.dev".to_string(),
            up_host: "http://up.nimbus.dev".to_string(),
            timeout_ms: 30_000,
            insecure_skip_verify: false,
        }
    }
}

pub fn read_config(config_path: &str) -> Result<Config> {
    let content = std::fs::read_to_string(config_path)
        .map_err(|err| Error::Configuration(format!("cannot read {config_path}: {err}")))?;
    toml::from_str(&content)
        .map_err(|err| Error::Configuration(format!("cannot parse {config_path}: {err}")))
}

/// Entry point: owns the executor, the token issuer, and the configuration.
pub struct Client {
    config: Config,
    executor: Executor,
    issuer: TokenIssuer,
}

impl Client {
    /// Production wiring: pooled HTTP transport and the file-backed affinity
    /// store.
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(
            Duration::from_millis(config.timeout_ms),
            config.insecure_skip_verify,
        )?);
        Ok(Self::with_parts(config, transport, Arc::new(FileAffinityStore::new())))
    }

    /// Custom wiring, used by tests to substitute scripted transports and an
    /// in-memory affinity store.
    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        affinity: Arc<dyn AffinityStore>,
    ) -> Self {
        let credentials = Credentials {
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        };
        Self {
            executor: Executor::new(Signer::new(credentials.clone()), transport, affinity),
            issuer: TokenIssuer::new(credentials),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sign and dispatch one request, rotating hosts on transport failure.
    pub async fn execute(
        &self,
        spec: RequestSpec,
        scheme: &AuthScheme,
    ) -> Result<ResponseEnvelope> {
        self.executor.execute(spec, scheme).await
    }

    /// Mint an upload token for anonymous upload flows.
    pub fn upload_token(&self, params: Map<String, Value>) -> Result<String> {
        self.issuer.issue(params)
    }

    /// Resource-storage endpoints bound to the configured bucket.
    pub fn storage(&self) -> Service<'_> {
        Service::new(self, self.config.bucket.clone())
    }

    /// Resource-storage endpoints bound to another bucket.
    pub fn storage_for(&self, bucket: impl Into<String>) -> Service<'_> {
        Service::new(self, bucket)
    }
}

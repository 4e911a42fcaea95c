use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::error::Error;
use crate::request::{PartSource, PreparedBody, PreparedRequest};

/// Connection-level failure: DNS, connect, TLS, or timeout. A received HTTP
/// error status is never a `TransportError`.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// Raw result of one dispatch, before normalization.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// The "perform one HTTP request" capability the executor consumes. Tests
/// substitute scripted implementations.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, req: PreparedRequest) -> Result<RawResponse, TransportError>;
}

/// Production transport backed by a pooled reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|err| Error::Configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform(&self, req: PreparedRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self.client.request(req.method.clone(), req.url.clone());
        for (key, value) in &req.headers {
            builder = builder.header(key, value);
        }

        builder = match req.body {
            PreparedBody::Empty => builder,
            PreparedBody::Raw(bytes) => builder.body(bytes),
            PreparedBody::UrlEncoded(bytes) => builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(bytes),
            PreparedBody::Multipart(parts) => {
                let mut form = reqwest::multipart::Form::new();
                for (name, source) in parts {
                    form = match source {
                        PartSource::Text(value) => form.text(name, value),
                        PartSource::File(path) => {
                            let bytes = tokio::fs::read(&path).await.map_err(|err| {
                                TransportError {
                                    message: format!("failed to read {}: {err}", path.display()),
                                }
                            })?;
                            let file_name = path
                                .file_name()
                                .map(|name| name.to_string_lossy().into_owned())
                                .unwrap_or_else(|| "file".to_string());
                            form.part(
                                name,
                                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
                            )
                        }
                    };
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = if req.fetch_body {
            match response.bytes().await {
                Ok(bytes) => bytes.to_vec(),
                Err(err) => {
                    tracing::error!("error reading response body: {}", err);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

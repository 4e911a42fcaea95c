use std::sync::Arc;

use url::Url;

use crate::affinity::{AffinityStore, HostRotation};
use crate::auth::{AuthScheme, Signer};
use crate::error::{Error, Result};
use crate::request::{prepare, RequestSpec};
use crate::response::{normalize, ResponseEnvelope};
use crate::transport::Transport;

// One initial dispatch plus up to two retries on alternate hosts.
const MAX_ATTEMPTS: usize = 3;

/// Builds, signs, and dispatches a request, rotating through numbered host
/// variants on connection-level failure.
///
/// Only transport failures rotate: the numbered hosts are interchangeable
/// edge replicas, so a DNS or connect error on one justifies trying the next.
/// An HTTP error status means the service answered and is returned to the
/// caller unchanged.
pub struct Executor {
    signer: Signer,
    transport: Arc<dyn Transport>,
    affinity: Arc<dyn AffinityStore>,
}

impl Executor {
    pub fn new(
        signer: Signer,
        transport: Arc<dyn Transport>,
        affinity: Arc<dyn AffinityStore>,
    ) -> Self {
        Self {
            signer,
            transport,
            affinity,
        }
    }

    pub async fn execute(
        &self,
        mut spec: RequestSpec,
        scheme: &AuthScheme,
    ) -> Result<ResponseEnvelope> {
        let mut rotation = HostRotation::derive(&spec.url)
            .ok_or_else(|| Error::InvalidArgument(format!("URL has no host: {}", spec.url)))?;

        // A prior failover may have left a hint of the variant that works.
        if let Some(host) = self.affinity.get(rotation.prefix()) {
            tracing::debug!("affinity record for {}: {}", rotation.prefix(), &host);
            set_host(&mut spec.url, &host)?;
        }

        let mut attempt = 0;
        loop {
            self.signer.authorize(scheme, &mut spec)?;
            let prepared = prepare(&spec);

            match self.transport.perform(prepared).await {
                Ok(raw) => {
                    tracing::debug!("{} {} -> {}", spec.method, &spec.url, raw.status);

                    if attempt > 0 {
                        if let Some(host) = spec.url.host_str() {
                            self.affinity.put(rotation.prefix(), host);
                        }
                    }

                    return Ok(normalize(raw));
                }
                Err(err) => {
                    attempt += 1;
                    rotation.advance();

                    if attempt >= MAX_ATTEMPTS {
                        tracing::error!("host rotation exhausted for {}: {}", &spec.url, err);
                        return Err(Error::Transport {
                            attempts: attempt,
                            source: err,
                        });
                    }

                    let next = rotation.hostname();
                    tracing::warn!(
                        "transport failure on {} (attempt {}), retrying via {}: {}",
                        &spec.url,
                        attempt,
                        &next,
                        err
                    );
                    set_host(&mut spec.url, &next)?;
                }
            }
        }
    }
}

fn set_host(url: &mut Url, host: &str) -> Result<()> {
    url.set_host(Some(host))
        .map_err(|err| Error::InvalidArgument(format!("invalid hostname {host}: {err}")))
}

use serde_json::{Map, Value};

use crate::auth::{hmac_sha1, unix_now, urlsafe_encode, Credentials};
use crate::error::{Error, Result};

pub const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Issues short-lived signed upload tokens for anonymous upload flows.
///
/// Independent of the per-request signer: a token is minted once and handed
/// to an untrusted uploader, who presents it with each upload.
pub struct TokenIssuer {
    credentials: Credentials,
}

impl TokenIssuer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Build an `id:signature:payload` token from a parameter mapping.
    ///
    /// `expiresIn` is taken from the mapping (default 3600 seconds). The
    /// signed payload carries the absolute `deadline` instead; the emitted
    /// payload keeps `expiresIn` and never exposes the deadline.
    pub fn issue(&self, params: Map<String, Value>) -> Result<String> {
        if self.credentials.secret_key.is_empty() {
            return Err(Error::Configuration(
                "token issuance requires a secret key".to_string(),
            ));
        }

        let mut signed = params;
        let expires_in = match signed.remove("expiresIn") {
            Some(value) => value.as_u64().ok_or_else(|| {
                Error::InvalidArgument("expiresIn must be a non-negative integer".to_string())
            })?,
            None => DEFAULT_EXPIRES_IN,
        };

        let mut public = signed.clone();
        signed.insert("deadline".to_string(), Value::from(unix_now() + expires_in));
        public.insert("expiresIn".to_string(), Value::from(expires_in));

        let signing_payload = urlsafe_encode(encode_json(&signed)?);
        let digest = hmac_sha1(
            self.credentials.secret_key.as_bytes(),
            signing_payload.as_bytes(),
        );

        Ok(format!(
            "{}:{}:{}",
            self.credentials.access_key,
            urlsafe_encode(digest),
            urlsafe_encode(encode_json(&public)?)
        ))
    }
}

fn encode_json(map: &Map<String, Value>) -> Result<Vec<u8>> {
    serde_json::to_vec(map)
        .map_err(|err| Error::InvalidArgument(format!("unencodable token parameters: {err}")))
}

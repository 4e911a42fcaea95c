use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Method;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use url::form_urlencoded;

use crate::error::{Error, Result};
use crate::request::{Params, RequestSpec};

/// Process-lifetime API credentials, supplied at startup and never mutated.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

/// HMAC algorithm used by the MAC scheme.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MacAlgorithm {
    Sha1,
    Sha256,
}

/// The closed set of authentication schemes. Each request is associated with
/// exactly one scheme at construction time; unknown schemes cannot be
/// represented.
#[derive(Clone, Debug)]
pub enum AuthScheme {
    /// No authorization at all (anonymous upload endpoints).
    Anonymous,
    /// Inject `access_token=<token>` into the parameter mapping.
    TokenInUrl { token: String },
    /// `Authorization: Bearer <token>`, no signing computation.
    Bearer { token: String },
    /// `Authorization: OAuth <token>`, no signing computation.
    OAuth { token: String },
    /// HMAC-SHA1 over path, query, and urlencoded body, keyed by the
    /// credential secret. Deterministic for identical inputs.
    QBox,
    /// MAC-style signature with a fresh timestamp and nonce per call.
    Mac {
        token: String,
        secret: String,
        algorithm: MacAlgorithm,
    },
}

/// Produces the `Authorization` header (or URL parameter) for a request.
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Inject authorization into the spec per the scheme. Safe to call again
    /// on the same spec: header and parameter injection replace prior values.
    pub fn authorize(&self, scheme: &AuthScheme, spec: &mut RequestSpec) -> Result<()> {
        match scheme {
            AuthScheme::Anonymous => Ok(()),
            AuthScheme::TokenInUrl { token } => match &spec.params {
                Params::Raw(_) | Params::Binary(_) => Err(Error::InvalidArgument(
                    "token-in-url auth requires mapping parameters".to_string(),
                )),
                _ => spec.params.set("access_token", token.clone()),
            },
            AuthScheme::Bearer { token } => {
                spec.set_header("Authorization", format!("Bearer {token}"));
                Ok(())
            }
            AuthScheme::OAuth { token } => {
                spec.set_header("Authorization", format!("OAuth {token}"));
                Ok(())
            }
            AuthScheme::QBox => {
                let signature = self.qbox_signature(spec)?;
                spec.set_header("Authorization", format!("QBox {signature}"));
                Ok(())
            }
            AuthScheme::Mac {
                token,
                secret,
                algorithm,
            } => {
                let signature = mac_signature(token, secret, *algorithm, spec)?;
                spec.set_header("Authorization", format!("MAC {signature}"));
                Ok(())
            }
        }
    }

    /// Canonical string: `path[?query]` + newline + urlencoded parameters.
    /// No timestamp or nonce, so identical inputs sign identically.
    fn qbox_signature(&self, spec: &RequestSpec) -> Result<String> {
        if self.credentials.secret_key.is_empty() {
            return Err(Error::Configuration(
                "qbox signing requires a secret key".to_string(),
            ));
        }

        let mut data = spec.url.path().as_bytes().to_vec();
        if let Some(query) = spec.url.query() {
            data.push(b'?');
            data.extend_from_slice(query.as_bytes());
        }
        data.push(b'\n');
        if !spec.params.is_empty() {
            data.extend_from_slice(&spec.params.urlencoded());
        }

        let digest = hmac_sha1(self.credentials.secret_key.as_bytes(), &data);
        Ok(format!(
            "{}:{}",
            self.credentials.access_key,
            URL_SAFE.encode(digest)
        ))
    }
}

fn mac_signature(
    token: &str,
    secret: &str,
    algorithm: MacAlgorithm,
    spec: &RequestSpec,
) -> Result<String> {
    if secret.is_empty() {
        return Err(Error::Configuration(
            "mac signing requires a secret".to_string(),
        ));
    }

    let host = spec
        .url
        .host_str()
        .ok_or_else(|| Error::InvalidArgument(format!("URL has no host: {}", spec.url)))?;
    let port = spec
        .url
        .port()
        .unwrap_or(if spec.url.scheme() == "https" { 443 } else { 80 });

    let timestamp = unix_now();
    let nonce = fresh_nonce();

    let mut body_hash = String::new();
    let mut query_lines: Vec<String> = Vec::new();
    if spec.method == Method::POST || spec.method == Method::PUT {
        let body = spec.params.urlencoded();
        if !body.is_empty() {
            body_hash = STANDARD.encode(algorithm.hex_digest(&body));
        }
    } else {
        for (key, value) in query_pairs(&spec.params) {
            query_lines.push(format!("{}={}", rawurlencode(&key), rawurlencode(&value)));
        }
        query_lines.sort();
    }

    let canonical = format!(
        "{token}\n{timestamp}\n{nonce}\n{body_hash}\n{}\n{host}\n{port}\n{}\n{}",
        spec.method,
        spec.url.path(),
        query_lines.join("\n"),
    );
    let signature = STANDARD.encode(algorithm.hex_hmac(secret.as_bytes(), canonical.as_bytes()));

    Ok(format!(
        r#"token="{token}", timestamp="{timestamp}", nonce="{nonce}", signature="{signature}""#
    ))
}

fn query_pairs(params: &Params) -> Vec<(String, String)> {
    match params {
        Params::None => Vec::new(),
        Params::Form(pairs) => pairs.clone(),
        Params::Raw(bytes) => form_urlencoded::parse(bytes)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        Params::Binary(_) => Vec::new(),
    }
}

impl MacAlgorithm {
    /// Lowercase hex digest of the input.
    fn hex_digest(&self, data: &[u8]) -> String {
        match self {
            MacAlgorithm::Sha1 => hex::encode(Sha1::digest(data)),
            MacAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        }
    }

    /// Lowercase hex rendering of the keyed digest.
    fn hex_hmac(&self, key: &[u8], data: &[u8]) -> String {
        match self {
            MacAlgorithm::Sha1 => hex::encode(hmac_sha1(key, data)),
            MacAlgorithm::Sha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(key)
                    .expect("HMAC accepts keys of any length");
                mac.update(data);
                hex::encode(mac.finalize().into_bytes())
            }
        }
    }
}

pub(crate) fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// URL-safe base64 with the `-`/`_` alphabet, used for entry URIs, signature
/// digests, and token payloads.
pub fn urlsafe_encode<T: AsRef<[u8]>>(data: T) -> String {
    URL_SAFE.encode(data)
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn fresh_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

// RFC 3986 unreserved characters stay literal, everything else is
// percent-encoded.
const RAW_URL: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn rawurlencode(input: &str) -> String {
    utf8_percent_encode(input, RAW_URL).to_string()
}

use std::path::PathBuf;

use reqwest::Method;
use url::form_urlencoded;
use url::Url;

use crate::error::{Error, Result};

/// How a POST/PUT parameter mapping is put on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FormEncoding {
    /// Serialize the mapping as `application/x-www-form-urlencoded`.
    UrlEncoded,
    /// Keep the mapping keyed so the transport encodes `multipart/form-data`.
    /// Required when a parameter is a file attachment.
    Multipart,
}

/// Request parameters: an ordered mapping, a raw pre-encoded parameter
/// string, an opaque binary body, or nothing.
///
/// `Raw` is a parameter string the caller already encoded (batch op lists);
/// it takes part in signing like a mapping would. `Binary` is an upload
/// payload: it goes on the wire as-is and is opaque to signing.
#[derive(Clone, Debug)]
pub enum Params {
    None,
    Form(Vec<(String, String)>),
    Raw(Vec<u8>),
    Binary(Vec<u8>),
}

impl Params {
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Form(pairs) => pairs.is_empty(),
            Params::Raw(body) => body.is_empty(),
            Params::Binary(body) => body.is_empty(),
        }
    }

    /// Insert or replace a key in the mapping form. Raw and binary bodies
    /// cannot take injected parameters.
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        match self {
            Params::None => {
                *self = Params::Form(vec![(key.to_string(), value)]);
                Ok(())
            }
            Params::Form(pairs) => {
                if let Some(pair) = pairs.iter_mut().find(|(k, _)| k == key) {
                    pair.1 = value;
                } else {
                    pairs.push((key.to_string(), value));
                }
                Ok(())
            }
            Params::Raw(_) | Params::Binary(_) => Err(Error::InvalidArgument(format!(
                "cannot inject parameter {key} into a raw request body"
            ))),
        }
    }

    /// The signable `application/x-www-form-urlencoded` rendering of the
    /// parameters. Raw parameter strings pass through unchanged; binary
    /// bodies render empty because they are not signed.
    pub fn urlencoded(&self) -> Vec<u8> {
        match self {
            Params::None => Vec::new(),
            Params::Form(pairs) => {
                let mut ser = form_urlencoded::Serializer::new(String::new());
                for (k, v) in pairs {
                    ser.append_pair(k, v);
                }
                ser.finish().into_bytes()
            }
            Params::Raw(body) => body.clone(),
            Params::Binary(_) => Vec::new(),
        }
    }
}

/// One request as the caller describes it. The signer may inject a header or
/// parameter and host rotation may rewrite the URL host; nothing else mutates
/// a spec once dispatch begins.
#[derive(Clone, Debug)]
pub struct RequestSpec {
    pub url: Url,
    pub method: Method,
    pub params: Params,
    pub headers: Vec<(String, String)>,
    pub encoding: FormEncoding,
}

impl RequestSpec {
    pub fn new(url: Url, method: Method) -> Self {
        Self {
            url,
            method,
            params: Params::None,
            headers: Vec::new(),
            encoding: FormEncoding::Multipart,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_encoding(mut self, encoding: FormEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set a header, replacing any existing value. Header keys are unique.
    pub fn set_header(&mut self, key: &str, value: String) {
        if let Some(header) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            header.1 = value;
        } else {
            self.headers.push((key.to_string(), value));
        }
    }
}

/// Source of one multipart form part. A mapping value starting with `@` is a
/// local file attachment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PartSource {
    Text(String),
    File(PathBuf),
}

#[derive(Clone, Debug)]
pub enum PreparedBody {
    Empty,
    UrlEncoded(Vec<u8>),
    Raw(Vec<u8>),
    Multipart(Vec<(String, PartSource)>),
}

/// A fully encoded request, ready for the transport layer.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
    pub url: Url,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: PreparedBody,
    /// HEAD suppresses body retrieval.
    pub fetch_body: bool,
}

/// Encode a spec for dispatch: GET/HEAD/DELETE parameters go into the query
/// string, POST/PUT parameters become the body per the form encoding.
pub fn prepare(spec: &RequestSpec) -> PreparedRequest {
    let mut url = spec.url.clone();
    let mut body = PreparedBody::Empty;

    if spec.method == Method::POST || spec.method == Method::PUT {
        match (&spec.params, spec.encoding) {
            (Params::None, _) => {}
            (Params::Raw(bytes), FormEncoding::UrlEncoded) => {
                body = PreparedBody::UrlEncoded(bytes.clone());
            }
            (Params::Raw(bytes), FormEncoding::Multipart) => {
                body = PreparedBody::Raw(bytes.clone());
            }
            (Params::Binary(bytes), _) => body = PreparedBody::Raw(bytes.clone()),
            (Params::Form(_), FormEncoding::UrlEncoded) => {
                body = PreparedBody::UrlEncoded(spec.params.urlencoded());
            }
            (Params::Form(pairs), FormEncoding::Multipart) => {
                let parts = pairs
                    .iter()
                    .map(|(k, v)| {
                        let source = match v.strip_prefix('@') {
                            Some(path) => PartSource::File(PathBuf::from(path)),
                            None => PartSource::Text(v.clone()),
                        };
                        (k.clone(), source)
                    })
                    .collect();
                body = PreparedBody::Multipart(parts);
            }
        }
    } else {
        merge_query(&mut url, &spec.params);
    }

    PreparedRequest {
        url,
        method: spec.method.clone(),
        headers: spec.headers.clone(),
        body,
        fetch_body: spec.method != Method::HEAD,
    }
}

fn merge_query(url: &mut Url, params: &Params) {
    match params {
        Params::None => {}
        Params::Form(pairs) => {
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs.iter());
            }
        }
        Params::Raw(bytes) => {
            let raw = String::from_utf8_lossy(bytes);
            if raw.is_empty() {
                return;
            }
            let merged = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{raw}"),
                _ => raw.into_owned(),
            };
            url.set_query(Some(merged.as_str()));
        }
        // binary payloads only make sense as a POST/PUT body
        Params::Binary(_) => {}
    }
}

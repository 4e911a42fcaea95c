use std::path::Path;

use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::auth::{urlsafe_encode, AuthScheme};
use crate::error::{Error, Result};
use crate::fileop::{mogrify_params, ImageMogrify};
use crate::request::{FormEncoding, Params, RequestSpec};
use crate::response::ResponseEnvelope;
use crate::Client;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Outcome of one storage API call: the decoded body on success, or the
/// remote error message, with the HTTP status either way.
#[derive(Debug)]
pub struct CallResult {
    pub value: Option<Value>,
    pub status: u16,
    pub error: Option<String>,
}

impl From<ResponseEnvelope> for CallResult {
    fn from(envelope: ResponseEnvelope) -> Self {
        if envelope.is_success() {
            Self {
                value: envelope.json().cloned(),
                status: envelope.status,
                error: None,
            }
        } else {
            Self {
                value: None,
                status: envelope.status,
                error: Some(envelope.error_message()),
            }
        }
    }
}

/// One entry of a batch download-authorization request.
#[derive(Clone, Debug, Default)]
pub struct BatchEntry {
    pub key: String,
    pub att_name: Option<String>,
    pub expires: Option<u64>,
}

/// Thin wrappers over the resource-storage endpoints. Each method assembles a
/// URL (entry URIs are url-safe base64 of `bucket:key`) and hands it to the
/// executor.
pub struct Service<'a> {
    client: &'a Client,
    bucket: String,
}

impl<'a> Service<'a> {
    pub fn new(client: &'a Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn entry_uri(&self, key: &str) -> String {
        urlsafe_encode(format!("{}:{}", self.bucket, key))
    }

    /// Authorize an anonymous upload: returns a short-lived upload URL.
    pub async fn put_auth(&self) -> Result<CallResult> {
        let url = format!("{}/put-auth/", self.client.config().io_host);
        self.call(&url).await
    }

    /// Download authorization for one entry.
    pub async fn get(&self, key: &str, att_name: &str) -> Result<CallResult> {
        let url = format!(
            "{}/get/{}/attName/{}",
            self.client.config().rs_host,
            self.entry_uri(key),
            urlsafe_encode(att_name)
        );
        self.call(&url).await
    }

    /// Download authorization, valid only while the entry still matches
    /// `base` (conditional fetch for resumable downloads).
    pub async fn get_if_not_modified(
        &self,
        key: &str,
        att_name: &str,
        base: &str,
    ) -> Result<CallResult> {
        let url = format!(
            "{}/get/{}/attName/{}/base/{}",
            self.client.config().rs_host,
            self.entry_uri(key),
            urlsafe_encode(att_name),
            base
        );
        self.call(&url).await
    }

    /// Batch download authorization. The operations travel as a raw
    /// `op=...&op=...` body.
    pub async fn batch_get(&self, entries: &[BatchEntry]) -> Result<CallResult> {
        let mut ops = String::new();
        for entry in entries {
            if !ops.is_empty() {
                ops.push('&');
            }
            ops.push_str("op=/get/");
            ops.push_str(&self.entry_uri(&entry.key));
            if let Some(att_name) = &entry.att_name {
                ops.push_str("/attName/");
                ops.push_str(&urlsafe_encode(att_name));
            }
            if let Some(expires) = entry.expires {
                ops.push_str(&format!("/expires/{expires}"));
            }
        }

        let url = format!("{}/batch", self.client.config().rs_host);
        self.call_with_params(&url, Params::Raw(ops.into_bytes())).await
    }

    /// Fetch an entry's attributes.
    pub async fn stat(&self, key: &str) -> Result<CallResult> {
        let url = format!("{}/stat/{}", self.client.config().rs_host, self.entry_uri(key));
        self.call(&url).await
    }

    pub async fn delete(&self, key: &str) -> Result<CallResult> {
        let url = format!(
            "{}/delete/{}",
            self.client.config().rs_host,
            self.entry_uri(key)
        );
        self.call(&url).await
    }

    /// Publish the bucket's contents as static resources under `domain`.
    pub async fn publish(&self, domain: &str) -> Result<CallResult> {
        let url = format!(
            "{}/publish/{}/from/{}",
            self.client.config().rs_host,
            urlsafe_encode(domain),
            self.bucket
        );
        self.call(&url).await
    }

    pub async fn unpublish(&self, domain: &str) -> Result<CallResult> {
        let url = format!(
            "{}/unpublish/{}",
            self.client.config().rs_host,
            urlsafe_encode(domain)
        );
        self.call(&url).await
    }

    /// Delete the whole bucket. Use with care.
    pub async fn drop_bucket(&self) -> Result<CallResult> {
        let url = format!("{}/drop/{}", self.client.config().rs_host, self.bucket);
        self.call(&url).await
    }

    /// Direct upload of an in-memory payload. The bytes travel verbatim as
    /// an `application/octet-stream` body; the declared mime type rides in
    /// the URL and is excluded from signing along with the body.
    pub async fn put(&self, key: &str, mime_type: &str, data: Vec<u8>) -> Result<CallResult> {
        let url = self.put_url(&self.client.config().io_host, key, mime_type);
        self.dispatch_binary(&url, data).await
    }

    /// Direct upload of a local file's contents. See [`Service::put`].
    pub async fn put_from_file(
        &self,
        key: &str,
        mime_type: &str,
        local_file: &Path,
    ) -> Result<CallResult> {
        let data = tokio::fs::read(local_file).await.map_err(|err| {
            Error::InvalidArgument(format!("cannot read {}: {err}", local_file.display()))
        })?;
        self.put(key, mime_type, data).await
    }

    /// Anonymous upload of a local file through a `put_auth` URL.
    pub async fn put_file(
        &self,
        upload_url: &str,
        key: &str,
        mime_type: &str,
        local_file: &Path,
        custom_meta: Option<&str>,
        callback_params: Option<&str>,
    ) -> Result<CallResult> {
        let params = self.upload_params(key, mime_type, local_file, custom_meta, callback_params);
        self.dispatch_upload(upload_url, params).await
    }

    /// Upload of a local file authorized by an upload token.
    pub async fn upload_file(
        &self,
        up_token: &str,
        key: &str,
        mime_type: &str,
        local_file: &Path,
        custom_meta: Option<&str>,
        callback_params: Option<&str>,
    ) -> Result<CallResult> {
        let mut params =
            self.upload_params(key, mime_type, local_file, custom_meta, callback_params);
        params.push(("auth".to_string(), up_token.to_string()));

        let url = format!("{}/upload", self.client.config().up_host);
        self.dispatch_upload(&url, params).await
    }

    /// Persist a server-side transformed rendition of `source_url` under
    /// `key`.
    pub async fn image_mogrify_as(
        &self,
        key: &str,
        source_url: &str,
        opts: &ImageMogrify,
    ) -> Result<CallResult> {
        let url = format!(
            "{}?{}/save-as/{}",
            source_url,
            mogrify_params(opts),
            self.entry_uri(key)
        );
        self.call(&url).await
    }

    fn upload_params(
        &self,
        key: &str,
        mime_type: &str,
        local_file: &Path,
        custom_meta: Option<&str>,
        callback_params: Option<&str>,
    ) -> Vec<(String, String)> {
        let mime_type = if mime_type.is_empty() {
            DEFAULT_MIME
        } else {
            mime_type
        };

        let mut action = format!(
            "/rs-put/{}/mimeType/{}",
            self.entry_uri(key),
            urlsafe_encode(mime_type)
        );
        if let Some(meta) = custom_meta.filter(|meta| !meta.is_empty()) {
            action.push_str("/meta/");
            action.push_str(&urlsafe_encode(meta));
        }

        let mut params = vec![
            ("action".to_string(), action),
            ("file".to_string(), format!("@{}", local_file.display())),
        ];
        if let Some(callback) = callback_params.filter(|cb| !cb.is_empty()) {
            params.push(("params".to_string(), callback.to_string()));
        }

        params
    }

    fn put_url(&self, host: &str, key: &str, mime_type: &str) -> String {
        let mime_type = if mime_type.is_empty() {
            DEFAULT_MIME
        } else {
            mime_type
        };
        format!(
            "{}/rs-put/{}/mimeType/{}",
            host,
            self.entry_uri(key),
            urlsafe_encode(mime_type)
        )
    }

    async fn dispatch_binary(&self, url: &str, data: Vec<u8>) -> Result<CallResult> {
        let mut spec =
            RequestSpec::new(parse_url(url)?, Method::POST).with_params(Params::Binary(data));
        spec.set_header("Content-Type", DEFAULT_MIME.to_string());

        let envelope = self.client.execute(spec, &AuthScheme::QBox).await?;
        Ok(envelope.into())
    }

    async fn dispatch_upload(
        &self,
        url: &str,
        params: Vec<(String, String)>,
    ) -> Result<CallResult> {
        let spec = RequestSpec::new(parse_url(url)?, Method::POST)
            .with_params(Params::Form(params))
            .with_encoding(FormEncoding::Multipart);

        let envelope = self.client.execute(spec, &AuthScheme::Anonymous).await?;
        Ok(envelope.into())
    }

    async fn call(&self, url: &str) -> Result<CallResult> {
        self.call_with_params(url, Params::None).await
    }

    async fn call_with_params(&self, url: &str, params: Params) -> Result<CallResult> {
        let spec = RequestSpec::new(parse_url(url)?, Method::POST)
            .with_params(params)
            .with_encoding(FormEncoding::UrlEncoded);

        let envelope = self.client.execute(spec, &AuthScheme::QBox).await?;
        Ok(envelope.into())
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|err| Error::InvalidArgument(format!("invalid URL {url}: {err}")))
}

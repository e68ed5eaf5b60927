//! S3-compatible object storage backend (MinIO and friends).
//!
//! # Responsibility
//! - Open an HTTP session against the configured endpoint and make sure the
//!   target bucket exists.
//! - Store and read objects with path-style addressing and SigV4 signing.
//!
//! # Invariants
//! - Bucket preparation is idempotent: an existing bucket, or a create that
//!   reports the bucket already exists, both count as success.
//! - Transport failures map to `StoreError::Unavailable`; rejected requests
//!   map to `StoreError::IoFailure`.

use super::sigv4::{self, Credentials};
use super::{AssetBackend, StoreError, StoreResult};
use crate::config::RemoteStoreConfig;
use crate::model::asset::StoredAsset;
use chrono::Utc;
use log::{debug, info};
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BUCKET_EXISTS_CODES: &[&str] = &["BucketAlreadyOwnedByYou", "BucketAlreadyExists"];

/// Asset backend talking to an S3-compatible object store.
pub struct RemoteAssetBackend {
    config: RemoteStoreConfig,
    client: Option<Client>,
}

impl RemoteAssetBackend {
    pub fn new(config: RemoteStoreConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    /// `Host` header value as the HTTP client sends it (default ports are
    /// omitted).
    fn host_header(&self) -> String {
        let default_port = if self.config.use_ssl { 443 } else { 80 };
        if self.config.port == default_port {
            self.config.host.clone()
        } else {
            format!("{}:{}", self.config.host, self.config.port)
        }
    }

    fn object_path(&self, identifier: Option<&str>) -> String {
        let bucket = sigv4::encode_segment(&self.config.bucket);
        match identifier {
            Some(key) => format!("/{bucket}/{}", sigv4::encode_segment(key)),
            None => format!("/{bucket}"),
        }
    }

    fn send(
        &self,
        method: Method,
        identifier: Option<&str>,
        body: &[u8],
        content_type: Option<&str>,
    ) -> StoreResult<Response> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("no backend session".to_string()))?;

        let path = self.object_path(identifier);
        let signed = sigv4::sign(
            &Credentials {
                access_key: &self.config.access_key,
                secret_key: &self.config.secret_key,
                region: &self.config.region,
            },
            method.as_str(),
            &self.host_header(),
            &path,
            body,
            Utc::now(),
        );

        let mut request = client
            .request(method.clone(), format!("{}{path}", self.config.endpoint()))
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256);
        if let Some(authorization) = signed.authorization {
            request = request.header("authorization", authorization);
        }
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if method == Method::PUT {
            // S3 requires a length on every PUT, empty bucket creates included.
            request = request.header(CONTENT_LENGTH, body.len());
        }

        request
            .body(body.to_vec())
            .send()
            .map_err(|err| StoreError::Unavailable(format!("{}: {err}", self.config.endpoint())))
    }

    fn ensure_bucket(&self) -> StoreResult<()> {
        let bucket = &self.config.bucket;
        let response = self.send(Method::HEAD, None, b"", None)?;
        match response.status() {
            status if status.is_success() => {
                info!("event=bucket_check module=asset status=ok bucket={bucket} exists=true");
                return Ok(());
            }
            StatusCode::NOT_FOUND => {}
            status => {
                return Err(StoreError::Unavailable(format!(
                    "bucket check for `{bucket}` returned {status}"
                )))
            }
        }

        let response = self.send(Method::PUT, None, b"", None)?;
        let status = response.status();
        if status.is_success() {
            info!("event=bucket_create module=asset status=ok bucket={bucket}");
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        if status == StatusCode::CONFLICT && BUCKET_EXISTS_CODES.iter().any(|code| body.contains(code))
        {
            debug!("event=bucket_create module=asset status=ok bucket={bucket} already_exists=true");
            return Ok(());
        }

        Err(StoreError::Unavailable(format!(
            "creating bucket `{bucket}` returned {status}"
        )))
    }
}

impl AssetBackend for RemoteAssetBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn public_prefix(&self) -> &'static str {
        "/img/"
    }

    fn connect(&mut self) -> StoreResult<()> {
        if self.client.is_none() {
            let client = Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|err| StoreError::Unavailable(format!("http client setup: {err}")))?;
            self.client = Some(client);
        }
        self.ensure_bucket()
    }

    fn put(&self, identifier: &str, bytes: &[u8], content_type: &str) -> StoreResult<()> {
        let response = self.send(Method::PUT, Some(identifier), bytes, Some(content_type))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(StoreError::IoFailure(std::io::Error::other(format!(
            "put `{identifier}` returned {status}"
        ))))
    }

    fn get(&self, identifier: &str) -> StoreResult<StoredAsset> {
        let response = self.send(Method::GET, Some(identifier), b"", None)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(identifier.to_string()));
        }
        if !status.is_success() {
            return Err(StoreError::IoFailure(std::io::Error::other(format!(
                "get `{identifier}` returned {status}"
            ))));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .bytes()
            .map_err(|err| StoreError::IoFailure(std::io::Error::other(err)))?;

        Ok(StoredAsset {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

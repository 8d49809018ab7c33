//! The narrow S3-like capability the spec allows the gateway to depend on:
//! `PresignPut`, `PresignGet`, `Delete`, `Exists` (§1). Modeled as a trait
//! so the S3-compatible backend is swappable and test-fakeable, the same
//! way the teacher treats its rate-limit counter store as pluggable
//! (`rate_limit::RateLimiter` vs. a shared backend).

use crate::errors::AppError;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PresignedRequest {
    pub url: String,
    pub method: &'static str,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy)]
pub struct ObjectMeta {
    pub size_bytes: i64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        max_size_bytes: i64,
        ttl: Duration,
    ) -> Result<PresignedRequest, AppError>;

    async fn presign_get(
        &self,
        key: &str,
        download_filename: &str,
        ttl: Duration,
    ) -> Result<PresignedRequest, AppError>;

    async fn exists(&self, key: &str) -> Result<bool, AppError>;

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, AppError>;

    /// Deleting a nonexistent object is success (§4.4 idempotence).
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Production backend: any S3-compatible endpoint via `aws-sdk-s3`.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(bucket: String, endpoint: Option<String>, region: String) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region));
        if let Some(ep) = endpoint.clone() {
            loader = loader.endpoint_url(ep);
        }
        let shared_config = loader.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if endpoint.is_some() {
            // Path-style addressing is required by most self-hosted S3-compatible
            // stores (MinIO, Garage, etc.) when a custom endpoint is configured.
            s3_config_builder = s3_config_builder.force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(s3_config_builder.build());
        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        max_size_bytes: i64,
        ttl: Duration,
    ) -> Result<PresignedRequest, AppError> {
        let presign_config = aws_sdk_s3::presigning::PresigningConfig::expires_in(ttl)
            .map_err(|_| AppError::Internal)?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(max_size_bytes)
            .presigned(presign_config)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key, "failed to presign PUT");
                AppError::Unavailable
            })?;

        Ok(PresignedRequest {
            url: presigned.uri().to_string(),
            method: "PUT",
            headers: presigned
                .headers()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    async fn presign_get(
        &self,
        key: &str,
        download_filename: &str,
        ttl: Duration,
    ) -> Result<PresignedRequest, AppError> {
        let presign_config = aws_sdk_s3::presigning::PresigningConfig::expires_in(ttl)
            .map_err(|_| AppError::Internal)?;
        let disposition = format!("attachment; filename=\"{download_filename}\"");
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_disposition(disposition)
            .presigned(presign_config)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key, "failed to presign GET");
                AppError::Unavailable
            })?;

        Ok(PresignedRequest {
            url: presigned.uri().to_string(),
            method: "GET",
            headers: presigned
                .headers()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|s| s.is_not_found()).unwrap_or(false) => Ok(false),
            Err(e) => {
                tracing::warn!(error = %e, key, "HEAD failed, treating as unavailable");
                Err(AppError::Unavailable)
            }
        }
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, AppError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(out) => Ok(Some(ObjectMeta { size_bytes: out.content_length().unwrap_or(0) })),
            Err(e) if e.as_service_error().map(|s| s.is_not_found()).unwrap_or(false) => Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, key, "HEAD failed");
                Err(AppError::Unavailable)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map(|_| ())
            .or_else(|e| {
                tracing::warn!(error = %e, key, "delete failed, treating as already-gone");
                Ok(())
            })
    }
}

/// Dev/test stand-in used when no S3-compatible endpoint is configured.
/// Presigned URLs route back to this process's own `/__object_store/{key}`
/// routes (see `routes::object_store_stub`) so an `issue_upload` →
/// `PUT` → `finalize_upload` → `issue_download` → `GET` round trip (§8,
/// scenario S1) can be exercised end-to-end without a real bucket.
pub struct InMemoryObjectStore {
    objects: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
    base_url: String,
}

impl InMemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            objects: std::sync::Mutex::new(std::collections::HashMap::new()),
            base_url: base_url.into(),
        }
    }

    pub fn put_bytes(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }

    pub fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn remove_bytes(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn presign_put(
        &self,
        key: &str,
        _content_type: &str,
        _max_size_bytes: i64,
        _ttl: Duration,
    ) -> Result<PresignedRequest, AppError> {
        Ok(PresignedRequest {
            url: format!("{}/__object_store/{}", self.base_url, urlencode(key)),
            method: "PUT",
            headers: vec![],
        })
    }

    async fn presign_get(
        &self,
        key: &str,
        download_filename: &str,
        _ttl: Duration,
    ) -> Result<PresignedRequest, AppError> {
        Ok(PresignedRequest {
            url: format!(
                "{}/__object_store/{}?filename={}",
                self.base_url,
                urlencode(key),
                urlencode(download_filename)
            ),
            method: "GET",
            headers: vec![],
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, AppError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .map(|b| ObjectMeta { size_bytes: b.len() as i64 }))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

fn urlencode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

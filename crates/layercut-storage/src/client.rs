//! S3 client implementation.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// How long presigned upload targets stay valid.
const UPLOAD_TARGET_TTL: Duration = Duration::from_secs(3600);

/// Configuration for the storage client.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Custom S3 API endpoint (left unset for AWS itself)
    pub endpoint_url: Option<String>,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region
    pub region: String,
    /// CDN base URL the bucket is served through (no trailing slash)
    pub cdn_base_url: String,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok(),
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("S3_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("S3_BUCKET_NAME not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            cdn_base_url: std::env::var("CDN_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .map_err(|_| StorageError::config_error("CDN_BASE_URL not set"))?,
        })
    }
}

/// A presigned upload slot plus the URL the object will be served from.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    /// Presigned PUT URL with embedded credentials
    pub upload_url: String,
    /// CDN-facing URL the object is readable from after the transfer
    pub public_url: String,
    /// Object key inside the bucket
    pub key: String,
}

/// Upload targets for one clip: the video object and its thumbnail.
#[derive(Debug, Clone)]
pub struct ClipUploadTargets {
    pub video: UploadTarget,
    pub thumbnail: UploadTarget,
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    bucket: String,
    cdn_base_url: String,
}

impl StorageClient {
    /// Create a new storage client from configuration.
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "layercut",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);

        if let Some(ref endpoint) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        Ok(Self {
            client,
            bucket: config.bucket_name,
            cdn_base_url: config.cdn_base_url,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = StorageConfig::from_env()?;
        Self::new(config).await
    }

    /// CDN-facing URL for an object key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.cdn_base_url, key.trim_start_matches('/'))
    }

    /// Rewrite a bucket object URL (presigned or plain) to its CDN URL.
    ///
    /// Strips query parameters, then swaps the storage host prefix for the
    /// CDN base. URLs that do not point into the bucket are rejected.
    pub fn cdn_url_from_object_url(&self, object_url: &str) -> StorageResult<String> {
        let without_query = object_url.split('?').next().unwrap_or(object_url);

        let key = key_from_object_url(without_query, &self.bucket)
            .ok_or_else(|| StorageError::ForeignUrl(object_url.to_string()))?;

        Ok(self.public_url(key))
    }

    /// Issue a presigned PUT target for an object key.
    pub async fn issue_upload_target(
        &self,
        key: &str,
        content_type: &str,
    ) -> StorageResult<UploadTarget> {
        debug!(key, "Issuing upload target");

        let presign_config = PresigningConfig::expires_in(UPLOAD_TARGET_TTL)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(UploadTarget {
            upload_url: presigned.uri().to_string(),
            public_url: self.public_url(key),
            key: key.to_string(),
        })
    }

    /// Issue a presigned PUT target under a fresh owner-scoped key.
    pub async fn issue_owner_target(
        &self,
        owner_id: &str,
        content_type: &str,
    ) -> StorageResult<UploadTarget> {
        let key = format!("{}{}", object_slot(owner_id), extension_for(content_type));
        self.issue_upload_target(&key, content_type).await
    }

    /// Issue paired upload targets for a clip and its thumbnail.
    pub async fn issue_clip_targets(&self, owner_id: &str) -> StorageResult<ClipUploadTargets> {
        let slot = object_slot(owner_id);

        let video = self
            .issue_upload_target(&format!("{slot}.mp4"), "video/mp4")
            .await?;
        let thumbnail = self
            .issue_upload_target(&format!("{slot}.jpg"), "image/jpeg")
            .await?;

        Ok(ClipUploadTargets { video, thumbnail })
    }

    /// Upload bytes under a fresh owner-scoped key and return the CDN URL.
    pub async fn store_bytes(
        &self,
        data: Vec<u8>,
        owner_id: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let extension = extension_for(content_type);
        let key = format!("{}{}", object_slot(owner_id), extension);

        debug!(owner_id, key, bytes = data.len(), "Uploading object");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!(owner_id, key, "Stored object");
        Ok(self.public_url(&key))
    }
}

/// Fresh owner-scoped object slot: `{owner}/{nonce}/{uuid}`.
fn object_slot(owner_id: &str) -> String {
    let id = Uuid::new_v4();
    let nonce: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
    format!("{owner_id}/{nonce}/{id}")
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        "image/jpeg" => ".jpg",
        _ => "",
    }
}

/// Extract the object key from a bucket URL.
///
/// Understands virtual-hosted AWS URLs (`bucket.s3.….amazonaws.com/key`)
/// and path-style URLs against AWS or custom endpoints
/// (`host/bucket/key`).
fn key_from_object_url<'a>(url: &'a str, bucket: &str) -> Option<&'a str> {
    let rest = match url.split_once(".amazonaws.com/") {
        Some((host, rest)) => {
            if host.contains(&format!("://{}.", bucket)) {
                // Virtual-hosted: the path is the key
                return non_empty(rest);
            }
            rest
        }
        None => {
            // Custom endpoint: skip scheme and host
            let after_scheme = url.split_once("://").map(|(_, r)| r)?;
            after_scheme.split_once('/')?.1
        }
    };

    // Path-style: the first segment must be the bucket
    let (first, key) = rest.split_once('/')?;
    if first == bucket {
        non_empty(key)
    } else {
        None
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_slot_is_owner_scoped_and_unique() {
        let a = object_slot("user-1");
        let b = object_slot("user-1");
        assert!(a.starts_with("user-1/"));
        assert_ne!(a, b);
        assert_eq!(a.split('/').count(), 3);
    }

    #[test]
    fn test_key_from_virtual_hosted_url() {
        assert_eq!(
            key_from_object_url(
                "https://clips.s3.ap-southeast-2.amazonaws.com/u/abc/v.mp4",
                "clips"
            ),
            Some("u/abc/v.mp4")
        );
        assert_eq!(
            key_from_object_url("https://clips.s3.amazonaws.com/", "clips"),
            None
        );
    }

    #[test]
    fn test_key_from_path_style_url() {
        assert_eq!(
            key_from_object_url(
                "https://s3.ap-southeast-2.amazonaws.com/clips/u/abc/v.mp4",
                "clips"
            ),
            Some("u/abc/v.mp4")
        );
        assert_eq!(
            key_from_object_url("http://127.0.0.1:9000/clips/u/abc/v.mp4", "clips"),
            Some("u/abc/v.mp4")
        );
    }

    #[test]
    fn test_foreign_urls_rejected() {
        assert_eq!(
            key_from_object_url("https://example.com/other/u/abc/v.mp4", "clips"),
            None
        );
        assert_eq!(
            key_from_object_url("https://s3.amazonaws.com/other-bucket/v.mp4", "clips"),
            None
        );
    }

    #[test]
    fn test_cdn_rewrite_strips_query() {
        let url = "https://clips.s3.ap-southeast-2.amazonaws.com/u/abc/v.mp4?X-Amz-Signature=deadbeef";
        let without_query = url.split('?').next().unwrap();
        let key = key_from_object_url(without_query, "clips").unwrap();
        assert_eq!(
            format!("https://cdn.example/{key}"),
            "https://cdn.example/u/abc/v.mp4"
        );
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for("video/mp4"), ".mp4");
        assert_eq!(extension_for("video/webm"), ".webm");
        assert_eq!(extension_for("image/jpeg"), ".jpg");
        assert_eq!(extension_for("application/octet-stream"), "");
    }
}

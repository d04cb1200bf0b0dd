use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::core::config::Settings;

#[derive(Debug, Error)]
pub(crate) enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("invalid blob locator: {0}")]
    InvalidLocator(String),
    #[error("blob storage failed: {0}")]
    Backend(String),
}

impl From<std::io::Error> for BlobError {
    fn from(error: std::io::Error) -> Self {
        BlobError::Backend(error.to_string())
    }
}

/// Result of persisting one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredBlob {
    /// Name shown to people and referenced by comments.
    pub(crate) file_name: String,
    /// Unique key inside the backend, never reused.
    pub(crate) locator: String,
    pub(crate) size: i64,
    pub(crate) sha256: String,
}

#[async_trait]
pub(crate) trait BlobStore: Send + Sync {
    async fn save(&self, bytes: Vec<u8>, original_name: &str) -> Result<StoredBlob, BlobError>;
    async fn read(&self, locator: &str) -> Result<Vec<u8>, BlobError>;
    /// Deleting a missing blob is not an error.
    async fn delete(&self, locator: &str) -> Result<(), BlobError>;
    async fn exists(&self, locator: &str) -> Result<bool, BlobError>;
}

/// Drops any directory part a browser may have sent along with the name.
pub(crate) fn display_name(original_name: &str) -> String {
    original_name
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("upload")
        .to_string()
}

pub(crate) fn sanitized_filename(original_name: &str) -> String {
    let cleaned: String = display_name(original_name)
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

pub(crate) fn new_locator(original_name: &str) -> String {
    format!("answers/{}/{}", Uuid::new_v4(), sanitized_filename(original_name))
}

pub(crate) fn describe(bytes: &[u8], original_name: &str, locator: String) -> StoredBlob {
    StoredBlob {
        file_name: display_name(original_name),
        locator,
        size: bytes.len() as i64,
        sha256: hex::encode(Sha256::digest(bytes)),
    }
}

#[derive(Debug, Clone)]
pub(crate) struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub(crate) async fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        if settings.s3().access_key.is_empty() || settings.s3().secret_key.is_empty() {
            return Ok(None);
        }

        let creds = Credentials::new(
            settings.s3().access_key.clone(),
            settings.s3().secret_key.clone(),
            None,
            None,
            "taskreview-static",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(settings.s3().endpoint.clone())
            .region(aws_config::Region::new(settings.s3().region.clone()))
            .credentials_provider(creds)
            .load()
            .await;

        let client = Client::new(&config);

        Ok(Some(Self { client, bucket: settings.s3().bucket.clone() }))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn save(&self, bytes: Vec<u8>, original_name: &str) -> Result<StoredBlob, BlobError> {
        let stored = describe(&bytes, original_name, new_locator(original_name));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&stored.locator)
            .content_type("application/octet-stream")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|error| BlobError::Backend(error.to_string()))?;

        Ok(stored)
    }

    async fn read(&self, locator: &str) -> Result<Vec<u8>, BlobError> {
        let output =
            self.client.get_object().bucket(&self.bucket).key(locator).send().await.map_err(
                |error| match error.as_service_error() {
                    Some(service) if service.is_no_such_key() => {
                        BlobError::NotFound(locator.to_string())
                    }
                    _ => BlobError::Backend(error.to_string()),
                },
            )?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|error| BlobError::Backend(error.to_string()))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn delete(&self, locator: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(locator)
            .send()
            .await
            .map_err(|error| BlobError::Backend(error.to_string()))?;
        Ok(())
    }

    async fn exists(&self, locator: &str) -> Result<bool, BlobError> {
        match self.client.head_object().bucket(&self.bucket).key(locator).send().await {
            Ok(_) => Ok(true),
            Err(error) => match error.as_service_error() {
                Some(service) if service.is_not_found() => Ok(false),
                _ => Err(BlobError::Backend(error.to_string())),
            },
        }
    }
}

/// Keeps blobs as plain files under a root directory.
#[derive(Debug, Clone)]
pub(crate) struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, locator: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(locator);
        let safe = !locator.is_empty()
            && relative.components().all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(BlobError::InvalidLocator(locator.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn save(&self, bytes: Vec<u8>, original_name: &str) -> Result<StoredBlob, BlobError> {
        let stored = describe(&bytes, original_name, new_locator(original_name));
        let path = self.resolve(&stored.locator)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(stored)
    }

    async fn read(&self, locator: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.resolve(locator)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(locator.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn delete(&self, locator: &str) -> Result<(), BlobError> {
        let path = self.resolve(locator)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn exists(&self, locator: &str) -> Result<bool, BlobError> {
        let path = self.resolve(locator)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

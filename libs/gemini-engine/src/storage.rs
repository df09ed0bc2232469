//! Object storage for daily digest documents.
//!
//! Digests are keyed `{app_name}/{YYYY-MM-DD}.md`. Writes overwrite whatever
//! is stored under the key; there is no versioning.

use async_trait::async_trait;
use chrono::NaiveDate;
use gcloud_storage::client::{Client, ClientConfig};
use gcloud_storage::http::objects::download::Range;
use gcloud_storage::http::objects::get::GetObjectRequest;
use gcloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::BoxError;

const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Key-value blob storage capability.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), BoxError>;

    /// Returns `Ok(None)` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError>;
}

/// Storage key of the digest an app publishes for `date`.
pub fn digest_key(app_name: &str, date: NaiveDate) -> String {
    format!("{}/{}.md", app_name, date.format("%Y-%m-%d"))
}

/// Google Cloud Storage bucket.
pub struct GcsStore {
    client: Client,
    bucket: String,
}

impl GcsStore {
    /// Connect using ambient Google credentials.
    pub async fn connect(bucket: impl Into<String>) -> Result<Self, BoxError> {
        let config = ClientConfig::default().with_auth().await?;
        Ok(Self {
            client: Client::new(config),
            bucket: bucket.into(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    #[instrument(skip(self, body), fields(bucket = %self.bucket, bytes = body.len()))]
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), BoxError> {
        let mut media = Media::new(key.to_string());
        media.content_type = MARKDOWN_CONTENT_TYPE.into();

        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                body,
                &UploadType::Simple(media),
            )
            .await?;

        info!(object = %key, "Uploaded object");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        let result = self
            .client
            .download_object(
                &GetObjectRequest {
                    bucket: self.bucket.clone(),
                    object: key.to_string(),
                    ..Default::default()
                },
                &Range::default(),
            )
            .await;

        match result {
            Ok(data) => {
                debug!(object = %key, bytes = data.len(), "Downloaded object");
                Ok(Some(data))
            }
            Err(e) if e.to_string().contains("No such object") => {
                debug!(object = %key, "Object not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), BoxError> {
        self.objects.write().await.insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        Ok(self.objects.read().await.get(key).cloned())
    }
}

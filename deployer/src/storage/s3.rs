//! Object storage backed by Amazon S3

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, info};
use url::Url;

use crate::deploy::service::ObjectStorage;
use crate::errors::DeployError;

/// S3 uploader. Credentials come from the standard AWS environment.
#[derive(Debug)]
pub struct S3ObjectStorage {
    region: String,
    endpoint: Option<String>,
    stores: Mutex<HashMap<String, Arc<AmazonS3>>>,
}

impl S3ObjectStorage {
    /// Create a new S3 uploader for `region`. With an `endpoint`, requests
    /// go to that S3-compatible service using path-style URLs.
    pub fn new(region: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Client for `bucket`, built on first use and shared by later uploads
    fn store(&self, bucket: &str) -> Result<Arc<AmazonS3>, DeployError> {
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| DeployError::Internal("object store cache poisoned".to_string()))?;

        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(&self.region);

        if let Some(endpoint) = &self.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = Arc::new(builder.build()?);
        debug!(bucket = %bucket, "created S3 client");
        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    /// Retrieval URL of `bucket`/`key`
    pub fn object_url(&self, bucket: &str, key: &str) -> Result<String, DeployError> {
        let base = match &self.endpoint {
            Some(endpoint) => format!("{}/{}", endpoint, bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", bucket, self.region),
        };

        let mut url = Url::parse(&base)
            .map_err(|e| DeployError::ConfigError(format!("invalid storage url '{}': {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| DeployError::ConfigError(format!("invalid storage url '{}'", base)))?
            .pop_if_empty()
            .extend(key.split('/'));

        Ok(url.to_string())
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn upload(&self, bucket: &str, key: &str, body: Bytes) -> Result<String, DeployError> {
        let path = ObjectPath::parse(key)
            .map_err(|e| DeployError::ConfigError(format!("invalid object key '{}': {}", key, e)))?;
        let size = body.len();

        debug!(bucket = %bucket, key = %key, size = size, "Uploading to S3");
        self.store(bucket)?.put(&path, PutPayload::from(body)).await?;

        let url = self.object_url(bucket, key)?;
        info!(key = %key, size = size, url = %url, "Uploaded to S3");

        Ok(url)
    }
}

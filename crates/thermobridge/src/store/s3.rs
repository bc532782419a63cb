//! Amazon S3 object store (cargo feature `s3`).

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::{ObjectStore, Result, StoreError};

/// Object store backed by one S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client from the default AWS credential chain.
    pub async fn connect(bucket: impl Into<String>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;
        Self {
            client: Client::new(&sdk_config),
            bucket: bucket.into(),
        }
    }
}

fn backend_error<E: std::error::Error>(context: &str, err: E) -> StoreError {
    StoreError::Backend(format!("{}: {}", context, DisplayErrorContext(&err)))
}

#[async_trait]
impl ObjectStore for S3Store {
    /// One `ListObjectsV2` call; partitions are expected to fit in a single page.
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| backend_error("ListObjectsV2", e))?;

        if output.is_truncated().unwrap_or(false) {
            log::warn!(
                "Listing of s3://{}/{} truncated after one page",
                self.bucket,
                prefix
            );
        }

        Ok(output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| backend_error("GetObject", e))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| backend_error("GetObject body", e))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| backend_error("PutObject", e))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use super::ObjectStore;
use crate::error::StoreError;

/// S3 bucket implementation of [`ObjectStore`].
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let mut index = BTreeMap::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .max_keys(1000);
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let result = request
                .send()
                .await
                .map_err(|e| StoreError::S3(format!("listing s3://{}: {e}", self.bucket)))?;

            for obj in result.contents() {
                if let Some(key) = obj.key() {
                    let etag = obj.e_tag().unwrap_or_default().trim_matches('"');
                    index.insert(key.to_string(), etag.to_string());
                }
            }

            if result.is_truncated() == Some(true) {
                continuation_token = result.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        debug!(bucket = %self.bucket, objects = index.len(), "Listed bucket");
        Ok(index)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false)
                    || e.raw_response()
                        .map(|r| r.status().as_u16() == 404)
                        .unwrap_or(false);
                if is_not_found {
                    Ok(false)
                } else {
                    Err(StoreError::S3(format!(
                        "checking s3://{}/{key}: {e}",
                        self.bucket
                    )))
                }
            }
        }
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StoreError::S3(format!("uploading s3://{}/{key}: {e}", self.bucket)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::S3(format!("deleting s3://{}/{key}: {e}", self.bucket)))?;
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Create an S3 client.
///
/// Credentials come from the usual AWS sources (environment, profile,
/// instance metadata). A custom endpoint (MinIO, LocalStack) switches to
/// path-style addressing.
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(endpoint_url.is_some())
        .build();

    Client::from_conf(s3_config)
}

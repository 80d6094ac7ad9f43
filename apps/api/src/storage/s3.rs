use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, info};

use super::{BlobStore, CACHE_CONTROL_SECS};
use crate::errors::AppError;
use crate::intake::PDF_MIME;

/// Resume bucket on S3 (production) or MinIO (local).
#[derive(Clone)]
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Conditional PUT: the bucket itself refuses to overwrite an existing key.
    async fn put_new(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), AppError> {
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .if_none_match("*")
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .cache_control(format!("max-age={CACHE_CONTROL_SECS}"))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if key_taken(e.raw_response().map(|r| r.status().as_u16())) => {
                Err(AppError::Storage(format!("object already exists: {path}")))
            }
            Err(e) => Err(AppError::Storage(format!(
                "S3 upload failed: {}",
                DisplayErrorContext(&e)
            ))),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                AppError::Storage(format!("S3 delete failed: {}", DisplayErrorContext(&e)))
            })?;
        Ok(())
    }
}

/// 412 when the key exists; 409 when a concurrent conditional write to the
/// same key won the race.
fn key_taken(status: Option<u16>) -> bool {
    matches!(status, Some(412 | 409))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), AppError> {
        let size = bytes.len();
        self.put_new(path, bytes, content_type).await?;
        info!("Uploaded {size} bytes to s3://{}/{path}", self.bucket);
        Ok(())
    }

    /// S3 has no conditional copy, so the object is re-written under the new
    /// key with the same non-upsert guarantee and then deleted.
    async fn move_object(&self, from: &str, to: &str) -> Result<(), AppError> {
        let bytes = self.download(from).await?;
        self.put_new(to, bytes, PDF_MIME).await?;
        self.delete(from).await?;
        debug!("Moved s3://{}/{from} -> {to}", self.bucket);
        Ok(())
    }

    async fn remove(&self, paths: &[String]) -> Result<(), AppError> {
        for path in paths {
            self.delete(path).await?;
        }
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Bytes, AppError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 get failed: {}", DisplayErrorContext(&e))))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("S3 read failed: {e}")))?;
        Ok(data.into_bytes())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, encode_key(path))
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        let prefix = format!("{}/{}/", self.public_base_url, self.bucket);
        url.strip_prefix(&prefix).and_then(decode_key)
    }
}

/// Unreserved URL characters plus `/`, which stays the path separator.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

fn decode_key(encoded: &str) -> Option<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}

//! S3-compatible note store
//!
//! Talks to a Storj gateway (or any S3-compatible endpoint) through rust-s3.
//! The crate is built without `fail-on-err`, so non-2xx answers come back as
//! regular responses and are mapped here.

use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;

use super::{validate_key, NoteStore, NoteSummary, StoreInfo};
use crate::config::StorageConfig;
use crate::error::{Error, Result};

const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Note store backed by one S3 bucket
pub struct S3NoteStore {
    bucket: Box<Bucket>,
    endpoint: String,
}

impl S3NoteStore {
    /// Create a store for the configured bucket. No request is made until
    /// the first operation.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        };
        let credentials = Credentials::new(
            Some(config.access_key.as_str()),
            Some(config.secret_key.as_str()),
            None,
            None,
            None,
        )
        .map_err(|e| Error::Config(format!("invalid S3 credentials: {}", e)))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| Error::Config(format!("invalid S3 bucket settings: {}", e)))?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait::async_trait]
impl NoteStore for S3NoteStore {
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<NoteSummary>> {
        // list() follows continuation tokens until the listing is complete
        let pages = self
            .bucket
            .list(prefix.unwrap_or("").to_string(), None)
            .await
            .map_err(|e| Error::Storage(format!("listing {} failed: {}", self.bucket.name(), e)))?;

        let mut notes: Vec<NoteSummary> = pages
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| NoteSummary {
                key: object.key,
                size: object.size as u64,
                last_modified: Some(object.last_modified),
            })
            .collect();
        notes.sort_by(|a, b| a.key.cmp(&b.key));

        tracing::debug!("Listed {} notes from bucket {}", notes.len(), self.bucket.name());
        Ok(notes)
    }

    async fn read(&self, key: &str) -> Result<String> {
        validate_key(key)?;

        let response = self
            .bucket
            .get_object(key)
            .await
            .map_err(|e| map_s3_error(e, key))?;
        check_status(response.status_code(), key)?;

        decode_content(key, response.bytes().to_vec())
    }

    async fn write(&self, key: &str, content: &str) -> Result<()> {
        validate_key(key)?;

        let response = self
            .bucket
            .put_object_with_content_type(key, content.as_bytes(), CONTENT_TYPE)
            .await
            .map_err(|e| map_s3_error(e, key))?;
        check_status(response.status_code(), key)?;

        tracing::debug!("Stored {} ({} bytes)", key, content.len());
        Ok(())
    }

    fn describe(&self) -> StoreInfo {
        StoreInfo {
            backend: "s3".to_string(),
            bucket: self.bucket.name(),
            endpoint: self.endpoint.clone(),
        }
    }
}

/// Map an S3 response status to the crate's errors
fn check_status(status: u16, key: &str) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        404 => Err(Error::NoteNotFound(key.to_string())),
        other => Err(Error::Storage(format!(
            "object store answered HTTP {} for {}",
            other, key
        ))),
    }
}

/// Note bodies must be UTF-8 text
fn decode_content(key: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| Error::Storage(format!("{} is not valid UTF-8: {}", key, e)))
}

fn map_s3_error(e: S3Error, key: &str) -> Error {
    match e {
        S3Error::HttpFailWithBody(status, _) => match check_status(status, key) {
            Err(err) => err,
            Ok(()) => Error::Storage(format!("unexpected S3 failure for {}", key)),
        },
        other => Error::Storage(other.to_string()),
    }
}

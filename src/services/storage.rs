use s3::creds::Credentials;
use s3::{Bucket, Region};
use uuid::Uuid;

/// Client for the document image store (R2, S3-compatible).
///
/// Storage is an external collaborator: this is its interface only. Images
/// are always encrypted before they reach this client.
pub struct DocumentStore {
    bucket: Box<Bucket>,
}

impl DocumentStore {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }

    /// Key under which a submission's nth document image is stored.
    pub fn document_key(submission_id: Uuid, index: usize) -> String {
        format!("submissions/{submission_id}/{index}.enc")
    }

    /// Upload an encrypted document image.
    pub async fn put_document(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.bucket
            .put_object_with_content_type(key, data, "application/octet-stream")
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }

    /// Fetch an encrypted document image.
    pub async fn get_document(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.bucket.get_object(key).await.map_err(StorageError::S3)?;
        Ok(response.to_vec())
    }

    /// Delete a stored document image (after analysis; no retention).
    pub async fn delete_document(&self, key: &str) -> Result<(), StorageError> {
        self.bucket.delete_object(key).await.map_err(StorageError::S3)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_keys_are_submission_scoped() {
        let id = Uuid::new_v4();
        let key = DocumentStore::document_key(id, 2);
        assert_eq!(key, format!("submissions/{id}/2.enc"));
    }
}

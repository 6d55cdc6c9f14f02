//! High-level storage operations for derived assets.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use vido_models::VideoId;

use crate::client::R2Client;
use crate::error::{StorageError, StorageResult};

/// A stored derived asset: the permanent URL plus the key needed to delete
/// it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub url: String,
    pub key: String,
}

/// Object key for a generated thumbnail. Timestamped so a replaced
/// thumbnail never collides with a stale CDN entry for the old one.
pub fn thumbnail_key(owner_id: &str, video_id: &VideoId) -> String {
    format!(
        "{}/{}/thumbnails/{}.jpg",
        owner_id,
        video_id,
        Utc::now().timestamp_millis()
    )
}

impl R2Client {
    /// Store generated thumbnail bytes and return the permanent reference.
    /// Empty payloads are rejected; the generator returning nothing must
    /// fail the run, not store a zero-byte object.
    pub async fn store_thumbnail(
        &self,
        owner_id: &str,
        video_id: &VideoId,
        data: Vec<u8>,
    ) -> StorageResult<StoredObject> {
        if data.is_empty() {
            return Err(StorageError::EmptyObject(format!(
                "thumbnail for video {}",
                video_id
            )));
        }

        let key = thumbnail_key(owner_id, video_id);
        self.upload_bytes(data, &key, "image/jpeg").await?;
        let url = self.public_url(&key);
        info!(video_id = %video_id, key = %key, "Stored generated thumbnail");

        Ok(StoredObject { url, key })
    }
}

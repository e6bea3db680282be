use crate::error::UploadError;
use async_trait::async_trait;
use bytes::Bytes;
use meshroom_core::{RoomId, UserId};

/// Binary storage collaborator. Returns a URL usable in an IMAGE message.
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn upload(
        &self,
        room: &RoomId,
        user: &UserId,
        file_name: &str,
        data: Bytes,
    ) -> Result<String, UploadError>;
}

use crate::error::MembershipError;
use async_trait::async_trait;
use meshroom_core::{RoomId, UserId};

/// Room membership collaborator: join confirmation and the participant list.
#[async_trait]
pub trait MembershipService: Send + Sync {
    async fn join_room(&self, room: &RoomId, user: &UserId) -> Result<(), MembershipError>;

    async fn participants(&self, room: &RoomId) -> Result<Vec<UserId>, MembershipError>;
}

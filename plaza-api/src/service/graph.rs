//! The friend request lifecycle and the friendships derived from it.

use crate::server::{Result, ServerError};
use plaza_common::model::{
    Id,
    friend_request::{
        CreateFriendRequest, FriendRequest, FriendRequestAction, FriendRequestError,
        FriendRequestMarker,
    },
    user::{User, UserMarker},
};
use plaza_db::store::{DbError, Store};
use tracing::info;

pub async fn send(
    store: &dyn Store,
    sender: Id<UserMarker>,
    recipient: Id<UserMarker>,
) -> Result<FriendRequest> {
    let create = CreateFriendRequest::new(sender, recipient)?;

    if store.fetch_user(recipient).await?.is_none() {
        return Err(ServerError::UnknownUser(recipient));
    }

    let request = store
        .create_friend_request(create)
        .await
        .map_err(|err| match err {
            DbError::UniqueViolation => ServerError::FriendRequestExists,
            DbError::ForeignKeyViolation => ServerError::UnknownUser(recipient),
            err => err.into(),
        })?;

    info!(request_id = %request.id, %sender, %recipient, "Friend request sent");
    Ok(request)
}

pub async fn accept(
    store: &dyn Store,
    request_id: Id<FriendRequestMarker>,
    actor: Id<UserMarker>,
) -> Result<FriendRequest> {
    answer(store, request_id, actor, FriendRequestAction::Accept).await
}

pub async fn decline(
    store: &dyn Store,
    request_id: Id<FriendRequestMarker>,
    actor: Id<UserMarker>,
) -> Result<FriendRequest> {
    answer(store, request_id, actor, FriendRequestAction::Decline).await
}

async fn answer(
    store: &dyn Store,
    request_id: Id<FriendRequestMarker>,
    actor: Id<UserMarker>,
    action: FriendRequestAction,
) -> Result<FriendRequest> {
    let request = store
        .transition_friend_request(request_id, actor, action)
        .await?
        .ok_or(ServerError::FriendRequestByIdNotFound(request_id))?;

    info!(%request_id, %actor, status = %request.status, "Friend request answered");
    Ok(request)
}

/// A single request, visible to its sender and recipient only.
pub async fn get_request(
    store: &dyn Store,
    request_id: Id<FriendRequestMarker>,
    actor: Id<UserMarker>,
) -> Result<FriendRequest> {
    let request = store
        .fetch_friend_request(request_id)
        .await?
        .ok_or(ServerError::FriendRequestByIdNotFound(request_id))?;

    if !request.involves(actor) {
        return Err(ServerError::FriendRequest(FriendRequestError::NotParticipant));
    }

    Ok(request)
}

/// Pending requests addressed to `user`.
pub async fn list_pending(store: &dyn Store, user: Id<UserMarker>) -> Result<Vec<FriendRequest>> {
    Ok(store.fetch_pending_friend_requests(user).await?)
}

pub async fn list_friends(store: &dyn Store, user: Id<UserMarker>) -> Result<Vec<User>> {
    Ok(store.fetch_friends(user).await?)
}

/// Dissolves the friendship recorded by `request_id`.
pub async fn remove_friend(
    store: &dyn Store,
    request_id: Id<FriendRequestMarker>,
    actor: Id<UserMarker>,
) -> Result<FriendRequest> {
    let request = store
        .remove_friendship(request_id, actor)
        .await?
        .ok_or(ServerError::FriendRequestByIdNotFound(request_id))?;

    info!(%request_id, %actor, "Friendship removed");
    Ok(request)
}

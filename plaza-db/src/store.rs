//! The persistence port every storage backend implements.
//!
//! Operations that read a row and then change it based on what they read
//! (like toggles, friend request transitions and friendship removal) are
//! single store calls, so that each backend can make them atomic.

use async_trait::async_trait;
use plaza_common::model::{
    Id, ModelValidationError,
    auth::{AuthTokenHash, Authentication},
    comment::{Comment, CommentContent, CommentMarker, CreateComment},
    friend_request::{
        CreateFriendRequest, FriendRequest, FriendRequestAction, FriendRequestError,
        FriendRequestMarker,
    },
    like::{Like, LikeToggle},
    post::{CreatePost, Post, PostContent, PostMarker},
    user::{CreateUser, Email, UpdateUser, User, UserCredentials, UserMarker},
};
use std::{fmt::Debug, sync::Arc};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

pub type SharedStore = Arc<dyn Store>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A unique constraint was violated")]
    UniqueViolation,
    #[error("A referenced row does not exist")]
    ForeignKeyViolation,
    #[error("Concurrent updates kept conflicting")]
    Conflict,
    #[error(transparent)]
    FriendRequest(#[from] FriendRequestError),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let kind = err.as_database_error().map(|db_err| db_err.kind());

        match kind {
            Some(sqlx::error::ErrorKind::UniqueViolation) => DbError::UniqueViolation,
            Some(sqlx::error::ErrorKind::ForeignKeyViolation) => DbError::ForeignKeyViolation,
            _ => DbError::Sqlx(err),
        }
    }
}

#[async_trait]
pub trait Store: Debug + Send + Sync {
    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_users(&self) -> Result<Vec<User>>;

    async fn fetch_credentials_by_email(&self, email: &Email) -> Result<Option<UserCredentials>>;

    /// Fails with [`DbError::UniqueViolation`] if the new email belongs to another user.
    async fn update_user(
        &self,
        user_id: Id<UserMarker>,
        update: &UpdateUser,
    ) -> Result<Option<User>>;

    async fn create_auth(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;

    /// Returns whether the token existed.
    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool>;

    /// Revokes every token of the user, returning how many were removed.
    async fn delete_user_auths(&self, user_id: Id<UserMarker>) -> Result<u64>;

    async fn create_post(&self, post: &CreatePost) -> Result<Post>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn fetch_posts(&self) -> Result<Vec<Post>>;

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>>;

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>>;

    /// Deletes the post with its comments and likes. Returns whether it existed.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment>;

    async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>>;

    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    async fn update_comment(
        &self,
        comment_id: Id<CommentMarker>,
        content: &CommentContent,
    ) -> Result<Option<Comment>>;

    async fn delete_comment(&self, comment_id: Id<CommentMarker>) -> Result<bool>;

    /// Removes the like of `user_id` on `post_id` if it exists, creates it otherwise.
    async fn toggle_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<LikeToggle>;

    async fn fetch_user_likes(&self, user_id: Id<UserMarker>) -> Result<Vec<Like>>;

    /// Fails with [`DbError::UniqueViolation`] while a pending or accepted
    /// request exists between the two users in either direction.
    async fn create_friend_request(&self, request: CreateFriendRequest) -> Result<FriendRequest>;

    async fn fetch_friend_request(
        &self,
        request_id: Id<FriendRequestMarker>,
    ) -> Result<Option<FriendRequest>>;

    async fn fetch_pending_friend_requests(
        &self,
        recipient_id: Id<UserMarker>,
    ) -> Result<Vec<FriendRequest>>;

    /// Applies `action` on behalf of `actor`, validated by [`FriendRequest::transition`]
    /// against the current row. `None` if the request does not exist.
    async fn transition_friend_request(
        &self,
        request_id: Id<FriendRequestMarker>,
        actor: Id<UserMarker>,
        action: FriendRequestAction,
    ) -> Result<Option<FriendRequest>>;

    /// Deletes an accepted request on behalf of one of its participants,
    /// validated by [`FriendRequest::check_removal`]. Returns the deleted row.
    async fn remove_friendship(
        &self,
        request_id: Id<FriendRequestMarker>,
        actor: Id<UserMarker>,
    ) -> Result<Option<FriendRequest>>;

    /// Every user connected to `user_id` by an accepted request, whichever side sent it.
    async fn fetch_friends(&self, user_id: Id<UserMarker>) -> Result<Vec<User>>;
}

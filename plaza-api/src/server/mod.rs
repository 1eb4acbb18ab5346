use crate::{
    media::{SharedMediaStore, UnsupportedMediaTypeError},
    service::identity::TokenPolicy,
};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use plaza_common::model::{
    Id,
    auth::{AuthTokenDecodeError, AuthTokenHashError, PasswordHashError},
    comment::CommentMarker,
    friend_request::{FriendRequestError, FriendRequestMarker, SelfFriendRequestError},
    post::PostMarker,
    user::UserMarker,
};
use plaza_db::store::{DbError, SharedStore};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub mod auth;
pub mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub store: SharedStore,
    pub media: SharedMediaStore,
    pub token_policy: TokenPolicy,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("The password could not be hashed: {0}")]
    PasswordHash(#[from] PasswordHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Invalid credentials!")]
    InvalidCredentials,
    #[error("The email address has already been taken.")]
    EmailTaken,
    #[error("The password confirmation does not match.")]
    PasswordMismatch,
    #[error(transparent)]
    SelfFriendRequest(#[from] SelfFriendRequestError),
    #[error("No user with id {0} exists.")]
    UnknownUser(Id<UserMarker>),
    #[error("No post with id {0} exists.")]
    UnknownPost(Id<PostMarker>),
    #[error(transparent)]
    UnsupportedMediaType(#[from] UnsupportedMediaTypeError),
    #[error("The uploaded file was empty.")]
    EmptyMedia,
    #[error("You are not authorized to modify user {0}.")]
    NotProfileOwner(Id<UserMarker>),
    #[error("You are not authorized to modify post {0}.")]
    NotPostOwner(Id<PostMarker>),
    #[error("You are not authorized to modify comment {0}.")]
    NotCommentAuthor(Id<CommentMarker>),
    #[error(transparent)]
    FriendRequest(FriendRequestError),
    #[error("A friend request between these users already exists.")]
    FriendRequestExists,
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
    #[error("Comment with id {0} was not found.")]
    CommentByIdNotFound(Id<CommentMarker>),
    #[error("Friend request with id {0} was not found.")]
    FriendRequestByIdNotFound(Id<FriendRequestMarker>),
    #[error("Storing media failed: {0}")]
    Media(#[from] std::io::Error),
    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for ServerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::FriendRequest(err) => ServerError::FriendRequest(err),
            err => ServerError::Database(err),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByIdNotFound(_)
            | ServerError::CommentByIdNotFound(_)
            | ServerError::FriendRequestByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidToken
            | ServerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServerError::JsonRejection(JsonRejection::JsonDataError(_))
            | ServerError::EmailTaken
            | ServerError::PasswordMismatch
            | ServerError::SelfFriendRequest(_)
            | ServerError::UnknownUser(_)
            | ServerError::UnknownPost(_)
            | ServerError::UnsupportedMediaType(_)
            | ServerError::EmptyMedia => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::JsonRejection(_) => StatusCode::BAD_REQUEST,
            ServerError::NotProfileOwner(_)
            | ServerError::NotPostOwner(_)
            | ServerError::NotCommentAuthor(_)
            | ServerError::FriendRequest(
                FriendRequestError::NotRecipient | FriendRequestError::NotParticipant,
            ) => StatusCode::FORBIDDEN,
            ServerError::FriendRequest(
                FriendRequestError::InvalidTransition { .. } | FriendRequestError::NotAccepted,
            )
            | ServerError::FriendRequestExists
            | ServerError::Database(DbError::Conflict | DbError::UniqueViolation) => {
                StatusCode::CONFLICT
            }
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_)
            | ServerError::Media(_)
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let message = if status.is_server_error() {
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };
        let error_response = ErrorResponse {
            success: false,
            message,
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::ServerError;
    use axum::http::StatusCode;
    use plaza_common::model::{
        Id,
        friend_request::{FriendRequestAction, FriendRequestError, FriendRequestStatus},
    };
    use plaza_db::store::DbError;

    #[test]
    fn status_codes() {
        let cases = [
            (ServerError::InvalidToken, StatusCode::UNAUTHORIZED),
            (ServerError::EmailTaken, StatusCode::UNPROCESSABLE_ENTITY),
            (ServerError::UnknownPost(Id::new(1)), StatusCode::UNPROCESSABLE_ENTITY),
            (ServerError::NotProfileOwner(Id::new(1)), StatusCode::FORBIDDEN),
            (ServerError::NotCommentAuthor(Id::new(1)), StatusCode::FORBIDDEN),
            (ServerError::CommentByIdNotFound(Id::new(1)), StatusCode::NOT_FOUND),
            (ServerError::FriendRequestExists, StatusCode::CONFLICT),
            (
                DbError::FriendRequest(FriendRequestError::NotRecipient).into(),
                StatusCode::FORBIDDEN,
            ),
            (
                DbError::FriendRequest(FriendRequestError::InvalidTransition {
                    from: FriendRequestStatus::Declined,
                    action: FriendRequestAction::Accept,
                })
                .into(),
                StatusCode::CONFLICT,
            ),
            (DbError::Conflict.into(), StatusCode::CONFLICT),
            (
                DbError::ForeignKeyViolation.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error}");
        }
    }
}

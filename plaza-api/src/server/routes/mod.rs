use crate::server::ServerRouter;
use axum::Router;
use serde::Serialize;

mod auth;
mod comments;
mod friends;
mod likes;
mod media;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(likes::routes())
        .merge(friends::routes())
        .merge(media::routes())
}

/// Success envelope: `{"success": true, "message": ..., "data": ...}`.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct DataResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    data: T,
}

impl<T> DataResponse<T> {
    fn new(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    fn with_message(message: &'static str, data: T) -> Self {
        Self {
            success: true,
            message: Some(message),
            data,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct MessageResponse {
    success: bool,
    message: &'static str,
}

impl MessageResponse {
    fn new(message: &'static str) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

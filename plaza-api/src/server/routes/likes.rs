use crate::{
    server::{
        Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json,
        routes::DataResponse,
    },
    service::content,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use plaza_common::model::{
    Id,
    like::{Like, LikeToggle},
    post::PostMarker,
};
use plaza_db::store::SharedStore;
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(toggle_like)
        .typed_get(get_likes)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/likes", rejection(ServerError))]
struct LikesPath();

#[derive(Deserialize)]
struct LikeBody {
    post_id: Id<PostMarker>,
}

#[derive(Serialize)]
struct LikeResponse {
    success: bool,
    message: &'static str,
    liked: bool,
}

async fn toggle_like(
    LikesPath(): LikesPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
    Json(body): Json<LikeBody>,
) -> Result<Json<LikeResponse>> {
    let toggle = content::toggle_like(&*store, user.user_id(), body.post_id).await?;

    let message = match toggle {
        LikeToggle::Liked(_) => "Post liked",
        LikeToggle::Unliked => "Post unliked",
    };
    Ok(Json(LikeResponse {
        success: true,
        message,
        liked: toggle.is_liked(),
    }))
}

async fn get_likes(
    LikesPath(): LikesPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
) -> Result<Json<DataResponse<Vec<Like>>>> {
    let likes = content::list_likes(&*store, user.user_id()).await?;

    Ok(Json(DataResponse::new(likes)))
}

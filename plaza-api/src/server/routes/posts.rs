use crate::{
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        json::{Created, Json},
        routes::{DataResponse, MessageResponse},
    },
    service::content,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use plaza_common::model::{
    Id,
    post::{Post, PostContent, PostMarker},
};
use plaza_db::store::SharedStore;
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn get_posts(
    PostsPath(): PostsPath,
    State(store): State<SharedStore>,
) -> Result<Json<DataResponse<Vec<Post>>>> {
    let posts = content::list_posts(&*store).await?;

    Ok(Json(DataResponse::new(posts)))
}

#[derive(Deserialize)]
struct CreatePostBody {
    #[serde(flatten)]
    content: PostContent,
    #[serde(default)]
    shared_from: Option<Id<PostMarker>>,
}

async fn create_post(
    PostsPath(): PostsPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
    Json(body): Json<CreatePostBody>,
) -> Result<Created<DataResponse<Post>>> {
    let post =
        content::create_post(&*store, user.user_id(), body.content, body.shared_from).await?;

    Ok(Created(DataResponse::with_message(
        "Post created successfully",
        post,
    )))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(store): State<SharedStore>,
) -> Result<Json<DataResponse<Post>>> {
    let post = content::get_post(&*store, id).await?;

    Ok(Json(DataResponse::new(post)))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
    Json(post): Json<PostContent>,
) -> Result<Json<DataResponse<Post>>> {
    let post = content::update_post(&*store, id, user.user_id(), post).await?;

    Ok(Json(DataResponse::with_message(
        "Post updated successfully",
        post,
    )))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>> {
    content::delete_post(&*store, id, user.user_id()).await?;

    Ok(Json(MessageResponse::new("Post deleted successfully")))
}

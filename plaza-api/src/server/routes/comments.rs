use crate::{
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        json::{Created, Json},
    },
    service::content,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use plaza_common::model::{
    Id,
    comment::{Comment, CommentContent, CommentMarker},
    post::PostMarker,
};
use plaza_db::store::SharedStore;
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_post_comments)
        .typed_post(create_comment)
        .typed_put(update_comment)
        .typed_delete(delete_comment)
}

#[derive(Deserialize)]
struct CommentBody {
    content: CommentContent,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct PostCommentsPath {
    id: Id<PostMarker>,
}

async fn get_post_comments(
    PostCommentsPath { id }: PostCommentsPath,
    State(store): State<SharedStore>,
) -> Result<Json<Vec<Comment>>> {
    let comments = content::list_comments(&*store, id).await?;

    Ok(Json(comments))
}

async fn create_comment(
    PostCommentsPath { id }: PostCommentsPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
    Json(body): Json<CommentBody>,
) -> Result<Created<Comment>> {
    let comment = content::create_comment(&*store, id, user.user_id(), body.content).await?;

    Ok(Created(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comments/{id}", rejection(ServerError))]
struct CommentPath {
    id: Id<CommentMarker>,
}

async fn update_comment(
    CommentPath { id }: CommentPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
    Json(body): Json<CommentBody>,
) -> Result<Json<Comment>> {
    let comment = content::update_comment(&*store, id, user.user_id(), body.content).await?;

    Ok(Json(comment))
}

async fn delete_comment(
    CommentPath { id }: CommentPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
) -> Result<Json<Comment>> {
    let comment = content::delete_comment(&*store, id, user.user_id()).await?;

    Ok(Json(comment))
}

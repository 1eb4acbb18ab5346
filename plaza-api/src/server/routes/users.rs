use crate::{
    server::{
        Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json,
        routes::DataResponse,
    },
    service::{content, identity},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use plaza_common::model::{
    Id,
    post::Post,
    user::{UpdateUser, User, UserMarker},
};
use plaza_db::store::SharedStore;
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_users)
        .typed_get(get_user)
        .typed_put(update_user)
        .typed_get(get_user_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users", rejection(ServerError))]
struct GetUsersPath();

async fn get_users(
    GetUsersPath(): GetUsersPath,
    State(store): State<SharedStore>,
) -> Result<Json<DataResponse<Vec<User>>>> {
    let users = store.fetch_users().await?;

    Ok(Json(DataResponse::new(users)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct UserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    UserPath { id }: UserPath,
    State(store): State<SharedStore>,
) -> Result<Json<DataResponse<User>>> {
    let user = store
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(DataResponse::new(user)))
}

async fn update_user(
    UserPath { id }: UserPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
    Json(update): Json<UpdateUser>,
) -> Result<Json<DataResponse<User>>> {
    let updated = identity::update_profile(&*store, user.user_id(), id, &update).await?;

    Ok(Json(DataResponse::with_message(
        "User updated successfully",
        updated,
    )))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts", rejection(ServerError))]
struct GetUserPostsPath {
    id: Id<UserMarker>,
}

async fn get_user_posts(
    GetUserPostsPath { id }: GetUserPostsPath,
    State(store): State<SharedStore>,
) -> Result<Json<DataResponse<Vec<Post>>>> {
    let posts = content::list_user_posts(&*store, id).await?;

    Ok(Json(DataResponse::new(posts)))
}

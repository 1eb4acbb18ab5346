//! Posts, comments and likes. Only the owner of a post or the author of a
//! comment may change or delete it.

use crate::server::{Result, ServerError};
use plaza_common::model::{
    Id,
    comment::{Comment, CommentContent, CommentMarker, CreateComment},
    like::{Like, LikeToggle},
    post::{CreatePost, Post, PostContent, PostMarker},
    user::UserMarker,
};
use plaza_db::store::{DbError, Store};
use tracing::{debug, info};

pub async fn list_posts(store: &dyn Store) -> Result<Vec<Post>> {
    Ok(store.fetch_posts().await?)
}

pub async fn get_post(store: &dyn Store, post_id: Id<PostMarker>) -> Result<Post> {
    store
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))
}

pub async fn list_user_posts(store: &dyn Store, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
    if store.fetch_user(user_id).await?.is_none() {
        return Err(ServerError::UserByIdNotFound(user_id));
    }

    Ok(store.fetch_user_posts(user_id).await?)
}

pub async fn create_post(
    store: &dyn Store,
    author: Id<UserMarker>,
    content: PostContent,
    shared_from: Option<Id<PostMarker>>,
) -> Result<Post> {
    if let Some(shared_from) = shared_from
        && store.fetch_post(shared_from).await?.is_none()
    {
        return Err(ServerError::UnknownPost(shared_from));
    }

    let post = store
        .create_post(&CreatePost {
            author,
            content,
            shared_from,
        })
        .await
        .map_err(|err| match (err, shared_from) {
            // The shared post vanished after the check above.
            (DbError::ForeignKeyViolation, Some(shared_from)) => {
                ServerError::UnknownPost(shared_from)
            }
            (err, _) => err.into(),
        })?;

    info!(post_id = %post.id, %author, "Created post");
    Ok(post)
}

async fn owned_post(
    store: &dyn Store,
    post_id: Id<PostMarker>,
    actor: Id<UserMarker>,
) -> Result<Post> {
    let post = get_post(store, post_id).await?;

    if !post.is_owned_by(actor) {
        debug!(%post_id, %actor, owner = %post.user_id, "Refusing to modify foreign post");
        return Err(ServerError::NotPostOwner(post_id));
    }

    Ok(post)
}

pub async fn update_post(
    store: &dyn Store,
    post_id: Id<PostMarker>,
    actor: Id<UserMarker>,
    content: PostContent,
) -> Result<Post> {
    owned_post(store, post_id, actor).await?;

    let post = store
        .update_post(post_id, &content)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    info!(%post_id, %actor, "Updated post");
    Ok(post)
}

pub async fn delete_post(
    store: &dyn Store,
    post_id: Id<PostMarker>,
    actor: Id<UserMarker>,
) -> Result<()> {
    owned_post(store, post_id, actor).await?;

    if !store.delete_post(post_id).await? {
        return Err(ServerError::PostByIdNotFound(post_id));
    }

    info!(%post_id, %actor, "Deleted post");
    Ok(())
}

/// Comments of a post, oldest first.
pub async fn list_comments(store: &dyn Store, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
    get_post(store, post_id).await?;

    Ok(store.fetch_post_comments(post_id).await?)
}

pub async fn create_comment(
    store: &dyn Store,
    post_id: Id<PostMarker>,
    author: Id<UserMarker>,
    content: CommentContent,
) -> Result<Comment> {
    get_post(store, post_id).await?;

    let comment = store
        .create_comment(&CreateComment {
            post: post_id,
            author,
            content,
        })
        .await
        .map_err(|err| match err {
            DbError::ForeignKeyViolation => ServerError::PostByIdNotFound(post_id),
            err => err.into(),
        })?;

    info!(comment_id = %comment.id, %post_id, %author, "Created comment");
    Ok(comment)
}

async fn authored_comment(
    store: &dyn Store,
    comment_id: Id<CommentMarker>,
    actor: Id<UserMarker>,
) -> Result<Comment> {
    let comment = store
        .fetch_comment(comment_id)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(comment_id))?;

    if !comment.is_authored_by(actor) {
        return Err(ServerError::NotCommentAuthor(comment_id));
    }

    Ok(comment)
}

pub async fn update_comment(
    store: &dyn Store,
    comment_id: Id<CommentMarker>,
    actor: Id<UserMarker>,
    content: CommentContent,
) -> Result<Comment> {
    authored_comment(store, comment_id, actor).await?;

    let comment = store
        .update_comment(comment_id, &content)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(comment_id))?;

    info!(%comment_id, %actor, "Updated comment");
    Ok(comment)
}

/// Returns the deleted comment.
pub async fn delete_comment(
    store: &dyn Store,
    comment_id: Id<CommentMarker>,
    actor: Id<UserMarker>,
) -> Result<Comment> {
    let comment = authored_comment(store, comment_id, actor).await?;

    if !store.delete_comment(comment_id).await? {
        return Err(ServerError::CommentByIdNotFound(comment_id));
    }

    info!(%comment_id, %actor, "Deleted comment");
    Ok(comment)
}

pub async fn toggle_like(
    store: &dyn Store,
    user_id: Id<UserMarker>,
    post_id: Id<PostMarker>,
) -> Result<LikeToggle> {
    let toggle = store
        .toggle_like(user_id, post_id)
        .await
        .map_err(|err| match err {
            DbError::ForeignKeyViolation => ServerError::UnknownPost(post_id),
            err => err.into(),
        })?;

    info!(%user_id, %post_id, liked = toggle.is_liked(), "Toggled like");
    Ok(toggle)
}

pub async fn list_likes(store: &dyn Store, user_id: Id<UserMarker>) -> Result<Vec<Like>> {
    Ok(store.fetch_user_likes(user_id).await?)
}

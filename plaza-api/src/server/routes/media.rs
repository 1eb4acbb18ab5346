use crate::{
    media::{MediaKind, SharedMediaStore},
    server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Created},
};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, header::CONTENT_TYPE},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(upload_media)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/media", rejection(ServerError))]
struct MediaPath();

#[derive(Serialize)]
struct UploadResponse {
    url: String,
}

async fn upload_media(
    MediaPath(): MediaPath,
    State(media): State<SharedMediaStore>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Created<UploadResponse>> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let kind: MediaKind = content_type.parse()?;

    if body.is_empty() {
        return Err(ServerError::EmptyMedia);
    }

    let url = media.put(&body, kind).await?;
    info!(user_id = %user.user_id(), %url, "Uploaded media");

    Ok(Created(UploadResponse { url }))
}

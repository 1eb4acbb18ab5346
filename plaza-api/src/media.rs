//! Storage for uploaded images. Stored files are addressed by URL only.

use async_trait::async_trait;
use std::{
    fmt::{Debug, Display},
    io,
    path::PathBuf,
    str::FromStr,
    sync::Arc,
};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

pub type SharedMediaStore = Arc<dyn MediaStore>;

#[async_trait]
pub trait MediaStore: Debug + Send + Sync {
    /// Persists `bytes` and returns the URL they can be fetched from.
    async fn put(&self, bytes: &[u8], kind: MediaKind) -> io::Result<String>;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum MediaKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unsupported media type: {0}")]
pub struct UnsupportedMediaTypeError(pub String);

impl MediaKind {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Png => "png",
            MediaKind::Jpeg => "jpg",
            MediaKind::Gif => "gif",
            MediaKind::Webp => "webp",
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parses a `Content-Type` value, ignoring parameters such as `charset`.
impl FromStr for MediaKind {
    type Err = UnsupportedMediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let essence = s.split(';').next().unwrap_or_default().trim();

        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Ok(MediaKind::Png),
            "image/jpeg" | "image/jpg" => Ok(MediaKind::Jpeg),
            "image/gif" => Ok(MediaKind::Gif),
            "image/webp" => Ok(MediaKind::Webp),
            _ => Err(UnsupportedMediaTypeError(s.to_owned())),
        }
    }
}

/// Writes uploads into a directory that is served under `url_prefix`.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct LocalMediaStore {
    dir: PathBuf,
    url_prefix: String,
}

impl LocalMediaStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn random_file_name(kind: MediaKind) -> String {
        let name: [u8; 16] = rand::random();
        let hex: String = name.iter().map(|byte| format!("{byte:02x}")).collect();

        format!("{hex}.{kind}")
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, bytes: &[u8], kind: MediaKind) -> io::Result<String> {
        fs::create_dir_all(&self.dir).await?;

        let file_name = Self::random_file_name(kind);
        fs::write(self.dir.join(&file_name), bytes).await?;
        debug!(%file_name, len = bytes.len(), "Stored media file");

        Ok(format!("{}/{file_name}", self.url_prefix))
    }
}

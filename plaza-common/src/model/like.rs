use crate::model::{Id, post::PostMarker, user::UserMarker};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct LikeMarker;

/// Presence of a like row means `user_id` likes `post_id`. There is at most one per pair.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Like {
    pub id: Id<LikeMarker>,
    pub user_id: Id<UserMarker>,
    pub post_id: Id<PostMarker>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Outcome of toggling a like.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum LikeToggle {
    Liked(Like),
    Unliked,
}

impl LikeToggle {
    #[must_use]
    pub fn is_liked(&self) -> bool {
        matches!(self, LikeToggle::Liked(_))
    }
}

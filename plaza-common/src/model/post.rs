use crate::model::{Id, user::UserMarker};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_TITLE_MAX_LEN: usize = 255;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub user_id: Id<UserMarker>,
    #[serde(flatten)]
    pub content: PostContent,
    /// The post this one re-shares, if any.
    pub shared_from: Option<Id<PostMarker>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The user-editable part of a post.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub title: PostTitle,
    #[serde(default, alias = "content")]
    pub body: String,
    /// URL of an attached media file.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub content: PostContent,
    pub shared_from: Option<Id<PostMarker>>,
}

impl Post {
    #[must_use]
    pub fn is_owned_by(&self, user: Id<UserMarker>) -> bool {
        self.user_id == user
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct PostTitle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The post title is invalid: {0}")]
pub struct InvalidPostTitleError(String);

impl PostTitle {
    pub fn new(title: String) -> Result<Self, InvalidPostTitleError> {
        if !title.trim().is_empty() && title.chars().count() <= POST_TITLE_MAX_LEN {
            Ok(PostTitle(title))
        } else {
            Err(InvalidPostTitleError(title))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for PostTitle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostTitle::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"a post title"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::post::{POST_TITLE_MAX_LEN, PostContent, PostTitle};

    #[test]
    fn titles_are_required() {
        assert!(PostTitle::new("hi".to_owned()).is_ok());
        assert!(PostTitle::new(String::new()).is_err());
        assert!(PostTitle::new("\n\t ".to_owned()).is_err());
        assert!(PostTitle::new("x".repeat(POST_TITLE_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn content_defaults() {
        let content: PostContent = serde_json::from_str(r#"{"title":"hi"}"#).unwrap();
        assert_eq!(content.title.get(), "hi");
        assert_eq!(content.body, "");
        assert_eq!(content.image, None);

        assert!(serde_json::from_str::<PostContent>(r#"{"body":"no title"}"#).is_err());
        assert!(serde_json::from_str::<PostContent>(r#"{"title":""}"#).is_err());
    }

    #[test]
    fn body_accepts_content_key() {
        let content: PostContent =
            serde_json::from_str(r#"{"title":"hi","content":"hello there"}"#).unwrap();
        assert_eq!(content.body, "hello there");

        assert!(
            serde_json::from_str::<PostContent>(r#"{"title":"hi","body":"a","content":"b"}"#)
                .is_err()
        );
    }
}

//! In-memory [`Store`], used when no database is configured and in tests.
//!
//! All tables sit behind one async lock, so every store call is atomic.
//! Data is lost when the process exits.

use crate::store::{DbError, Result, Store};
use async_trait::async_trait;
use plaza_common::model::{
    Id,
    auth::{AuthTokenHash, Authentication},
    comment::{Comment, CommentContent, CommentMarker, CreateComment},
    friend_request::{
        CreateFriendRequest, FriendRequest, FriendRequestAction, FriendRequestMarker,
        FriendRequestStatus,
    },
    like::{Like, LikeToggle},
    post::{CreatePost, Post, PostContent, PostMarker},
    user::{CreateUser, Email, UpdateUser, User, UserCredentials, UserMarker},
};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    users: BTreeMap<i64, UserCredentials>,
    auths: Vec<Authentication>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    likes: BTreeMap<i64, Like>,
    friend_requests: BTreeMap<i64, FriendRequest>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    /// Ids are unique across all tables, which is stricter than the database needs.
    fn next_id<Marker>(&mut self) -> Id<Marker> {
        self.last_id += 1;
        Id::new(self.last_id)
    }

    fn require_user(&self, user_id: Id<UserMarker>) -> Result<()> {
        if self.users.contains_key(&user_id.get()) {
            Ok(())
        } else {
            Err(DbError::ForeignKeyViolation)
        }
    }

    fn require_post(&self, post_id: Id<PostMarker>) -> Result<()> {
        if self.posts.contains_key(&post_id.get()) {
            Ok(())
        } else {
            Err(DbError::ForeignKeyViolation)
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let mut tables = self.tables.write().await;

        if tables
            .users
            .values()
            .any(|existing| existing.user.email == user.email)
        {
            return Err(DbError::UniqueViolation);
        }

        let now = OffsetDateTime::now_utc();
        let created = User {
            id: tables.next_id(),
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(
            created.id.get(),
            UserCredentials {
                user: created.clone(),
                password_hash: user.password_hash.clone(),
            },
        );

        Ok(created)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let tables = self.tables.read().await;

        Ok(tables
            .users
            .get(&user_id.get())
            .map(|credentials| credentials.user.clone()))
    }

    async fn fetch_users(&self) -> Result<Vec<User>> {
        let tables = self.tables.read().await;

        Ok(tables
            .users
            .values()
            .map(|credentials| credentials.user.clone())
            .collect())
    }

    async fn fetch_credentials_by_email(&self, email: &Email) -> Result<Option<UserCredentials>> {
        let tables = self.tables.read().await;

        Ok(tables
            .users
            .values()
            .find(|credentials| &credentials.user.email == email)
            .cloned())
    }

    async fn update_user(
        &self,
        user_id: Id<UserMarker>,
        update: &UpdateUser,
    ) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;

        if let Some(email) = &update.email
            && tables.users.values().any(|existing| {
                existing.user.id != user_id && &existing.user.email == email
            })
        {
            return Err(DbError::UniqueViolation);
        }

        let Some(credentials) = tables.users.get_mut(&user_id.get()) else {
            return Ok(None);
        };
        if let Some(name) = &update.name {
            credentials.user.name = name.clone();
        }
        if let Some(email) = &update.email {
            credentials.user.email = email.clone();
        }
        credentials.user.updated_at = OffsetDateTime::now_utc();

        Ok(Some(credentials.user.clone()))
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let mut tables = self.tables.write().await;

        tables.require_user(authentication.user)?;
        if tables
            .auths
            .iter()
            .any(|existing| existing.token_hash == authentication.token_hash)
        {
            return Err(DbError::UniqueViolation);
        }

        tables.auths.push(authentication.clone());
        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let tables = self.tables.read().await;

        Ok(tables
            .auths
            .iter()
            .find(|authentication| &authentication.token_hash == token_hash)
            .cloned())
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let mut tables = self.tables.write().await;

        let before = tables.auths.len();
        tables
            .auths
            .retain(|authentication| &authentication.token_hash != token_hash);

        Ok(tables.auths.len() < before)
    }

    async fn delete_user_auths(&self, user_id: Id<UserMarker>) -> Result<u64> {
        let mut tables = self.tables.write().await;

        let before = tables.auths.len();
        tables.auths.retain(|authentication| authentication.user != user_id);

        Ok((before - tables.auths.len()) as u64)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let mut tables = self.tables.write().await;

        tables.require_user(post.author)?;
        if let Some(shared_from) = post.shared_from {
            tables.require_post(shared_from)?;
        }

        let now = OffsetDateTime::now_utc();
        let created = Post {
            id: tables.next_id(),
            user_id: post.author,
            content: post.content.clone(),
            shared_from: post.shared_from,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(created.id.get(), created.clone());

        Ok(created)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.tables.read().await;

        Ok(tables.posts.get(&post_id.get()).cloned())
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;

        Ok(tables.posts.values().cloned().collect())
    }

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;

        Ok(tables
            .posts
            .values()
            .filter(|post| post.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables.write().await;

        Ok(tables.posts.get_mut(&post_id.get()).map(|post| {
            post.content = content.clone();
            post.updated_at = OffsetDateTime::now_utc();
            post.clone()
        }))
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let mut tables = self.tables.write().await;

        if tables.posts.remove(&post_id.get()).is_none() {
            return Ok(false);
        }

        tables.comments.retain(|_, comment| comment.post_id != post_id);
        tables.likes.retain(|_, like| like.post_id != post_id);
        for post in tables.posts.values_mut() {
            if post.shared_from == Some(post_id) {
                post.shared_from = None;
            }
        }

        Ok(true)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let mut tables = self.tables.write().await;

        tables.require_post(comment.post)?;
        tables.require_user(comment.author)?;

        let now = OffsetDateTime::now_utc();
        let created = Comment {
            id: tables.next_id(),
            post_id: comment.post,
            user_id: comment.author,
            content: comment.content.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.comments.insert(created.id.get(), created.clone());

        Ok(created)
    }

    async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let tables = self.tables.read().await;

        Ok(tables.comments.get(&comment_id.get()).cloned())
    }

    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let tables = self.tables.read().await;

        Ok(tables
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn update_comment(
        &self,
        comment_id: Id<CommentMarker>,
        content: &CommentContent,
    ) -> Result<Option<Comment>> {
        let mut tables = self.tables.write().await;

        Ok(tables.comments.get_mut(&comment_id.get()).map(|comment| {
            comment.content = content.clone();
            comment.updated_at = OffsetDateTime::now_utc();
            comment.clone()
        }))
    }

    async fn delete_comment(&self, comment_id: Id<CommentMarker>) -> Result<bool> {
        let mut tables = self.tables.write().await;

        Ok(tables.comments.remove(&comment_id.get()).is_some())
    }

    async fn toggle_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<LikeToggle> {
        let mut tables = self.tables.write().await;

        tables.require_user(user_id)?;
        tables.require_post(post_id)?;

        let existing = tables
            .likes
            .values()
            .find(|like| like.user_id == user_id && like.post_id == post_id)
            .map(|like| like.id);

        if let Some(like_id) = existing {
            tables.likes.remove(&like_id.get());
            return Ok(LikeToggle::Unliked);
        }

        let like = Like {
            id: tables.next_id(),
            user_id,
            post_id,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.likes.insert(like.id.get(), like.clone());

        Ok(LikeToggle::Liked(like))
    }

    async fn fetch_user_likes(&self, user_id: Id<UserMarker>) -> Result<Vec<Like>> {
        let tables = self.tables.read().await;

        Ok(tables
            .likes
            .values()
            .filter(|like| like.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_friend_request(&self, request: CreateFriendRequest) -> Result<FriendRequest> {
        let mut tables = self.tables.write().await;

        tables.require_user(request.sender())?;
        tables.require_user(request.recipient())?;

        let live_pair_exists = tables.friend_requests.values().any(|existing| {
            existing.status.is_live()
                && existing.involves(request.sender())
                && existing.involves(request.recipient())
        });
        if live_pair_exists {
            return Err(DbError::UniqueViolation);
        }

        let now = OffsetDateTime::now_utc();
        let created = FriendRequest {
            id: tables.next_id(),
            sender_id: request.sender(),
            recipient_id: request.recipient(),
            status: FriendRequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables
            .friend_requests
            .insert(created.id.get(), created.clone());

        Ok(created)
    }

    async fn fetch_friend_request(
        &self,
        request_id: Id<FriendRequestMarker>,
    ) -> Result<Option<FriendRequest>> {
        let tables = self.tables.read().await;

        Ok(tables.friend_requests.get(&request_id.get()).cloned())
    }

    async fn fetch_pending_friend_requests(
        &self,
        recipient_id: Id<UserMarker>,
    ) -> Result<Vec<FriendRequest>> {
        let tables = self.tables.read().await;

        Ok(tables
            .friend_requests
            .values()
            .filter(|request| {
                request.recipient_id == recipient_id
                    && request.status == FriendRequestStatus::Pending
            })
            .cloned()
            .collect())
    }

    async fn transition_friend_request(
        &self,
        request_id: Id<FriendRequestMarker>,
        actor: Id<UserMarker>,
        action: FriendRequestAction,
    ) -> Result<Option<FriendRequest>> {
        let mut tables = self.tables.write().await;

        let Some(request) = tables.friend_requests.get_mut(&request_id.get()) else {
            return Ok(None);
        };

        request.status = request.transition(actor, action)?;
        request.updated_at = OffsetDateTime::now_utc();

        Ok(Some(request.clone()))
    }

    async fn remove_friendship(
        &self,
        request_id: Id<FriendRequestMarker>,
        actor: Id<UserMarker>,
    ) -> Result<Option<FriendRequest>> {
        let mut tables = self.tables.write().await;

        let Some(request) = tables.friend_requests.get(&request_id.get()) else {
            return Ok(None);
        };
        request.check_removal(actor)?;

        Ok(tables.friend_requests.remove(&request_id.get()))
    }

    async fn fetch_friends(&self, user_id: Id<UserMarker>) -> Result<Vec<User>> {
        let tables = self.tables.read().await;

        let mut friends: Vec<User> = tables
            .friend_requests
            .values()
            .filter(|request| request.status == FriendRequestStatus::Accepted)
            .filter_map(|request| request.other_party(user_id))
            .filter_map(|friend_id| tables.users.get(&friend_id.get()))
            .map(|credentials| credentials.user.clone())
            .collect();
        friends.sort_by_key(|friend| friend.id);

        Ok(friends)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        memory::MemoryStore,
        store::{DbError, Store},
    };
    use plaza_common::model::{
        Id,
        auth::PasswordHash,
        friend_request::{CreateFriendRequest, FriendRequestAction, FriendRequestError},
        post::{CreatePost, PostContent, PostTitle},
        user::{CreateUser, Email, UpdateUser, User, UserName},
    };
    use std::sync::Arc;

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(&CreateUser {
                name: UserName::new(name.to_owned()).unwrap(),
                email: Email::new(format!("{name}@example.com")).unwrap(),
                password_hash: PasswordHash::from_phc_string("$argon2id$stub".to_owned()),
            })
            .await
            .unwrap()
    }

    fn post_by(author: &User) -> CreatePost {
        CreatePost {
            author: author.id,
            content: PostContent {
                title: PostTitle::new("hi".to_owned()).unwrap(),
                body: String::new(),
                image: None,
            },
            shared_from: None,
        }
    }

    #[tokio::test]
    async fn emails_are_unique() {
        let store = MemoryStore::new();
        user(&store, "ada").await;

        let duplicate = store
            .create_user(&CreateUser {
                name: UserName::new("Other Ada".to_owned()).unwrap(),
                email: Email::new("ADA@example.com".to_owned()).unwrap(),
                password_hash: PasswordHash::from_phc_string("$argon2id$stub".to_owned()),
            })
            .await;

        assert!(matches!(duplicate, Err(DbError::UniqueViolation)));
    }

    #[tokio::test]
    async fn profile_updates_keep_emails_unique() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada").await;
        user(&store, "bob").await;

        let taken = store
            .update_user(
                ada.id,
                &UpdateUser {
                    name: None,
                    email: Some(Email::new("Bob@example.com".to_owned()).unwrap()),
                },
            )
            .await;
        assert!(matches!(taken, Err(DbError::UniqueViolation)));

        let own_email = UpdateUser {
            name: Some(UserName::new("Ada L.".to_owned()).unwrap()),
            email: Some(ada.email.clone()),
        };
        let updated = store.update_user(ada.id, &own_email).await.unwrap().unwrap();
        assert_eq!(updated.name.get(), "Ada L.");
        assert_eq!(updated.email, ada.email);
        assert_eq!(store.fetch_user(ada.id).await.unwrap(), Some(updated));

        let missing = store.update_user(Id::new(999), &own_email).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn toggling_twice_leaves_no_like() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada").await;
        let post = store.create_post(&post_by(&ada)).await.unwrap();

        assert!(store.toggle_like(ada.id, post.id).await.unwrap().is_liked());
        assert_eq!(store.fetch_user_likes(ada.id).await.unwrap().len(), 1);

        assert!(!store.toggle_like(ada.id, post.id).await.unwrap().is_liked());
        assert!(store.fetch_user_likes(ada.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_toggles_never_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let ada = user(&store, "ada").await;
        let post = store.create_post(&post_by(&ada)).await.unwrap();

        let (user_id, post_id) = (ada.id, post.id);

        let handles: Vec<_> = (0..9)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.toggle_like(user_id, post_id).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // An odd number of atomic toggles ends liked, exactly once.
        assert_eq!(store.fetch_user_likes(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn liking_a_missing_post_fails() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada").await;

        assert!(matches!(
            store.toggle_like(ada.id, Id::new(404)).await,
            Err(DbError::ForeignKeyViolation)
        ));
    }

    #[tokio::test]
    async fn deleting_a_post_cascades() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada").await;
        let original = store.create_post(&post_by(&ada)).await.unwrap();
        let share = store
            .create_post(&CreatePost {
                shared_from: Some(original.id),
                ..post_by(&ada)
            })
            .await
            .unwrap();
        store.toggle_like(ada.id, original.id).await.unwrap();

        assert!(store.delete_post(original.id).await.unwrap());
        assert!(!store.delete_post(original.id).await.unwrap());

        assert!(store.fetch_user_likes(ada.id).await.unwrap().is_empty());
        let share = store.fetch_post(share.id).await.unwrap().unwrap();
        assert_eq!(share.shared_from, None);
    }

    #[tokio::test]
    async fn friendship_lifecycle() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada").await;
        let bob = user(&store, "bob").await;

        let request = store
            .create_friend_request(CreateFriendRequest::new(bob.id, ada.id).unwrap())
            .await
            .unwrap();

        // Neither direction may be requested again while the first is live.
        for (sender, recipient) in [(bob.id, ada.id), (ada.id, bob.id)] {
            assert!(matches!(
                store
                    .create_friend_request(CreateFriendRequest::new(sender, recipient).unwrap())
                    .await,
                Err(DbError::UniqueViolation)
            ));
        }

        assert!(matches!(
            store
                .transition_friend_request(request.id, bob.id, FriendRequestAction::Accept)
                .await,
            Err(DbError::FriendRequest(FriendRequestError::NotRecipient))
        ));
        assert_eq!(
            store.fetch_pending_friend_requests(ada.id).await.unwrap(),
            vec![request.clone()]
        );

        store
            .transition_friend_request(request.id, ada.id, FriendRequestAction::Accept)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.fetch_friends(ada.id).await.unwrap(), vec![bob.clone()]);
        assert_eq!(store.fetch_friends(bob.id).await.unwrap(), vec![ada.clone()]);
        assert!(store.fetch_pending_friend_requests(ada.id).await.unwrap().is_empty());

        store.remove_friendship(request.id, bob.id).await.unwrap().unwrap();
        assert!(store.fetch_friends(ada.id).await.unwrap().is_empty());
        assert!(store.fetch_friend_request(request.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn declined_requests_do_not_block() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada").await;
        let bob = user(&store, "bob").await;

        let request = store
            .create_friend_request(CreateFriendRequest::new(bob.id, ada.id).unwrap())
            .await
            .unwrap();
        store
            .transition_friend_request(request.id, ada.id, FriendRequestAction::Decline)
            .await
            .unwrap();

        assert!(matches!(
            store.remove_friendship(request.id, ada.id).await,
            Err(DbError::FriendRequest(FriendRequestError::NotAccepted))
        ));
        assert!(
            store
                .create_friend_request(CreateFriendRequest::new(bob.id, ada.id).unwrap())
                .await
                .is_ok()
        );
    }
}

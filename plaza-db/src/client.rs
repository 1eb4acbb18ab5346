use crate::{
    record::{
        AuthenticationRecord, CommentRecord, FriendRequestRecord, LikeRecord, PostRecord,
        UserCredentialsRecord, UserRecord,
    },
    store::{DbError, Result, Store},
};
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
    user::{CreateUser, Email, UpdateUser, User, UserCredentials, UserMarker, UserName},
};
use sqlx::{PgPool, Postgres, Transaction, postgres::PgPoolOptions, query, query_as};
use tracing::{debug, info};

/// How often a like toggle is attempted before giving up with [`DbError::Conflict`].
pub const LIKE_TOGGLE_ATTEMPTS: usize = 2;

const USER_COLUMNS: &str = "users.id, users.name, users.email, users.created_at, users.updated_at";
const POST_COLUMNS: &str = "id, user_id, title, body, image, shared_from, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, post_id, user_id, content, created_at, updated_at";
const FRIEND_REQUEST_COLUMNS: &str =
    "id, sender_id, recipient_id, status, created_at, updated_at";

/// [`Store`] backed by Postgres.
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and brings the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections, "Connected to database and applied migrations");

        Ok(Self::new(pool))
    }

    async fn lock_friend_request(
        tx: &mut Transaction<'_, Postgres>,
        request_id: Id<FriendRequestMarker>,
    ) -> Result<Option<FriendRequest>> {
        let record = query_as::<_, FriendRequestRecord>(&format!(
            "SELECT {FRIEND_REQUEST_COLUMNS} FROM friend_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(request_id.get())
        .fetch_optional(&mut **tx)
        .await?;

        let request = record.map(FriendRequest::try_from).transpose()?;
        Ok(request)
    }

    /// One attempt at toggling. `None` means a concurrent toggle inserted the
    /// same pair between our delete and our insert.
    async fn try_toggle_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<Option<LikeToggle>> {
        let mut tx = self.pool.begin().await?;

        let deleted = query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id.get())
            .bind(post_id.get())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted > 0 {
            tx.commit().await?;
            return Ok(Some(LikeToggle::Unliked));
        }

        let inserted = query_as::<_, LikeRecord>(
            "
            INSERT INTO likes (user_id, post_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, post_id) DO NOTHING
            RETURNING id, user_id, post_id, created_at
            ",
        )
        .bind(user_id.get())
        .bind(post_id.get())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(record) = inserted {
            tx.commit().await?;
            Ok(Some(LikeToggle::Liked(record.into())))
        } else {
            tx.rollback().await?;
            Ok(None)
        }
    }
}

#[async_trait]
impl Store for DbClient {
    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let record = query_as::<_, UserRecord>(&format!(
            "
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.name.get())
        .bind(user.email.get())
        .bind(user.password_hash.as_phc_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE users.id = $1"
        ))
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_users(&self) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY users.id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(users)
    }

    async fn fetch_credentials_by_email(&self, email: &Email) -> Result<Option<UserCredentials>> {
        let record = query_as::<_, UserCredentialsRecord>(&format!(
            "SELECT {USER_COLUMNS}, users.password_hash FROM users WHERE users.email = $1"
        ))
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(UserCredentials::try_from).transpose()?;
        Ok(credentials)
    }

    async fn update_user(
        &self,
        user_id: Id<UserMarker>,
        update: &UpdateUser,
    ) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(&format!(
            "
            UPDATE users
            SET name = COALESCE($2, name), email = COALESCE($3, email), updated_at = now()
            WHERE users.id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user_id.get())
        .bind(update.name.as_ref().map(UserName::get))
        .bind(update.email.as_ref().map(Email::get))
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO auth_tokens (user_id, token_hash, expires_after_seconds, created_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(authentication.user.get())
        .bind(&authentication.token_hash.0[..])
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.whole_seconds()),
        )
        .bind(authentication.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT user_id, token_hash, created_at, expires_after_seconds
            FROM auth_tokens
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let deleted = query("DELETE FROM auth_tokens WHERE token_hash = $1")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn delete_user_auths(&self, user_id: Id<UserMarker>) -> Result<u64> {
        let deleted = query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id.get())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let record = query_as::<_, PostRecord>(&format!(
            "
            INSERT INTO posts (user_id, title, body, image, shared_from)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(post.author.get())
        .bind(post.content.title.get())
        .bind(&post.content.body)
        .bind(post.content.image.as_deref())
        .bind(post.shared_from.map(Id::get))
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let records =
            query_as::<_, PostRecord>(&format!("SELECT {POST_COLUMNS} FROM posts ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(&format!(
            "
            UPDATE posts
            SET title = $2, body = $3, image = $4, updated_at = now()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(post_id.get())
        .bind(content.title.get())
        .bind(&content.body)
        .bind(content.image.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let deleted = query("DELETE FROM posts WHERE id = $1")
            .bind(post_id.get())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let record = query_as::<_, CommentRecord>(&format!(
            "
            INSERT INTO comments (post_id, user_id, content)
            VALUES ($1, $2, $3)
            RETURNING {COMMENT_COLUMNS}
            "
        ))
        .bind(comment.post.get())
        .bind(comment.author.get())
        .bind(comment.content.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let record = query_as::<_, CommentRecord>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(comment_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let comment = record.map(Comment::try_from).transpose()?;
        Ok(comment)
    }

    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 ORDER BY id"
        ))
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    async fn update_comment(
        &self,
        comment_id: Id<CommentMarker>,
        content: &CommentContent,
    ) -> Result<Option<Comment>> {
        let record = query_as::<_, CommentRecord>(&format!(
            "
            UPDATE comments
            SET content = $2, updated_at = now()
            WHERE id = $1
            RETURNING {COMMENT_COLUMNS}
            "
        ))
        .bind(comment_id.get())
        .bind(content.get())
        .fetch_optional(&self.pool)
        .await?;

        let comment = record.map(Comment::try_from).transpose()?;
        Ok(comment)
    }

    async fn delete_comment(&self, comment_id: Id<CommentMarker>) -> Result<bool> {
        let deleted = query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id.get())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn toggle_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<LikeToggle> {
        for attempt in 1..=LIKE_TOGGLE_ATTEMPTS {
            if let Some(toggle) = self.try_toggle_like(user_id, post_id).await? {
                return Ok(toggle);
            }
            debug!(%user_id, %post_id, attempt, "Like toggle lost a race");
        }

        Err(DbError::Conflict)
    }

    async fn fetch_user_likes(&self, user_id: Id<UserMarker>) -> Result<Vec<Like>> {
        let records = query_as::<_, LikeRecord>(
            "
            SELECT id, user_id, post_id, created_at
            FROM likes
            WHERE user_id = $1
            ORDER BY id
            ",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Like::from).collect())
    }

    async fn create_friend_request(&self, request: CreateFriendRequest) -> Result<FriendRequest> {
        let record = query_as::<_, FriendRequestRecord>(&format!(
            "
            INSERT INTO friend_requests (sender_id, recipient_id, status)
            VALUES ($1, $2, $3)
            RETURNING {FRIEND_REQUEST_COLUMNS}
            "
        ))
        .bind(request.sender().get())
        .bind(request.recipient().get())
        .bind(FriendRequestStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn fetch_friend_request(
        &self,
        request_id: Id<FriendRequestMarker>,
    ) -> Result<Option<FriendRequest>> {
        let record = query_as::<_, FriendRequestRecord>(&format!(
            "SELECT {FRIEND_REQUEST_COLUMNS} FROM friend_requests WHERE id = $1"
        ))
        .bind(request_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let request = record.map(FriendRequest::try_from).transpose()?;
        Ok(request)
    }

    async fn fetch_pending_friend_requests(
        &self,
        recipient_id: Id<UserMarker>,
    ) -> Result<Vec<FriendRequest>> {
        let records = query_as::<_, FriendRequestRecord>(&format!(
            "
            SELECT {FRIEND_REQUEST_COLUMNS}
            FROM friend_requests
            WHERE recipient_id = $1 AND status = $2
            ORDER BY id
            "
        ))
        .bind(recipient_id.get())
        .bind(FriendRequestStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        let requests = records
            .into_iter()
            .map(FriendRequest::try_from)
            .collect::<Result<_, _>>()?;
        Ok(requests)
    }

    async fn transition_friend_request(
        &self,
        request_id: Id<FriendRequestMarker>,
        actor: Id<UserMarker>,
        action: FriendRequestAction,
    ) -> Result<Option<FriendRequest>> {
        let mut tx = self.pool.begin().await?;

        let Some(request) = Self::lock_friend_request(&mut tx, request_id).await? else {
            return Ok(None);
        };
        let status = request.transition(actor, action)?;

        let record = query_as::<_, FriendRequestRecord>(&format!(
            "
            UPDATE friend_requests
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {FRIEND_REQUEST_COLUMNS}
            "
        ))
        .bind(request_id.get())
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(record.try_into()?))
    }

    async fn remove_friendship(
        &self,
        request_id: Id<FriendRequestMarker>,
        actor: Id<UserMarker>,
    ) -> Result<Option<FriendRequest>> {
        let mut tx = self.pool.begin().await?;

        let Some(request) = Self::lock_friend_request(&mut tx, request_id).await? else {
            return Ok(None);
        };
        request.check_removal(actor)?;

        query("DELETE FROM friend_requests WHERE id = $1")
            .bind(request_id.get())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(request))
    }

    async fn fetch_friends(&self, user_id: Id<UserMarker>) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(&format!(
            "
            SELECT {USER_COLUMNS}
            FROM friend_requests
            JOIN users ON users.id = CASE
                WHEN friend_requests.sender_id = $1 THEN friend_requests.recipient_id
                ELSE friend_requests.sender_id
            END
            WHERE friend_requests.status = $2
                AND (friend_requests.sender_id = $1 OR friend_requests.recipient_id = $1)
            ORDER BY users.id
            "
        ))
        .bind(user_id.get())
        .bind(FriendRequestStatus::Accepted.as_str())
        .fetch_all(&self.pool)
        .await?;

        let friends = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(friends)
    }
}

//! Registration, login, logout and bearer token resolution.

use crate::server::{Result, ServerError};
use plaza_common::{
    model::{
        Id,
        auth::{AuthToken, Authentication, PasswordHash},
        user::{CreateUser, Email, Password, UpdateUser, User, UserMarker, UserName},
    },
    util::PositiveDuration,
};
use plaza_db::store::{DbError, Store};
use time::OffsetDateTime;
use tracing::{debug, info};

/// How long newly issued tokens stay valid.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct TokenPolicy {
    pub lifetime: Option<PositiveDuration>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Registration {
    pub name: UserName,
    pub email: Email,
    pub password: Password,
    pub password_confirmation: String,
}

pub async fn register(
    store: &dyn Store,
    policy: TokenPolicy,
    registration: Registration,
) -> Result<(User, AuthToken)> {
    if registration.password.get() != registration.password_confirmation {
        return Err(ServerError::PasswordMismatch);
    }
    if store
        .fetch_credentials_by_email(&registration.email)
        .await?
        .is_some()
    {
        return Err(ServerError::EmailTaken);
    }

    let password_hash = PasswordHash::generate(&registration.password)?;
    let user = store
        .create_user(&CreateUser {
            name: registration.name,
            email: registration.email,
            password_hash,
        })
        .await
        .map_err(|err| match err {
            DbError::UniqueViolation => ServerError::EmailTaken,
            err => err.into(),
        })?;

    info!(user_id = %user.id, "Registered user");

    let token = issue_token(store, policy, user.id).await?;
    Ok((user, token))
}

pub async fn login(
    store: &dyn Store,
    policy: TokenPolicy,
    email: &str,
    password: &str,
) -> Result<(User, AuthToken)> {
    let email = Email::new(email.to_owned()).map_err(|_| ServerError::InvalidCredentials)?;

    let credentials = store
        .fetch_credentials_by_email(&email)
        .await?
        .ok_or(ServerError::InvalidCredentials)?;

    if !credentials.password_hash.verify(password)? {
        return Err(ServerError::InvalidCredentials);
    }

    let token = issue_token(store, policy, credentials.user.id).await?;
    info!(user_id = %credentials.user.id, "User logged in");

    Ok((credentials.user, token))
}

/// Revokes every token of the user, not only the one used for this request.
pub async fn logout(store: &dyn Store, user_id: Id<UserMarker>) -> Result<u64> {
    let revoked = store.delete_user_auths(user_id).await?;
    info!(%user_id, revoked, "User logged out");

    Ok(revoked)
}

pub async fn issue_token(
    store: &dyn Store,
    policy: TokenPolicy,
    user_id: Id<UserMarker>,
) -> Result<AuthToken> {
    let token = AuthToken::generate_random(user_id);

    store
        .create_auth(&Authentication {
            user: user_id,
            token_hash: token.hash()?,
            created_at: OffsetDateTime::now_utc(),
            expires_after: policy.lifetime,
        })
        .await?;

    Ok(token)
}

/// Resolves a presented token to the id of the user it was issued to.
pub async fn authenticate(store: &dyn Store, token: &AuthToken) -> Result<Id<UserMarker>> {
    let token_hash = token.hash()?;

    let authentication = store
        .fetch_auth(&token_hash)
        .await?
        .ok_or(ServerError::InvalidToken)?;

    if authentication.user != token.user_id {
        return Err(ServerError::InvalidToken);
    }
    if authentication.is_expired_at(OffsetDateTime::now_utc()) {
        debug!(user_id = %authentication.user, "Rejecting expired token");
        store.delete_auth(&token_hash).await?;
        return Err(ServerError::InvalidToken);
    }

    Ok(authentication.user)
}

pub async fn current_user(store: &dyn Store, user_id: Id<UserMarker>) -> Result<User> {
    store
        .fetch_user(user_id)
        .await?
        .ok_or(ServerError::InvalidToken)
}

/// Changes the profile of `user_id`. Only the user themselves may do so.
pub async fn update_profile(
    store: &dyn Store,
    actor: Id<UserMarker>,
    user_id: Id<UserMarker>,
    update: &UpdateUser,
) -> Result<User> {
    if actor != user_id {
        return Err(ServerError::NotProfileOwner(user_id));
    }

    let user = store
        .update_user(user_id, update)
        .await
        .map_err(|err| match err {
            DbError::UniqueViolation => ServerError::EmailTaken,
            err => err.into(),
        })?
        .ok_or(ServerError::UserByIdNotFound(user_id))?;

    info!(%user_id, "Updated profile");
    Ok(user)
}

use crate::{
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        json::{Created, Json},
        routes::{DataResponse, MessageResponse},
    },
    service::identity::{self, Registration, TokenPolicy},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use plaza_common::model::user::{Email, Password, User, UserName};
use plaza_db::store::SharedStore;
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_post(logout)
        .typed_get(current_user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/register", rejection(ServerError))]
struct RegisterPath();

#[derive(Deserialize)]
struct RegisterBody {
    name: UserName,
    email: Email,
    password: Password,
    #[serde(alias = "confirm_password")]
    c_password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    success: bool,
    message: &'static str,
    access_token: String,
    data: User,
}

async fn register(
    RegisterPath(): RegisterPath,
    State(store): State<SharedStore>,
    State(policy): State<TokenPolicy>,
    Json(body): Json<RegisterBody>,
) -> Result<Created<RegisterResponse>> {
    let registration = Registration {
        name: body.name,
        email: body.email,
        password: body.password,
        password_confirmation: body.c_password,
    };
    let (user, token) = identity::register(&*store, policy, registration).await?;

    let response = RegisterResponse {
        success: true,
        message: "User registered successfully",
        access_token: token.as_token_str(),
        data: user,
    };
    Ok(Created(response))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login", rejection(ServerError))]
struct LoginPath();

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    success: bool,
    message: &'static str,
    access_token: String,
    token_type: &'static str,
    data: User,
}

async fn login(
    LoginPath(): LoginPath,
    State(store): State<SharedStore>,
    State(policy): State<TokenPolicy>,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>> {
    let (user, token) = identity::login(&*store, policy, &body.email, &body.password).await?;

    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful",
        access_token: token.as_token_str(),
        token_type: "Bearer",
        data: user,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>> {
    identity::logout(&*store, user.user_id()).await?;

    Ok(Json(MessageResponse::new("Logged out successfully")))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/user", rejection(ServerError))]
struct CurrentUserPath();

async fn current_user(
    CurrentUserPath(): CurrentUserPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
) -> Result<Json<DataResponse<User>>> {
    let user = identity::current_user(&*store, user.user_id()).await?;

    Ok(Json(DataResponse::new(user)))
}

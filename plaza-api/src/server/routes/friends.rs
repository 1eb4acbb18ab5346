use crate::{
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        json::{Created, Json},
        routes::MessageResponse,
    },
    service::graph,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use plaza_common::model::{
    Id,
    friend_request::{FriendRequest, FriendRequestAction, FriendRequestMarker},
    user::{User, UserMarker},
};
use plaza_db::store::SharedStore;
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(send_friend_request)
        .typed_get(get_friend_requests)
        .typed_get(get_friend_request)
        .typed_post(accept_friend_request)
        .typed_post(decline_friend_request)
        .typed_get(get_friends)
        .typed_delete(remove_friend)
}

#[derive(Serialize)]
struct FriendRequestResponse {
    message: String,
    friend_request: FriendRequest,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/friend-requests", rejection(ServerError))]
struct FriendRequestsPath();

#[derive(Deserialize)]
struct FriendRequestBody {
    recipient_id: Id<UserMarker>,
}

async fn send_friend_request(
    FriendRequestsPath(): FriendRequestsPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
    Json(body): Json<FriendRequestBody>,
) -> Result<Created<FriendRequestResponse>> {
    let friend_request = graph::send(&*store, user.user_id(), body.recipient_id).await?;

    let response = FriendRequestResponse {
        message: "Friend request sent".to_owned(),
        friend_request,
    };
    Ok(Created(response))
}

#[derive(Serialize)]
struct PendingFriendRequestsResponse {
    friend_requests: Vec<FriendRequest>,
}

async fn get_friend_requests(
    FriendRequestsPath(): FriendRequestsPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
) -> Result<Json<PendingFriendRequestsResponse>> {
    let friend_requests = graph::list_pending(&*store, user.user_id()).await?;

    Ok(Json(PendingFriendRequestsResponse { friend_requests }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/friend-requests/{id}", rejection(ServerError))]
struct FriendRequestPath {
    id: Id<FriendRequestMarker>,
}

#[derive(Serialize)]
struct SingleFriendRequestResponse {
    friend_request: FriendRequest,
}

async fn get_friend_request(
    FriendRequestPath { id }: FriendRequestPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
) -> Result<Json<SingleFriendRequestResponse>> {
    let friend_request = graph::get_request(&*store, id, user.user_id()).await?;

    Ok(Json(SingleFriendRequestResponse { friend_request }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/friend-requests/{id}/accept", rejection(ServerError))]
struct AcceptPath {
    id: Id<FriendRequestMarker>,
}

async fn accept_friend_request(
    AcceptPath { id }: AcceptPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
) -> Result<Json<FriendRequestResponse>> {
    let friend_request = graph::accept(&*store, id, user.user_id()).await?;

    Ok(Json(answered(FriendRequestAction::Accept, friend_request)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/friend-requests/{id}/decline", rejection(ServerError))]
struct DeclinePath {
    id: Id<FriendRequestMarker>,
}

async fn decline_friend_request(
    DeclinePath { id }: DeclinePath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
) -> Result<Json<FriendRequestResponse>> {
    let friend_request = graph::decline(&*store, id, user.user_id()).await?;

    Ok(Json(answered(FriendRequestAction::Decline, friend_request)))
}

fn answered(action: FriendRequestAction, friend_request: FriendRequest) -> FriendRequestResponse {
    FriendRequestResponse {
        message: format!("Friend request {}", action.past_tense()),
        friend_request,
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/friends", rejection(ServerError))]
struct FriendsPath();

#[derive(Serialize)]
struct FriendsResponse {
    friends: Vec<User>,
}

async fn get_friends(
    FriendsPath(): FriendsPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
) -> Result<Json<FriendsResponse>> {
    let friends = graph::list_friends(&*store, user.user_id()).await?;

    Ok(Json(FriendsResponse { friends }))
}

/// `id` is the accepted friend request that forms the friendship.
#[derive(TypedPath, Deserialize)]
#[typed_path("/friends/{id}", rejection(ServerError))]
struct FriendPath {
    id: Id<FriendRequestMarker>,
}

async fn remove_friend(
    FriendPath { id }: FriendPath,
    State(store): State<SharedStore>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>> {
    graph::remove_friend(&*store, id, user.user_id()).await?;

    Ok(Json(MessageResponse::new("Friend removed")))
}

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use plaza_api::{
    media::LocalMediaStore, server::ServerState, service::identity::TokenPolicy,
};
use plaza_db::memory::MemoryStore;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const MEDIA_URL_PREFIX: &str = "/storage";

struct TestApp {
    router: Router,
    _media_dir: TempDir,
}

struct TestUser {
    id: i64,
    token: String,
}

impl TestApp {
    fn new() -> Self {
        let media_dir = tempfile::tempdir().unwrap();
        let state = ServerState {
            store: Arc::new(MemoryStore::new()),
            media: Arc::new(LocalMediaStore::new(media_dir.path(), MEDIA_URL_PREFIX)),
            token_policy: TokenPolicy::default(),
        };
        let router = plaza_api::app(state, media_dir.path(), MEDIA_URL_PREFIX);

        Self {
            router,
            _media_dir: media_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.send(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, value)
    }

    async fn register(&self, name: &str, email: &str) -> TestUser {
        let (status, body) = self
            .json(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "name": name,
                    "email": email,
                    "password": "password1",
                    "c_password": "password1",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        TestUser {
            id: body["data"]["id"].as_i64().unwrap(),
            token: body["accessToken"].as_str().unwrap().to_owned(),
        }
    }

    async fn create_post(&self, user: &TestUser, title: &str) -> i64 {
        let (status, body) = self
            .json(
                Method::POST,
                "/posts",
                Some(&user.token),
                Some(json!({ "title": title })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        body["data"]["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn register_login_and_post() {
    let app = TestApp::new();
    let ada = app.register("Ada", "a@x.com").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "a@x.com", "password": "password1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    let token = body["access_token"].as_str().unwrap().to_owned();

    let (status, body) = app
        .json(
            Method::POST,
            "/posts",
            Some(&token),
            Some(json!({ "title": "hi" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["title"], "hi");
    assert_eq!(body["data"]["user_id"], ada.id);

    let (status, body) = app.json(Method::GET, "/posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .json(Method::GET, "/auth/user", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "a@x.com");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn registration_and_login_failures() {
    let app = TestApp::new();
    app.register("Ada", "a@x.com").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "name": "Imposter",
                "email": "A@x.com",
                "password": "password1",
                "confirm_password": "password1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .json(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "name": "Bob",
                "email": "b@x.com",
                "password": "short",
                "c_password": "short",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app
        .json(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "a@x.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn authentication_is_required() {
    let app = TestApp::new();
    let ada = app.register("Ada", "a@x.com").await;

    let (status, body) = app
        .json(Method::POST, "/posts", None, Some(json!({ "title": "hi" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .json(Method::GET, "/friends", Some("1:bm90:YXRva2Vu"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(Method::POST, "/auth/logout", Some(&ada.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(Method::GET, "/auth/user", Some(&ada.token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn friendship_lifecycle() {
    let app = TestApp::new();
    let ada = app.register("Ada", "a@x.com").await;
    let bob = app.register("Bob", "b@x.com").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/friend-requests",
            Some(&bob.token),
            Some(json!({ "recipient_id": ada.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["friend_request"]["status"], "pending");
    let request_id = body["friend_request"]["id"].as_i64().unwrap();

    let (status, _) = app
        .json(
            Method::POST,
            "/friend-requests",
            Some(&ada.token),
            Some(json!({ "recipient_id": bob.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app
        .json(Method::GET, "/friend-requests", Some(&ada.token), None)
        .await;
    assert_eq!(body["friend_requests"][0]["id"], request_id);

    let accept = format!("/friend-requests/{request_id}/accept");
    let (status, _) = app.json(Method::POST, &accept, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.json(Method::POST, &accept, Some(&ada.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["friend_request"]["status"], "accepted");

    let (_, body) = app.json(Method::GET, "/friends", Some(&ada.token), None).await;
    assert_eq!(body["friends"][0]["id"], bob.id);
    let (_, body) = app.json(Method::GET, "/friends", Some(&bob.token), None).await;
    assert_eq!(body["friends"][0]["id"], ada.id);

    let decline = format!("/friend-requests/{request_id}/decline");
    let (status, _) = app.json(Method::POST, &decline, Some(&ada.token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .json(
            Method::DELETE,
            &format!("/friends/{request_id}"),
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Friend removed");
    let (_, body) = app.json(Method::GET, "/friends", Some(&ada.token), None).await;
    assert_eq!(body["friends"], json!([]));

    let (status, _) = app
        .json(
            Method::POST,
            "/friend-requests",
            Some(&ada.token),
            Some(json!({ "recipient_id": ada.id })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn profile_updates() {
    let app = TestApp::new();
    let ada = app.register("Ada", "a@x.com").await;
    let bob = app.register("Bob", "b@x.com").await;
    let profile = format!("/users/{}", ada.id);

    let (status, body) = app
        .json(
            Method::PUT,
            &profile,
            Some(&bob.token),
            Some(json!({ "name": "Mallory" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .json(
            Method::PUT,
            &profile,
            Some(&ada.token),
            Some(json!({ "name": "Countess", "email": "Ada@Y.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "User updated successfully");
    assert_eq!(body["data"]["name"], "Countess");
    assert_eq!(body["data"]["email"], "ada@y.com");

    let (status, _) = app
        .json(
            Method::PUT,
            &profile,
            Some(&ada.token),
            Some(json!({ "email": "b@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .json(
            Method::PUT,
            &profile,
            Some(&ada.token),
            Some(json!({ "name": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .json(
            Method::PUT,
            &profile,
            None,
            Some(json!({ "name": "Nobody" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = app.json(Method::GET, &profile, None, None).await;
    assert_eq!(body["data"]["name"], "Countess");
}

#[tokio::test]
async fn post_and_comment_ownership() {
    let app = TestApp::new();
    let ada = app.register("Ada", "a@x.com").await;
    let bob = app.register("Bob", "b@x.com").await;
    let post_id = app.create_post(&ada, "hi").await;
    let post = format!("/posts/{post_id}");

    let (status, _) = app
        .json(
            Method::PUT,
            &post,
            Some(&bob.token),
            Some(json!({ "title": "hijacked" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .json(
            Method::PUT,
            &post,
            Some(&ada.token),
            Some(json!({ "title": "hello", "body": "world" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["body"], "world");

    let (status, body) = app
        .json(
            Method::PUT,
            &post,
            Some(&ada.token),
            Some(json!({ "title": "hello", "content": "again" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["body"], "again");

    let (status, comment) = app
        .json(
            Method::POST,
            &format!("{post}/comments"),
            Some(&bob.token),
            Some(json!({ "content": "nice" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment = format!("/comments/{}", comment["id"]);

    let (status, _) = app
        .json(Method::DELETE, &comment, Some(&ada.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app
        .json(Method::DELETE, &comment, Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "nice");
    let (status, _) = app
        .json(Method::DELETE, &comment, Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            Method::POST,
            "/posts/999/comments",
            Some(&bob.token),
            Some(json!({ "content": "?" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.json(Method::DELETE, &post, Some(&ada.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json(Method::GET, &post, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn like_toggle() {
    let app = TestApp::new();
    let ada = app.register("Ada", "a@x.com").await;
    let post_id = app.create_post(&ada, "hi").await;
    let like = json!({ "post_id": post_id });

    let (status, body) = app
        .json(Method::POST, "/likes", Some(&ada.token), Some(like.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["liked"], true);

    let (_, body) = app.json(Method::GET, "/likes", Some(&ada.token), None).await;
    assert_eq!(body["data"][0]["post_id"], post_id);

    let (_, body) = app
        .json(Method::POST, "/likes", Some(&ada.token), Some(like))
        .await;
    assert_eq!(body["liked"], false);

    let (status, _) = app
        .json(
            Method::POST,
            "/likes",
            Some(&ada.token),
            Some(json!({ "post_id": 999 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .json(Method::POST, "/likes", Some(&ada.token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn media_upload() {
    let app = TestApp::new();
    let ada = app.register("Ada", "a@x.com").await;

    let upload = |content_type: &'static str, body: &'static [u8]| {
        Request::builder()
            .method(Method::POST)
            .uri("/media")
            .header(header::AUTHORIZATION, format!("Bearer {}", ada.token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    };

    let response = app.send(upload("text/plain", b"hello")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let response = app.send(upload("image/png", b"")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app.send(upload("image/png", b"\x89PNG")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let url = body["url"].as_str().unwrap().to_owned();
    assert!(url.starts_with("/storage/"));

    let response = app
        .send(Request::get(&url).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"\x89PNG");

    let (status, body) = app
        .json(
            Method::POST,
            "/posts",
            Some(&ada.token),
            Some(json!({ "title": "pic", "image": url })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["image"], url);
}

#[tokio::test]
async fn unknown_routes_use_the_error_envelope() {
    let app = TestApp::new();

    let (status, body) = app.json(Method::GET, "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

//! In-process stand-in for the blog API, served by axum on a random port.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use inkpost_client::{BlogClient, ClientConfig, MemoryStore, SessionStore};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Db {
    users: Vec<(Value, String)>,
    tokens: HashMap<String, String>,
    posts: Vec<Value>,
    comments: Vec<Value>,
}

#[derive(Clone, Default)]
pub struct FakeApi {
    db: Arc<Mutex<Db>>,
    hits: Arc<AtomicUsize>,
    me_delay_ms: Arc<AtomicU64>,
}

type ApiResult = Result<Response, (StatusCode, Json<Value>)>;

fn fail(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "message": message })))
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl FakeApi {
    /// Seeds a user and returns its JSON record.
    pub fn add_user(&self, username: &str, email: &str, password: &str) -> Value {
        let mut db = self.db.lock().unwrap();
        let user = json!({
            "_id": new_id(),
            "id": format!("legacy-{}", db.users.len() + 1),
            "username": username,
            "email": email,
            "firstName": username,
            "lastName": "Tester",
            "createdAt": now(),
        });
        db.users.push((user.clone(), password.to_string()));
        user
    }

    /// Issues a token for an existing user, as a login would.
    pub fn issue_token(&self, user_id: &str) -> String {
        let token = format!("tok-{}", new_id());
        self.db
            .lock()
            .unwrap()
            .tokens
            .insert(token.clone(), user_id.to_string());
        token
    }

    pub fn revoke_all_tokens(&self) {
        self.db.lock().unwrap().tokens.clear();
    }

    /// Holds every `/User/me` response back, to overlap it with other calls.
    pub fn delay_me(&self, delay: Duration) {
        self.me_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn post_count(&self) -> usize {
        self.db.lock().unwrap().posts.len()
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<Value, (StatusCode, Json<Value>)> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "missing token"))?;

        let db = self.db.lock().unwrap();
        let user_id = db
            .tokens
            .get(token)
            .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "invalid or expired token"))?;
        db.users
            .iter()
            .map(|(u, _)| u)
            .find(|u| u["_id"] == *user_id.as_str())
            .cloned()
            .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "unknown user"))
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/User/login", post(login))
            .route("/User/register", post(register))
            .route("/User/me", get(me))
            .route("/User/update/{id}", put(update_user))
            .route("/Post/getpost", get(list_posts))
            .route("/Post/getbyid/{id}", get(get_post))
            .route("/Post/author/{id}", get(posts_by_author))
            .route("/Post/search", get(search_posts))
            .route("/Post/createpost", post(create_post))
            .route("/Post/updatepost/{id}", put(update_post))
            .route("/Post/deletepost/{id}", delete(delete_post))
            .route("/Comment/comment/{post_id}", get(list_comments))
            .route("/Comment/create", post(create_comment))
            .with_state(self.clone())
    }

    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = self.router();
        tokio::spawn(async move { axum::serve(listener, app).await.expect("serve") });
        addr
    }
}

/// Starts a fake API and a client with a fresh in-memory store.
pub async fn start() -> (FakeApi, BlogClient, Arc<MemoryStore>) {
    let api = FakeApi::default();
    let addr = api.serve().await;
    let store = Arc::new(MemoryStore::new());
    let client = client_for(addr, store.clone());
    (api, client, store)
}

pub fn client_for(addr: SocketAddr, store: Arc<dyn SessionStore>) -> BlogClient {
    BlogClient::new(&ClientConfig::new(format!("http://{addr}")), store)
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    listener.local_addr().expect("addr")
}

// ==================== Handlers ====================

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(State(api): State<FakeApi>, Json(body): Json<Credentials>) -> ApiResult {
    api.hit();
    let user = {
        let db = api.db.lock().unwrap();
        db.users
            .iter()
            .find(|(u, p)| u["email"] == body.email.as_str() && *p == body.password)
            .map(|(u, _)| u.clone())
    };
    let user = user.ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Invalid credentials"))?;
    let token = api.issue_token(user["_id"].as_str().unwrap());
    Ok(Json(json!({ "data": user, "token": token })).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Registration {
    username: String,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
}

async fn register(State(api): State<FakeApi>, Json(body): Json<Registration>) -> ApiResult {
    api.hit();
    let taken = api
        .db
        .lock()
        .unwrap()
        .users
        .iter()
        .any(|(u, _)| u["email"] == body.email.as_str());
    if taken {
        return Err(fail(StatusCode::CONFLICT, "Email already registered"));
    }

    let mut user = api.add_user(&body.username, &body.email, &body.password);
    user["firstName"] = json!(body.first_name);
    user["lastName"] = json!(body.last_name);
    {
        let mut db = api.db.lock().unwrap();
        if let Some(entry) = db.users.iter_mut().find(|(u, _)| u["_id"] == user["_id"]) {
            entry.0 = user.clone();
        }
    }
    let token = api.issue_token(user["_id"].as_str().unwrap());
    Ok((StatusCode::CREATED, Json(json!({ "data": user, "token": token }))).into_response())
}

async fn me(State(api): State<FakeApi>, headers: HeaderMap) -> ApiResult {
    api.hit();
    let delay = api.me_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let user = api.authorize(&headers)?;
    Ok(Json(json!({ "data": user })).into_response())
}

async fn update_user(
    State(api): State<FakeApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(changes): Json<Value>,
) -> ApiResult {
    api.hit();
    let caller = api.authorize(&headers)?;
    if caller["_id"] != id.as_str() {
        return Err(fail(StatusCode::FORBIDDEN, "cannot edit another user"));
    }

    let mut db = api.db.lock().unwrap();
    let entry = db
        .users
        .iter_mut()
        .find(|(u, _)| u["_id"] == id.as_str())
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "User not found"))?;
    if let Some(fields) = changes.as_object() {
        for (key, value) in fields {
            entry.0[key] = value.clone();
        }
    }
    Ok(Json(json!({ "data": entry.0.clone() })).into_response())
}

fn author_summary(user: &Value) -> Value {
    json!({
        "_id": user["_id"],
        "id": user["id"],
        "username": user["username"],
        "firstName": user["firstName"],
        "lastName": user["lastName"],
    })
}

async fn list_posts(State(api): State<FakeApi>) -> Json<Value> {
    api.hit();
    Json(Value::Array(api.db.lock().unwrap().posts.clone()))
}

async fn get_post(State(api): State<FakeApi>, Path(id): Path<String>) -> ApiResult {
    api.hit();
    let db = api.db.lock().unwrap();
    db.posts
        .iter()
        .find(|p| p["_id"] == id.as_str())
        .map(|p| Json(p.clone()).into_response())
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Post not found"))
}

async fn posts_by_author(State(api): State<FakeApi>, Path(id): Path<String>) -> Json<Value> {
    api.hit();
    let db = api.db.lock().unwrap();
    let posts = db
        .posts
        .iter()
        .filter(|p| p["author"]["_id"] == id.as_str())
        .cloned()
        .collect();
    Json(Value::Array(posts))
}

#[derive(Deserialize)]
struct Search {
    q: String,
}

async fn search_posts(State(api): State<FakeApi>, Query(search): Query<Search>) -> Json<Value> {
    api.hit();
    let needle = search.q.to_lowercase();
    let db = api.db.lock().unwrap();
    let posts = db
        .posts
        .iter()
        .filter(|p| {
            ["title", "content"].iter().any(|field| {
                p[*field]
                    .as_str()
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
        })
        .cloned()
        .collect();
    Json(Value::Array(posts))
}

async fn create_post(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(input): Json<Value>,
) -> ApiResult {
    api.hit();
    let caller = api.authorize(&headers)?;
    let created = now();
    let post = json!({
        "_id": new_id(),
        "title": input["title"],
        "content": input["content"],
        "excerpt": input["excerpt"],
        "tags": input["tags"],
        "image": input.get("image").cloned().unwrap_or(Value::Null),
        "readTime": input["readTime"],
        "likes": 0,
        "author": author_summary(&caller),
        "createdAt": created,
        "updatedAt": created,
    });
    api.db.lock().unwrap().posts.push(post.clone());
    Ok((StatusCode::CREATED, Json(post)).into_response())
}

async fn update_post(
    State(api): State<FakeApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(changes): Json<Value>,
) -> ApiResult {
    api.hit();
    let caller = api.authorize(&headers)?;
    let mut db = api.db.lock().unwrap();
    let post = db
        .posts
        .iter_mut()
        .find(|p| p["_id"] == id.as_str())
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Post not found"))?;
    if post["author"]["_id"] != caller["_id"] {
        return Err(fail(StatusCode::FORBIDDEN, "not the author"));
    }
    if let Some(fields) = changes.as_object() {
        for (key, value) in fields {
            post[key] = value.clone();
        }
    }
    post["updatedAt"] = json!(now());
    Ok(Json(post.clone()).into_response())
}

async fn delete_post(
    State(api): State<FakeApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult {
    api.hit();
    let caller = api.authorize(&headers)?;
    let mut db = api.db.lock().unwrap();
    let index = db
        .posts
        .iter()
        .position(|p| p["_id"] == id.as_str())
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Post not found"))?;
    if db.posts[index]["author"]["_id"] != caller["_id"] {
        return Err(fail(StatusCode::FORBIDDEN, "not the author"));
    }
    db.posts.remove(index);
    Ok(Json(json!({ "message": "Post deleted" })).into_response())
}

async fn list_comments(State(api): State<FakeApi>, Path(post_id): Path<String>) -> Json<Value> {
    api.hit();
    let db = api.db.lock().unwrap();
    let comments = db
        .comments
        .iter()
        .filter(|c| c["postId"] == post_id.as_str())
        .cloned()
        .collect();
    Json(Value::Array(comments))
}

async fn create_comment(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(input): Json<Value>,
) -> ApiResult {
    api.hit();
    let caller = api.authorize(&headers)?;
    if input["author"] != caller["_id"] {
        return Err(fail(StatusCode::FORBIDDEN, "author mismatch"));
    }
    let comment = json!({
        "_id": new_id(),
        "content": input["content"],
        "author": caller,
        "postId": input["postId"],
        "parentId": input.get("parentId").cloned().unwrap_or(Value::Null),
        "createdAt": now(),
    });
    api.db.lock().unwrap().comments.push(comment.clone());
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

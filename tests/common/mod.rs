#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use base64::prelude::*;
use serde_json::{json, Value};

use blogdash::core::token;
use blogdash::{Config, Dashboard, KeyValue, MemoryStore};

pub const STORAGE_KEY: &str = "blogdash_auth";

/// Unsigned JWT-shaped token with the given subject, expiring `ttl_secs`
/// from now (negative for already expired).
pub fn make_token(sub: &str, ttl_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + ttl_secs;
    let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = BASE64_URL_SAFE_NO_PAD.encode(json!({"sub": sub, "exp": exp}).to_string());
    format!("{header}.{payload}.dGVzdA")
}

pub fn seed_session(storage: &MemoryStore, token: &str, username: &str) {
    let record = json!({"token": token, "username": username}).to_string();
    storage.set(STORAGE_KEY, &record).unwrap();
}

pub fn test_config(base_url: &str) -> Config {
    Config::new(base_url, STORAGE_KEY, std::env::temp_dir(), Duration::from_secs(5)).unwrap()
}

pub fn dashboard(base_url: &str) -> (Dashboard, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let dashboard = Dashboard::new(&test_config(base_url), storage.clone()).unwrap();
    (dashboard, storage)
}

// === Mock backend ===

#[derive(Clone)]
struct User {
    id: i64,
    username: String,
    email: String,
    password: String,
}

#[derive(Default)]
pub struct Backend {
    users: Mutex<Vec<User>>,
    posts: Mutex<Vec<Value>>,
    next_id: AtomicI64,
    /// `Authorization` header of every request, in arrival order.
    pub seen_auth: Mutex<Vec<Option<String>>>,
    pub login_delay: Mutex<Option<Duration>>,
    /// Applied to `GET /posts/` after the list has been read.
    pub list_delay: Mutex<Option<Duration>>,
}

impl Backend {
    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn record(&self, req: &HttpRequest) {
        let header = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.seen_auth.lock().unwrap().push(header);
    }

    fn current_user(&self, req: &HttpRequest) -> Option<User> {
        let header = req.headers().get("Authorization")?.to_str().ok()?;
        let bearer = header.strip_prefix("Bearer ")?;
        if !token::is_valid_token(bearer) {
            return None;
        }
        let sub = token::get_subject_id(bearer)?;
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| sub.matches(u.id))
            .cloned()
    }

    pub fn last_auth(&self) -> Option<String> {
        self.seen_auth.lock().unwrap().last().cloned().flatten()
    }

    pub fn request_count(&self) -> usize {
        self.seen_auth.lock().unwrap().len()
    }
}

fn detail(status: u16, message: &str) -> HttpResponse {
    HttpResponse::build(actix_web::http::StatusCode::from_u16(status).unwrap())
        .json(json!({"detail": message}))
}

async fn register(state: web::Data<Backend>, req: HttpRequest, body: web::Json<Value>) -> HttpResponse {
    state.record(&req);
    let username = body["username"].as_str().unwrap_or_default().to_string();
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();

    let mut users = state.users.lock().unwrap();
    if users.iter().any(|u| u.username == username) {
        return detail(400, "Username already exists");
    }
    if users.iter().any(|u| u.email == email) {
        return detail(400, "Email already registered");
    }
    let user = User {
        id: state.next_id(),
        username,
        email,
        password,
    };
    users.push(user.clone());
    HttpResponse::Created().json(json!({"id": user.id, "username": user.username, "email": user.email}))
}

async fn login(state: web::Data<Backend>, req: HttpRequest, body: web::Json<Value>) -> HttpResponse {
    state.record(&req);
    let delay = *state.login_delay.lock().unwrap();
    if let Some(delay) = delay {
        actix_web::rt::time::sleep(delay).await;
    }
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let user = state
        .users
        .lock()
        .unwrap()
        .iter()
        .find(|u| u.username == username && u.password == password)
        .cloned();
    match user {
        Some(user) => HttpResponse::Ok().json(json!({
            "access_token": make_token(&user.id.to_string(), 3600),
            "token_type": "bearer",
            "username": user.username,
        })),
        None => detail(401, "Invalid username or password"),
    }
}

async fn list_posts(state: web::Data<Backend>, req: HttpRequest) -> HttpResponse {
    state.record(&req);
    let posts: Vec<Value> = state.posts.lock().unwrap().iter().rev().cloned().collect();
    let delay = *state.list_delay.lock().unwrap();
    if let Some(delay) = delay {
        actix_web::rt::time::sleep(delay).await;
    }
    HttpResponse::Ok().json(posts)
}

async fn my_posts(state: web::Data<Backend>, req: HttpRequest) -> HttpResponse {
    state.record(&req);
    let Some(user) = state.current_user(&req) else {
        return detail(401, "Not authenticated");
    };
    let posts: Vec<Value> = state
        .posts
        .lock()
        .unwrap()
        .iter()
        .rev()
        .filter(|p| p["author_id"] == user.id)
        .cloned()
        .collect();
    HttpResponse::Ok().json(posts)
}

async fn create_post(state: web::Data<Backend>, req: HttpRequest, body: web::Json<Value>) -> HttpResponse {
    state.record(&req);
    let Some(user) = state.current_user(&req) else {
        return detail(401, "Not authenticated");
    };
    let post = json!({
        "id": state.next_id(),
        "title": body["title"],
        "content": body["content"],
        "author_id": user.id,
        "author_name": user.username,
        "created_at": chrono::Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
    });
    state.posts.lock().unwrap().push(post.clone());
    HttpResponse::Created().json(post)
}

async fn update_post(
    state: web::Data<Backend>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> HttpResponse {
    state.record(&req);
    let Some(user) = state.current_user(&req) else {
        return detail(401, "Not authenticated");
    };
    let id = path.into_inner();
    let mut posts = state.posts.lock().unwrap();
    let Some(post) = posts.iter_mut().find(|p| p["id"] == id) else {
        return detail(404, "Post not found");
    };
    if post["author_id"] != user.id {
        return detail(403, "Not authorized to edit this post");
    }
    post["title"] = body["title"].clone();
    post["content"] = body["content"].clone();
    HttpResponse::Ok().json(post.clone())
}

async fn delete_post(state: web::Data<Backend>, req: HttpRequest, path: web::Path<i64>) -> HttpResponse {
    state.record(&req);
    let Some(user) = state.current_user(&req) else {
        return detail(401, "Not authenticated");
    };
    let id = path.into_inner();
    let mut posts = state.posts.lock().unwrap();
    let Some(index) = posts.iter().position(|p| p["id"] == id) else {
        return detail(404, "Post not found");
    };
    if posts[index]["author_id"] != user.id {
        return detail(403, "Not authorized to delete this post");
    }
    posts.remove(index);
    HttpResponse::NoContent().finish()
}

pub struct MockBackend {
    pub url: String,
    pub state: web::Data<Backend>,
    handle: ServerHandle,
}

impl MockBackend {
    /// Binds to an ephemeral port. Must run inside an actix system
    /// (`#[actix_web::test]`).
    pub async fn start() -> Self {
        let state = web::Data::new(Backend::default());
        let data = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .route("/auth/register", web::post().to(register))
                .route("/auth/login", web::post().to(login))
                .route("/posts/", web::get().to(list_posts))
                .route("/posts/", web::post().to(create_post))
                .route("/posts/me", web::get().to(my_posts))
                .route("/posts/{id}", web::put().to(update_post))
                .route("/posts/{id}", web::delete().to(delete_post))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind mock backend");
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        Self {
            url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    pub fn add_user(&self, username: &str, password: &str) -> i64 {
        let id = self.state.next_id();
        self.state.users.lock().unwrap().push(User {
            id,
            username: username.to_string(),
            email: format!("{username}@gmail.com"),
            password: password.to_string(),
        });
        id
    }

    pub async fn stop(self) {
        self.handle.stop(true).await;
    }
}

//! HTTP gateway to the blog backend.
//!
//! Every request is signed with the bearer token found in session storage
//! at send time, so a login or logout between two calls is picked up
//! without rebuilding the client. Failures come back as
//! [`ClientError::Network`] carrying the backend's `detail` when it sent
//! one. There is no retry here; callers decide.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::core::errors::ClientError;
use crate::core::store::SessionStore;
use crate::models::{LoginRequest, LoginResponse, NewPost, Post, RegisterRequest, RegisteredUser};

const REQUEST_FAILED: &str = "Request failed";
const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";

/// Supplies the bearer token for outgoing requests.
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

impl TokenSource for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        self.read()
            .map(|record| record.token)
            .filter(|token| !token.is_empty())
    }
}

/// The backend answers list endpoints with an array, but a lone object is
/// accepted as a one-element list.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl ApiClient {
    pub fn new(config: &Config, tokens: Arc<dyn TokenSource>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ClientError::Config(format!("http client: {err}")))?;
        Ok(Self {
            http,
            base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "sending request");
        let builder = self.http.request(method, url);
        match self.tokens.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder, fallback: &str) -> Result<Response, ClientError> {
        let response = builder.send().await.map_err(|err| {
            warn!(error = %err, "request did not complete");
            ClientError::from(err)
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = backend_detail(&body).unwrap_or_else(|| fallback.to_string());
        warn!(status = status.as_u16(), %detail, "request rejected");
        Err(ClientError::network(Some(status.as_u16()), detail))
    }

    async fn send_json<T: DeserializeOwned>(
        builder: RequestBuilder,
        fallback: &str,
    ) -> Result<T, ClientError> {
        let response = Self::send(builder, fallback).await?;
        let status = response.status().as_u16();
        response.json::<T>().await.map_err(|err| {
            warn!(error = %err, "unexpected response body");
            ClientError::network(Some(status), format!("{fallback}: unexpected response body"))
        })
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisteredUser, ClientError> {
        let body = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        Self::send_json(
            self.request(Method::POST, "/auth/register").json(&body),
            REGISTRATION_FAILED,
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ClientError::InvalidCredentials);
        }
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        Self::send_json(self.request(Method::POST, "/auth/login").json(&body), LOGIN_FAILED).await
    }

    pub async fn list_all_posts(&self) -> Result<Vec<Post>, ClientError> {
        let posts: OneOrMany<Post> =
            Self::send_json(self.request(Method::GET, "/posts/"), REQUEST_FAILED).await?;
        Ok(posts.into())
    }

    pub async fn list_own_posts(&self) -> Result<Vec<Post>, ClientError> {
        let posts: OneOrMany<Post> =
            Self::send_json(self.request(Method::GET, "/posts/me"), REQUEST_FAILED).await?;
        Ok(posts.into())
    }

    pub async fn create_post(&self, title: &str, content: &str) -> Result<Post, ClientError> {
        let body = NewPost {
            title: title.to_string(),
            content: content.to_string(),
        };
        Self::send_json(self.request(Method::POST, "/posts/").json(&body), REQUEST_FAILED).await
    }

    pub async fn update_post(&self, id: i64, title: &str, content: &str) -> Result<Post, ClientError> {
        let body = NewPost {
            title: title.to_string(),
            content: content.to_string(),
        };
        Self::send_json(
            self.request(Method::PUT, &format!("/posts/{id}")).json(&body),
            REQUEST_FAILED,
        )
        .await
    }

    pub async fn delete_post(&self, id: i64) -> Result<(), ClientError> {
        Self::send(self.request(Method::DELETE, &format!("/posts/{id}")), REQUEST_FAILED).await?;
        Ok(())
    }
}

/// Pulls a human-readable message out of an error body:
/// `{"detail": "..."}`, `{"detail": [{"msg": "..."}]}` or `{"error": "..."}`.
pub fn backend_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = match &value["detail"] {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item["msg"].as_str().map(str::to_string)),
        _ => None,
    };
    message
        .or_else(|| value["error"].as_str().map(str::to_string))
        .filter(|m| !m.trim().is_empty())
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::token::{self, SubjectId};

/// Persisted form of a session: exactly what lands in local storage.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub username: String,
}

/// The identity currently signed in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub username: String,
    /// Subject claim of `token`, if it carries one.
    pub id: Option<SubjectId>,
}

impl Session {
    pub fn from_record(record: SessionRecord) -> Self {
        let id = token::get_subject_id(&record.token);
        Self {
            token: record.token,
            username: record.username,
            id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthPhase {
    Loading,
    Authenticated,
    Anonymous,
}

/// Snapshot of the authentication state. Every transition replaces the
/// whole value, so observers never see a half-applied update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<Session>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    pub fn loading() -> Self {
        Self {
            user: None,
            loading: true,
            error: None,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user: None,
            loading: false,
            error: None,
        }
    }

    pub fn anonymous_with_error(message: impl Into<String>) -> Self {
        Self {
            user: None,
            loading: false,
            error: Some(message.into()),
        }
    }

    pub fn authenticated(session: Session) -> Self {
        Self {
            user: Some(session),
            loading: false,
            error: None,
        }
    }

    pub fn phase(&self) -> AuthPhase {
        match (&self.user, self.loading) {
            (_, true) => AuthPhase::Loading,
            (Some(_), false) => AuthPhase::Authenticated,
            (None, false) => AuthPhase::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == AuthPhase::Authenticated
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::loading()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub author_name: String,
    pub created_at: String,
}

impl Post {
    /// True when the token's subject claim names this post's author.
    pub fn is_authored_by(&self, token: &str) -> bool {
        token::get_subject_id(token).map_or(false, |sub| sub.matches(self.author_id))
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub username: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegisteredUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Form inputs that can carry a validation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Username,
    Email,
    Password,
    Title,
    Content,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Username => "username",
            Field::Email => "email",
            Field::Password => "password",
            Field::Title => "title",
            Field::Content => "content",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors {
    entries: BTreeMap<Field, String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: Field, message: impl Into<String>) {
        self.entries.insert(field, message.into());
    }

    pub fn clear(&mut self, field: Field) {
        self.entries.remove(&field);
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.entries.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.entries.iter().map(|(field, msg)| (*field, msg.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field.name(), message)?;
            first = false;
        }
        Ok(())
    }
}

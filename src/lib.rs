//! # blogdash
//!
//! Client side of the BlogDash blog service: session handling on top of
//! bearer tokens, a typed gateway to the REST backend, and the post feed
//! and form logic the dashboard screens are built from.
//!
//! Start with [`handlers::Dashboard`], which composes the pieces.

pub mod auth;
pub mod client;
pub mod config;
pub mod core;
pub mod guards;
pub mod handlers;
pub mod models;
pub mod posts;
pub mod users;

pub use auth::{SessionManager, SessionTicket};
pub use client::{ApiClient, TokenSource};
pub use config::Config;
pub use crate::core::errors::ClientError;
pub use crate::core::store::{FileStore, KeyValue, MemoryStore, SessionStore};
pub use handlers::Dashboard;
pub use models::{AuthPhase, AuthState, Post, Session, SessionRecord};

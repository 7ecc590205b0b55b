//! Authentication session state machine.
//!
//! `SessionManager` owns the persisted session entry and the current
//! [`AuthState`]. It starts in `Loading`, and every mutating call replaces
//! the whole state and publishes it to subscribers through a
//! `tokio::sync::watch` channel.
//!
//! Async callers that sign in over the network take a [`SessionTicket`]
//! before sending and hand it back with the response; if any other session
//! operation ran in between, the response is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::TokenSource;
use crate::core::errors::ClientError;
use crate::core::store::SessionStore;
use crate::core::token;
use crate::models::{AuthState, Session, SessionRecord};

pub const AUTH_FAILED: &str = "Authentication failed";
pub const LOGIN_FAILED: &str = "Login failed";

/// Marks the point in the session history at which an async operation
/// started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionTicket(u64);

pub struct SessionManager {
    store: SessionStore,
    state: watch::Sender<AuthState>,
    generation: AtomicU64,
    writer: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: SessionStore) -> Self {
        let (state, _) = watch::channel(AuthState::loading());
        Self {
            store,
            state,
            generation: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Read-only view of the session entry for request signing.
    pub fn token_source(&self) -> Arc<dyn TokenSource> {
        Arc::new(self.store.clone())
    }

    pub fn ticket(&self) -> SessionTicket {
        SessionTicket(self.generation.load(Ordering::SeqCst))
    }

    /// Derives the state from storage. Safe to call again: storage is
    /// re-read every time, never the in-memory state.
    pub fn initialize(&self) -> AuthState {
        let _writer = self.lock_writer();
        self.advance();

        let next = match self.store.try_read() {
            Ok(Some(record)) if token::is_valid_token(&record.token) => {
                debug!(username = %record.username, "restored session from storage");
                AuthState::authenticated(Session::from_record(record))
            }
            Ok(Some(record)) => {
                info!(username = %record.username, "stored session token expired or invalid");
                self.clear_store();
                AuthState::anonymous()
            }
            Ok(None) => {
                self.clear_store();
                AuthState::anonymous()
            }
            Err(err) => {
                warn!(error = %err, "auth initialization failed");
                self.clear_store();
                AuthState::anonymous_with_error(AUTH_FAILED)
            }
        };
        self.publish(next.clone());
        next
    }

    pub fn login(&self, token: &str, username: &str) -> Result<Session, ClientError> {
        let _writer = self.lock_writer();
        self.advance();
        self.apply_login(token, username)
    }

    /// Like [`login`](Self::login), but only if no session operation ran
    /// since `ticket` was taken. Returns `Ok(None)` for a stale response.
    pub fn login_if_current(
        &self,
        ticket: SessionTicket,
        token: &str,
        username: &str,
    ) -> Result<Option<Session>, ClientError> {
        let _writer = self.lock_writer();
        if self.ticket() != ticket {
            debug!(username, "discarding stale login response");
            return Ok(None);
        }
        self.advance();
        self.apply_login(token, username).map(Some)
    }

    pub fn logout(&self) {
        let _writer = self.lock_writer();
        self.advance();
        self.clear_store();
        self.publish(AuthState::anonymous());
    }

    fn apply_login(&self, token: &str, username: &str) -> Result<Session, ClientError> {
        if token.is_empty() || username.trim().is_empty() {
            return Err(self.fail_login(ClientError::InvalidCredentials));
        }
        if !token::is_valid_token(token) {
            return Err(self.fail_login(ClientError::TokenInvalid));
        }

        let record = SessionRecord {
            token: token.to_string(),
            username: username.to_string(),
        };
        if let Err(err) = self.store.write(&record) {
            return Err(self.fail_login(err));
        }

        let session = Session::from_record(record);
        info!(username = %session.username, "signed in");
        self.publish(AuthState::authenticated(session.clone()));
        Ok(session)
    }

    fn fail_login(&self, err: ClientError) -> ClientError {
        warn!(error = %err, "login failed");
        self.clear_store();
        self.publish(AuthState::anonymous_with_error(format!("{LOGIN_FAILED}: {err}")));
        err
    }

    fn clear_store(&self) {
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "could not clear session storage");
        }
    }

    fn publish(&self, next: AuthState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn advance(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

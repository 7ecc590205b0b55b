//! User-triggered flows.
//!
//! `Dashboard` wires the session manager, the gateway client and the post
//! feed together once, at composition time, and is passed by reference to
//! whatever front-end drives it.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::SessionManager;
use crate::client::ApiClient;
use crate::config::Config;
use crate::core::errors::ClientError;
use crate::core::store::{KeyValue, SessionStore};
use crate::models::{AuthState, RegisteredUser, Session};
use crate::posts::PostFeed;
use crate::users::{self, RegistrationForm};

pub struct Dashboard {
    session: Arc<SessionManager>,
    client: Arc<ApiClient>,
    feed: PostFeed,
}

impl Dashboard {
    pub fn new(config: &Config, storage: Arc<dyn KeyValue>) -> Result<Self, ClientError> {
        let store = SessionStore::new(storage, config.storage_key.clone());
        let session = Arc::new(SessionManager::new(store));
        let client = Arc::new(ApiClient::new(config, session.token_source())?);
        let feed = PostFeed::new(Arc::clone(&client));
        Ok(Self {
            session,
            client,
            feed,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn feed(&self) -> &PostFeed {
        &self.feed
    }

    /// Restores any stored session. Run once at start-up.
    pub fn start(&self) -> AuthState {
        self.session.initialize()
    }

    /// Validates locally, then registers. Backend messages that name a
    /// field come back as [`ClientError::Validation`].
    pub async fn sign_up(&self, form: &RegistrationForm) -> Result<RegisteredUser, ClientError> {
        users::validate_registration(form).map_err(ClientError::Validation)?;
        match self
            .client
            .register(&form.username, &form.email, &form.password)
            .await
        {
            Ok(user) => {
                info!(username = %user.username, "registered");
                Ok(user)
            }
            Err(ClientError::Network { status, detail }) => {
                let errors = users::registration_errors_from_detail(&detail);
                if errors.is_empty() {
                    Err(ClientError::Network { status, detail })
                } else {
                    Err(ClientError::Validation(errors))
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Exchanges credentials for a token and opens a session. Returns
    /// `Ok(None)` if the session changed while the request was in flight,
    /// in which case the response is dropped. A rejection from the backend
    /// comes back as [`ClientError::Validation`] on the field it names.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Option<Session>, ClientError> {
        let ticket = self.session.ticket();
        let response = match self.client.login(username, password).await {
            Ok(response) => response,
            Err(ClientError::Network {
                status: Some(status),
                detail,
            }) => {
                debug!(status, %detail, "sign-in rejected");
                return Err(ClientError::Validation(users::login_errors_from_detail(&detail)));
            }
            Err(err) => return Err(err),
        };
        let session = self
            .session
            .login_if_current(ticket, &response.access_token, &response.username)?;
        if session.is_some() {
            self.feed.invalidate_all();
        } else {
            debug!(username, "sign-in superseded");
        }
        Ok(session)
    }

    pub fn sign_out(&self) {
        self.session.logout();
        self.feed.invalidate_all();
    }
}

//! Access rules for the dashboard's screens.

use crate::models::{AuthPhase, AuthState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    Dashboard,
}

impl Route {
    /// Unknown paths fall back to `Home`.
    pub fn from_path(path: &str) -> Route {
        match path.trim_end_matches('/') {
            "/login" => Route::Login,
            "/register" => Route::Register,
            "/dashboard" => Route::Dashboard,
            _ => Route::Home,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Session state is still being restored.
    Wait,
    Allow,
    Redirect(Route),
}

/// Screens that need a signed-in user.
pub fn protected(state: &AuthState) -> Access {
    match state.phase() {
        AuthPhase::Loading => Access::Wait,
        AuthPhase::Authenticated => Access::Allow,
        AuthPhase::Anonymous => Access::Redirect(Route::Login),
    }
}

/// Screens only for signed-out visitors.
pub fn guest(state: &AuthState) -> Access {
    match state.phase() {
        AuthPhase::Loading => Access::Wait,
        AuthPhase::Authenticated => Access::Redirect(Route::Dashboard),
        AuthPhase::Anonymous => Access::Allow,
    }
}

pub fn resolve(route: Route, state: &AuthState) -> Access {
    match route {
        Route::Home => Access::Allow,
        Route::Login | Route::Register => guest(state),
        Route::Dashboard => protected(state),
    }
}

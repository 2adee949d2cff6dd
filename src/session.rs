//! Token-in-storage session and the route guard built on it.

use std::sync::Arc;

use crate::auth::{TokenStatus, inspect_token};
use crate::models::User;
use crate::storage::{KeyValueStore, StorageError, load_json, write_json};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

pub struct Session {
    store: Arc<dyn KeyValueStore>,
    user: Option<User>,
    token: Option<String>,
    loading: bool,
}

impl Session {
    /// A session that has not looked at storage yet; `is_loading` stays true
    /// until [`Session::restore_on_startup`] runs.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Session {
            store,
            user: None,
            token: None,
            loading: true,
        }
    }

    pub fn restore_on_startup(&mut self) {
        // A blank token counts as no token
        let token = self.store.get(TOKEN_KEY).filter(|t| !t.trim().is_empty());
        let user = match load_json::<User>(self.store.as_ref(), USER_KEY) {
            Ok(user) => user,
            Err(e) => {
                tracing::debug!(error = %e, "Stored user record is malformed");
                None
            }
        };

        match (token, user) {
            (Some(token), Some(user)) if inspect_token(&token) != TokenStatus::Expired => {
                tracing::info!(user_id = user.id, role = %user.role, "Restored session from storage");
                self.token = Some(token);
                self.user = Some(user);
            }
            (token, user) => {
                if token.is_some() || user.is_some() {
                    tracing::info!("Discarding partial or expired stored session");
                }
                self.user = None;
                self.token = None;
                self.clear_persisted();
            }
        }
        self.loading = false;
    }

    pub fn login(&mut self, user: User, token: String) -> Result<(), StorageError> {
        tracing::info!(user_id = user.id, role = %user.role, "User logged in");
        let persisted = self
            .store
            .set(TOKEN_KEY, &token)
            .and_then(|_| write_json(self.store.as_ref(), USER_KEY, &user));
        self.user = Some(user);
        self.token = Some(token);
        persisted
    }

    pub fn logout(&mut self) {
        if let Some(user) = &self.user {
            tracing::info!(user_id = user.id, "User logged out");
        }
        self.user = None;
        self.token = None;
        self.clear_persisted();
    }

    fn clear_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(key, error = %e, "Failed to remove stored session entry");
            }
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated() && self.user.as_ref().is_some_and(User::is_admin)
    }

    pub fn guard(&self, require_admin: bool) -> GuardDecision {
        guard(self.loading, self.is_authenticated(), self.is_admin(), require_admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardDecision {
    /// Session restore still running; show a pending indicator.
    Pending,
    RedirectToLogin,
    RedirectToHome,
    Allow,
}

impl GuardDecision {
    pub fn redirect_target(self) -> Option<&'static str> {
        match self {
            GuardDecision::RedirectToLogin => Some("/login"),
            GuardDecision::RedirectToHome => Some("/"),
            GuardDecision::Pending | GuardDecision::Allow => None,
        }
    }
}

pub fn guard(is_loading: bool, is_authenticated: bool, is_admin: bool, require_admin: bool) -> GuardDecision {
    if is_loading {
        GuardDecision::Pending
    } else if !is_authenticated {
        GuardDecision::RedirectToLogin
    } else if require_admin && !is_admin {
        GuardDecision::RedirectToHome
    } else {
        GuardDecision::Allow
    }
}

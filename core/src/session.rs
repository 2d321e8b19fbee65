//! Session lifecycle: startup check, login, logout.
//!
//! # Design
//! `SessionManager` is a three-state machine (`Unknown` → `Authenticated` /
//! `Unauthenticated`). Expiry is evaluated only when `check_session` runs or
//! when a remote call reports the token as rejected; there is no background
//! timer, so a session that lapses mid-use stays `Authenticated` until one of
//! those two events. Every transition is published on a `watch` channel so
//! observers can follow the state without polling.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{ApiError, Result};
use crate::http::Transport;
use crate::remote::RemoteClient;
use crate::store::CredentialStore;

/// Lifetime of a session from the moment of login.
pub const TOKEN_EXPIRATION_DAYS: i64 = 2;

/// A bearer token and the instant after which it must not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl Session {
    /// A session for `token` expiring `TOKEN_EXPIRATION_DAYS` after `now`.
    pub fn issue(token: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expiry: now + Duration::days(TOKEN_EXPIRATION_DAYS),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && self.expiry > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Startup check has not run yet.
    Unknown,
    Authenticated { token: String },
    Unauthenticated,
}

impl SessionState {
    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::Authenticated { token } => Some(token),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self { store, clock, state }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The token to authorize requests with, if authenticated.
    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    /// Receives every state transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Decide from the persisted record whether the user is signed in.
    ///
    /// An unreadable record counts as absent. An expired one is cleared.
    /// Re-running the check re-reads the store.
    pub fn check_session(&mut self) -> SessionState {
        let next = match self.store.load() {
            Ok(None) => SessionState::Unauthenticated,
            Ok(Some(session)) if session.is_valid_at(self.clock.now()) => {
                SessionState::Authenticated {
                    token: session.token,
                }
            }
            Ok(Some(session)) => {
                info!(expiry = %session.expiry, "stored session expired");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "failed to clear expired session");
                }
                SessionState::Unauthenticated
            }
            Err(e) => {
                warn!(error = %e, "stored session unreadable, requiring login");
                SessionState::Unauthenticated
            }
        };
        self.transition(next.clone());
        next
    }

    /// Persist `token` with a fresh expiry and become `Authenticated`.
    ///
    /// The token's authenticity is the server's concern; it is trusted as
    /// issued. If the record cannot be saved the state stays
    /// `Unauthenticated`.
    pub fn login(&mut self, token: &str) -> Result<()> {
        self.require_unauthenticated()?;
        if token.is_empty() {
            return Err(ApiError::Validation("token cannot be empty".to_string()));
        }

        let session = Session::issue(token, self.clock.now());
        self.store.save(&session)?;
        info!(expiry = %session.expiry, "logged in");
        self.transition(SessionState::Authenticated {
            token: session.token,
        });
        Ok(())
    }

    /// Exchange credentials for a token at the server, then `login`.
    pub fn sign_in<T: Transport>(
        &mut self,
        remote: &RemoteClient<T>,
        username: &str,
        password: &str,
    ) -> Result<()> {
        self.require_unauthenticated()?;
        let token = remote.login(username, password)?;
        self.login(&token)
    }

    /// Clear the persisted record and become `Unauthenticated`.
    ///
    /// A no-op when already `Unauthenticated`. The state changes even if the
    /// record cannot be removed; that error is still returned.
    pub fn logout(&mut self) -> Result<()> {
        if *self.state.borrow() == SessionState::Unauthenticated {
            return Ok(());
        }
        let cleared = self.store.clear();
        if let Err(e) = &cleared {
            warn!(error = %e, "failed to clear credentials on logout");
        }
        info!("logged out");
        self.transition(SessionState::Unauthenticated);
        cleared
    }

    /// Force a logout when `err` means the server rejected the token.
    pub fn handle_error(&mut self, err: &ApiError) -> Result<()> {
        if err.is_session_expired() {
            info!("server rejected session");
            return self.logout();
        }
        Ok(())
    }

    fn require_unauthenticated(&self) -> Result<()> {
        match *self.state.borrow() {
            SessionState::Unauthenticated => Ok(()),
            SessionState::Unknown => Err(ApiError::InvalidState("session has not been checked yet")),
            SessionState::Authenticated { .. } => Err(ApiError::InvalidState("already logged in")),
        }
    }

    fn transition(&self, next: SessionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }
}

//! Startup and request flow tying the session to the todo list.
//!
//! # Design
//! `TodoApp` owns one `SessionManager` and, while signed in, one
//! `TodoListController` built with the session's token. Every list operation
//! goes through `guard`, which turns a `SessionExpired` result into a logout
//! before handing the error back. The last list snapshot stays readable after
//! such a logout and is replaced on the next sign-in.

use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::SystemClock;
use crate::config::ClientConfig;
use crate::controller::TodoListController;
use crate::error::{ApiError, Result};
use crate::http::{Transport, UreqTransport};
use crate::remote::RemoteClient;
use crate::session::{SessionManager, SessionState};
use crate::store::FileCredentialStore;
use crate::types::{Profile, Todo, TodoDraft};

pub struct TodoApp<T> {
    session: SessionManager,
    remote: RemoteClient<T>,
    list: Option<TodoListController<T>>,
}

impl TodoApp<UreqTransport> {
    /// File-backed credentials, wall-clock expiry and a `ureq` transport.
    pub fn from_config(config: &ClientConfig) -> Self {
        let store = Arc::new(FileCredentialStore::new(&config.credentials_path));
        let session = SessionManager::new(store, Arc::new(SystemClock));
        let remote = RemoteClient::new(&config.base_url, UreqTransport::new(config.timeout));
        Self::new(session, remote)
    }
}

impl<T: Transport + Clone> TodoApp<T> {
    pub fn new(session: SessionManager, remote: RemoteClient<T>) -> Self {
        Self {
            session,
            remote,
            list: None,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn list(&self) -> Option<&TodoListController<T>> {
        self.list.as_ref()
    }

    /// Current list snapshot; empty before the first sign-in.
    pub fn todos(&self) -> Vec<Todo> {
        self.list.as_ref().map(|l| l.todos()).unwrap_or_default()
    }

    /// Check the stored session and, if it is valid, load the list.
    ///
    /// A list load failure is returned as the error; the session stays
    /// authenticated unless the server rejected the token.
    pub fn start(&mut self) -> Result<SessionState> {
        let state = self.session.check_session();
        if let Some(token) = state.token() {
            info!("resuming stored session");
            self.open_list(token.to_string())?;
        }
        Ok(self.session.state())
    }

    pub fn sign_in(&mut self, username: &str, password: &str) -> Result<()> {
        self.session.sign_in(&self.remote, username, password)?;
        let token = self.session.token().ok_or(ApiError::Unauthenticated)?;
        self.open_list(token)
    }

    /// Create an account. Does not sign in.
    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<String> {
        self.remote.register(username, email, password)
    }

    pub fn sign_out(&mut self) -> Result<()> {
        self.list = None;
        self.session.logout()
    }

    pub fn profile(&mut self) -> Result<Profile> {
        let token = self.session.token().ok_or(ApiError::Unauthenticated)?;
        let result = self.remote.profile(&token);
        self.after(result)
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.guard(|list| list.refresh())
    }

    pub fn add(&mut self, draft: &TodoDraft) -> Result<Todo> {
        self.guard(|list| list.add(draft))
    }

    pub fn edit(&mut self, id: &str, draft: &TodoDraft) -> Result<()> {
        self.guard(|list| list.edit(id, draft))
    }

    pub fn remove(&mut self, id: &str) -> Result<()> {
        self.guard(|list| list.remove(id))
    }

    fn open_list(&mut self, token: String) -> Result<()> {
        let list = self.list.insert(TodoListController::new(self.remote.clone(), token));
        let result = list.initialize();
        self.after(result)
    }

    fn guard<R>(&mut self, op: impl FnOnce(&mut TodoListController<T>) -> Result<R>) -> Result<R> {
        if !self.session.state().is_authenticated() {
            return Err(ApiError::Unauthenticated);
        }
        let list = self.list.as_mut().ok_or(ApiError::Unauthenticated)?;
        let result = op(list);
        self.after(result)
    }

    /// A forced logout that cannot clear the stored record reports that
    /// storage error in place of `SessionExpired`; the state is
    /// `Unauthenticated` either way.
    fn after<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            if let Err(logout) = self.session.handle_error(e) {
                warn!(error = %logout, cause = %e, "forced logout could not clear credentials");
                return Err(logout);
            }
        }
        result
    }
}

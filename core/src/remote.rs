//! One network round-trip per operation: build, execute, parse.
//!
//! `RemoteClient` never retries and never holds a token of its own; callers
//! pass the token on every authorized call.

use tracing::{debug, warn};

use crate::client::TodoClient;
use crate::error::{ApiError, Result};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::types::{Credentials, Profile, Registration, Todo, TodoDraft};

#[derive(Debug, Clone)]
pub struct RemoteClient<T> {
    client: TodoClient,
    transport: T,
}

impl<T: Transport> RemoteClient<T> {
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            client: TodoClient::new(base_url),
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Exchanges credentials for a bearer token.
    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        let request = self.client.build_login(&Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        self.round_trip("login", request, |r| self.client.parse_login(r))
    }

    /// Creates an account; returns the server's confirmation message.
    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<String> {
        let request = self.client.build_register(&Registration {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })?;
        self.round_trip("register", request, |r| self.client.parse_register(r))
    }

    pub fn profile(&self, token: &str) -> Result<Profile> {
        let request = self.client.build_profile(token)?;
        self.round_trip("profile", request, |r| self.client.parse_profile(r))
    }

    pub fn list(&self, token: &str) -> Result<Vec<Todo>> {
        let request = self.client.build_list_todos(token)?;
        self.round_trip("list", request, |r| self.client.parse_list_todos(r))
    }

    pub fn create(&self, token: &str, draft: &TodoDraft) -> Result<Todo> {
        let request = self.client.build_create_todo(token, draft)?;
        self.round_trip("create", request, |r| self.client.parse_create_todo(r))
    }

    pub fn update(&self, token: &str, id: &str, draft: &TodoDraft) -> Result<()> {
        let request = self.client.build_update_todo(token, id, draft)?;
        self.round_trip("update", request, |r| self.client.parse_update_todo(r))
    }

    pub fn delete(&self, token: &str, id: &str) -> Result<()> {
        let request = self.client.build_delete_todo(token, id)?;
        self.round_trip("delete", request, |r| self.client.parse_delete_todo(r))
    }

    fn round_trip<R>(
        &self,
        operation: &'static str,
        request: HttpRequest,
        parse: impl FnOnce(HttpResponse) -> Result<R>,
    ) -> Result<R> {
        debug!(operation, path = %request.path, "remote call");
        let result = self
            .transport
            .execute(request)
            .map_err(ApiError::from)
            .and_then(parse);
        if let Err(e) = &result {
            warn!(operation, error = %e, "remote call failed");
        }
        result
    }
}

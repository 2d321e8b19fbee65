//! Stateless HTTP request builder and response parser for the todo service.
//!
//! # Design
//! `TodoClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! `RemoteClient` glues the two halves together with a `Transport`.
//!
//! Authorized builders take the bearer token explicitly and refuse to build
//! a request without one. Authorized parsers map 401/403 to
//! `ApiError::SessionExpired`; the login and register parsers do not, since
//! there is no session to expire at that point.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    require, Credentials, Envelope, LoginData, Profile, Registration, Todo, TodoDraft,
};

const LOGIN_FAILED: &str = "Invalid credentials";
const REGISTER_FAILED: &str = "Registration failed";
const PROFILE_FAILED: &str = "Failed to fetch profile";
const LIST_FAILED: &str = "Failed to fetch todos";
const CREATE_FAILED: &str = "Error adding todo";
const UPDATE_FAILED: &str = "Error editing todo";
const DELETE_FAILED: &str = "Error deleting todo";

/// Characters escaped when an id becomes one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Synchronous, stateless request builder for the todo service.
#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // --- auth ---------------------------------------------------------------

    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest> {
        require("username", &credentials.username)?;
        require("password", &credentials.password)?;
        self.json_request(HttpMethod::Post, "/auth/login", None, credentials)
    }

    /// Returns the bearer token issued by the server.
    pub fn parse_login(&self, response: HttpResponse) -> Result<String> {
        check_status(&response, LOGIN_FAILED)?;
        let envelope: Envelope<LoginData> = decode(&response.body)?;
        match envelope.data {
            Some(LoginData { token }) if !token.is_empty() => Ok(token),
            _ => Err(ApiError::Deserialization("login response carries no token".to_string())),
        }
    }

    pub fn build_register(&self, registration: &Registration) -> Result<HttpRequest> {
        require("username", &registration.username)?;
        require("email", &registration.email)?;
        require("password", &registration.password)?;
        self.json_request(HttpMethod::Post, "/auth/register", None, registration)
    }

    /// Returns the server's confirmation message.
    pub fn parse_register(&self, response: HttpResponse) -> Result<String> {
        check_status(&response, REGISTER_FAILED)?;
        Ok(server_message(&response.body).unwrap_or_else(|| "Registration successful".to_string()))
    }

    pub fn build_profile(&self, token: &str) -> Result<HttpRequest> {
        self.bare_request(HttpMethod::Get, "/profile", token)
    }

    pub fn parse_profile(&self, response: HttpResponse) -> Result<Profile> {
        check_authorized(&response, PROFILE_FAILED)?;
        let envelope: Envelope<Profile> = decode(&response.body)?;
        envelope
            .data
            .ok_or_else(|| ApiError::Deserialization("profile response carries no data".to_string()))
    }

    // --- todos --------------------------------------------------------------

    pub fn build_list_todos(&self, token: &str) -> Result<HttpRequest> {
        self.bare_request(HttpMethod::Get, "/todos", token)
    }

    /// A success response without `data` is an empty list.
    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<Vec<Todo>> {
        check_authorized(&response, LIST_FAILED)?;
        let envelope: Envelope<Vec<Todo>> = decode(&response.body)?;
        Ok(envelope.data.unwrap_or_default())
    }

    pub fn build_create_todo(&self, token: &str, draft: &TodoDraft) -> Result<HttpRequest> {
        require_token(token)?;
        draft.validate()?;
        self.json_request(HttpMethod::Post, "/todos", Some(token), draft)
    }

    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<Todo> {
        check_authorized(&response, CREATE_FAILED)?;
        let envelope: Envelope<Todo> = decode(&response.body)?;
        envelope
            .data
            .ok_or_else(|| ApiError::Deserialization("create response carries no todo".to_string()))
    }

    pub fn build_update_todo(&self, token: &str, id: &str, draft: &TodoDraft) -> Result<HttpRequest> {
        require_token(token)?;
        let path = todo_path(id)?;
        draft.validate()?;
        self.json_request(HttpMethod::Put, &path, Some(token), draft)
    }

    pub fn parse_update_todo(&self, response: HttpResponse) -> Result<()> {
        check_authorized(&response, UPDATE_FAILED)
    }

    pub fn build_delete_todo(&self, token: &str, id: &str) -> Result<HttpRequest> {
        require_token(token)?;
        let path = todo_path(id)?;
        self.bare_request(HttpMethod::Delete, &path, token)
    }

    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<()> {
        check_authorized(&response, DELETE_FAILED)
    }

    // --- helpers ------------------------------------------------------------

    fn bare_request(&self, method: HttpMethod, path: &str, token: &str) -> Result<HttpRequest> {
        require_token(token)?;
        Ok(HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers: vec![bearer(token)],
            body: None,
        })
    }

    fn json_request<B: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<HttpRequest> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if let Some(token) = token {
            headers.push(bearer(token));
        }
        Ok(HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers,
            body: Some(body),
        })
    }
}

fn bearer(token: &str) -> (String, String) {
    ("authorization".to_string(), format!("Bearer {token}"))
}

/// `/todos/{id}` with the id escaped so it stays a single segment.
fn todo_path(id: &str) -> Result<String> {
    require("id", id)?;
    if matches!(id, "." | "..") {
        return Err(ApiError::Validation(format!("invalid todo id {id:?}")));
    }
    Ok(format!("/todos/{}", utf8_percent_encode(id, SEGMENT)))
}

fn require_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(ApiError::Unauthenticated);
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// The envelope's `message`, if the body is JSON and carries a non-empty one.
fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .ok()?
        .message
        .filter(|m| !m.is_empty())
}

/// Map a non-success status to `RemoteRejected`, preferring the server's message.
fn check_status(response: &HttpResponse, fallback: &str) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::RemoteRejected {
        status: response.status,
        message: server_message(&response.body).unwrap_or_else(|| fallback.to_string()),
    })
}

/// Like `check_status`, but a rejected credential is a `SessionExpired`.
fn check_authorized(response: &HttpResponse, fallback: &str) -> Result<()> {
    if matches!(response.status, 401 | 403) {
        return Err(ApiError::SessionExpired);
    }
    check_status(response, fallback)
}

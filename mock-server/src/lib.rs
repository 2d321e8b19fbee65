//! In-memory stand-in for the todo service.
//!
//! Implements the service contract the client relies on: bearer-token auth,
//! per-user todos listed newest first, and `{data, message}` response
//! envelopes. All routes live under `/api`.

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
}

#[derive(Deserialize)]
pub struct TodoInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

struct User {
    email: String,
    password: String,
    created_at: DateTime<Utc>,
}

impl User {
    fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Default)]
struct Db {
    users: HashMap<String, User>,
    /// token -> username
    tokens: HashMap<String, String>,
    /// username -> todos, newest first
    todos: HashMap<String, Vec<Todo>>,
}

/// Shared server state. Clones refer to the same data.
#[derive(Clone, Default)]
pub struct MockState {
    db: Arc<RwLock<Db>>,
}

impl MockState {
    /// Invalidate every issued token, as if they had all expired server-side.
    pub async fn revoke_all_tokens(&self) {
        self.db.write().await.tokens.clear();
    }

    pub async fn add_user(&self, username: &str, email: &str, password: &str) {
        self.db.write().await.users.insert(username.to_string(), User::new(email, password));
    }
}

/// A non-success reply with a human-readable message.
#[derive(Debug)]
pub struct Failure(StatusCode, &'static str);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "message": self.1 }))).into_response()
    }
}

type Reply = Result<(StatusCode, Json<Value>), Failure>;

fn reply(status: StatusCode, body: Value) -> Reply {
    Ok((status, Json(body)))
}

pub fn app() -> Router {
    app_with_state(MockState::default())
}

pub fn app_with_state(state: MockState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/profile", get(profile))
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/{id}", put(update_todo).delete(delete_todo));
    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, MockState::default()).await
}

pub async fn run_with_state(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

/// Resolve the bearer token in `headers` to a username.
async fn authorize(state: &MockState, headers: &HeaderMap) -> Result<String, Failure> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(Failure(StatusCode::UNAUTHORIZED, "No token provided"))?;
    state
        .db
        .read()
        .await
        .tokens
        .get(token)
        .cloned()
        .ok_or(Failure(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

async fn register(State(state): State<MockState>, Json(input): Json<RegisterInput>) -> Reply {
    if blank(&input.username) || blank(&input.email) || blank(&input.password) {
        return Err(Failure(StatusCode::BAD_REQUEST, "All fields are required"));
    }
    let mut db = state.db.write().await;
    match db.users.entry(input.username.clone()) {
        Entry::Occupied(_) => return Err(Failure(StatusCode::BAD_REQUEST, "Username already exists")),
        Entry::Vacant(slot) => {
            slot.insert(User::new(&input.email, &input.password));
        }
    }
    info!(username = %input.username, "registered");
    reply(StatusCode::CREATED, json!({ "message": "User registered successfully" }))
}

async fn login(State(state): State<MockState>, Json(input): Json<LoginInput>) -> Reply {
    let mut db = state.db.write().await;
    let valid = db
        .users
        .get(&input.username)
        .is_some_and(|user| user.password == input.password);
    if !valid {
        return Err(Failure(StatusCode::UNAUTHORIZED, "Invalid username or password"));
    }
    let token = Uuid::new_v4().simple().to_string();
    db.tokens.insert(token.clone(), input.username);
    reply(
        StatusCode::OK,
        json!({ "data": { "token": token }, "message": "Login successful" }),
    )
}

async fn profile(State(state): State<MockState>, headers: HeaderMap) -> Reply {
    let username = authorize(&state, &headers).await?;
    let db = state.db.read().await;
    let user = db
        .users
        .get(&username)
        .ok_or(Failure(StatusCode::NOT_FOUND, "User not found"))?;
    reply(
        StatusCode::OK,
        json!({
            "data": {
                "username": username,
                "email": user.email,
                "bio": null,
                "avatar": null,
                "createdAt": user.created_at.to_rfc3339(),
            }
        }),
    )
}

async fn list_todos(State(state): State<MockState>, headers: HeaderMap) -> Reply {
    let username = authorize(&state, &headers).await?;
    let db = state.db.read().await;
    let todos = db.todos.get(&username).cloned().unwrap_or_default();
    reply(StatusCode::OK, json!({ "data": todos }))
}

async fn create_todo(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(input): Json<TodoInput>,
) -> Reply {
    let username = authorize(&state, &headers).await?;
    if blank(&input.title) || blank(&input.description) {
        return Err(Failure(StatusCode::BAD_REQUEST, "Title and description are required"));
    }
    let todo = Todo {
        id: Uuid::new_v4().simple().to_string(),
        title: input.title,
        description: input.description,
    };
    state
        .db
        .write()
        .await
        .todos
        .entry(username)
        .or_default()
        .insert(0, todo.clone());
    reply(StatusCode::CREATED, json!({ "data": todo, "message": "Todo created" }))
}

async fn update_todo(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<TodoInput>,
) -> Reply {
    let username = authorize(&state, &headers).await?;
    if blank(&input.title) || blank(&input.description) {
        return Err(Failure(StatusCode::BAD_REQUEST, "Title and description are required"));
    }
    let mut db = state.db.write().await;
    let todo = db
        .todos
        .get_mut(&username)
        .and_then(|todos| todos.iter_mut().find(|t| t.id == id))
        .ok_or(Failure(StatusCode::NOT_FOUND, "Todo not found"))?;
    todo.title = input.title;
    todo.description = input.description;
    reply(StatusCode::OK, json!({ "data": todo.clone(), "message": "Todo updated" }))
}

async fn delete_todo(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let username = authorize(&state, &headers).await?;
    let mut db = state.db.write().await;
    let todos = db.todos.entry(username).or_default();
    let before = todos.len();
    todos.retain(|t| t.id != id);
    if todos.len() == before {
        return Err(Failure(StatusCode::NOT_FOUND, "Todo not found"));
    }
    reply(StatusCode::OK, json!({ "message": "Todo deleted" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn todo_serializes_with_server_id_field() {
        let todo = Todo {
            id: "abc".to_string(),
            title: "Test".to_string(),
            description: "Desc".to_string(),
        };
        let json = serde_json::to_value(&todo).unwrap();
        assert_eq!(json["_id"], "abc");
        assert_eq!(json["title"], "Test");
        assert_eq!(json["description"], "Desc");
    }

    #[test]
    fn todo_input_defaults_missing_fields_to_empty() {
        let input: TodoInput = serde_json::from_str(r#"{"title":"Only title"}"#).unwrap();
        assert_eq!(input.title, "Only title");
        assert!(blank(&input.description));
    }

    #[test]
    fn login_input_accepts_extra_fields() {
        let input: LoginInput =
            serde_json::from_str(r#"{"username":"budi","password":"pw","remember":true}"#).unwrap();
        assert_eq!(input.username, "budi");
    }

    #[tokio::test]
    async fn revoking_tokens_clears_all_sessions() {
        let state = MockState::default();
        state.db.write().await.tokens.insert("t".to_string(), "budi".to_string());
        state.revoke_all_tokens().await;
        assert!(state.db.read().await.tokens.is_empty());
    }

    #[tokio::test]
    async fn concurrent_duplicate_registrations_admit_one() {
        let state = MockState::default();
        let attempt = |email: &'static str| {
            register(
                State(state.clone()),
                Json(RegisterInput {
                    username: "budi".to_string(),
                    email: email.to_string(),
                    password: "pw".to_string(),
                }),
            )
        };
        let (first, second) = tokio::join!(attempt("a@x.id"), attempt("b@x.id"));
        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);

        let winner = if first.is_ok() { "a@x.id" } else { "b@x.id" };
        assert_eq!(state.db.read().await.users["budi"].email, winner);
    }

    #[test]
    fn failure_response_carries_status() {
        let response = Failure(StatusCode::NOT_FOUND, "Todo not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

//! End-to-end session and todo flows against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port, then drives the client
//! over real HTTP through `UreqTransport`, with the session record persisted
//! in a temporary directory. Server-side token revocation stands in for a
//! token the server no longer accepts.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as TimeDelta, Utc};
use mock_server::MockState;
use todo_session::{
    ApiError, CredentialStore, FileCredentialStore, ManualClock, RemoteClient, SessionManager,
    SessionState, SystemClock, TodoApp, TodoDraft, UreqTransport, TOKEN_EXPIRATION_DAYS,
};

/// Start the mock server on a random port and return its API base URL.
fn start_server(state: MockState) -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with_state(listener, state).await
        })
        .unwrap();
    });

    format!("http://{addr}/api")
}

fn transport() -> UreqTransport {
    UreqTransport::new(Duration::from_secs(5))
}

fn app_at(base_url: &str, credentials: &Path) -> TodoApp<UreqTransport> {
    let store = Arc::new(FileCredentialStore::new(credentials));
    let session = SessionManager::new(store, Arc::new(SystemClock));
    TodoApp::new(session, RemoteClient::new(base_url, transport()))
}

#[test]
fn register_sign_in_and_crud() {
    let base_url = start_server(MockState::default());
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_at(&base_url, &dir.path().join("session.json"));

    assert_eq!(app.start().unwrap(), SessionState::Unauthenticated);
    app.register("budi", "budi@example.com", "secret").unwrap();

    let err = app.register("budi", "budi@example.com", "secret").unwrap_err();
    assert!(matches!(err, ApiError::RemoteRejected { status: 400, ref message } if message == "Username already exists"));

    app.sign_in("budi", "secret").unwrap();
    assert!(app.state().is_authenticated());
    assert!(app.todos().is_empty());

    // add
    let first = app.add(&TodoDraft::new("Walk dog", "before 8")).unwrap();
    let second = app.add(&TodoDraft::new("Feed cat", "twice")).unwrap();
    let todos = app.todos();
    assert_eq!(todos.len(), 2);
    assert_eq!(todos[0], second);
    assert_eq!(todos[1], first);

    // validation never reaches the server
    assert!(matches!(
        app.add(&TodoDraft::new("", "desc")),
        Err(ApiError::Validation(_))
    ));
    assert_eq!(app.todos().len(), 2);

    // edit
    app.edit(&first.id, &TodoDraft::new("Walk dog", "before 9")).unwrap();
    assert_eq!(app.todos()[1].description, "before 9");

    // the server agrees with the local list
    app.refresh().unwrap();
    assert_eq!(app.todos()[1].description, "before 9");

    // remove
    app.remove(&second.id).unwrap();
    assert_eq!(app.todos().len(), 1);
    assert!(app.todos().iter().all(|t| t.id != second.id));

    // removing again fails and leaves the list alone
    let err = app.remove(&second.id).unwrap_err();
    assert!(matches!(err, ApiError::RemoteRejected { status: 404, .. }));
    assert_eq!(app.todos().len(), 1);
    assert!(app.state().is_authenticated());

    // ids with reserved characters reach the todo route as one segment
    let err = app.remove("../profile").unwrap_err();
    assert!(matches!(err, ApiError::RemoteRejected { status: 404, .. }));
    let err = app.remove("no such id").unwrap_err();
    assert!(matches!(err, ApiError::RemoteRejected { status: 404, .. }));
    assert!(app.state().is_authenticated());

    let profile = app.profile().unwrap();
    assert_eq!(profile.username, "budi");
    assert_eq!(profile.email.as_deref(), Some("budi@example.com"));

    app.sign_out().unwrap();
    assert_eq!(app.state(), SessionState::Unauthenticated);
}

#[test]
fn stored_session_survives_restart() {
    let state = MockState::default();
    let base_url = start_server(state.clone());
    let dir = tempfile::tempdir().unwrap();
    let credentials = dir.path().join("session.json");

    {
        let mut app = app_at(&base_url, &credentials);
        app.start().unwrap();
        app.register("sari", "sari@example.com", "pw").unwrap();
        app.sign_in("sari", "pw").unwrap();
        app.add(&TodoDraft::new("Persist", "me")).unwrap();
    }

    let mut app = app_at(&base_url, &credentials);
    assert!(app.start().unwrap().is_authenticated());
    assert_eq!(app.todos().len(), 1);
    assert_eq!(app.todos()[0].title, "Persist");

    app.sign_out().unwrap();
    let mut app = app_at(&base_url, &credentials);
    assert_eq!(app.start().unwrap(), SessionState::Unauthenticated);
}

#[test]
fn revoked_token_forces_logout() {
    let state = MockState::default();
    let base_url = start_server(state.clone());
    let dir = tempfile::tempdir().unwrap();
    let credentials = dir.path().join("session.json");

    let mut app = app_at(&base_url, &credentials);
    app.start().unwrap();
    app.register("budi", "budi@example.com", "secret").unwrap();
    app.sign_in("budi", "secret").unwrap();
    let todo = app.add(&TodoDraft::new("Old", "entry")).unwrap();

    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    rt.block_on(state.revoke_all_tokens());

    let err = app.edit(&todo.id, &TodoDraft::new("New", "entry")).unwrap_err();
    assert!(matches!(err, ApiError::SessionExpired));
    assert_eq!(app.state(), SessionState::Unauthenticated);
    // Last confirmed list is still readable.
    assert_eq!(app.todos()[0].title, "Old");

    let store = FileCredentialStore::new(&credentials);
    assert!(store.load().unwrap().is_none());

    let mut restarted = app_at(&base_url, &credentials);
    assert_eq!(restarted.start().unwrap(), SessionState::Unauthenticated);
}

#[test]
fn expired_record_is_cleared_at_startup() {
    let base_url = start_server(MockState::default());
    let dir = tempfile::tempdir().unwrap();
    let credentials = dir.path().join("session.json");
    let store: Arc<FileCredentialStore> = Arc::new(FileCredentialStore::new(&credentials));
    let clock = ManualClock::new(Utc::now());

    let mut session = SessionManager::new(store.clone(), Arc::new(clock.clone()));
    session.check_session();
    session.login("issued-elsewhere").unwrap();

    clock.advance(TimeDelta::days(TOKEN_EXPIRATION_DAYS) + TimeDelta::minutes(1));

    let session = SessionManager::new(store.clone(), Arc::new(clock));
    let mut app = TodoApp::new(session, RemoteClient::new(&base_url, transport()));
    assert_eq!(app.start().unwrap(), SessionState::Unauthenticated);
    assert!(store.load().unwrap().is_none());
}

#[test]
fn unreachable_server_is_network_error() {
    // Bind and drop to get a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let dir = tempfile::tempdir().unwrap();
    let credentials = dir.path().join("session.json");
    FileCredentialStore::new(&credentials)
        .save(&todo_session::Session::issue("abc", Utc::now()))
        .unwrap();

    let mut app = app_at(&format!("http://127.0.0.1:{port}/api"), &credentials);
    assert!(matches!(app.start(), Err(ApiError::Network(_))));
    assert!(app.state().is_authenticated());
    assert!(app.todos().is_empty());
}

//! Session-aware client core for the todo service.
//!
//! # Overview
//! Keeps a persisted bearer-token session and an in-memory todo list that
//! mirrors confirmed server state. Built from four layers, leaf first:
//!
//! - `store`: single owner of the persisted `{token, expiry}` record.
//! - `session`: startup expiry check, login and logout transitions.
//! - `remote`: one HTTP round-trip per CRUD call, outcomes mapped to
//!   `ApiError`.
//! - `controller`: the todo list, changed only after the server confirms.
//!
//! `app::TodoApp` wires them into the startup and request flow.
//!
//! # Design
//! - Request building and response parsing (`client`) stay free of I/O; a
//!   `Transport` executes the round-trip, so tests run against scripted
//!   responses or the live mock server.
//! - State changes are published on `tokio::sync::watch` channels rather than
//!   through globals.
//! - Expiry is checked lazily: at startup and whenever the server rejects the
//!   token.

pub mod app;
pub mod client;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod remote;
pub mod session;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use app::TodoApp;
pub use client::TodoClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use controller::TodoListController;
pub use error::{ApiError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, UreqTransport};
pub use remote::RemoteClient;
pub use session::{Session, SessionManager, SessionState, TOKEN_EXPIRATION_DAYS};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::{Profile, Todo, TodoDraft};

//! In-memory todo list kept in step with the server.
//!
//! # Design
//! The list only ever reflects confirmed server state: a mutation is applied
//! locally after the server acknowledges it, and a failed call leaves the list
//! exactly as it was. There are no temporary client-side ids; a new todo
//! enters the list with the id the server assigned.
//!
//! Mutations take `&mut self`, so one controller can never have two of them in
//! flight. Each snapshot of the list is published on a `watch` channel.

use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::Result;
use crate::http::Transport;
use crate::remote::RemoteClient;
use crate::types::{Todo, TodoDraft};

pub struct TodoListController<T> {
    remote: RemoteClient<T>,
    token: String,
    todos: watch::Sender<Vec<Todo>>,
}

impl<T: Transport> TodoListController<T> {
    /// `token` is the bearer token of the current session.
    pub fn new(remote: RemoteClient<T>, token: impl Into<String>) -> Self {
        let (todos, _) = watch::channel(Vec::new());
        Self {
            remote,
            token: token.into(),
            todos,
        }
    }

    pub fn remote(&self) -> &RemoteClient<T> {
        &self.remote
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Snapshot of the list, newest first.
    pub fn todos(&self) -> Vec<Todo> {
        self.todos.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<Todo> {
        self.todos.borrow().iter().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.todos.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.borrow().is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Todo>> {
        self.todos.subscribe()
    }

    /// Load the list from the server. On failure the list is left empty.
    pub fn initialize(&mut self) -> Result<()> {
        match self.remote.list(&self.token) {
            Ok(todos) => {
                debug!(count = todos.len(), "todo list loaded");
                self.todos.send_replace(todos);
                Ok(())
            }
            Err(e) => {
                self.todos.send_replace(Vec::new());
                Err(e)
            }
        }
    }

    /// Reload the list from the server, keeping the current one on failure.
    pub fn refresh(&mut self) -> Result<()> {
        let todos = self.remote.list(&self.token)?;
        debug!(count = todos.len(), "todo list refreshed");
        self.todos.send_replace(todos);
        Ok(())
    }

    /// Create a todo and put it at the front of the list.
    pub fn add(&mut self, draft: &TodoDraft) -> Result<Todo> {
        draft.validate()?;
        let todo = self.remote.create(&self.token, draft)?;
        info!(id = %todo.id, "todo added");
        self.todos.send_modify(|list| list.insert(0, todo.clone()));
        Ok(todo)
    }

    /// Replace the title and description of the todo with `id`.
    pub fn edit(&mut self, id: &str, draft: &TodoDraft) -> Result<()> {
        draft.validate()?;
        self.remote.update(&self.token, id, draft)?;
        info!(id, "todo edited");
        self.todos.send_modify(|list| {
            if let Some(todo) = list.iter_mut().find(|t| t.id == id) {
                todo.title.clone_from(&draft.title);
                todo.description.clone_from(&draft.description);
            }
        });
        Ok(())
    }

    /// Delete the todo with `id`; it stays listed unless the server confirms.
    pub fn remove(&mut self, id: &str) -> Result<()> {
        self.remote.delete(&self.token, id)?;
        info!(id, "todo removed");
        self.todos.send_modify(|list| list.retain(|t| t.id != id));
        Ok(())
    }
}

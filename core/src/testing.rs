//! Test doubles shared by the unit tests of this crate.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};

/// Replays canned outcomes in order and records every request it receives.
#[derive(Default)]
pub(crate) struct Scripted {
    replies: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
    pub(crate) seen: RefCell<Vec<HttpRequest>>,
}

impl Scripted {
    pub(crate) fn reply(self, status: u16, body: &str) -> Self {
        self.push(status, body);
        self
    }

    pub(crate) fn fail(self) -> Self {
        self.push_failure();
        self
    }

    pub(crate) fn push(&self, status: u16, body: &str) {
        self.replies.borrow_mut().push_back(Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }));
    }

    pub(crate) fn push_failure(&self) {
        self.replies
            .borrow_mut()
            .push_back(Err(TransportError("connection refused".to_string())));
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.borrow().len()
    }
}

impl Transport for Scripted {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen.borrow_mut().push(request);
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("no scripted reply".to_string())))
    }
}

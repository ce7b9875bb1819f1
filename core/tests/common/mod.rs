//! Scripted in-process `Transport` for synchronizer tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use todo_sync::{
    ApiError, HttpRequest, HttpResponse, LoadOutcome, TodoClient, TodoListSynchronizer, Transport,
};
use tokio::sync::Notify;

pub const BASE_URL: &str = "http://tasks.test";

/// Records every request and answers from a queue of canned responses.
///
/// With a gate installed, each request waits for `release()` before it is
/// answered, so tests can observe local state while a request is in flight.
/// Once the queue is empty every request gets `200` with an empty body.
#[derive(Default)]
pub struct ScriptedTransport {
    requests: Mutex<Vec<HttpRequest>>,
    responses: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let transport = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (transport, gate)
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response(status, body)));
        self
    }

    pub fn fail(self, err: ApiError) -> Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(response(200, "")))
    }
}

pub fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

pub fn synchronizer(transport: ScriptedTransport) -> TodoListSynchronizer<ScriptedTransport> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    TodoListSynchronizer::new(TodoClient::new(BASE_URL), transport)
}

/// A synchronizer whose collection was loaded from `list_body` without going
/// through the transport.
pub fn loaded(list_body: &str, transport: ScriptedTransport) -> TodoListSynchronizer<ScriptedTransport> {
    let mut sync = synchronizer(transport);
    let tasks = TodoClient::new(BASE_URL)
        .parse_list_tasks(response(200, list_body))
        .unwrap();
    assert!(sync.apply_load(LoadOutcome::Loaded(tasks)));
    sync
}

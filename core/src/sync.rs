//! Optimistic synchronization of a local task list with the remote collection.
//!
//! # Design
//! `TodoListSynchronizer` owns the local ordered collection and the pending
//! creation input (the draft). Event handlers mutate it through `&mut self`;
//! there is no shared or global state.
//!
//! - `load` returns a `PendingLoad` that can be aborted through its
//!   `AbortHandle`. An aborted load never reaches `apply_load`'s mutation
//!   path, and a failed one is logged and leaves the collection as it was.
//! - `update`, `toggle_done` and `delete` change the local collection first,
//!   then spawn the request. They return the request's `JoinHandle`, which
//!   callers may drop. Failures are logged and never rolled back.
//! - Creation is not optimistic: the task is appended only once the server
//!   has assigned an id.
//!
//! Spawning requires a Tokio runtime.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{AbortHandle, Abortable, Aborted, BoxFuture, FutureExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::TodoClient;
use crate::config::SyncConfig;
use crate::error::{ApiError, Rejection};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{CreateTask, Task, TaskId, TaskPatch};

/// Handle to a mutation request that has already been sent.
pub type InFlight = JoinHandle<Result<(), ApiError>>;

/// Pending input fields for the next task creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub text: String,
    pub due_at: Option<DateTime<Utc>>,
}

impl Draft {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Result of resolving a `PendingLoad`.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Vec<Task>),
    Aborted,
    Failed(ApiError),
}

/// A list request that has not been applied yet.
///
/// The request is issued when `resolve` is first polled. Aborting before or
/// during the round-trip yields `LoadOutcome::Aborted`.
pub struct PendingLoad {
    handle: AbortHandle,
    fetch: Abortable<BoxFuture<'static, Result<Vec<Task>, ApiError>>>,
}

impl PendingLoad {
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.clone()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    pub async fn resolve(self) -> LoadOutcome {
        let result = self.fetch.await;
        if self.handle.is_aborted() {
            return LoadOutcome::Aborted;
        }
        match result {
            Ok(Ok(tasks)) => LoadOutcome::Loaded(tasks),
            Ok(Err(err)) => LoadOutcome::Failed(err),
            Err(Aborted) => LoadOutcome::Aborted,
        }
    }
}

/// A creation request that is already in flight.
///
/// Dropping it does not cancel the request; the server may still create the
/// task, it just never reaches the local collection.
pub struct PendingCreate {
    input: CreateTask,
    request: JoinHandle<Result<Task, ApiError>>,
}

impl PendingCreate {
    /// Wait for the server-assigned id and build the local task from it and
    /// the locally supplied fields.
    pub async fn resolve(self) -> Result<Task, ApiError> {
        let created = self
            .request
            .await
            .map_err(|e| ApiError::TransportError(e.to_string()))??;
        Ok(Task {
            id: created.id,
            text: self.input.text,
            due_at: Some(self.input.due_at),
            is_done: false,
        })
    }
}

/// Result of a `create` call that did not fail at the API level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(Task),
    Rejected(Rejection),
}

pub struct TodoListSynchronizer<T> {
    client: TodoClient,
    transport: Arc<T>,
    tasks: Vec<Task>,
    draft: Draft,
    loaded: bool,
}

impl TodoListSynchronizer<ReqwestTransport> {
    pub fn from_config(config: &SyncConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::new(TodoClient::new(&config.api_url), transport))
    }
}

impl<T: Transport + 'static> TodoListSynchronizer<T> {
    pub fn new(client: TodoClient, transport: T) -> Self {
        Self {
            client,
            transport: Arc::new(transport),
            tasks: Vec::new(),
            draft: Draft::default(),
            loaded: false,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether a load has completed successfully at least once.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    pub fn reset_draft(&mut self) {
        self.draft.reset();
    }

    /// Prepare a fetch of the full collection.
    pub fn load(&self) -> PendingLoad {
        let client = self.client.clone();
        let transport = Arc::clone(&self.transport);
        let fetch = async move {
            let response = transport.execute(client.build_list_tasks()).await?;
            client.parse_list_tasks(response)
        }
        .boxed();
        let (handle, registration) = AbortHandle::new_pair();
        PendingLoad {
            handle,
            fetch: Abortable::new(fetch, registration),
        }
    }

    /// Replace the local collection with a loaded one. Returns whether the
    /// collection was replaced.
    pub fn apply_load(&mut self, outcome: LoadOutcome) -> bool {
        match outcome {
            LoadOutcome::Loaded(tasks) => {
                self.tasks = dedup_by_id(tasks);
                self.loaded = true;
                info!(count = self.tasks.len(), "loaded tasks");
                true
            }
            LoadOutcome::Aborted => {
                debug!("task load aborted");
                false
            }
            LoadOutcome::Failed(err) => {
                warn!(error = %err, "failed to load tasks");
                false
            }
        }
    }

    /// Load and apply in one step.
    pub async fn reload(&mut self) -> bool {
        let outcome = self.load().resolve().await;
        self.apply_load(outcome)
    }

    /// Validate the input and send the creation request.
    pub fn begin_create(
        &self,
        text: &str,
        due_at: Option<DateTime<Utc>>,
    ) -> Result<PendingCreate, Rejection> {
        let Some(due_at) = due_at else {
            return Err(Rejection::MissingDueAt);
        };
        if text.is_empty() {
            return Err(Rejection::EmptyText);
        }

        let input = CreateTask {
            text: text.to_string(),
            due_at,
        };
        let client = self.client.clone();
        let transport = Arc::clone(&self.transport);
        let body = input.clone();
        debug!("sending create request");
        let request = tokio::spawn(async move {
            let request = client.build_create_task(&body)?;
            let response = transport.execute(request).await?;
            client.parse_create_task(response)
        });
        Ok(PendingCreate { input, request })
    }

    /// Append a confirmed task and clear the draft.
    pub fn finish_create(&mut self, task: Task) -> &Task {
        self.draft.reset();
        let index = match self.tasks.iter().position(|t| t.id == task.id) {
            Some(index) => {
                warn!(id = %task.id, "server returned an existing id; replacing entry");
                self.tasks[index] = task;
                index
            }
            None => {
                self.tasks.push(task);
                self.tasks.len() - 1
            }
        };
        &self.tasks[index]
    }

    /// Create a task and wait for the server to confirm it.
    ///
    /// Missing due time or empty text is rejected without sending anything.
    pub async fn create(
        &mut self,
        text: &str,
        due_at: Option<DateTime<Utc>>,
    ) -> Result<CreateOutcome, ApiError> {
        let pending = match self.begin_create(text, due_at) {
            Ok(pending) => pending,
            Err(rejection) => {
                debug!(%rejection, "create rejected");
                return Ok(CreateOutcome::Rejected(rejection));
            }
        };
        match pending.resolve().await {
            Ok(task) => Ok(CreateOutcome::Created(self.finish_create(task).clone())),
            Err(err) => {
                warn!(error = %err, "failed to create task");
                Err(err)
            }
        }
    }

    /// Create a task from the draft fields.
    pub async fn submit_draft(&mut self) -> Result<CreateOutcome, ApiError> {
        let Draft { text, due_at } = self.draft.clone();
        self.create(&text, due_at).await
    }

    /// Apply `patch` locally, then send it.
    ///
    /// Returns `None` without sending anything when `id` is not in the local
    /// collection or the patch would empty the task's text.
    pub fn update(&mut self, id: TaskId, patch: TaskPatch) -> Option<InFlight> {
        if patch.text.as_deref() == Some("") {
            debug!(%id, rejection = %Rejection::EmptyText, "update rejected");
            return None;
        }
        let task = self.tasks.iter_mut().find(|task| task.id == id)?;
        patch.apply_to(task);

        let request = self.client.build_update_task(id, &patch);
        Some(self.dispatch("update", id, request, TodoClient::parse_update_task))
    }

    pub fn toggle_done(&mut self, id: TaskId, is_done: bool) -> Option<InFlight> {
        self.update(id, TaskPatch::done(is_done))
    }

    /// Remove the task locally, then send the deletion.
    pub fn delete(&mut self, id: TaskId) -> Option<InFlight> {
        let index = self.tasks.iter().position(|task| task.id == id)?;
        self.tasks.remove(index);

        let request = Ok(self.client.build_delete_task(id));
        Some(self.dispatch("delete", id, request, TodoClient::parse_delete_task))
    }

    fn dispatch(
        &self,
        op: &'static str,
        id: TaskId,
        request: Result<HttpRequest, ApiError>,
        parse: fn(&TodoClient, HttpResponse) -> Result<(), ApiError>,
    ) -> InFlight {
        let client = self.client.clone();
        let transport = Arc::clone(&self.transport);
        debug!(op, %id, "sending request");
        tokio::spawn(async move {
            let result = match request {
                Ok(request) => match transport.execute(request).await {
                    Ok(response) => parse(&client, response),
                    Err(err) => Err(err),
                },
                Err(err) => Err(err),
            };
            if let Err(err) = &result {
                warn!(op, %id, error = %err, "request failed; local change kept");
            }
            result
        })
    }
}

/// Keep the first task for each id.
fn dedup_by_id(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::with_capacity(tasks.len());
    tasks
        .into_iter()
        .filter(|task| {
            let fresh = seen.insert(task.id);
            if !fresh {
                warn!(id = %task.id, "dropping duplicate task from load");
            }
            fresh
        })
        .collect()
}

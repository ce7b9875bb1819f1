use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub text: String,
    pub due_at: Option<DateTime<Utc>>,
    pub is_done: bool,
    pub is_show: bool,
}

#[derive(Serialize, Deserialize)]
pub struct TaskList {
    pub result: Vec<Task>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub text: String,
    pub due_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct UpdateTask {
    pub data: TaskChanges,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskChanges {
    pub text: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub is_done: Option<bool>,
}

/// Tasks keyed by id. Ids only grow, so key order is insertion order.
#[derive(Default)]
pub struct Store {
    last_id: u64,
    tasks: BTreeMap<u64, Task>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/todos", get(list_tasks).post(create_task))
        .route("/todos/{id}", put(update_task).delete(delete_task))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_tasks(State(db): State<Db>) -> Json<TaskList> {
    let store = db.read().await;
    Json(TaskList {
        result: store.tasks.values().cloned().collect(),
    })
}

async fn create_task(
    State(db): State<Db>,
    Json(input): Json<CreateTask>,
) -> (StatusCode, Json<Task>) {
    let mut store = db.write().await;
    store.last_id += 1;
    let task = Task {
        id: store.last_id,
        text: input.text,
        due_at: Some(input.due_at),
        is_done: false,
        is_show: true,
    };
    store.tasks.insert(task.id, task.clone());
    tracing::info!(id = task.id, "created task");
    (StatusCode::CREATED, Json(task))
}

async fn update_task(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<UpdateTask>,
) -> Result<Json<Task>, StatusCode> {
    let mut store = db.write().await;
    let task = store.tasks.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    let changes = input.data;
    if let Some(text) = changes.text {
        task.text = text;
    }
    if let Some(due_at) = changes.due_at {
        task.due_at = Some(due_at);
    }
    if let Some(is_done) = changes.is_done {
        task.is_done = is_done;
    }
    Ok(Json(task.clone()))
}

async fn delete_task(
    State(db): State<Db>,
    Path(id): Path<u64>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    store
        .tasks
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

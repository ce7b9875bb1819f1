//! Optimistic client-side synchronization for a remote task list.
//!
//! # Overview
//! `TodoListSynchronizer` keeps an ordered local collection of tasks in step
//! with a REST collection resource. Updates, done-toggles and deletions are
//! applied locally before the server answers; creations appear once the
//! server has assigned an id; the initial load can be aborted.
//!
//! # Design
//! - `TodoClient` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_*` consumes an `HttpResponse`, so the wire format is testable
//!   without a network.
//! - A `Transport` executes the round-trip. `ReqwestTransport` is the real
//!   one; tests script their own.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod sync;
pub mod transport;
pub mod types;

pub use client::TodoClient;
pub use crate::config::SyncConfig;
pub use error::{ApiError, Rejection};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use sync::{
    CreateOutcome, Draft, InFlight, LoadOutcome, PendingCreate, PendingLoad, TodoListSynchronizer,
};
pub use transport::{ReqwestTransport, Transport};
pub use types::{CreateTask, Task, TaskId, TaskPatch};

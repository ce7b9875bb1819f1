//! Stateless HTTP request builder and response parser for the task API.
//!
//! # Design
//! `TodoClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! The wire shapes are the server's: listing wraps tasks in `{"result": [..]}`
//! and updates wrap the changed fields in `{"data": {..}}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{CreateTask, Task, TaskId, TaskPatch};

#[derive(Deserialize)]
struct TaskList {
    result: Vec<Task>,
}

#[derive(Serialize)]
struct UpdateEnvelope<'a> {
    data: &'a TaskPatch,
}

/// Synchronous, stateless client for the task API.
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

    pub fn build_list_tasks(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}/todos", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_create_task(&self, input: &CreateTask) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}/todos", self.base_url),
            headers: json_headers(),
            body: Some(to_json(input)?),
        })
    }

    pub fn build_update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Put,
            path: format!("{}/todos/{id}", self.base_url),
            headers: json_headers(),
            body: Some(to_json(&UpdateEnvelope { data: patch })?),
        })
    }

    pub fn build_delete_task(&self, id: TaskId) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            path: format!("{}/todos/{id}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn parse_list_tasks(&self, response: HttpResponse) -> Result<Vec<Task>, ApiError> {
        check_status(&response)?;
        let list: TaskList = from_json(&response.body)?;
        Ok(list.result)
    }

    pub fn parse_create_task(&self, response: HttpResponse) -> Result<Task, ApiError> {
        check_status(&response)?;
        from_json(&response.body)
    }

    /// The update response body is not used; only the status is checked.
    pub fn parse_update_task(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_delete_task(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }
}

fn json_headers() -> Vec<(String, String)> {
    vec![("content-type".to_string(), "application/json".to_string())]
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::SerializationError(e.to_string()))
}

fn from_json<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn client() -> TodoClient {
        TodoClient::new("http://localhost:3000")
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_list_tasks_produces_correct_request() {
        let req = client().build_list_tasks();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/todos");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn build_create_task_produces_correct_request() {
        let input = CreateTask {
            text: "Buy milk".to_string(),
            due_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
        };
        let req = client().build_create_task(&input).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/todos");
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["text"], "Buy milk");
        assert_eq!(body["dueAt"], "2025-03-01T09:30:00.000Z");
    }

    #[test]
    fn build_update_task_wraps_fields_in_data() {
        let req = client()
            .build_update_task(TaskId(4), &TaskPatch::text("Updated"))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.path, "http://localhost:3000/todos/4");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "data": { "text": "Updated" } }));
    }

    #[test]
    fn build_delete_task_produces_correct_request() {
        let req = client().build_delete_task(TaskId(9));
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.path, "http://localhost:3000/todos/9");
        assert!(req.body.is_none());
    }

    #[test]
    fn parse_list_tasks_unwraps_result() {
        let body = r#"{"result":[
            {"id":2,"text":"B","dueAt":"2025-03-01T09:30:00.000Z","isDone":false,"isShow":true},
            {"id":1,"text":"A","dueAt":null,"isDone":true,"isShow":true}
        ]}"#;
        let tasks = client().parse_list_tasks(response(200, body)).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, TaskId(2));
        assert_eq!(tasks[1].text, "A");
        assert!(tasks[1].is_done);
    }

    #[test]
    fn parse_list_tasks_rejects_bare_array() {
        let err = client().parse_list_tasks(response(200, "[]")).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn parse_create_task_accepts_any_success_status() {
        let body = r#"{"id":7,"text":"New","dueAt":"2025-03-01T09:30:00.000Z","isDone":false}"#;
        assert_eq!(client().parse_create_task(response(201, body)).unwrap().id, TaskId(7));
        assert_eq!(client().parse_create_task(response(200, body)).unwrap().id, TaskId(7));
    }

    #[test]
    fn parse_create_task_wrong_status() {
        let err = client()
            .parse_create_task(response(500, "internal error"))
            .unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 500, .. }));
    }

    #[test]
    fn parse_update_task_ignores_body() {
        assert!(client().parse_update_task(response(200, "not json")).is_ok());
    }

    #[test]
    fn parse_delete_task_not_found() {
        let err = client().parse_delete_task(response(404, "")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = TodoClient::new("http://localhost:3000/");
        assert_eq!(client.build_list_tasks().path, "http://localhost:3000/todos");
    }
}

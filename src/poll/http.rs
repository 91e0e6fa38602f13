//! HTTP task source backed by the conversation server.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{TaskResult, TaskSource};

/// Fetches task states from `GET {base}/conversations/{id}/tasks`.
pub struct HttpTaskSource {
    client: reqwest::Client,
    base_url: String,
}

/// Server response envelope.
#[derive(Debug, Deserialize)]
struct TaskListResponse {
    tasks: Vec<TaskResult>,
}

impl HttpTaskSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TaskSource for HttpTaskSource {
    async fn fetch(&self, conversation_id: &str) -> Result<Vec<TaskResult>> {
        let url = format!("{}/conversations/{}/tasks", self.base_url, conversation_id);
        let response = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .context("Failed to fetch task states")?;

        if !response.status().is_success() {
            anyhow::bail!("Task endpoint returned status {}", response.status());
        }

        let body: TaskListResponse = response
            .json()
            .await
            .context("Failed to parse task list response")?;

        Ok(body.tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::TaskStatus;

    #[test]
    fn test_trailing_slash_trimmed() {
        let source = HttpTaskSource::new("http://localhost:8080/");
        assert_eq!(source.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_task_list_envelope_decodes() {
        let raw = r#"{"tasks": [
            {"item_id": "t1", "component_type": "markdown", "status": "pending"},
            {"item_id": "t2", "component_type": "report", "status": "error", "error": "oom"}
        ]}"#;
        let body: TaskListResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.tasks.len(), 2);
        assert_eq!(body.tasks[0].status, TaskStatus::Pending);
        assert_eq!(body.tasks[1].error.as_deref(), Some("oom"));
    }
}

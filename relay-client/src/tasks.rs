//! Task-related API endpoints

use async_trait::async_trait;
use relay_core::domain::task::{PollOperation, TaskDescriptor, TaskId};
use relay_core::dto::task::{
    SubmitTaskRequest, SubmitTaskResponse, TaskLogsResponse, TaskStatusResponse,
};
use tracing::debug;

use crate::JobControllerClient;
use crate::controller::JobController;
use crate::error::{ClientError, Result};

impl JobControllerClient {
    // =============================================================================
    // Task Lifecycle
    // =============================================================================

    /// Submit a task for remote execution
    ///
    /// # Arguments
    /// * `task` - The composed task descriptor
    ///
    /// # Returns
    /// The id the controller assigned to the task
    pub async fn submit_task(&self, task: &TaskDescriptor) -> Result<TaskId> {
        let url = format!("{}/jobs", self.base_url);
        debug!("Submitting task to {}", url);
        let response = self
            .client
            .post(&url)
            .json(&SubmitTaskRequest::from(task))
            .send()
            .await?;

        let body: SubmitTaskResponse = self.handle_response(response).await?;
        Ok(body.task_id)
    }

    /// Get the status of a task
    ///
    /// # Arguments
    /// * `task_id` - The task id returned by `submit_task`
    pub async fn task_status(&self, task_id: &TaskId) -> Result<PollOperation> {
        let url = format!("{}/jobs/{}", self.base_url, task_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(task_id.to_string()));
        }

        let body: TaskStatusResponse = self.handle_response(response).await?;
        Ok(PollOperation {
            task_id: task_id.clone(),
            status: body.status,
            logs_available: body.logs_available,
        })
    }

    // =============================================================================
    // Task Logs
    // =============================================================================

    /// Get the logs of a task
    ///
    /// Controllers answer either with a `{"logs": ...}` document or with the
    /// raw log text; both are accepted.
    pub async fn task_logs(&self, task_id: &TaskId) -> Result<String> {
        let url = format!("{}/jobs/{}/logs", self.base_url, task_id);
        let response = self.client.get(&url).send().await?;

        let text = self.handle_text_response(response).await?;
        match serde_json::from_str::<TaskLogsResponse>(&text) {
            Ok(body) => Ok(body.logs),
            Err(_) => Ok(text),
        }
    }
}

#[async_trait]
impl JobController for JobControllerClient {
    async fn submit(&self, task: &TaskDescriptor) -> Result<TaskId> {
        self.submit_task(task).await
    }

    async fn check_status(&self, task_id: &TaskId) -> Result<PollOperation> {
        self.task_status(task_id).await
    }

    async fn get_logs(&self, task_id: &TaskId) -> Result<String> {
        self.task_logs(task_id).await
    }
}

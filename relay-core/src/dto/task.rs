//! Task DTOs for the job controller API

use serde::{Deserialize, Serialize};

use crate::domain::task::{TaskDescriptor, TaskId, TaskStatus};

/// Request body for task submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskRequest {
    pub experiment: String,
    pub image: String,
    pub cmd: String,
}

impl From<&TaskDescriptor> for SubmitTaskRequest {
    fn from(task: &TaskDescriptor) -> Self {
        Self {
            experiment: task.experiment.clone(),
            image: task.image.clone(),
            cmd: task.cmd.clone(),
        }
    }
}

/// Response to a task submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskResponse {
    #[serde(alias = "job_id")]
    pub task_id: TaskId,
}

/// Response to a status query
///
/// Extra fields the controller sends along are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub status: TaskStatus,
    #[serde(default)]
    pub logs_available: bool,
}

/// Response to a logs query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogsResponse {
    #[serde(default)]
    pub logs: String,
}

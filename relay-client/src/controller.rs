//! Job controller abstraction
//!
//! The engine only depends on this trait, so pollers can be driven by the
//! HTTP client in production and by in-process stubs in tests.

use async_trait::async_trait;
use relay_core::domain::task::{PollOperation, TaskDescriptor, TaskId};

use crate::error::Result;

/// Stateless request/response access to the job controller
///
/// Implementations are shared by every poller of a run and must be safe for
/// concurrent use.
#[async_trait]
pub trait JobController: Send + Sync {
    /// Submits a task and returns the controller-issued id
    async fn submit(&self, task: &TaskDescriptor) -> Result<TaskId>;

    /// Queries the current state of a task
    async fn check_status(&self, task_id: &TaskId) -> Result<PollOperation>;

    /// Fetches the logs the controller holds for a task
    async fn get_logs(&self, task_id: &TaskId) -> Result<String>;
}

//! Task poller
//!
//! Polls the job controller for the status of one task until it reaches a
//! final state or the retry budget for failing status queries runs out.
//!
//! States: `Submitted -> Polling -> {Succeeded, Failed}`, plus `Abandoned`
//! when the controller could not be queried often enough.

use relay_client::JobController;
use relay_core::domain::task::{PollOperation, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info};

/// How a poller paces itself and tolerates failing status queries
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Failed status queries tolerated before the poller gives up
    pub retries: u32,
    /// Refill the budget after every successful query (consecutive-failure semantics)
    pub reset_on_success: bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            retries: 10,
            reset_on_success: false,
        }
    }
}

/// How polling ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded(PollOperation),
    Failed(PollOperation),
    /// Retry budget exhausted; holds the last operation that was observed
    Abandoned(PollOperation),
}

impl PollOutcome {
    pub fn operation(&self) -> &PollOperation {
        match self {
            PollOutcome::Succeeded(op) | PollOutcome::Failed(op) | PollOutcome::Abandoned(op) => op,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Succeeded(_))
    }
}

/// Watches one submitted task
pub struct PollSupervisor {
    job: String,
    client: Arc<dyn JobController>,
    policy: PollPolicy,
}

impl PollSupervisor {
    pub fn new(job: impl Into<String>, client: Arc<dyn JobController>, policy: PollPolicy) -> Self {
        Self {
            job: job.into(),
            client,
            policy,
        }
    }

    /// Polls from `operation` until a final state
    ///
    /// Sleeps `interval` before every status query. When the task did not
    /// succeed, its controller logs are fetched and logged once.
    pub async fn run(self, mut operation: PollOperation) -> PollOutcome {
        let mut retries = self.policy.retries;

        while !operation.is_done() {
            time::sleep(self.policy.interval).await;

            debug!("[job {}] POLLING {}", self.job, operation.task_id);

            match self.client.check_status(&operation.task_id).await {
                Ok(op) => {
                    operation = op;
                    if self.policy.reset_on_success {
                        retries = self.policy.retries;
                    }
                }
                Err(e) => {
                    error!("[job {}] POLLING ERROR {}", self.job, e);
                    if retries > 0 {
                        retries -= 1;
                        continue;
                    }
                    error!("[job {}] MAX POLLING RETRIES EXCEEDED", self.job);
                    return PollOutcome::Abandoned(operation);
                }
            }
        }

        info!("[job {}] FINAL JOB STATE: {}", self.job, operation.status);

        if operation.status == TaskStatus::Succeeded {
            PollOutcome::Succeeded(operation)
        } else {
            self.log_failure(&operation).await;
            PollOutcome::Failed(operation)
        }
    }

    async fn log_failure(&self, operation: &PollOperation) {
        error!("[job {}] task id: {}", self.job, operation.task_id);
        match self.client.get_logs(&operation.task_id).await {
            Ok(logs) => error!("[job {}] logs: {}", self.job, logs),
            Err(e) => error!("[job {}] failed to fetch logs: {}", self.job, e),
        }
    }
}

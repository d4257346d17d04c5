//! Job orchestration
//!
//! The pipeline is the factory the workflow engine asks for runnable jobs,
//! and the registry of pollers for the current run. Jobs are fire-and-forget
//! from the engine's point of view; [`Pipeline::wait`] is the single join
//! point that blocks until every registered poller has delivered its outcome.

use chrono::{DateTime, Utc};
use relay_client::{JobController, JobControllerClient};
use relay_core::domain::outcome::{CompletionStatus, Outputs};
use relay_core::domain::step::StepSpec;
use relay_core::domain::task::TaskId;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::hooks::{ContainerResolver, StepHooks};
use crate::job::{RemoteJob, Runnable};
use crate::paths::PathTranslator;
use crate::scheduler::PollPolicy;
use crate::task::TaskMessageBuilder;

/// Creates runnable jobs from resolved steps
pub trait JobFactory {
    fn make_job(&self, step: StepSpec, hooks: StepHooks) -> Box<dyn Runnable>;
}

/// Final record of one job of the run
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: String,
    pub task_id: TaskId,
    pub status: CompletionStatus,
    /// Outputs delivered to the step's sink
    pub outputs: Outputs,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Reports of every job that was submitted during a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub reports: Vec<JobReport>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.reports
            .iter()
            .all(|r| r.status == CompletionStatus::Success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobReport> {
        self.reports
            .iter()
            .filter(|r| r.status != CompletionStatus::Success)
    }
}

struct RegisteredJob {
    name: String,
    task_id: TaskId,
    submitted_at: DateTime<Utc>,
    handle: JoinHandle<JobReport>,
}

/// State shared between the pipeline and the jobs it created
pub(crate) struct PipelineShared {
    pub(crate) config: EngineConfig,
    pub(crate) client: Arc<dyn JobController>,
    pub(crate) builder: TaskMessageBuilder,
    registry: Mutex<Vec<RegisteredJob>>,
}

impl PipelineShared {
    pub(crate) fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.config.poll_interval,
            retries: self.config.poll_retries,
            reset_on_success: self.config.reset_retries_on_success,
        }
    }

    /// Spawns a job's poller and tracks it until the run is joined
    pub(crate) fn register<F>(
        &self,
        name: String,
        task_id: TaskId,
        submitted_at: DateTime<Utc>,
        watch: F,
    ) where
        F: Future<Output = JobReport> + Send + 'static,
    {
        let handle = tokio::spawn(watch);
        self.registry().push(RegisteredJob {
            name,
            task_id,
            submitted_at,
            handle,
        });
    }

    fn registry(&self) -> MutexGuard<'_, Vec<RegisteredJob>> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Factory and poller registry for one workflow run
pub struct Pipeline {
    shared: Arc<PipelineShared>,
    container_resolver: Option<Arc<dyn ContainerResolver>>,
}

impl Pipeline {
    /// Creates a pipeline talking to the configured job controller over HTTP
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {}", e)))?;
        let client = JobControllerClient::with_client(config.job_controller_url.clone(), http);

        info!(
            "Job controller client initialized for {}",
            config.job_controller_url
        );

        Ok(Self::with_controller(config, Arc::new(client)))
    }

    /// Creates a pipeline using the given job controller
    pub fn with_controller(config: EngineConfig, client: Arc<dyn JobController>) -> Self {
        let translator = PathTranslator::new(
            config.workspace_root(),
            config.working_dir.to_string_lossy(),
        );
        let builder = TaskMessageBuilder::new(translator, config.experiment.clone());

        Self {
            shared: Arc::new(PipelineShared {
                config,
                client,
                builder,
                registry: Mutex::new(Vec::new()),
            }),
            container_resolver: None,
        }
    }

    /// Uses `resolver` to pick images for steps without a docker requirement
    pub fn with_container_resolver(mut self, resolver: Arc<dyn ContainerResolver>) -> Self {
        self.container_resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Number of registered pollers that have not finished yet
    pub fn active_jobs(&self) -> usize {
        self.shared
            .registry()
            .iter()
            .filter(|j| !j.handle.is_finished())
            .count()
    }

    /// Waits for every registered poller, including ones registered while waiting
    pub async fn wait(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        loop {
            let batch: Vec<RegisteredJob> = self.shared.registry().drain(..).collect();
            if batch.is_empty() {
                break;
            }

            for job in batch {
                match job.handle.await {
                    Ok(report) => summary.reports.push(report),
                    Err(e) => {
                        error!("[job {}] poller terminated abnormally: {}", job.name, e);
                        summary.reports.push(JobReport {
                            job: job.name,
                            task_id: job.task_id,
                            status: CompletionStatus::PermanentFail,
                            outputs: Outputs::new(),
                            submitted_at: job.submitted_at,
                            finished_at: Utc::now(),
                        });
                    }
                }
            }
        }

        info!(
            "Run finished: {} job(s), {} failed",
            summary.reports.len(),
            summary.failed().count()
        );
        summary
    }

    fn resolve_image(&self, step: &StepSpec) -> String {
        if let Some(image) = step.docker_image() {
            return image.to_string();
        }
        self.container_resolver
            .as_ref()
            .and_then(|r| r.default_container(step))
            .unwrap_or_else(|| self.shared.config.default_container.clone())
    }
}

impl JobFactory for Pipeline {
    fn make_job(&self, step: StepSpec, hooks: StepHooks) -> Box<dyn Runnable> {
        let image = self.resolve_image(&step);
        Box::new(RemoteJob::new(step, hooks, image, Arc::clone(&self.shared)))
    }
}

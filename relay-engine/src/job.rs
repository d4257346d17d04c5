//! Remote job
//!
//! A job turns one resolved step into a remote task: it assembles the
//! environment, stages volumes, builds the task message, submits it and
//! hands the task over to a poller registered with the pipeline.

use async_trait::async_trait;
use chrono::Utc;
use relay_core::domain::step::StepSpec;
use relay_core::domain::task::{PollOperation, TaskDescriptor, TaskStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use crate::collector::{self, Cleanup};
use crate::environment::{self, HostEnvironment, Passthrough};
use crate::error::{EngineError, Result};
use crate::hooks::StepHooks;
use crate::pipeline::{JobReport, PipelineShared};
use crate::scheduler::{PollOutcome, PollSupervisor};
use crate::task::TaskInputs;
use crate::volumes::VolumeResolver;

/// Per-run options passed to [`Runnable::run`]
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Remove the job's temp directory after completion
    pub remove_tmpdir: bool,
    /// Host variables passed through to the job
    pub passthrough: Passthrough,
    /// Bind writable inputs in place instead of copying them
    pub inplace_update: bool,
    /// Host environment snapshot the passthrough draws from
    pub host_env: HostEnvironment,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            remove_tmpdir: true,
            passthrough: Passthrough::None,
            inplace_update: false,
            host_env: HostEnvironment::capture(),
        }
    }
}

/// A job the workflow engine can start
///
/// `run` returns once the task is submitted; completion is reported
/// asynchronously through the step's output sink.
#[async_trait]
pub trait Runnable: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, options: RunOptions) -> Result<()>;
}

/// A step executed through the job controller
pub struct RemoteJob {
    step: StepSpec,
    hooks: StepHooks,
    image: String,
    shared: Arc<PipelineShared>,
    submitted: AtomicBool,
}

impl RemoteJob {
    pub(crate) fn new(
        step: StepSpec,
        hooks: StepHooks,
        image: String,
        shared: Arc<PipelineShared>,
    ) -> Self {
        Self {
            step,
            hooks,
            image,
            shared,
            submitted: AtomicBool::new(false),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

impl RemoteJob {
    /// Stages the step's volumes and builds its task message
    fn prepare(&self, options: &RunOptions) -> Result<TaskDescriptor> {
        let step = &self.step;
        let name = step.name.as_str();

        std::fs::create_dir_all(&step.tmpdir)
            .map_err(|e| EngineError::io("creating temp directory", &step.tmpdir, e))?;

        let env = environment::assemble(
            &step.environment,
            &options.passthrough,
            &options.host_env,
            &step.container_outdir,
            &step.tmpdir.to_string_lossy(),
        );

        let resolver = VolumeResolver::new(&step.outdir, &step.container_outdir, &step.tmpdir)
            .with_inplace_update(options.inplace_update);
        let mut resolution = resolver.resolve(&step.path_mappings)?;
        resolution.extend(resolver.resolve(&step.generated_mappings)?);

        debug!("[job {}] step in run(): {:#?}", name, step);

        let inputs = TaskInputs {
            environment: &env,
            bindings: &resolution.bindings,
            command_line: &step.command_line,
            stdin: step.stdin.as_deref(),
            stdout: step.stdout.as_deref(),
            stderr: step.stderr.as_deref(),
            outdir: &step.outdir,
            image: &self.image,
            docker_output_directory: step.docker_output_directory(),
            shell_command: step.requirements.shell_command,
            shell_quote: step.shell_quote,
        };
        let task = self.shared.builder.build(name, &inputs)?;

        info!("[job {}] CREATED TASK MSG", name);
        debug!("[job {}] task: {:#?}", name, task);
        Ok(task)
    }
}

#[async_trait]
impl Runnable for RemoteJob {
    fn name(&self) -> &str {
        &self.step.name
    }

    async fn run(&self, options: RunOptions) -> Result<()> {
        let step = &self.step;
        let name = step.name.as_str();

        if self.submitted.load(Ordering::SeqCst) {
            return Err(EngineError::AlreadySubmitted(name.to_string()));
        }

        let tmpdir_existed = step.tmpdir.exists();
        let task = match self.prepare(&options) {
            Ok(task) => task,
            Err(e) => {
                error!("[job {}] staging failed: {}", name, e);
                if !tmpdir_existed && step.tmpdir.exists() {
                    if let Err(rm) = std::fs::remove_dir_all(&step.tmpdir) {
                        warn!(
                            "[job {}] Failed to remove {}: {}",
                            name,
                            step.tmpdir.display(),
                            rm
                        );
                    }
                }
                return Err(e);
            }
        };

        if self.submitted.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadySubmitted(name.to_string()));
        }

        let client = Arc::clone(&self.shared.client);
        let task_id = client.submit(&task).await.map_err(|e| {
            error!("[job {}] Failed to submit task to job controller:\n{}", name, e);
            EngineError::Submission(e)
        })?;
        info!("[job {}] SUBMITTED TASK, task id: {}", name, task_id);
        let submitted_at = Utc::now();

        // status is unknown until the first poll
        let operation = PollOperation::new(task_id.clone(), TaskStatus::Queued);

        let poller = PollSupervisor::new(name, client, self.shared.poll_policy());
        let job_name = name.to_string();
        let outdir = step.outdir.clone();
        let hooks = self.hooks.clone();
        let cleanup = Cleanup {
            stagedir: step.stagedir.clone(),
            tmpdir: step.tmpdir.clone(),
            remove_tmpdir: options.remove_tmpdir,
        };

        let watch = async move {
            let outcome = poller.run(operation).await;
            if let PollOutcome::Abandoned(op) = &outcome {
                error!(
                    "[job {}] giving up on task {} in state {}",
                    job_name, op.task_id, op.status
                );
            }
            let completion = collector::finish(
                &job_name,
                outcome.is_success(),
                &outdir,
                &hooks,
                &cleanup,
            );
            JobReport {
                job: job_name,
                task_id: outcome.operation().task_id.clone(),
                status: completion.status,
                outputs: completion.outputs,
                submitted_at,
                finished_at: Utc::now(),
            }
        };

        self.shared
            .register(name.to_string(), task_id, submitted_at, watch);
        Ok(())
    }
}

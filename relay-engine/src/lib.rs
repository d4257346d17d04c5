//! Relay Engine
//!
//! Runs workflow steps as tasks on a remote job controller.
//!
//! Architecture:
//! - Configuration: controller connection, working directory layout, polling policy
//! - Volumes: staging of path mappings into bindings and output-directory copies
//! - Task: composition of one self-contained shell command per step
//! - Scheduler: one poller per submitted task, with bounded retry
//! - Pipeline: job factory, poller registry and the run's join point
//! - Collector: output collection, completion reporting and cleanup
//!
//! # Example
//!
//! ```no_run
//! use relay_engine::{EngineConfig, JobFactory, Pipeline, RunOptions, StepHooks};
//! # use relay_core::domain::step::StepSpec;
//! # async fn example(step: StepSpec, hooks: StepHooks) -> relay_engine::Result<()> {
//! let pipeline = Pipeline::new(EngineConfig::from_env()?)?;
//!
//! let job = pipeline.make_job(step, hooks);
//! job.run(RunOptions::default()).await?;
//!
//! let summary = pipeline.wait().await;
//! assert!(summary.all_succeeded());
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod environment;
pub mod error;
pub mod hooks;
pub mod job;
pub mod paths;
pub mod pipeline;
pub mod scheduler;
pub mod shell;
pub mod task;
pub mod telemetry;
pub mod volumes;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use hooks::{ContainerResolver, OutputCollector, OutputSink, RawDatum, RawOutputs, StepHooks};
pub use job::{RemoteJob, RunOptions, Runnable};
pub use pipeline::{JobFactory, JobReport, Pipeline, RunSummary};

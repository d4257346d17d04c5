//! Capabilities supplied by the workflow engine
//!
//! The adapter never depends on a specific engine; it calls back into these
//! traits for output collection, completion reporting and default image
//! selection.

use relay_core::domain::outcome::{CompletionStatus, Outputs};
use relay_core::domain::step::StepSpec;
use std::path::Path;
use std::sync::Arc;

/// A key or value as produced by the engine's output collection
///
/// Collections may carry raw bytes; they are decoded to text before the
/// outputs are reported.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDatum {
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl From<&str> for RawDatum {
    fn from(s: &str) -> Self {
        RawDatum::Text(s.to_string())
    }
}

impl From<serde_json::Value> for RawDatum {
    fn from(v: serde_json::Value) -> Self {
        RawDatum::Json(v)
    }
}

pub type RawOutputs = Vec<(RawDatum, RawDatum)>;

/// Collects the declared outputs of a finished step from its output directory
pub trait OutputCollector: Send + Sync {
    fn collect_outputs(&self, outdir: &Path) -> anyhow::Result<RawOutputs>;
}

/// Receives the final outcome of a job
pub trait OutputSink: Send + Sync {
    fn deliver(&self, outputs: Outputs, status: CompletionStatus);
}

/// Picks an image for steps that do not declare one
pub trait ContainerResolver: Send + Sync {
    fn default_container(&self, step: &StepSpec) -> Option<String>;
}

/// The per-step hooks handed over together with a step
#[derive(Clone)]
pub struct StepHooks {
    pub collector: Arc<dyn OutputCollector>,
    pub sink: Arc<dyn OutputSink>,
}

impl StepHooks {
    pub fn new(collector: Arc<dyn OutputCollector>, sink: Arc<dyn OutputSink>) -> Self {
        Self { collector, sink }
    }
}

//! Engine error types

use relay_client::ClientError;
use std::path::Path;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem operation on a staging or output path failed
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A writable mapping points outside the container output directory
    #[error("writable mapping target {target} is outside of output directory {outdir}")]
    WritableOutsideOutdir { target: String, outdir: String },

    #[error("environment does not define HOME")]
    MissingHome,

    #[error("step {0} has an empty command line")]
    EmptyCommand(String),

    /// Submitting the task or reading its first status failed
    #[error("failed to submit task to job controller: {0}")]
    Submission(#[from] ClientError),

    #[error("job {0} was already submitted")]
    AlreadySubmitted(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn io(context: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context: format!("{} {}", context.into(), path.display()),
            source,
        }
    }
}

//! Job outcome types reported back to the workflow engine

use serde::{Deserialize, Serialize};

/// Collected outputs of a job, keyed by output name
pub type Outputs = serde_json::Map<String, serde_json::Value>;

/// Final status delivered to the workflow engine's output callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "permanentFail")]
    PermanentFail,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Success => "success",
            CompletionStatus::PermanentFail => "permanentFail",
        }
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

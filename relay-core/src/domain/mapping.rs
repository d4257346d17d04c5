//! Path mapping domain types

use serde::{Deserialize, Serialize};

/// Prefix marking a mapping source that has not been materialized on disk yet
pub const PLACEHOLDER_PREFIX: &str = "_:";

/// How a staged path is exposed to the remote task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingKind {
    File,
    Directory,
    WritableFile,
    WritableDirectory,
    CreateFile,
}

/// A single local-to-remote path correspondence produced by the workflow engine
///
/// For `CreateFile` entries `resolved` holds the inline file content rather
/// than a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMappingEntry {
    pub resolved: String,
    pub target: String,
    pub kind: MappingKind,
    #[serde(default = "default_staged")]
    pub staged: bool,
}

fn default_staged() -> bool {
    true
}

impl PathMappingEntry {
    pub fn new(resolved: impl Into<String>, target: impl Into<String>, kind: MappingKind) -> Self {
        Self {
            resolved: resolved.into(),
            target: target.into(),
            kind,
            staged: true,
        }
    }

    /// Marks the entry as not staged; the resolver skips it
    pub fn unstaged(mut self) -> Self {
        self.staged = false;
        self
    }

    /// Whether the source is a placeholder with no real path behind it
    pub fn is_placeholder(&self) -> bool {
        self.resolved.starts_with(PLACEHOLDER_PREFIX)
    }
}

/// A pass-through mount resolved from a path mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub host_path: String,
    pub remote_path: String,
}

impl VolumeBinding {
    pub fn new(host_path: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            remote_path: remote_path.into(),
        }
    }
}

//! Step specification handed over by the workflow engine
//!
//! Everything here is already resolved by the engine: command-line tokens,
//! environment, stream redirections and path mappings. The adapter only
//! translates it into a remote task.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::env::Environment;
use crate::domain::mapping::PathMappingEntry;

/// One resolved execution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    pub command_line: Vec<String>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub stdin: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    /// Output directory on the host (the local mirror of the remote outputs)
    pub outdir: PathBuf,
    /// Output directory as seen by the command line
    pub container_outdir: String,
    pub tmpdir: PathBuf,
    #[serde(default)]
    pub stagedir: Option<PathBuf>,
    #[serde(default)]
    pub path_mappings: Vec<PathMappingEntry>,
    /// Mappings generated for the initial working directory, resolved after `path_mappings`
    #[serde(default)]
    pub generated_mappings: Vec<PathMappingEntry>,
    #[serde(default)]
    pub requirements: Requirements,
    /// First binding-level `shellQuote` flag, if any binding declared one
    #[serde(default = "default_shell_quote")]
    pub shell_quote: bool,
}

fn default_shell_quote() -> bool {
    true
}

/// Requirement lookups the adapter performs on a step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub docker: Option<DockerRequirement>,
    #[serde(default)]
    pub shell_command: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerRequirement {
    #[serde(default)]
    pub image: Option<String>,
    /// Output directory inside the container, copied back into the mounted outdir
    #[serde(default)]
    pub output_directory: Option<String>,
}

impl StepSpec {
    /// Creates a step with the given command and directories, everything else empty
    pub fn new(
        name: impl Into<String>,
        command_line: Vec<String>,
        outdir: impl Into<PathBuf>,
        container_outdir: impl Into<String>,
        tmpdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            command_line,
            environment: Environment::new(),
            stdin: None,
            stdout: None,
            stderr: None,
            outdir: outdir.into(),
            container_outdir: container_outdir.into(),
            tmpdir: tmpdir.into(),
            stagedir: None,
            path_mappings: Vec::new(),
            generated_mappings: Vec::new(),
            requirements: Requirements::default(),
            shell_quote: true,
        }
    }

    /// Docker image declared by the step, if any
    pub fn docker_image(&self) -> Option<&str> {
        self.requirements
            .docker
            .as_ref()
            .and_then(|d| d.image.as_deref())
    }

    pub fn docker_output_directory(&self) -> Option<&str> {
        self.requirements
            .docker
            .as_ref()
            .and_then(|d| d.output_directory.as_deref())
    }
}

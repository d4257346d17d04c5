//! Engine configuration
//!
//! Defines the job controller connection, the remote working directory
//! layout, and the polling policy shared by every job of a run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Organisation names whose working directories live on the shared volume
const ORGANIZATIONS: &[&str] = &["default", "alice"];

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Job controller base URL (e.g., "http://localhost:5000")
    pub job_controller_url: String,

    /// Remote working directory of the workflow
    pub working_dir: PathBuf,

    /// Shared volume that organisation-relative working directories resolve to
    pub shared_volume: Option<PathBuf>,

    /// Image used for steps that declare no container
    pub default_container: String,

    /// Experiment tag attached to every submitted task
    pub experiment: String,

    /// Pause between two status queries of the same task
    pub poll_interval: Duration,

    /// Status query failures tolerated per task before giving up
    pub poll_retries: u32,

    /// Restore the retry budget after every successful status query
    pub reset_retries_on_success: bool,

    /// Timeout applied to every job controller request
    pub request_timeout: Duration,
}

impl EngineConfig {
    /// Creates a new configuration with defaults
    pub fn new(job_controller_url: String, working_dir: PathBuf) -> Self {
        Self {
            job_controller_url,
            working_dir,
            shared_volume: None,
            default_container: "frolvlad/alpine-bash".to_string(),
            experiment: "default".to_string(),
            poll_interval: Duration::from_secs(1),
            poll_retries: 10,
            reset_retries_on_success: false,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - JOB_CONTROLLER_URL (required)
    /// - WORKING_DIR (required)
    /// - SHARED_VOLUME (optional)
    /// - DEFAULT_CONTAINER (optional, default: frolvlad/alpine-bash)
    /// - EXPERIMENT (optional, default: default)
    /// - POLL_INTERVAL (optional, seconds, default: 1)
    /// - POLL_RETRIES (optional, default: 10)
    /// - POLL_RESET_RETRIES (optional, true/false, default: false)
    /// - REQUEST_TIMEOUT (optional, seconds, default: 30)
    pub fn from_env() -> Result<Self> {
        let job_controller_url = std::env::var("JOB_CONTROLLER_URL").map_err(|_| {
            EngineError::Config("JOB_CONTROLLER_URL environment variable not set".into())
        })?;

        let working_dir = std::env::var("WORKING_DIR")
            .map_err(|_| EngineError::Config("WORKING_DIR environment variable not set".into()))?;

        let mut config = Self::new(job_controller_url, PathBuf::from(working_dir));

        config.shared_volume = std::env::var("SHARED_VOLUME").ok().map(PathBuf::from);

        if let Ok(image) = std::env::var("DEFAULT_CONTAINER") {
            config.default_container = image;
        }

        if let Ok(experiment) = std::env::var("EXPERIMENT") {
            config.experiment = experiment;
        }

        config.poll_interval = std::env::var("POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(config.poll_interval);

        config.poll_retries = std::env::var("POLL_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(config.poll_retries);

        config.reset_retries_on_success = std::env::var("POLL_RESET_RETRIES")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(false);

        config.request_timeout = std::env::var("REQUEST_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(config.request_timeout);

        if let Some(volume) = &config.shared_volume {
            config.working_dir = resolve_working_dir(&config.working_dir, volume);
        }

        Ok(config)
    }

    /// Sets the shared volume and re-resolves the working directory against it
    pub fn with_shared_volume(mut self, volume: PathBuf) -> Self {
        self.working_dir = resolve_working_dir(&self.working_dir, &volume);
        self.shared_volume = Some(volume);
        self
    }

    /// Root that CWL staging paths are rewritten to on the remote side
    pub fn workspace_root(&self) -> String {
        let parent = self
            .working_dir
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/workspace", parent.trim_end_matches('/'))
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.job_controller_url.is_empty() {
            return Err(EngineError::Config(
                "job_controller_url cannot be empty".into(),
            ));
        }

        if !self.job_controller_url.starts_with("http://")
            && !self.job_controller_url.starts_with("https://")
        {
            return Err(EngineError::Config(
                "job_controller_url must start with http:// or https://".into(),
            ));
        }

        if self.working_dir.as_os_str().is_empty() {
            return Err(EngineError::Config("working_dir cannot be empty".into()));
        }

        if self.poll_interval.is_zero() {
            return Err(EngineError::Config(
                "poll_interval must be greater than 0".into(),
            ));
        }

        if self.default_container.is_empty() {
            return Err(EngineError::Config(
                "default_container cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(
            "http://localhost:5000".to_string(),
            PathBuf::from("/var/reana/workspace"),
        )
    }
}

/// Replaces a leading organisation segment with the shared volume
///
/// `default/users/x/workflow` becomes `<volume>/users/x/workflow`; any other
/// path is returned unchanged.
pub fn resolve_working_dir(working_dir: &Path, shared_volume: &Path) -> PathBuf {
    let mut components = working_dir.components();
    let first = components
        .next()
        .map(|c| c.as_os_str().to_string_lossy().into_owned());

    match first {
        Some(org) if ORGANIZATIONS.contains(&org.as_str()) => {
            shared_volume.join(components.as_path())
        }
        _ => working_dir.to_path_buf(),
    }
}

//! Output collection and cleanup
//!
//! Runs once per job, after the poller reached a final state. A job either
//! reports all of its outputs with `success` or nothing with
//! `permanentFail`; staging directories are released in both cases.

use anyhow::Context as _;
use relay_core::domain::outcome::{CompletionStatus, Outputs};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::hooks::{RawDatum, RawOutputs, StepHooks};

/// Directories owned by one job and released after completion
#[derive(Debug, Clone)]
pub struct Cleanup {
    pub stagedir: Option<PathBuf>,
    pub tmpdir: PathBuf,
    pub remove_tmpdir: bool,
}

impl Cleanup {
    /// Removes the staging directory and, if requested, the temp directory
    ///
    /// Failures are logged and otherwise ignored.
    pub fn run(&self, job: &str) {
        debug!("[job {}] Starting cleanup", job);

        if let Some(stagedir) = &self.stagedir {
            if stagedir.exists() {
                debug!("[job {}] Removing input staging directory {}", job, stagedir.display());
                remove_dir(job, stagedir);
            }
        }

        if self.remove_tmpdir && self.tmpdir.exists() {
            debug!("[job {}] Removing temporary directory {}", job, self.tmpdir.display());
            remove_dir(job, &self.tmpdir);
        }
    }
}

fn remove_dir(job: &str, path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        warn!("[job {}] Failed to remove {}: {}", job, path.display(), e);
    }
}

/// Runs cleanup when dropped, so it happens even if the sink panics
struct CleanupGuard<'a> {
    job: &'a str,
    cleanup: &'a Cleanup,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.cleanup.run(self.job);
    }
}

/// Decodes collected keys and values to text where they arrived as bytes
pub fn normalize(raw: RawOutputs) -> anyhow::Result<Outputs> {
    let mut outputs = Outputs::new();
    for (key, value) in raw {
        let key = match key {
            RawDatum::Text(s) => s,
            RawDatum::Bytes(b) => String::from_utf8(b).context("output name is not valid UTF-8")?,
            RawDatum::Json(Value::String(s)) => s,
            RawDatum::Json(other) => other.to_string(),
        };
        let value = match value {
            RawDatum::Text(s) => Value::String(s),
            RawDatum::Bytes(b) => Value::String(
                String::from_utf8(b)
                    .with_context(|| format!("output {} is not valid UTF-8", key))?,
            ),
            RawDatum::Json(v) => v,
        };
        outputs.insert(key, value);
    }
    Ok(outputs)
}

/// What a finished job reported to its sink
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub status: CompletionStatus,
    /// Normalized outputs; empty unless `status` is `Success`
    pub outputs: Outputs,
}

/// Delivers the job's outcome exactly once, then cleans up
pub fn finish(
    job: &str,
    task_succeeded: bool,
    outdir: &Path,
    hooks: &StepHooks,
    cleanup: &Cleanup,
) -> Completion {
    let _guard = CleanupGuard { job, cleanup };

    let (outputs, status) = if task_succeeded {
        match hooks
            .collector
            .collect_outputs(outdir)
            .and_then(normalize)
        {
            Ok(outputs) => (outputs, CompletionStatus::Success),
            Err(e) => {
                error!("[job {}] job error:\n{:#}", job, e);
                (Outputs::new(), CompletionStatus::PermanentFail)
            }
        }
    } else {
        (Outputs::new(), CompletionStatus::PermanentFail)
    };

    if status == CompletionStatus::Success {
        info!(
            "[job {}] OUTPUTS: {}",
            job,
            serde_json::to_string_pretty(&outputs).unwrap_or_default()
        );
    }

    hooks.sink.deliver(outputs.clone(), status);
    Completion { status, outputs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{OutputCollector, OutputSink};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    struct FixedCollector(Mutex<Option<anyhow::Result<RawOutputs>>>);

    impl OutputCollector for FixedCollector {
        fn collect_outputs(&self, _outdir: &Path) -> anyhow::Result<RawOutputs> {
            self.0.lock().unwrap().take().expect("collected twice")
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<(Outputs, CompletionStatus)>>);

    impl OutputSink for RecordingSink {
        fn deliver(&self, outputs: Outputs, status: CompletionStatus) {
            self.0.lock().unwrap().push((outputs, status));
        }
    }

    fn scratch_dirs() -> (PathBuf, Cleanup) {
        let root = std::env::temp_dir().join(format!("relay-collect-{}", Uuid::new_v4()));
        let stagedir = root.join("stage");
        let tmpdir = root.join("tmp");
        std::fs::create_dir_all(&stagedir).unwrap();
        std::fs::create_dir_all(&tmpdir).unwrap();
        (
            root,
            Cleanup {
                stagedir: Some(stagedir),
                tmpdir,
                remove_tmpdir: true,
            },
        )
    }

    fn hooks(result: anyhow::Result<RawOutputs>) -> (StepHooks, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let hooks = StepHooks::new(
            Arc::new(FixedCollector(Mutex::new(Some(result)))),
            sink.clone(),
        );
        (hooks, sink)
    }

    #[test]
    fn test_normalize_decodes_bytes() {
        let raw = vec![
            (RawDatum::Bytes(b"out".to_vec()), RawDatum::Bytes(b"file.txt".to_vec())),
            (RawDatum::from("n"), RawDatum::Json(json!(3))),
        ];
        let outputs = normalize(raw).unwrap();
        assert_eq!(outputs["out"], json!("file.txt"));
        assert_eq!(outputs["n"], json!(3));
    }

    #[test]
    fn test_normalize_rejects_invalid_utf8() {
        let raw = vec![(RawDatum::from("out"), RawDatum::Bytes(vec![0xff, 0xfe]))];
        assert!(normalize(raw).is_err());
    }

    #[test]
    fn test_success_delivers_outputs_and_cleans_up() {
        let (root, cleanup) = scratch_dirs();
        let (hooks, sink) = hooks(Ok(vec![(RawDatum::from("out"), RawDatum::from("x"))]));

        let completion = finish("j", true, &root, &hooks, &cleanup);

        assert_eq!(completion.status, CompletionStatus::Success);
        let delivered = sink.0.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0["out"], json!("x"));
        assert_eq!(completion.outputs, delivered[0].0);
        assert!(!root.join("stage").exists());
        assert!(!root.join("tmp").exists());
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_collection_error_is_permanent_fail() {
        let (root, cleanup) = scratch_dirs();
        let (hooks, sink) = hooks(Err(anyhow::anyhow!("missing output")));

        let completion = finish("j", true, &root, &hooks, &cleanup);

        assert_eq!(completion.status, CompletionStatus::PermanentFail);
        assert!(completion.outputs.is_empty());
        let delivered = sink.0.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].0.is_empty());
        assert_eq!(delivered[0].1, CompletionStatus::PermanentFail);
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_failed_task_skips_collection() {
        let (root, cleanup) = scratch_dirs();
        let (hooks, sink) = hooks(Ok(vec![(RawDatum::from("out"), RawDatum::from("x"))]));

        let completion = finish("j", false, &root, &hooks, &cleanup);

        assert_eq!(completion.status, CompletionStatus::PermanentFail);
        assert!(sink.0.lock().unwrap()[0].0.is_empty());
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_tmpdir_is_kept_when_requested() {
        let (root, mut cleanup) = scratch_dirs();
        cleanup.remove_tmpdir = false;
        let (hooks, _) = hooks(Ok(Vec::new()));

        finish("j", true, &root, &hooks, &cleanup);

        assert!(!root.join("stage").exists());
        assert!(root.join("tmp").exists());
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_cleanup_tolerates_missing_directories() {
        let cleanup = Cleanup {
            stagedir: Some(PathBuf::from("/nonexistent/relay/stage")),
            tmpdir: PathBuf::from("/nonexistent/relay/tmp"),
            remove_tmpdir: true,
        };
        cleanup.run("j");
    }
}

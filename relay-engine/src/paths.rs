//! Local-to-remote path translation
//!
//! Command lines are built against local staging paths, but run on a remote
//! host where only the workflow working directory exists. Two path schemes
//! are rewritten:
//!
//! - `/var/lib/cwl/<stage>/...` (CWL staging root) becomes `<workspace_root>/...`
//! - `/tmp/<a>/<b>/...` (per-step temp layout) becomes `<working_dir>/...`

use std::path::Path;

const STAGING_ROOT: &str = "/var/lib/cwl/";
const TMP_ROOT: &str = "/tmp/";

/// Fixed rewrite rules for one workflow run
#[derive(Debug, Clone)]
pub struct PathTranslator {
    workspace_root: String,
    working_dir: String,
}

impl PathTranslator {
    pub fn new(workspace_root: impl Into<String>, working_dir: impl Into<String>) -> Self {
        Self {
            workspace_root: workspace_root.into().trim_end_matches('/').to_string(),
            working_dir: working_dir.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn working_dir(&self) -> &str {
        &self.working_dir
    }

    /// Rewrites every staging-root and temp path occurrence in a command line
    pub fn rewrite_command(&self, command: &str) -> String {
        let staged = rewrite_prefixed(
            command,
            STAGING_ROOT,
            1,
            &format!("{}/", self.workspace_root),
        );
        rewrite_prefixed(&staged, TMP_ROOT, 2, &format!("{}/", self.working_dir))
    }

    /// Output directory as mounted on the remote host
    pub fn mounted_outdir(&self, outdir: &Path) -> String {
        let outdir = outdir.to_string_lossy();
        if outdir.starts_with("/tmp") {
            rewrite_prefixed(&outdir, TMP_ROOT, 2, &format!("{}/", self.working_dir))
        } else {
            outdir.into_owned()
        }
    }
}

/// Replaces `marker` plus the following `segments` slash-terminated path
/// segments with `replacement`, for every non-overlapping occurrence
fn rewrite_prefixed(input: &str, marker: &str, segments: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(marker) {
        let after = &rest[start + marker.len()..];
        match segments_len(after, segments) {
            Some(len) => {
                out.push_str(&rest[..start]);
                out.push_str(replacement);
                rest = &after[len..];
            }
            None => {
                // markers start with '/', so this advances one char
                out.push_str(&rest[..start + 1]);
                rest = &rest[start + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Byte length of the first `n` slash-terminated segments, if all are present
/// and none spans a line break
fn segments_len(s: &str, n: usize) -> Option<usize> {
    let mut pos = 0;
    for _ in 0..n {
        let idx = s[pos..].find(['/', '\n'])?;
        if s[pos + idx..].starts_with('\n') {
            return None;
        }
        pos += idx + 1;
    }
    Some(pos)
}

//! Per-job environment assembly
//!
//! The job environment is built once, before the task message, from the
//! step's own variables and an explicit snapshot of the host environment.
//! Nothing reads or mutates the process environment afterwards.

use relay_core::domain::env::Environment;
use std::collections::HashMap;

/// Snapshot of host variables that may be passed through to a job
#[derive(Debug, Clone, Default)]
pub struct HostEnvironment {
    vars: HashMap<String, String>,
}

impl HostEnvironment {
    /// Captures the current process environment
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HostEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Which host variables a job inherits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Passthrough {
    #[default]
    None,
    /// Only the named variables
    Only(Vec<String>),
    /// Every host variable
    All,
}

/// Builds the environment a job's command runs with
///
/// Step variables win over passed-through host variables. `HOME` always
/// points at the container output directory and `TMPDIR` at the job's
/// temp directory; `PATH` and `SYSTEMROOT` fall back to the host values.
pub fn assemble(
    step_env: &Environment,
    passthrough: &Passthrough,
    host: &HostEnvironment,
    container_outdir: &str,
    tmpdir: &str,
) -> Environment {
    let mut env = step_env.clone();

    match passthrough {
        Passthrough::None => {}
        Passthrough::Only(names) => {
            for name in names {
                if let Some(value) = host.get(name) {
                    env.set_default(name.as_str(), value);
                }
            }
        }
        Passthrough::All => {
            let mut keys: Vec<&String> = host.vars.keys().collect();
            keys.sort();
            for key in keys {
                env.set_default(key.as_str(), host.vars[key].as_str());
            }
        }
    }

    env.set("HOME", container_outdir);
    env.set("TMPDIR", tmpdir);

    if let Some(path) = host.get("PATH") {
        env.set_default("PATH", path);
    }
    if let Some(root) = host.get("SYSTEMROOT") {
        env.set_default("SYSTEMROOT", root);
    }

    env
}

//! Task message building
//!
//! Composes a step's environment, mounts, command line and redirections into
//! one self-contained `/bin/sh -c '...'` invocation that the job controller
//! can run remotely. This is a pure string transform; all staging has
//! already happened in the volume resolver.

use relay_core::domain::env::Environment;
use relay_core::domain::mapping::VolumeBinding;
use relay_core::domain::task::TaskDescriptor;
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::paths::PathTranslator;
use crate::shell;

/// Interpreters whose presence as first token means the command already is a shell call
const SHELLS: &[&str] = &["/bin/bash", "/bin/sh"];

/// Everything the builder needs from one job
#[derive(Debug, Clone)]
pub struct TaskInputs<'a> {
    pub environment: &'a Environment,
    pub bindings: &'a [VolumeBinding],
    pub command_line: &'a [String],
    pub stdin: Option<&'a str>,
    pub stdout: Option<&'a str>,
    pub stderr: Option<&'a str>,
    /// Host output directory; translated to the remote mount point
    pub outdir: &'a Path,
    pub image: &'a str,
    pub docker_output_directory: Option<&'a str>,
    pub shell_command: bool,
    pub shell_quote: bool,
}

/// Builds task descriptors for one run
#[derive(Debug, Clone)]
pub struct TaskMessageBuilder {
    translator: PathTranslator,
    experiment: String,
}

impl TaskMessageBuilder {
    pub fn new(translator: PathTranslator, experiment: impl Into<String>) -> Self {
        Self {
            translator,
            experiment: experiment.into(),
        }
    }

    pub fn build(&self, name: &str, inputs: &TaskInputs<'_>) -> Result<TaskDescriptor> {
        let script = self.compose_script(name, inputs)?;
        Ok(TaskDescriptor {
            experiment: self.experiment.clone(),
            image: inputs.image.to_string(),
            cmd: format!("/bin/sh -c {}", shell::quote(&script)),
        })
    }

    /// The composite shell script, before it is wrapped into `/bin/sh -c`
    pub fn compose_script(&self, name: &str, inputs: &TaskInputs<'_>) -> Result<String> {
        let home = inputs
            .environment
            .get("HOME")
            .ok_or(EngineError::MissingHome)?;
        if inputs.command_line.is_empty() {
            return Err(EngineError::EmptyCommand(name.to_string()));
        }

        let mut preamble = String::new();
        for (var, value) in inputs.environment.iter() {
            preamble.push_str(&format!("export {}=\"{}\";", var, value));
        }
        for binding in inputs.bindings {
            preamble.push_str(&format!(
                "ln -s {} {} ;",
                binding.host_path, binding.remote_path
            ));
        }

        let mounted_outdir = self.translator.mounted_outdir(inputs.outdir);
        let bypass_quoting = inputs.shell_command
            || SHELLS.contains(&inputs.command_line[0].as_str());

        let mut command = if bypass_quoting {
            inputs
                .command_line
                .iter()
                .skip(2)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            shell::join_quoted(inputs.command_line)
        };
        command = command.replace("/bin/sh -c ", "");
        command = self.translator.rewrite_command(&command);

        if let Some(stdin) = inputs.stdin {
            let path = if is_absolute(stdin) {
                stdin.to_string()
            } else {
                let segments: Vec<&str> = stdin.split('/').collect();
                if segments.len() > 1 {
                    let parent = parent_of(&mounted_outdir);
                    join(parent, segments[segments.len() - 1])
                } else {
                    join(&mounted_outdir, stdin)
                }
            };
            command.push_str(&format!(" < {}", path));
        }

        if let Some(stdout) = inputs.stdout {
            command.push_str(&format!(" > {}", resolve_against(home, stdout)));
        }

        if let Some(stderr) = inputs.stderr {
            let path = resolve_against(home, stderr);
            command.push_str(&format!(" 2> {}", path));
            if inputs.shell_command && !inputs.shell_quote {
                command = command.replace("&2", &path);
            }
        }

        let mut script = format!("{preamble}mkdir -p {home} && cd {home} && {command}");

        if let Some(dod) = inputs.docker_output_directory {
            script = format!("mkdir -p {dod} && {script} ; cp -r {dod} {mounted_outdir}");
        }
        script.push_str(&format!("; cp -r {home}/* {mounted_outdir}"));

        Ok(script)
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

fn resolve_against(base: &str, path: &str) -> String {
    if is_absolute(path) {
        path.to_string()
    } else {
        join(base, path)
    }
}

fn join(base: &str, rel: &str) -> String {
    if base.is_empty() || base.ends_with('/') {
        format!("{base}{rel}")
    } else {
        format!("{base}/{rel}")
    }
}

fn parent_of(path: &str) -> &str {
    path.rfind('/').map(|idx| &path[..idx]).unwrap_or("")
}

//! External command execution.
//!
//! Bundles are produced by external tools (a script bundler, a style
//! processor) that write the compiled output to stdout. A command that
//! cannot be started and a command that exits non-zero are reported as
//! different errors so callers can recover from the latter.

use regex::Regex;
use std::{
    borrow::Cow,
    ffi::OsString,
    io,
    path::Path,
    process::{Command, ExitStatus, Output, Stdio},
    sync::OnceLock,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty command")]
    Empty,

    #[error("failed to execute `{name}`")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("`{name}` failed with {status}\n{stderr}")]
    Failed {
        name: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Run `cmd` with `args` appended and return its stdout.
pub fn run(root: Option<&Path>, cmd: &[String], args: &[OsString]) -> Result<String, ExecError> {
    let (name, mut command) = prepare(root, cmd, args)?;

    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ExecError::Spawn {
            name: name.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ExecError::Failed {
            stderr: failure_message(&output),
            status: output.status,
            name,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Build a [`Command`] from the configured argv plus extra arguments.
fn prepare(
    root: Option<&Path>,
    cmd: &[String],
    args: &[OsString],
) -> Result<(String, Command), ExecError> {
    let (program, rest) = cmd.split_first().ok_or(ExecError::Empty)?;

    let mut command = Command::new(program);
    command.args(rest).args(args.iter().filter(|a| !a.is_empty()));
    if let Some(root) = root {
        command.current_dir(root);
    }

    let name = Path::new(program)
        .file_name()
        .map_or_else(|| program.clone(), |n| n.to_string_lossy().into_owned());
    Ok((name, command))
}

/// Stderr (or stdout when stderr is empty) without terminal colors.
fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        stderr
    };
    strip_ansi(text.trim()).into_owned()
}

/// Remove ANSI color escape sequences.
pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    re.replace_all(s, "")
}

//! Tooling to bundle the OAK-D camera module into a single-file executable and release archive.

use std::{iter, process::ExitStatus};

use anyhow::Context;
use tokio::process::Command;

mod archive;
mod build;
pub mod logging;

pub use archive::{ArchiveSummary, archive_dir};
pub use build::{
    BundleConfig, BundleReport, Bundler, DEFAULT_PYTHON_VERSION, Host, PythonVersion, Stage, clean,
    locate_data_dir,
};

/// An external tool exited unsuccessfully
#[derive(Debug, thiserror::Error)]
#[error("command `{command}` failed ({status})")]
pub struct CommandFailed {
    /// The full command line that was run
    pub command: String,
    /// Exit status reported by the tool
    pub status: ExitStatus,
}

impl CommandFailed {
    /// Exit code to hand back to our own caller.
    ///
    /// Falls back to `1` when the tool was terminated by a signal or reported a code that
    /// doesn't fit in a process exit status.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.status
            .code()
            .and_then(|code| u8::try_from(code).ok())
            .filter(|code| *code != 0)
            .unwrap_or(1)
    }
}

fn command_string(command: &Command) -> String {
    iter::once(command.as_std().get_program())
        .chain(command.as_std().get_args())
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a given command with common error handling behavior
///
/// Output of the tool goes straight to the terminal.
///
/// # Errors
///
/// Returns error if the command cannot be spawned or exits unsuccessfully. In the latter case
/// the error is a [`CommandFailed`].
pub async fn run(command: &mut Command) -> anyhow::Result<()> {
    let command_string = command_string(command);
    tracing::debug!(command = %command_string, "running");

    let status = command.status().await.with_context({
        let command_string = command_string.clone();
        move || command_string
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(CommandFailed {
            command: command_string,
            status,
        }
        .into())
    }
}

/// Run a given command and capture its standard output
///
/// # Errors
///
/// Returns error if the command cannot be spawned, exits unsuccessfully, or prints something
/// that isn't UTF-8.
pub async fn run_output(command: &mut Command) -> anyhow::Result<String> {
    let command_string = command_string(command);
    tracing::debug!(command = %command_string, "running");

    let output = command.output().await.with_context({
        let command_string = command_string.clone();
        move || command_string
    })?;

    if output.status.success() {
        Ok(String::from_utf8(output.stdout)?)
    } else {
        tracing::error!(
            command = %command_string,
            stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
            "command failed"
        );
        Err(CommandFailed {
            command: command_string,
            status: output.status,
        }
        .into())
    }
}

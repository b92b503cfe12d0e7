use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tokio::process::Command;

use crate::run;

use super::PythonVersion;

#[cfg(windows)]
const BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
const BIN_DIR: &str = "bin";
#[cfg(windows)]
const PYTHON_EXECUTABLE: &str = "python.exe";
#[cfg(not(windows))]
const PYTHON_EXECUTABLE: &str = "python";

/// A virtual environment on disk
#[derive(Debug)]
pub struct Venv {
    dir: PathBuf,
    cwd: PathBuf,
}

impl Venv {
    /// Create a fresh virtual environment at `dir` from pyenv's `version`.
    ///
    /// An existing environment at the same location is cleared.
    pub async fn create(
        pyenv: &Path,
        version: &PythonVersion,
        dir: PathBuf,
        cwd: &Path,
    ) -> anyhow::Result<Self> {
        tracing::info!(%version, venv = %dir.display(), "creating virtual environment");
        run(Command::new(pyenv)
            .args(["exec", "python", "-m", "venv", "--clear"])
            .arg(&dir)
            .env("PYENV_VERSION", version.as_str())
            .current_dir(cwd))
        .await?;

        Ok(Self {
            dir,
            cwd: cwd.to_owned(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn python(&self) -> PathBuf {
        self.dir.join(BIN_DIR).join(PYTHON_EXECUTABLE)
    }

    fn path_variable(&self) -> anyhow::Result<OsString> {
        let bin = self.dir.join(BIN_DIR);
        let existing = env::var_os("PATH").unwrap_or_default();
        env::join_paths(std::iter::once(bin).chain(env::split_paths(&existing)))
            .context("venv path contains a path separator")
    }

    /// `python` inside the environment, set up as if the environment were activated
    pub fn python_command(&self) -> anyhow::Result<Command> {
        let mut command = Command::new(self.python());
        command
            .current_dir(&self.cwd)
            // Make it possible to not have to activate the venv
            .env("PATH", self.path_variable()?)
            .env("VIRTUAL_ENV", &self.dir);
        Ok(command)
    }

    pub async fn upgrade_pip(&self) -> anyhow::Result<()> {
        run(self
            .python_command()?
            .args(["-m", "pip", "install", "--upgrade", "pip"]))
        .await
    }

    pub async fn install_requirements(&self, requirements: &Path) -> anyhow::Result<()> {
        tracing::info!(requirements = %requirements.display(), "installing dependencies");
        run(self
            .python_command()?
            .args(["-m", "pip", "install", "-r"])
            .arg(requirements))
        .await
    }
}

use std::{env, fmt, path::Path};

use anyhow::Context;
use tokio::process::Command;

use crate::{run, run_output};

/// Python used when no version is requested
pub const DEFAULT_PYTHON_VERSION: &str = "3.11.7";

/// Configure flags that make pyenv build `libpython` as a shared library
const SHARED_LIBRARY_CONFIGURE_OPTS: &str = "--enable-shared";

/// A pyenv version identifier, e.g. `3.11.7`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PythonVersion(String);

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PythonVersion {
    /// Use the requested version, or the default if nothing (or an empty string) was requested
    #[must_use]
    pub fn resolve(requested: Option<String>) -> Self {
        match requested.map(|v| v.trim().to_owned()) {
            Some(version) if !version.is_empty() => Self(version),
            _ => {
                tracing::warn!(
                    "PYTHON_VERSION not set, defaulting to Python {DEFAULT_PYTHON_VERSION}"
                );
                Self(DEFAULT_PYTHON_VERSION.to_owned())
            }
        }
    }

    /// The version as pyenv expects it on the command line
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Operating system and CPU architecture we're running on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Host {
    /// As reported by [`env::consts::OS`]
    pub os: String,
    /// As reported by [`env::consts::ARCH`]
    pub arch: String,
}

impl Host {
    /// The machine this process runs on
    #[must_use]
    pub fn current() -> Self {
        Self {
            os: env::consts::OS.to_owned(),
            arch: env::consts::ARCH.to_owned(),
        }
    }

    /// pyenv builds a static `libpython` on 64-bit ARM Linux, which `PyInstaller` can't bundle
    #[must_use]
    pub fn needs_shared_library_rebuild(&self) -> bool {
        self.os == "linux" && self.arch == "aarch64"
    }
}

/// Make sure pyenv has the requested Python.
///
/// On hosts that need it, any existing install is removed and Python is rebuilt with shared
/// library support. Everywhere else the version is only installed if it is missing.
///
/// # Errors
/// If pyenv fails. A failed uninstall aborts before anything is installed.
pub async fn provision(pyenv: &Path, version: &PythonVersion, host: &Host) -> anyhow::Result<()> {
    if !host.needs_shared_library_rebuild() {
        tracing::debug!(os = %host.os, arch = %host.arch, "no shared library rebuild needed");
        return run(Command::new(pyenv).args(["install", "--skip-existing", version.as_str()]))
            .await;
    }

    tracing::info!(
        %version,
        os = %host.os,
        arch = %host.arch,
        "installing Python with shared library support"
    );

    if is_installed(pyenv, version).await? {
        tracing::info!(%version, "Python already installed, uninstalling first");
        run(Command::new(pyenv).args(["uninstall", "-f", version.as_str()]))
            .await
            .with_context(|| format!("failed to uninstall Python {version}"))?;
    }

    run(Command::new(pyenv)
        .args(["install", "-v", version.as_str()])
        .env("PYTHON_CONFIGURE_OPTS", SHARED_LIBRARY_CONFIGURE_OPTS))
    .await
}

async fn is_installed(pyenv: &Path, version: &PythonVersion) -> anyhow::Result<bool> {
    let versions = run_output(Command::new(pyenv).args(["versions", "--bare"])).await?;
    Ok(versions.lines().any(|line| line.trim() == version.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_requested_version() {
        assert_eq!(
            PythonVersion::resolve(Some("3.12.1".into())).as_str(),
            "3.12.1"
        );
    }

    #[test]
    fn falls_back_to_default() {
        assert_eq!(PythonVersion::resolve(None).as_str(), DEFAULT_PYTHON_VERSION);
        assert_eq!(
            PythonVersion::resolve(Some("  ".into())).as_str(),
            DEFAULT_PYTHON_VERSION
        );
    }

    #[test]
    fn only_arm_linux_rebuilds() {
        let host = |os: &str, arch: &str| Host {
            os: os.into(),
            arch: arch.into(),
        };

        assert!(host("linux", "aarch64").needs_shared_library_rebuild());
        assert!(!host("linux", "x86_64").needs_shared_library_rebuild());
        assert!(!host("macos", "aarch64").needs_shared_library_rebuild());
        assert!(!host("windows", "x86_64").needs_shared_library_rebuild());
    }
}

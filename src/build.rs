use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::fs;

use crate::archive::{ArchiveSummary, archive_dir};

mod interpreter;
mod pyinstaller;
mod resources;
mod venv;

pub use interpreter::{DEFAULT_PYTHON_VERSION, Host, PythonVersion};
pub use resources::locate_data_dir;

use pyinstaller::PackageSpec;
use venv::Venv;

/// Dependency manifest, relative to the project directory
pub const DEFAULT_REQUIREMENTS: &str = "requirements.txt";
/// Application entry point, relative to the project directory
pub const DEFAULT_ENTRY_POINT: &str = "src/main.py";
/// Isolated environment the dependencies are installed into
pub const DEFAULT_VENV_DIR: &str = ".venv";
/// Scratch directory for `PyInstaller`'s build files and spec
pub const DEFAULT_WORK_DIR: &str = "build";
/// Where the single-file executable is written
pub const DEFAULT_DIST_DIR: &str = "dist";
/// Release archive of the output directory
pub const DEFAULT_ARCHIVE: &str = "module.tar.gz";
/// Package whose data directory has to travel with the executable
pub const DEFAULT_DATA_PACKAGE: &str = "depthai_sdk";
/// Module that `PyInstaller` can't discover by itself
pub const DEFAULT_HIDDEN_IMPORT: &str = "blobconverter";

/// Stages of a bundle run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    /// Make the requested Python available through pyenv
    Provision,
    /// Create the virtual environment and install requirements
    Install,
    /// Find the data directory to bundle
    Locate,
    /// Run `PyInstaller`
    Package,
    /// Compress the output directory
    Archive,
}

/// Everything a bundle run needs to know.
///
/// Relative paths are resolved against `project_dir`.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Root of the Python project
    pub project_dir: PathBuf,
    /// Requested Python version. Falls back to [`DEFAULT_PYTHON_VERSION`]
    pub python_version: Option<String>,
    /// pyenv executable
    pub pyenv: PathBuf,
    /// Dependency manifest
    pub requirements: PathBuf,
    /// Application entry point
    pub entry_point: PathBuf,
    /// Virtual environment directory
    pub venv_dir: PathBuf,
    /// `PyInstaller` work directory
    pub work_dir: PathBuf,
    /// Output directory for the executable
    pub dist_dir: PathBuf,
    /// Archive destination
    pub archive: PathBuf,
    /// Package whose directory is bundled as data
    pub data_package: String,
    /// Module declared as a hidden import
    pub hidden_import: String,
    /// Platform we're building on
    pub host: Host,
}

impl BundleConfig {
    /// Default layout for the project at `project_dir`
    #[must_use]
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            python_version: None,
            pyenv: PathBuf::from("pyenv"),
            requirements: PathBuf::from(DEFAULT_REQUIREMENTS),
            entry_point: PathBuf::from(DEFAULT_ENTRY_POINT),
            venv_dir: PathBuf::from(DEFAULT_VENV_DIR),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            dist_dir: PathBuf::from(DEFAULT_DIST_DIR),
            archive: PathBuf::from(DEFAULT_ARCHIVE),
            data_package: DEFAULT_DATA_PACKAGE.to_owned(),
            hidden_import: DEFAULT_HIDDEN_IMPORT.to_owned(),
            host: Host::current(),
        }
    }

    /// Resolve a configured path against the project directory
    #[must_use]
    pub fn path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.project_dir.join(path)
    }
}

/// Outcome of a successful bundle run
#[derive(Debug, Clone)]
pub struct BundleReport {
    /// Python version the bundle was built with
    pub python_version: PythonVersion,
    /// Data directory that was bundled
    pub data_dir: PathBuf,
    /// The single-file executable
    pub executable: PathBuf,
    /// The release archive
    pub archive: ArchiveSummary,
}

/// Runs the bundle stages in order, stopping at the first failure
#[derive(Debug)]
pub struct Bundler {
    config: BundleConfig,
}

impl Bundler {
    /// New bundler for the given configuration.
    ///
    /// The project directory is made absolute against the current directory, since tools run
    /// from inside it.
    ///
    /// # Errors
    /// If the project directory is empty or the current directory can't be determined.
    pub fn new(mut config: BundleConfig) -> anyhow::Result<Self> {
        config.project_dir = std::path::absolute(&config.project_dir).with_context(|| {
            format!("resolving project directory {}", config.project_dir.display())
        })?;
        Ok(Self { config })
    }

    /// Provision, install, locate, package and archive.
    ///
    /// # Errors
    /// The first stage that fails ends the run. The error carries the stage name as context,
    /// and wraps a [`crate::CommandFailed`] if an external tool was the cause.
    pub async fn run(&self) -> anyhow::Result<BundleReport> {
        let python_version = stage(Stage::Provision, self.provision()).await?;
        let venv = stage(Stage::Install, self.install(&python_version)).await?;
        let data_dir = stage(Stage::Locate, async {
            locate_data_dir(venv.dir(), &self.config.data_package)
        })
        .await?;
        let executable = stage(Stage::Package, self.package(&venv, &data_dir)).await?;
        let archive = stage(
            Stage::Archive,
            archive_dir(
                self.config.path(&self.config.dist_dir),
                self.config.path(&self.config.archive),
            ),
        )
        .await?;

        Ok(BundleReport {
            python_version,
            data_dir,
            executable,
            archive,
        })
    }

    async fn provision(&self) -> anyhow::Result<PythonVersion> {
        let version = PythonVersion::resolve(self.config.python_version.clone());
        interpreter::provision(&self.config.pyenv, &version, &self.config.host).await?;
        Ok(version)
    }

    async fn install(&self, version: &PythonVersion) -> anyhow::Result<Venv> {
        let requirements = self.config.path(&self.config.requirements);
        if !requirements.is_file() {
            anyhow::bail!("dependency manifest {} not found", requirements.display());
        }

        let venv = Venv::create(
            &self.config.pyenv,
            version,
            self.config.path(&self.config.venv_dir),
            &self.config.project_dir,
        )
        .await?;
        venv.upgrade_pip().await?;
        venv.install_requirements(&requirements).await?;
        Ok(venv)
    }

    async fn package(&self, venv: &Venv, data_dir: &Path) -> anyhow::Result<PathBuf> {
        let entry_point = self.config.path(&self.config.entry_point);
        if !entry_point.is_file() {
            anyhow::bail!("entry point {} not found", entry_point.display());
        }

        let spec = PackageSpec {
            entry_point: &entry_point,
            dist_dir: &self.config.path(&self.config.dist_dir),
            work_dir: &self.config.path(&self.config.work_dir),
            data_dir,
            data_package: &self.config.data_package,
            hidden_import: &self.config.hidden_import,
        };
        pyinstaller::package(venv, &spec).await
    }
}

async fn stage<T>(
    stage: Stage,
    work: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    tracing::info!(%stage, "starting");
    work.await.with_context(|| format!("{stage} stage failed"))
}

/// Remove everything a bundle run leaves behind.
///
/// Returns the paths that were actually removed.
///
/// # Errors
/// If a path exists but cannot be removed.
pub async fn clean(config: &BundleConfig) -> anyhow::Result<Vec<PathBuf>> {
    let mut removed = vec![];
    for dir in [&config.venv_dir, &config.work_dir, &config.dist_dir] {
        let dir = config.path(dir);
        if dir.is_dir() {
            fs::remove_dir_all(&dir)
                .await
                .with_context(|| format!("removing {}", dir.display()))?;
            removed.push(dir);
        }
    }

    let archive = config.path(&config.archive);
    if archive.is_file() {
        fs::remove_file(&archive)
            .await
            .with_context(|| format!("removing {}", archive.display()))?;
        removed.push(archive);
    }

    for path in &removed {
        tracing::info!(path = %path.display(), "removed");
    }
    Ok(removed)
}

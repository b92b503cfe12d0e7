//! Bundle the OAK-D camera module into a single-file executable and release archive.

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use oakd_bundle::{
    BundleConfig, Bundler, CommandFailed, archive_dir, clean, locate_data_dir, logging,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None, propagate_version = true)]
struct Cli {
    /// Log every external command that gets run
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Root of the Python project. Other paths are relative to it
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Provision Python, install dependencies, package the executable and archive it.
    Bundle(BundleArgs),
    /// Print the data directory that would be bundled from an existing virtual environment.
    Locate {
        /// Virtual environment to search
        #[arg(long, default_value = ".venv")]
        venv_dir: PathBuf,
        /// Package to find
        #[arg(long, default_value = "depthai_sdk")]
        data_package: String,
    },
    /// Archive an existing output directory.
    Archive {
        /// Directory to archive
        #[arg(long, default_value = "dist")]
        dist_dir: PathBuf,
        /// Archive to write
        #[arg(long, default_value = "module.tar.gz")]
        archive: PathBuf,
    },
    /// Remove the virtual environment, build files, output directory and archive.
    Clean(Layout),
}

/// Where a bundle run puts things
#[derive(Debug, Args)]
struct Layout {
    /// Virtual environment directory
    #[arg(long, default_value = ".venv")]
    venv_dir: PathBuf,
    /// PyInstaller work directory
    #[arg(long, default_value = "build")]
    work_dir: PathBuf,
    /// Output directory for the executable
    #[arg(long, default_value = "dist")]
    dist_dir: PathBuf,
    /// Archive to write
    #[arg(long, default_value = "module.tar.gz")]
    archive: PathBuf,
}

#[derive(Debug, Args)]
struct BundleArgs {
    /// Python version to build with. Defaults to 3.11.7
    #[arg(long, env = "PYTHON_VERSION")]
    python_version: Option<String>,
    /// pyenv executable
    #[arg(long, env = "OAKD_BUNDLE_PYENV", default_value = "pyenv")]
    pyenv: PathBuf,
    /// Dependency manifest
    #[arg(long, default_value = "requirements.txt")]
    requirements: PathBuf,
    /// Application entry point
    #[arg(long, default_value = "src/main.py")]
    entry_point: PathBuf,
    /// Package whose directory is bundled as data
    #[arg(long, default_value = "depthai_sdk")]
    data_package: String,
    /// Module PyInstaller should include even though it can't see the import
    #[arg(long, default_value = "blobconverter")]
    hidden_import: String,
    #[command(flatten)]
    layout: Layout,
}

impl Layout {
    fn into_config(self, project_dir: PathBuf) -> BundleConfig {
        BundleConfig {
            venv_dir: self.venv_dir,
            work_dir: self.work_dir,
            dist_dir: self.dist_dir,
            archive: self.archive,
            ..BundleConfig::new(project_dir)
        }
    }
}

impl BundleArgs {
    fn into_config(self, project_dir: PathBuf) -> BundleConfig {
        BundleConfig {
            python_version: self.python_version,
            pyenv: self.pyenv,
            requirements: self.requirements,
            entry_point: self.entry_point,
            data_package: self.data_package,
            hidden_import: self.hidden_import,
            ..self.layout.into_config(project_dir)
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let project_dir = cli.project_dir;

    match cli.command {
        Commands::Bundle(args) => {
            let report = Bundler::new(args.into_config(project_dir))?.run().await?;
            println!("executable: {}", report.executable.display());
            println!("archive: {}", report.archive.path.display());
            println!("sha256: {}", report.archive.sha256);
        }
        Commands::Locate {
            venv_dir,
            data_package,
        } => {
            let data_dir = locate_data_dir(&project_dir.join(venv_dir), &data_package)?;
            println!("{}", data_dir.display());
        }
        Commands::Archive { dist_dir, archive } => {
            let summary = archive_dir(project_dir.join(dist_dir), project_dir.join(archive)).await?;
            println!("{}  {}", summary.sha256, summary.path.display());
        }
        Commands::Clean(layout) => {
            clean(&layout.into_config(project_dir)).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            err.downcast_ref::<CommandFailed>()
                .map_or(ExitCode::FAILURE, |failed| {
                    ExitCode::from(failed.exit_code())
                })
        }
    }
}

use std::{
    env,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::run;

use super::venv::Venv;

/// `--add-data` separates source and destination with the platform's path list separator
#[cfg(windows)]
const ADD_DATA_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const ADD_DATA_SEPARATOR: &str = ":";

/// What to hand `PyInstaller`
#[derive(Debug)]
pub struct PackageSpec<'a> {
    pub entry_point: &'a Path,
    pub dist_dir: &'a Path,
    pub work_dir: &'a Path,
    pub data_dir: &'a Path,
    pub data_package: &'a str,
    pub hidden_import: &'a str,
}

impl PackageSpec<'_> {
    /// Executable name, taken from the entry point's file stem
    fn name(&self) -> anyhow::Result<&OsStr> {
        self.entry_point
            .file_stem()
            .with_context(|| format!("entry point {} has no file name", self.entry_point.display()))
    }

    /// Where `PyInstaller` will put the executable
    fn executable(&self) -> anyhow::Result<PathBuf> {
        let mut name = self.name()?.to_owned();
        name.push(env::consts::EXE_SUFFIX);
        Ok(self.dist_dir.join(name))
    }

    fn args(&self) -> anyhow::Result<Vec<OsString>> {
        let mut add_data = self.data_dir.as_os_str().to_owned();
        add_data.push(ADD_DATA_SEPARATOR);
        add_data.push(self.data_package);

        let mut args: Vec<OsString> = ["-m", "PyInstaller", "--noconfirm", "--onefile", "--name"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(self.name()?.to_owned());
        args.extend([
            "--distpath".into(),
            self.dist_dir.into(),
            "--workpath".into(),
            self.work_dir.into(),
            "--specpath".into(),
            self.work_dir.into(),
            "--add-data".into(),
            add_data,
            "--hidden-import".into(),
            self.hidden_import.into(),
            self.entry_point.into(),
        ]);
        Ok(args)
    }
}

/// Build the single-file executable and return its path
pub async fn package(venv: &Venv, spec: &PackageSpec<'_>) -> anyhow::Result<PathBuf> {
    let executable = spec.executable()?;
    tracing::info!(
        entry_point = %spec.entry_point.display(),
        hidden_import = spec.hidden_import,
        "packaging"
    );

    run(venv.python_command()?.args(spec.args()?)).await?;

    if !executable.is_file() {
        anyhow::bail!(
            "PyInstaller finished but {} was not created",
            executable.display()
        );
    }
    Ok(executable)
}

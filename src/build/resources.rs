use std::path::{Path, PathBuf};

use anyhow::Context;

/// `site-packages` of the virtual environment at `venv_dir`, if one exists
#[cfg(not(windows))]
fn site_packages(venv_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let lib_dir = venv_dir.join("lib");
    let pattern = glob::Pattern::escape(&lib_dir.to_string_lossy()) + "/python3.*";

    // Sorted alphabetically, so the first match is stable
    for entry in glob::glob(&pattern)
        .with_context(|| format!("invalid search pattern {pattern}"))?
    {
        let path = entry?;
        if path.is_dir() {
            return Ok(Some(path.join("site-packages")));
        }
    }

    Ok(None)
}

#[cfg(windows)]
fn site_packages(venv_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let path = venv_dir.join("Lib").join("site-packages");
    Ok(path.is_dir().then_some(path))
}

/// Find the directory of `package` inside the virtual environment at `venv_dir`.
///
/// # Errors
/// If the environment has no `python3.*` library directory, or the package isn't installed.
pub fn locate_data_dir(venv_dir: &Path, package: &str) -> anyhow::Result<PathBuf> {
    let site_packages = site_packages(venv_dir)?.with_context(|| {
        format!(
            "no python3.* library directory in {}",
            venv_dir.join("lib").display()
        )
    })?;

    let data_dir = site_packages.join(package);
    if !data_dir.is_dir() {
        anyhow::bail!("{package} is not installed at {}", data_dir.display());
    }

    tracing::info!(data_dir = %data_dir.display(), "found data directory");
    Ok(data_dir)
}

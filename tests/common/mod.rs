//! Shell script stand-ins for pyenv, pip and PyInstaller that record how they were called.

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use tempfile::TempDir;

/// Which fake call should fail, and with what exit code
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    Uninstall(i32),
    Install(i32),
    Venv(i32),
    Pip(i32),
    PyInstaller(i32),
}

#[derive(Debug, Default)]
pub struct FakeTools {
    /// Versions `pyenv versions --bare` reports
    pub installed: Vec<String>,
    pub fail: Option<Fail>,
    /// Don't install the data package into the fake venv
    pub without_data_dir: bool,
}

/// A scratch project with a requirements file, an entry point and fake tools
#[derive(Debug)]
pub struct Project {
    pub dir: TempDir,
    pub pyenv: PathBuf,
    log: PathBuf,
}

impl Project {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Every recorded call, one per line
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(ToOwned::to_owned)
            .collect()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|call| call.starts_with(prefix))
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().position(|call| call.starts_with(prefix))
    }
}

fn exit_with(code: Option<i32>) -> String {
    code.map_or_else(|| ":".to_owned(), |code| format!("exit {code}"))
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

impl FakeTools {
    pub fn installed(mut self, version: &str) -> Self {
        self.installed.push(version.to_owned());
        self
    }

    pub fn failing(mut self, fail: Fail) -> Self {
        self.fail = Some(fail);
        self
    }

    pub fn without_data_dir(mut self) -> Self {
        self.without_data_dir = true;
        self
    }

    fn code(&self, matches: impl Fn(Fail) -> Option<i32>) -> String {
        exit_with(self.fail.and_then(matches))
    }

    pub fn project(self) -> Project {
        self.project_in(&std::env::temp_dir())
    }

    /// Same as [`FakeTools::project`], but the project lives under `parent`
    pub fn project_in(self, parent: &Path) -> Project {
        let dir = tempfile::tempdir_in(parent).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("requirements.txt"), "depthai-sdk\n").unwrap();
        fs::write(dir.path().join("src/main.py"), "print('oak')\n").unwrap();

        let tools = dir.path().join("tools");
        fs::create_dir_all(&tools).unwrap();
        let log = tools.join("calls.log");
        let pyenv = tools.join("pyenv");
        let python = tools.join("python");

        let installed = self
            .installed
            .iter()
            .map(|v| format!("echo {v}\n"))
            .collect::<String>();
        let data_dir = if self.without_data_dir {
            String::new()
        } else {
            r#"mkdir -p "$venv/lib/python3.11/site-packages/depthai_sdk""#.to_owned()
        };

        write_script(
            &pyenv,
            &format!(
                r#"echo "pyenv $*" >> "{log}"
case "$1" in
  versions)
{installed}    ;;
  uninstall)
    {uninstall} ;;
  install)
    echo "PYTHON_CONFIGURE_OPTS=$PYTHON_CONFIGURE_OPTS" >> "{log}"
    {install} ;;
  exec)
    echo "PYENV_VERSION=$PYENV_VERSION" >> "{log}"
    shift; shift
    exec "{python}" "$@" ;;
esac
exit 0
"#,
                log = log.display(),
                python = python.display(),
                uninstall = self.code(|f| match f {
                    Fail::Uninstall(c) => Some(c),
                    _ => None,
                }),
                install = self.code(|f| match f {
                    Fail::Install(c) => Some(c),
                    _ => None,
                }),
            ),
        );

        write_script(
            &python,
            &format!(
                r#"echo "python $*" >> "{log}"
if [ "$1" = "-m" ]; then
  case "$2" in
    venv)
      {venv}
      for venv; do :; done
      mkdir -p "$venv/bin"
      cp "{python}" "$venv/bin/python"
      {data_dir}
      ;;
    pip)
      {pip} ;;
    PyInstaller)
      {pyinstaller}
      while [ $# -gt 0 ]; do
        case "$1" in
          --distpath) dist="$2"; shift ;;
          --name) name="$2"; shift ;;
        esac
        shift
      done
      mkdir -p "$dist"
      echo "built by fake PyInstaller" > "$dist/$name"
      ;;
  esac
fi
exit 0
"#,
                log = log.display(),
                python = python.display(),
                venv = self.code(|f| match f {
                    Fail::Venv(c) => Some(c),
                    _ => None,
                }),
                pip = self.code(|f| match f {
                    Fail::Pip(c) => Some(c),
                    _ => None,
                }),
                pyinstaller = self.code(|f| match f {
                    Fail::PyInstaller(c) => Some(c),
                    _ => None,
                }),
            ),
        );

        Project { dir, pyenv, log }
    }
}

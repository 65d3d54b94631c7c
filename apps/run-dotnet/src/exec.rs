//! Running the installed toolchain.
//!
//! Two child processes may be started, both through the project view:
//! `dotnet restore <project>.csproj` when the project root holds a project
//! file, then `dotnet <args...>` with the user's arguments. Both inherit the
//! terminal and see the view as `DOTNET_ROOT` and at the front of `PATH`.
//!
//! A non-zero exit is returned as `ProcessExitCode` so `main` can exit with
//! the same status without printing anything extra.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};

use crate::errors::BootstrapError;
use crate::toolchain::ProjectPaths;
use crate::toolchain::paths::ENTRY_POINT;

/// Returns the first `*.csproj` in `root`, by name.
///
/// # Errors
///
/// Returns an error if `root` cannot be listed.
pub fn find_project_file(root: &Path) -> Result<Option<PathBuf>> {
    let entries = std::fs::read_dir(root)
        .with_context(|| format!("Failed to read project directory: {}", root.display()))?;
    let mut projects: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csproj"))
        .collect();
    projects.sort();
    Ok(projects.into_iter().next())
}

/// Runs `dotnet restore` on the project file, if there is one.
///
/// # Errors
///
/// Returns `ProcessExitCode` if restore fails, or an error if it cannot start.
pub fn restore_if_needed(project: &ProjectPaths) -> Result<()> {
    let Some(csproj) = find_project_file(&project.root)? else {
        tracing::debug!("no project file, skipping restore");
        return Ok(());
    };

    tracing::info!(project = %csproj.display(), "running dotnet restore");
    let args = [OsString::from("restore"), csproj.into_os_string()];
    run(&project.view, &args)
}

/// Runs `dotnet` from the view with `args`.
///
/// # Errors
///
/// Returns `ProcessExitCode` carrying the child's status if it is non-zero,
/// or an error if the child cannot be started.
pub fn run_toolchain(project: &ProjectPaths, args: &[String]) -> Result<()> {
    tracing::info!(args = ?args, "launching dotnet");
    run(&project.view, args)
}

fn run<S: AsRef<std::ffi::OsStr>>(view_dir: &Path, args: &[S]) -> Result<()> {
    let entry_point = view_dir.join(ENTRY_POINT);
    let status = command(view_dir)?
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("Failed to execute {}", entry_point.display()))?;

    if status.success() {
        return Ok(());
    }
    let code = exit_code(status);
    tracing::debug!(code, "dotnet exited with failure");
    Err(BootstrapError::process_exit_code(code).into())
}

/// Builds the `dotnet` command with the view exported to the environment.
fn command(view_dir: &Path) -> Result<Command> {
    let mut path_entries = vec![view_dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        path_entries.extend(std::env::split_paths(&existing));
    }
    let path = std::env::join_paths(path_entries).context("Failed to build PATH")?;

    let mut cmd = Command::new(view_dir.join(ENTRY_POINT));
    cmd.env("DOTNET_ROOT", view_dir).env("PATH", path);
    Ok(cmd)
}

/// Maps a failed status to an exit code; death by signal becomes `128 + signal`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            tracing::warn!(signal, "dotnet terminated by signal");
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn find_project_file_picks_first_csproj() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("b.csproj").touch().unwrap();
        temp.child("a.csproj").touch().unwrap();
        temp.child("readme.md").touch().unwrap();

        let found = find_project_file(temp.path()).unwrap();

        assert_eq!(found, Some(temp.path().join("a.csproj")));
    }

    #[test]
    fn find_project_file_ignores_directories() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("weird.csproj").create_dir_all().unwrap();

        assert_eq!(find_project_file(temp.path()).unwrap(), None);
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Creates `<root>/.dotnet/dotnet` as a shell script with `body`.
        fn fake_view(root: &assert_fs::TempDir, body: &str) -> ProjectPaths {
            let project = ProjectPaths::with_root(root.path().to_path_buf());
            let script = root.child(".dotnet").child(ENTRY_POINT);
            script.write_str(&format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(script.path(), std::fs::Permissions::from_mode(0o755))
                .unwrap();
            project
        }

        #[test]
        fn run_toolchain_success() {
            let temp = assert_fs::TempDir::new().unwrap();
            let project = fake_view(&temp, "exit 0");

            assert!(run_toolchain(&project, &["--info".to_string()]).is_ok());
        }

        #[test]
        fn run_toolchain_propagates_exit_code() {
            let temp = assert_fs::TempDir::new().unwrap();
            let project = fake_view(&temp, "exit 42");

            let err = run_toolchain(&project, &[]).unwrap_err();

            assert!(matches!(
                crate::errors::classify(&err),
                Some(BootstrapError::ProcessExitCode { code: 42 })
            ));
        }

        #[test]
        fn run_toolchain_maps_signal_to_128_plus() {
            let temp = assert_fs::TempDir::new().unwrap();
            let project = fake_view(&temp, "kill -TERM $$");

            let err = run_toolchain(&project, &[]).unwrap_err();

            assert!(matches!(
                crate::errors::classify(&err),
                Some(BootstrapError::ProcessExitCode { code: 143 })
            ));
        }

        #[test]
        fn child_sees_dotnet_root_and_path() {
            let temp = assert_fs::TempDir::new().unwrap();
            let out = temp.path().join("env.txt");
            let project = fake_view(
                &temp,
                &format!(
                    "echo \"$DOTNET_ROOT\" > '{}'\necho \"$PATH\" >> '{}'",
                    out.display(),
                    out.display()
                ),
            );

            run_toolchain(&project, &[]).unwrap();

            let env = std::fs::read_to_string(&out).unwrap();
            let mut lines = env.lines();
            let view = project.view.display().to_string();
            assert_eq!(lines.next(), Some(view.as_str()));
            assert!(lines.next().unwrap().starts_with(&view));
        }

        #[test]
        fn restore_runs_only_with_project_file() {
            let temp = assert_fs::TempDir::new().unwrap();
            let marker = temp.path().join("restored.txt");
            let project = fake_view(
                &temp,
                &format!("echo \"$@\" > '{}'", marker.display()),
            );

            restore_if_needed(&project).unwrap();
            assert!(!marker.exists());

            temp.child("App.csproj").touch().unwrap();
            restore_if_needed(&project).unwrap();

            let recorded = std::fs::read_to_string(&marker).unwrap();
            assert!(recorded.starts_with("restore "));
            assert!(recorded.trim_end().ends_with("App.csproj"));
        }

        #[test]
        fn failed_restore_is_process_exit_code() {
            let temp = assert_fs::TempDir::new().unwrap();
            let project = fake_view(&temp, "exit 3");
            temp.child("App.csproj").touch().unwrap();

            let err = restore_if_needed(&project).unwrap_err();

            assert!(matches!(
                crate::errors::classify(&err),
                Some(BootstrapError::ProcessExitCode { code: 3 })
            ));
        }
    }
}

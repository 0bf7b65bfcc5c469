//! Running commands and installing files on the router
//!
//! [`CommandRunner`] is the seam between the router lifecycle logic and the
//! two ways of reaching the router: [`LocalRunner`] when vpnexiter runs on
//! the router itself, and [`crate::ssh::SshRunner`] otherwise.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use vx_core::error::TransportError;

/// Executes commands and places files on the router
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` and return its standard output
    async fn run(&self, command: &str) -> Result<String, TransportError>;

    /// Place the local file `source` at `destination` with permission bits `mode`
    async fn install(&self, source: &Path, destination: &str, mode: u32)
        -> Result<(), TransportError>;

    /// Directory where staged files for `destination` are written
    fn staging_dir(&self, _destination: &str) -> PathBuf {
        std::env::temp_dir()
    }
}

/// Runs commands on this machine
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRunner;

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, command: &str) -> Result<String, TransportError> {
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or(TransportError::EmptyCommand)?;

        tracing::debug!("Executing: {}", command);
        let output = Command::new(program)
            .args(parts)
            .output()
            .await
            .map_err(|source| TransportError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!("Output of `{}`: {}", command, stdout.trim_end());

        if !output.status.success() {
            return Err(TransportError::CommandFailed {
                command: command.to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }
        Ok(stdout)
    }

    async fn install(
        &self,
        source: &Path,
        destination: &str,
        mode: u32,
    ) -> Result<(), TransportError> {
        set_mode(source, mode).await?;
        tokio::fs::rename(source, destination)
            .await
            .map_err(|e| TransportError::Copy {
                destination: destination.to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!("Installed {}", destination);
        Ok(())
    }

    /// Next to the destination so the final rename stays on one filesystem
    fn staging_dir(&self, destination: &str) -> PathBuf {
        match Path::new(destination).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), TransportError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), TransportError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_command() {
        assert!(matches!(
            LocalRunner.run("   ").await,
            Err(TransportError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_splits_on_whitespace() {
        let out = LocalRunner.run("echo  hello   world").await.unwrap();
        assert_eq!(out, "hello world\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_command_failed() {
        let err = LocalRunner.run("false").await.unwrap_err();
        assert!(matches!(err, TransportError::CommandFailed { status: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = LocalRunner
            .run("vpnexiter-no-such-program --flag")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_renames_into_place() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("ipsec.conf");
        let destination = destination.to_str().unwrap();

        let staged = dir.path().join("staged");
        std::fs::write(&staged, "conn vpn\n").unwrap();

        assert_eq!(LocalRunner.staging_dir(destination), dir.path());
        LocalRunner.install(&staged, destination, 0o640).await.unwrap();

        assert!(!staged.exists());
        assert_eq!(std::fs::read_to_string(destination).unwrap(), "conn vpn\n");
        let mode = std::fs::metadata(destination).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}

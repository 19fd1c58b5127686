/// Docker and Docker Compose integration
///
/// Compose lifecycle operations shell out to `docker compose` in the
/// project root; daemon reachability goes through the Engine API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::Docker;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::debug;

use crate::core::command::CommandRunner;

/// Container-group operations used by the deploy sequence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check that the container engine is reachable
    async fn ping(&self) -> Result<()>;

    /// Stop and remove the container group (`down`)
    async fn down(&self) -> Result<()>;

    /// Rebuild all images without using the layer cache
    async fn build_no_cache(&self) -> Result<()>;

    /// Start the container group in the background (`up -d`)
    async fn up_detached(&self) -> Result<()>;

    /// Status listing, one line per container (`ps`)
    async fn status(&self) -> Result<String>;

    /// Last `lines` lines of aggregated logs
    async fn logs_tail(&self, lines: usize) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct ComposeRuntime {
    project_root: PathBuf,
}

impl ComposeRuntime {
    pub fn new<P: AsRef<Path>>(project_root: P) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    /// Get project root directory
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Execute a docker compose command, capturing output
    pub async fn compose_command(&self, args: &[&str]) -> Result<String> {
        let mut full = vec!["compose"];
        full.extend_from_slice(args);

        let output = CommandRunner::run_captured("docker", &full, &self.project_root)
            .await
            .context("Docker compose command failed")?;
        Ok(output.stdout)
    }

    /// Execute a docker compose command with output streamed to the terminal
    async fn compose_streamed(&self, args: &[&str]) -> Result<()> {
        let mut full = vec!["compose"];
        full.extend_from_slice(args);

        CommandRunner::run_inherited("docker", &full, &self.project_root)
            .await
            .context("Docker compose command failed")?;
        Ok(())
    }

    /// Follow aggregated logs until the user interrupts
    pub async fn follow_logs(&self, tail: usize) -> Result<()> {
        let status = tokio::process::Command::new("docker")
            .args(["compose", "logs", "-f", "--tail", &tail.to_string()])
            .current_dir(&self.project_root)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .context("Failed to spawn docker compose logs")?;

        if !status.success() {
            anyhow::bail!("docker compose logs exited with {}", status);
        }
        Ok(())
    }
}

async fn engine_ping() -> Result<()> {
    let docker = Docker::connect_with_local_defaults()
        .context("Failed to connect to Docker daemon. Is Docker running?")?;
    docker
        .ping()
        .await
        .context("Docker daemon did not answer ping. Is Docker running?")?;
    Ok(())
}

/// Accept the Engine API result, or fall back to the CLI check when it failed
async fn reachable_with_fallback<F, Fut>(api: Result<()>, cli: F) -> Result<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let api_err = match api {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    debug!(error = %format!("{:#}", api_err), "Engine API ping failed, trying docker CLI");

    cli().await.map_err(|cli_err| {
        api_err.context(format!("`docker version` also failed: {:#}", cli_err))
    })
}

#[async_trait]
impl ContainerRuntime for ComposeRuntime {
    async fn ping(&self) -> Result<()> {
        // The Engine API client ignores `docker context`; the CLI honours it
        let root = self.project_root.clone();
        reachable_with_fallback(engine_ping().await, move || async move {
            CommandRunner::run_captured("docker", &["version"], &root)
                .await
                .map(|_| ())
                .map_err(anyhow::Error::from)
        })
        .await
    }

    async fn down(&self) -> Result<()> {
        self.compose_streamed(&["down"]).await
    }

    async fn build_no_cache(&self) -> Result<()> {
        self.compose_streamed(&["build", "--no-cache"]).await
    }

    async fn up_detached(&self) -> Result<()> {
        self.compose_streamed(&["up", "-d"]).await
    }

    async fn status(&self) -> Result<String> {
        self.compose_command(&["ps"]).await
    }

    async fn logs_tail(&self, lines: usize) -> Result<String> {
        let tail = lines.to_string();
        self.compose_command(&["logs", "--tail", &tail]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_project_root_is_kept() {
        let runtime = ComposeRuntime::new("/srv/shop");
        assert_eq!(runtime.project_root(), Path::new("/srv/shop"));
    }

    #[tokio::test]
    async fn test_engine_ok_skips_cli_check() {
        let flag = AtomicBool::new(false);
        let called = &flag;
        let result = reachable_with_fallback(Ok(()), move || async move {
            called.store(true, Ordering::SeqCst);
            Ok::<(), anyhow::Error>(())
        })
        .await;
        assert!(result.is_ok());
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cli_fallback_accepts_non_default_context() {
        let result = reachable_with_fallback(Err(anyhow::anyhow!("socket not found")), || async {
            Ok::<(), anyhow::Error>(())
        })
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_both_checks_failing_reports_both() {
        let err = reachable_with_fallback(Err(anyhow::anyhow!("socket not found")), || async {
            Err::<(), _>(anyhow::anyhow!("command not found: docker"))
        })
        .await
        .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("socket not found"));
        assert!(message.contains("command not found: docker"));
    }

    #[tokio::test]
    async fn test_ping_when_docker_available() {
        // Only meaningful where a Docker daemon is running
        let runtime = ComposeRuntime::new(".");
        if runtime.ping().await.is_ok() {
            assert!(runtime.project_root().exists());
        }
    }
}

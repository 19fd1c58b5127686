/// Source checkout updates

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::core::command::CommandRunner;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Fetch `branch` from `remote` and merge it into the current branch
    async fn pull(&self, remote: &str, branch: &str) -> Result<()>;
}

/// `git` command-line client operating on one checkout
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
}

impl GitCli {
    pub fn new<P: AsRef<Path>>(repo_dir: P) -> Self {
        Self {
            repo_dir: repo_dir.as_ref().to_path_buf(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        CommandRunner::run_inherited("git", &["pull", remote, branch], &self.repo_dir)
            .await
            .with_context(|| format!("git pull {} {} failed", remote, branch))?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pull_outside_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new(dir.path());
        assert_eq!(git.repo_dir(), dir.path());

        // Either git is missing or the directory is not a checkout; both must surface as errors
        let err = git.pull("origin", "main").await.unwrap_err();
        assert!(err.to_string().contains("git pull origin main failed"));
    }
}

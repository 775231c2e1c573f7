//! The external pull primitive
//!
//! [`GitPuller`] shells out to the configured command (`git pull --ff-only` by
//! default) inside the working copy. Its exit status is the only signal used.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Runs one pull with `path` as the working directory
#[async_trait]
pub trait Puller: Send + Sync {
    async fn pull(&self, path: &Path) -> Result<()>;
}

/// Spawns an external command per pull
#[derive(Debug, Clone)]
pub struct GitPuller {
    program: String,
    args: Vec<String>,
}

impl GitPuller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from `[program, args...]`
    pub fn from_command(command: &[String]) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            bail!("pull command is empty");
        };
        Ok(Self::new(program.clone(), args.to_vec()))
    }
}

#[async_trait]
impl Puller for GitPuller {
    #[instrument(skip_all, fields(repo = %path.display()))]
    async fn pull(&self, path: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(path);

        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // A timed-out pull is dropped mid-flight and must not outlive it
        cmd.kill_on_drop(true);

        debug!("spawning pull");

        let output = cmd
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} failed (status {}): {}",
                self.program,
                output.status,
                stderr.trim(),
            );
        }

        debug!("pull succeeded");
        Ok(())
    }
}

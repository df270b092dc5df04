use std::{io::ErrorKind, process::Stdio};

use async_trait::async_trait;
use tagsync_core::{JobLauncher, LaunchError};
use tagsync_model::JobSpec;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, instrument, trace};

use super::{
    SubprocessConfig,
    logger::{Stream, forward_lines},
};
use crate::ExecError;

/// Launcher that hands each job to an external command.
///
/// The child receives the job as JSON on stdin and identifying variables
/// (`TAGSYNC_JOB`, `TAGSYNC_TAG`, `TAGSYNC_NAMESPACE`, `TAGSYNC_IDEMPOTENCY_KEY`).
/// Exit `0` is success, codes listed in `permanent_exit_codes` are permanent failures, everything
/// else (other codes, signals, spawn errors other than "not found") is transient.
///
/// The child is killed if the launch future is dropped, e.g. on launch timeout.
#[derive(Debug, Clone)]
pub struct SubprocessLauncher {
    config: SubprocessConfig,
}

impl SubprocessLauncher {
    pub fn new(config: SubprocessConfig) -> Result<Self, ExecError> {
        config.validate()?;
        config.trace_state();
        Ok(Self { config })
    }

    pub fn config(&self) -> &SubprocessConfig {
        &self.config
    }

    fn command(&self, spec: &JobSpec) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);
        if let Some(cwd) = &self.config.cwd {
            cmd.current_dir(cwd);
        }
        cmd.envs(&self.config.env)
            .env("TAGSYNC_JOB", &spec.job)
            .env("TAGSYNC_NAMESPACE", &spec.namespace)
            .env("TAGSYNC_TAG", spec.tag.to_string())
            .env("TAGSYNC_IDEMPOTENCY_KEY", spec.idempotency_key())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl JobLauncher for SubprocessLauncher {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    #[instrument(level = "debug", skip(self, spec), fields(job = %spec.job, tag = %spec.tag))]
    async fn launch(&self, spec: &JobSpec) -> Result<(), LaunchError> {
        let payload = serde_json::to_vec(spec)
            .map_err(|e| LaunchError::Permanent(format!("failed to encode job spec: {e}")))?;

        let mut child = self.command(spec).spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                LaunchError::Permanent(format!("spawn {} failed: {e}", self.config.command))
            }
            _ => LaunchError::Transient(format!("spawn {} failed: {e}", self.config.command)),
        })?;
        trace!(pid = ?child.id(), "launcher process spawned");

        let stdout = child.stdout.take().map(|out| {
            tokio::spawn(forward_lines(out, Stream::Stdout, spec.job.clone(), self.config.output))
        });
        let stderr = child.stderr.take().map(|err| {
            tokio::spawn(forward_lines(err, Stream::Stderr, spec.job.clone(), self.config.output))
        });

        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits without reading its input is judged by its exit status alone.
            if let Err(e) = stdin.write_all(&payload).await {
                debug!(error = %e, "failed to write job spec to launcher stdin");
            }
            drop(stdin);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| LaunchError::Transient(format!("wait failed: {e}")))?;

        for handle in [stdout, stderr].into_iter().flatten() {
            let _ = handle.await;
        }

        match status.code() {
            Some(0) => {
                debug!("launcher accepted job");
                Ok(())
            }
            Some(code) if self.config.is_permanent(code) => Err(LaunchError::Permanent(format!(
                "launcher rejected job with exit code {code}"
            ))),
            Some(code) => Err(LaunchError::Transient(format!(
                "launcher exited with code {code}"
            ))),
            None => Err(LaunchError::Transient("launcher terminated by signal".into())),
        }
    }
}

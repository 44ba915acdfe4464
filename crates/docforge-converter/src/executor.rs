//! Converter execution.
//!
//! Runs a job's converter as a child process (or the in-process image
//! codec) and captures its exit status and diagnostic output. The exit
//! status is the only success signal at this layer.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use docforge_core::config::conversion::ConversionConfig;

use crate::error::ConversionError;
use crate::filesystem::FsUtils;
use crate::image_codec::ImageCodec;
use crate::models::ConversionJob;
use crate::registry::{
    CommandTemplate, ConverterEngine, ConverterProfile, PROFILE_URL_PLACEHOLDER,
    expected_output_path, profile_dir_path,
};

/// Result of a converter run that exited successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exit code (`Some(0)` for the in-process codec).
    pub exit_code: Option<i32>,
    /// Standard output from the process.
    pub stdout: String,
    /// Standard error from the process.
    pub stderr: String,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

/// Concrete program and argument vector for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommand {
    /// Executable.
    pub program: String,
    /// Fully substituted arguments.
    pub args: Vec<String>,
}

/// Executor for running converters.
#[derive(Debug, Clone)]
pub struct ConversionExecutor {
    /// Kill the converter after this long, if set.
    timeout: Option<Duration>,
    /// Limits simultaneous converter runs, if set.
    limiter: Option<Arc<Semaphore>>,
    /// Stderr characters kept in a diagnostic.
    max_stderr_chars: usize,
}

impl ConversionExecutor {
    /// Create an executor from configuration.
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            timeout: config.timeout_seconds.map(Duration::from_secs),
            limiter: config
                .max_concurrent_jobs
                .map(|n| Arc::new(Semaphore::new(n))),
            max_stderr_chars: config.max_stderr_chars,
        }
    }

    /// Substitute placeholders in each argument independently.
    ///
    /// Substitution is single-pass, so a value that happens to contain
    /// `{...}` is never expanded again.
    pub fn substitute_args(template_args: &[String], vars: &HashMap<&str, String>) -> Vec<String> {
        template_args
            .iter()
            .map(|arg| substitute(arg, vars))
            .collect()
    }

    /// Build the concrete command for a job.
    pub fn prepare_command(
        job: &ConversionJob,
        profile: &ConverterProfile,
        template: &CommandTemplate,
    ) -> Result<PreparedCommand, ConversionError> {
        let input = job.input()?;
        let target = job.target_format().unwrap_or_default();
        let output = expected_output_path(profile, input, job.output_dir(), target)?;

        FsUtils::ensure_scratch_path(&input.path)?;
        FsUtils::ensure_scratch_path(&output)?;
        if !job.output_dir().is_absolute() {
            return Err(ConversionError::UnsafePath {
                path: job.output_dir().to_path_buf(),
            });
        }

        let profile_dir = profile_dir_path(input, job.output_dir())?;
        FsUtils::ensure_scratch_path(&profile_dir)?;

        let vars = HashMap::from([
            ("input", path_arg(&input.path)),
            ("output", path_arg(&output)),
            ("output_dir", path_arg(job.output_dir())),
            ("format", target.to_string()),
            ("preset", job.options().level.ghostscript_preset().to_string()),
            (PROFILE_URL_PLACEHOLDER, FsUtils::file_url(&profile_dir)),
        ]);

        Ok(PreparedCommand {
            program: template.program.clone(),
            args: Self::substitute_args(&template.args, &vars),
        })
    }

    /// Run the converter for a job and wait for it to finish.
    pub async fn execute(
        &self,
        job: &ConversionJob,
        profile: &ConverterProfile,
    ) -> Result<ExecutionResult, ConversionError> {
        let _permit = match &self.limiter {
            Some(limiter) => Some(limiter.clone().acquire_owned().await.map_err(|_| {
                ConversionError::ExecutionFailed {
                    diagnostic: "conversion limiter closed".to_string(),
                }
            })?),
            None => None,
        };

        match &profile.engine {
            ConverterEngine::Command(template) => {
                let command = Self::prepare_command(job, profile, template)?;
                self.run_command(job, &command).await
            }
            ConverterEngine::ImageCodec { quality } => {
                self.run_image_codec(job, profile, *quality).await
            }
        }
    }

    async fn run_command(
        &self,
        job: &ConversionJob,
        command: &PreparedCommand,
    ) -> Result<ExecutionResult, ConversionError> {
        let start = Instant::now();

        info!(
            job_id = %job.id(),
            program = %command.program,
            args = ?command.args,
            "Executing converter"
        );

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(job.output_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    error!(
                        job_id = %job.id(),
                        program = %command.program,
                        timeout_seconds = timeout.as_secs(),
                        "Converter timed out"
                    );
                    return Err(ConversionError::ExecutionFailed {
                        diagnostic: format!(
                            "{} timed out after {}s",
                            command.program,
                            timeout.as_secs()
                        ),
                    });
                }
            },
            None => cmd.output().await,
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        let output = output.map_err(|e| {
            error!(
                job_id = %job.id(),
                program = %command.program,
                error = %e,
                "Failed to launch converter"
            );
            ConversionError::ExecutionFailed {
                diagnostic: format!("failed to launch {}: {e}", command.program),
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code();

        if !output.status.success() {
            let stderr: String = stderr.chars().take(self.max_stderr_chars).collect();
            error!(
                job_id = %job.id(),
                program = %command.program,
                exit_code = ?exit_code,
                stderr = %stderr,
                "Converter exited unsuccessfully"
            );
            let status = match exit_code {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            };
            return Err(ConversionError::ExecutionFailed {
                diagnostic: format!("{} {status}: {}", command.program, stderr.trim()),
            });
        }

        debug!(
            job_id = %job.id(),
            program = %command.program,
            duration_ms,
            "Converter finished"
        );

        Ok(ExecutionResult {
            exit_code,
            stdout,
            stderr,
            duration_ms,
        })
    }

    async fn run_image_codec(
        &self,
        job: &ConversionJob,
        profile: &ConverterProfile,
        quality: u8,
    ) -> Result<ExecutionResult, ConversionError> {
        let start = Instant::now();
        let input = job.input()?.path.clone();
        let output = expected_output_path(
            profile,
            job.input()?,
            job.output_dir(),
            job.target_format().unwrap_or_default(),
        )?;

        info!(
            job_id = %job.id(),
            input = %input.display(),
            quality,
            "Re-encoding image"
        );

        let result =
            tokio::task::spawn_blocking(move || ImageCodec::compress(&input, &output, quality))
                .await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(format) => {
                debug!(job_id = %job.id(), format = ?format, duration_ms, "Image re-encoded");
                Ok(ExecutionResult {
                    exit_code: Some(0),
                    stdout: String::new(),
                    stderr: String::new(),
                    duration_ms,
                })
            }
            Err(e) => {
                error!(job_id = %job.id(), error = %e, "Image codec failed");
                Err(ConversionError::ExecutionFailed {
                    diagnostic: format!("image codec: {e}"),
                })
            }
        }
    }

    /// Check if a converter program is available on the system.
    pub async fn check_command_available(program: &str) -> bool {
        if Path::new(program).is_absolute() {
            return tokio::fs::metadata(program)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
        }

        let locator = if cfg!(target_os = "windows") {
            "where"
        } else {
            "which"
        };

        Command::new(locator)
            .arg(program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn substitute(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

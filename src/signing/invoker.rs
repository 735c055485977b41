//! Invocation of the external shortcut signer
//!
//! The signer is a black box that reads an unsigned shortcut from one path
//! and writes the signed shortcut to another. [`ShortcutsCli`] drives the
//! platform `shortcuts` tool; tests substitute their own [`Signer`].

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, warn};

use super::workspace::Workspace;
use crate::types::SignerError;

/// Maximum size of captured signer stderr
const MAX_OUTPUT_SIZE: usize = 10 * 1024; // 10KB

/// Signing mode passed to the platform tool
const SIGNING_MODE: &str = "anyone";

/// Converts an unsigned shortcut file into a signed one
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, input: &Path, output: &Path) -> Result<(), SignerError>;
}

/// Runs `<program> sign -i <input> -o <output> -m anyone`
#[derive(Debug, Clone)]
pub struct ShortcutsCli {
    program: String,
    timeout: Option<Duration>,
}

impl ShortcutsCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the signer if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("sign")
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-m")
            .arg(SIGNING_MODE)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Signer for ShortcutsCli {
    async fn sign(&self, input: &Path, output: &Path) -> Result<(), SignerError> {
        debug!(
            program = %self.program,
            input = %input.display(),
            output = %output.display(),
            "Invoking signer"
        );

        let start_time = Instant::now();
        let run = self.command(input, output).output();

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        program = %self.program,
                        timeout_secs = limit.as_secs(),
                        "Signer timed out"
                    );
                    return Err(SignerError::Timeout {
                        program: self.program.clone(),
                        timeout: limit.as_secs(),
                    });
                }
            },
            None => run.await,
        };

        let output = result.map_err(|source| {
            error!(program = %self.program, error = %source, "Failed to start signer");
            SignerError::StartFailed {
                program: self.program.clone(),
                source,
            }
        })?;

        let duration_ms = start_time.elapsed().as_millis() as u64;

        if output.status.success() {
            debug!(program = %self.program, duration_ms = duration_ms, "Signer completed");
            return Ok(());
        }

        let stderr = truncate_output(output.stderr);
        warn!(
            program = %self.program,
            exit_code = ?output.status.code(),
            duration_ms = duration_ms,
            stderr = %stderr,
            "Signer failed"
        );

        Err(SignerError::NonZeroExit {
            code: output.status.code(),
            stderr,
        })
    }
}

/// Moves shortcut bytes through a workspace and a [`Signer`]
#[derive(Clone)]
pub struct SigningInvoker {
    signer: Arc<dyn Signer>,
}

impl SigningInvoker {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }

    /// Write `content` to the workspace, sign it, and return the signed bytes
    pub async fn sign(
        &self,
        workspace: &Workspace,
        content: &[u8],
    ) -> Result<Vec<u8>, SignerError> {
        let input = workspace.unsigned_path();
        let output = workspace.signed_path();

        tokio::fs::write(input, content)
            .await
            .map_err(|source| SignerError::WriteInput {
                path: input.display().to_string(),
                source,
            })?;
        debug!(
            workspace = %workspace.dir().display(),
            unsigned_bytes = content.len(),
            "Unsigned shortcut written"
        );

        self.signer.sign(input, output).await?;

        tokio::fs::read(output)
            .await
            .map_err(|source| SignerError::ReadOutput {
                path: output.display().to_string(),
                source,
            })
    }
}

fn truncate_output(mut output: Vec<u8>) -> String {
    if output.len() > MAX_OUTPUT_SIZE {
        output.truncate(MAX_OUTPUT_SIZE);
        let truncated = String::from_utf8_lossy(&output);
        format!("{}... [truncated at {} bytes]", truncated, MAX_OUTPUT_SIZE)
    } else {
        String::from_utf8_lossy(&output).into_owned()
    }
}

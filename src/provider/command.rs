//! Child-process provider
//!
//! Each call spawns the configured program, writes the input fields as one
//! JSON object to its stdin while collecting stdout, closes stdin and parses
//! stdout as a JSON object of output fields. A non-zero exit status is an invocation failure.

use super::{AnalysisProvider, ProviderError};
use crate::record::FieldMap;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Provider backed by an external command
#[derive(Debug, Clone)]
pub struct CommandProvider {
    name: String,
    program: PathBuf,
    args: Vec<String>,
}

impl CommandProvider {
    /// Resolve `program` now, so a missing executable is caught at
    /// construction instead of on every record.
    pub fn new(
        name: impl Into<String>,
        program: &str,
        args: Vec<String>,
    ) -> Result<Self, ProviderError> {
        let program = resolve_program(program).ok_or_else(|| {
            ProviderError::Unavailable(format!("program '{}' not found", program))
        })?;
        Ok(Self {
            name: name.into(),
            program,
            args,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// Paths are checked directly; bare names are searched on `PATH`.
fn resolve_program(program: &str) -> Option<PathBuf> {
    if program.trim().is_empty() {
        return None;
    }
    let candidate = Path::new(program);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
}

#[async_trait]
impl AnalysisProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, input: &FieldMap) -> Result<FieldMap, ProviderError> {
        let payload = serde_json::to_vec(input)
            .map_err(|e| ProviderError::InvocationFailed(format!("failed to encode input: {}", e)))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProviderError::Unavailable(format!(
                    "failed to start {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::InvocationFailed("no stdin available".to_string()))?;
        // Feed stdin while draining stdout, or a child that answers before
        // reading all of a large input blocks on a full pipe.
        let write_input = async move {
            let written = stdin.write_all(&payload).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(write_input, child.wait_with_output());

        let output = output
            .map_err(|e| ProviderError::InvocationFailed(format!("failed to read output: {}", e)))?;
        match written {
            Ok(()) => {}
            // A program may exit without reading its input; its output still counts.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Err(e) => {
                return Err(ProviderError::InvocationFailed(format!(
                    "failed to write input: {}",
                    e
                )))
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::InvocationFailed(format!(
                "{} exited with {}: {}",
                self.name,
                output.status,
                stderr.trim()
            )));
        }

        debug!(provider = %self.name, bytes = output.stdout.len(), "provider responded");

        serde_json::from_slice(&output.stdout).map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

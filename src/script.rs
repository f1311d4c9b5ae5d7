// Shell script backend for zram-tune
// SPDX-License-Identifier: GPL-3.0-or-later
//
// Each tunable is served by `<dir>/<tunable>.sh <operation> [args...]`.
// Scripts report through stdout; save/apply print a line containing
// "saved"/"applied" on success.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::backend::{Backend, BackendError, CommandOutput, Operation, Result};

#[derive(Debug, Clone)]
pub struct ScriptBackend {
    dir: PathBuf,
}

impl ScriptBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn script_path(&self, tunable: &str) -> Result<PathBuf> {
        let valid = !tunable.is_empty()
            && tunable
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(BackendError::UnknownTunable(tunable.to_string()));
        }
        let path = self.dir.join(format!("{}.sh", tunable));
        if !path.is_file() {
            return Err(BackendError::UnknownTunable(tunable.to_string()));
        }
        Ok(path)
    }
}

impl Backend for ScriptBackend {
    async fn execute(&self, tunable: &str, op: Operation, args: &[String]) -> Result<CommandOutput> {
        let script = self.script_path(tunable)?;
        debug!("{}: sh {} {} {:?}", tunable, script.display(), op, args);

        let output = Command::new("sh")
            .arg(&script)
            .arg(op.as_str())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            return Ok(CommandOutput::failure(format!(
                "{} exited with {}: {}",
                script.display(),
                output.status,
                detail
            )));
        }

        Ok(match op.success_marker() {
            Some(_) => CommandOutput::from_text(op, &stdout),
            None => CommandOutput::success(stdout.trim()),
        })
    }
}

// Backend command interface for zram-tune
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::future::Future;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::defaults;
use crate::script::ScriptBackend;
use crate::session::LoadedState;
use crate::state::TweakState;
use crate::zram::ZramSysfs;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unknown tunable: {0}")]
    UnknownTunable(String),
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),
    #[error("Backend task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Operations understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Persist the given field values.
    Save,
    /// Push the given field values to the running system.
    Apply,
    /// Report the live configuration as `key=value` lines.
    GetCurrent,
    /// Report the persisted configuration as `key=value` lines.
    GetSaved,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Save => "save",
            Operation::Apply => "apply",
            Operation::GetCurrent => "get_current",
            Operation::GetSaved => "get_saved",
        }
    }

    /// Word a free-form textual result must contain to count as success.
    pub fn success_marker(&self) -> Option<&'static str> {
        match self {
            Operation::Save => Some("saved"),
            Operation::Apply => Some("applied"),
            Operation::GetCurrent | Operation::GetSaved => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of a backend operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub ok: bool,
    pub message: String,
}

impl CommandOutput {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    /// Interpret free-form text from a backend that only reports through its output.
    pub fn from_text(op: Operation, text: &str) -> Self {
        let ok = match op.success_marker() {
            Some(marker) => text.contains(marker),
            None => !text.trim().is_empty(),
        };
        Self {
            ok,
            message: text.trim().to_string(),
        }
    }
}

/// Asynchronous executor of tunable operations.
pub trait Backend: Send + Sync {
    /// Run `op` for `tunable`. `args` are the schema field values in wire order
    /// for `Save`/`Apply` and empty otherwise.
    fn execute(
        &self,
        tunable: &str,
        op: Operation,
        args: &[String],
    ) -> impl Future<Output = Result<CommandOutput>> + Send;

    /// Query the live and persisted states. Failures degrade to empty states.
    fn load_tweak_state(&self, tunable: &str) -> impl Future<Output = LoadedState> + Send {
        async move {
            let current = self.query(tunable, Operation::GetCurrent).await;
            let saved = self.query(tunable, Operation::GetSaved).await;
            LoadedState { current, saved }
        }
    }

    /// Run a `get_*` operation and parse its `key=value` output.
    fn query(&self, tunable: &str, op: Operation) -> impl Future<Output = TweakState> + Send {
        async move {
            match self.execute(tunable, op, &[]).await {
                Ok(out) if out.ok => {
                    let state = TweakState::parse_key_value(&out.message);
                    debug!("{}: {} -> {}", tunable, op, state);
                    state
                }
                Ok(out) => {
                    warn!("{}: {} failed: {}", tunable, op, out.message);
                    TweakState::new()
                }
                Err(e) => {
                    warn!("{}: {} failed: {}", tunable, op, e);
                    TweakState::new()
                }
            }
        }
    }
}

/// Backend chosen by the `backend` configuration key.
#[derive(Debug, Clone)]
pub enum ConfiguredBackend {
    Sysfs(ZramSysfs),
    Script(ScriptBackend),
}

impl ConfiguredBackend {
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.get_opt("backend").unwrap_or(defaults::BACKEND) {
            "sysfs" => {
                let root = config.get_opt("sysfs_root").unwrap_or(defaults::SYSFS_ROOT);
                let state_dir = config.get_opt("state_dir").unwrap_or(defaults::STATE_DIR);
                let device = config.get_opt("zram_device").unwrap_or(defaults::ZRAM_DEVICE);
                let prio: i32 = config.get_as("zram_prio").unwrap_or(defaults::ZRAM_PRIO);
                Ok(Self::Sysfs(ZramSysfs::new(root, state_dir, device, prio)))
            }
            "script" => {
                let dir = config.get_opt("script_dir").unwrap_or(defaults::SCRIPT_DIR);
                Ok(Self::Script(ScriptBackend::new(dir)))
            }
            other => Err(BackendError::UnknownBackend(other.to_string())),
        }
    }
}

impl Backend for ConfiguredBackend {
    async fn execute(&self, tunable: &str, op: Operation, args: &[String]) -> Result<CommandOutput> {
        match self {
            Self::Sysfs(backend) => backend.execute(tunable, op, args).await,
            Self::Script(backend) => backend.execute(tunable, op, args).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    use super::*;

    /// Scripted backend: answers from per-operation queues (falling back to a
    /// fixed answer) and records every call.
    #[derive(Default)]
    pub struct MockBackend {
        answers: Mutex<HashMap<Operation, VecDeque<Result<CommandOutput>>>>,
        fallback: Mutex<HashMap<Operation, CommandOutput>>,
        calls: Mutex<Vec<(String, Operation, Vec<String>)>>,
        gates: Mutex<HashMap<Operation, Arc<Notify>>>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// A zram device running zstd with nothing saved yet.
        pub fn zram() -> Self {
            let mock = Self::new();
            mock.always(
                Operation::GetCurrent,
                CommandOutput::success("disksize=0\nalgorithm=zstd\navailable=lz4,zstd\n"),
            );
            mock.always(Operation::GetSaved, CommandOutput::success(""));
            mock.always(Operation::Save, CommandOutput::success("zram settings saved"));
            mock.always(Operation::Apply, CommandOutput::success("zram settings applied"));
            mock
        }

        pub fn always(&self, op: Operation, out: CommandOutput) {
            self.fallback.lock().unwrap().insert(op, out);
        }

        pub fn push(&self, op: Operation, answer: Result<CommandOutput>) {
            self.answers
                .lock()
                .unwrap()
                .entry(op)
                .or_default()
                .push_back(answer);
        }

        /// Hold `op` until the returned notifier fires.
        pub fn gate(&self, op: Operation) -> Arc<Notify> {
            let notify = Arc::new(Notify::new());
            self.gates.lock().unwrap().insert(op, notify.clone());
            notify
        }

        pub fn calls(&self) -> Vec<(String, Operation, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, op: Operation) -> usize {
            self.calls().iter().filter(|(_, o, _)| *o == op).count()
        }
    }

    impl Backend for MockBackend {
        async fn execute(
            &self,
            tunable: &str,
            op: Operation,
            args: &[String],
        ) -> Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((tunable.to_string(), op, args.to_vec()));

            let gate = self.gates.lock().unwrap().remove(&op);
            if let Some(gate) = gate {
                gate.notified().await;
            }

            let queued = self
                .answers
                .lock()
                .unwrap()
                .get_mut(&op)
                .and_then(|q| q.pop_front());
            match queued {
                Some(answer) => answer,
                None => Ok(self
                    .fallback
                    .lock()
                    .unwrap()
                    .get(&op)
                    .cloned()
                    .unwrap_or_else(|| CommandOutput::failure("no answer"))),
            }
        }
    }
}

// Command dispatcher for zram-tune
// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{Backend, CommandOutput, Operation};
use crate::session::LoadedState;
use crate::state::{TunableSchema, TweakState};
use crate::tweak::TweakError;

/// Sends operations to a backend and interprets their results.
///
/// Backend errors never escape as errors from [`Dispatcher::dispatch`]: they
/// become a failed [`CommandOutput`], the same as a backend that reports failure.
#[derive(Debug)]
pub struct Dispatcher<B> {
    backend: Arc<B>,
}

impl<B> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn dispatch(&self, tunable: &str, op: Operation, args: &[String]) -> CommandOutput {
        match self.backend.execute(tunable, op, args).await {
            Ok(out) => {
                debug!("{}: {} -> ok={} {:?}", tunable, op, out.ok, out.message);
                out
            }
            Err(e) => {
                warn!("{}: {} failed: {}", tunable, op, e);
                CommandOutput::failure(e.to_string())
            }
        }
    }

    pub async fn load(&self, tunable: &str) -> LoadedState {
        self.backend.load_tweak_state(tunable).await
    }

    pub async fn get_current(&self, tunable: &str) -> Result<TweakState, TweakError> {
        let out = self.dispatch(tunable, Operation::GetCurrent, &[]).await;
        let state = TweakState::parse_key_value(&out.message);
        if !out.ok || state.is_empty() {
            return Err(rejected(tunable, Operation::GetCurrent, out));
        }
        Ok(state)
    }

    /// Persist `pending`. Success leaves it to the caller to commit the snapshot.
    pub async fn save(
        &self,
        schema: &TunableSchema,
        pending: &TweakState,
    ) -> Result<(), TweakError> {
        let out = self
            .dispatch(schema.id, Operation::Save, &schema.args(pending))
            .await;
        if !out.ok {
            return Err(rejected(schema.id, Operation::Save, out));
        }
        info!("{}: settings saved", schema.id);
        Ok(())
    }

    /// Push `pending` to the live system, then re-query it.
    /// `Ok(None)` means the apply succeeded but the re-query did not.
    pub async fn apply(
        &self,
        schema: &TunableSchema,
        pending: &TweakState,
    ) -> Result<Option<TweakState>, TweakError> {
        let out = self
            .dispatch(schema.id, Operation::Apply, &schema.args(pending))
            .await;
        if !out.ok {
            return Err(rejected(schema.id, Operation::Apply, out));
        }
        info!("{}: settings applied", schema.id);

        match self.get_current(schema.id).await {
            Ok(current) => Ok(Some(current)),
            Err(e) => {
                warn!("{}: keeping previous current state: {}", schema.id, e);
                Ok(None)
            }
        }
    }
}

fn rejected(tunable: &str, op: Operation, out: CommandOutput) -> TweakError {
    TweakError::Rejected {
        tunable: tunable.to_string(),
        op,
        message: out.message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::BackendError;
    use crate::state::ZRAM_SCHEMA;

    fn pending() -> TweakState {
        [("disksize", "2147483648"), ("algorithm", "zstd"), ("enabled", "1")]
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_save_sends_fields_in_order() {
        let mock = Arc::new(MockBackend::zram());
        let dispatcher = Dispatcher::new(mock.clone());

        dispatcher.save(&ZRAM_SCHEMA, &pending()).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "zram");
        assert_eq!(calls[0].1, Operation::Save);
        assert_eq!(calls[0].2, vec!["2147483648", "zstd", "1"]);
    }

    #[tokio::test]
    async fn test_save_rejected() {
        let mock = Arc::new(MockBackend::zram());
        mock.push(Operation::Save, Ok(CommandOutput::failure("read-only filesystem")));
        let dispatcher = Dispatcher::new(mock);

        let err = dispatcher.save(&ZRAM_SCHEMA, &pending()).await.unwrap_err();
        assert!(matches!(
            err,
            TweakError::Rejected { op: Operation::Save, ref message, .. } if message == "read-only filesystem"
        ));
    }

    #[tokio::test]
    async fn test_apply_requeries_current() {
        let mock = Arc::new(MockBackend::zram());
        mock.push(
            Operation::GetCurrent,
            Ok(CommandOutput::success("disksize=2147483648\nalgorithm=zstd\nenabled=1\n")),
        );
        let dispatcher = Dispatcher::new(mock.clone());

        let current = dispatcher.apply(&ZRAM_SCHEMA, &pending()).await.unwrap();
        assert_eq!(current.unwrap().get("disksize"), Some("2147483648"));
        assert_eq!(mock.count(Operation::Apply), 1);
        assert_eq!(mock.count(Operation::GetCurrent), 1);
    }

    #[tokio::test]
    async fn test_apply_without_requery() {
        let mock = Arc::new(MockBackend::zram());
        mock.push(Operation::GetCurrent, Ok(CommandOutput::success("garbage")));
        let dispatcher = Dispatcher::new(mock);

        assert_eq!(dispatcher.apply(&ZRAM_SCHEMA, &pending()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_backend_error_becomes_failure() {
        let mock = Arc::new(MockBackend::zram());
        mock.push(Operation::Apply, Err(BackendError::Task("cancelled".to_string())));
        let dispatcher = Dispatcher::new(mock.clone());

        let out = dispatcher
            .dispatch("zram", Operation::Apply, &ZRAM_SCHEMA.args(&pending()))
            .await;
        assert!(!out.ok);
        assert!(out.message.contains("cancelled"));
        assert_eq!(mock.count(Operation::GetCurrent), 0);
    }
}

// Per-tunable state store for zram-tune
// SPDX-License-Identifier: GPL-3.0-or-later

use tracing::{debug, warn};

use crate::detect::{changed_fields, has_pending_changes};
use crate::reconcile::{reference_from_saved, resolve_pending, resolve_reference};
use crate::state::{TunableSchema, TweakState};

/// What the backend reported for a tunable on load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedState {
    pub current: TweakState,
    pub saved: TweakState,
}

/// Whether the edit buffer matches its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Clean,
    Edited,
}

/// The four state records of one loaded tunable.
///
/// `pending` always defines every schema field; `reference` is only replaced
/// by a successful save; `current` only by a load or a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweakSession {
    schema: &'static TunableSchema,
    current: TweakState,
    saved: TweakState,
    pending: TweakState,
    reference: TweakState,
    applied: bool,
}

impl TweakSession {
    /// Reconcile a freshly loaded state with the default preset.
    pub fn reconcile(
        schema: &'static TunableSchema,
        loaded: LoadedState,
        default: &TweakState,
    ) -> Self {
        let pending = resolve_pending(schema, &loaded.current, &loaded.saved, default);
        let reference = resolve_reference(schema, &loaded.current, &loaded.saved);
        debug!(
            "{}: reconciled pending={} reference={}",
            schema.id, pending, reference
        );
        Self {
            schema,
            current: loaded.current,
            saved: loaded.saved,
            pending,
            reference,
            applied: false,
        }
    }

    pub fn schema(&self) -> &'static TunableSchema {
        self.schema
    }

    pub fn current(&self) -> &TweakState {
        &self.current
    }

    pub fn saved(&self) -> &TweakState {
        &self.saved
    }

    pub fn pending(&self) -> &TweakState {
        &self.pending
    }

    pub fn reference(&self) -> &TweakState {
        &self.reference
    }

    /// Whether an apply succeeded since this session was loaded.
    pub fn applied(&self) -> bool {
        self.applied
    }

    pub fn has_pending_changes(&self) -> bool {
        has_pending_changes(self.schema, &self.pending, &self.reference)
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        changed_fields(self.schema, &self.pending, &self.reference)
    }

    pub fn phase(&self) -> Phase {
        if self.has_pending_changes() {
            Phase::Edited
        } else {
            Phase::Clean
        }
    }

    /// Set one tracked field of the edit buffer. Returns false for untracked fields.
    pub fn set_field(&mut self, field: &str, value: impl Into<String>) -> bool {
        if !self.schema.tracks(field) {
            warn!("{}: ignoring untracked field {}", self.schema.id, field);
            return false;
        }
        self.pending.set(field, value);
        true
    }

    /// Shallow merge of `partial` into the edit buffer. Untracked fields are
    /// skipped; fields absent from `partial` are left untouched.
    pub fn merge_pending(&mut self, partial: &TweakState) {
        for (field, value) in partial.iter() {
            self.set_field(field, value);
        }
    }

    /// Record a successful save of `snapshot` (the pending state sent to the backend).
    pub fn commit_saved(&mut self, snapshot: TweakState) {
        self.reference = reference_from_saved(self.schema, &snapshot);
        self.saved = snapshot;
    }

    /// Record a successful apply with the re-queried device state.
    pub fn commit_applied(&mut self, current: Option<TweakState>) {
        self.applied = true;
        if let Some(current) = current {
            self.current = current;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{BuiltinPresets, PresetProvider};
    use crate::state::ZRAM_SCHEMA;

    fn state(pairs: &[(&str, &str)]) -> TweakState {
        pairs.iter().copied().collect()
    }

    fn session(current: TweakState, saved: TweakState) -> TweakSession {
        TweakSession::reconcile(
            &ZRAM_SCHEMA,
            LoadedState { current, saved },
            &BuiltinPresets.default_preset("zram"),
        )
    }

    #[test]
    fn test_clean_after_load() {
        let s = session(
            state(&[("disksize", "0"), ("algorithm", "zstd"), ("available", "lz4,zstd")]),
            TweakState::new(),
        );
        assert_eq!(s.phase(), Phase::Clean);
        assert_eq!(s.pending(), s.reference());
        assert!(!s.applied());
    }

    #[test]
    fn test_clean_after_load_with_partial_saved() {
        let s = session(
            state(&[("disksize", "0"), ("algorithm", "zstd"), ("enabled", "1")]),
            state(&[("algorithm", "lz4")]),
        );
        assert!(!s.has_pending_changes());
        assert_eq!(s.pending().get("algorithm"), Some("lz4"));
    }

    #[test]
    fn test_edit_then_commit_save() {
        let mut s = session(state(&[("disksize", "0"), ("algorithm", "zstd")]), TweakState::new());
        assert!(s.set_field("disksize", "2147483648"));
        assert_eq!(s.phase(), Phase::Edited);
        assert_eq!(s.changed_fields(), vec!["disksize"]);

        let snapshot = s.pending().clone();
        s.commit_saved(snapshot.clone());
        assert_eq!(s.saved(), &snapshot);
        assert_eq!(s.reference().get("disksize"), Some("2147483648"));
        assert_eq!(s.phase(), Phase::Clean);
    }

    #[test]
    fn test_untracked_field_rejected() {
        let mut s = session(TweakState::new(), TweakState::new());
        assert!(!s.set_field("available", "lz4"));
        assert!(s.pending().get("available").is_none());
    }

    #[test]
    fn test_merge_pending_leaves_other_fields() {
        let mut s = session(state(&[("disksize", "1024"), ("enabled", "0")]), TweakState::new());
        s.merge_pending(&state(&[("algorithm", "zstd"), ("bogus", "1")]));
        assert_eq!(s.pending().get("algorithm"), Some("zstd"));
        assert_eq!(s.pending().get("disksize"), Some("1024"));
        assert_eq!(s.pending().get("enabled"), Some("0"));
        assert!(s.pending().get("bogus").is_none());
    }

    #[test]
    fn test_commit_applied_keeps_reference() {
        let mut s = session(state(&[("disksize", "0")]), TweakState::new());
        s.set_field("algorithm", "zstd");
        let reference = s.reference().clone();
        let before = s.has_pending_changes();

        s.commit_applied(Some(state(&[("disksize", "0"), ("algorithm", "zstd")])));
        assert!(s.applied());
        assert_eq!(s.current().get("algorithm"), Some("zstd"));
        assert_eq!(s.reference(), &reference);
        assert_eq!(s.has_pending_changes(), before);

        s.commit_applied(None);
        assert_eq!(s.current().get("algorithm"), Some("zstd"));
    }
}

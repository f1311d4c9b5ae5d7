// Pending-change detection
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::state::{TunableSchema, TweakState};

/// Tracked fields whose value differs between `pending` and `reference`.
/// Exact string comparison: `"1024"` and `"1024.0"` differ.
pub fn changed_fields(
    schema: &TunableSchema,
    pending: &TweakState,
    reference: &TweakState,
) -> Vec<&'static str> {
    schema
        .field_names()
        .filter(|name| pending.get(name) != reference.get(name))
        .collect()
}

/// Whether the edit buffer holds unsaved changes.
pub fn has_pending_changes(
    schema: &TunableSchema,
    pending: &TweakState,
    reference: &TweakState,
) -> bool {
    schema
        .field_names()
        .any(|name| pending.get(name) != reference.get(name))
}

// Reconciliation of current, saved and default states
// SPDX-License-Identifier: GPL-3.0-or-later
//
// pending[f]   = saved[f] ?? current[f] ?? default[f] ?? fallback[f]
// reference[f] = saved[f] ?? current[f] ?? fallback[f]

use crate::state::{TunableSchema, TweakState};

/// First provider that defines `field`, in order.
pub fn resolve_field<'a>(providers: &[&'a TweakState], field: &str) -> Option<&'a str> {
    providers.iter().find_map(|state| state.defined(field))
}

/// Resolve every tracked field over `providers`, then backfill the schema fallback.
pub fn resolve(schema: &TunableSchema, providers: &[&TweakState]) -> TweakState {
    schema
        .fields
        .iter()
        .map(|f| (f.name, resolve_field(providers, f.name).unwrap_or(f.fallback)))
        .collect()
}

/// Initial edit buffer after a load.
pub fn resolve_pending(
    schema: &TunableSchema,
    current: &TweakState,
    saved: &TweakState,
    default: &TweakState,
) -> TweakState {
    resolve(schema, &[saved, current, default])
}

/// Baseline the edit buffer is compared against.
pub fn resolve_reference(
    schema: &TunableSchema,
    current: &TweakState,
    saved: &TweakState,
) -> TweakState {
    resolve(schema, &[saved, current])
}

/// Baseline after a successful save: only the saved state counts.
pub fn reference_from_saved(schema: &TunableSchema, saved: &TweakState) -> TweakState {
    resolve(schema, &[saved])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ZRAM_SCHEMA;

    fn state(pairs: &[(&str, &str)]) -> TweakState {
        pairs.iter().copied().collect()
    }

    fn default_preset() -> TweakState {
        state(&[("enabled", "1"), ("algorithm", "lz4"), ("disksize", "0")])
    }

    #[test]
    fn test_resolve_field_order() {
        let saved = state(&[("algorithm", "zstd")]);
        let current = state(&[("algorithm", "lzo"), ("disksize", "1024")]);
        let providers = [&saved, &current];
        assert_eq!(resolve_field(&providers, "algorithm"), Some("zstd"));
        assert_eq!(resolve_field(&providers, "disksize"), Some("1024"));
        assert_eq!(resolve_field(&providers, "enabled"), None);
    }

    #[test]
    fn test_empty_value_is_not_defined() {
        let saved = state(&[("algorithm", "")]);
        let current = state(&[("algorithm", "lzo")]);
        assert_eq!(resolve_field(&[&saved, &current], "algorithm"), Some("lzo"));
    }

    #[test]
    fn test_pending_from_current_without_saved() {
        let current = state(&[("disksize", "0"), ("algorithm", "zstd"), ("available", "lz4,zstd")]);
        let saved = TweakState::new();

        let pending = resolve_pending(&ZRAM_SCHEMA, &current, &saved, &default_preset());
        let reference = resolve_reference(&ZRAM_SCHEMA, &current, &saved);

        let expected = state(&[("disksize", "0"), ("algorithm", "zstd"), ("enabled", "1")]);
        assert_eq!(pending, expected);
        assert_eq!(reference, expected);
    }

    #[test]
    fn test_saved_wins_per_field() {
        let current = state(&[("disksize", "0"), ("algorithm", "zstd"), ("enabled", "1")]);
        let saved = state(&[("disksize", "4294967296")]);

        let pending = resolve_pending(&ZRAM_SCHEMA, &current, &saved, &default_preset());
        assert_eq!(pending.get("disksize"), Some("4294967296"));
        assert_eq!(pending.get("algorithm"), Some("zstd"));
        assert_eq!(pending.get("enabled"), Some("1"));
    }

    #[test]
    fn test_default_preset_only_feeds_pending() {
        let default = state(&[("enabled", "1"), ("algorithm", "zstd"), ("disksize", "2147483648")]);
        let empty = TweakState::new();

        let pending = resolve_pending(&ZRAM_SCHEMA, &empty, &empty, &default);
        let reference = resolve_reference(&ZRAM_SCHEMA, &empty, &empty);

        assert_eq!(pending.get("algorithm"), Some("zstd"));
        assert_eq!(pending.get("disksize"), Some("2147483648"));
        assert_eq!(reference.get("algorithm"), Some("lz4"));
        assert_eq!(reference.get("disksize"), Some("0"));
        assert_eq!(reference.get("enabled"), Some("1"));
    }

    #[test]
    fn test_every_field_defined_when_everything_is_empty() {
        let empty = TweakState::new();
        let pending = resolve_pending(&ZRAM_SCHEMA, &empty, &empty, &empty);
        for name in ZRAM_SCHEMA.field_names() {
            assert!(pending.defined(name).is_some(), "{} undefined", name);
        }
        assert!(pending.get("available").is_none());
    }

    #[test]
    fn test_reference_from_saved_ignores_current() {
        let saved = state(&[("disksize", "2147483648"), ("algorithm", "zstd")]);
        let reference = reference_from_saved(&ZRAM_SCHEMA, &saved);
        assert_eq!(
            reference,
            state(&[("disksize", "2147483648"), ("algorithm", "zstd"), ("enabled", "1")])
        );
    }
}

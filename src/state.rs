// Tunable field model for zram-tune
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::BTreeMap;
use std::fmt;

use crate::defaults;

/// A tunable configuration: field name to string value.
///
/// Values travel as strings whatever their meaning (byte counts, names,
/// `"0"`/`"1"` flags), so comparisons are exact string comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TweakState {
    fields: BTreeMap<String, String>,
}

impl TweakState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` lines, as produced by backends and state files.
    /// Lines without `=` and `#` comments are skipped; the first `=` splits.
    pub fn parse_key_value(text: &str) -> Self {
        let mut state = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    state.set(key, value.trim());
                }
            }
        }
        state
    }

    /// Serialise back to `key=value` lines.
    pub fn to_key_value(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}\n", k, v))
            .collect()
    }

    /// Raw value, present even when empty.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|s| s.as_str())
    }

    /// Value only if present and non-empty.
    pub fn defined(&self, field: &str) -> Option<&str> {
        self.get(field).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Shallow merge: every field of `partial` overwrites ours, the rest stay.
    pub fn merge(&mut self, partial: &TweakState) {
        for (k, v) in &partial.fields {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TweakState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut state = Self::new();
        for (k, v) in iter {
            state.set(k, v);
        }
        state
    }
}

impl fmt::Display for TweakState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A tracked field and the value used when nothing else defines it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub fallback: &'static str,
}

/// The tracked fields of a tunable, in the positional order used by
/// `save` and `apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunableSchema {
    pub id: &'static str,
    pub fields: &'static [FieldSpec],
}

impl TunableSchema {
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn tracks(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.name == field)
    }

    /// Field values of `state` in wire order. Absent fields become their fallback.
    pub fn args(&self, state: &TweakState) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| state.get(f.name).unwrap_or(f.fallback).to_string())
            .collect()
    }

    /// Inverse of [`TunableSchema::args`]; extra arguments are ignored.
    pub fn from_args(&self, args: &[String]) -> TweakState {
        self.fields
            .iter()
            .zip(args)
            .map(|(f, v)| (f.name, v.as_str()))
            .collect()
    }
}

/// Field names of the zram tunable.
pub mod zram_field {
    pub const DISKSIZE: &str = "disksize";
    pub const ALGORITHM: &str = "algorithm";
    pub const ENABLED: &str = "enabled";
    /// Read-only, reported by the device: comma-separated algorithm names.
    pub const AVAILABLE: &str = "available";
}

pub static ZRAM_SCHEMA: TunableSchema = TunableSchema {
    id: defaults::ZRAM_TUNABLE,
    fields: &[
        FieldSpec {
            name: zram_field::DISKSIZE,
            fallback: defaults::ZRAM_DISKSIZE,
        },
        FieldSpec {
            name: zram_field::ALGORITHM,
            fallback: defaults::ZRAM_ALG,
        },
        FieldSpec {
            name: zram_field::ENABLED,
            fallback: defaults::ZRAM_ENABLED,
        },
    ],
};

/// Look up a built-in schema by tunable id.
pub fn schema_for(tunable: &str) -> Option<&'static TunableSchema> {
    match tunable {
        defaults::ZRAM_TUNABLE => Some(&ZRAM_SCHEMA),
        _ => None,
    }
}

// Render model for the zram control surface
// SPDX-License-Identifier: GPL-3.0-or-later
//
// Plain data derived from a session; front-ends draw it however they like.

use tracing::debug;

use crate::backend::Backend;
use crate::defaults::{ZRAM_CUSTOM_MAX_MIB, ZRAM_CUSTOM_MIN_MIB, ZRAM_SIZE_PRESETS_MIB};
use crate::helpers::{bytes_to_mib, mib_to_bytes};
use crate::session::TweakSession;
use crate::state::{zram_field, TweakState};
use crate::tweak::{Result, TweakHandle};

/// Which disk size choice is highlighted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeChoice {
    /// One of the preset sizes, in MiB.
    Preset(u64),
    /// Free-form size. `placeholder_mib` is the reference size; `value_mib`
    /// is only filled for a non-preset size that differs from the reference.
    Custom {
        placeholder_mib: u64,
        value_mib: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmChoice {
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZramView {
    pub enabled: bool,
    /// Size and algorithm options are hidden while disabled.
    pub options_visible: bool,
    pub size: SizeChoice,
    pub algorithms: Vec<AlgorithmChoice>,
    pub current_disksize_mib: u64,
    pub current_algorithm: String,
    pub pending_changes: bool,
}

fn mib_of(state: &TweakState, field: &str) -> u64 {
    state
        .get(field)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(bytes_to_mib)
        .unwrap_or(0)
}

/// Byte string sent for a preset size.
pub fn preset_bytes(mib: u64) -> String {
    mib_to_bytes(mib).to_string()
}

/// `available` split on commas, empty names dropped.
pub fn available_algorithms(current: &TweakState) -> Vec<&str> {
    current
        .get(zram_field::AVAILABLE)
        .map(|list| list.split(',').map(str::trim).filter(|a| !a.is_empty()).collect())
        .unwrap_or_default()
}

/// Custom size in bytes, if `mib` is in the accepted range.
pub fn custom_size_bytes(mib: u64) -> Option<String> {
    (ZRAM_CUSTOM_MIN_MIB..=ZRAM_CUSTOM_MAX_MIB)
        .contains(&mib)
        .then(|| mib_to_bytes(mib).to_string())
}

impl ZramView {
    pub fn build(session: &TweakSession) -> Self {
        let pending = session.pending();
        let current = session.current();
        let enabled = pending.get(zram_field::ENABLED) != Some("0");

        let pending_size = pending.get(zram_field::DISKSIZE).unwrap_or_default();
        let size = match ZRAM_SIZE_PRESETS_MIB
            .iter()
            .find(|&&mib| preset_bytes(mib) == pending_size)
        {
            Some(&mib) => SizeChoice::Preset(mib),
            None => {
                let reference_mib = mib_of(session.reference(), zram_field::DISKSIZE);
                let pending_mib = mib_of(pending, zram_field::DISKSIZE);
                let custom = pending_mib > 0
                    && !ZRAM_SIZE_PRESETS_MIB.contains(&pending_mib)
                    && pending_mib != reference_mib;
                SizeChoice::Custom {
                    placeholder_mib: reference_mib,
                    value_mib: custom.then_some(pending_mib),
                }
            }
        };

        let selected_alg = pending.get(zram_field::ALGORITHM);
        let algorithms = available_algorithms(current)
            .into_iter()
            .map(|name| AlgorithmChoice {
                name: name.to_string(),
                selected: Some(name) == selected_alg,
            })
            .collect();

        Self {
            enabled,
            options_visible: enabled,
            size,
            algorithms,
            current_disksize_mib: mib_of(current, zram_field::DISKSIZE),
            current_algorithm: current
                .defined(zram_field::ALGORITHM)
                .unwrap_or("--")
                .to_string(),
            pending_changes: session.has_pending_changes(),
        }
    }
}

// ── Control events ───────────────────────────────────────────────────────────
//
// Each returns the pending-changes flag after the edit.

impl<B: Backend> TweakHandle<B> {
    pub fn select_disksize(&self, bytes: u64) -> Result<bool> {
        self.set_field(zram_field::DISKSIZE, &bytes.to_string())
    }

    pub fn select_algorithm(&self, name: &str) -> Result<bool> {
        self.set_field(zram_field::ALGORITHM, name)
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<bool> {
        self.set_field(zram_field::ENABLED, if enabled { "1" } else { "0" })
    }

    /// Out-of-range sizes leave the edit buffer untouched.
    pub fn set_custom_size_mib(&self, mib: u64) -> Result<bool> {
        match custom_size_bytes(mib) {
            Some(bytes) => self.set_field(zram_field::DISKSIZE, &bytes),
            None => {
                debug!("{}: ignoring custom size {} MiB", self.id(), mib);
                self.has_pending_changes()
            }
        }
    }
}

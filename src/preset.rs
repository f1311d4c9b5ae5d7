// Default preset provider for zram-tune
// SPDX-License-Identifier: GPL-3.0-or-later

use tracing::debug;

use crate::config::Config;
use crate::state::{schema_for, TweakState};

/// Supplies the fallback configuration of a tunable when neither the device
/// nor the saved state defines a field.
pub trait PresetProvider {
    fn default_preset(&self, tunable: &str) -> TweakState;
}

/// Built-in presets: every schema field at its fallback value
/// (zram: `enabled=1, algorithm=lz4, disksize=0`).
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPresets;

impl PresetProvider for BuiltinPresets {
    fn default_preset(&self, tunable: &str) -> TweakState {
        schema_for(tunable)
            .map(|schema| schema.fields.iter().map(|f| (f.name, f.fallback)).collect())
            .unwrap_or_default()
    }
}

/// Built-in presets with `preset.<tunable>.<field>` overrides from the configuration.
#[derive(Debug, Clone)]
pub struct ConfigPresets {
    config: Config,
}

impl ConfigPresets {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl PresetProvider for ConfigPresets {
    fn default_preset(&self, tunable: &str) -> TweakState {
        let mut preset = BuiltinPresets.default_preset(tunable);
        for (field, value) in self.config.preset_overrides(tunable) {
            debug!("{}: default preset override {}={}", tunable, field, value);
            preset.set(field, value);
        }
        preset
    }
}

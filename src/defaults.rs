// Centralised default values for all configuration keys.
// SPDX-License-Identifier: GPL-3.0-or-later
//
// Every module reads config keys via `config.get("key").unwrap_or(DEFAULT)`.
// Keeping them here prevents drift between the backends, the presets and the CLI.

// ── Tunables ─────────────────────────────────────────────────────────────────

pub const ZRAM_TUNABLE: &str = "zram";

// ── Zram fields (minimal fallbacks) ──────────────────────────────────────────

pub const ZRAM_DISKSIZE: &str = "0";
pub const ZRAM_ALG: &str = "lz4";
pub const ZRAM_ENABLED: &str = "1";
pub const ZRAM_DEVICE: &str = "zram0";
pub const ZRAM_PRIO: i32 = 32767;

/// Disk size presets offered by the control surface, in MiB.
pub const ZRAM_SIZE_PRESETS_MIB: [u64; 6] = [1536, 2048, 3072, 4096, 6144, 8192];

/// Accepted range for a custom disk size, in MiB.
pub const ZRAM_CUSTOM_MIN_MIB: u64 = 1;
pub const ZRAM_CUSTOM_MAX_MIB: u64 = 65536;

// ── Backends ─────────────────────────────────────────────────────────────────

pub const BACKEND: &str = "sysfs";
pub const SCRIPT_DIR: &str = "/usr/share/zram-tune/tweaks";
pub const STATE_DIR: &str = "/var/lib/zram-tune";
pub const SYSFS_ROOT: &str = "/";

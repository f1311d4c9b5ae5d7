// Helper utilities for zram-tune
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Command failed: {0}")]
    CommandFailed(String),
    #[error("Not running as root")]
    NotRoot,
    #[error("Invalid size: {0}")]
    InvalidSize(String),
}

pub type Result<T> = std::result::Result<T, HelperError>;

pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * KB;
pub const GB: u64 = 1024 * MB;

/// Check if running as root
pub fn am_i_root() -> Result<()> {
    if nix::unistd::geteuid().is_root() {
        Ok(())
    } else {
        Err(HelperError::NotRoot)
    }
}

/// Read entire file to string
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(fs::read_to_string(path)?)
}

/// Write string to file and sync it to disk
pub fn write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Write a sysfs/procfs attribute. Virtual files are never synced.
pub fn write_sysfs<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new().write(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Create directories recursively
pub fn makedirs<P: AsRef<Path>>(path: P) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Run a command and return success status
pub fn run_cmd(cmd: &[&str]) -> Result<bool> {
    let (program, args) = cmd
        .split_first()
        .ok_or_else(|| HelperError::CommandFailed("empty command".to_string()))?;
    let status = Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    Ok(status.success())
}

/// Bytes to MiB, rounded to nearest
pub fn bytes_to_mib(bytes: u64) -> u64 {
    bytes / MB + u64::from(bytes % MB >= MB / 2)
}

/// MiB to bytes, saturating at `u64::MAX`
pub fn mib_to_bytes(mib: u64) -> u64 {
    mib.saturating_mul(MB)
}

/// `percent` of `total`, `None` on overflow
fn percent_of(total: u64, percent: u64) -> Option<u64> {
    total.checked_mul(percent).map(|v| v / 100)
}

/// Parse a size string into bytes
/// Supports:
/// - Absolute bytes: 1073741824
/// - With suffix: 1G, 512M, 256K
/// - Percentage of RAM: 50%, 100%
pub fn parse_size(size_str: &str) -> Result<u64> {
    let s = size_str.trim();

    if let Some(percent_str) = s.strip_suffix('%') {
        let percent: u64 = percent_str
            .trim()
            .parse()
            .map_err(|_| HelperError::InvalidSize(s.to_string()))?;
        let ram_size = crate::meminfo::get_ram_size()
            .map_err(|e| HelperError::InvalidSize(format!("{}: {}", s, e)))?;
        return percent_of(ram_size, percent)
            .ok_or_else(|| HelperError::InvalidSize(s.to_string()));
    }

    let (num_part, multiplier) = match s.char_indices().last() {
        Some((idx, c)) if s.len() > 1 => match c.to_ascii_uppercase() {
            'K' => (&s[..idx], KB),
            'M' => (&s[..idx], MB),
            'G' => (&s[..idx], GB),
            'T' => (&s[..idx], GB * 1024),
            _ => (s, 1u64),
        },
        _ => (s, 1u64),
    };

    num_part
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| HelperError::InvalidSize(s.to_string()))
}

// Zram sysfs backend for zram-tune
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError, CommandOutput, Operation};
use crate::defaults;
use crate::helpers::{am_i_root, makedirs, read_file, run_cmd, write_file, write_sysfs, MB};
use crate::state::{zram_field, TweakState, ZRAM_SCHEMA};

#[derive(Error, Debug)]
pub enum ZramError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Helper error: {0}")]
    Helper(#[from] crate::helpers::HelperError),
    #[error("Zram device {0} not available (is the zram module loaded?)")]
    NotAvailable(String),
    #[error("Invalid {0}: {1}")]
    InvalidSetting(&'static str, String),
    #[error("{0} failed")]
    CommandFailed(String),
}

pub type Result<T> = std::result::Result<T, ZramError>;

/// Validated zram settings, as received by `save`/`apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZramSettings {
    pub disksize: u64,
    pub algorithm: String,
    pub enabled: bool,
}

impl ZramSettings {
    /// Parse positional `disksize algorithm enabled` arguments.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let state = ZRAM_SCHEMA.from_args(args);
        let field = |name: &'static str| state.get(name).unwrap_or_default().to_string();

        let disksize_str = field(zram_field::DISKSIZE);
        let disksize = disksize_str
            .parse::<u64>()
            .map_err(|_| ZramError::InvalidSetting(zram_field::DISKSIZE, disksize_str.clone()))?;

        let algorithm = field(zram_field::ALGORITHM);
        let valid_alg = !algorithm.is_empty()
            && algorithm
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_alg {
            return Err(ZramError::InvalidSetting(zram_field::ALGORITHM, algorithm));
        }

        let enabled = match field(zram_field::ENABLED).as_str() {
            "1" => true,
            "0" => false,
            other => {
                return Err(ZramError::InvalidSetting(
                    zram_field::ENABLED,
                    other.to_string(),
                ))
            }
        };

        Ok(Self {
            disksize,
            algorithm,
            enabled,
        })
    }

    pub fn to_state(&self) -> TweakState {
        [
            (zram_field::DISKSIZE, self.disksize.to_string()),
            (zram_field::ALGORITHM, self.algorithm.clone()),
            (zram_field::ENABLED, if self.enabled { "1" } else { "0" }.to_string()),
        ]
        .into_iter()
        .collect()
    }
}

/// Split `comp_algorithm` content (`lzo lzo-rle [lz4] zstd`) into the
/// selected algorithm and every available one.
pub fn parse_comp_algorithm(content: &str) -> (Option<String>, Vec<String>) {
    let mut selected = None;
    let mut available = Vec::new();
    for token in content.split_whitespace() {
        let name = token.trim_start_matches('[').trim_end_matches(']');
        if name.is_empty() {
            continue;
        }
        if token.starts_with('[') && token.ends_with(']') {
            selected = Some(name.to_string());
        }
        available.push(name.to_string());
    }
    (selected, available)
}

/// Native zram backend: live state from sysfs, saved state in a
/// `key=value` file under the state directory.
#[derive(Debug, Clone)]
pub struct ZramSysfs {
    root: PathBuf,
    state_dir: PathBuf,
    device: String,
    priority: i32,
}

impl ZramSysfs {
    pub fn new(
        root: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
        device: &str,
        priority: i32,
    ) -> Self {
        Self {
            root: root.into(),
            state_dir: state_dir.into(),
            device: device.to_string(),
            priority,
        }
    }

    fn sysfs_dir(&self) -> PathBuf {
        self.root.join("sys/block").join(&self.device)
    }

    fn dev_path(&self) -> String {
        format!("/dev/{}", self.device)
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(format!("{}.conf", defaults::ZRAM_TUNABLE))
    }

    /// Check if the zram device exists
    pub fn is_available(&self) -> bool {
        self.sysfs_dir().is_dir()
    }

    /// Check if the device is an active swap area
    pub fn is_swap_active(&self) -> bool {
        let dev = self.dev_path();
        read_file(self.root.join("proc/swaps"))
            .map(|swaps| {
                swaps
                    .lines()
                    .skip(1)
                    .any(|line| line.split_whitespace().next() == Some(dev.as_str()))
            })
            .unwrap_or(false)
    }

    /// Live device state
    pub fn read_current(&self) -> Result<TweakState> {
        if !self.is_available() {
            return Err(ZramError::NotAvailable(self.device.clone()));
        }
        let sysfs = self.sysfs_dir();
        let mut state = TweakState::new();

        let disksize = read_file(sysfs.join("disksize"))?;
        state.set(zram_field::DISKSIZE, disksize.trim());

        match read_file(sysfs.join("comp_algorithm")) {
            Ok(content) => {
                let (selected, available) = parse_comp_algorithm(&content);
                if let Some(alg) = selected {
                    state.set(zram_field::ALGORITHM, alg);
                }
                if !available.is_empty() {
                    state.set(zram_field::AVAILABLE, available.join(","));
                }
            }
            Err(e) => warn!("Zram: cannot read comp_algorithm: {}", e),
        }

        let enabled = if self.is_swap_active() { "1" } else { "0" };
        state.set(zram_field::ENABLED, enabled);
        Ok(state)
    }

    /// Persisted state; empty if never saved
    pub fn read_saved(&self) -> Result<TweakState> {
        let path = self.state_file();
        if !path.exists() {
            debug!("Zram: no saved state at {}", path.display());
            return Ok(TweakState::new());
        }
        Ok(TweakState::parse_key_value(&read_file(&path)?))
    }

    /// Persist settings to the state file
    pub fn save(&self, settings: &ZramSettings) -> Result<PathBuf> {
        let path = self.state_file();
        makedirs(&self.state_dir)?;
        write_file(&path, &settings.to_state().to_key_value())?;
        info!(
            "Zram: saved {} MiB, {}, enabled={}",
            settings.disksize / MB,
            settings.algorithm,
            settings.enabled
        );
        Ok(path)
    }

    /// Reconfigure the live device
    /// Order: swapoff → reset → comp_algorithm → disksize → mkswap → swapon
    pub fn apply(&self, settings: &ZramSettings) -> Result<()> {
        am_i_root()?;
        if !self.is_available() {
            return Err(ZramError::NotAvailable(self.device.clone()));
        }

        let dev = self.dev_path();
        let sysfs = self.sysfs_dir();

        if self.is_swap_active() {
            info!("Zram: swapoff {}", dev);
            if !run_cmd(&["swapoff", dev.as_str()])? {
                return Err(ZramError::CommandFailed(format!("swapoff {}", dev)));
            }
        }

        write_sysfs(sysfs.join("reset"), "1")?;

        if !settings.enabled || settings.disksize == 0 {
            info!("Zram: {} left disabled", dev);
            return Ok(());
        }

        write_sysfs(sysfs.join("comp_algorithm"), &settings.algorithm)?;
        write_sysfs(sysfs.join("disksize"), &settings.disksize.to_string())?;

        if !run_cmd(&["mkswap", dev.as_str()])? {
            return Err(ZramError::CommandFailed(format!("mkswap {}", dev)));
        }
        let prio = self.priority.to_string();
        if !run_cmd(&["swapon", "-p", prio.as_str(), dev.as_str()])? {
            return Err(ZramError::CommandFailed(format!("swapon {}", dev)));
        }

        info!(
            "Zram: {} active: {} MiB, {}",
            dev,
            settings.disksize / MB,
            settings.algorithm
        );
        Ok(())
    }

    fn run(&self, op: Operation, args: &[String]) -> Result<String> {
        match op {
            Operation::GetCurrent => Ok(self.read_current()?.to_key_value()),
            Operation::GetSaved => Ok(self.read_saved()?.to_key_value()),
            Operation::Save => {
                let settings = ZramSettings::from_args(args)?;
                let path = self.save(&settings)?;
                Ok(format!("zram settings saved to {}", path.display()))
            }
            Operation::Apply => {
                let settings = ZramSettings::from_args(args)?;
                self.apply(&settings)?;
                Ok("zram settings applied".to_string())
            }
        }
    }
}

impl Backend for ZramSysfs {
    async fn execute(
        &self,
        tunable: &str,
        op: Operation,
        args: &[String],
    ) -> std::result::Result<CommandOutput, BackendError> {
        if tunable != defaults::ZRAM_TUNABLE {
            return Err(BackendError::UnknownTunable(tunable.to_string()));
        }

        let backend = self.clone();
        let args = args.to_vec();
        let result = tokio::task::spawn_blocking(move || backend.run(op, &args))
            .await
            .map_err(|e| BackendError::Task(e.to_string()))?;

        Ok(match result {
            Ok(message) => CommandOutput::success(message),
            Err(e) => {
                warn!("Zram: {} failed: {}", op, e);
                CommandOutput::failure(e.to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_root(swap_active: bool) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let block = root.path().join("sys/block/zram0");
        fs::create_dir_all(&block).unwrap();
        fs::write(block.join("disksize"), "4294967296\n").unwrap();
        fs::write(block.join("comp_algorithm"), "lzo lzo-rle lz4 [zstd]\n").unwrap();
        fs::create_dir_all(root.path().join("proc")).unwrap();
        let mut swaps = String::from("Filename\t\t\t\tType\t\tSize\t\tUsed\t\tPriority\n");
        if swap_active {
            swaps.push_str("/dev/zram0                              partition\t4194300\t\t0\t\t32767\n");
        }
        fs::write(root.path().join("proc/swaps"), swaps).unwrap();
        root
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_comp_algorithm() {
        let (selected, available) = parse_comp_algorithm("lzo lzo-rle [lz4] zstd\n");
        assert_eq!(selected.as_deref(), Some("lz4"));
        assert_eq!(available, vec!["lzo", "lzo-rle", "lz4", "zstd"]);

        let (selected, available) = parse_comp_algorithm("");
        assert!(selected.is_none());
        assert!(available.is_empty());
    }

    #[test]
    fn test_settings_from_args() {
        let settings = ZramSettings::from_args(&args(&["2147483648", "zstd", "1"])).unwrap();
        assert_eq!(settings.disksize, 2147483648);
        assert_eq!(settings.algorithm, "zstd");
        assert!(settings.enabled);
        assert_eq!(settings.to_state().get("enabled"), Some("1"));

        assert!(ZramSettings::from_args(&args(&["2G", "zstd", "1"])).is_err());
        assert!(ZramSettings::from_args(&args(&["0", "zstd; reboot", "1"])).is_err());
        assert!(ZramSettings::from_args(&args(&["0", "zstd", "yes"])).is_err());
        assert!(ZramSettings::from_args(&args(&["0"])).is_err());
    }

    #[test]
    fn test_read_current() {
        let root = fake_root(true);
        let zram = ZramSysfs::new(root.path(), root.path().join("state"), "zram0", 100);
        assert!(zram.is_available());

        let current = zram.read_current().unwrap();
        assert_eq!(current.get("disksize"), Some("4294967296"));
        assert_eq!(current.get("algorithm"), Some("zstd"));
        assert_eq!(current.get("available"), Some("lzo,lzo-rle,lz4,zstd"));
        assert_eq!(current.get("enabled"), Some("1"));
    }

    #[test]
    fn test_read_current_inactive_swap() {
        let root = fake_root(false);
        let zram = ZramSysfs::new(root.path(), root.path().join("state"), "zram0", 100);
        assert_eq!(zram.read_current().unwrap().get("enabled"), Some("0"));
    }

    #[test]
    fn test_missing_device() {
        let root = fake_root(false);
        let zram = ZramSysfs::new(root.path(), root.path().join("state"), "zram7", 100);
        assert!(matches!(zram.read_current(), Err(ZramError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let root = fake_root(false);
        let zram = ZramSysfs::new(root.path(), root.path().join("var/lib/zram-tune"), "zram0", 100);

        let loaded = zram.load_tweak_state("zram").await;
        assert!(loaded.saved.is_empty());
        assert_eq!(loaded.current.get("algorithm"), Some("zstd"));

        let out = zram
            .execute("zram", Operation::Save, &args(&["2147483648", "lz4", "1"]))
            .await
            .unwrap();
        assert!(out.ok, "{}", out.message);
        assert!(out.message.contains("saved"));

        let loaded = zram.load_tweak_state("zram").await;
        assert_eq!(loaded.saved.get("disksize"), Some("2147483648"));
        assert_eq!(loaded.saved.get("algorithm"), Some("lz4"));
        assert_eq!(loaded.saved.get("enabled"), Some("1"));
    }

    #[tokio::test]
    async fn test_invalid_settings_are_reported() {
        let root = fake_root(false);
        let zram = ZramSysfs::new(root.path(), root.path().join("state"), "zram0", 100);

        let out = zram
            .execute("zram", Operation::Save, &args(&["lots", "lz4", "1"]))
            .await
            .unwrap();
        assert!(!out.ok);
        assert!(!zram.state_file().exists());

        let out = zram
            .execute("zram", Operation::Apply, &args(&["0", "lz4", "maybe"]))
            .await
            .unwrap();
        assert!(!out.ok);
        assert!(out.message.contains("enabled"));
    }

    #[tokio::test]
    async fn test_other_tunable_rejected() {
        let root = fake_root(false);
        let zram = ZramSysfs::new(root.path(), root.path().join("state"), "zram0", 100);
        assert!(matches!(
            zram.execute("zswap", Operation::GetCurrent, &[]).await,
            Err(BackendError::UnknownTunable(_))
        ));
    }
}

// Memory information parser for /proc/meminfo
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemInfoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, MemInfoError>;

/// Read memory stats from /proc/meminfo.
pub fn get_mem_stats(fields: &[&str]) -> Result<HashMap<String, u64>> {
    let file = File::open("/proc/meminfo")?;
    parse_mem_stats(BufReader::new(file), fields)
}

/// Parse "Key:   value kB" lines, stopping once every requested field is found.
pub fn parse_mem_stats<R: BufRead>(reader: R, fields: &[&str]) -> Result<HashMap<String, u64>> {
    let mut stats = HashMap::new();
    let mut remaining: HashSet<&str> = fields.iter().copied().collect();

    for line in reader.lines() {
        let line = line?;

        let Some((key, value_part)) = line.split_once(':') else {
            continue;
        };
        if !remaining.contains(key) {
            continue;
        }

        let parts: Vec<&str> = value_part.split_whitespace().collect();
        let Some(number) = parts.first() else {
            continue;
        };
        let number = number
            .parse::<u64>()
            .map_err(|e| MemInfoError::ParseError(format!("{}: {}", key, e)))?;
        let value = if parts.get(1) == Some(&"kB") {
            number
                .checked_mul(1024)
                .ok_or_else(|| MemInfoError::ParseError(format!("{}: value too large", key)))?
        } else {
            number
        };

        stats.insert(key.to_string(), value);
        remaining.remove(key);

        if remaining.is_empty() {
            break;
        }
    }

    if !remaining.is_empty() {
        let mut missing: Vec<_> = remaining.into_iter().collect();
        missing.sort_unstable();
        return Err(MemInfoError::MissingField(missing.join(", ")));
    }

    Ok(stats)
}

/// Get total RAM in bytes
pub fn get_ram_size() -> Result<u64> {
    let stats = get_mem_stats(&["MemTotal"])?;
    stats
        .get("MemTotal")
        .copied()
        .ok_or_else(|| MemInfoError::MissingField("MemTotal".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:       16318412 kB
MemFree:         1203944 kB
MemAvailable:    9383316 kB
SwapTotal:       8388604 kB
HugePages_Total:       0
";

    #[test]
    fn test_parse_mem_stats() {
        let stats = parse_mem_stats(MEMINFO.as_bytes(), &["MemTotal", "HugePages_Total"]).unwrap();
        assert_eq!(stats["MemTotal"], 16318412 * 1024);
        assert_eq!(stats["HugePages_Total"], 0);
    }

    #[test]
    fn test_missing_field() {
        let err = parse_mem_stats(MEMINFO.as_bytes(), &["Zswapped"]).unwrap_err();
        assert!(matches!(err, MemInfoError::MissingField(f) if f == "Zswapped"));
    }

    #[test]
    fn test_bad_number() {
        let err = parse_mem_stats("MemTotal: lots kB\n".as_bytes(), &["MemTotal"]).unwrap_err();
        assert!(matches!(err, MemInfoError::ParseError(_)));
    }

    #[test]
    fn test_kb_overflow() {
        let err = parse_mem_stats("MemTotal: 18446744073709551615 kB\n".as_bytes(), &["MemTotal"])
            .unwrap_err();
        assert!(matches!(err, MemInfoError::ParseError(_)));
    }

    #[test]
    fn test_get_ram_size() {
        let size = get_ram_size().unwrap();
        assert!(size > 0);
    }
}

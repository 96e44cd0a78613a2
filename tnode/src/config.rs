//! Tnode configuration file (tnode.conf) support
//!
//! Format: alias IP:port tnodeprivkey collateral_txid collateral_output_index
//!
//! Example:
//! tn1 127.0.0.1:18168 3c4b1f0e9ad0d6b2f7e4f6a1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f708192a3b 2bcd3c84c84f87eaa86e4e56834c92927a07f9e18718810b92e0d0324456a67c 0

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tecra_core::OutPoint;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TnodeConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Duplicate alias: {0}")]
    DuplicateAlias(String),

    #[error("Unknown tnode alias: {0}")]
    UnknownAlias(String),
}

/// One line of tnode.conf
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TnodeConfigEntry {
    pub alias: String,
    pub ip_port: String,
    /// Hex private key of the tnode signing key
    pub tnode_privkey: String,
    pub collateral_txid: String,
    pub collateral_output_index: u32,
}

impl TnodeConfigEntry {
    /// Parse one line; blank lines and `#` comments yield `None`
    pub fn parse_line(line: &str, line_num: usize) -> Result<Option<Self>, TnodeConfigError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let [alias, ip_port, privkey, txid, index] = parts.as_slice() else {
            return Err(TnodeConfigError::Parse {
                line: line_num,
                message: format!(
                    "Expected 5 fields, got {}. Format: alias IP:port privkey txid index",
                    parts.len()
                ),
            });
        };

        let collateral_output_index = index.parse::<u32>().map_err(|_| TnodeConfigError::Parse {
            line: line_num,
            message: format!("Invalid output index: {}", index),
        })?;

        let entry = Self {
            alias: alias.to_string(),
            ip_port: ip_port.to_string(),
            tnode_privkey: privkey.to_string(),
            collateral_txid: txid.to_string(),
            collateral_output_index,
        };
        entry.validate().map_err(|e| TnodeConfigError::Parse {
            line: line_num,
            message: e.to_string(),
        })?;
        Ok(Some(entry))
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.alias, self.ip_port, self.tnode_privkey, self.collateral_txid, self.collateral_output_index
        )
    }

    pub fn collateral(&self) -> OutPoint {
        OutPoint::new(self.collateral_txid.clone(), self.collateral_output_index)
    }

    pub fn validate(&self) -> Result<(), TnodeConfigError> {
        if self.alias.is_empty() || self.alias.contains(char::is_whitespace) {
            return Err(TnodeConfigError::InvalidFormat("Invalid alias".to_string()));
        }

        let port_ok = self
            .ip_port
            .rsplit_once(':')
            .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
            .unwrap_or(false);
        if !port_ok {
            return Err(TnodeConfigError::InvalidFormat(format!("Invalid IP:port {}", self.ip_port)));
        }

        if self.tnode_privkey.len() != 64 || !self.tnode_privkey.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TnodeConfigError::InvalidFormat("Invalid tnode private key".to_string()));
        }

        if self.collateral_txid.len() != 64 || !self.collateral_txid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TnodeConfigError::InvalidFormat("Invalid transaction ID".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TnodeConfig {
    entries: Vec<TnodeConfigEntry>,
}

impl TnodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`; a missing file is an empty config
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, TnodeConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(content: &str) -> Result<Self, TnodeConfigError> {
        let mut entries = Vec::new();
        let mut aliases = HashSet::new();

        for (line_num, line) in content.lines().enumerate() {
            if let Some(entry) = TnodeConfigEntry::parse_line(line, line_num + 1)? {
                if !aliases.insert(entry.alias.clone()) {
                    return Err(TnodeConfigError::DuplicateAlias(entry.alias));
                }
                entries.push(entry);
            }
        }

        Ok(Self { entries })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TnodeConfigError> {
        let mut content = String::new();
        content.push_str("# Tecra Tnode Configuration\n");
        content.push_str("# Format: alias IP:port tnodeprivkey collateral_txid collateral_output_index\n\n");

        for entry in &self.entries {
            content.push_str(&entry.to_line());
            content.push('\n');
        }

        fs::write(path, content)?;
        Ok(())
    }

    pub fn add_entry(&mut self, entry: TnodeConfigEntry) -> Result<(), TnodeConfigError> {
        entry.validate()?;

        if self.has_alias(&entry.alias) {
            return Err(TnodeConfigError::DuplicateAlias(entry.alias));
        }

        self.entries.push(entry);
        Ok(())
    }

    pub fn remove_entry(&mut self, alias: &str) -> Result<TnodeConfigEntry, TnodeConfigError> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.alias == alias)
            .ok_or_else(|| TnodeConfigError::UnknownAlias(alias.to_string()))?;

        Ok(self.entries.remove(pos))
    }

    pub fn get_entry(&self, alias: &str) -> Option<&TnodeConfigEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }

    pub fn entries(&self) -> &[TnodeConfigEntry] {
        &self.entries
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.entries.iter().any(|e| e.alias == alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "3c4b1f0e9ad0d6b2f7e4f6a1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f708192a3b";
    const TXID: &str = "2bcd3c84c84f87eaa86e4e56834c92927a07f9e18718810b92e0d0324456a67c";

    fn entry(alias: &str) -> TnodeConfigEntry {
        TnodeConfigEntry {
            alias: alias.to_string(),
            ip_port: "127.0.0.1:18168".to_string(),
            tnode_privkey: KEY.to_string(),
            collateral_txid: TXID.to_string(),
            collateral_output_index: 0,
        }
    }

    #[test]
    fn test_parse_valid_line() {
        let line = format!("tn1 192.168.1.100:18168 {} {} 1", KEY, TXID);
        let parsed = TnodeConfigEntry::parse_line(&line, 1).unwrap().unwrap();

        assert_eq!(parsed.alias, "tn1");
        assert_eq!(parsed.collateral(), OutPoint::new(TXID, 1));
    }

    #[test]
    fn test_parse_comment_and_blank() {
        assert!(TnodeConfigEntry::parse_line("# comment", 1).unwrap().is_none());
        assert!(TnodeConfigEntry::parse_line("   ", 2).unwrap().is_none());
    }

    #[test]
    fn test_parse_invalid_line() {
        assert!(TnodeConfigEntry::parse_line("tn1 192.168.1.100:18168", 1).is_err());

        let bad_port = format!("tn1 localhost {} {} 0", KEY, TXID);
        assert!(matches!(
            TnodeConfigEntry::parse_line(&bad_port, 3),
            Err(TnodeConfigError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn test_duplicate_alias() {
        let mut config = TnodeConfig::new();
        config.add_entry(entry("tn1")).unwrap();

        assert!(matches!(config.add_entry(entry("tn1")), Err(TnodeConfigError::DuplicateAlias(_))));
        assert_eq!(config.count(), 1);
    }

    #[test]
    fn test_remove_unknown_alias() {
        let mut config = TnodeConfig::new();
        assert!(matches!(config.remove_entry("nope"), Err(TnodeConfigError::UnknownAlias(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tnode.conf");

        let mut config = TnodeConfig::new();
        config.add_entry(entry("tn1")).unwrap();
        config.add_entry(entry("tn2")).unwrap();
        config.save_to_file(&path).unwrap();

        let loaded = TnodeConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.entries(), config.entries());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = TnodeConfig::load_from_file(dir.path().join("absent.conf")).unwrap();
        assert_eq!(config.count(), 0);
    }
}

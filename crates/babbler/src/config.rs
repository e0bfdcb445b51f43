//! Engine tuning knobs, optionally read from `babbler.json` in the data
//! directory.

use std::fs;
use std::io;
use std::path::Path;

use babbler_gen::{DEFAULT_MAX_REPLY_LEN, GenerationLimit};
use babbler_model::DEFAULT_ORDER;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Name of the optional config file inside a data directory.
pub const CONFIG_FILE: &str = "babbler.json";

/// Missing fields take their default, so `{"order": 3}` is a valid file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Context length for a fresh model. A loaded brain keeps its own.
    pub order: u8,
    /// Candidate budget per reply.
    pub limit: GenerationLimit,
    /// Longest reply in symbols (words and separators both count).
    pub max_reply_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            order: DEFAULT_ORDER,
            limit: GenerationLimit::default(),
            max_reply_len: DEFAULT_MAX_REPLY_LEN,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Read `dir/babbler.json`, or the defaults if there is none.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        match Self::from_file(&path) {
            Err(crate::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.order, 5);
        assert_eq!(config.limit, GenerationLimit::Timeout(Duration::from_secs(1)));
        assert_eq!(config.max_reply_len, 200);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"order": 3, "limit": {"iterations": 25}}"#).unwrap();
        assert_eq!(config.order, 3);
        assert_eq!(config.limit, GenerationLimit::Iterations(25));
        assert_eq!(config.max_reply_len, DEFAULT_MAX_REPLY_LEN);
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(serde_json::from_str::<EngineConfig>(r#"{"ordr": 3}"#).is_err());
    }

    #[test]
    fn from_dir_without_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(EngineConfig::from_dir(dir.path()).unwrap(), EngineConfig::default());
    }

    #[test]
    fn from_dir_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"max_reply_len": 12}"#).unwrap();
        let config = EngineConfig::from_dir(dir.path()).unwrap();
        assert_eq!(config.max_reply_len, 12);
        assert_eq!(config.order, DEFAULT_ORDER);
    }

    #[test]
    fn from_dir_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();
        assert!(matches!(
            EngineConfig::from_dir(dir.path()),
            Err(crate::Error::Config(_))
        ));
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::risk::BirthProxyTable;

/// Key in a birth-proxy file that replaces the fallback for unlisted regions.
const FALLBACK_KEY: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read birth-proxy table {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid birth-proxy table {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("birth-proxy entry {region:?} must be a positive number, got {value}")]
    InvalidEntry { region: String, value: f64 },
}

/// Built-in table when `path` is `None`, otherwise a JSON object of
/// region -> annual births.
pub fn birth_proxy_table(path: Option<&Path>) -> Result<BirthProxyTable, ConfigError> {
    let Some(path) = path else {
        return Ok(BirthProxyTable::default());
    };

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut entries: BTreeMap<String, f64> =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if let Some((region, value)) = entries.iter().find(|(_, v)| **v <= 0.0) {
        return Err(ConfigError::InvalidEntry {
            region: region.clone(),
            value: *value,
        });
    }

    let fallback = entries
        .remove(FALLBACK_KEY)
        .unwrap_or(BirthProxyTable::DEFAULT_FALLBACK);
    Ok(BirthProxyTable::new(entries, fallback))
}

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

/// Credentials for the auxiliary SSH transport, read at startup.
/// Not used by the download core itself.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SshConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Loads the key-value config file. A missing file, unreadable content or
/// missing keys all fall back to empty strings; loading never fails.
pub fn load(path: &Path) -> SshConfig {
    let Ok(contents) = std::fs::read_to_string(path) else {
        debug!(path = %path.display(), "no config file, using defaults");
        return SshConfig::default();
    };

    serde_json::from_str(&contents).unwrap_or_else(|e| {
        debug!(path = %path.display(), error = %e, "unparseable config, using defaults");
        SshConfig::default()
    })
}

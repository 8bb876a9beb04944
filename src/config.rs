use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::DatabaseConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PortalConfig {
    pub database: Option<String>,
    pub busy_timeout_ms: Option<u64>,
    pub max_idle_connections: Option<usize>,
}

impl PortalConfig {
    /// Settings written by `portal-db config`
    pub fn with_defaults(base: &Path) -> Self {
        Self {
            database: Some(default_database_path_in(base).display().to_string()),
            busy_timeout_ms: Some(DatabaseConfig::DEFAULT_BUSY_TIMEOUT.as_millis() as u64),
            max_idle_connections: Some(DatabaseConfig::DEFAULT_MAX_IDLE),
        }
    }

    /// Store settings, with `database` overriding the configured path.
    pub fn to_database_config(&self, database: Option<&Path>, base: &Path) -> DatabaseConfig {
        let path = database
            .map(Path::to_path_buf)
            .or_else(|| self.database.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| default_database_path_in(base));

        let mut config = DatabaseConfig::new(path);
        if let Some(ms) = self.busy_timeout_ms {
            config = config.with_busy_timeout(Duration::from_millis(ms));
        }
        if let Some(max_idle) = self.max_idle_connections {
            config = config.with_max_idle_connections(max_idle);
        }
        config
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("portal.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join("data").join("portal.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<PortalConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: PortalConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &PortalConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(Some(&dir.path().join("portal.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portal.toml");
        let config = PortalConfig::with_defaults(dir.path());

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.database, config.database);
        assert_eq!(loaded.busy_timeout_ms, Some(5000));
        assert_eq!(loaded.max_idle_connections, Some(4));
    }

    #[test]
    fn test_cli_database_overrides_file() {
        let base = Path::new("/srv/portal");
        let config = PortalConfig {
            database: Some("/var/lib/portal.db".into()),
            busy_timeout_ms: Some(250),
            max_idle_connections: None,
        };

        let db = config.to_database_config(None, base);
        assert_eq!(db.path, PathBuf::from("/var/lib/portal.db"));
        assert_eq!(db.busy_timeout, Duration::from_millis(250));
        assert_eq!(db.max_idle_connections, DatabaseConfig::DEFAULT_MAX_IDLE);

        let db = config.to_database_config(Some(Path::new("other.db")), base);
        assert_eq!(db.path, PathBuf::from("other.db"));

        let db = PortalConfig::default().to_database_config(None, base);
        assert_eq!(db.path, base.join("data").join("portal.db"));
    }
}

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

const DEFAULT_CONFIG: &str = r#"# Example configuration file for coinwatch
---
# Port the HTTP API listens on
port: 3000

# Seconds between two refreshes of the tracked tickers
refresh_interval_secs: 5

# Persisted files. Both default to the platform data directory.
# tickers_file: "/var/lib/coinwatch/tickers.json"
# quotes_file: "/var/lib/coinwatch/quotes.json"

providers:
  cryptocompare:
    base_url: "https://min-api.cryptocompare.com"
    currency: "USD"
"#;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CryptoCompareProviderConfig {
    pub base_url: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub cryptocompare: Option<CryptoCompareProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            cryptocompare: Some(CryptoCompareProviderConfig {
                base_url: "https://min-api.cryptocompare.com".to_string(),
                currency: default_currency(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    pub tickers_file: Option<PathBuf>,
    pub quotes_file: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

fn default_port() -> u16 {
    3000
}

fn default_refresh_interval_secs() -> u64 {
    5
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: default_port(),
            refresh_interval_secs: default_refresh_interval_secs(),
            tickers_file: None,
            quotes_file: None,
            data_path: None,
            providers: ProvidersConfig::default(),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("org", "coinwatch", "coinwatch")
        .context("Could not determine project directories")
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(custom_path.clone());
        }
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    pub fn tickers_path(&self) -> Result<PathBuf> {
        match &self.tickers_file {
            Some(path) => Ok(path.clone()),
            None => Ok(self.default_data_path()?.join("tickers.json")),
        }
    }

    pub fn quotes_path(&self) -> Result<PathBuf> {
        match &self.quotes_file {
            Some(path) => Ok(path.clone()),
            None => Ok(self.default_data_path()?.join("quotes.json")),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        // An empty document means "all defaults"
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

/// Creates a default configuration file at the default location
pub fn setup() -> Result<PathBuf> {
    let path = AppConfig::default_config_path()?;
    setup_at_path(&path)?;
    Ok(path)
}

/// Creates a default configuration file at the specified path
pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
port: 8080
refresh_interval_secs: 30
tickers_file: "/tmp/t.json"
quotes_file: "/tmp/q.json"
providers:
  cryptocompare:
    base_url: "http://example.com/cc"
    currency: "EUR"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.port, 8080);
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.tickers_path().unwrap(), PathBuf::from("/tmp/t.json"));
        assert_eq!(config.quotes_path().unwrap(), PathBuf::from("/tmp/q.json"));

        let cc = config.providers.cryptocompare.unwrap();
        assert_eq!(cc.base_url, "http://example.com/cc");
        assert_eq!(cc.currency, "EUR");
    }

    #[test]
    fn test_platform_paths_use_project_name() -> Result<()> {
        let config_path = AppConfig::default_config_path()?;
        assert_eq!(config_path.file_name().unwrap(), "config.yaml");
        let config_dir = config_path.parent().unwrap().to_string_lossy();
        assert!(config_dir.contains("coinwatch"), "{config_dir}");

        let data_path = AppConfig::default().default_data_path()?;
        assert!(data_path.to_string_lossy().contains("coinwatch"));
        Ok(())
    }

    #[test]
    fn test_config_defaults() {
        let yaml_str = r#"
data_path: "/srv/coinwatch"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
        assert_eq!(
            config.tickers_path().unwrap(),
            PathBuf::from("/srv/coinwatch/tickers.json")
        );
        assert_eq!(
            config.quotes_path().unwrap(),
            PathBuf::from("/srv/coinwatch/quotes.json")
        );
        assert_eq!(
            config.providers.cryptocompare.unwrap().base_url,
            "https://min-api.cryptocompare.com"
        );
    }

    #[test]
    fn test_zero_refresh_interval_is_clamped() {
        let config = AppConfig {
            refresh_interval_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_empty_file_uses_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "")?;

        let config = AppConfig::load_from_path(&config_path)?;
        assert_eq!(config.port, 3000);
        Ok(())
    }

    #[test]
    fn test_setup_creates_config_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("config.yaml");

        setup_at_path(&config_path)?;
        assert!(config_path.exists());

        let content = fs::read_to_string(&config_path)?;
        assert!(content.contains("# Example configuration file for coinwatch"));

        // The written file is a loadable config
        let config = AppConfig::load_from_path(&config_path)?;
        assert_eq!(config.port, 3000);
        assert!(config.providers.cryptocompare.is_some());
        Ok(())
    }

    #[test]
    fn test_setup_fails_if_config_exists() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "test")?;

        let result = setup_at_path(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("already exists"));
        Ok(())
    }
}

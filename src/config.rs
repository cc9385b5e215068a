//! Configuration for the dictwire server binary.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values. Protocol limits
//! (buffer size, argument count) are compile-time constants and are not
//! configurable here.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the dictionary server
#[derive(Parser, Debug)]
#[command(name = "dictwire-server")]
#[command(version = "0.1.0")]
#[command(about = "A line-protocol dictionary server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:7379)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Capacity of the default dictionary in bytes
    #[arg(short = 'm', long)]
    pub max_memory: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Storage-related configuration
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Capacity applied to dictionaries that do not set their own
    #[serde(default = "default_max_memory")]
    pub max_memory: usize,
    /// Named dictionaries, in declaration order; the first is the default
    /// binding. Empty means a single dictionary named `main`.
    #[serde(default)]
    pub dictionaries: Vec<DictionaryConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_memory: default_max_memory(),
            dictionaries: Vec::new(),
        }
    }
}

/// One named dictionary
#[derive(Debug, Deserialize)]
pub struct DictionaryConfig {
    pub name: String,
    pub max_memory: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:7379".to_string()
}

fn default_max_memory() -> usize {
    64 * 1024 // 64 KB, sized for the small stores this protocol fronts
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    /// `(name, capacity)` per dictionary; the first is the default.
    pub dictionaries: Vec<(String, usize)>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(CliArgs::parse())
    }

    fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let max_memory = cli.max_memory.unwrap_or(toml_config.storage.max_memory);

        let dictionaries = if toml_config.storage.dictionaries.is_empty() {
            vec![("main".to_string(), max_memory)]
        } else {
            toml_config
                .storage
                .dictionaries
                .into_iter()
                .map(|d| (d.name, d.max_memory.unwrap_or(max_memory)))
                .collect()
        };

        Ok(Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            dictionaries,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "127.0.0.1:7379");
        assert_eq!(config.storage.max_memory, 64 * 1024);
        assert!(config.storage.dictionaries.is_empty());
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "0.0.0.0:7379"

            [storage]
            max_memory = 4096

            [[storage.dictionaries]]
            name = "main"

            [[storage.dictionaries]]
            name = "scratch"
            max_memory = 512

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:7379");
        assert_eq!(config.storage.max_memory, 4096);
        assert_eq!(config.storage.dictionaries.len(), 2);
        assert_eq!(config.storage.dictionaries[1].name, "scratch");
        assert_eq!(config.storage.dictionaries[1].max_memory, Some(512));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_resolve_defaults_single_main_dictionary() {
        let cli = CliArgs {
            config: None,
            listen: None,
            max_memory: Some(2048),
            log_level: "info".to_string(),
        };
        let config = Config::resolve(cli).unwrap();
        assert_eq!(config.dictionaries, vec![("main".to_string(), 2048)]);
        assert_eq!(config.listen, "127.0.0.1:7379");
    }
}

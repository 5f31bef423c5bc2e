use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "diagramdb", about = "DiagramDB - storage service for the diagram playground")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "diagramdb.toml")]
    pub config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Directory holding the embedded database and settings (overrides config file)
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

/// Where things live on disk and how the remote table is addressed. Which
/// backend is active is a user setting, not part of this file.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_database_file")]
    pub database_file: String,

    #[serde(default = "default_settings_file")]
    pub settings_file: String,

    #[serde(default = "default_remote_table")]
    pub remote_table: String,

    /// Remote request timeout. `0` disables it.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_database_file() -> String {
    "diagrams.db".to_string()
}

fn default_settings_file() -> String {
    "settings.json".to_string()
}

fn default_remote_table() -> String {
    diagramdb_remote::DEFAULT_TABLE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    diagramdb_remote::DEFAULT_TIMEOUT.as_secs()
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            settings_file: default_settings_file(),
            remote_table: default_remote_table(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl StorageConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        StorageConfig {
            data_dir: data_dir.into(),
            ..StorageConfig::default()
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(&self.settings_file)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: default_server(),
            logging: default_logging(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = Self::from_file(Path::new(&cli.config));

        // CLI overrides
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(ref dir) = cli.data_dir {
            config.storage.data_dir = dir.clone();
        }

        config
    }

    fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(config: &str) -> CliArgs {
        CliArgs {
            config: config.to_string(),
            port: None,
            log_level: None,
            data_dir: None,
        }
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(&cli("/nonexistent/diagramdb.toml"));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.database_path(), PathBuf::from("data/diagrams.db"));
        assert_eq!(config.storage.remote_table, "diagrams");
    }

    #[test]
    fn test_partial_file_and_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagramdb.toml");
        std::fs::write(
            &path,
            "[server]\nport = 8080\n\n[logging]\njson = true\n\n[storage]\nremote_table = \"snippets\"\nrequest_timeout_secs = 3\n",
        )
        .unwrap();

        let mut args = cli(path.to_str().unwrap());
        args.log_level = Some("debug".into());
        args.data_dir = Some(PathBuf::from("/var/lib/diagramdb"));
        let config = Config::load(&args);

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.storage.remote_table, "snippets");
        assert_eq!(config.storage.request_timeout(), Duration::from_secs(3));
        assert_eq!(
            config.storage.settings_path(),
            PathBuf::from("/var/lib/diagramdb/settings.json")
        );
        assert_eq!(config.listen_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_unparsable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        let config = Config::load(&cli(path.to_str().unwrap()));
        assert_eq!(config.server.port, 3000);
    }
}

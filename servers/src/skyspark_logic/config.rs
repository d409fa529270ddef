use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "SkySpark historian bridge: Axon queries over HTTP/JSON", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "SKYSPARK_PORT", help = "Port to listen on for client requests.")]
    pub port: Option<u16>,

    #[clap(long, env = "SKYSPARK_CONFIG_PATH", help = "Path to the JSON server configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "SKYSPARK_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "SKYSPARK_LOG_LEVEL", help = "Logging level (debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "SPYSPARK_CONFIG", help = "Path to spyspark.cfg holding the SkySpark host and token settings.")]
    pub spyspark_config: Option<PathBuf>,

    #[clap(long, env = "SKYSPARK_TRANSIENT_RETRIES", help = "Transport retries for connection failures (0 disables).")]
    pub transient_retries: Option<u32>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            spyspark_config: other.spyspark_config.or(self.spyspark_config),
            transient_retries: other.transient_retries.or(self.transient_retries),
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(1234)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

fn defaults() -> Config {
    Config {
        port: Some(1234),
        log_dir: Some(PathBuf::from("./logs")),
        log_level: Some("info".to_string()),
        transient_retries: Some(0),
        ..Default::default()
    }
}

/// A message produced while resolving the config, logged once logging is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigNote {
    pub level: log::Level,
    pub message: String,
}

impl ConfigNote {
    fn warn(message: String) -> Self {
        Self {
            level: log::Level::Warn,
            message,
        }
    }

    fn info(message: String) -> Self {
        Self {
            level: log::Level::Info,
            message,
        }
    }

    pub fn emit(&self) {
        log::log!(self.level, "{}", self.message);
    }
}

pub fn load_config() -> (Config, Vec<ConfigNote>) {
    resolve(Config::parse())
}

/// Defaults, then the JSON file (`server_skyspark.conf` unless `--config-path`), then CLI/env.
pub fn resolve(cli: Config) -> (Config, Vec<ConfigNote>) {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_skyspark.conf"));

    let mut current_config = defaults();
    let mut notes = Vec::new();

    if config_file_path.exists() {
        match fs::read_to_string(&config_file_path) {
            Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
                Ok(file_config) => current_config = current_config.merge(file_config),
                Err(e) => notes.push(ConfigNote::warn(format!(
                    "Failed to parse config file {}: {}. Falling back to other sources.",
                    config_file_path.display(),
                    e
                ))),
            },
            Err(e) => notes.push(ConfigNote::warn(format!(
                "Failed to read config file {}: {}. Falling back to other sources.",
                config_file_path.display(),
                e
            ))),
        }
    } else {
        notes.push(ConfigNote::info(format!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        )));
    }

    (current_config.merge(cli), notes)
}

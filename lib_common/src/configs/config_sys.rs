//! # SkySpark System Configuration
//!
//! Reads the INI file that tells the client where the SkySpark project lives
//! and how its bearer token is obtained:
//!
//! ```ini
//! [Host]
//! Address = http://skyspark.lbl.gov/api/lbnl/
//!
//! [Auth]
//! TokenFile = ./spyspark.token
//! RefreshCommand = ./scram_login.sh
//! ```
//!
//! A missing file or a missing `Host:Address` is an error; binaries treat it
//! as fatal at start-up.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, fmt};

use thiserror::Error;
use url::Url;

use config::{ext::*, *};

/// File name looked up when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "spyspark.cfg";

/// Environment variable that overrides `Host:Address`.
pub const HOST_ADDRESS_ENV: &str = "SPYSPARK_HOST_ADDRESS";

const KEY_HOST_ADDRESS: &str = "host:address";
const KEY_TOKEN_FILE: &str = "auth:tokenfile";
const KEY_REFRESH_COMMAND: &str = "auth:refreshcommand";
const DEFAULT_TOKEN_FILE: &str = "spyspark.token";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing config file {0}")]
    MissingFile(PathBuf),

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Config key {0} is not set")]
    MissingKey(String),

    #[error("Invalid host address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// Settings resolved from `spyspark.cfg` and the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct SysConfig {
    /// Base address of the SkySpark project API, always ending in `/`.
    pub host_address: Url,
    /// File holding the current bearer token.
    pub token_file: PathBuf,
    /// External command that re-authenticates and rewrites `token_file`.
    pub refresh_command: Option<String>,
    /// Raw key/value pairs as read from the file.
    pub options: BTreeMap<String, String>,
}

impl SysConfig {
    /// Builds a config from flattened `Section:Key` options.
    ///
    /// Keys are matched case-insensitively. `host_override` wins over the
    /// file's `Host:Address` when present.
    pub fn from_options(
        options: BTreeMap<String, String>,
        host_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |wanted: &str| -> Option<String> {
            options
                .iter()
                .find(|(k, _)| k.to_lowercase() == wanted)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let address = host_override
            .filter(|a| !a.trim().is_empty())
            .or_else(|| lookup(KEY_HOST_ADDRESS))
            .ok_or_else(|| ConfigError::MissingKey("Host:Address".to_string()))?;

        let host_address = parse_host_address(&address)?;
        let token_file = lookup(KEY_TOKEN_FILE)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE));
        let refresh_command = lookup(KEY_REFRESH_COMMAND);

        Ok(Self {
            host_address,
            token_file,
            refresh_command,
            options,
        })
    }
}

impl fmt::Display for SysConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SysConfig
    Host address: {},
    Token file: {},
    Refresh command: {}
",
            self.host_address,
            self.token_file.display(),
            self.refresh_command.as_deref().unwrap_or("<none>")
        )
    }
}

/// Parses a host base-address and normalizes it to end with `/` so that
/// relative joins (`eval`) land under the project path.
pub fn parse_host_address(address: &str) -> Result<Url, ConfigError> {
    let mut normalized = address.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|e| ConfigError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Location of `spyspark.cfg`: `$CONFIGS_LOCATION/spyspark.cfg` when the
/// variable is set, otherwise the current directory.
pub fn default_config_path() -> PathBuf {
    env::var("CONFIGS_LOCATION")
        .map(|dir| PathBuf::from(dir).join(CONFIG_FILE_NAME))
        .unwrap_or_else(|_| PathBuf::from(".").join(CONFIG_FILE_NAME))
}

/// Reads every `Section:Key` pair out of an INI file.
pub fn read_config_options(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }
    let _config_file: String = path.to_string_lossy().to_string();

    let _config_data: Box<dyn ConfigurationRoot> = DefaultConfigurationBuilder::new()
        .add_ini_file(&_config_file.is().optional())
        .build()
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: format!("{:?}", e),
        })?;

    let mut _config_options: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in _config_data.iter(None) {
        _config_options.insert(key.to_string(), value.to_string());
    }
    Ok(_config_options)
}

/// Loads the SkySpark configuration from `path`, applying the
/// `SPYSPARK_HOST_ADDRESS` override.
pub fn load_sys_config(path: &Path) -> Result<SysConfig, ConfigError> {
    let options = read_config_options(path)?;
    SysConfig::from_options(options, env::var(HOST_ADDRESS_ENV).ok())
}

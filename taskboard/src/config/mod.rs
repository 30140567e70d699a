//! Configuration for the `taskboard` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskboard/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that can't be read or parsed is an error.

use std::path::PathBuf;
use std::time::Duration;

use taskboard_proto::{ColumnId, ProjectId, TaskId};

use crate::api::HttpApiConfig;
use crate::realtime::socket::{self, WsConnector};
use crate::realtime::{BackoffPolicy, TransportError};

/// Default realtime endpoint.
pub const DEFAULT_REALTIME_URL: &str = "ws://127.0.0.1:9100/ws";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    realtime: RealtimeFileConfig,
}

/// `[api]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    token: Option<String>,
    timeout_secs: Option<u64>,
    rate_limit_max_wait_secs: Option<u64>,
}

/// `[realtime]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RealtimeFileConfig {
    url: Option<String>,
    connect_timeout_secs: Option<u64>,
    reconnect_base_delay_ms: Option<u64>,
    reconnect_max_attempts: Option<u32>,
    channel_capacity: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bearer token for REST and realtime. Required for any server call.
    pub token: Option<String>,
    /// REST client settings.
    pub api: HttpApiConfig,
    /// Realtime WebSocket URL.
    pub realtime_url: String,
    /// Realtime handshake timeout.
    pub connect_timeout: Duration,
    /// Realtime per-direction channel capacity.
    pub channel_capacity: usize,
    /// Reconnect backoff.
    pub backoff: BackoffPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            api: HttpApiConfig::default(),
            realtime_url: DEFAULT_REALTIME_URL.to_string(),
            connect_timeout: socket::DEFAULT_CONNECT_TIMEOUT,
            channel_capacity: socket::DEFAULT_CHANNEL_CAPACITY,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// An unreadable or malformed default config file is skipped: CLI and
    /// env values still apply over defaults, and the skipped file's error is
    /// returned alongside.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit `--config` file cannot be
    /// read or parsed.
    pub fn load(cli: &CliArgs) -> Result<(Self, Option<ConfigError>), ConfigError> {
        Self::load_with_default(cli, default_config_path())
    }

    fn load_with_default(
        cli: &CliArgs,
        default_path: Option<PathBuf>,
    ) -> Result<(Self, Option<ConfigError>), ConfigError> {
        match load_config_file(cli.config.as_deref(), default_path) {
            Ok(file) => Ok((Self::resolve(cli, &file), None)),
            Err(e) if cli.config.is_some() => Err(e),
            Err(e) => Ok((Self::resolve(cli, &ConfigFile::default()), Some(e))),
        }
    }

    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            token: cli.token.clone().or_else(|| file.api.token.clone()),
            api: HttpApiConfig {
                base_url: cli
                    .api_url
                    .clone()
                    .or_else(|| file.api.base_url.clone())
                    .unwrap_or(defaults.api.base_url),
                timeout: file
                    .api
                    .timeout_secs
                    .map_or(defaults.api.timeout, Duration::from_secs),
                rate_limit_max_wait: file
                    .api
                    .rate_limit_max_wait_secs
                    .map_or(defaults.api.rate_limit_max_wait, Duration::from_secs),
            },
            realtime_url: cli
                .ws_url
                .clone()
                .or_else(|| file.realtime.url.clone())
                .unwrap_or(defaults.realtime_url),
            connect_timeout: file
                .realtime
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            channel_capacity: file
                .realtime
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
            backoff: BackoffPolicy {
                base_delay: file
                    .realtime
                    .reconnect_base_delay_ms
                    .map_or(defaults.backoff.base_delay, Duration::from_millis),
                max_attempts: file
                    .realtime
                    .reconnect_max_attempts
                    .unwrap_or(defaults.backoff.max_attempts),
            },
        }
    }

    /// Builds the realtime connector from the `[realtime]` settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] for a non-WebSocket URL.
    pub fn ws_connector(&self) -> Result<WsConnector, TransportError> {
        Ok(WsConnector::new(&self.realtime_url)?
            .with_connect_timeout(self.connect_timeout)
            .with_channel_capacity(self.channel_capacity))
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Realtime task board client")]
pub struct CliArgs {
    /// Bearer token for the task board API.
    #[arg(long, env = "TASKBOARD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Base URL of the REST API.
    #[arg(long, env = "TASKBOARD_API_URL")]
    pub api_url: Option<String>,

    /// WebSocket URL of the realtime endpoint.
    #[arg(long, env = "TASKBOARD_WS_URL")]
    pub ws_url: Option<String>,

    /// Path to config file (default: `~/.config/taskboard/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKBOARD_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskboard.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Client subcommands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List projects.
    Projects,
    /// List a project's tasks by column.
    Tasks {
        /// Project id.
        project: ProjectId,
    },
    /// List a project's columns.
    Columns {
        /// Project id.
        project: ProjectId,
    },
    /// Move a task to another column.
    Move {
        /// Task id.
        task: TaskId,
        /// Destination column id.
        column: ColumnId,
        /// Position within the destination column.
        #[arg(long, default_value_t = 0)]
        position: u32,
    },
    /// Mark a task completed.
    Complete {
        /// Task id.
        task: TaskId,
    },
    /// Reopen a completed task.
    Uncomplete {
        /// Task id.
        task: TaskId,
    },
    /// Delete a task.
    Delete {
        /// Task id.
        task: TaskId,
    },
    /// Stream a project's changes as JSON lines until Ctrl-C.
    Watch {
        /// Project id.
        project: ProjectId,
    },
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// `~/.config/taskboard/config.toml`, if a config directory exists.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskboard").join("config.toml"))
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// Otherwise `default_path` is tried and a missing file is treated as empty
/// config.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
    default_path: Option<PathBuf>,
) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }
    let Some(path) = default_path else {
        return Ok(ConfigFile::default());
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}

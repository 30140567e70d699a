//! Hub settings: `--flags` (or `TASKBOARD_HUB_*` env) over an optional
//! `--config` TOML file with a `[server]` table, over built-in defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid hub config: {0}")]
    Invalid(#[from] toml::de::Error),
}

#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Taskboard reference hub")]
pub struct HubCliArgs {
    /// Listen address.
    #[arg(short, long, env = "TASKBOARD_HUB_ADDR")]
    pub bind: Option<String>,

    /// TOML file with a `[server]` table.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Largest accepted realtime frame in bytes.
    #[arg(long)]
    pub max_message_size: Option<usize>,

    /// Create a demo project with a few tasks at startup.
    #[arg(long)]
    pub seed_demo: bool,

    #[arg(long, default_value = "info", env = "TASKBOARD_HUB_LOG")]
    pub log_level: String,
}

/// Resolved hub settings. Doubles as the `[server]` table of the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub bind_addr: String,
    pub max_message_size: usize,
    pub seed_demo: bool,
    #[serde(skip)]
    pub log_level: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9100".to_string(),
            max_message_size: 64 * 1024,
            seed_demo: false,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HubConfigFile {
    server: HubConfig,
}

impl HubConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `--config` names a file that cannot be
    /// read or parsed.
    pub fn load(cli: &HubCliArgs) -> Result<Self, ConfigError> {
        let base = match &cli.config {
            Some(path) => read_file(path)?,
            None => Self::default(),
        };
        Ok(base.with_cli(cli))
    }

    /// `--seed-demo` can only turn seeding on.
    #[must_use]
    fn with_cli(mut self, cli: &HubCliArgs) -> Self {
        if let Some(bind) = &cli.bind {
            self.bind_addr.clone_from(bind);
        }
        if let Some(max) = cli.max_message_size {
            self.max_message_size = max;
        }
        self.seed_demo |= cli.seed_demo;
        self.log_level.clone_from(&cli.log_level);
        self
    }
}

fn read_file(path: &Path) -> Result<HubConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: HubConfigFile = toml::from_str(&text)?;
    Ok(file.server)
}

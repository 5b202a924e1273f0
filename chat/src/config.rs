use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::cli::Cli;

/// Runtime configuration resolved from CLI, env, file and defaults.
#[derive(Clone, Debug)]
pub struct Config {
    /// SQLite file holding the records.
    pub store_path: PathBuf,
    /// Whether verbose logging is enabled.
    pub logging_enabled: bool,
    /// User id commands act as.
    pub user: Option<String>,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    store: FileStore,
    #[serde(default)]
    logging: FileLogging,
    #[serde(default)]
    session: FileSession,
}

#[derive(Deserialize, Default)]
struct FileStore {
    path: Option<PathBuf>,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_logging")]
    enabled: bool,
}

#[derive(Deserialize, Default)]
struct FileSession {
    user: Option<String>,
}

fn default_logging() -> bool {
    true
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            enabled: default_logging(),
        }
    }
}

impl Config {
    /// Resolve configuration from CLI, environment variables, config file and defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut store_path = None;
        let mut logging = default_logging();
        let mut user = None;

        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("PIPELINE_CHAT_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/pipeline_chat.toml"));

        if let Ok(bytes) = fs::read(&config_path) {
            let contents = String::from_utf8_lossy(&bytes);
            let file_cfg: FileConfig = toml::from_str(&contents).context("invalid config file")?;
            store_path = file_cfg.store.path;
            logging = file_cfg.logging.enabled;
            user = file_cfg.session.user;
        }

        // environment overrides
        if let Ok(p) = std::env::var("PIPELINE_CHAT_STORE") {
            store_path = Some(PathBuf::from(p));
        }
        if let Ok(l) = std::env::var("PIPELINE_CHAT_LOGGING") {
            if let Ok(l) = l.parse::<bool>() {
                logging = l;
            }
        }
        if let Ok(u) = std::env::var("PIPELINE_CHAT_USER") {
            user = Some(u);
        }

        // CLI overrides
        if let Some(p) = &cli.store {
            store_path = Some(p.clone());
        }
        if let Some(l) = cli.logging {
            logging = l;
        }
        if let Some(u) = &cli.user {
            user = Some(u.clone());
        }

        if let Some(u) = &user {
            if u.trim().is_empty() {
                anyhow::bail!("invalid_user");
            }
        }

        let store_path = match store_path {
            Some(p) => p,
            None => default_data_dir()?.join("records.db"),
        };

        Ok(Self {
            store_path,
            logging_enabled: logging,
            user,
        })
    }

    /// The configured user, required by commands that act on someone's behalf.
    pub fn require_user(&self) -> Result<&str> {
        self.user
            .as_deref()
            .context("no user configured, pass --user or set PIPELINE_CHAT_USER")
    }
}

/// Determine the default data directory.
pub fn default_data_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from("org", "pipeline", "pipeline_chat")
        .context("cannot determine a home directory")?;
    Ok(proj.data_dir().to_path_buf())
}

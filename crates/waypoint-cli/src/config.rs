//! Configuration file management for waypoint.
//!
//! Provides a TOML-based config file at `~/.config/waypoint/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use waypoint_core::backend::{ChatBackend, OpenAiChatBackend, OpenAiConfig};
use waypoint_core::{DayPolicy, Generator, InvokerSettings, PromptCatalog, RetryPolicy};

pub const ENV_ENDPOINT: &str = "WAYPOINT_ENDPOINT";
pub const ENV_MODEL: &str = "WAYPOINT_MODEL";
pub const ENV_API_KEY: &str = "WAYPOINT_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "WAYPOINT_TIMEOUT_SECS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

/// On-disk configuration. Every field is optional; missing values fall
/// through to defaults. The API key is only ever read from the environment.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub generation: GenerationSection,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_policy: Option<DayPolicy>,
    /// Alternate prompt catalog TOML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the waypoint config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/waypoint` or
/// `~/.config/waypoint`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("waypoint");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("waypoint")
}

/// Return the path to the waypoint config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns `Ok(None)` if it does not exist.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(path)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub prompts: Option<PathBuf>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub temperature: Option<f32>,
    pub day_policy: DayPolicy,
    pub retry: RetryPolicy,
    pub prompts: Option<PathBuf>,
}

impl WaypointConfig {
    /// Resolve against the process environment and the config file.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file = load_config()?;
        Self::resolve_with(cli, file.as_ref(), |key| std::env::var(key).ok())
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - endpoint: `--endpoint` > `WAYPOINT_ENDPOINT` > `backend.endpoint` > OpenAI
    /// - model: `--model` > `WAYPOINT_MODEL` > `backend.model` > `gpt-4o-mini`
    /// - API key: `WAYPOINT_API_KEY` only
    /// - timeout: `WAYPOINT_TIMEOUT_SECS` > `backend.timeout_secs` > 90s
    /// - prompts: `--prompts` > `generation.prompts` > built-in
    pub fn resolve_with(
        cli: &CliOverrides,
        file: Option<&ConfigFile>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let backend = file.map(|f| &f.backend);
        let generation = file.map(|f| &f.generation);

        let endpoint = cli
            .endpoint
            .clone()
            .or_else(|| env(ENV_ENDPOINT))
            .or_else(|| backend.and_then(|b| b.endpoint.clone()))
            .unwrap_or_else(|| OpenAiConfig::DEFAULT_ENDPOINT.to_string());

        let model = cli
            .model
            .clone()
            .or_else(|| env(ENV_MODEL))
            .or_else(|| backend.and_then(|b| b.model.clone()))
            .unwrap_or_else(|| InvokerSettings::DEFAULT_MODEL.to_string());

        let timeout = match env(ENV_TIMEOUT_SECS) {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{ENV_TIMEOUT_SECS} is not a whole number: {raw:?}"))?;
                Duration::from_secs(secs)
            }
            None => backend
                .and_then(|b| b.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(InvokerSettings::DEFAULT_TIMEOUT),
        };

        Ok(Self {
            endpoint,
            api_key: env(ENV_API_KEY).filter(|k| !k.trim().is_empty()),
            model,
            timeout,
            temperature: backend.and_then(|b| b.temperature),
            day_policy: generation.and_then(|g| g.day_policy).unwrap_or_default(),
            retry: generation.and_then(|g| g.retry).unwrap_or_default(),
            prompts: cli
                .prompts
                .clone()
                .or_else(|| generation.and_then(|g| g.prompts.clone())),
        })
    }

    /// The prompt catalog: the configured file, or the built-in one.
    pub fn catalog(&self) -> Result<PromptCatalog> {
        match &self.prompts {
            Some(path) => PromptCatalog::load(path)
                .with_context(|| format!("failed to load prompt catalog {}", path.display())),
            None => Ok(PromptCatalog::builtin()),
        }
    }

    pub fn generator(&self) -> Result<Generator> {
        let backend: Arc<dyn ChatBackend> = Arc::new(
            OpenAiChatBackend::new(OpenAiConfig::new(&self.endpoint, self.api_key.clone()))
                .context("failed to build HTTP backend")?,
        );
        let settings = InvokerSettings {
            model: self.model.clone(),
            temperature: self.temperature,
            timeout: self.timeout,
        };
        Ok(Generator::new(backend, settings)
            .with_catalog(Arc::new(self.catalog()?))
            .with_day_policy(self.day_policy)
            .with_retry_policy(self.retry))
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

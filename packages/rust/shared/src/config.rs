//! Application configuration for dossier.
//!
//! User config lives at `~/.dossier/dossier.toml`.
//! Environment variables override config file values, and CLI flags override
//! both. Credentials never live in the file: only the *name* of the env var
//! holding each key is stored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DossierError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dossier.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dossier";

// ---------------------------------------------------------------------------
// Config structs (matching dossier.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Text generation backend settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Search backend settings.
    #[serde(default)]
    pub search: SearchConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default number of search hits per run.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Directory rendered reports are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_max_results() -> usize {
    5
}
fn default_output_dir() -> String {
    "outputs".into()
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: String,

    /// Model identifier sent to the backend.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Base URL of the Generative Language API.
    #[serde(default = "default_generation_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_generation_key_env(),
            default_model: default_model(),
            base_url: default_generation_url(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_key_env() -> String {
    "GOOGLE_API_KEY".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_generation_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_generation_timeout() -> u64 {
    60
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the SerpAPI key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// SerpAPI JSON endpoint.
    #[serde(default = "default_serpapi_url")]
    pub serpapi_url: String,

    /// HTML search page scraped when the structured API is unavailable.
    #[serde(default = "default_scrape_url")]
    pub scrape_url: String,

    /// Whether the HTML scraping tier is tried at all.
    #[serde(default = "default_true")]
    pub enable_scrape: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            serpapi_url: default_serpapi_url(),
            scrape_url: default_scrape_url(),
            enable_scrape: true,
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_key_env() -> String {
    "SERPAPI_API_KEY".into()
}
fn default_serpapi_url() -> String {
    "https://serpapi.com/search.json".into()
}
fn default_scrape_url() -> String {
    "https://html.duckduckgo.com/html/".into()
}
fn default_true() -> bool {
    true
}
fn default_search_timeout() -> u64 {
    10
}

impl AppConfig {
    /// The text generation API key, if its env var is set and non-empty.
    pub fn generation_api_key(&self) -> Option<String> {
        non_empty_env(&self.generation.api_key_env)
    }

    /// The search API key, if its env var is set and non-empty.
    pub fn search_api_key(&self) -> Option<String> {
        non_empty_env(&self.search.api_key_env)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dossier/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DossierError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dossier/dossier.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk and apply environment overrides.
///
/// Returns defaults (plus overrides) if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        tracing::debug!(?path, "config file not found, using defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DossierError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DossierError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Apply `DEFAULT_MODEL`, `MAX_SEARCH_RESULTS`, and `OUTPUT_DIR` overrides.
///
/// `lookup` resolves an env var name; tests pass a closure instead of
/// touching the process environment. A `MAX_SEARCH_RESULTS` that is not a
/// positive integer is ignored.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let set = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(model) = set("DEFAULT_MODEL") {
        config.generation.default_model = model;
    }

    if let Some(raw) = set("MAX_SEARCH_RESULTS") {
        match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => config.defaults.max_results = n,
            _ => tracing::warn!(value = %raw, "ignoring invalid MAX_SEARCH_RESULTS"),
        }
    }

    if let Some(dir) = set("OUTPUT_DIR") {
        config.defaults.output_dir = dir;
    }
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DossierError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DossierError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DossierError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

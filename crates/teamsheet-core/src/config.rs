// Configuration loading and parsing (teamsheet.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::formation::Format;
use crate::types::{Minutes, PerformanceCategory, TeamId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub team: TeamConfig,
    pub selection: SelectionConfig,
    pub db_path: String,
    pub roster: RosterConfig,
    pub notifications: NotificationConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// teamsheet.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for teamsheet.toml.
#[derive(Debug, Clone, Deserialize)]
struct TeamsheetFile {
    team: TeamConfig,
    selection: SelectionFile,
    database: DatabaseSection,
    roster: RosterConfig,
    #[serde(default)]
    notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamConfig {
    pub id: String,
    pub name: String,
}

impl TeamConfig {
    pub fn team_id(&self) -> TeamId {
        TeamId::new(self.id.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SelectionFile {
    default_format: String,
    default_period_minutes: u32,
    default_category: String,
    categories: Vec<String>,
    max_substitutes: usize,
}

/// Selection defaults, validated and converted to engine types.
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    pub default_format: Format,
    pub default_period_minutes: Minutes,
    pub default_category: PerformanceCategory,
    pub categories: Vec<PerformanceCategory>,
    pub max_substitutes: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    pub csv_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Webhook receiving saved-selection events. Notifications are off
    /// when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    /// Sent as a bearer token with webhook notifications.
    pub webhook_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/teamsheet.toml` and
/// (optionally) `config/credentials.toml` under `base_dir`.
///
/// Does not copy defaults; [`load_config`] does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- teamsheet.toml (required) ---
    let main_path = config_dir.join("teamsheet.toml");
    let main_text = read_file(&main_path)?;
    let file: TeamsheetFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let selection = build_selection(file.selection)?;

    let config = Config {
        team: file.team,
        selection,
        db_path: file.database.path,
        roster: file.roster,
        notifications: file.notifications,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy every default file (except `.example` templates) that is missing
/// from `config/`. Existing files are never touched. Returns the copies made,
/// in file-name order.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        return if config_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(copy_error(format!(
                "neither defaults/ nor config/ directory found in {}; \
                 run from the teamsheet-core directory or create config/",
                base_dir.display()
            )))
        };
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut sources: Vec<PathBuf> = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().map_or(true, |ext| ext != "example"))
        .collect();
    sources.sort();

    let mut copied = Vec::new();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        if copy_if_missing(&source, &target)? {
            copied.push(target);
        }
    }
    Ok(copied)
}

/// Copy `source` to `target` unless `target` already exists.
fn copy_if_missing(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("cannot create {}: {e}", target.display()))),
    };
    let mut src = std::fs::File::open(source)
        .map_err(|e| copy_error(format!("cannot open {}: {e}", source.display())))?;
    std::io::copy(&mut src, &mut dest)
        .map_err(|e| copy_error(format!("cannot write {}: {e}", target.display())))?;
    Ok(true)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Load config relative to the current working directory, copying default
/// files first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

fn build_selection(raw: SelectionFile) -> Result<SelectionConfig, ConfigError> {
    let default_format = raw
        .default_format
        .parse::<Format>()
        .map_err(|e| invalid("selection.default_format", e.to_string()))?;
    let default_period_minutes = Minutes::new(raw.default_period_minutes)
        .map_err(|_| invalid("selection.default_period_minutes", "must be greater than 0"))?;

    Ok(SelectionConfig {
        default_format,
        default_period_minutes,
        default_category: PerformanceCategory::new(raw.default_category),
        categories: raw.categories.into_iter().map(PerformanceCategory::new).collect(),
        max_substitutes: raw.max_substitutes,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.team.id.trim().is_empty() {
        return Err(invalid("team.id", "must not be empty"));
    }

    let sel = &config.selection;
    if sel.categories.is_empty() {
        return Err(invalid("selection.categories", "must list at least one category"));
    }
    if !sel.categories.contains(&sel.default_category) {
        return Err(invalid(
            "selection.default_category",
            format!("`{}` is not in selection.categories", sel.default_category),
        ));
    }

    if config.db_path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }

    if let Some(url) = &config.notifications.webhook_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(
                "notifications.webhook_url",
                format!("must be an http(s) URL, got {url}"),
            ));
        }
    }
    if config.notifications.timeout_secs == 0 {
        return Err(invalid("notifications.timeout_secs", "must be greater than 0"));
    }

    Ok(())
}

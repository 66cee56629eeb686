//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.waypoint/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct WaypointConfig {
    #[serde(default)]
    pub router: RouterSection,
    #[serde(default)]
    pub composition: CompositionSection,
    #[serde(default)]
    pub app: AppSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RouterSection {
    pub case_sensitive: Option<bool>,
    pub default_nav_order: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CompositionSection {
    pub default_transition: Option<String>,
    pub cache_views: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AppSection {
    pub title: Option<String>,
    pub log_level: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_NAV_ORDER: i64 = 100;
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub case_sensitive: bool,
    pub default_nav_order: i64,
    pub default_transition: Option<String>,
    pub cache_views: bool,
    pub app_title: Option<String>,
    pub log_level: String,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.waypoint/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".waypoint").join("config.toml"))
}

/// Load config from `~/.waypoint/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `WaypointConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<WaypointConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(WaypointConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(WaypointConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: WaypointConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &PathBuf) {
    let default_content = r#"# Waypoint Configuration
# All settings are optional — defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [router]
# case_sensitive = false         # Route patterns match case-insensitively
# default_nav_order = 100        # First order assigned to unordered nav routes

# [composition]
# default_transition = "entrance"
# cache_views = false            # Keep replaced views around for reuse

# [app]
# title = "My App"               # Appended to screen titles: "Screen | My App"
# log_level = "info"             # "error", "warn", "info", "debug", "trace"
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_title` and `cli_log_level` are from CLI flags (None = not specified).
pub fn resolve(
    config: &WaypointConfig,
    cli_title: Option<&str>,
    cli_log_level: Option<&str>,
) -> ResolvedConfig {
    // Case sensitivity: env → config → default
    let case_sensitive = std::env::var("WAYPOINT_CASE_SENSITIVE")
        .ok()
        .and_then(|v| v.parse().ok())
        .or(config.router.case_sensitive)
        .unwrap_or(false);

    // App title: CLI → env → config
    let app_title = cli_title
        .map(|s| s.to_string())
        .or_else(|| std::env::var("WAYPOINT_APP_TITLE").ok())
        .or_else(|| config.app.title.clone());

    // Log level: CLI → env → config → default
    let log_level = cli_log_level
        .map(|s| s.to_string())
        .or_else(|| std::env::var("WAYPOINT_LOG_LEVEL").ok())
        .or_else(|| config.app.log_level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

    // Default transition: env → config
    let default_transition = std::env::var("WAYPOINT_DEFAULT_TRANSITION")
        .ok()
        .or_else(|| config.composition.default_transition.clone());

    ResolvedConfig {
        case_sensitive,
        default_nav_order: config.router.default_nav_order.unwrap_or(DEFAULT_NAV_ORDER),
        default_transition,
        cache_views: config.composition.cache_views.unwrap_or(false),
        app_title,
        log_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = WaypointConfig::default();
        assert!(config.router.case_sensitive.is_none());
        assert!(config.app.title.is_none());
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let config = WaypointConfig::default();
        let resolved = resolve(&config, None, None);
        assert!(!resolved.case_sensitive);
        assert_eq!(resolved.default_nav_order, DEFAULT_NAV_ORDER);
        assert_eq!(resolved.log_level, DEFAULT_LOG_LEVEL);
        assert!(resolved.default_transition.is_none());
        assert!(!resolved.cache_views);
    }

    #[test]
    fn test_resolve_config_values_override_defaults() {
        let config = WaypointConfig {
            router: RouterSection {
                case_sensitive: Some(true),
                default_nav_order: Some(10),
            },
            composition: CompositionSection {
                default_transition: Some("fade".to_string()),
                cache_views: Some(true),
            },
            app: AppSection {
                title: Some("Starter Kit".to_string()),
                log_level: Some("debug".to_string()),
            },
        };
        let resolved = resolve(&config, None, None);
        assert!(resolved.case_sensitive);
        assert_eq!(resolved.default_nav_order, 10);
        assert_eq!(resolved.default_transition.as_deref(), Some("fade"));
        assert!(resolved.cache_views);
        assert_eq!(resolved.app_title.as_deref(), Some("Starter Kit"));
        assert_eq!(resolved.log_level, "debug");
    }

    #[test]
    fn test_resolve_cli_title_wins() {
        let config = WaypointConfig {
            app: AppSection {
                title: Some("From File".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = resolve(&config, Some("From CLI"), None);
        assert_eq!(resolved.app_title.as_deref(), Some("From CLI"));
    }

    #[test]
    fn test_sparse_toml_parses() {
        // Only override one thing — everything else stays default
        let toml_str = r#"
[app]
title = "Sparse"
"#;
        let config: WaypointConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.app.title.as_deref(), Some("Sparse"));
        assert!(config.router.case_sensitive.is_none());
        assert!(config.composition.default_transition.is_none());
    }

    #[test]
    fn test_full_toml_parses() {
        let toml_str = r#"
[router]
case_sensitive = true
default_nav_order = 50

[composition]
default_transition = "entrance"
cache_views = true

[app]
title = "Waypoint Demo"
log_level = "trace"
"#;
        let config: WaypointConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.router.case_sensitive, Some(true));
        assert_eq!(config.router.default_nav_order, Some(50));
        assert_eq!(
            config.composition.default_transition.as_deref(),
            Some("entrance")
        );
        assert_eq!(config.composition.cache_views, Some(true));
        assert_eq!(config.app.log_level.as_deref(), Some("trace"));
    }
}

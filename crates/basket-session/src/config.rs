//! # Session Configuration
//!
//! Settings for cart sessions: default instance, required item fields,
//! condition type orders, events and storage.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BASKET_INSTANCE=wishlist                                           │
//! │     BASKET_CONDITIONS_ORDER=discount,shipping,tax                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/basket/basket.toml (Linux)                               │
//! │     ~/Library/Application Support/com.basket.basket/basket.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     instance "main", memory storage, events on                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # basket.toml
//! [cart]
//! default_instance = "main"
//! required_fields = ["id", "name", "price", "quantity"]
//! conditions_order = ["discount", "other", "tax"]
//! items_conditions_order = ["discount", "other", "tax"]
//!
//! [events]
//! enabled = true
//!
//! [storage]
//! backend = "file"   # memory | file
//! path = "/var/lib/basket/carts"
//! ```

use basket_core::{RequiredFields, TypeOrder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::storage::{validate_instance_name, CartStore, JsonFileStore, MemoryStore};

// =============================================================================
// Cart Settings
// =============================================================================

/// How carts are set up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSettings {
    /// Instance a new session starts on.
    #[serde(default = "default_instance")]
    pub default_instance: String,

    /// Keys an add record must carry.
    #[serde(default)]
    pub required_fields: RequiredFields,

    /// Cart-level condition types, in application order.
    #[serde(default)]
    pub conditions_order: TypeOrder,

    /// Item-level condition types, in application order.
    #[serde(default)]
    pub items_conditions_order: TypeOrder,
}

fn default_instance() -> String {
    "main".to_string()
}

impl Default for CartSettings {
    fn default() -> Self {
        CartSettings {
            default_instance: default_instance(),
            required_fields: RequiredFields::default(),
            conditions_order: TypeOrder::default(),
            items_conditions_order: TypeOrder::default(),
        }
    }
}

// =============================================================================
// Event Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSettings {
    /// When false, sessions never call their sink.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings { enabled: true }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Snapshots live as long as the process.
    #[default]
    Memory,

    /// One JSON file per instance.
    File,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::File => write!(f, "file"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackend::Memory),
            "file" | "json" => Ok(StorageBackend::File),
            other => Err(SessionError::InvalidConfig(format!(
                "Unknown storage backend: '{}'. Valid options: memory, file",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the file backend. Defaults to the platform data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Session Configuration
// =============================================================================

/// Complete session configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub cart: CartSettings,

    #[serde(default)]
    pub events: EventSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (basket.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SessionResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading session config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load session config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SessionResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SessionError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SessionError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .map_err(|e| SessionError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Session config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SessionResult<()> {
        validate_instance_name(&self.cart.default_instance).map_err(|_| {
            SessionError::InvalidConfig(format!(
                "default_instance '{}' is not a valid instance name",
                self.cart.default_instance
            ))
        })?;

        if !self.cart.required_fields.iter().any(|field| field == "id") {
            return Err(SessionError::InvalidConfig(
                "required_fields must include 'id'".into(),
            ));
        }

        for (name, order) in [
            ("conditions_order", &self.cart.conditions_order),
            ("items_conditions_order", &self.cart.items_conditions_order),
        ] {
            if order.iter().any(|kind| kind.trim().is_empty()) {
                return Err(SessionError::InvalidConfig(format!(
                    "{} must not contain empty type names",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(instance) = std::env::var("BASKET_INSTANCE") {
            debug!(instance = %instance, "Overriding default instance from environment");
            self.cart.default_instance = instance;
        }

        if let Ok(enabled) = std::env::var("BASKET_EVENTS") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => self.events.enabled = true,
                "0" | "false" | "off" | "no" => self.events.enabled = false,
                _ => warn!(value = %enabled, "Unknown BASKET_EVENTS value in environment"),
            }
        }

        if let Ok(order) = std::env::var("BASKET_CONDITIONS_ORDER") {
            debug!(order = %order, "Overriding cart conditions order from environment");
            self.cart.conditions_order = parse_order(&order);
        }

        if let Ok(order) = std::env::var("BASKET_ITEMS_CONDITIONS_ORDER") {
            debug!(order = %order, "Overriding item conditions order from environment");
            self.cart.items_conditions_order = parse_order(&order);
        }

        if let Ok(path) = std::env::var("BASKET_STORAGE_PATH") {
            debug!(path = %path, "Overriding storage path from environment");
            self.storage.backend = StorageBackend::File;
            self.storage.path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "basket", "basket")
            .map(|dirs| dirs.config_dir().join("basket.toml"))
    }

    /// Returns the default snapshot directory for the file backend.
    fn default_storage_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "basket", "basket")
            .map(|dirs| dirs.data_dir().join("carts"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Directory the file backend writes to.
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage
            .path
            .clone()
            .or_else(Self::default_storage_path)
    }

    /// Opens the configured storage backend.
    pub fn open_store(&self) -> SessionResult<Box<dyn CartStore>> {
        match self.storage.backend {
            StorageBackend::Memory => Ok(Box::new(MemoryStore::new())),
            StorageBackend::File => {
                let path = self.storage_path().ok_or_else(|| {
                    SessionError::InvalidConfig("No storage path available".into())
                })?;
                info!(path = %path.display(), "Opening file cart store");
                Ok(Box::new(JsonFileStore::new(path)))
            }
        }
    }

    pub fn default_instance(&self) -> &str {
        &self.cart.default_instance
    }

    pub fn events_enabled(&self) -> bool {
        self.events.enabled
    }
}

fn parse_order(text: &str) -> TypeOrder {
    text.split(',')
        .map(str::trim)
        .filter(|kind| !kind.is_empty())
        .collect()
}

/// Reads a config file without environment overrides or validation.
pub fn read_config_file(path: &Path) -> SessionResult<SessionConfig> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.default_instance(), "main");
        assert!(config.events_enabled());
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.cart.conditions_order, TypeOrder::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!("File".parse::<StorageBackend>().unwrap(), StorageBackend::File);
        assert!("redis".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SessionConfig::default();

        config.cart.default_instance = "../etc".to_string();
        assert!(config.validate().unwrap_err().is_config_error());

        config.cart.default_instance = "main".to_string();
        config.cart.required_fields = RequiredFields::new(["name"]);
        assert!(config.validate().is_err());

        config.cart.required_fields = RequiredFields::default();
        config.cart.conditions_order = TypeOrder::new(["discount", " "]);
        assert!(config.validate().is_err());

        config.cart.conditions_order = TypeOrder::new(["discount", "shipping", "tax"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("basket.toml");

        let mut config = SessionConfig::default();
        config.cart.default_instance = "wishlist".to_string();
        config.cart.items_conditions_order = TypeOrder::new(["tax"]);
        config.storage.backend = StorageBackend::File;
        config.storage.path = Some(dir.path().join("carts"));
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[cart]"));
        assert!(contents.contains("[storage]"));

        let loaded = read_config_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SessionConfig = toml::from_str(
            r#"
            [cart]
            conditions_order = ["tax", "discount"]
            "#,
        )
        .unwrap();

        assert_eq!(config.default_instance(), "main");
        assert_eq!(config.cart.conditions_order, TypeOrder::new(["tax", "discount"]));
        assert_eq!(config.cart.required_fields, RequiredFields::default());
        assert!(config.events_enabled());
    }

    #[test]
    fn test_parse_order() {
        assert_eq!(
            parse_order("discount, shipping,,tax"),
            TypeOrder::new(["discount", "shipping", "tax"])
        );
    }

    #[test]
    fn test_open_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SessionConfig::default();
        assert!(config.open_store().unwrap().list_instances().unwrap().is_empty());

        config.storage.backend = StorageBackend::File;
        config.storage.path = Some(dir.path().to_path_buf());
        let store = config.open_store().unwrap();
        assert!(!store.has("main").unwrap());
    }
}

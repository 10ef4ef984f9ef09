use color_eyre::Result;
use color_eyre::eyre::eyre;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tillguard_lock::LockConfig;
use tracing::warn;

/// Fixed key the lock configuration is stored under inside the settings
/// document.
pub const SCREEN_LOCK_KEY: &str = "screen_lock";

/// JSON-backed settings store.
///
/// The file is a single JSON object; this store only reads and writes the
/// [`SCREEN_LOCK_KEY`] entry and leaves everything else in the document
/// untouched.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store backed by the given file path. The file does not
    /// have to exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at the platform default location
    /// (`<config_dir>/tillguard/settings.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform config directory cannot be
    /// determined.
    pub fn open_default() -> Result<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| eyre!("Could not find config directory"))?;
        Ok(Self::new(config_dir.join("tillguard").join("settings.json")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the lock configuration.
    ///
    /// A missing file, a missing key, or a malformed entry all fall back to
    /// the disabled default. The host shell must never crash over a bad
    /// settings file.
    #[must_use]
    pub fn load_lock_config(&self) -> LockConfig {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return LockConfig::default();
        };

        let document: Map<String, Value> = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                warn!(path = %self.path.display(), "malformed settings file, screen lock disabled: {e}");
                return LockConfig::default();
            }
        };

        let Some(entry) = document.get(SCREEN_LOCK_KEY) else {
            return LockConfig::default();
        };

        match serde_json::from_value(entry.clone()) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %self.path.display(), "malformed screen-lock entry, screen lock disabled: {e}");
                LockConfig::default()
            }
        }
    }

    /// Persists the lock configuration under [`SCREEN_LOCK_KEY`],
    /// preserving any unrelated keys already in the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created, the
    /// config fails to serialize, or the file cannot be written.
    pub fn save_lock_config(&self, config: &LockConfig) -> Result<()> {
        let mut document = match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|_| Map::new()),
            Err(_) => Map::new(),
        };

        document.insert(SCREEN_LOCK_KEY.to_string(), serde_json::to_value(config)?);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(document))?)?;
        Ok(())
    }
}

//! # Configuration
//!
//! `RegistrarConfig` is read from a TOML file and then overridden by CLI
//! flags. Every field has a default, so an empty or missing file is valid.
//!
//! ```toml
//! max_credits_per_semester = 21
//! database = "campus.redb"
//! backend = "redb"
//! ```
//!
//! Lookup order: `--config <path>`, then `registrar.toml` in the working
//! directory, then built-in defaults.

use clap::ValueEnum;
use registrar_core::RegistrarError;
use registrar_core::primitives::DEFAULT_MAX_CREDITS_PER_SEMESTER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File probed when no `--config` flag is given.
pub const DEFAULT_CONFIG_FILE: &str = "registrar.toml";

/// Largest configuration file we are willing to parse (64 KB).
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

/// Where records live between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Whole-store snapshot file, rewritten after every mutating command.
    File,
    /// redb database, one ACID transaction per write.
    #[default]
    Redb,
}

impl Backend {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Backend::File => "file",
            Backend::Redb => "redb",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrarConfig {
    pub max_credits_per_semester: u32,
    pub database: PathBuf,
    pub backend: Backend,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            max_credits_per_semester: DEFAULT_MAX_CREDITS_PER_SEMESTER,
            database: PathBuf::from("registrar.db"),
            backend: Backend::default(),
        }
    }
}

impl RegistrarConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, RegistrarError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| RegistrarError::SerializationError(format!("Config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RegistrarError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            RegistrarError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(RegistrarError::InvalidInput(format!(
                "Config file {} bytes exceeds maximum {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            RegistrarError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Resolve the configuration file: an explicit path must exist; the
    /// default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, RegistrarError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    tracing::debug!("Loading config from {}", DEFAULT_CONFIG_FILE);
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply command-line overrides on top of file values.
    pub fn with_overrides(
        mut self,
        database: Option<PathBuf>,
        backend: Option<Backend>,
        max_credits: Option<u32>,
    ) -> Result<Self, RegistrarError> {
        if let Some(database) = database {
            self.database = database;
        }
        if let Some(backend) = backend {
            self.backend = backend;
        }
        if let Some(max_credits) = max_credits {
            self.max_credits_per_semester = max_credits;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), RegistrarError> {
        if self.max_credits_per_semester == 0 {
            return Err(RegistrarError::InvalidInput(
                "max_credits_per_semester must be at least 1".to_string(),
            ));
        }
        if self.database.as_os_str().is_empty() {
            return Err(RegistrarError::InvalidInput(
                "database path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

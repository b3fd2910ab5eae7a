//! Policy configuration loading.
//!
//! Egress policies are configured per protected action in TOML:
//!
//! ```toml
//! [actions.ai_cloud_processing]
//! max_allowed = "internal"
//! allow_restricted_content = false
//! redact_disallowed = true
//! ```
//!
//! Path precedence: explicit path > `$CELLGUARD_CONFIG_PATH` >
//! `./cellguard.toml`. A missing file yields built-in defaults (backward
//! compatible); a malformed file is an error. `max_allowed = "none"` makes
//! the action forbid every level.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::{ClassificationLevel, Policy};

/// The protected action configured by default.
pub const DEFAULT_ACTION: &str = "ai_cloud_processing";

const CONFIG_PATH_ENV: &str = "CELLGUARD_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "cellguard.toml";

/// Raw TOML shape; converted into validated [`Policy`] values at load.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    actions: HashMap<String, ActionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ActionEntry {
    /// Level name, or "none" to forbid every level.
    max_allowed: String,
    allow_restricted_content: bool,
    redact_disallowed: bool,
}

impl Default for ActionEntry {
    fn default() -> Self {
        Self {
            max_allowed: ClassificationLevel::Internal.as_str().to_owned(),
            allow_restricted_content: false,
            redact_disallowed: true,
        }
    }
}

impl ActionEntry {
    fn to_policy(&self) -> Result<Policy> {
        let max_allowed = if self.max_allowed == "none" {
            None
        } else {
            Some(
                ClassificationLevel::parse(&self.max_allowed)
                    .context("invalid max_allowed level")?,
            )
        };
        Ok(Policy {
            max_allowed,
            allow_restricted_content: self.allow_restricted_content,
            redact_disallowed: self.redact_disallowed,
        })
    }
}

/// Validated per-action egress policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    actions: HashMap<String, Policy>,
}

impl Default for GuardConfig {
    /// One default action (`ai_cloud_processing`): ceiling `Internal`, no
    /// restricted-content override, redaction on.
    fn default() -> Self {
        let mut actions = HashMap::new();
        actions.insert(
            DEFAULT_ACTION.to_owned(),
            Policy {
                max_allowed: Some(ClassificationLevel::Internal),
                allow_restricted_content: false,
                redact_disallowed: true,
            },
        );
        Self { actions }
    }
}

impl GuardConfig {
    /// Load with path precedence `$CELLGUARD_CONFIG_PATH` >
    /// `./cellguard.toml` > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading guard config from file");
                Self::from_toml_str(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no guard config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read guard config: {e}")),
        }
    }

    /// Load from an explicit path, which must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read guard config {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Parse from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or an unrecognised level name.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw: ConfigFile =
            toml::from_str(contents).context("failed to parse guard config TOML")?;
        let mut actions = HashMap::new();
        for (name, entry) in &raw.actions {
            let policy = entry
                .to_policy()
                .with_context(|| format!("invalid policy for action '{name}'"))?;
            actions.insert(name.clone(), policy);
        }
        Ok(Self { actions })
    }

    /// Policy for a protected action, if configured.
    #[must_use]
    pub fn policy_for(&self, action: &str) -> Option<&Policy> {
        self.actions.get(action)
    }
}

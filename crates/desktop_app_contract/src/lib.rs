//! Shared contract types between the desktop runtime and the applications it launches.
//!
//! An application is described by an [`AppManifest`], usually authored as an
//! `app.manifest.toml` file next to the app sources. The runtime registers validated manifests
//! and pairs each with a factory that builds the running instance.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category used when a manifest does not declare one.
pub const DEFAULT_APP_CATEGORY: &str = "other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Declared capability scopes an app asks the shell for.
pub enum AppCapability {
    /// Window creation and control.
    Window,
    /// Shared store reads and writes.
    State,
    /// Event bus subscriptions and publishing.
    Events,
    /// File service access through the explorer REST API.
    Filesystem,
    /// Clipboard copy/cut/paste.
    Clipboard,
    /// Read-only access to shell statistics.
    System,
}

impl AppCapability {
    /// Returns the stable manifest token for the capability.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Window => "window",
            Self::State => "state",
            Self::Events => "events",
            Self::Filesystem => "filesystem",
            Self::Clipboard => "clipboard",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Initial window geometry requested by an app.
pub struct WindowDefaults {
    /// Default width in pixels.
    pub default_width: i32,
    /// Default height in pixels.
    pub default_height: i32,
}

impl Default for WindowDefaults {
    fn default() -> Self {
        Self {
            default_width: 600,
            default_height: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
/// Application manifest.
///
/// Every field deserializes with a default so that [`AppManifest::validate`] can report all
/// missing fields at once instead of failing on the first.
pub struct AppManifest {
    /// Stable application id (`[a-z0-9-]+`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Semantic version (`X.Y.Z`).
    pub version: String,
    /// Module entry point relative to the app directory.
    pub entry_point: String,
    /// Short description shown in launchers.
    pub description: String,
    /// Launcher category; empty means [`DEFAULT_APP_CATEGORY`].
    pub category: String,
    /// Requested capabilities.
    pub permissions: Vec<AppCapability>,
    /// Initial window geometry.
    pub window: WindowDefaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Manifest parsing and validation failures.
pub enum ManifestError {
    /// The manifest text is not valid TOML for the manifest schema.
    #[error("failed to parse manifest: {0}")]
    Parse(String),
    /// The manifest parsed but violates one or more rules.
    #[error("invalid manifest `{id}`:\n- {}", .errors.join("\n- "))]
    Invalid {
        /// Manifest id as written (possibly empty).
        id: String,
        /// Every rule violation found.
        errors: Vec<String>,
    },
}

impl AppManifest {
    /// Parses and validates a TOML manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] for malformed TOML and [`ManifestError::Invalid`] when
    /// validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(raw).map_err(|e| ManifestError::Parse(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Checks every manifest rule and reports all violations together.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Invalid`] listing each violated rule.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut errors = Vec::new();

        if self.id.is_empty() {
            errors.push("missing `id` field".to_string());
        }
        if self.name.is_empty() {
            errors.push("missing `name` field".to_string());
        }
        if self.version.is_empty() {
            errors.push("missing `version` field".to_string());
        }
        if self.entry_point.is_empty() {
            errors.push("missing `entry_point` field".to_string());
        }
        if !self.id.is_empty() && !is_valid_app_id(&self.id) {
            errors.push("invalid id format (use lowercase letters, digits and dashes)".to_string());
        }
        if !self.version.is_empty() && !is_semver_triplet(&self.version) {
            errors.push("invalid version format (use semver: X.Y.Z)".to_string());
        }
        if self.window.default_width <= 0 {
            errors.push("window.default_width must be positive".to_string());
        }
        if self.window.default_height <= 0 {
            errors.push("window.default_height must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::Invalid {
                id: self.id.clone(),
                errors,
            })
        }
    }

    /// Returns the launcher category, falling back to [`DEFAULT_APP_CATEGORY`].
    pub fn category(&self) -> &str {
        if self.category.is_empty() {
            DEFAULT_APP_CATEGORY
        } else {
            &self.category
        }
    }

    /// Returns `true` when the manifest requests `capability`.
    pub fn requests(&self, capability: AppCapability) -> bool {
        self.permissions.contains(&capability)
    }
}

fn is_valid_app_id(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn is_semver_triplet(raw: &str) -> bool {
    let parts: Vec<&str> = raw.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

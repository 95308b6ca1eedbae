//! Engine configuration via `pasta.toml`
//!
//! On first use a commented default `pasta.toml` can be written next to the
//! notebook. To change settings, edit the file and reopen the notebook.

use pasta_core::{CallerContext, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed next to the notebook store.
pub const CONFIG_FILE_NAME: &str = "pasta.toml";

/// Design document holding the hierarchy and path views.
pub const DESIGN_HIERARCHY: &str = "viewHierarchy";
/// Hierarchy view name.
pub const VIEW_HIERARCHY: &str = "viewHierarchy";
/// Path view name.
pub const VIEW_PATHS: &str = "viewPaths";
/// Design document holding the identification views.
pub const DESIGN_IDENTIFY: &str = "viewIdentify";
/// Checksum view name.
pub const VIEW_CHECKSUM: &str = "viewSHAsum";
/// QR-code view name.
pub const VIEW_QR: &str = "viewQR";
/// Tag view name.
pub const VIEW_TAGS: &str = "viewTags";
/// Design document holding the per-type views.
pub const DESIGN_TYPES: &str = "viewDocType";

/// Engine configuration loaded from `pasta.toml`.
///
/// # Example
///
/// ```toml
/// table_columns_max = 16
/// magic_tags = ["_curated", "_1", "_2", "_3", "_4", "_5"]
/// root_type = "x0"
/// schema_id = "-ontology-"
/// client = "pasta-engine"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of value columns in a per-type view.
    #[serde(default = "default_table_columns_max")]
    pub table_columns_max: usize,
    /// Tags (without `#`) indexed by the tag view.
    #[serde(default = "default_magic_tags")]
    pub magic_tags: Vec<String>,
    /// Type tag of the hierarchy root.
    #[serde(default = "default_root_type")]
    pub root_type: String,
    /// Id of the schema singleton document.
    #[serde(default = "default_schema_id")]
    pub schema_id: String,
    /// Provenance recorded when the caller supplies none.
    #[serde(default = "default_client")]
    pub client: String,
}

fn default_table_columns_max() -> usize {
    16
}

fn default_magic_tags() -> Vec<String> {
    ["_curated", "_1", "_2", "_3", "_4", "_5"]
        .iter()
        .map(|tag| tag.to_string())
        .collect()
}

fn default_root_type() -> String {
    pasta_core::ROOT_TYPE.to_string()
}

fn default_schema_id() -> String {
    "-ontology-".to_string()
}

fn default_client() -> String {
    "pasta-engine".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            table_columns_max: default_table_columns_max(),
            magic_tags: default_magic_tags(),
            root_type: default_root_type(),
            schema_id: default_schema_id(),
            client: default_client(),
        }
    }
}

impl EngineConfig {
    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.table_columns_max == 0 {
            return Err(Error::InvalidConfig(
                "table_columns_max must be at least 1".to_string(),
            ));
        }
        if self.root_type.trim().is_empty() {
            return Err(Error::InvalidConfig("root_type must not be empty".to_string()));
        }
        if self.schema_id.trim().is_empty() {
            return Err(Error::InvalidConfig("schema_id must not be empty".to_string()));
        }
        Ok(())
    }

    /// Provenance for writes the engine makes on its own behalf.
    pub fn caller_context(&self) -> CallerContext {
        CallerContext::new(self.client.as_str())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# PASTA engine configuration
#
# Maximum number of value columns in a per-type view (default: 16)
table_columns_max = 16

# Tags indexed by the tag view, without the leading '#'
magic_tags = ["_curated", "_1", "_2", "_3", "_4", "_5"]

# Type tag of the hierarchy root (projects)
root_type = "x0"

# Id of the document holding the type schema
schema_id = "-ontology-"

# Provenance written to '-client' when the caller supplies none
client = "pasta-engine"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

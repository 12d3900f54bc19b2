//! Configuration types for profile sync
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::freshness::MarkerStrategy;

/// Main sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote document store configuration
    pub document_store: DocumentStoreConfig,

    /// Local key-value store configuration
    pub local_store: LocalStoreConfig,

    /// Layout of profile documents in the document store
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Version marker settings
    #[serde(default)]
    pub freshness: FreshnessConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            document_store: DocumentStoreConfig::default(),
            local_store: LocalStoreConfig::default(),
            profile: ProfileConfig::default(),
            freshness: FreshnessConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.document_store.validate()?;
        self.local_store.validate()?;
        self.profile.validate()?;
        self.freshness.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Document store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentStoreConfig {
    /// REST/JSON document API
    Rest {
        /// Base URL, e.g. `https://db.example.com/v1`
        base_url: String,
        /// Bearer token
        api_token: String,
        /// HTTP timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        /// Perform reads but only log writes
        #[serde(default)]
        dry_run: bool,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom document store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl DocumentStoreConfig {
    /// Validate the document store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            DocumentStoreConfig::Rest {
                base_url,
                api_token,
                timeout_secs,
                ..
            } => {
                if base_url.is_empty() {
                    return Err(crate::Error::config("REST store base URL cannot be empty"));
                }
                if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "REST store base URL must use HTTP or HTTPS scheme. Got: {}",
                        base_url
                    )));
                }
                if api_token.is_empty() {
                    return Err(crate::Error::config("REST store API token cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("REST store timeout must be > 0"));
                }
                Ok(())
            }
            DocumentStoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom document store factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom document store config cannot be null",
                    ));
                }
                Ok(())
            }
            DocumentStoreConfig::Memory => Ok(()),
        }
    }

    /// Get the document store type name
    pub fn type_name(&self) -> &str {
        match self {
            DocumentStoreConfig::Rest { .. } => "rest",
            DocumentStoreConfig::Memory => "memory",
            DocumentStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Local store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocalStoreConfig {
    /// File-based store
    File {
        /// Path to the JSON file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom local store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl LocalStoreConfig {
    /// Validate the local store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            LocalStoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Local store path cannot be empty"));
                }
                Ok(())
            }
            LocalStoreConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom local store factory cannot be empty",
                    ));
                }
                Ok(())
            }
            LocalStoreConfig::Memory => Ok(()),
        }
    }

    /// Get the local store type name
    pub fn type_name(&self) -> &str {
        match self {
            LocalStoreConfig::File { .. } => "file",
            LocalStoreConfig::Memory => "memory",
            LocalStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Where profile data lives in the document store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Top-level collection of profile documents
    #[serde(default = "default_profile_collection")]
    pub collection: String,

    /// Sub-collection of a profile holding its links
    #[serde(default = "default_links_collection")]
    pub links_collection: String,

    /// Collection whose same-id document mirrors the profile title
    ///
    /// `None` disables title mirroring.
    #[serde(default = "default_mirror_collection")]
    pub mirror_collection: Option<String>,

    /// Field on the profile document holding the version marker
    #[serde(default = "default_version_field")]
    pub version_field: String,

    /// Top-level collection of user documents
    #[serde(default = "default_members_collection")]
    pub members_collection: String,

    /// Field on a user document naming the profile it belongs to
    #[serde(default = "default_member_field")]
    pub member_field: String,
}

impl ProfileConfig {
    /// Validate the profile layout
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_segment("profile collection", &self.collection)?;
        validate_segment("links collection", &self.links_collection)?;
        if let Some(mirror) = &self.mirror_collection {
            validate_segment("mirror collection", mirror)?;
        }
        validate_segment("members collection", &self.members_collection)?;
        if self.version_field.is_empty() {
            return Err(crate::Error::config("Version field cannot be empty"));
        }
        if self.member_field.is_empty() {
            return Err(crate::Error::config("Member field cannot be empty"));
        }
        Ok(())
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            collection: default_profile_collection(),
            links_collection: default_links_collection(),
            mirror_collection: default_mirror_collection(),
            version_field: default_version_field(),
            members_collection: default_members_collection(),
            member_field: default_member_field(),
        }
    }
}

/// Version marker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessConfig {
    /// Local store key holding the marker
    #[serde(default = "default_marker_key")]
    pub marker_key: String,

    /// How the next marker is derived from the current one
    #[serde(default)]
    pub strategy: MarkerStrategy,

    /// Keep one marker per profile (`<marker_key>:<profile id>`)
    /// instead of a single shared key
    #[serde(default)]
    pub per_profile_keys: bool,
}

impl FreshnessConfig {
    /// Validate the freshness settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.marker_key.is_empty() {
            return Err(crate::Error::config("Marker key cannot be empty"));
        }
        Ok(())
    }

    /// Local store key for the given profile
    pub fn key_for(&self, profile_id: &str) -> String {
        if self.per_profile_keys {
            format!("{}:{}", self.marker_key, profile_id)
        } else {
            self.marker_key.clone()
        }
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            marker_key: default_marker_key(),
            strategy: MarkerStrategy::default(),
            per_profile_keys: false,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn validate_segment(what: &str, value: &str) -> Result<(), crate::Error> {
    if value.is_empty() {
        return Err(crate::Error::config(format!("{} cannot be empty", what)));
    }
    if value.contains('/') {
        return Err(crate::Error::config(format!(
            "{} must be a single path segment. Got: {}",
            what, value
        )));
    }
    Ok(())
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_profile_collection() -> String {
    "teams".to_string()
}

fn default_links_collection() -> String {
    "links".to_string()
}

fn default_mirror_collection() -> Option<String> {
    Some("batches".to_string())
}

fn default_version_field() -> String {
    "version".to_string()
}

fn default_members_collection() -> String {
    "users".to_string()
}

fn default_member_field() -> String {
    "batchId".to_string()
}

fn default_marker_key() -> String {
    "teamVersion".to_string()
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SyncConfig = serde_json::from_value(serde_json::json!({
            "document_store": {
                "type": "rest",
                "base_url": "https://db.example.com/v1",
                "api_token": "secret"
            },
            "local_store": { "type": "file", "path": "/tmp/linkbio.json" }
        }))
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.document_store.type_name(), "rest");
        assert_eq!(config.local_store.type_name(), "file");
        assert_eq!(config.profile.collection, "teams");
        assert_eq!(config.profile.members_collection, "users");
        assert_eq!(config.profile.member_field, "batchId");
        assert_eq!(config.freshness.marker_key, "teamVersion");
        assert_eq!(config.freshness.strategy, MarkerStrategy::Toggle);
        match config.document_store {
            DocumentStoreConfig::Rest {
                timeout_secs,
                dry_run,
                ..
            } => {
                assert_eq!(timeout_secs, 30);
                assert!(!dry_run);
            }
            other => panic!("expected rest config, got {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_rest_config() {
        let config = DocumentStoreConfig::Rest {
            base_url: "ftp://db.example.com".to_string(),
            api_token: "secret".to_string(),
            timeout_secs: 30,
            dry_run: false,
        };
        assert!(config.validate().is_err());

        let config = DocumentStoreConfig::Rest {
            base_url: "https://db.example.com".to_string(),
            api_token: String::new(),
            timeout_secs: 30,
            dry_run: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_nested_collection_names() {
        let profile = ProfileConfig {
            links_collection: "links/nested".to_string(),
            ..ProfileConfig::default()
        };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn marker_keys() {
        let mut freshness = FreshnessConfig::default();
        assert_eq!(freshness.key_for("abc"), "teamVersion");

        freshness.per_profile_keys = true;
        assert_eq!(freshness.key_for("abc"), "teamVersion:abc");
    }
}

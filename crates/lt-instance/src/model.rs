use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::InstanceConfig;

/// Name of the per-instance record file
pub const INSTANCE_FILE: &str = "instance.json";

/// A named, self-contained installation configuration
///
/// `id` is allocated at construction and never changes. `path` and
/// `store_root` are populated by the owning [`InstanceStore`](crate::InstanceStore)
/// and describe where the record lives on disk; they are not part of the
/// serialized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceModel {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: InstanceConfig,
    #[serde(default)]
    pub mods: Vec<ModEntry>,
    pub last_modified: DateTime<Utc>,

    /// Directory holding this instance's record
    #[serde(skip)]
    pub path: PathBuf,

    /// Root of the owning store (non-owning association)
    #[serde(skip)]
    pub store_root: PathBuf,
}

impl InstanceModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            config: InstanceConfig::default(),
            mods: Vec::new(),
            last_modified: Utc::now(),
            path: PathBuf::new(),
            store_root: PathBuf::new(),
        }
    }

    /// Path of the serialized record file
    pub fn record_file(&self) -> PathBuf {
        self.path.join(INSTANCE_FILE)
    }
}

/// One installed mod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModEntry {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ModEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            file_name: None,
            enabled: true,
        }
    }
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_models_get_distinct_ids() {
        let a = InstanceModel::new("one");
        let b = InstanceModel::new("one");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn record_roundtrips_without_paths() {
        let mut model = InstanceModel::new("survival");
        model.path = PathBuf::from("/tmp/somewhere");
        model.store_root = PathBuf::from("/tmp");

        let json = serde_json::to_string(&model).unwrap();
        assert!(!json.contains("/tmp"));

        let parsed: InstanceModel = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, model.id);
        assert_eq!(parsed.name, "survival");
        assert_eq!(parsed.path, PathBuf::new());
    }

    #[test]
    fn mod_entry_enabled_defaults_to_true() {
        let parsed: ModEntry = serde_json::from_str(r#"{ "name": "sodium" }"#).unwrap();
        assert!(parsed.enabled);
        assert_eq!(parsed.version, None);
    }
}

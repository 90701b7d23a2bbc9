use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::model::{INSTANCE_FILE, InstanceModel, ModEntry};

/// CRUD manager over a directory of per-instance JSON records
///
/// Owns the in-memory `id -> model` mapping. Not designed for concurrent
/// access; callers serialize mutation themselves.
#[derive(Debug, Default, Clone)]
pub struct InstanceStore {
    root: PathBuf,
    instances: HashMap<Uuid, InstanceModel>,
}

impl InstanceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            instances: HashMap::new(),
        }
    }

    /// Platform default store root (`<data dir>/instances`)
    pub fn default_root() -> Result<PathBuf, InstanceStoreError> {
        let proj_dirs = directories::ProjectDirs::from("", "", "lantern-mc")
            .ok_or(InstanceStoreError::ProjectDirectoriesUnavailable)?;

        Ok(proj_dirs.data_dir().join("instances"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register a new instance: allocate its directory and write the record
    ///
    /// The directory name derives from the instance name; collisions with
    /// existing entries (compared case-insensitively) get a `" (n)"` suffix,
    /// so an existing instance directory is never overwritten.
    #[instrument(skip(self, model), fields(name = %model.name), level = "info")]
    pub async fn create(
        &mut self,
        mut model: InstanceModel,
    ) -> Result<InstanceModel, InstanceStoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .context("Failed to create store root")
            .map_err(|e| InstanceStoreError::DirectoryCreationFailed {
                path: self.root.clone(),
                source: e,
            })?;

        let dir_name = self.unique_dir_name(&model.name).await?;
        let instance_dir = self.root.join(&dir_name);

        tokio::fs::create_dir_all(&instance_dir)
            .await
            .context("Failed to create instance directory")
            .map_err(|e| InstanceStoreError::DirectoryCreationFailed {
                path: instance_dir.clone(),
                source: e,
            })?;

        model.path = instance_dir;
        model.store_root = self.root.clone();
        model.last_modified = Utc::now();

        self.write_record(&model).await?;

        info!(
            "Created instance '{}' at {}",
            model.name,
            model.path.display()
        );
        self.instances.insert(model.id, model.clone());

        Ok(model)
    }

    /// Overwrite the record for `id` in memory and on disk
    #[instrument(skip(self, model), level = "debug")]
    pub async fn save(
        &mut self,
        id: Uuid,
        mut model: InstanceModel,
    ) -> Result<InstanceModel, InstanceStoreError> {
        if model.path.as_os_str().is_empty() {
            // Model was constructed fresh; inherit the registered location
            let existing = self
                .instances
                .get(&id)
                .ok_or(InstanceStoreError::InstanceNotFound { id })?;
            model.path = existing.path.clone();
        }

        model.store_root = self.root.clone();
        model.last_modified = Utc::now();

        self.write_record(&model).await?;

        debug!("Saved instance '{}' ({})", model.name, id);
        self.instances.insert(id, model.clone());

        Ok(model)
    }

    /// Rebuild the mapping from disk
    ///
    /// Recursively scans the store root for `instance.json` files. Records
    /// that fail to read or parse are logged and skipped.
    #[instrument(skip(self), level = "info")]
    pub async fn load_all(&mut self) -> Result<(), InstanceStoreError> {
        info!("Loading instances from {}", self.root.display());
        self.instances.clear();

        let mut loaded_count = 0;
        let mut failed_count = 0;
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .context("Failed to read store directory")
                .map_err(|e| InstanceStoreError::DirectoryReadFailed {
                    path: dir.clone(),
                    source: e,
                })?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .context("Failed to read directory entry")
                .map_err(|e| InstanceStoreError::DirectoryReadFailed {
                    path: dir.clone(),
                    source: e,
                })?
            {
                let path = entry.path();

                if path.is_dir() {
                    pending.push(path);
                } else if path.file_name().and_then(|n| n.to_str()) == Some(INSTANCE_FILE) {
                    match self.read_record(&path).await {
                        Ok(model) => {
                            loaded_count += 1;
                            debug!("Loaded instance '{}' from {}", model.name, path.display());
                            self.instances.insert(model.id, model);
                        }
                        Err(e) => {
                            failed_count += 1;
                            warn!("Skipping unreadable record {}: {}", path.display(), e);
                        }
                    }
                }
            }
        }

        info!(
            "Finished loading instances: {} loaded, {} failed",
            loaded_count, failed_count
        );

        Ok(())
    }

    /// Load and register the record under `path`, or `None` if there is none
    #[instrument(skip(self), level = "debug")]
    pub async fn load_one(
        &mut self,
        path: &Path,
    ) -> Result<Option<InstanceModel>, InstanceStoreError> {
        let record_file = path.join(INSTANCE_FILE);
        if !record_file.exists() {
            return Ok(None);
        }

        let model = self.read_record(&record_file).await?;
        self.instances.insert(model.id, model.clone());

        Ok(Some(model))
    }

    /// Append a mod to the instance's list and save
    pub async fn add_mod(
        &mut self,
        id: Uuid,
        entry: ModEntry,
    ) -> Result<InstanceModel, InstanceStoreError> {
        let mut model = self
            .instances
            .get(&id)
            .ok_or(InstanceStoreError::InstanceNotFound { id })?
            .clone();

        model.mods.push(entry);
        self.save(id, model).await
    }

    /// All registered instances with this exact name
    pub fn by_name(&self, name: &str) -> Vec<&InstanceModel> {
        self.instances.values().filter(|i| i.name == name).collect()
    }

    /// First registered instance with this exact name
    pub fn first_by_name(&self, name: &str) -> Result<&InstanceModel, InstanceStoreError> {
        self.instances
            .values()
            .find(|i| i.name == name)
            .ok_or_else(|| InstanceStoreError::InstanceNameNotFound {
                name: name.to_string(),
            })
    }

    pub fn by_id(&self, id: &Uuid) -> Result<&InstanceModel, InstanceStoreError> {
        self.instances
            .get(id)
            .ok_or(InstanceStoreError::InstanceNotFound { id: *id })
    }

    pub fn exists(&self, name: &str) -> bool {
        self.instances.values().any(|i| i.name == name)
    }

    pub fn instances(&self) -> impl Iterator<Item = &InstanceModel> {
        self.instances.values()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Directory name for `name`, disambiguated against existing entries
    async fn unique_dir_name(&self, name: &str) -> Result<String, InstanceStoreError> {
        let base = sanitize_dir_name(name);

        let mut taken = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .context("Failed to read store root")
            .map_err(|e| InstanceStoreError::DirectoryReadFailed {
                path: self.root.clone(),
                source: e,
            })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .context("Failed to read directory entry")
            .map_err(|e| InstanceStoreError::DirectoryReadFailed {
                path: self.root.clone(),
                source: e,
            })?
        {
            taken.push(entry.file_name().to_string_lossy().to_lowercase());
        }

        if !taken.contains(&base.to_lowercase()) {
            return Ok(base);
        }

        let mut n = 1;
        loop {
            let candidate = format!("{base} ({n})");
            if !taken.contains(&candidate.to_lowercase()) {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    async fn read_record(&self, file: &Path) -> Result<InstanceModel, InstanceStoreError> {
        let content = tokio::fs::read(file)
            .await
            .context("Failed to read instance record")
            .map_err(|e| InstanceStoreError::InstanceFileReadFailed {
                path: file.to_path_buf(),
                source: e,
            })?;

        let mut model: InstanceModel = serde_json::from_slice(&content)
            .context("Failed to parse instance record")
            .map_err(|e| InstanceStoreError::InstanceParsingFailed {
                path: file.to_path_buf(),
                source: e,
            })?;

        model.path = file.parent().unwrap_or(&self.root).to_path_buf();
        model.store_root = self.root.clone();

        Ok(model)
    }

    async fn write_record(&self, model: &InstanceModel) -> Result<(), InstanceStoreError> {
        let json = serde_json::to_string_pretty(model)
            .context("Failed to serialize instance record")
            .map_err(|e| InstanceStoreError::InstanceSerializationFailed { source: e })?;

        let file = model.record_file();
        tokio::fs::write(&file, json)
            .await
            .context("Failed to write instance record")
            .map_err(|e| InstanceStoreError::InstanceFileWriteFailed {
                path: file.clone(),
                source: e,
            })?;

        Ok(())
    }
}

/// Strip characters that are not filesystem-legal on common platforms
fn sanitize_dir_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim_end_matches(['.', ' ']).trim_start();
    if trimmed.is_empty() {
        "instance".to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Error)]
pub enum InstanceStoreError {
    #[error("Project directories are unavailable on this platform")]
    ProjectDirectoriesUnavailable,

    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to read directory '{path}': {source}")]
    DirectoryReadFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to read instance record '{path}': {source}")]
    InstanceFileReadFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to write instance record '{path}': {source}")]
    InstanceFileWriteFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to parse instance record '{path}': {source}")]
    InstanceParsingFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to serialize instance record: {source}")]
    InstanceSerializationFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("No instance registered with id '{id}'")]
    InstanceNotFound { id: Uuid },

    #[error("No instance named '{name}'")]
    InstanceNameNotFound { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_disambiguates_directory_names() {
        let temp = tempdir().unwrap();
        let mut store = InstanceStore::new(temp.path());

        let a = store.create(InstanceModel::new("Test")).await.unwrap();
        let b = store.create(InstanceModel::new("Test")).await.unwrap();
        let c = store.create(InstanceModel::new("Test")).await.unwrap();

        assert_eq!(a.path, temp.path().join("Test"));
        assert_eq!(b.path, temp.path().join("Test (1)"));
        assert_eq!(c.path, temp.path().join("Test (2)"));

        assert!(a.record_file().exists());
        assert!(b.record_file().exists());
        assert!(c.record_file().exists());
    }

    #[tokio::test]
    async fn create_compares_directory_names_case_insensitively() {
        let temp = tempdir().unwrap();
        let mut store = InstanceStore::new(temp.path());

        store.create(InstanceModel::new("Test")).await.unwrap();
        let second = store.create(InstanceModel::new("test")).await.unwrap();

        assert_eq!(second.path, temp.path().join("test (1)"));
    }

    #[tokio::test]
    async fn create_sanitizes_illegal_directory_characters() {
        let temp = tempdir().unwrap();
        let mut store = InstanceStore::new(temp.path());

        let created = store.create(InstanceModel::new("a/b:c?")).await.unwrap();
        let dir_name = created.path.file_name().unwrap().to_string_lossy();

        assert!(!dir_name.contains('/'));
        assert!(!dir_name.contains(':'));
        assert!(!dir_name.contains('?'));
        assert!(created.record_file().exists());
    }

    #[tokio::test]
    async fn save_bumps_last_modified_and_rewrites_record() {
        let temp = tempdir().unwrap();
        let mut store = InstanceStore::new(temp.path());

        let created = store.create(InstanceModel::new("Survival")).await.unwrap();
        let before = created.last_modified;

        let mut edited = created.clone();
        edited.description = "main world".to_string();
        let saved = store.save(created.id, edited).await.unwrap();

        assert!(saved.last_modified >= before);
        assert_eq!(saved.description, "main world");

        let on_disk = std::fs::read_to_string(saved.record_file()).unwrap();
        let parsed: InstanceModel = serde_json::from_str(&on_disk).unwrap();
        assert_eq!(parsed.description, "main world");
        assert_eq!(parsed.last_modified, saved.last_modified);
    }

    #[tokio::test]
    async fn save_unknown_id_with_fresh_model_fails() {
        let temp = tempdir().unwrap();
        let mut store = InstanceStore::new(temp.path());

        let model = InstanceModel::new("ghost");
        let result = store.save(model.id, model).await;

        assert!(matches!(
            result,
            Err(InstanceStoreError::InstanceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn load_all_registers_valid_records_and_skips_malformed() {
        let temp = tempdir().unwrap();

        {
            let mut store = InstanceStore::new(temp.path());
            store.create(InstanceModel::new("One")).await.unwrap();
            store.create(InstanceModel::new("Two")).await.unwrap();
        }

        let broken_dir = temp.path().join("Broken");
        std::fs::create_dir_all(&broken_dir).unwrap();
        std::fs::write(broken_dir.join(INSTANCE_FILE), "not json {{{").unwrap();

        let mut store = InstanceStore::new(temp.path());
        store.load_all().await.unwrap();

        assert_eq!(store.instance_count(), 2);
        assert!(store.exists("One"));
        assert!(store.exists("Two"));
    }

    #[tokio::test]
    async fn load_all_finds_nested_records() {
        let temp = tempdir().unwrap();

        let nested = temp.path().join("group").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        let model = InstanceModel::new("Nested");
        std::fs::write(
            nested.join(INSTANCE_FILE),
            serde_json::to_string_pretty(&model).unwrap(),
        )
        .unwrap();

        let mut store = InstanceStore::new(temp.path());
        store.load_all().await.unwrap();

        assert_eq!(store.instance_count(), 1);
        let loaded = store.by_id(&model.id).unwrap();
        assert_eq!(loaded.path, nested);
        assert_eq!(loaded.store_root, temp.path());
    }

    #[tokio::test]
    async fn load_all_clears_previous_mapping() {
        let temp = tempdir().unwrap();
        let mut store = InstanceStore::new(temp.path());

        let created = store.create(InstanceModel::new("Gone")).await.unwrap();
        std::fs::remove_dir_all(&created.path).unwrap();

        store.load_all().await.unwrap();
        assert_eq!(store.instance_count(), 0);
    }

    #[tokio::test]
    async fn load_one_registers_record_and_missing_is_none() {
        let temp = tempdir().unwrap();

        let created = {
            let mut store = InstanceStore::new(temp.path());
            store.create(InstanceModel::new("Solo")).await.unwrap()
        };

        let mut store = InstanceStore::new(temp.path());
        let loaded = store.load_one(&created.path).await.unwrap().unwrap();
        assert_eq!(loaded.id, created.id);
        assert!(store.by_id(&created.id).is_ok());

        let missing = store.load_one(&temp.path().join("nope")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn add_mod_appends_and_persists() {
        let temp = tempdir().unwrap();
        let mut store = InstanceStore::new(temp.path());

        let created = store.create(InstanceModel::new("Modded")).await.unwrap();
        let updated = store
            .add_mod(created.id, ModEntry::new("sodium"))
            .await
            .unwrap();

        assert_eq!(updated.mods.len(), 1);
        assert_eq!(updated.mods[0].name, "sodium");

        let mut reloaded = InstanceStore::new(temp.path());
        let from_disk = reloaded.load_one(&created.path).await.unwrap().unwrap();
        assert_eq!(from_disk.mods.len(), 1);
    }

    #[tokio::test]
    async fn lookups_on_absent_keys_fail() {
        let temp = tempdir().unwrap();
        let mut store = InstanceStore::new(temp.path());
        store.create(InstanceModel::new("Known")).await.unwrap();

        assert!(matches!(
            store.by_id(&Uuid::new_v4()),
            Err(InstanceStoreError::InstanceNotFound { .. })
        ));
        assert!(matches!(
            store.first_by_name("Unknown"),
            Err(InstanceStoreError::InstanceNameNotFound { .. })
        ));
        assert!(store.first_by_name("Known").is_ok());
        assert!(store.exists("Known"));
        assert!(!store.exists("Unknown"));
    }

    #[tokio::test]
    async fn by_name_returns_all_matches() {
        let temp = tempdir().unwrap();
        let mut store = InstanceStore::new(temp.path());

        store.create(InstanceModel::new("Twin")).await.unwrap();
        store.create(InstanceModel::new("Twin")).await.unwrap();
        store.create(InstanceModel::new("Other")).await.unwrap();

        assert_eq!(store.by_name("Twin").len(), 2);
        assert_eq!(store.by_name("Other").len(), 1);
        assert!(store.by_name("None").is_empty());
    }

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_dir_name("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_dir_name("dots..."), "dots");
        assert_eq!(sanitize_dir_name("   "), "instance");
        assert_eq!(sanitize_dir_name("plain name"), "plain name");
    }
}

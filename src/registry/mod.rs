//! File-backed model registry
//!
//! Registered models live in one directory: a `registry.json` index plus
//! one artifact file per version. Versions are created at stage staging
//! and move to production only through an explicit transition, which
//! archives whatever held production before it. At most one version per
//! model name holds production at any time.
//!
//! Lookups that find nothing return `None`; a missing staged model is an
//! expected condition, not an error. Read-then-write transitions carry no
//! cross-process guard; concurrent promotions of the same name are an
//! acknowledged race inherited from the original design.

use crate::error::{PipelineError, Result};
use crate::types::{Stage, TaskKind, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "registry.json";

/// One registered model version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u32,
    pub task: TaskKind,
    pub stage: Stage,
    /// Artifact file name, relative to the registry root
    pub artifact: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryIndex {
    versions: Vec<ModelVersion>,
}

/// Directory-backed registry of model versions
pub struct ModelRegistry {
    root: PathBuf,
}

impl ModelRegistry {
    /// Open (or create) a registry rooted at the given directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let registry = Self { root };
        if !registry.index_path().is_file() {
            registry.save_index(&RegistryIndex::default())?;
        }
        Ok(registry)
    }

    /// Register a new version at stage staging and write its artifact
    pub fn register(&self, name: &str, task: TaskKind, artifact: &[u8]) -> Result<ModelVersion> {
        let mut index = self.load_index()?;

        let version = index
            .versions
            .iter()
            .filter(|v| v.name == name)
            .map(|v| v.version)
            .max()
            .unwrap_or(0)
            + 1;

        let artifact_name = format!("{name}-v{version}.json");
        fs::write(self.root.join(&artifact_name), artifact)?;

        let record = ModelVersion {
            name: name.to_string(),
            version,
            task,
            stage: Stage::Staging,
            artifact: artifact_name,
            created_at: Utc::now(),
        };
        index.versions.push(record.clone());
        self.save_index(&index)?;

        log::info!("registered {name} v{version} at stage staging");
        Ok(record)
    }

    /// All versions registered under a model name, oldest first
    pub fn versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        let index = self.load_index()?;
        let mut versions: Vec<ModelVersion> = index
            .versions
            .into_iter()
            .filter(|v| v.name == name)
            .collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    /// Latest version of a model at the given stage, if any
    pub fn latest(&self, name: &str, stage: Stage) -> Result<Option<ModelVersion>> {
        let index = self.load_index()?;
        Ok(index
            .versions
            .into_iter()
            .filter(|v| v.name == name && v.stage == stage)
            .max_by_key(|v| v.version))
    }

    /// Move a version to a new stage. Transitioning to production archives
    /// any version of the same name currently holding production.
    pub fn transition(&self, name: &str, version: u32, stage: Stage) -> Result<ModelVersion> {
        let mut index = self.load_index()?;

        if !index
            .versions
            .iter()
            .any(|v| v.name == name && v.version == version)
        {
            return Err(PipelineError::RegistryError(format!(
                "no version {version} registered for model '{name}'"
            )));
        }

        if stage == Stage::Production {
            for v in index
                .versions
                .iter_mut()
                .filter(|v| v.name == name && v.stage == Stage::Production)
            {
                v.stage = Stage::Archived;
            }
        }

        let mut updated = None;
        for v in index
            .versions
            .iter_mut()
            .filter(|v| v.name == name && v.version == version)
        {
            v.stage = stage;
            updated = Some(v.clone());
        }
        self.save_index(&index)?;

        let record = updated.ok_or_else(|| {
            PipelineError::RegistryError(format!(
                "no version {version} registered for model '{name}'"
            ))
        })?;
        log::info!("{name} v{version} transitioned to stage {stage}");
        Ok(record)
    }

    /// Read the artifact bytes for a version
    pub fn load_artifact(&self, record: &ModelVersion) -> Result<Vec<u8>> {
        Ok(fs::read(self.root.join(&record.artifact))?)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn load_index(&self) -> Result<RegistryIndex> {
        let raw = fs::read_to_string(self.index_path())?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_index(&self, index: &RegistryIndex) -> Result<()> {
        fs::write(self.index_path(), serde_json::to_string_pretty(index)?)?;
        Ok(())
    }
}

use crate::error::{PipelineError, Result};
use crate::models::{FlattenedDocuments, Role};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Store for flattened documents, keyed by dataset role
pub trait ArtifactCache {
    /// Store the documents for a role, replacing any previous artifact
    fn store(&self, role: Role, documents: &FlattenedDocuments) -> Result<()>;
    /// Load the documents stored for a role
    fn load(&self, role: Role) -> Result<FlattenedDocuments>;
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    role: Role,
    documents: FlattenedDocuments,
    stored_at: DateTime<Local>,
}

/// Sled-backed artifact cache; entries are bincode-encoded
pub struct SledArtifactCache {
    db: sled::Db,
}

impl SledArtifactCache {
    /// Open (or create) a cache in `directory`
    pub fn open(directory: &Path) -> Result<Self> {
        std::fs::create_dir_all(directory)?;
        let db = sled::open(directory)?;
        Ok(Self { db })
    }

    /// Cache that lives only as long as this value
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn make_key(role: Role) -> Vec<u8> {
        format!("flattened:{}", role.name()).into_bytes()
    }

    /// True if documents are stored for the role
    pub fn contains(&self, role: Role) -> Result<bool> {
        Ok(self.db.contains_key(Self::make_key(role))?)
    }

    /// When the documents for a role were stored
    pub fn stored_at(&self, role: Role) -> Result<Option<DateTime<Local>>> {
        match self.db.get(Self::make_key(role))? {
            Some(data) => {
                let entry: CacheEntry = bincode::deserialize(&data)?;
                Ok(Some(entry.stored_at))
            }
            None => Ok(None),
        }
    }

    /// Remove every stored artifact
    pub fn clear(&self) -> Result<()> {
        self.db.clear()?;
        self.db.flush()?;
        Ok(())
    }
}

impl ArtifactCache for SledArtifactCache {
    fn store(&self, role: Role, documents: &FlattenedDocuments) -> Result<()> {
        let entry = CacheEntry {
            role,
            documents: documents.clone(),
            stored_at: Local::now(),
        };

        let data = bincode::serialize(&entry)?;
        self.db.insert(Self::make_key(role), data)?;
        self.db.flush()?;

        info!(role = %role, documents = documents.len(), "Stored flattened documents");
        Ok(())
    }

    fn load(&self, role: Role) -> Result<FlattenedDocuments> {
        let data = self
            .db
            .get(Self::make_key(role))?
            .ok_or_else(|| PipelineError::CacheMiss(role.name().to_string()))?;
        let entry: CacheEntry = bincode::deserialize(&data)?;
        if entry.role != role {
            return Err(PipelineError::Cache(format!(
                "entry under {role} key holds {} documents",
                entry.role
            )));
        }
        Ok(entry.documents)
    }
}

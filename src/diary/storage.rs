use super::types::DiaryEntry;
use crate::{Result, TutorError};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const DIARY_FILE: &str = "diary.json";

/// In-memory diary log, newest entry first, optionally backed by a JSON file
#[derive(Debug, Clone)]
pub struct DiaryStore {
    entries: Arc<RwLock<Vec<DiaryEntry>>>,
    path: Option<PathBuf>,
}

impl DiaryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            path: None,
        }
    }

    /// Default location under the user data directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("study-buddy").join(DIARY_FILE))
    }

    /// Open the store at `path`, loading existing entries if the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|e| {
                TutorError::IOError(format!("Corrupt diary file {}: {}", path.display(), e))
            })?
        } else {
            Vec::new()
        };

        debug!("Diary opened at {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
            path: Some(path),
        })
    }

    /// Open the store at the default location
    pub fn open_default() -> Result<Self> {
        let path = Self::default_path()
            .ok_or_else(|| TutorError::ConfigError("No user data directory".to_string()))?;
        Self::open(path)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an entry as the newest
    pub fn add(&self, entry: DiaryEntry) {
        self.entries.write().insert(0, entry);
    }

    pub fn get_all(&self) -> Vec<DiaryEntry> {
        self.entries.read().clone()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Write the entries back to disk; no-op for purely in-memory stores
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&*self.entries.read())
            .map_err(|e| TutorError::IOError(format!("Failed to encode diary: {}", e)))?;
        fs::write(path, json)?;
        info!("Diary saved to {}", path.display());
        Ok(())
    }
}

impl Default for DiaryStore {
    fn default() -> Self {
        Self::new()
    }
}

use crate::HarvestError;
use std::fs;
use std::path::{Path, PathBuf};

/// Destination for downloaded page bodies
pub trait PageStore: Send + Sync {
    /// Stores `body` under `name`, returning where it was written
    fn save(&self, name: &str, body: &str) -> Result<PathBuf, HarvestError>;
}

/// Writes pages as files into one directory
///
/// The directory is created on first write.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl PageStore for FileStore {
    fn save(&self, name: &str, body: &str) -> Result<PathBuf, HarvestError> {
        fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(name);
        fs::write(&path, body)?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }
}

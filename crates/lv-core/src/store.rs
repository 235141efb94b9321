//! Object storage collaborators.
//!
//! This module defines the storage interface the job reads pings from and
//! uploads Parquet files to, plus a filesystem-backed implementation.

use crate::plan::ObjectDescriptor;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors returned by object stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("storage I/O error at {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

impl From<StoreError> for lv_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { key } => lv_common::Error::ObjectNotFound { key },
            StoreError::Io { source, .. } => lv_common::Error::Io(source),
        }
    }
}

/// Object storage interface.
pub trait ObjectStore: Send + Sync {
    /// Store name used for logs.
    fn name(&self) -> &str;

    /// Objects under `prefix`, ordered by key. A missing prefix lists nothing.
    fn list(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>, StoreError>;

    /// Open an object for reading.
    fn fetch(&self, key: &str) -> Result<Box<dyn Read + Send>, StoreError>;

    /// Whether anything exists under `prefix`.
    fn exists(&self, prefix: &str) -> Result<bool, StoreError> {
        Ok(!self.list(prefix)?.is_empty())
    }

    /// Move a local file under `dest_prefix` with a fresh unique name.
    /// Returns the new key. The local file is removed.
    fn upload(&self, local: &Path, dest_prefix: &str) -> Result<String, StoreError>;
}

fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Store rooted at a local directory. Keys are `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn walk(
        &self,
        dir: &Path,
        key: &str,
        out: &mut Vec<ObjectDescriptor>,
    ) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_key = join_key(key, &name);
            let file_type = entry.file_type().map_err(io_err)?;
            if file_type.is_dir() {
                self.walk(&entry.path(), &child_key, out)?;
            } else if file_type.is_file() {
                let size = entry.metadata().map_err(io_err)?.len();
                out.push(ObjectDescriptor::new(child_key, size));
            }
        }
        Ok(())
    }
}

impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>, StoreError> {
        let dir = self.path_of(prefix);
        let mut objects = Vec::new();
        if dir.is_dir() {
            self.walk(&dir, prefix.trim_end_matches('/'), &mut objects)?;
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(store = self.name(), prefix, objects = objects.len(), "listed prefix");
        Ok(objects)
    }

    fn fetch(&self, key: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        match File::open(self.path_of(key)) {
            Ok(file) => Ok(Box::new(io::BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn upload(&self, local: &Path, dest_prefix: &str) -> Result<String, StoreError> {
        let extension = local
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let key = join_key(dest_prefix, &format!("{}{extension}", uuid::Uuid::new_v4()));
        let dest = self.path_of(&key);
        let io_err = |source| StoreError::Io {
            key: key.clone(),
            source,
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::copy(local, &dest).map_err(io_err)?;
        fs::remove_file(local).map_err(io_err)?;
        debug!(store = self.name(), key = %key, "uploaded");
        Ok(key)
    }
}

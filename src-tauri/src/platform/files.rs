use crate::error::{ReceiptError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// App-private file storage for image bytes.
pub trait FileStorage: Send + Sync {
    /// Writes `bytes` under `name` and returns the stored file's URI.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<String>;
    /// Reads a file by bare name, absolute path, or `file://` URI.
    fn read(&self, path: &str) -> Result<Vec<u8>>;
    fn exists(&self, path: &str) -> bool;
    fn remove(&self, path: &str) -> Result<()>;
}

/// A directory on the local file system (the app data directory in the shell).
#[derive(Debug, Clone)]
pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| ReceiptError::io(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a stored path back onto the file system. Bare names resolve inside
    /// the root; absolute paths and `file://` URIs are taken as-is.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let stripped = strip_file_scheme(path);
        let candidate = Path::new(stripped);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }
}

impl FileStorage for DataDirectory {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<String> {
        validate_file_name(name)?;
        let path = self.root.join(name);
        fs::write(&path, bytes).map_err(|e| ReceiptError::io(path.display().to_string(), e))?;
        Ok(file_uri(&path))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let resolved = self.resolve(path);
        fs::read(&resolved).map_err(|e| ReceiptError::io(resolved.display().to_string(), e))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn remove(&self, path: &str) -> Result<()> {
        let resolved = self.resolve(path);
        fs::remove_file(&resolved).map_err(|e| ReceiptError::io(resolved.display().to_string(), e))
    }
}

pub fn file_uri(path: &Path) -> String {
    let display = path.to_string_lossy().replace('\\', "/");
    if display.starts_with('/') {
        format!("file://{display}")
    } else {
        format!("file:///{display}")
    }
}

pub fn strip_file_scheme(path: &str) -> &str {
    let Some(rest) = path.strip_prefix("file://") else {
        return path;
    };

    // file:///C:/x on Windows
    match rest.strip_prefix('/') {
        Some(drive) if is_drive_prefixed(drive) => drive,
        _ => rest,
    }
}

fn is_drive_prefixed(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(ReceiptError::Validation(format!(
            "'{name}' is not a plain file name"
        )));
    }
    Ok(())
}

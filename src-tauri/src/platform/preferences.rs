use crate::error::{ReceiptError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Whole-value key/value store. There is no partial update: `set` replaces
/// whatever was under the key.
pub trait Preferences: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Preferences kept in a single JSON object on disk (`preferences.json`).
///
/// The map is cached in memory and written through on every change. Writes go
/// to a sibling temp file that is renamed over the original, so a crash mid
/// write leaves the previous file intact.
#[derive(Debug)]
pub struct JsonFilePreferences {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFilePreferences {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ReceiptError::io(parent.display().to_string(), e))?;
        }

        let values = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| ReceiptError::io(path.display().to_string(), e))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| {
                    ReceiptError::Config(format!(
                        "Failed to parse {}: {e}",
                        path.display()
                    ))
                })?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| ReceiptError::io(tmp.display().to_string(), e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| ReceiptError::io(self.path.display().to_string(), e))
    }
}

impl Preferences for JsonFilePreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut next = self.values.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        self.values = next;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if !self.values.contains_key(key) {
            return Ok(());
        }
        let mut next = self.values.clone();
        next.remove(key);
        self.flush(&next)?;
        self.values = next;
        Ok(())
    }
}

/// Process-local preferences. Nothing survives a restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: BTreeMap<String, String>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let mut prefs = Self::default();
        prefs.values.insert(key.to_string(), value.to_string());
        prefs
    }
}

impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_preferences_survive_reopen() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("preferences.json");

        let mut prefs = JsonFilePreferences::open(&path).expect("open prefs");
        assert_eq!(prefs.get("photos").expect("read entry"), None);
        prefs.set("photos", "[]").expect("set preference");
        prefs.set("other", "x").expect("set preference");
        prefs.remove("other").expect("remove entry");

        let reopened = JsonFilePreferences::open(&path).expect("open prefs");
        assert_eq!(reopened.get("photos").expect("read entry").as_deref(), Some("[]"));
        assert_eq!(reopened.get("other").expect("read entry"), None);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn unreadable_preferences_file_is_reported() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{not json").expect("write file");

        let err = JsonFilePreferences::open(&path).expect_err("corrupt prefs file");
        assert!(err.to_string().starts_with("CONFIG:"));
    }
}

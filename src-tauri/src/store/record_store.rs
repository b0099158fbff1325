use super::filter::{FilterMode, FilteredView};
use super::view_state::ViewState;
use crate::error::{ReceiptError, Result};
use crate::models::photo::PhotoRecord;
use crate::platform::preferences::Preferences;
use crate::platform::resolver::PathResolver;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// What `load_all` does when the stored value does not decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptStorePolicy {
    /// Back up the raw value and return `CorruptStore`.
    #[default]
    Fail,
    /// Back up the raw value and start over with an empty collection.
    Reset,
}

/// Ordered receipt collection (newest first) mirrored to one preferences key.
///
/// Every mutation is applied to a copy, the copy is serialized and written as
/// a whole, and only then does it replace the in-memory collection. A failed
/// write leaves memory and storage in agreement.
pub struct RecordStore {
    prefs: Box<dyn Preferences>,
    key: String,
    policy: CorruptStorePolicy,
    keep_display_paths: bool,
    records: Vec<PhotoRecord>,
    view: ViewState,
    poisoned: Option<Poisoned>,
}

/// Set when a load failed under `CorruptStorePolicy::Fail`. Writes would
/// replace the undecodable value, so they are refused until `reset_corrupt`
/// or a clean `load_all`.
#[derive(Debug, Clone)]
struct Poisoned {
    backup_key: String,
    reason: String,
}

impl RecordStore {
    pub fn new(prefs: Box<dyn Preferences>, key: impl Into<String>) -> Self {
        Self {
            prefs,
            key: key.into(),
            policy: CorruptStorePolicy::default(),
            keep_display_paths: true,
            records: Vec::new(),
            view: ViewState::default(),
            poisoned: None,
        }
    }

    pub fn with_policy(mut self, policy: CorruptStorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Session-only display paths (browser blob URIs) must not be persisted.
    pub fn keep_display_paths(mut self, keep: bool) -> Self {
        self.keep_display_paths = keep;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// First backup slot for an undecodable value. Later, different values
    /// go to `<key>.corrupt.<millis>`.
    pub fn backup_key(&self) -> String {
        format!("{}.corrupt", self.key)
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Refuses writes while a failed load is unresolved.
    pub fn ensure_writable(&self) -> Result<()> {
        match &self.poisoned {
            Some(p) => Err(ReceiptError::CorruptStore {
                key: self.key.clone(),
                backup_key: p.backup_key.clone(),
                reason: p.reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Drops the undecodable value (its backup stays) and starts empty.
    pub fn reset_corrupt(&mut self) -> Result<()> {
        if let Some(p) = self.poisoned.take() {
            self.prefs.remove(&self.key)?;
            warn!("Discarded undecodable receipts under '{}'; backup kept at '{}'", self.key, p.backup_key);
        }
        self.records.clear();
        self.view.clear();
        Ok(())
    }

    /// Replaces the in-memory collection with what is stored, then lets the
    /// resolver fill in display paths. Returns the number of records loaded.
    pub fn load_all(&mut self, resolver: &dyn PathResolver) -> Result<usize> {
        self.records.clear();
        self.view.clear();
        self.poisoned = None;

        let mut records = match self.prefs.get(&self.key)? {
            Some(raw) if !raw.trim().is_empty() => match serde_json::from_str::<Vec<PhotoRecord>>(&raw) {
                Ok(records) => records,
                Err(e) => self.recover_corrupt(&raw, e)?,
            },
            _ => Vec::new(),
        };

        for record in records.iter_mut() {
            if let Err(e) = resolver.hydrate(record) {
                warn!("Could not prepare image for {}: {e}", record.storage_path);
            }
        }

        info!("Loaded {} receipts from '{}'", records.len(), self.key);
        self.records = records;
        Ok(self.records.len())
    }

    fn recover_corrupt(&mut self, raw: &str, err: serde_json::Error) -> Result<Vec<PhotoRecord>> {
        let backup_key = self.store_backup(raw)?;
        warn!(
            "Stored receipts under '{}' do not decode ({err}); raw value copied to '{backup_key}'",
            self.key
        );

        match self.policy {
            CorruptStorePolicy::Fail => {
                self.poisoned = Some(Poisoned {
                    backup_key,
                    reason: err.to_string(),
                });
                self.ensure_writable()?;
                Ok(Vec::new())
            }
            CorruptStorePolicy::Reset => {
                self.prefs.remove(&self.key)?;
                Ok(Vec::new())
            }
        }
    }

    /// Copies `raw` to a backup key without ever replacing an earlier backup.
    /// Reloading the same bad value reuses the slot that already holds it.
    fn store_backup(&mut self, raw: &str) -> Result<String> {
        let first = self.backup_key();
        match self.prefs.get(&first)? {
            None => {
                self.prefs.set(&first, raw)?;
                return Ok(first);
            }
            Some(existing) if existing == raw => return Ok(first),
            Some(_) => {}
        }

        let base = format!("{first}.{}", chrono::Utc::now().timestamp_millis());
        let mut candidate = base.clone();
        let mut n = 1;
        loop {
            match self.prefs.get(&candidate)? {
                None => break,
                Some(existing) if existing == raw => return Ok(candidate),
                Some(_) => {
                    candidate = format!("{base}_{n}");
                    n += 1;
                }
            }
        }
        self.prefs.set(&candidate, raw)?;
        Ok(candidate)
    }

    /// Prepends a record and persists.
    pub fn add(&mut self, record: PhotoRecord) -> Result<()> {
        self.ensure_writable()?;
        if self.position(&record.storage_path).is_some() {
            return Err(ReceiptError::Validation(format!(
                "a receipt stored at '{}' already exists",
                record.storage_path
            )));
        }

        debug!("add {}", record.storage_path);
        let mut next = self.records.clone();
        next.insert(0, record);
        self.commit(next)
    }

    /// Marks a record claimed. Rejected without any write unless both amount
    /// and category are filled in.
    pub fn set_claimed(&mut self, key: &str) -> Result<()> {
        self.ensure_writable()?;
        let index = self.require(key)?;
        if !self.records[index].is_claimable() {
            return Err(ReceiptError::Validation(
                "amount and category are required before claiming".to_string(),
            ));
        }

        debug!("claim {key}");
        let mut next = self.records.clone();
        next[index].claimed = true;
        self.commit(next)
    }

    /// Updates amount and category. A zero or non-finite amount and a blank
    /// category count as unset.
    pub fn set_details(&mut self, key: &str, amount: Option<f64>, category: Option<String>) -> Result<()> {
        self.ensure_writable()?;
        let index = self.require(key)?;
        let amount = amount.filter(|a| a.is_finite() && *a != 0.0);
        let category = category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if self.records[index].claimed && (amount.is_none() || category.is_none()) {
            return Err(ReceiptError::Validation(
                "a claimed receipt must keep its amount and category".to_string(),
            ));
        }

        debug!("edit {key}");
        let mut next = self.records.clone();
        next[index].amount = amount;
        next[index].category = category;
        self.commit(next)
    }

    /// Removes the record stored at `key` and persists.
    pub fn remove(&mut self, key: &str) -> Result<PhotoRecord> {
        self.ensure_writable()?;
        let index = self.require(key)?;

        debug!("remove {key}");
        let mut next = self.records.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        self.view.forget(key);
        Ok(removed)
    }

    /// Flips edit mode for a record. Edit mode is session state; nothing is
    /// written.
    pub fn toggle_editing(&mut self, key: &str) -> Result<bool> {
        self.require(key)?;
        Ok(self.view.toggle_editing(key))
    }

    pub fn is_editing(&self, key: &str) -> bool {
        self.view.is_editing(key)
    }

    pub fn records(&self) -> &[PhotoRecord] {
        &self.records
    }

    pub fn snapshot(&self) -> Vec<PhotoRecord> {
        self.records.clone()
    }

    pub fn get(&self, key: &str) -> Option<&PhotoRecord> {
        self.position(key).map(|i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn filter(&self, mode: FilterMode) -> FilteredView<'_> {
        FilteredView::new(&self.records, mode)
    }

    /// Storage key of the record at `index` within the `mode` view.
    pub fn key_at(&self, mode: FilterMode, index: usize) -> Result<String> {
        self.filter(mode)
            .key_at(index)
            .map(str::to_string)
            .ok_or_else(|| ReceiptError::NotFound(format!("no {mode:?} receipt at position {index}")))
    }

    /// Sum of every entered amount, claimed or not.
    pub fn total_amount(&self) -> f64 {
        self.sum_where(FilterMode::All)
    }

    pub fn claimed_total(&self) -> f64 {
        self.sum_where(FilterMode::Claimed)
    }

    pub fn unclaimed_total(&self) -> f64 {
        self.sum_where(FilterMode::Unclaimed)
    }

    fn sum_where(&self, mode: FilterMode) -> f64 {
        self.filter(mode).iter().filter_map(|r| r.amount).sum()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.records.iter().position(|r| r.storage_path == key)
    }

    fn require(&self, key: &str) -> Result<usize> {
        self.position(key)
            .ok_or_else(|| ReceiptError::NotFound(format!("no receipt stored at '{key}'")))
    }

    fn commit(&mut self, next: Vec<PhotoRecord>) -> Result<()> {
        let raw = self.serialize(&next)?;
        self.prefs.set(&self.key, &raw)?;
        self.records = next;
        Ok(())
    }

    fn serialize(&self, records: &[PhotoRecord]) -> Result<String> {
        if self.keep_display_paths {
            return Ok(serde_json::to_string(records)?);
        }

        let stripped: Vec<PhotoRecord> = records
            .iter()
            .cloned()
            .map(|mut r| {
                r.display_path = None;
                r
            })
            .collect();
        Ok(serde_json::to_string(&stripped)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::photo::SavedImage;
    use crate::platform::camera::BlobRegistry;
    use crate::platform::files::{DataDirectory, FileStorage};
    use crate::platform::preferences::{JsonFilePreferences, MemoryPreferences};
    use crate::platform::resolver::{BrowserResolver, NativeResolver};
    use std::sync::Arc;

    fn record(path: &str, at: i64) -> PhotoRecord {
        PhotoRecord::from_saved(
            SavedImage {
                storage_path: path.to_string(),
                display_path: Some(format!("asset://localhost/{path}")),
            },
            at,
        )
    }

    fn native() -> (tempfile::TempDir, NativeResolver) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let files = Arc::new(DataDirectory::open(dir.path()).expect("open data dir"));
        (dir, NativeResolver::new(files))
    }

    #[test]
    fn add_prepends_newest_first() {
        let mut store = RecordStore::new(Box::new(MemoryPreferences::new()), "photos");
        store.add(record("a", 1)).expect("add record");
        store.add(record("b", 2)).expect("add record");

        let keys: Vec<_> = store.records().iter().map(|r| r.storage_path.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn duplicate_storage_path_is_rejected() {
        let mut store = RecordStore::new(Box::new(MemoryPreferences::new()), "photos");
        store.add(record("a", 1)).expect("add record");
        assert!(store.add(record("a", 2)).expect_err("duplicate storage path").is_validation());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_details_normalizes_blank_values() {
        let mut store = RecordStore::new(Box::new(MemoryPreferences::new()), "photos");
        store.add(record("a", 1)).expect("add record");
        store
            .set_details("a", Some(0.0), Some("  ".to_string()))
            .expect("set details");
        let a = store.get("a").expect("record present");
        assert_eq!(a.amount, None);
        assert_eq!(a.category, None);

        store
            .set_details("a", Some(4.2), Some(" lunch ".to_string()))
            .expect("set details");
        assert_eq!(store.get("a").expect("record present").category.as_deref(), Some("lunch"));
    }

    #[test]
    fn claimed_receipt_cannot_lose_required_fields() {
        let mut store = RecordStore::new(Box::new(MemoryPreferences::new()), "photos");
        store.add(record("a", 1)).expect("add record");
        store.set_details("a", Some(9.0), Some("taxi".to_string())).expect("set details");
        store.set_claimed("a").expect("claim");

        let err = store
            .set_details("a", None, Some("taxi".to_string()))
            .expect_err("clear amount on a claimed receipt");
        assert!(err.is_validation());
        assert_eq!(store.get("a").expect("record present").amount, Some(9.0));
    }

    #[test]
    fn totals_split_by_claim_status() {
        let mut store = RecordStore::new(Box::new(MemoryPreferences::new()), "photos");
        store.add(record("a", 1)).expect("add record");
        store.add(record("b", 2)).expect("add record");
        store.set_details("a", Some(10.0), Some("fuel".to_string())).expect("set details");
        store.set_details("b", Some(2.5), None).expect("set details");
        store.set_claimed("a").expect("claim");

        assert_eq!(store.total_amount(), 12.5);
        assert_eq!(store.claimed_total(), 10.0);
        assert_eq!(store.unclaimed_total(), 2.5);
    }

    #[test]
    fn missing_key_loads_empty() {
        let (_dir, resolver) = native();
        let mut store = RecordStore::new(Box::new(MemoryPreferences::new()), "photos");
        assert_eq!(store.load_all(&resolver).expect("load store"), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn session_display_paths_are_not_persisted() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let files = Arc::new(DataDirectory::open(dir.path().join("data")).expect("open data dir"));
        files.write("a.jpeg", b"img").expect("write file");
        let browser = BrowserResolver::new(files, Arc::new(BlobRegistry::new()));
        let prefs_path = dir.path().join("preferences.json");

        {
            let prefs = JsonFilePreferences::open(&prefs_path).expect("open prefs");
            let mut store = RecordStore::new(Box::new(prefs), "photos").keep_display_paths(false);
            store.add(record("a.jpeg", 1)).expect("add record");
            assert!(store.records()[0].display_path.is_some());
        }

        let prefs = JsonFilePreferences::open(&prefs_path).expect("open prefs");
        let raw = prefs.get("photos").expect("read entry").expect("stored collection");
        assert!(!raw.contains("webviewPath"));

        let mut reloaded = RecordStore::new(Box::new(prefs), "photos").keep_display_paths(false);
        reloaded.load_all(&browser).expect("load store");
        assert_eq!(
            reloaded.records()[0].display_path.as_deref(),
            Some("data:image/jpeg;base64,aW1n")
        );
    }
}

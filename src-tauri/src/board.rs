use crate::capture::CapturePipeline;
use crate::commands::settings::{EffectiveSettings, ImageFormat, PreferencesBackend};
use crate::error::{ReceiptError, Result};
use crate::feedback::{Notifier, Toast, ToastTone};
use crate::models::photo::PhotoRecord;
use crate::platform::camera::{BlobFetcher, Camera};
use crate::platform::files::{DataDirectory, FileStorage};
use crate::platform::preferences::{JsonFilePreferences, Preferences};
use crate::platform::resolver::{select_resolver, PathResolver};
use crate::platform::sqlite::SqlitePreferences;
use crate::store::{FilterMode, RecordStore};
use log::warn;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CLAIM_NEEDS_DETAILS: &str = "Please select type and enter amount before claiming.";
const PHOTO_DELETED: &str = "Photo deleted successfully.";
const IMAGE_UNAVAILABLE: &str = "Could not open receipt image";

/// A record as the list screen shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptCard {
    #[serde(flatten)]
    pub record: PhotoRecord,
    pub editing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total: f64,
    pub claimed: f64,
    pub unclaimed: f64,
    pub count: usize,
}

/// Settings the webview passes to the camera plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    pub quality: u8,
    pub format: ImageFormat,
}

/// Receipt list screen: one filter, positions relative to that filter, and a
/// toast for every outcome the user should hear about.
pub struct ReceiptBoard {
    store: RecordStore,
    pipeline: CapturePipeline,
    resolver: Arc<dyn PathResolver>,
    files: Arc<dyn FileStorage>,
    notifier: Arc<dyn Notifier>,
    filter: FilterMode,
    toast_duration_ms: u64,
    capture_options: CaptureOptions,
}

impl ReceiptBoard {
    pub fn new(
        store: RecordStore,
        pipeline: CapturePipeline,
        resolver: Arc<dyn PathResolver>,
        files: Arc<dyn FileStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            pipeline,
            resolver,
            files,
            notifier,
            filter: FilterMode::All,
            toast_duration_ms: 2000,
            capture_options: CaptureOptions {
                quality: 100,
                format: ImageFormat::Jpeg,
            },
        }
    }

    /// Wires storage, preferences and the runtime-specific resolver from
    /// settings. Images live in `<data_dir>/images`; native captures are only
    /// accepted from inside `capture_roots`.
    pub fn open(
        data_dir: &Path,
        settings: &EffectiveSettings,
        notifier: Arc<dyn Notifier>,
        blobs: Arc<dyn BlobFetcher>,
        capture_roots: &[PathBuf],
    ) -> Result<Self> {
        let files: Arc<dyn FileStorage> = Arc::new(DataDirectory::open(data_dir.join("images"))?);

        let prefs: Box<dyn Preferences> = match settings.preferences_backend {
            PreferencesBackend::Json => {
                Box::new(JsonFilePreferences::open(data_dir.join("preferences.json"))?)
            }
            PreferencesBackend::Sqlite => {
                Box::new(SqlitePreferences::open(&data_dir.join("preferences.db"))?)
            }
        };

        let runtime = settings.runtime.resolve();
        let resolver = select_resolver(runtime, files.clone(), blobs, capture_roots);
        log::info!("Receipt board on {runtime:?} runtime, data in {}", data_dir.display());

        let store = RecordStore::new(prefs, settings.storage_key.clone())
            .with_policy(settings.corrupt_store_policy)
            .keep_display_paths(resolver.persists_display_path());
        let pipeline = CapturePipeline::new(resolver.clone(), files.clone())
            .with_naming(settings.filename_prefix.clone(), settings.image_format.extension());

        let mut board = Self::new(store, pipeline, resolver, files, notifier);
        board.toast_duration_ms = settings.toast_duration_ms;
        board.capture_options = CaptureOptions {
            quality: settings.image_quality,
            format: settings.image_format,
        };
        Ok(board)
    }

    pub fn load(&mut self) -> Result<usize> {
        self.store.load_all(self.resolver.as_ref())
    }

    /// Starts over after a failed load. The undecodable value stays in its
    /// backup key.
    pub fn reset_store(&mut self) -> Result<()> {
        self.store.reset_corrupt()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn capture_options(&self) -> &CaptureOptions {
        &self.capture_options
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn set_filter(&mut self, mode: FilterMode) {
        self.filter = mode;
    }

    pub fn visible(&self) -> Vec<ReceiptCard> {
        self.store
            .filter(self.filter)
            .iter()
            .map(|record| ReceiptCard {
                editing: self.store.is_editing(&record.storage_path),
                record: record.clone(),
            })
            .collect()
    }

    pub fn capture(&mut self, camera: &dyn Camera) -> Result<PhotoRecord> {
        self.pipeline.capture(camera, &mut self.store)
    }

    pub fn capture_at(&mut self, camera: &dyn Camera, captured_at: i64) -> Result<PhotoRecord> {
        self.pipeline.capture_at(camera, &mut self.store, captured_at)
    }

    /// Claims the receipt at `index` in the current view. Returns `Ok(false)`
    /// when amount or category is missing; the user is told and nothing is
    /// written.
    pub fn claim(&mut self, index: usize) -> Result<bool> {
        let key = self.store.key_at(self.filter, index)?;
        match self.store.set_claimed(&key) {
            Ok(()) => {
                self.notify(format!("Receipt {} claimed successfully!", index + 1), ToastTone::Success);
                Ok(true)
            }
            Err(ReceiptError::Validation(_)) => {
                self.notify(CLAIM_NEEDS_DETAILS, ToastTone::Warning);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes the receipt at `index` in the current view, then its image.
    pub fn delete(&mut self, index: usize) -> Result<PhotoRecord> {
        let key = self.store.key_at(self.filter, index)?;
        let removed = self.store.remove(&key)?;

        if let Err(e) = self.files.remove(&removed.storage_path) {
            warn!("Receipt removed but its image could not be deleted: {e}");
        }

        self.notify(PHOTO_DELETED, ToastTone::Success);
        Ok(removed)
    }

    pub fn toggle_editing(&mut self, index: usize) -> Result<bool> {
        let key = self.store.key_at(self.filter, index)?;
        self.store.toggle_editing(&key)
    }

    pub fn update_details(
        &mut self,
        index: usize,
        amount: Option<f64>,
        category: Option<String>,
    ) -> Result<PhotoRecord> {
        let key = self.store.key_at(self.filter, index)?;
        if let Err(e) = self.store.set_details(&key, amount, category) {
            if let ReceiptError::Validation(message) = &e {
                self.notify(message.clone(), ToastTone::Warning);
            }
            return Err(e);
        }

        self.store
            .get(&key)
            .cloned()
            .ok_or_else(|| ReceiptError::NotFound(key))
    }

    /// Source for the full-size image viewer.
    pub fn view_image(&self, index: usize) -> Result<String> {
        let source = self
            .store
            .filter(self.filter)
            .get(index)
            .ok_or_else(|| ReceiptError::NotFound(format!("no receipt at position {index}")))
            .and_then(|record| self.resolver.image_source(record));

        if let Err(e) = &source {
            warn!("Error opening image: {e}");
            self.notify(IMAGE_UNAVAILABLE, ToastTone::Danger);
        }
        source
    }

    pub fn totals(&self) -> Totals {
        Totals {
            total: self.store.total_amount(),
            claimed: self.store.claimed_total(),
            unclaimed: self.store.unclaimed_total(),
            count: self.store.len(),
        }
    }

    fn notify(&self, message: impl Into<String>, tone: ToastTone) {
        self.notifier.toast(Toast {
            message: message.into(),
            tone,
            duration_ms: self.toast_duration_ms,
        });
    }
}

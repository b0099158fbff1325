use crate::error::Result;
use crate::models::photo::PhotoRecord;
use crate::platform::camera::Camera;
use crate::platform::files::FileStorage;
use crate::platform::resolver::PathResolver;
use crate::store::RecordStore;
use log::{info, warn};
use std::sync::Arc;

/// Camera -> file -> record -> store.
///
/// A record is only built once its image is safely on disk, and if the store
/// refuses the record the image is removed again.
pub struct CapturePipeline {
    resolver: Arc<dyn PathResolver>,
    files: Arc<dyn FileStorage>,
    prefix: String,
    extension: String,
}

impl CapturePipeline {
    pub fn new(resolver: Arc<dyn PathResolver>, files: Arc<dyn FileStorage>) -> Self {
        Self {
            resolver,
            files,
            prefix: "receipt_".to_string(),
            extension: "jpeg".to_string(),
        }
    }

    pub fn with_naming(mut self, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.extension = extension.into();
        self
    }

    pub fn capture(&self, camera: &dyn Camera, store: &mut RecordStore) -> Result<PhotoRecord> {
        self.capture_at(camera, store, chrono::Utc::now().timestamp_millis())
    }

    pub fn capture_at(
        &self,
        camera: &dyn Camera,
        store: &mut RecordStore,
        captured_at: i64,
    ) -> Result<PhotoRecord> {
        store.ensure_writable()?;
        let photo = camera.capture()?;
        let file_name = self.file_name_for(captured_at);
        let saved = self.resolver.persist(&photo, &file_name)?;
        let record = PhotoRecord::from_saved(saved, captured_at);

        if let Err(e) = store.add(record.clone()) {
            if let Err(cleanup) = self.files.remove(&record.storage_path) {
                warn!("Could not remove unsaved image {}: {cleanup}", record.storage_path);
            }
            return Err(e);
        }

        info!("Captured receipt {}", record.storage_path);
        Ok(record)
    }

    /// `{prefix}{millis}.{ext}`, with a numeric suffix when two captures land
    /// on the same millisecond.
    pub fn file_name_for(&self, captured_at: i64) -> String {
        let base = format!("{}{}", self.prefix, captured_at);
        let mut candidate = format!("{base}.{}", self.extension);
        let mut n = 1;
        while self.files.exists(&candidate) {
            candidate = format!("{base}_{n}.{}", self.extension);
            n += 1;
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::camera::BlobRegistry;
    use crate::platform::files::DataDirectory;
    use crate::platform::resolver::BrowserResolver;

    #[test]
    fn file_names_do_not_collide() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let files: Arc<dyn FileStorage> = Arc::new(DataDirectory::open(dir.path()).expect("open data dir"));
        let resolver = Arc::new(BrowserResolver::new(files.clone(), Arc::new(BlobRegistry::new())));
        let pipeline = CapturePipeline::new(resolver, files.clone());

        assert_eq!(pipeline.file_name_for(42), "receipt_42.jpeg");
        files.write("receipt_42.jpeg", b"x").expect("write file");
        assert_eq!(pipeline.file_name_for(42), "receipt_42_1.jpeg");
        files.write("receipt_42_1.jpeg", b"x").expect("write file");
        assert_eq!(pipeline.file_name_for(42), "receipt_42_2.jpeg");
    }
}

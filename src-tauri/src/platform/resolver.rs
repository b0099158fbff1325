use super::camera::BlobFetcher;
use super::files::{strip_file_scheme, FileStorage};
use crate::error::{ReceiptError, Result};
use crate::models::photo::{CapturedPhoto, PhotoRecord, SavedImage};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which shell the core is running under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// Packaged app with direct file-system access.
    Native,
    /// Sandboxed browser with blob-only file access.
    Browser,
}

impl Runtime {
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            Runtime::Browser
        } else {
            Runtime::Native
        }
    }
}

/// Bridges the file-path conventions of the two runtimes. One implementation
/// is picked at startup; nothing else branches on the runtime.
pub trait PathResolver: Send + Sync {
    fn runtime(&self) -> Runtime;

    /// Copies the captured image into app storage under `file_name`.
    fn persist(&self, photo: &CapturedPhoto, file_name: &str) -> Result<SavedImage>;

    /// Fills in a display path for a record loaded from preferences.
    fn hydrate(&self, record: &mut PhotoRecord) -> Result<()>;

    /// Image source for the full-size viewer.
    fn image_source(&self, record: &PhotoRecord) -> Result<String>;

    /// Whether display paths are stable across sessions and worth persisting.
    fn persists_display_path(&self) -> bool;
}

/// `capture_roots` lists the directories the native camera may hand files
/// from; it is ignored under the browser runtime.
pub fn select_resolver(
    runtime: Runtime,
    files: Arc<dyn FileStorage>,
    blobs: Arc<dyn BlobFetcher>,
    capture_roots: &[PathBuf],
) -> Arc<dyn PathResolver> {
    match runtime {
        Runtime::Native => {
            Arc::new(NativeResolver::new(files).with_capture_roots(capture_roots.iter().cloned()))
        }
        Runtime::Browser => Arc::new(BrowserResolver::new(files, blobs)),
    }
}

/// How native file paths are exposed to the webview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetUrlStyle {
    /// `asset://localhost/<path>` (macOS, iOS, Linux)
    CustomScheme,
    /// `http://asset.localhost/<path>` (Windows, Android)
    Localhost,
}

impl Default for AssetUrlStyle {
    fn default() -> Self {
        if cfg!(any(windows, target_os = "android")) {
            AssetUrlStyle::Localhost
        } else {
            AssetUrlStyle::CustomScheme
        }
    }
}

/// Converts a native file path or `file://` URI into a URL the webview can load
/// through the asset protocol.
pub fn convert_file_src(path: &str, style: AssetUrlStyle) -> String {
    let encoded = encode_uri_component(strip_file_scheme(path));
    match style {
        AssetUrlStyle::CustomScheme => format!("asset://localhost/{encoded}"),
        AssetUrlStyle::Localhost => format!("http://asset.localhost/{encoded}"),
    }
}

fn encode_uri_component(input: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            _ => {
                out.push('%');
                out.push(HEX[(byte >> 4) as usize] as char);
                out.push(HEX[(byte & 0x0f) as usize] as char);
            }
        }
    }
    out
}

pub fn mime_for_path(path: &str) -> &'static str {
    let ext = Path::new(strip_file_scheme(path))
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{payload}")
}

pub struct NativeResolver {
    files: Arc<dyn FileStorage>,
    style: AssetUrlStyle,
    capture_roots: Vec<PathBuf>,
}

impl NativeResolver {
    /// Starts with no capture roots, so every camera path is refused until
    /// [`NativeResolver::with_capture_roots`] names the camera's directories.
    pub fn new(files: Arc<dyn FileStorage>) -> Self {
        Self::with_style(files, AssetUrlStyle::default())
    }

    pub fn with_style(files: Arc<dyn FileStorage>, style: AssetUrlStyle) -> Self {
        Self {
            files,
            style,
            capture_roots: Vec::new(),
        }
    }

    pub fn with_capture_roots(mut self, roots: impl IntoIterator<Item = PathBuf>) -> Self {
        self.capture_roots.extend(roots);
        self
    }

    /// Resolves the camera's path and checks it sits inside a capture root.
    /// Both sides are canonicalized so `..` segments and symlinks cannot step
    /// outside.
    fn capture_source(&self, source: &str) -> Result<PathBuf> {
        let path = Path::new(strip_file_scheme(source));
        if !path.is_absolute() {
            return Err(ReceiptError::CapabilityDenied(format!(
                "camera path is not absolute: {source}"
            )));
        }

        let canonical = path
            .canonicalize()
            .map_err(|e| ReceiptError::io(path.display().to_string(), e))?;

        let allowed = self
            .capture_roots
            .iter()
            .filter_map(|root| root.canonicalize().ok())
            .any(|root| canonical.starts_with(root));

        if allowed {
            Ok(canonical)
        } else {
            log::warn!("Refusing camera file outside capture roots: {}", canonical.display());
            Err(ReceiptError::CapabilityDenied(format!(
                "camera path is outside the capture directories: {source}"
            )))
        }
    }
}

impl PathResolver for NativeResolver {
    fn runtime(&self) -> Runtime {
        Runtime::Native
    }

    fn persist(&self, photo: &CapturedPhoto, file_name: &str) -> Result<SavedImage> {
        let source = photo.path.as_deref().ok_or_else(|| {
            ReceiptError::CapabilityDenied("camera returned no native file path".to_string())
        })?;

        let source = self.capture_source(source)?;
        let bytes = self.files.read(&source.to_string_lossy())?;
        let uri = self.files.write(file_name, &bytes)?;
        let display = convert_file_src(&uri, self.style);

        Ok(SavedImage {
            storage_path: uri,
            display_path: Some(display),
        })
    }

    fn hydrate(&self, record: &mut PhotoRecord) -> Result<()> {
        if record.display_path.is_none() {
            record.display_path = Some(convert_file_src(&record.storage_path, self.style));
        }
        Ok(())
    }

    fn image_source(&self, record: &PhotoRecord) -> Result<String> {
        Ok(record
            .display_path
            .clone()
            .unwrap_or_else(|| convert_file_src(&record.storage_path, self.style)))
    }

    fn persists_display_path(&self) -> bool {
        true
    }
}

pub struct BrowserResolver {
    files: Arc<dyn FileStorage>,
    blobs: Arc<dyn BlobFetcher>,
}

impl BrowserResolver {
    pub fn new(files: Arc<dyn FileStorage>, blobs: Arc<dyn BlobFetcher>) -> Self {
        Self { files, blobs }
    }

    fn read_as_data_uri(&self, storage_path: &str) -> Result<String> {
        let bytes = self.files.read(storage_path)?;
        Ok(encode_data_uri(mime_for_path(storage_path), &bytes))
    }
}

impl PathResolver for BrowserResolver {
    fn runtime(&self) -> Runtime {
        Runtime::Browser
    }

    fn persist(&self, photo: &CapturedPhoto, file_name: &str) -> Result<SavedImage> {
        let web_path = photo.web_path.as_deref().ok_or_else(|| {
            ReceiptError::CapabilityDenied("camera returned no web path".to_string())
        })?;

        let bytes = self.blobs.fetch(web_path)?;
        self.files.write(file_name, &bytes)?;

        // The blob URI is only good for this session.
        Ok(SavedImage {
            storage_path: file_name.to_string(),
            display_path: Some(web_path.to_string()),
        })
    }

    fn hydrate(&self, record: &mut PhotoRecord) -> Result<()> {
        let ready = record
            .display_path
            .as_deref()
            .is_some_and(|p| p.starts_with("data:"));
        if !ready {
            record.display_path = Some(self.read_as_data_uri(&record.storage_path)?);
        }
        Ok(())
    }

    fn image_source(&self, record: &PhotoRecord) -> Result<String> {
        self.read_as_data_uri(&record.storage_path)
    }

    fn persists_display_path(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::camera::BlobRegistry;
    use crate::platform::files::DataDirectory;

    #[test]
    fn convert_file_src_encodes_like_encode_uri_component() {
        let url = convert_file_src(
            "file:///data/user/0/app/files/receipt 1.jpeg",
            AssetUrlStyle::CustomScheme,
        );
        assert_eq!(
            url,
            "asset://localhost/%2Fdata%2Fuser%2F0%2Fapp%2Ffiles%2Freceipt%201.jpeg"
        );

        let url = convert_file_src("/tmp/a.jpeg", AssetUrlStyle::Localhost);
        assert_eq!(url, "http://asset.localhost/%2Ftmp%2Fa.jpeg");
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for_path("receipt_1.png"), "image/png");
        assert_eq!(mime_for_path("receipt_1.JPEG"), "image/jpeg");
        assert_eq!(mime_for_path("file:///x/receipt_1"), "image/jpeg");
    }

    #[test]
    fn native_persist_copies_into_storage() {
        let camera_dir = tempfile::tempdir().expect("create temp dir");
        let data_dir = tempfile::tempdir().expect("create temp dir");
        let shot = camera_dir.path().join("IMG_0001.jpg");
        std::fs::write(&shot, b"raw").expect("write file");

        let files = Arc::new(DataDirectory::open(data_dir.path()).expect("open data dir"));
        let resolver = NativeResolver::with_style(files.clone(), AssetUrlStyle::CustomScheme)
            .with_capture_roots([camera_dir.path().to_path_buf()]);
        let saved = resolver
            .persist(
                &CapturedPhoto {
                    path: Some(shot.to_string_lossy().to_string()),
                    web_path: None,
                    format: "jpeg".to_string(),
                },
                "receipt_5.jpeg",
            )
            .expect("persist capture");

        assert!(saved.storage_path.starts_with("file://"));
        assert!(saved
            .display_path
            .as_deref()
            .expect("native display path")
            .starts_with("asset://localhost/"));
        assert_eq!(files.read("receipt_5.jpeg").expect("read file"), b"raw");
    }

    #[test]
    fn native_persist_refuses_files_outside_capture_roots() {
        let camera_dir = tempfile::tempdir().expect("create camera dir");
        let elsewhere = tempfile::tempdir().expect("create unrelated dir");
        let data_dir = tempfile::tempdir().expect("create data dir");
        let secret = elsewhere.path().join("secret.jpg");
        std::fs::write(&secret, b"not a receipt").expect("write unrelated file");

        let files = Arc::new(DataDirectory::open(data_dir.path()).expect("open data dir"));
        let photo_at = |path: String| CapturedPhoto {
            path: Some(path),
            web_path: None,
            format: "jpeg".to_string(),
        };

        let unrestricted = NativeResolver::new(files.clone());
        assert!(matches!(
            unrestricted.persist(&photo_at(secret.to_string_lossy().to_string()), "a.jpeg"),
            Err(ReceiptError::CapabilityDenied(_))
        ));

        let resolver =
            NativeResolver::new(files.clone()).with_capture_roots([camera_dir.path().to_path_buf()]);
        assert!(matches!(
            resolver.persist(&photo_at(secret.to_string_lossy().to_string()), "a.jpeg"),
            Err(ReceiptError::CapabilityDenied(_))
        ));

        // `..` cannot climb out of an allowed root.
        let escaped = camera_dir
            .path()
            .join("..")
            .join(elsewhere.path().file_name().expect("temp dir has a name"))
            .join("secret.jpg");
        assert!(matches!(
            resolver.persist(&photo_at(escaped.to_string_lossy().to_string()), "a.jpeg"),
            Err(ReceiptError::CapabilityDenied(_))
        ));

        assert!(matches!(
            resolver.persist(&photo_at("preferences.json".to_string()), "a.jpeg"),
            Err(ReceiptError::CapabilityDenied(_))
        ));
        assert!(!files.exists("a.jpeg"));
    }

    #[test]
    fn browser_hydrate_rebuilds_data_uri_from_file() {
        let data_dir = tempfile::tempdir().expect("create temp dir");
        let files = Arc::new(DataDirectory::open(data_dir.path()).expect("open data dir"));
        files.write("receipt_9.jpeg", &[1, 2, 3]).expect("write file");
        let resolver = BrowserResolver::new(files, Arc::new(BlobRegistry::new()));

        let mut record = PhotoRecord::from_saved(
            SavedImage {
                storage_path: "receipt_9.jpeg".to_string(),
                display_path: Some("blob:http://localhost/stale".to_string()),
            },
            9,
        );
        resolver.hydrate(&mut record).expect("hydrate record");
        assert_eq!(
            record.display_path.as_deref(),
            Some("data:image/jpeg;base64,AQID")
        );
        assert_eq!(
            resolver.image_source(&record).expect("image source"),
            "data:image/jpeg;base64,AQID"
        );
    }

    #[test]
    fn missing_capture_source_is_capability_denied() {
        let data_dir = tempfile::tempdir().expect("create temp dir");
        let files: Arc<dyn FileStorage> = Arc::new(DataDirectory::open(data_dir.path()).expect("open data dir"));
        let photo = CapturedPhoto {
            path: None,
            web_path: None,
            format: "jpeg".to_string(),
        };

        let native = NativeResolver::new(files.clone());
        assert!(matches!(
            native.persist(&photo, "a.jpeg"),
            Err(ReceiptError::CapabilityDenied(_))
        ));

        let browser = BrowserResolver::new(files, Arc::new(BlobRegistry::new()));
        assert!(matches!(
            browser.persist(&photo, "a.jpeg"),
            Err(ReceiptError::CapabilityDenied(_))
        ));
    }
}

use crate::error::{ReceiptError, Result};
use crate::models::photo::CapturedPhoto;
use base64::Engine;
use std::collections::HashMap;
use std::sync::Mutex;

/// Platform camera. May fail when the user cancels or denies permission.
pub trait Camera {
    fn capture(&self) -> Result<CapturedPhoto>;
}

/// A capture the webview already performed and handed over through IPC.
/// `None` means the user backed out of the camera sheet.
#[derive(Debug, Clone)]
pub struct ProvidedCapture(pub Option<CapturedPhoto>);

impl Camera for ProvidedCapture {
    fn capture(&self) -> Result<CapturedPhoto> {
        self.0
            .clone()
            .ok_or_else(|| ReceiptError::CapabilityDenied("camera capture was cancelled".to_string()))
    }
}

/// Resolves an ephemeral browser URI (blob or data URI) to bytes.
pub trait BlobFetcher: Send + Sync {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Session-scoped table of blob URIs the webview has uploaded. Entries vanish
/// with the process, exactly like browser object URLs. `data:` URIs are
/// decoded inline and never need registering.
#[derive(Debug, Default)]
pub struct BlobRegistry {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, uri: &str, bytes: Vec<u8>) -> Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| ReceiptError::Config("Blob registry lock error".to_string()))?;
        blobs.insert(uri.to_string(), bytes);
        Ok(())
    }

    pub fn revoke(&self, uri: &str) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.remove(uri);
        }
    }
}

impl BlobFetcher for BlobRegistry {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        if uri.starts_with("data:") {
            return decode_data_uri(uri);
        }

        let blobs = self
            .blobs
            .lock()
            .map_err(|_| ReceiptError::Config("Blob registry lock error".to_string()))?;
        blobs
            .get(uri)
            .cloned()
            .ok_or_else(|| ReceiptError::NotFound(format!("blob '{uri}' is not available in this session")))
    }
}

/// Decodes a base64 `data:` URI into raw bytes.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let (header, payload) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| ReceiptError::Validation("malformed data URI".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(ReceiptError::Validation(
            "only base64 data URIs are supported".to_string(),
        ));
    }

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ReceiptError::Validation(format!("Failed to decode image data: {e}")))
}

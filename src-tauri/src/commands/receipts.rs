#![cfg(feature = "app")]

use crate::board::{CaptureOptions, ReceiptBoard, ReceiptCard, Totals};
use crate::models::photo::{CapturedPhoto, PhotoRecord};
use crate::platform::camera::{decode_data_uri, BlobRegistry, ProvidedCapture};
use crate::store::FilterMode;
use std::sync::{Arc, Mutex};

type BoardState<'a> = tauri::State<'a, Mutex<ReceiptBoard>>;

fn with_board<T>(
    board: &Mutex<ReceiptBoard>,
    f: impl FnOnce(&mut ReceiptBoard) -> crate::error::Result<T>,
) -> Result<T, String> {
    let mut guard = board.lock().map_err(|_| "Board lock error".to_string())?;
    f(&mut guard).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn load_receipts(board: BoardState<'_>) -> Result<Vec<ReceiptCard>, String> {
    with_board(&board, |b| {
        b.load()?;
        Ok(b.visible())
    })
}

#[tauri::command]
pub async fn reset_receipts(board: BoardState<'_>) -> Result<Vec<ReceiptCard>, String> {
    with_board(&board, |b| {
        b.reset_store()?;
        Ok(b.visible())
    })
}

#[tauri::command]
pub async fn list_receipts(
    board: BoardState<'_>,
    filter: Option<FilterMode>,
) -> Result<Vec<ReceiptCard>, String> {
    with_board(&board, |b| {
        if let Some(mode) = filter {
            b.set_filter(mode);
        }
        Ok(b.visible())
    })
}

#[tauri::command]
pub async fn capture_options(board: BoardState<'_>) -> Result<CaptureOptions, String> {
    with_board(&board, |b| Ok(b.capture_options().clone()))
}

/// The browser shell uploads the bytes behind a blob URI before asking for the
/// capture to be saved.
#[tauri::command]
pub async fn register_blob(
    blobs: tauri::State<'_, Arc<BlobRegistry>>,
    uri: String,
    data_uri: String,
) -> Result<(), String> {
    let bytes = decode_data_uri(&data_uri).map_err(|e| e.to_string())?;
    blobs.register(&uri, bytes).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn capture_receipt(
    board: BoardState<'_>,
    blobs: tauri::State<'_, Arc<BlobRegistry>>,
    photo: Option<CapturedPhoto>,
) -> Result<PhotoRecord, String> {
    let web_path = photo.as_ref().and_then(|p| p.web_path.clone());
    let camera = ProvidedCapture(photo);
    let result = with_board(&board, |b| b.capture(&camera));

    if let Some(uri) = web_path.filter(|uri| uri.starts_with("blob:")) {
        // Bytes are on disk now; the display path keeps the URI, not the bytes.
        blobs.revoke(&uri);
    }
    result
}

#[tauri::command]
pub async fn claim_receipt(board: BoardState<'_>, index: usize) -> Result<bool, String> {
    with_board(&board, |b| b.claim(index))
}

#[tauri::command]
pub async fn delete_receipt(board: BoardState<'_>, index: usize) -> Result<PhotoRecord, String> {
    with_board(&board, |b| b.delete(index))
}

#[tauri::command]
pub async fn toggle_receipt_editing(board: BoardState<'_>, index: usize) -> Result<bool, String> {
    with_board(&board, |b| b.toggle_editing(index))
}

#[tauri::command]
pub async fn update_receipt(
    board: BoardState<'_>,
    index: usize,
    amount: Option<f64>,
    category: Option<String>,
) -> Result<PhotoRecord, String> {
    with_board(&board, |b| b.update_details(index, amount, category))
}

#[tauri::command]
pub async fn view_receipt_image(board: BoardState<'_>, index: usize) -> Result<String, String> {
    with_board(&board, |b| b.view_image(index))
}

#[tauri::command]
pub async fn receipt_totals(board: BoardState<'_>) -> Result<Totals, String> {
    with_board(&board, |b| Ok(b.totals()))
}

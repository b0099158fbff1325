pub mod board;
pub mod capture;
pub mod commands;
pub mod error;
pub mod feedback;
pub mod models;
pub mod platform;
pub mod store;

use std::path::PathBuf;

/// Where the app keeps its data (images, preferences) and its settings.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
}

#[cfg(feature = "app")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use board::ReceiptBoard;
    use commands::{
        receipts::{
            capture_options, capture_receipt, claim_receipt, delete_receipt, list_receipts,
            load_receipts, receipt_totals, register_blob, reset_receipts, toggle_receipt_editing,
            update_receipt, view_receipt_image,
        },
        settings::{get_settings, load_effective_settings, save_settings},
    };
    use feedback::EventNotifier;
    use platform::camera::BlobRegistry;
    use std::sync::{Arc, Mutex};
    use tauri::Manager;

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();

    tauri::Builder::default()
        .setup(|app| {
            let paths = AppPaths {
                data_dir: app.path().app_data_dir()?,
                config_dir: app.path().app_config_dir()?,
            };
            let settings = load_effective_settings(&paths.config_dir)?;

            let blobs = Arc::new(BlobRegistry::new());
            let notifier = Arc::new(EventNotifier::new(app.handle().clone()));
            // The camera plugin hands back files from the app cache or the OS temp dir.
            let capture_roots = [app.path().app_cache_dir()?, std::env::temp_dir()];
            let board = ReceiptBoard::open(
                &paths.data_dir,
                &settings,
                notifier,
                blobs.clone(),
                &capture_roots,
            )?;

            app.manage(Mutex::new(board));
            app.manage(blobs);
            app.manage(paths);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            load_receipts,
            reset_receipts,
            list_receipts,
            capture_options,
            register_blob,
            capture_receipt,
            claim_receipt,
            delete_receipt,
            toggle_receipt_editing,
            update_receipt,
            view_receipt_image,
            receipt_totals,
            get_settings,
            save_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

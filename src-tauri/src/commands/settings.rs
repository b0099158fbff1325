use crate::platform::resolver::Runtime;
use crate::store::CorruptStorePolicy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferencesBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeSetting {
    Auto,
    Native,
    Browser,
}

impl RuntimeSetting {
    pub fn resolve(self) -> Runtime {
        match self {
            RuntimeSetting::Auto => Runtime::detect(),
            RuntimeSetting::Native => Runtime::Native,
            RuntimeSetting::Browser => Runtime::Browser,
        }
    }
}

/// Typed view of `settings.json` after migration and sanitising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSettings {
    pub storage_key: String,
    pub filename_prefix: String,
    pub image_format: ImageFormat,
    pub image_quality: u8,
    pub toast_duration_ms: u64,
    pub corrupt_store_policy: CorruptStorePolicy,
    pub preferences_backend: PreferencesBackend,
    pub runtime: RuntimeSetting,
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        // default_settings() always sanitises into a valid shape.
        serde_json::from_value(default_settings()).unwrap_or(Self {
            storage_key: "photos".to_string(),
            filename_prefix: "receipt_".to_string(),
            image_format: ImageFormat::Jpeg,
            image_quality: 100,
            toast_duration_ms: 2000,
            corrupt_store_policy: CorruptStorePolicy::Fail,
            preferences_backend: PreferencesBackend::Json,
            runtime: RuntimeSetting::Auto,
        })
    }
}

#[cfg(feature = "app")]
#[tauri::command]
pub async fn get_settings(paths: tauri::State<'_, crate::AppPaths>) -> Result<Value, String> {
    load_settings_from_disk(&paths.config_dir)
}

#[cfg(feature = "app")]
#[tauri::command]
pub async fn save_settings(
    paths: tauri::State<'_, crate::AppPaths>,
    settings: Value,
) -> Result<Value, String> {
    save_settings_to_disk(&paths.config_dir, settings)
}

pub fn load_effective_settings(config_dir: &Path) -> Result<EffectiveSettings, String> {
    let settings = load_settings_from_disk(config_dir)?;
    serde_json::from_value(settings).map_err(|e| format!("CONFIG: invalid settings.json: {e}"))
}

pub fn load_settings_from_disk(config_dir: &Path) -> Result<Value, String> {
    let path = settings_path(config_dir);
    ensure_config_dir(config_dir)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read settings.json: {e}"))?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            log::warn!("settings.json does not parse ({e}); falling back to defaults");
            json!({})
        })
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(&path, &migrated)?;
    }

    Ok(migrated)
}

pub fn save_settings_to_disk(config_dir: &Path, settings: Value) -> Result<Value, String> {
    let path = settings_path(config_dir);
    ensure_config_dir(config_dir)?;

    let mut merged = load_settings_from_disk(config_dir).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(&path, &migrated)?;
    Ok(migrated)
}

fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join("settings.json")
}

fn ensure_config_dir(config_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(config_dir)
        .map_err(|e| format!("Failed to create config directory: {e}"))
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {e}"))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write settings.json: {e}"))
}

fn migrate_settings(input: Value) -> Value {
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    if version < 1 {
        rename_key(&mut out, "photoStorageKey", "storageKey");
    }

    if version < 2 {
        // V2 introduces recovery policy and backend selection.
        ensure_key(&mut out, "corruptStorePolicy", json!("fail"));
        ensure_key(&mut out, "preferencesBackend", json!("json"));
    }

    deep_merge_defaults(&mut out, &default_settings());
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "storageKey": "photos",
        "filenamePrefix": "receipt_",
        "imageFormat": "jpeg",
        "imageQuality": 100,
        "toastDurationMs": 2000,
        "corruptStorePolicy": "fail",
        "preferencesBackend": "json",
        "runtime": "auto"
    })
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn ensure_key(target: &mut Value, key: &str, value: Value) {
    if let Some(obj) = target.as_object_mut() {
        obj.entry(key.to_string()).or_insert(value);
    }
}

fn rename_key(target: &mut Value, from: &str, to: &str) {
    let Some(obj) = target.as_object_mut() else {
        return;
    };
    if let Some(value) = obj.remove(from) {
        obj.entry(to.to_string()).or_insert(value);
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "imageQuality", 1, 100, 100);
    clamp_u64(obj, "toastDurationMs", 500, 10_000, 2000);

    sanitize_enum(obj, "imageFormat", &["jpeg", "png"], "jpeg");
    sanitize_enum(obj, "corruptStorePolicy", &["fail", "reset"], "fail");
    sanitize_enum(obj, "preferencesBackend", &["json", "sqlite"], "json");
    sanitize_enum(obj, "runtime", &["auto", "native", "browser"], "auto");

    let key = obj
        .get("storageKey")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or("photos")
        .to_string();
    obj.insert("storageKey".to_string(), json!(key));

    // File names are built from this; keep it to portable characters.
    let prefix: String = obj
        .get("filenamePrefix")
        .and_then(Value::as_str)
        .unwrap_or("receipt_")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    obj.insert("filenamePrefix".to_string(), json!(prefix));
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn sanitize_enum(map: &mut Map<String, Value>, key: &str, allowed: &[&str], default: &str) {
    let valid = map
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| allowed.contains(value))
        .unwrap_or(default);
    map.insert(key.to_string(), json!(valid));
}

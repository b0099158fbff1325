use serde::{Deserialize, Deserializer, Serialize};

/// One photographed receipt.
///
/// Field names on disk follow the layout older builds wrote (`filepath`,
/// `webviewPath`, `timestamp`, `label`), so existing stores keep loading.
/// A legacy `isEditing` key is accepted and dropped: edit mode lives in
/// [`crate::store::view_state::ViewState`] now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    #[serde(rename = "filepath")]
    pub storage_path: String,
    #[serde(
        rename = "webviewPath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub display_path: Option<String>,
    #[serde(rename = "timestamp")]
    pub captured_at: i64,
    #[serde(
        rename = "label",
        default,
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<f64>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<String>,
    #[serde(default)]
    pub claimed: bool,
}

impl PhotoRecord {
    /// Builds a fresh, unclaimed record around an image that is already on disk.
    pub fn from_saved(saved: SavedImage, captured_at: i64) -> Self {
        Self {
            storage_path: saved.storage_path,
            display_path: saved.display_path,
            captured_at,
            amount: None,
            category: None,
            claimed: false,
        }
    }

    pub fn has_amount(&self) -> bool {
        self.amount.is_some_and(|a| a.is_finite() && a != 0.0)
    }

    pub fn has_category(&self) -> bool {
        self.category
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }

    /// Both fields a claim needs are filled in.
    pub fn is_claimable(&self) -> bool {
        self.has_amount() && self.has_category()
    }
}

/// What the camera handed back. Native shells fill `path` (a file on the
/// device); browser shells fill `web_path` (an ephemeral blob or data URI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPhoto {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub web_path: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "jpeg".to_string()
}

/// Result of persisting captured bytes into app storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedImage {
    pub storage_path: String,
    pub display_path: Option<String>,
}

// Older builds bound the amount input straight to the record, so `label`
// shows up as a number, a numeric string, an empty string, 0, or null.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(f64),
        Text(String),
    }

    let amount = match Option::<RawAmount>::deserialize(deserializer)? {
        None => None,
        Some(RawAmount::Number(n)) => Some(n),
        Some(RawAmount::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                match trimmed.parse::<f64>() {
                    Ok(n) => Some(n),
                    Err(e) => {
                        // One bad amount must not make the whole list unreadable.
                        log::warn!("Ignoring unreadable amount '{trimmed}': {e}");
                        None
                    }
                }
            }
        }
    };

    Ok(amount.filter(|a| *a != 0.0))
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_record_defaults_load_as_unset() {
        let raw = json!({
            "filepath": "receipt_1.jpeg",
            "webviewPath": "blob:http://localhost/abc",
            "timestamp": 1_700_000_000_000i64,
            "label": 0,
            "category": "",
            "claimed": false,
            "isEditing": true
        });

        let record: PhotoRecord = serde_json::from_value(raw).expect("decode record");
        assert_eq!(record.storage_path, "receipt_1.jpeg");
        assert_eq!(record.amount, None);
        assert_eq!(record.category, None);
        assert!(!record.claimed);
    }

    #[test]
    fn string_amounts_are_parsed() {
        let raw = json!({ "filepath": "a", "timestamp": 1, "label": "12.50", "category": "fuel" });
        let record: PhotoRecord = serde_json::from_value(raw).expect("decode record");
        assert_eq!(record.amount, Some(12.5));
        assert!(record.is_claimable());
    }

    #[test]
    fn unreadable_string_amount_loads_as_unset() {
        let raw = json!({ "filepath": "a", "timestamp": 1, "label": "12,50", "category": "fuel" });
        let record: PhotoRecord = serde_json::from_value(raw).expect("decode record");
        assert_eq!(record.amount, None);
        assert_eq!(record.category.as_deref(), Some("fuel"));
        assert!(!record.is_claimable());
    }

    #[test]
    fn unset_optionals_are_omitted_on_write() {
        let record = PhotoRecord::from_saved(
            SavedImage {
                storage_path: "receipt_2.jpeg".to_string(),
                display_path: None,
            },
            2,
        );
        let value = serde_json::to_value(&record).expect("encode record");
        assert_eq!(
            value,
            json!({ "filepath": "receipt_2.jpeg", "timestamp": 2, "claimed": false })
        );
    }

    #[test]
    fn whitespace_category_is_not_claimable() {
        let mut record = PhotoRecord::from_saved(
            SavedImage {
                storage_path: "a".to_string(),
                display_path: None,
            },
            0,
        );
        record.amount = Some(3.0);
        record.category = Some("   ".to_string());
        assert!(!record.is_claimable());
    }
}

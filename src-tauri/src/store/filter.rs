use crate::models::photo::PhotoRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Claimed,
    Unclaimed,
}

impl FilterMode {
    pub fn matches(self, record: &PhotoRecord) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Claimed => record.claimed,
            FilterMode::Unclaimed => !record.claimed,
        }
    }
}

/// Read-only view of the collection restricted to one claim status.
///
/// Positions in a view do not line up with positions in the backing
/// collection. Anything that mutates must go through [`FilteredView::key_at`]
/// and address the record by storage path.
#[derive(Debug, Clone, Copy)]
pub struct FilteredView<'a> {
    records: &'a [PhotoRecord],
    mode: FilterMode,
}

impl<'a> FilteredView<'a> {
    pub fn new(records: &'a [PhotoRecord], mode: FilterMode) -> Self {
        Self { records, mode }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Lazy pass over the matching records in collection order. Each call
    /// starts over from the front.
    pub fn iter(&self) -> impl Iterator<Item = &'a PhotoRecord> + Clone + 'a {
        let mode = self.mode;
        self.records.iter().filter(move |record| mode.matches(record))
    }

    pub fn get(&self, index: usize) -> Option<&'a PhotoRecord> {
        self.iter().nth(index)
    }

    pub fn key_at(&self, index: usize) -> Option<&'a str> {
        self.get(index).map(|record| record.storage_path.as_str())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn to_vec(&self) -> Vec<PhotoRecord> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for FilteredView<'a> {
    type Item = &'a PhotoRecord;
    type IntoIter = Box<dyn Iterator<Item = &'a PhotoRecord> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::photo::SavedImage;

    fn record(path: &str, claimed: bool) -> PhotoRecord {
        let mut r = PhotoRecord::from_saved(
            SavedImage {
                storage_path: path.to_string(),
                display_path: None,
            },
            0,
        );
        r.claimed = claimed;
        r
    }

    #[test]
    fn partitions_preserve_relative_order() {
        let records = vec![
            record("a", true),
            record("b", false),
            record("c", true),
            record("d", false),
        ];

        let keys = |mode| {
            FilteredView::new(&records, mode)
                .iter()
                .map(|r| r.storage_path.clone())
                .collect::<Vec<_>>()
        };

        assert_eq!(keys(FilterMode::All), ["a", "b", "c", "d"]);
        assert_eq!(keys(FilterMode::Claimed), ["a", "c"]);
        assert_eq!(keys(FilterMode::Unclaimed), ["b", "d"]);
    }

    #[test]
    fn view_is_restartable() {
        let records = vec![record("a", false), record("b", true)];
        let view = FilteredView::new(&records, FilterMode::Unclaimed);
        let first: Vec<_> = view.iter().collect();
        let second: Vec<_> = view.iter().collect();
        assert_eq!(first, second);
        assert_eq!(view.len(), 1);
        assert_eq!(view.key_at(0), Some("a"));
        assert_eq!(view.key_at(1), None);
    }

    #[test]
    fn filter_mode_parses_lowercase() {
        let mode: FilterMode = serde_json::from_str("\"unclaimed\"").expect("decode filter mode");
        assert_eq!(mode, FilterMode::Unclaimed);
    }
}

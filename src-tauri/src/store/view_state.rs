use std::collections::HashSet;

/// UI-only flags keyed by storage path. Lives for the session and is never
/// written to preferences.
#[derive(Debug, Default, Clone)]
pub struct ViewState {
    editing: HashSet<String>,
}

impl ViewState {
    /// Flips edit mode for `key` and returns the new value.
    pub fn toggle_editing(&mut self, key: &str) -> bool {
        if self.editing.remove(key) {
            false
        } else {
            self.editing.insert(key.to_string());
            true
        }
    }

    pub fn is_editing(&self, key: &str) -> bool {
        self.editing.contains(key)
    }

    pub fn forget(&mut self, key: &str) {
        self.editing.remove(key);
    }

    pub fn clear(&mut self) {
        self.editing.clear();
    }
}

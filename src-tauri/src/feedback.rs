use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastTone {
    Success,
    Warning,
    Danger,
}

/// Transient message for the user. Nothing reads a reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub message: String,
    pub tone: ToastTone,
    pub duration_ms: u64,
}

pub trait Notifier: Send + Sync {
    fn toast(&self, toast: Toast);
}

/// Writes toasts to the log. Used when no window is attached.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn toast(&self, toast: Toast) {
        match toast.tone {
            ToastTone::Success => log::info!("toast: {}", toast.message),
            ToastTone::Warning | ToastTone::Danger => log::warn!("toast: {}", toast.message),
        }
    }
}

/// Emits a `toast` event to the webview.
#[cfg(feature = "app")]
pub struct EventNotifier {
    app: tauri::AppHandle,
}

#[cfg(feature = "app")]
impl EventNotifier {
    pub fn new(app: tauri::AppHandle) -> Self {
        Self { app }
    }
}

#[cfg(feature = "app")]
impl Notifier for EventNotifier {
    fn toast(&self, toast: Toast) {
        use tauri::Emitter;
        if let Err(e) = self.app.emit("toast", &toast) {
            log::warn!("Could not deliver toast '{}': {e}", toast.message);
        }
    }
}

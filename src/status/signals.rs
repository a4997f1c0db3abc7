use serde::{Deserialize, Serialize};

/// Host-environment signal fed to the status monitor.
///
/// Sources are injected as an mpsc channel; tests send synthetic signals,
/// real hosts bridge whatever their platform exposes (tab visibility,
/// SIGTERM, ...). Environment signals only ever degrade status — they are
/// deliberately never classified as an outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentSignal {
    /// Host lost foreground visibility (tab backgrounded, app suspended)
    VisibilityHidden,
    /// Host regained foreground visibility
    VisibilityRestored,
    /// Host is unloading / shutting down
    Shutdown,
}

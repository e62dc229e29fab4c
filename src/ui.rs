//! User-facing collaborator interfaces: notifications and the clipboard.
//!
//! Presentation calls are fire-and-forget; the engine never awaits dismissal.
//! Auto-dismiss timing is advisory and comes from [`crate::config::TimingConfig`].

use async_trait::async_trait;

/// Notification surface supplied by the host.
pub trait NotificationSurface: Send + Sync {
    /// Success popup after a completed capture. `upgrade_hint` asks the host
    /// to append the free-tier upgrade pitch.
    fn show_popup(&self, upgrade_hint: bool);

    /// Transient error message, auto-dismissed by the host.
    fn show_error(&self, message: &str);

    /// Upgrade/informational notice. With `with_ok_button` the host keeps it
    /// up until acknowledged, otherwise it auto-dismisses.
    fn show_upgrade(&self, message: &str, with_ok_button: bool);
}

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard write failed: {0}")]
    Write(String),
}

/// System clipboard collaborator.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_plain(&self, text: &str) -> Result<(), ClipboardError>;

    /// Paired plain/HTML write for format-preserving copies.
    async fn write_rich(&self, plain: &str, html: &str) -> Result<(), ClipboardError>;
}

//! Core types shared across the capture pipeline.

use serde::{Deserialize, Serialize};

/// A single saved snippet in the history list.
///
/// Field names follow the persisted JSON layout so stored lists written by
/// other frontends of the same product remain readable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapturedItem {
    /// Creation timestamp in unix milliseconds; doubles as the identifier.
    pub id: i64,
    /// Refreshed whenever the starred state changes.
    #[serde(rename = "lastModifiedTimestamp")]
    pub last_modified: i64,
    /// Captured, normalized text. Immutable after creation.
    pub text: String,
    /// Pinned items are evicted only when nothing unstarred remains.
    #[serde(default)]
    pub starred: bool,
    /// Owner identity at capture time, or the last-known logged-in identity.
    #[serde(default)]
    pub email: Option<String>,
    /// Whether identity resolution failed ("Unauthorized") at capture time.
    #[serde(rename = "isLogout", default)]
    pub is_logout: bool,
}

impl CapturedItem {
    pub fn new(text: String, email: Option<String>, is_logout: bool, now_ms: i64) -> Self {
        Self {
            id: now_ms,
            last_modified: now_ms,
            text,
            starred: false,
            email,
            is_logout,
        }
    }
}

/// Axis-aligned rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self { left, top, right, bottom }
    }

    /// Containment check, edges inclusive.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// Modifier key that arms the two-click capture protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKey {
    Alt,
    Meta,
    Ctrl,
}

impl ModifierKey {
    /// Parse the stored key-name setting ("altKey", "metaKey", "ctrlKey").
    /// The stored value may carry JSON quotes; strip them before matching.
    pub fn from_setting(name: &str) -> Option<Self> {
        match name.replace('"', "").as_str() {
            "altKey" => Some(Self::Alt),
            "metaKey" => Some(Self::Meta),
            "ctrlKey" => Some(Self::Ctrl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alt => "altKey",
            Self::Meta => "metaKey",
            Self::Ctrl => "ctrlKey",
        }
    }
}

/// Errors that can occur during a capture attempt.
///
/// All of these are handled at the orchestrator boundary and converted to a
/// transient user-facing notification; none are fatal.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Copying is not supported for the chosen text")]
    UnsupportedContent,

    #[error("Closing bracket must be placed after the opening bracket")]
    InvalidBracketOrder,

    #[error("No text found between brackets")]
    EmptySelection,

    #[error("Capture is not supported on {0}")]
    BlockedHost(String),

    #[error("Required setting is not configured: {0}")]
    UnsetConfiguration(&'static str),

    #[error("Free tier word limit exceeded")]
    TierLimitExceeded,

    #[error("Storage error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Clipboard error: {0}")]
    Clipboard(#[from] crate::ui::ClipboardError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains() {
        let rect = Rect::new(10.0, 20.0, 110.0, 40.0);
        assert!(rect.contains(10.0, 20.0));
        assert!(rect.contains(110.0, 40.0));
        assert!(rect.contains(60.0, 30.0));
        assert!(!rect.contains(9.9, 30.0));
        assert!(!rect.contains(60.0, 40.1));
    }

    #[test]
    fn test_modifier_key_parsing() {
        assert_eq!(ModifierKey::from_setting("altKey"), Some(ModifierKey::Alt));
        assert_eq!(ModifierKey::from_setting("\"metaKey\""), Some(ModifierKey::Meta));
        assert_eq!(ModifierKey::from_setting("shiftKey"), None);
    }

    #[test]
    fn test_item_serde_field_names() {
        let item = CapturedItem::new("hello".to_string(), Some("a@b.c".to_string()), false, 1700000000000);
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"lastModifiedTimestamp\""));
        assert!(json.contains("\"isLogout\""));

        // Items written without optional fields still parse.
        let legacy = r#"{"id":1,"lastModifiedTimestamp":1,"text":"x"}"#;
        let parsed: CapturedItem = serde_json::from_str(legacy).unwrap();
        assert!(!parsed.starred);
        assert!(parsed.email.is_none());
    }
}

//! Runtime settings snapshot.
//!
//! Settings live in the key-value store and may have been written as real
//! booleans or as the strings "true"/"false" by older frontends; both forms
//! are accepted.

use crate::store::{keys, KeyValueStore, StoreError};
use crate::types::ModifierKey;
use serde_json::Value;

/// Settings read at the start of each capture attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Master feature toggle.
    pub enabled: bool,
    /// Capture through the native copy shortcut instead of brackets.
    pub use_standard_copy: bool,
    /// Rich-format clipboard writes (subscribed users only).
    pub rich_format: bool,
    /// Modifier key arming the click protocol. Missing settings default to
    /// Alt; a present but unrecognized value is `None` and treated as an
    /// unset configuration by the orchestrator.
    pub modifier_key: Option<ModifierKey>,
    /// Raw last-logged-in value, quotes preserved.
    pub last_logged_in_user: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: false,
            use_standard_copy: false,
            rich_format: false,
            modifier_key: Some(ModifierKey::Alt),
            last_logged_in_user: None,
        }
    }
}

/// Interpret a stored bool-like: `true` or `"true"`.
pub fn flag_is_set(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

fn as_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

impl Settings {
    /// Read the current snapshot from the store.
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        let enabled = flag_is_set(store.get(keys::ENABLED).await?.as_ref());
        let use_standard_copy = flag_is_set(store.get(keys::USE_STANDARD_COPY).await?.as_ref());
        let rich_format = flag_is_set(store.get(keys::RICH_FORMAT).await?.as_ref());

        let modifier_key = match as_string(store.get(keys::MODIFIER_KEY).await?) {
            Some(name) => ModifierKey::from_setting(&name),
            None => Some(ModifierKey::Alt),
        };

        let last_logged_in_user = as_string(store.get(keys::LAST_LOGGED_IN_USER).await?);

        Ok(Self {
            enabled,
            use_standard_copy,
            rich_format,
            modifier_key,
            last_logged_in_user,
        })
    }
}

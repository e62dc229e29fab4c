//! Identity resolution.
//!
//! User data comes from an external auth collaborator; failures degrade to
//! "no identity" and the engine falls back to the last-logged-in value kept
//! in the key-value store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message value the auth backend returns when the session is invalid.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Account data supplied by the auth collaborator. Read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    /// Presence of a subscription identifier implies the subscribed tier.
    #[serde(rename = "stripeSubscriptionId", default, skip_serializing_if = "Option::is_none")]
    pub stripe_subscription_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Status message; "Unauthorized" marks a failed identity resolution.
    pub message: String,
}

impl UserData {
    pub fn is_subscribed(&self) -> bool {
        self.stripe_subscription_id
            .as_deref()
            .map(|id| !id.is_empty())
            .unwrap_or(false)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.message == UNAUTHORIZED_MESSAGE
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity request failed: {0}")]
    Request(String),
}

/// Asynchronous identity/auth collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn fetch_user(&self) -> Result<UserData, IdentityError>;
}

/// Strip JSON quoting from a stored identity value.
pub fn strip_quotes(value: &str) -> String {
    value.replace('"', "")
}

/// Identity attributed to a capture at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    /// Authenticated email, or the quote-stripped last-logged-in fallback.
    pub user_email: Option<String>,
    /// True when identity resolution failed at capture time.
    pub is_logout: bool,
}

/// Resolve the identity a new capture is attributed to.
///
/// Note the raw `last_logged_in` value (quotes and all) is deliberately NOT
/// what this returns for eviction keying; the primary eviction pass uses the
/// raw value while this resolved email keys the secondary pass. The two can
/// diverge and the divergence is preserved.
pub fn resolve_identity(
    user_data: Option<&UserData>,
    last_logged_in: Option<&str>,
) -> ResolvedIdentity {
    let user_email = user_data
        .and_then(|u| u.email.clone())
        .or_else(|| last_logged_in.map(strip_quotes));
    let is_logout = user_data.map(|u| u.is_unauthorized()).unwrap_or(true);

    ResolvedIdentity { user_email, is_logout }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscribed_user() -> UserData {
        UserData {
            stripe_subscription_id: Some("sub_123".to_string()),
            email: Some("pro@example.com".to_string()),
            message: "ok".to_string(),
        }
    }

    #[test]
    fn test_subscription_detection() {
        assert!(subscribed_user().is_subscribed());

        let free = UserData {
            stripe_subscription_id: None,
            email: Some("free@example.com".to_string()),
            message: "ok".to_string(),
        };
        assert!(!free.is_subscribed());

        let empty_id = UserData {
            stripe_subscription_id: Some(String::new()),
            email: None,
            message: "ok".to_string(),
        };
        assert!(!empty_id.is_subscribed());
    }

    #[test]
    fn test_resolution_prefers_authenticated_email() {
        let user = subscribed_user();
        let resolved = resolve_identity(Some(&user), Some("\"old@example.com\""));
        assert_eq!(resolved.user_email.as_deref(), Some("pro@example.com"));
        assert!(!resolved.is_logout);
    }

    #[test]
    fn test_fallback_strips_quotes() {
        let resolved = resolve_identity(None, Some("\"old@example.com\""));
        assert_eq!(resolved.user_email.as_deref(), Some("old@example.com"));
        assert!(resolved.is_logout);
    }

    #[test]
    fn test_unauthorized_marks_logout() {
        let user = UserData {
            stripe_subscription_id: None,
            email: None,
            message: UNAUTHORIZED_MESSAGE.to_string(),
        };
        let resolved = resolve_identity(Some(&user), None);
        assert!(resolved.is_logout);
        assert!(resolved.user_email.is_none());
    }

    #[test]
    fn test_user_data_wire_format() {
        let json = r#"{"stripeSubscriptionId":"sub_9","email":"a@b.c","message":"ok"}"#;
        let user: UserData = serde_json::from_str(json).unwrap();
        assert!(user.is_subscribed());

        let minimal = r#"{"message":"Unauthorized"}"#;
        let user: UserData = serde_json::from_str(minimal).unwrap();
        assert!(user.is_unauthorized());
    }
}

//! Capture tier classification.
//!
//! Maps the requesting user's entitlement (subscribed vs. free) to the word
//! and capacity limits applied at insert time.

use crate::config::LimitsConfig;
use crate::identity::UserData;
use crate::types::CapturedItem;

/// Limits in force for one capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub is_subscribed: bool,
    /// Maximum words stored per capture.
    pub max_words: usize,
    /// Per-identity item capacity enforced by the primary eviction pass.
    pub max_items: usize,
}

/// Resolve the limits for the capturing user.
///
/// Capacity is keyed on the raw last-logged-in value, not the resolved email:
/// an identity that already holds more than the widening threshold gets the
/// widened capacity even on the free tier. That one-way relaxation matches
/// the shipped behavior and is kept on purpose.
pub fn resolve_limits(
    config: &LimitsConfig,
    user_data: Option<&UserData>,
    items: &[CapturedItem],
    raw_last_user: Option<&str>,
) -> TierLimits {
    let is_subscribed = user_data.map(|u| u.is_subscribed()).unwrap_or(false);

    let owned = items
        .iter()
        .filter(|item| item.email.as_deref() == raw_last_user)
        .count();

    let max_items = if owned > config.widening_threshold {
        config.widened_capacity
    } else if is_subscribed {
        config.widened_capacity
    } else {
        config.base_capacity
    };

    let max_words = if is_subscribed {
        config.premium_max_words
    } else {
        config.free_max_words
    };

    TierLimits { is_subscribed, max_words, max_items }
}

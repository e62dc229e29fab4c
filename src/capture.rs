//! Capture orchestrator.
//!
//! Top-level state machine tying input events to the point resolver, marker
//! controller, selection extractor, tier classifier and history manager.
//! Every failure is converted to a transient notification and the engine
//! returns to idle; nothing here is fatal and history is never mutated on a
//! failed capture.

use crate::config::CaptureConfig;
use crate::extract::{self, FieldBracketStep};
use crate::history::HistoryList;
use crate::identity::{self, IdentityProvider, UserData};
use crate::marker::MarkerController;
use crate::normalize;
use crate::point::resolve_point;
use crate::settings::Settings;
use crate::store::{keys, KeyValueStore};
use crate::tier;
use crate::tree::ContentTree;
use crate::types::{CaptureError, CapturedItem, ModifierKey};
use crate::ui::{Clipboard, NotificationSurface};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Orchestrator states for the two-phase bracket protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    AwaitingEndMarker,
    Processing,
}

/// What the user clicked.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickTarget {
    /// Regular page content; the DOM marker protocol applies.
    Page,
    /// Input or textarea; the inline bracket-character protocol applies.
    /// `cursor` is a character index into `value`.
    Field { value: String, cursor: usize },
}

/// A click event forwarded by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickEvent {
    pub x: f64,
    pub y: f64,
    /// The modifier key held during the click, if any.
    pub modifier: Option<ModifierKey>,
    pub target: ClickTarget,
    /// Clicks landing inside the extension's own popup are ignored.
    pub in_popup: bool,
}

/// Result of feeding a click to the engine. Field variants carry the updated
/// field value the host must write back.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Nothing to do (feature off, popup click, no text under the point).
    Ignored,
    /// Start marker placed; waiting for the end click.
    StartPlaced,
    /// Capture completed and persisted.
    Captured,
    /// Transient marker state was reset.
    Reset,
    /// Opening bracket inserted into the field.
    FieldUpdated { value: String, cursor: usize },
    /// Field capture completed; the host applies the value and selection.
    FieldCaptured { value: String, select_from: usize, select_to: usize },
    /// The attempt failed; the user has been notified where appropriate.
    Failed,
}

/// The capture engine. One instance per frame/page context; all transient
/// state lives here rather than in ambient globals, so independent instances
/// never cross-talk.
pub struct CaptureEngine<T: ContentTree + 'static> {
    config: CaptureConfig,
    tree: Arc<Mutex<T>>,
    store: Arc<dyn KeyValueStore>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn NotificationSurface>,
    clipboard: Arc<dyn Clipboard>,
    state: CaptureState,
    markers: MarkerController,
    selection_completed: bool,
    user_data: Option<UserData>,
}

impl<T: ContentTree + 'static> CaptureEngine<T> {
    pub fn new(
        config: CaptureConfig,
        tree: Arc<Mutex<T>>,
        store: Arc<dyn KeyValueStore>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn NotificationSurface>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        Self {
            config,
            tree,
            store,
            identity,
            notifier,
            clipboard,
            state: CaptureState::Idle,
            markers: MarkerController::new(),
            selection_completed: false,
            user_data: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    /// Fetch user data from the auth collaborator and mirror it into the
    /// store. A failed fetch degrades to "no identity".
    pub async fn refresh_identity(&mut self) {
        match self.identity.fetch_user().await {
            Ok(user) => {
                match serde_json::to_value(&user) {
                    Ok(value) => {
                        if let Err(e) = self.store.set(keys::USER_DATA, value).await {
                            warn!("failed to mirror user data into store: {}", e);
                        }
                    }
                    Err(e) => warn!("failed to encode user data: {}", e),
                }
                self.user_data = Some(user);
            }
            Err(e) => {
                warn!("identity fetch failed: {}", e);
                self.user_data = None;
            }
        }
    }

    /// React to an externally observed store change (another context wrote
    /// fresh user data).
    pub fn store_changed(&mut self, key: &str, value: Option<&serde_json::Value>) {
        if key == keys::USER_DATA {
            self.user_data = value.and_then(|v| serde_json::from_value(v.clone()).ok());
        }
    }

    /// A click with (possibly) the capture modifier held.
    pub async fn handle_modifier_click(&mut self, event: ClickEvent) -> ClickOutcome {
        let Some(held) = event.modifier else {
            return self.handle_plain_click().await;
        };

        let settings = match Settings::load(self.store.as_ref()).await {
            Ok(s) => s,
            Err(e) => {
                error!("settings unavailable, capture abandoned: {}", e);
                return ClickOutcome::Failed;
            }
        };
        if !settings.enabled {
            return ClickOutcome::Ignored;
        }

        let Some(expected) = settings.modifier_key else {
            self.report(CaptureError::UnsetConfiguration(keys::MODIFIER_KEY));
            return ClickOutcome::Failed;
        };
        if held != expected {
            // Wrong modifier is treated like a plain click: abandon.
            return self.handle_plain_click().await;
        }

        if event.in_popup {
            return ClickOutcome::Ignored;
        }

        if let Some(host) = self.tree.lock().await.host() {
            if self.config.is_blocked_host(&host) {
                self.report(CaptureError::BlockedHost(host));
                return ClickOutcome::Failed;
            }
        }

        match event.target.clone() {
            ClickTarget::Field { value, cursor } => {
                self.handle_field_click(&value, cursor, &settings).await
            }
            ClickTarget::Page => self.handle_page_click(event.x, event.y, &settings).await,
        }
    }

    /// A click without the modifier held abandons any pending bracket pair.
    pub async fn handle_plain_click(&mut self) -> ClickOutcome {
        self.reset_transient().await;
        ClickOutcome::Reset
    }

    /// The native copy shortcut. Captures the live selection directly when
    /// the feature and standard-copy mode are both on.
    pub async fn handle_copy_shortcut(&mut self) -> ClickOutcome {
        let settings = match Settings::load(self.store.as_ref()).await {
            Ok(s) => s,
            Err(e) => {
                error!("settings unavailable, capture abandoned: {}", e);
                return ClickOutcome::Failed;
            }
        };
        if !settings.enabled || !settings.use_standard_copy {
            return ClickOutcome::Ignored;
        }

        let selection = self.tree.lock().await.selection_text();
        if selection.is_empty() {
            return ClickOutcome::Ignored;
        }

        self.state = CaptureState::Processing;
        let outcome = match self.save_captured_text(selection, &settings, true).await {
            Ok(()) => ClickOutcome::Captured,
            Err(e) => {
                self.report(e);
                ClickOutcome::Failed
            }
        };
        self.state = CaptureState::Idle;
        outcome
    }

    /// The extension popup was dismissed: clear markers and the selection,
    /// and strip bracket characters out of the field value, if any.
    pub async fn handle_popup_dismissed(&mut self, field_value: Option<&str>) -> Option<String> {
        self.tree.lock().await.clear_selection();
        self.reset_transient().await;
        field_value.map(extract::clear_brackets)
    }

    /// Current persisted history (popup surface).
    pub async fn history(&self) -> Result<HistoryList, CaptureError> {
        Ok(HistoryList::load(self.store.as_ref()).await?)
    }

    /// Remove the item at `index` and persist. Out-of-range is a no-op.
    pub async fn remove_item(&mut self, index: usize) -> Result<(), CaptureError> {
        let mut history = HistoryList::load(self.store.as_ref()).await?;
        if history.remove_at(index) {
            info!("removed history item at {}", index);
        }
        history.save(self.store.as_ref()).await?;
        Ok(())
    }

    /// Toggle the starred state of the item at `index` and persist.
    pub async fn toggle_star(&mut self, index: usize) -> Result<(), CaptureError> {
        let mut history = HistoryList::load(self.store.as_ref()).await?;
        history.toggle_star(index, Utc::now().timestamp_millis());
        history.save(self.store.as_ref()).await?;
        Ok(())
    }

    async fn handle_page_click(&mut self, x: f64, y: f64, settings: &Settings) -> ClickOutcome {
        // A completed capture still showing its markers: this click starts over.
        if self.selection_completed {
            self.selection_completed = false;
            self.reset_transient().await;
        }

        if !self.markers.has_start() {
            self.place_start_marker(x, y).await
        } else {
            self.place_end_and_capture(x, y, settings).await
        }
    }

    async fn place_start_marker(&mut self, x: f64, y: f64) -> ClickOutcome {
        let resolved = {
            let tree = self.tree.lock().await;
            resolve_point(&*tree, x, y, false)
        };
        match resolved {
            Ok(Some(hit)) => {
                let blink = self.blink_interval();
                match self.markers.place_start(&self.tree, hit.position, blink).await {
                    Ok(()) => {
                        self.state = CaptureState::AwaitingEndMarker;
                        ClickOutcome::StartPlaced
                    }
                    Err(e) => {
                        self.report(e);
                        ClickOutcome::Failed
                    }
                }
            }
            Ok(None) => ClickOutcome::Ignored,
            Err(e) => {
                self.report(e);
                ClickOutcome::Failed
            }
        }
    }

    async fn place_end_and_capture(&mut self, x: f64, y: f64, settings: &Settings) -> ClickOutcome {
        let resolved = {
            let tree = self.tree.lock().await;
            resolve_point(&*tree, x, y, true)
        };
        let hit = match resolved {
            Ok(Some(hit)) => hit,
            Ok(None) => return ClickOutcome::Ignored,
            Err(e) => {
                self.report(e);
                return ClickOutcome::Failed;
            }
        };

        let blink = self.blink_interval();
        if let Err(e) = self.markers.place_end(&self.tree, x, y, hit.position, blink).await {
            // Invalid ordering keeps the start marker live for a retry.
            self.report(e);
            return ClickOutcome::Failed;
        }

        let text = match extract::extract_between_markers(&self.tree, &mut self.markers, blink).await
        {
            Ok(text) => text,
            Err(e) => {
                self.report(e);
                return ClickOutcome::Failed;
            }
        };

        self.state = CaptureState::Processing;
        let outcome = match self.save_captured_text(text, settings, false).await {
            Ok(()) => ClickOutcome::Captured,
            Err(e) => {
                self.report(e);
                self.reset_transient().await;
                ClickOutcome::Failed
            }
        };
        self.state = CaptureState::Idle;
        outcome
    }

    async fn handle_field_click(
        &mut self,
        value: &str,
        cursor: usize,
        settings: &Settings,
    ) -> ClickOutcome {
        match extract::advance_field_brackets(value, cursor) {
            Ok(FieldBracketStep::OpenInserted { value, cursor }) => {
                ClickOutcome::FieldUpdated { value, cursor }
            }
            Ok(FieldBracketStep::Captured { value, select_from, select_to, text }) => {
                self.state = CaptureState::Processing;
                if let Err(e) = self.save_captured_text(text, settings, false).await {
                    self.report(e);
                }
                self.state = CaptureState::Idle;
                ClickOutcome::FieldCaptured { value, select_from, select_to }
            }
            Ok(FieldBracketStep::AlreadyClosed) => ClickOutcome::Ignored,
            Err(e) => {
                self.report(e);
                ClickOutcome::Failed
            }
        }
    }

    /// The capture pipeline: tier limits, truncation, bounded insert,
    /// clipboard write, delayed success popup.
    async fn save_captured_text(
        &mut self,
        text: String,
        settings: &Settings,
        standard_copy: bool,
    ) -> Result<(), CaptureError> {
        let raw_last_user = settings.last_logged_in_user.as_deref();
        let mut history = HistoryList::load(self.store.as_ref()).await?;
        let limits = tier::resolve_limits(
            &self.config.limits,
            self.user_data.as_ref(),
            history.items(),
            raw_last_user,
        );
        let resolved = identity::resolve_identity(self.user_data.as_ref(), raw_last_user);

        let (stored_text, was_truncated) =
            normalize::truncate_to_word_limit(&text, limits.max_words);

        if was_truncated {
            if !limits.is_subscribed {
                if standard_copy {
                    self.notifier.show_upgrade(
                        &format!(
                            "Text has been copied, but the free tier limit of {} words applies; only the first {} words were saved.",
                            limits.max_words, limits.max_words
                        ),
                        true,
                    );
                } else {
                    self.notifier.show_upgrade(
                        &format!(
                            "The free tier is limited to {} words. Upgrade to copy any amount of text.",
                            limits.max_words
                        ),
                        true,
                    );
                    return Err(CaptureError::TierLimitExceeded);
                }
            } else {
                self.notifier.show_upgrade(
                    &format!("Text has been truncated to the first {} words.", limits.max_words),
                    true,
                );
            }
        }

        let now = Utc::now().timestamp_millis();
        let item = CapturedItem::new(
            stored_text,
            resolved.user_email.clone(),
            resolved.is_logout,
            now,
        );
        let item_text = item.text.clone();

        history.insert(
            item,
            limits.max_items,
            self.config.limits.hard_ceiling,
            raw_last_user,
            resolved.user_email.as_deref(),
        );
        history.save(self.store.as_ref()).await?;
        info!(
            "captured {} words for {:?} ({} items stored)",
            normalize::count_words(&item_text),
            resolved.user_email,
            history.len()
        );

        if standard_copy && !limits.is_subscribed {
            // The clipboard gets the full text; only storage is truncated.
            self.clipboard
                .write_plain(&normalize::collapse_blank_lines(&text))
                .await?;
        } else if limits.is_subscribed && settings.rich_format {
            let html = self.tree.lock().await.selection_html().unwrap_or_default();
            self.clipboard.write_rich(&item_text, &html).await?;
        } else {
            self.clipboard
                .write_plain(&normalize::collapse_blank_lines(&item_text))
                .await?;
        }

        self.selection_completed = true;
        if !was_truncated {
            let notifier = Arc::clone(&self.notifier);
            let delay = Duration::from_millis(self.config.timing.popup_delay_ms);
            let upgrade_hint = !limits.is_subscribed;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                notifier.show_popup(upgrade_hint);
            });
        }

        Ok(())
    }

    async fn reset_transient(&mut self) {
        self.markers.reset_all(&self.tree).await;
        self.state = CaptureState::Idle;
    }

    fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.config.timing.blink_interval_ms)
    }

    /// Convert an error into its user-facing notification. Storage and
    /// clipboard failures are logged only; the tier notice was already shown
    /// inline.
    fn report(&self, err: CaptureError) {
        match &err {
            CaptureError::Store(e) => error!("storage failure, capture abandoned: {}", e),
            CaptureError::Clipboard(e) => error!("clipboard failure, capture abandoned: {}", e),
            CaptureError::TierLimitExceeded => {}
            other => self.notifier.show_error(&other.to_string()),
        }
    }
}

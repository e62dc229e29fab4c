//! Bracket marker placement and lifecycle.
//!
//! Start and end markers are visual bracket elements inserted into the
//! content tree. The most recently placed marker blinks until any reset
//! path runs; the blink is a spawned task owning nothing but the marker id,
//! aborted explicitly so no timer outlives its marker.

use crate::tree::{ContentTree, MarkerId, MarkerKind, TextPosition};
use crate::types::CaptureError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// A marker that has been inserted into the tree.
#[derive(Debug, Clone, Copy)]
pub struct PlacedMarker {
    pub id: MarkerId,
    pub at: TextPosition,
}

/// Owns the transient start/end marker pair and the blink task.
#[derive(Default)]
pub struct MarkerController {
    start: Option<PlacedMarker>,
    end: Option<PlacedMarker>,
    blink: Option<JoinHandle<()>>,
}

impl MarkerController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_start(&self) -> bool {
        self.start.is_some()
    }

    pub fn start_marker(&self) -> Option<&PlacedMarker> {
        self.start.as_ref()
    }

    pub fn end_marker(&self) -> Option<&PlacedMarker> {
        self.end.as_ref()
    }

    /// Insert the opening bracket at the resolved position and begin the
    /// blink affordance.
    pub async fn place_start<T: ContentTree + 'static>(
        &mut self,
        tree: &Arc<Mutex<T>>,
        at: TextPosition,
        blink_interval: Duration,
    ) -> Result<(), CaptureError> {
        let id = tree
            .lock()
            .await
            .insert_marker(at, MarkerKind::Start)
            .map_err(|_| CaptureError::UnsupportedContent)?;
        self.start = Some(PlacedMarker { id, at });
        self.spawn_blink(tree, id, blink_interval);
        Ok(())
    }

    /// Validate the end point against the start marker's geometry and insert
    /// the closing bracket.
    ///
    /// A valid end point lies below the start marker's box, or within its
    /// vertical band but to its right. Anything else fails with
    /// [`CaptureError::InvalidBracketOrder`] and places nothing, leaving the
    /// start marker live for a retry.
    pub async fn place_end<T: ContentTree + 'static>(
        &mut self,
        tree: &Arc<Mutex<T>>,
        x: f64,
        y: f64,
        at: TextPosition,
        blink_interval: Duration,
    ) -> Result<(), CaptureError> {
        let start = self.start.ok_or(CaptureError::InvalidBracketOrder)?;

        let start_rect = tree
            .lock()
            .await
            .marker_rect(start.id)
            .map_err(|_| CaptureError::UnsupportedContent)?;

        let ordered = y > start_rect.bottom || (y > start_rect.top && x > start_rect.right);
        if !ordered {
            debug!("end point ({}, {}) precedes start marker box", x, y);
            return Err(CaptureError::InvalidBracketOrder);
        }

        let id = tree
            .lock()
            .await
            .insert_marker(at, MarkerKind::End)
            .map_err(|_| CaptureError::UnsupportedContent)?;
        self.end = Some(PlacedMarker { id, at });
        self.spawn_blink(tree, id, blink_interval);
        Ok(())
    }

    /// Remove both markers and halt blinking.
    pub async fn reset_all<T: ContentTree>(&mut self, tree: &Arc<Mutex<T>>) {
        self.stop_blink();
        let mut tree = tree.lock().await;
        if let Some(start) = self.start.take() {
            tree.remove_marker(start.id);
        }
        if let Some(end) = self.end.take() {
            tree.remove_marker(end.id);
        }
    }

    /// Remove only the end marker, moving the blink back to the start marker
    /// so it stays live for a retry.
    pub async fn reset_end_only<T: ContentTree + 'static>(
        &mut self,
        tree: &Arc<Mutex<T>>,
        blink_interval: Duration,
    ) {
        self.stop_blink();
        if let Some(end) = self.end.take() {
            tree.lock().await.remove_marker(end.id);
        }
        if let Some(start) = self.start {
            self.spawn_blink(tree, start.id, blink_interval);
        }
    }

    fn spawn_blink<T: ContentTree + 'static>(
        &mut self,
        tree: &Arc<Mutex<T>>,
        marker: MarkerId,
        every: Duration,
    ) {
        self.stop_blink();
        let tree = Arc::clone(tree);
        self.blink = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            let mut visible = true;
            loop {
                ticker.tick().await;
                visible = !visible;
                tree.lock().await.set_marker_visible(marker, visible);
            }
        }));
    }

    fn stop_blink(&mut self) {
        if let Some(handle) = self.blink.take() {
            handle.abort();
        }
    }
}

impl Drop for MarkerController {
    fn drop(&mut self) {
        self.stop_blink();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MemoryTree;

    const BLINK: Duration = Duration::from_millis(500);

    fn two_line_tree() -> Arc<Mutex<MemoryTree>> {
        Arc::new(Mutex::new(MemoryTree::from_lines(&["first line", "second line"])))
    }

    async fn position(tree: &Arc<Mutex<MemoryTree>>, line: usize, offset: usize) -> TextPosition {
        let tree = tree.lock().await;
        TextPosition { node: tree.text_node_ids()[line], offset }
    }

    #[tokio::test]
    async fn test_place_start_then_valid_end() {
        let tree = two_line_tree();
        let mut markers = MarkerController::new();

        let start_at = position(&tree, 0, 2).await;
        markers.place_start(&tree, start_at, BLINK).await.unwrap();
        assert!(markers.has_start());

        // End click on the line below the start marker.
        let end_at = position(&tree, 1, 4).await;
        markers.place_end(&tree, 32.0, 24.0, end_at, BLINK).await.unwrap();
        assert!(markers.end_marker().is_some());
        assert_eq!(tree.lock().await.marker_count(), 2);
    }

    #[tokio::test]
    async fn test_end_above_start_is_rejected() {
        let tree = two_line_tree();
        let mut markers = MarkerController::new();

        let start_at = position(&tree, 1, 4).await;
        markers.place_start(&tree, start_at, BLINK).await.unwrap();

        let end_at = position(&tree, 0, 1).await;
        let err = markers
            .place_end(&tree, 8.0, 8.0, end_at, BLINK)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::InvalidBracketOrder));

        // No end marker placed; start marker stays live for retry.
        assert!(markers.end_marker().is_none());
        assert!(markers.has_start());
        assert_eq!(tree.lock().await.marker_count(), 1);
    }

    #[tokio::test]
    async fn test_same_band_right_of_start_is_accepted() {
        let tree = two_line_tree();
        let mut markers = MarkerController::new();

        let start_at = position(&tree, 0, 2).await;
        markers.place_start(&tree, start_at, BLINK).await.unwrap();

        // Same vertical band, to the right of the start caret.
        let end_at = position(&tree, 0, 8).await;
        markers.place_end(&tree, 64.0, 8.0, end_at, BLINK).await.unwrap();
        assert!(markers.end_marker().is_some());
    }

    #[tokio::test]
    async fn test_same_band_left_of_start_is_rejected() {
        let tree = two_line_tree();
        let mut markers = MarkerController::new();

        let start_at = position(&tree, 0, 8).await;
        markers.place_start(&tree, start_at, BLINK).await.unwrap();

        // Same vertical band but left of the start caret.
        let end_at = position(&tree, 0, 2).await;
        let err = markers
            .place_end(&tree, 16.0, 8.0, end_at, BLINK)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::InvalidBracketOrder));
    }

    #[tokio::test]
    async fn test_reset_all_removes_markers() {
        let tree = two_line_tree();
        let mut markers = MarkerController::new();

        markers
            .place_start(&tree, position(&tree, 0, 0).await, BLINK)
            .await
            .unwrap();
        markers
            .place_end(&tree, 8.0, 24.0, position(&tree, 1, 1).await, BLINK)
            .await
            .unwrap();

        markers.reset_all(&tree).await;
        assert!(!markers.has_start());
        assert_eq!(tree.lock().await.marker_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_end_only_keeps_start() {
        let tree = two_line_tree();
        let mut markers = MarkerController::new();

        markers
            .place_start(&tree, position(&tree, 0, 0).await, BLINK)
            .await
            .unwrap();
        markers
            .place_end(&tree, 8.0, 24.0, position(&tree, 1, 1).await, BLINK)
            .await
            .unwrap();

        markers.reset_end_only(&tree, BLINK).await;
        assert!(markers.has_start());
        assert!(markers.end_marker().is_none());
        assert_eq!(tree.lock().await.marker_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blink_toggles_visibility() {
        let tree = two_line_tree();
        let mut markers = MarkerController::new();

        markers
            .place_start(&tree, position(&tree, 0, 0).await, BLINK)
            .await
            .unwrap();
        let id = markers.start_marker().unwrap().id;
        assert_eq!(tree.lock().await.marker_visible(id), Some(true));

        tokio::time::advance(Duration::from_millis(501)).await;
        // Let the blink task observe the tick.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(tree.lock().await.marker_visible(id), Some(false));
    }
}

//! Selection extraction.
//!
//! Two paths produce the captured text: a range between the placed DOM
//! markers, and a bracket-character protocol for input/textarea fields that
//! slices the field value directly. Both share the ordering and
//! empty-selection rules.

use crate::marker::MarkerController;
use crate::tree::ContentTree;
use crate::types::CaptureError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Read the text strictly between the start and end markers, making it the
/// active selection.
///
/// Whitespace-only content removes the end marker (the start marker stays
/// live for a retry) and fails with [`CaptureError::EmptySelection`].
pub async fn extract_between_markers<T: ContentTree + 'static>(
    tree: &Arc<Mutex<T>>,
    markers: &mut MarkerController,
    blink_interval: Duration,
) -> Result<String, CaptureError> {
    let (start, end) = match (markers.start_marker(), markers.end_marker()) {
        (Some(s), Some(e)) => (s.id, e.id),
        _ => return Err(CaptureError::EmptySelection),
    };

    let text = tree
        .lock()
        .await
        .select_between_markers(start, end)
        .map_err(|_| CaptureError::UnsupportedContent)?;

    if text.trim().is_empty() {
        markers.reset_end_only(tree, blink_interval).await;
        return Err(CaptureError::EmptySelection);
    }

    Ok(text)
}

/// One step of the inline bracket protocol for input/textarea fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldBracketStep {
    /// Opening bracket inserted at the cursor.
    OpenInserted { value: String, cursor: usize },
    /// Closing bracket inserted; the slice between the brackets is captured.
    /// `select_from..select_to` are character indices into the new value.
    Captured {
        value: String,
        select_from: usize,
        select_to: usize,
        text: String,
    },
    /// Both brackets already present; nothing to do.
    AlreadyClosed,
}

/// Advance the field bracket protocol by one modifier-click.
///
/// `cursor` is a character index into `value`. The first click drops `[` at
/// the cursor; the second drops `]` there and captures the slice between,
/// provided the cursor sits past the opening bracket. A cursor at or before
/// the opening bracket fails with [`CaptureError::InvalidBracketOrder`]; a
/// whitespace-only slice fails with [`CaptureError::EmptySelection`] and the
/// closing bracket is not inserted.
pub fn advance_field_brackets(value: &str, cursor: usize) -> Result<FieldBracketStep, CaptureError> {
    let chars: Vec<char> = value.chars().collect();
    let open = chars.iter().position(|&c| c == '[');
    let close = chars.iter().position(|&c| c == ']');

    match (open, close) {
        (None, _) => {
            let new_value = insert_char_at(&chars, cursor, '[');
            Ok(FieldBracketStep::OpenInserted { value: new_value, cursor: cursor + 1 })
        }
        (Some(open), None) => {
            if cursor <= open {
                return Err(CaptureError::InvalidBracketOrder);
            }
            let text: String = chars[open + 1..cursor.min(chars.len())].iter().collect();
            if text.trim().is_empty() {
                return Err(CaptureError::EmptySelection);
            }
            let new_value = insert_char_at(&chars, cursor, ']');
            Ok(FieldBracketStep::Captured {
                value: new_value,
                select_from: open + 1,
                select_to: cursor,
                text,
            })
        }
        (Some(_), Some(_)) => Ok(FieldBracketStep::AlreadyClosed),
    }
}

/// Strip all bracket characters from a field value (popup dismissal).
pub fn clear_brackets(value: &str) -> String {
    value.chars().filter(|&c| c != '[' && c != ']').collect()
}

fn insert_char_at(chars: &[char], cursor: usize, ch: char) -> String {
    let cursor = cursor.min(chars.len());
    let mut out: String = chars[..cursor].iter().collect();
    out.push(ch);
    out.extend(&chars[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerController;
    use crate::tree::{MemoryTree, TextPosition};

    const BLINK: Duration = Duration::from_millis(500);

    #[tokio::test]
    async fn test_extract_between_markers() {
        let tree = Arc::new(Mutex::new(MemoryTree::from_lines(&["alpha beta gamma"])));
        let node = tree.lock().await.text_node_ids()[0];
        let mut markers = MarkerController::new();

        markers
            .place_start(&tree, TextPosition { node, offset: 6 }, BLINK)
            .await
            .unwrap();
        markers
            .place_end(&tree, 80.0, 8.0, TextPosition { node, offset: 10 }, BLINK)
            .await
            .unwrap();

        let text = extract_between_markers(&tree, &mut markers, BLINK).await.unwrap();
        assert_eq!(text, "beta");
        assert_eq!(tree.lock().await.selection_text(), "beta");
    }

    #[tokio::test]
    async fn test_empty_selection_keeps_start_marker() {
        let tree = Arc::new(Mutex::new(MemoryTree::from_lines(&["ab   cd"])));
        let node = tree.lock().await.text_node_ids()[0];
        let mut markers = MarkerController::new();

        // Only whitespace sits between the two markers.
        markers
            .place_start(&tree, TextPosition { node, offset: 2 }, BLINK)
            .await
            .unwrap();
        markers
            .place_end(&tree, 40.0, 8.0, TextPosition { node, offset: 5 }, BLINK)
            .await
            .unwrap();

        let err = extract_between_markers(&tree, &mut markers, BLINK)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::EmptySelection));
        assert!(markers.has_start());
        assert!(markers.end_marker().is_none());
        assert_eq!(tree.lock().await.marker_count(), 1);
    }

    #[test]
    fn test_field_protocol_walk() {
        // First click inserts the opening bracket at the cursor.
        let step = advance_field_brackets("hello world", 6).unwrap();
        let (value, cursor) = match step {
            FieldBracketStep::OpenInserted { value, cursor } => (value, cursor),
            other => panic!("unexpected step: {:?}", other),
        };
        assert_eq!(value, "hello [world");
        assert_eq!(cursor, 7);

        // Second click past the bracket captures the slice between.
        let step = advance_field_brackets(&value, 12).unwrap();
        match step {
            FieldBracketStep::Captured { value, select_from, select_to, text } => {
                assert_eq!(value, "hello [world]");
                assert_eq!(text, "world");
                assert_eq!((select_from, select_to), (7, 12));
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_field_close_before_open_is_rejected() {
        let err = advance_field_brackets("ab[cd", 2).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidBracketOrder));
        let err = advance_field_brackets("ab[cd", 1).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidBracketOrder));
    }

    #[test]
    fn test_field_empty_capture_skips_closing_bracket() {
        let err = advance_field_brackets("a[  b", 3).unwrap_err();
        assert!(matches!(err, CaptureError::EmptySelection));
    }

    #[test]
    fn test_field_already_closed_is_noop() {
        assert_eq!(
            advance_field_brackets("a[b]c", 5).unwrap(),
            FieldBracketStep::AlreadyClosed
        );
    }

    #[test]
    fn test_clear_brackets() {
        assert_eq!(clear_brackets("a[b]c"), "abc");
        assert_eq!(clear_brackets("no brackets"), "no brackets");
    }
}

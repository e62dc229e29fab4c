//! Point resolver: locate an addressable text position from 2D coordinates.
//!
//! Walks the element stack under the point front-to-back. Hyperlink elements
//! get a restricted scan of their own text nodes first, since link text is
//! what the user is aiming at when clicking one. When no character rectangle
//! contains the point, the resolver biases toward the first text node for an
//! opening click and the last text node for a closing click, so an imprecise
//! end-click still selects to the end of nearby text.

use crate::tree::{ContentTree, NodeId, TextPosition, TreeError};
use crate::types::{CaptureError, Rect};
use tracing::debug;

/// A resolved text position plus the containing rectangle, when the point
/// landed exactly on a character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPoint {
    pub position: TextPosition,
    pub bounding_rect: Option<Rect>,
}

/// Resolve the text position under (x, y).
///
/// `have_start` selects the fallback bias: `false` before the start marker is
/// placed, `true` while waiting for the end marker. Returns `Ok(None)` when
/// the stack holds no rendered text at all; adapter geometry failures map to
/// [`CaptureError::UnsupportedContent`].
pub fn resolve_point<T: ContentTree + ?Sized>(
    tree: &T,
    x: f64,
    y: f64,
    have_start: bool,
) -> Result<Option<ResolvedPoint>, CaptureError> {
    resolve_inner(tree, x, y, have_start).map_err(|e| {
        debug!("point resolution failed: {}", e);
        CaptureError::UnsupportedContent
    })
}

fn resolve_inner<T: ContentTree + ?Sized>(
    tree: &T,
    x: f64,
    y: f64,
    have_start: bool,
) -> Result<Option<ResolvedPoint>, TreeError> {
    for element in tree.elements_from_point(x, y)? {
        if tree.is_link(element) {
            if let Some(hit) = scan_for_containment(tree, element, x, y)? {
                return Ok(Some(hit));
            }
        }

        let mut first_rendered: Option<NodeId> = None;
        let mut last_rendered: Option<NodeId> = None;

        for node in tree.text_nodes(element)? {
            let rects = tree.node_rects(node)?;
            if !rects.is_empty() {
                if first_rendered.is_none() {
                    first_rendered = Some(node);
                }
                last_rendered = Some(node);
            }
            for rect in rects {
                if rect.contains(x, y) {
                    let offset = char_offset_at(tree, node, x, y)?;
                    return Ok(Some(ResolvedPoint {
                        position: TextPosition { node, offset },
                        bounding_rect: Some(rect),
                    }));
                }
            }
        }

        // No exact containment inside this element. If it rendered any text,
        // apply the directional fallback; otherwise keep walking the stack.
        if !have_start {
            if let Some(node) = first_rendered {
                return Ok(Some(ResolvedPoint {
                    position: TextPosition { node, offset: 0 },
                    bounding_rect: None,
                }));
            }
        } else if let Some(node) = last_rendered {
            let offset = tree.text_len(node)?;
            return Ok(Some(ResolvedPoint {
                position: TextPosition { node, offset },
                bounding_rect: None,
            }));
        }
    }

    Ok(None)
}

/// Scan an element's text nodes for a character rectangle containing (x, y).
fn scan_for_containment<T: ContentTree + ?Sized>(
    tree: &T,
    element: NodeId,
    x: f64,
    y: f64,
) -> Result<Option<ResolvedPoint>, TreeError> {
    for node in tree.text_nodes(element)? {
        for rect in tree.node_rects(node)? {
            if rect.contains(x, y) {
                let offset = char_offset_at(tree, node, x, y)?;
                return Ok(Some(ResolvedPoint {
                    position: TextPosition { node, offset },
                    bounding_rect: Some(rect),
                }));
            }
        }
    }
    Ok(None)
}

/// Probe each character's rectangle for containment of the point.
fn char_offset_at<T: ContentTree + ?Sized>(
    tree: &T,
    node: NodeId,
    x: f64,
    y: f64,
) -> Result<usize, TreeError> {
    let len = tree.text_len(node)?;
    for i in 0..len {
        if tree.char_rect(node, i)?.contains(x, y) {
            return Ok(i);
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MemoryTree;

    #[test]
    fn test_exact_hit_resolves_offset() {
        let tree = MemoryTree::from_lines(&["hello world"]);
        let hit = resolve_point(&tree, 36.0, 8.0, false).unwrap().unwrap();
        // x=36 lands in the cell of character index 4.
        assert_eq!(hit.position.offset, 4);
        assert!(hit.bounding_rect.is_some());
    }

    #[test]
    fn test_fallback_bias_before_start() {
        let tree = MemoryTree::from_lines(&["first line", "last line"]);
        let hit = resolve_point(&tree, 900.0, 900.0, false).unwrap().unwrap();
        assert_eq!(hit.position.offset, 0);
        assert!(hit.bounding_rect.is_none());
    }

    #[test]
    fn test_fallback_bias_after_start() {
        let tree = MemoryTree::from_lines(&["first line", "last line"]);
        let hit = resolve_point(&tree, 900.0, 900.0, true).unwrap().unwrap();
        // Biased to the end of the last rendered node.
        assert_eq!(hit.position.offset, "last line".chars().count());
        assert!(hit.bounding_rect.is_none());
    }

    #[test]
    fn test_link_element_restricted_scan() {
        let mut tree = MemoryTree::new();
        let link = tree.add_element(true);
        let node = tree.add_text(link, "click me", 0.0, 0.0);
        let hit = resolve_point(&tree, 20.0, 8.0, false).unwrap().unwrap();
        assert_eq!(hit.position.node, node);
        assert_eq!(hit.position.offset, 2);
    }

    #[test]
    fn test_empty_tree_resolves_none() {
        let tree = MemoryTree::new();
        assert!(resolve_point(&tree, 0.0, 0.0, false).unwrap().is_none());
    }

    #[test]
    fn test_geometry_failure_is_unsupported() {
        let mut tree = MemoryTree::from_lines(&["hello"]);
        tree.poison_geometry();
        let err = resolve_point(&tree, 0.0, 0.0, false).unwrap_err();
        assert!(matches!(err, CaptureError::UnsupportedContent));
    }
}

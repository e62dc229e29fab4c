//! Content-tree adapter interface.
//!
//! The capture pipeline never touches a rendering engine directly; it works
//! against this trait, which a browser host implements over the live page and
//! tests implement with [`MemoryTree`]. The operations mirror what the point
//! resolver and marker controller need: hit-testing by screen coordinates,
//! per-character geometry, marker insertion, and range selection.

use crate::types::Rect;
use std::collections::HashMap;

/// Opaque identifier for an element or text node, assigned by the adapter.
pub type NodeId = u64;

/// Opaque identifier for a placed bracket marker.
pub type MarkerId = u64;

/// An addressable position inside a text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub node: NodeId,
    /// Character offset into the node's text.
    pub offset: usize,
}

/// Which end of the pending capture a marker denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Start,
    End,
}

/// Errors surfaced by a content-tree adapter.
///
/// The pipeline treats any of these as "unsupported content" and abandons the
/// capture with a user-facing notification.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("geometry unavailable: {0}")]
    Geometry(String),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("marker not found: {0}")]
    MarkerNotFound(MarkerId),
}

/// Adapter over a hierarchical content tree with 2D layout.
pub trait ContentTree: Send {
    /// Host name of the page, if any (used for the blocked-host check).
    fn host(&self) -> Option<String>;

    /// Elements stacked at the given point, front-to-back.
    fn elements_from_point(&self, x: f64, y: f64) -> Result<Vec<NodeId>, TreeError>;

    /// Whether the element is a hyperlink.
    fn is_link(&self, element: NodeId) -> bool;

    /// Text nodes inside the element, in document order.
    fn text_nodes(&self, element: NodeId) -> Result<Vec<NodeId>, TreeError>;

    /// Character count of a text node.
    fn text_len(&self, node: NodeId) -> Result<usize, TreeError>;

    /// Layout rectangles covering the node's rendered text.
    fn node_rects(&self, node: NodeId) -> Result<Vec<Rect>, TreeError>;

    /// Bounding rectangle of the single character at `index`.
    fn char_rect(&self, node: NodeId, index: usize) -> Result<Rect, TreeError>;

    /// Insert a visual bracket marker at the given position.
    fn insert_marker(&mut self, at: TextPosition, kind: MarkerKind) -> Result<MarkerId, TreeError>;

    /// Remove a marker; unknown ids are ignored.
    fn remove_marker(&mut self, marker: MarkerId);

    /// Toggle a marker's visibility (blink affordance).
    fn set_marker_visible(&mut self, marker: MarkerId, visible: bool);

    /// Bounding rectangle of a placed marker.
    fn marker_rect(&self, marker: MarkerId) -> Result<Rect, TreeError>;

    /// Build a range strictly between the two markers, make it the active
    /// selection, and return its string content.
    fn select_between_markers(&mut self, start: MarkerId, end: MarkerId)
        -> Result<String, TreeError>;

    /// Drop the active selection.
    fn clear_selection(&mut self);

    /// String content of the active selection (native selection path).
    fn selection_text(&self) -> String;

    /// HTML fragment of the active selection, for rich clipboard writes.
    fn selection_html(&self) -> Option<String>;
}

const CHAR_WIDTH: f64 = 8.0;
const LINE_HEIGHT: f64 = 16.0;

struct ElementData {
    is_link: bool,
    nodes: Vec<NodeId>,
}

struct TextData {
    text: String,
    x: f64,
    y: f64,
}

struct MarkerData {
    at: TextPosition,
    #[allow(dead_code)]
    kind: MarkerKind,
    visible: bool,
}

/// In-memory content tree with a monospace grid layout.
///
/// Each text node renders as one rectangle starting at its (x, y) with
/// 8x16 character cells. Intended for tests and headless embedding.
pub struct MemoryTree {
    elements: Vec<NodeId>,
    element_data: HashMap<NodeId, ElementData>,
    text_data: HashMap<NodeId, TextData>,
    text_order: Vec<NodeId>,
    markers: HashMap<MarkerId, MarkerData>,
    next_id: u64,
    selection: Option<String>,
    selection_fragment: Option<String>,
    host: Option<String>,
    fail_geometry: bool,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            element_data: HashMap::new(),
            text_data: HashMap::new(),
            text_order: Vec::new(),
            markers: HashMap::new(),
            next_id: 1,
            selection: None,
            selection_fragment: None,
            host: None,
            fail_geometry: false,
        }
    }

    pub fn with_host(host: &str) -> Self {
        let mut tree = Self::new();
        tree.host = Some(host.to_string());
        tree
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add an element; elements added first are frontmost in hit-testing.
    pub fn add_element(&mut self, is_link: bool) -> NodeId {
        let id = self.alloc_id();
        self.elements.push(id);
        self.element_data.insert(id, ElementData { is_link, nodes: Vec::new() });
        id
    }

    /// Add a text node laid out at (x, y) on the monospace grid.
    pub fn add_text(&mut self, element: NodeId, text: &str, x: f64, y: f64) -> NodeId {
        let id = self.alloc_id();
        self.text_data.insert(id, TextData { text: text.to_string(), x, y });
        self.text_order.push(id);
        if let Some(data) = self.element_data.get_mut(&element) {
            data.nodes.push(id);
        }
        id
    }

    /// Convenience: one element with one text line per entry, stacked top-down.
    pub fn from_lines(lines: &[&str]) -> Self {
        let mut tree = Self::new();
        let element = tree.add_element(false);
        for (i, line) in lines.iter().enumerate() {
            tree.add_text(element, line, 0.0, i as f64 * LINE_HEIGHT);
        }
        tree
    }

    /// Text node ids in document order.
    pub fn text_node_ids(&self) -> &[NodeId] {
        &self.text_order
    }

    /// Make all geometry calls fail, simulating unsupported content.
    pub fn poison_geometry(&mut self) {
        self.fail_geometry = true;
    }

    /// Preload the active selection (native-selection capture path).
    pub fn set_selection(&mut self, text: &str) {
        self.selection = Some(text.to_string());
    }

    pub fn set_selection_fragment(&mut self, html: &str) {
        self.selection_fragment = Some(html.to_string());
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn marker_visible(&self, marker: MarkerId) -> Option<bool> {
        self.markers.get(&marker).map(|m| m.visible)
    }

    fn check_geometry(&self) -> Result<(), TreeError> {
        if self.fail_geometry {
            Err(TreeError::Geometry("layout unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn text(&self, node: NodeId) -> Result<&TextData, TreeError> {
        self.text_data.get(&node).ok_or(TreeError::NodeNotFound(node))
    }

    fn char_count(text: &str) -> usize {
        text.chars().count()
    }

    fn slice_chars(text: &str, from: usize, to: usize) -> String {
        text.chars().skip(from).take(to.saturating_sub(from)).collect()
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTree for MemoryTree {
    fn host(&self) -> Option<String> {
        self.host.clone()
    }

    fn elements_from_point(&self, x: f64, y: f64) -> Result<Vec<NodeId>, TreeError> {
        self.check_geometry()?;
        let mut hits = Vec::new();
        for &element in &self.elements {
            let data = &self.element_data[&element];
            let contains = data.nodes.iter().any(|node| {
                self.text_data
                    .get(node)
                    .map(|t| {
                        let w = Self::char_count(&t.text) as f64 * CHAR_WIDTH;
                        Rect::new(t.x, t.y, t.x + w, t.y + LINE_HEIGHT).contains(x, y)
                    })
                    .unwrap_or(false)
            });
            if contains {
                hits.push(element);
            }
        }
        // Nothing directly under the point: the page body still stacks there.
        if hits.is_empty() {
            hits = self.elements.clone();
        }
        Ok(hits)
    }

    fn is_link(&self, element: NodeId) -> bool {
        self.element_data.get(&element).map(|e| e.is_link).unwrap_or(false)
    }

    fn text_nodes(&self, element: NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.element_data
            .get(&element)
            .map(|e| e.nodes.clone())
            .ok_or(TreeError::NodeNotFound(element))
    }

    fn text_len(&self, node: NodeId) -> Result<usize, TreeError> {
        Ok(Self::char_count(&self.text(node)?.text))
    }

    fn node_rects(&self, node: NodeId) -> Result<Vec<Rect>, TreeError> {
        self.check_geometry()?;
        let t = self.text(node)?;
        if t.text.is_empty() {
            return Ok(vec![]);
        }
        let w = Self::char_count(&t.text) as f64 * CHAR_WIDTH;
        Ok(vec![Rect::new(t.x, t.y, t.x + w, t.y + LINE_HEIGHT)])
    }

    fn char_rect(&self, node: NodeId, index: usize) -> Result<Rect, TreeError> {
        self.check_geometry()?;
        let t = self.text(node)?;
        if index >= Self::char_count(&t.text) {
            return Err(TreeError::Geometry(format!("char index {} out of range", index)));
        }
        let left = t.x + index as f64 * CHAR_WIDTH;
        Ok(Rect::new(left, t.y, left + CHAR_WIDTH, t.y + LINE_HEIGHT))
    }

    fn insert_marker(&mut self, at: TextPosition, kind: MarkerKind) -> Result<MarkerId, TreeError> {
        if !self.text_data.contains_key(&at.node) {
            return Err(TreeError::NodeNotFound(at.node));
        }
        let id = self.alloc_id();
        self.markers.insert(id, MarkerData { at, kind, visible: true });
        Ok(id)
    }

    fn remove_marker(&mut self, marker: MarkerId) {
        self.markers.remove(&marker);
    }

    fn set_marker_visible(&mut self, marker: MarkerId, visible: bool) {
        if let Some(m) = self.markers.get_mut(&marker) {
            m.visible = visible;
        }
    }

    fn marker_rect(&self, marker: MarkerId) -> Result<Rect, TreeError> {
        self.check_geometry()?;
        let m = self.markers.get(&marker).ok_or(TreeError::MarkerNotFound(marker))?;
        let t = self.text(m.at.node)?;
        let left = t.x + m.at.offset as f64 * CHAR_WIDTH;
        // Collapsed caret rectangle at the marker position.
        Ok(Rect::new(left, t.y, left, t.y + LINE_HEIGHT))
    }

    fn select_between_markers(&mut self, start: MarkerId, end: MarkerId)
        -> Result<String, TreeError>
    {
        let start_at = self.markers.get(&start).ok_or(TreeError::MarkerNotFound(start))?.at;
        let end_at = self.markers.get(&end).ok_or(TreeError::MarkerNotFound(end))?.at;

        let start_idx = self.text_order.iter().position(|&n| n == start_at.node);
        let end_idx = self.text_order.iter().position(|&n| n == end_at.node);
        let (start_idx, end_idx) = match (start_idx, end_idx) {
            (Some(s), Some(e)) => (s, e),
            _ => return Err(TreeError::NodeNotFound(start_at.node)),
        };

        // A range whose end precedes its start collapses to nothing.
        let text = if start_idx > end_idx
            || (start_idx == end_idx && start_at.offset >= end_at.offset)
        {
            String::new()
        } else if start_idx == end_idx {
            let t = &self.text_data[&start_at.node].text;
            Self::slice_chars(t, start_at.offset, end_at.offset)
        } else {
            let mut parts = Vec::new();
            let first = &self.text_data[&start_at.node].text;
            parts.push(Self::slice_chars(first, start_at.offset, Self::char_count(first)));
            for &node in &self.text_order[start_idx + 1..end_idx] {
                parts.push(self.text_data[&node].text.clone());
            }
            let last = &self.text_data[&end_at.node].text;
            parts.push(Self::slice_chars(last, 0, end_at.offset));
            parts.join("\n")
        };

        self.selection = Some(text.clone());
        Ok(text)
    }

    fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn selection_text(&self) -> String {
        self.selection.clone().unwrap_or_default()
    }

    fn selection_html(&self) -> Option<String> {
        self.selection_fragment.clone()
    }
}

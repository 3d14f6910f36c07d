//! # Logical Selection
//!
//! Document-level selection, independent of any rendering.
//!
//! A selection always denotes valid positions in the document it was
//! created for. Text selections sit at inline positions (inside
//! textblocks); node selections point at the start of a selectable node.

use crate::{Mapping, ModelError, ModelResult, Node, ResolvedPos};
use serde::{Deserialize, Serialize};

/// Logical selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Selection {
    /// Text range (collapsed when anchor == head)
    Text { anchor: usize, head: usize },
    /// Selection of the single node starting at `anchor`
    Node { anchor: usize, size: usize },
}

impl Selection {
    /// Text selection, snapping both ends to valid inline positions
    pub fn text(doc: &Node, anchor: usize, head: usize) -> ModelResult<Selection> {
        let head = doc.resolve(head)?;
        let anchor = doc.resolve(anchor)?;
        let bias = if head.pos >= anchor.pos { 1 } else { -1 };
        let head_pos = find_text_pos(doc, &head, bias).unwrap_or(head.pos);
        let anchor_pos = find_text_pos(doc, &anchor, -bias).unwrap_or(anchor.pos);
        Ok(Selection::Text {
            anchor: anchor_pos,
            head: head_pos,
        })
    }

    /// Collapsed text selection near `pos`
    pub fn cursor(doc: &Node, pos: usize) -> ModelResult<Selection> {
        Self::text(doc, pos, pos)
    }

    /// Node selection of the node starting at `pos`
    pub fn node(doc: &Node, pos: usize) -> ModelResult<Selection> {
        let node = doc.node_at(pos).ok_or(ModelError::NoNodeAt(pos))?;
        if node.is_text() || !node.node_type().selectable {
            return Err(ModelError::NoNodeAt(pos));
        }
        Ok(Selection::Node {
            anchor: pos,
            size: node.node_size(),
        })
    }

    /// Valid selection at the start of the document
    pub fn at_start(doc: &Node) -> Selection {
        Self::cursor(doc, 0).unwrap_or(Selection::Text { anchor: 0, head: 0 })
    }

    pub fn anchor(&self) -> usize {
        match *self {
            Selection::Text { anchor, .. } | Selection::Node { anchor, .. } => anchor,
        }
    }

    pub fn head(&self) -> usize {
        match *self {
            Selection::Text { head, .. } => head,
            Selection::Node { anchor, size } => anchor + size,
        }
    }

    pub fn from(&self) -> usize {
        self.anchor().min(self.head())
    }

    pub fn to(&self) -> usize {
        self.anchor().max(self.head())
    }

    pub fn empty(&self) -> bool {
        self.from() == self.to()
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Selection::Node { .. })
    }

    pub fn resolve_anchor(&self, doc: &Node) -> ModelResult<ResolvedPos> {
        doc.resolve(self.anchor())
    }

    pub fn resolve_head(&self, doc: &Node) -> ModelResult<ResolvedPos> {
        doc.resolve(self.head())
    }

    /// Map through a change; node selections whose node was deleted fall back to a cursor
    pub fn map(&self, mapping: &Mapping, doc: &Node) -> Selection {
        match *self {
            Selection::Text { anchor, head } => {
                let anchor = mapping.map(anchor, 1).min(doc.content_size());
                let head = mapping.map(head, 1).min(doc.content_size());
                Self::text(doc, anchor, head).unwrap_or_else(|_| Self::at_start(doc))
            }
            Selection::Node { anchor, .. } => {
                let result = mapping.map_result(anchor, 1);
                let pos = result.pos.min(doc.content_size());
                if !result.deleted {
                    if let Ok(sel) = Self::node(doc, pos) {
                        return sel;
                    }
                }
                Self::cursor(doc, pos).unwrap_or_else(|_| Self::at_start(doc))
            }
        }
    }

    /// Make sure the selection is valid for `doc`
    pub fn clamp(&self, doc: &Node) -> Selection {
        let size = doc.content_size();
        match *self {
            Selection::Text { anchor, head } => {
                Self::text(doc, anchor.min(size), head.min(size)).unwrap_or_else(|_| Self::at_start(doc))
            }
            Selection::Node { anchor, size: node_size } => match Self::node(doc, anchor.min(size)) {
                Ok(sel @ Selection::Node { size, .. }) if size == node_size => sel,
                _ => Self::cursor(doc, anchor.min(size)).unwrap_or_else(|_| Self::at_start(doc)),
            },
        }
    }
}

/// Nearest position inside a textblock, searching in direction `bias` first
fn find_text_pos(doc: &Node, pos: &ResolvedPos, bias: i32) -> Option<usize> {
    if pos.parent().is_textblock() {
        return Some(pos.pos);
    }
    let forward = scan_textblock(doc, pos.pos, true);
    let backward = scan_textblock(doc, pos.pos, false);
    if bias >= 0 {
        forward.or(backward)
    } else {
        backward.or(forward)
    }
}

/// First textblock content position at or after (or before) `pos`
fn scan_textblock(doc: &Node, pos: usize, forward: bool) -> Option<usize> {
    let mut found: Option<usize> = None;
    doc.nodes_between(0, doc.content_size(), &mut |node, start| {
        if node.is_textblock() {
            let content_start = start + 1;
            let content_end = content_start + node.content_size();
            if forward && content_start >= pos && found.is_none() {
                found = Some(content_start);
            } else if !forward && content_end <= pos {
                found = Some(content_end);
            }
            return false;
        }
        true
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attrs, Schema, StepMap};

    #[test]
    fn test_cursor_snaps_into_textblock() {
        let doc = Schema::basic().doc_of_paragraphs(&["Hello", "World"]).unwrap();
        let sel = Selection::cursor(&doc, 0).unwrap();
        assert_eq!(sel, Selection::Text { anchor: 1, head: 1 });

        let between = Selection::cursor(&doc, 7).unwrap();
        assert_eq!(between.head(), 8);
    }

    #[test]
    fn test_node_selection() {
        let schema = Schema::basic();
        let hr = schema.node("horizontal_rule", Attrs::new(), Vec::new()).unwrap();
        let p = schema
            .node("paragraph", Attrs::new(), vec![schema.text("Hi", Vec::new()).unwrap()])
            .unwrap();
        let doc = schema.node("doc", Attrs::new(), vec![p, hr]).unwrap();

        let sel = Selection::node(&doc, 4).unwrap();
        assert_eq!(sel.from(), 4);
        assert_eq!(sel.to(), 5);
        assert!(sel.is_node());
        assert!(Selection::node(&doc, 2).is_err());
    }

    #[test]
    fn test_map_through_insertion() {
        let doc = Schema::basic().doc_of_paragraphs(&["Hello world"]).unwrap();
        let mut mapping = Mapping::new();
        mapping.push(StepMap::replace(6, 0, 6));
        let sel = Selection::Text { anchor: 6, head: 6 }.map(&mapping, &doc);
        assert_eq!(sel, Selection::Text { anchor: 12, head: 12 });
    }

    #[test]
    fn test_clamp_keeps_positions_in_range() {
        let doc = Schema::basic().doc_of_paragraphs(&["Hi"]).unwrap();
        let sel = Selection::Text { anchor: 40, head: 40 }.clamp(&doc);
        assert_eq!(sel, Selection::Text { anchor: 3, head: 3 });
    }

    #[test]
    fn test_serde_round_trip() {
        let sel = Selection::Node { anchor: 3, size: 1 };
        let json = serde_json::to_string(&sel).unwrap();
        assert_eq!(serde_json::from_str::<Selection>(&json).unwrap(), sel);
    }
}

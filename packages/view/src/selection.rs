//! # Selection Synchronizer
//!
//! Moves the logical selection into the platform selection and back.
//!
//! Writes are idempotent: writing the selection the platform already has
//! is not a write. Node selections are shown by stamping the selected
//! node's DOM and spanning the platform range over exactly that node.

use crate::dom::{Capabilities, Dom, DomPoint, DomSelection};
use crate::viewdesc::{DescId, ViewDesc};
use tracing::trace;
use verso_model::{Mapping, Node, Selection};

/// Turns an anchor/head position pair into a selection, overriding the default
pub type SelectionBetween<'a> = &'a dyn Fn(usize, usize) -> Option<Selection>;

#[derive(Debug, Default)]
pub struct SelectionSync {
    /// Descriptor currently stamped as the selected node
    selected: Option<DescId>,
    /// Platform selection as of the last write or read
    observed: Option<DomSelection>,
}

impl SelectionSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observed(&self) -> Option<DomSelection> {
        self.observed
    }

    pub fn set_observed(&mut self, observed: Option<DomSelection>) {
        self.observed = observed;
    }

    pub fn selected_node(&self) -> Option<DescId> {
        self.selected
    }

    /// Platform selection showing `sel`
    pub fn dom_selection(&self, dom: &Dom, doc_view: &ViewDesc, sel: &Selection) -> Option<DomSelection> {
        match *sel {
            Selection::Node { anchor, .. } => {
                let desc = doc_view.desc_at(anchor)?;
                let parent = dom.parent(desc.dom())?;
                let index = dom.index_in_parent(desc.dom())?;
                Some(DomSelection {
                    anchor: DomPoint::new(parent, index),
                    head: DomPoint::new(parent, index + 1),
                })
            }
            Selection::Text { anchor, head } => {
                let (anchor_side, head_side) = if anchor <= head { (1, -1) } else { (-1, 1) };
                let anchor_side = if anchor == head { -1 } else { anchor_side };
                Some(DomSelection {
                    anchor: doc_view.dom_from_pos(dom, anchor, anchor_side)?,
                    head: doc_view.dom_from_pos(dom, head, head_side)?,
                })
            }
        }
    }

    /// Write `sel` into the platform. With `force` the write happens even
    /// when the platform already reports the same range.
    pub fn write(&mut self, dom: &mut Dom, doc_view: &mut ViewDesc, sel: &Selection, force: bool) -> bool {
        self.sync_node_selection(dom, doc_view, sel);
        let target = self.dom_selection(dom, doc_view, sel);
        let wrote = if force {
            dom.replace_selection(target);
            true
        } else {
            dom.set_selection(target)
        };
        trace!(?sel, force, wrote, "Wrote selection");
        self.observed = dom.selection();
        wrote
    }

    /// Whether the platform currently shows `sel`
    pub fn visually_matches(&self, dom: &Dom, doc_view: &ViewDesc, sel: &Selection) -> bool {
        dom.selection().is_some() && dom.selection() == self.dom_selection(dom, doc_view, sel)
    }

    /// Move the selected-node stamp to the node `sel` selects, if any
    pub fn sync_node_selection(&mut self, dom: &mut Dom, doc_view: &mut ViewDesc, sel: &Selection) {
        let target = match *sel {
            Selection::Node { anchor, .. } => doc_view.desc_at(anchor).map(ViewDesc::id),
            Selection::Text { .. } => None,
        };
        if target == self.selected {
            return;
        }
        if let Some(old) = self.selected.take() {
            if let Some(desc) = doc_view.find_mut(old) {
                desc.deselect_node(dom);
            }
        }
        if let Some(id) = target {
            if let Some(desc) = doc_view.find_mut(id) {
                desc.select_node(dom);
                self.selected = Some(id);
            }
        }
    }

    /// Logical selection for the platform selection.
    ///
    /// `mapping` carries positions through text changes the DOM already
    /// shows but the tree doesn't yet.
    pub fn read(
        &mut self,
        dom: &Dom,
        doc_view: &ViewDesc,
        doc: &Node,
        mapping: Option<&Mapping>,
        between: Option<SelectionBetween<'_>>,
    ) -> Option<Selection> {
        let dom_sel = dom.selection()?;
        self.observed = Some(dom_sel);

        if let Some(sel) = read_node_selection(dom, doc_view, doc, &dom_sel) {
            return Some(sel);
        }
        let anchor = resolve_point(dom, doc_view, dom_sel.anchor, mapping)?;
        let head = resolve_point(dom, doc_view, dom_sel.head, mapping)?;
        if let Some(sel) = between.and_then(|f| f(anchor, head)) {
            return Some(sel.clamp(doc));
        }
        Selection::text(doc, anchor, head).ok()
    }
}

/// A platform range spanning exactly one selectable node's DOM
fn read_node_selection(dom: &Dom, doc_view: &ViewDesc, doc: &Node, sel: &DomSelection) -> Option<Selection> {
    let (from, to) = if sel.anchor.offset <= sel.head.offset {
        (sel.anchor, sel.head)
    } else {
        (sel.head, sel.anchor)
    };
    if from.node != to.node || dom.is_text(from.node) || to.offset != from.offset + 1 {
        return None;
    }
    let child = *dom.children(from.node).get(from.offset)?;
    let (desc, start) = doc_view.nearest_desc(dom, child)?;
    if desc.dom() != child || desc.is_text() || desc.node().is_none() {
        return None;
    }
    Selection::node(doc, start).ok()
}

fn resolve_point(dom: &Dom, doc_view: &ViewDesc, point: DomPoint, mapping: Option<&Mapping>) -> Option<usize> {
    let Some(mapping) = mapping else {
        return doc_view.pos_from_dom(dom, point);
    };
    let (desc, start) = doc_view.nearest_desc(dom, point.node)?;
    if desc.is_text() && desc.node_dom() == Some(point.node) {
        // Offset is already in terms of the new text
        return Some(mapping.map(start, -1) + point.offset);
    }
    doc_view.pos_from_dom(dom, point).map(|pos| mapping.map(pos, 1))
}

/// Platform selection workaround policy
pub trait SelectionCompat {
    /// Whether a patch between these selections leaves the platform showing
    /// a stale selection, so the next write must be forced
    fn force_resync(
        &self,
        capabilities: Capabilities,
        prev_doc: &Node,
        prev: &Selection,
        doc: &Node,
        next: &Selection,
    ) -> bool;
}

/// Forces a resync when both selections are ranges and the block that
/// contains them changed
#[derive(Debug, Default, Clone, Copy)]
pub struct SharedAncestorPolicy;

impl SelectionCompat for SharedAncestorPolicy {
    fn force_resync(
        &self,
        capabilities: Capabilities,
        prev_doc: &Node,
        prev: &Selection,
        doc: &Node,
        next: &Selection,
    ) -> bool {
        if !capabilities.stale_selection_on_mutation || prev.empty() || next.empty() {
            return false;
        }
        let (Ok(prev_anchor), Ok(next_anchor)) = (prev.resolve_anchor(prev_doc), next.resolve_anchor(doc)) else {
            return false;
        };
        let depth = prev_anchor
            .shared_depth(prev.head())
            .min(next_anchor.shared_depth(next.head()));
        prev_anchor.start(depth) != next_anchor.start(depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::DecorationSet;
    use crate::props::NodeViewRegistry;
    use crate::viewdesc::{RenderCx, RenderStats};
    use crate::DomId;
    use verso_model::{Attrs, Schema};

    fn render(doc: &Node) -> (Dom, DomId, ViewDesc) {
        let mut dom = Dom::new();
        let mount = dom.create_element("div");
        let views = NodeViewRegistry::default();
        let mut stats = RenderStats::default();
        let desc = {
            let mut cx = RenderCx {
                dom: &mut dom,
                views: &views,
                stats: &mut stats,
                editable: true,
            };
            ViewDesc::create_doc(&mut cx, mount, doc, &[], &DecorationSet::empty())
        };
        (dom, mount, desc)
    }

    #[test]
    fn test_text_selection_round_trip() {
        let doc = Schema::basic().doc_of_paragraphs(&["Hello", "World"]).unwrap();
        let (mut dom, _, mut desc) = render(&doc);
        let mut sync = SelectionSync::new();

        for sel in [
            Selection::Text { anchor: 3, head: 3 },
            Selection::Text { anchor: 2, head: 10 },
            Selection::Text { anchor: 12, head: 1 },
        ] {
            sync.write(&mut dom, &mut desc, &sel, false);
            assert_eq!(sync.read(&dom, &desc, &doc, None, None), Some(sel));
        }
    }

    #[test]
    fn test_write_is_idempotent() {
        let doc = Schema::basic().doc_of_paragraphs(&["Hello"]).unwrap();
        let (mut dom, _, mut desc) = render(&doc);
        let mut sync = SelectionSync::new();
        let sel = Selection::Text { anchor: 2, head: 4 };

        assert!(sync.write(&mut dom, &mut desc, &sel, false));
        assert!(!sync.write(&mut dom, &mut desc, &sel, false));
        assert_eq!(dom.selection_writes(), 1);
        assert!(sync.write(&mut dom, &mut desc, &sel, true));
        assert_eq!(dom.selection_writes(), 2);
        assert!(sync.visually_matches(&dom, &desc, &sel));
    }

    #[test]
    fn test_node_selection_stamps_node() {
        let schema = Schema::basic();
        let doc = schema
            .node(
                "doc",
                Attrs::new(),
                vec![
                    schema.node("paragraph", Attrs::new(), vec![schema.text("a", vec![]).unwrap()]).unwrap(),
                    schema.node("horizontal_rule", Attrs::new(), vec![]).unwrap(),
                ],
            )
            .unwrap();
        let (mut dom, mount, mut desc) = render(&doc);
        let mut sync = SelectionSync::new();
        let sel = Selection::node(&doc, 3).unwrap();

        sync.write(&mut dom, &mut desc, &sel, false);
        let hr = dom.children(mount)[1];
        assert!(dom.has_class(hr, crate::node_view::SELECTED_NODE_CLASS));
        assert_eq!(
            dom.selection(),
            Some(DomSelection {
                anchor: DomPoint::new(mount, 1),
                head: DomPoint::new(mount, 2),
            })
        );
        assert_eq!(sync.read(&dom, &desc, &doc, None, None), Some(sel));

        sync.write(&mut dom, &mut desc, &Selection::Text { anchor: 1, head: 1 }, false);
        assert!(!dom.has_class(hr, crate::node_view::SELECTED_NODE_CLASS));
    }

    #[test]
    fn test_selection_between_override() {
        let doc = Schema::basic().doc_of_paragraphs(&["Hello"]).unwrap();
        let (mut dom, _, mut desc) = render(&doc);
        let mut sync = SelectionSync::new();
        sync.write(&mut dom, &mut desc, &Selection::Text { anchor: 1, head: 4 }, false);

        let collapse = |_anchor: usize, head: usize| Some(Selection::Text { anchor: head, head });
        let read = sync.read(&dom, &desc, &doc, None, Some(&collapse));
        assert_eq!(read, Some(Selection::Text { anchor: 4, head: 4 }));
    }

    #[test]
    fn test_shared_ancestor_policy() {
        let schema = Schema::basic();
        let doc = schema.doc_of_paragraphs(&["Hello", "World"]).unwrap();
        let quirky = Capabilities {
            stale_selection_on_mutation: true,
            ..Capabilities::default()
        };
        let policy = SharedAncestorPolicy;
        let inside_first = Selection::Text { anchor: 1, head: 3 };
        let inside_second = Selection::Text { anchor: 8, head: 10 };
        let cursor = Selection::Text { anchor: 2, head: 2 };

        assert!(policy.force_resync(quirky, &doc, &inside_first, &doc, &inside_second));
        assert!(!policy.force_resync(quirky, &doc, &inside_first, &doc, &inside_first));
        assert!(!policy.force_resync(quirky, &doc, &inside_first, &doc, &cursor));
        assert!(!policy.force_resync(Capabilities::default(), &doc, &inside_first, &doc, &inside_second));
    }
}

//! # Headless DOM
//!
//! In-memory rendering platform the view reconciles against.
//!
//! Nodes live in an arena and are addressed by [`DomId`]. Every node can
//! carry the id of the descriptor that owns it, which is how platform
//! locations are mapped back to document positions.
//!
//! ## Mutation observation
//!
//! Every tree, attribute or text change bumps [`Dom::mutation_count`].
//! While the observer is not paused the change is also queued as a
//! [`MutationRecord`], which the view later reads as an external edit.
//! The view itself mutates the tree only while holding an
//! [`ObserverPause`] guard.

use crate::layout::Metrics;
use crate::viewdesc::DescId;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use tracing::trace;

/// Handle to a node in the [`Dom`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomId(pub(crate) usize);

impl DomId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Element or text payload
#[derive(Debug, Clone, PartialEq)]
pub enum DomData {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct DomNode {
    pub data: DomData,
    pub parent: Option<DomId>,
    pub children: Vec<DomId>,
    pub(crate) desc: Option<DescId>,
}

/// What an observed mutation touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes { name: String },
    CharacterData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: DomId,
    pub kind: MutationKind,
}

/// A location in the DOM: a text offset for text nodes, a child index for elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomPoint {
    pub node: DomId,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(node: DomId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Platform selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomSelection {
    pub anchor: DomPoint,
    pub head: DomPoint,
}

impl DomSelection {
    pub fn collapsed(point: DomPoint) -> Self {
        Self {
            anchor: point,
            head: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }
}

/// Visible part of the scrollable surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll_top: 0.0,
            height: 200.0,
        }
    }
}

/// Platform behaviors the view adapts to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The platform keeps scroll anchored across layout shifts by itself
    pub scroll_anchoring: bool,
    /// The platform corrupts the visible selection when nodes near it mutate
    pub stale_selection_on_mutation: bool,
}

/// RAII guard pausing mutation recording; guards nest
pub struct ObserverPause {
    depth: Rc<Cell<u32>>,
}

impl Drop for ObserverPause {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// The in-memory platform
#[derive(Debug)]
pub struct Dom {
    nodes: HashMap<DomId, DomNode>,
    next_id: usize,
    paused: Rc<Cell<u32>>,
    records: Vec<MutationRecord>,
    mutation_count: u64,
    selection: Option<DomSelection>,
    selection_writes: u64,
    focused: bool,
    viewport: Viewport,
    capabilities: Capabilities,
    metrics: Metrics,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 1,
            paused: Rc::new(Cell::new(0)),
            records: Vec::new(),
            mutation_count: 0,
            selection: None,
            selection_writes: 0,
            focused: false,
            viewport: Viewport::default(),
            capabilities: Capabilities::default(),
            metrics: Metrics::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    fn alloc(&mut self, data: DomData) -> DomId {
        let id = DomId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            DomNode {
                data,
                parent: None,
                children: Vec::new(),
                desc: None,
            },
        );
        id
    }

    pub fn create_element(&mut self, tag: &str) -> DomId {
        self.alloc(DomData::Element {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> DomId {
        self.alloc(DomData::Text(text.to_string()))
    }

    pub fn node(&self, id: DomId) -> Option<&DomNode> {
        self.nodes.get(&id)
    }

    pub fn exists(&self, id: DomId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn tag(&self, id: DomId) -> Option<&str> {
        match &self.nodes.get(&id)?.data {
            DomData::Element { tag, .. } => Some(tag),
            DomData::Text(_) => None,
        }
    }

    pub fn text(&self, id: DomId) -> Option<&str> {
        match &self.nodes.get(&id)?.data {
            DomData::Text(text) => Some(text),
            DomData::Element { .. } => None,
        }
    }

    pub fn is_text(&self, id: DomId) -> bool {
        self.text(id).is_some()
    }

    pub fn attr(&self, id: DomId, name: &str) -> Option<&str> {
        match &self.nodes.get(&id)?.data {
            DomData::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            DomData::Text(_) => None,
        }
    }

    pub fn attrs(&self, id: DomId) -> Option<&BTreeMap<String, String>> {
        match &self.nodes.get(&id)?.data {
            DomData::Element { attrs, .. } => Some(attrs),
            DomData::Text(_) => None,
        }
    }

    pub fn parent(&self, id: DomId) -> Option<DomId> {
        self.nodes.get(&id)?.parent
    }

    pub fn children(&self, id: DomId) -> &[DomId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_in_parent(&self, id: DomId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Whether `ancestor` is `id` or one of its ancestors
    pub fn contains(&self, ancestor: DomId, id: DomId) -> bool {
        let mut cur = Some(id);
        while let Some(node) = cur {
            if node == ancestor {
                return true;
            }
            cur = self.parent(node);
        }
        false
    }

    /// Concatenated text of a subtree
    pub fn text_content(&self, id: DomId) -> String {
        match self.nodes.get(&id).map(|n| &n.data) {
            Some(DomData::Text(text)) => text.clone(),
            Some(DomData::Element { .. }) => self
                .children(id)
                .iter()
                .map(|&c| self.text_content(c))
                .collect(),
            None => String::new(),
        }
    }

    /// Compact markup rendering, used by tests and debugging
    pub fn to_html(&self, id: DomId) -> String {
        match self.nodes.get(&id).map(|n| &n.data) {
            Some(DomData::Text(text)) => text.clone(),
            Some(DomData::Element { tag, attrs }) => {
                let mut out = format!("<{}", tag);
                for (name, value) in attrs {
                    out.push_str(&format!(" {}=\"{}\"", name, value));
                }
                out.push('>');
                for &child in self.children(id) {
                    out.push_str(&self.to_html(child));
                }
                out.push_str(&format!("</{}>", tag));
                out
            }
            None => String::new(),
        }
    }

    // ---- descriptor tags ----

    pub(crate) fn set_desc(&mut self, id: DomId, desc: Option<DescId>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.desc = desc;
        }
    }

    pub(crate) fn desc_of(&self, id: DomId) -> Option<DescId> {
        self.nodes.get(&id)?.desc
    }

    // ---- mutations ----

    fn record(&mut self, target: DomId, kind: MutationKind) {
        self.mutation_count += 1;
        if self.paused.get() == 0 {
            trace!(target = target.0, kind = ?kind, "Recording mutation");
            self.records.push(MutationRecord { target, kind });
        }
    }

    pub fn set_attr(&mut self, id: DomId, name: &str, value: &str) {
        let changed = match self.nodes.get_mut(&id).map(|n| &mut n.data) {
            Some(DomData::Element { attrs, .. }) => {
                if attrs.get(name).map(String::as_str) == Some(value) {
                    false
                } else {
                    attrs.insert(name.to_string(), value.to_string());
                    true
                }
            }
            _ => false,
        };
        if changed {
            self.record(
                id,
                MutationKind::Attributes {
                    name: name.to_string(),
                },
            );
        }
    }

    pub fn remove_attr(&mut self, id: DomId, name: &str) {
        let changed = match self.nodes.get_mut(&id).map(|n| &mut n.data) {
            Some(DomData::Element { attrs, .. }) => attrs.remove(name).is_some(),
            _ => false,
        };
        if changed {
            self.record(
                id,
                MutationKind::Attributes {
                    name: name.to_string(),
                },
            );
        }
    }

    pub fn set_text(&mut self, id: DomId, value: &str) {
        let changed = match self.nodes.get_mut(&id).map(|n| &mut n.data) {
            Some(DomData::Text(text)) if text != value => {
                *text = value.to_string();
                true
            }
            _ => false,
        };
        if changed {
            self.record(id, MutationKind::CharacterData);
        }
    }

    pub fn has_class(&self, id: DomId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, id: DomId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let value = match self.attr(id, "class") {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &value);
    }

    pub fn remove_class(&mut self, id: DomId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let value: Vec<&str> = self
            .attr(id, "class")
            .unwrap_or_default()
            .split_whitespace()
            .filter(|c| *c != class)
            .collect();
        if value.is_empty() {
            self.remove_attr(id, "class");
        } else {
            let joined = value.join(" ");
            self.set_attr(id, "class", &joined);
        }
    }

    /// Value of one `name: value` entry of the style attribute
    pub fn style(&self, id: DomId, property: &str) -> Option<String> {
        self.attr(id, "style")?.split(';').find_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            (name.trim() == property).then(|| value.trim().to_string())
        })
    }

    /// Detach `child` from its parent, if any
    pub fn detach(&mut self, child: DomId) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|&c| c != child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
        self.record(parent, MutationKind::ChildList);
    }

    /// Insert `child` into `parent` before `before` (appending when `None`)
    pub fn insert_before(&mut self, parent: DomId, child: DomId, before: Option<DomId>) {
        if !self.exists(parent) || !self.exists(child) || self.contains(child, parent) {
            return;
        }
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&parent) {
            let index = before
                .and_then(|b| node.children.iter().position(|&c| c == b))
                .unwrap_or(node.children.len());
            node.children.insert(index, child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        self.record(parent, MutationKind::ChildList);
    }

    pub fn append_child(&mut self, parent: DomId, child: DomId) {
        self.insert_before(parent, child, None);
    }

    /// Make `parent`'s children exactly `desired`, moving only what is out of place
    pub fn sync_children(&mut self, parent: DomId, desired: &[DomId]) {
        for (i, &child) in desired.iter().enumerate() {
            let current = self.children(parent).get(i).copied();
            if current == Some(child) {
                continue;
            }
            self.insert_before(parent, child, current);
        }
        while let Some(&extra) = self.children(parent).get(desired.len()) {
            self.detach(extra);
        }
    }

    /// Detach and free `id` with its subtree.
    ///
    /// Descendants tagged with a descriptor other than `owner` are only
    /// detached: they belong to descriptors that free them on their own.
    pub fn release(&mut self, id: DomId, owner: Option<DescId>) {
        self.detach(id);
        self.free(id, owner);
    }

    fn free(&mut self, id: DomId, owner: Option<DescId>) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        for child in node.children {
            let foreign = match self.desc_of(child) {
                Some(desc) => Some(desc) != owner,
                None => false,
            };
            if foreign {
                if let Some(n) = self.nodes.get_mut(&child) {
                    n.parent = None;
                }
            } else {
                self.free(child, owner);
            }
        }
        if let Some(sel) = self.selection {
            if sel.anchor.node == id || sel.head.node == id {
                self.selection = None;
            }
        }
    }

    /// Pause mutation recording until the returned guard drops
    pub fn pause_observer(&self) -> ObserverPause {
        self.paused.set(self.paused.get() + 1);
        ObserverPause {
            depth: self.paused.clone(),
        }
    }

    pub fn observer_paused(&self) -> bool {
        self.paused.get() > 0
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn pending_records(&self) -> &[MutationRecord] {
        &self.records
    }

    pub fn mutation_count(&self) -> u64 {
        self.mutation_count
    }

    // ---- selection, focus, viewport ----

    pub fn selection(&self) -> Option<DomSelection> {
        self.selection
    }

    /// Write the platform selection; identical writes are not counted
    pub fn set_selection(&mut self, selection: Option<DomSelection>) -> bool {
        if self.selection == selection {
            return false;
        }
        self.selection = selection;
        self.selection_writes += 1;
        true
    }

    /// Write the platform selection even when it already has this value
    pub fn replace_selection(&mut self, selection: Option<DomSelection>) {
        self.selection = selection;
        self.selection_writes += 1;
    }

    pub fn selection_writes(&self) -> u64 {
        self.selection_writes
    }

    pub fn has_focus(&self) -> bool {
        self.focused
    }

    pub fn set_focus(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport.height = height;
    }

    pub fn set_scroll_top(&mut self, scroll_top: f64) {
        self.viewport.scroll_top = scroll_top.max(0.0);
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_operations() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        let p = dom.create_element("p");
        let text = dom.create_text("hi");
        dom.append_child(root, p);
        dom.append_child(p, text);

        assert_eq!(dom.to_html(root), "<div><p>hi</p></div>");
        assert_eq!(dom.parent(text), Some(p));
        assert!(dom.contains(root, text));
        assert_eq!(dom.index_in_parent(p), Some(0));
    }

    #[test]
    fn test_records_only_when_not_paused() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        dom.set_attr(root, "class", "a");
        {
            let _outer = dom.pause_observer();
            let _inner = dom.pause_observer();
            dom.set_attr(root, "class", "b");
        }
        assert!(!dom.observer_paused());
        dom.set_attr(root, "class", "c");

        assert_eq!(dom.take_records().len(), 2);
        assert_eq!(dom.mutation_count(), 3);
    }

    #[test]
    fn test_unchanged_writes_are_not_mutations() {
        let mut dom = Dom::new();
        let text = dom.create_text("same");
        dom.set_text(text, "same");
        let el = dom.create_element("p");
        dom.set_attr(el, "id", "x");
        dom.set_attr(el, "id", "x");
        assert_eq!(dom.mutation_count(), 1);
    }

    #[test]
    fn test_sync_children_moves_minimally() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        let a = dom.create_element("a");
        let b = dom.create_element("b");
        let c = dom.create_element("c");
        dom.sync_children(root, &[a, b, c]);
        let before = dom.mutation_count();
        dom.sync_children(root, &[a, b, c]);
        assert_eq!(dom.mutation_count(), before);

        dom.sync_children(root, &[a, c]);
        assert_eq!(dom.children(root), &[a, c]);
        assert_eq!(dom.parent(b), None);
    }

    #[test]
    fn test_release_keeps_foreign_descendants() {
        let mut dom = Dom::new();
        let outer = dom.create_element("p");
        let owned = dom.create_text("owned");
        let foreign = dom.create_text("foreign");
        dom.append_child(outer, owned);
        dom.append_child(outer, foreign);
        dom.set_desc(outer, Some(DescId(1)));
        dom.set_desc(foreign, Some(DescId(2)));

        dom.release(outer, Some(DescId(1)));
        assert!(!dom.exists(outer));
        assert!(!dom.exists(owned));
        assert!(dom.exists(foreign));
        assert_eq!(dom.parent(foreign), None);
    }

    #[test]
    fn test_class_helpers() {
        let mut dom = Dom::new();
        let el = dom.create_element("p");
        dom.add_class(el, "one");
        dom.add_class(el, "two");
        dom.add_class(el, "one");
        assert_eq!(dom.attr(el, "class"), Some("one two"));
        dom.remove_class(el, "one");
        assert_eq!(dom.attr(el, "class"), Some("two"));
        dom.remove_class(el, "two");
        assert_eq!(dom.attr(el, "class"), None);
    }

    #[test]
    fn test_selection_writes_counted_once() {
        let mut dom = Dom::new();
        let text = dom.create_text("abc");
        let sel = DomSelection::collapsed(DomPoint::new(text, 1));
        assert!(dom.set_selection(Some(sel)));
        assert!(!dom.set_selection(Some(sel)));
        assert_eq!(dom.selection_writes(), 1);
    }
}

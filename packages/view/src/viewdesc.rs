//! # Rendered-Node Tree
//!
//! One [`ViewDesc`] per rendered document node, plus descriptors for mark
//! wrappers and widgets. A descriptor owns the DOM it created and
//! remembers the node and decorations it was last rendered with, so an
//! update can be skipped when nothing relevant changed.
//!
//! ## Update protocol
//!
//! ```text
//! matches_node ──yes──▶ reuse as is
//!      │no
//!      ▼
//! update ──true──▶ patched in place (text, attributes, children)
//!      │false
//!      ▼
//! destroy + create
//! ```
//!
//! `update` fails when the node's markup changed, when the descriptor was
//! marked [`Dirty::Node`], or when a custom node view refuses the new
//! node. Callers fall back to rebuilding that subtree.
//!
//! Positions are never stored. A descriptor's position is the sum of the
//! sizes of everything before it, computed on demand.

use crate::decoration::{same_outer_deco, DecoAttrs, Decoration, DecorationSet};
use crate::dom::{Dom, DomId, DomPoint};
use crate::node_view::{MarkView, NodeView, NodeViewContext, SELECTED_NODE_CLASS};
use crate::props::NodeViewRegistry;
use crate::updater;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{instrument, trace};
use verso_model::{Mark, Node};

static NEXT_DESC_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a descriptor, stable for its whole life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescId(pub(crate) u64);

impl DescId {
    fn next() -> Self {
        DescId(NEXT_DESC_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// How much of a descriptor must be redrawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Dirty {
    #[default]
    Clean,
    /// A descendant is dirty
    Child,
    /// The content DOM was touched from outside
    Content,
    /// The node's own DOM was touched from outside; only a rebuild fixes it
    Node,
}

/// Descriptor lifecycle counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub created: u64,
    pub destroyed: u64,
    pub updated: u64,
}

/// What a render pass works with
pub(crate) struct RenderCx<'a> {
    pub dom: &'a mut Dom,
    pub views: &'a NodeViewRegistry,
    pub stats: &'a mut RenderStats,
    pub editable: bool,
}

pub(crate) struct NodeDesc {
    node: Node,
    outer: Vec<Decoration>,
    inner: DecorationSet,
    /// The node's own DOM, inside any decoration wrappers
    node_dom: DomId,
    /// Attribute levels from outer decorations, innermost first
    levels: Vec<DecoAttrs>,
    /// DOM receiving each level; the last one is the outer DOM
    level_doms: Vec<DomId>,
    custom: Option<Box<dyn NodeView>>,
    root: bool,
}

pub(crate) struct MarkDesc {
    mark: Mark,
    custom: Option<Box<dyn MarkView>>,
}

pub(crate) struct WidgetDesc {
    deco: Decoration,
}

pub(crate) enum DescKind {
    Node(NodeDesc),
    Mark(MarkDesc),
    Widget(WidgetDesc),
}

pub struct ViewDesc {
    id: DescId,
    kind: DescKind,
    dom: DomId,
    content_dom: Option<DomId>,
    children: Vec<ViewDesc>,
    dirty: Dirty,
}

impl fmt::Debug for ViewDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            DescKind::Node(nd) => format!("node({})", nd.node.type_name()),
            DescKind::Mark(md) => format!("mark({})", md.mark.name()),
            DescKind::Widget(_) => "widget".to_string(),
        };
        f.debug_struct("ViewDesc")
            .field("id", &self.id)
            .field("kind", &kind)
            .field("dom", &self.dom)
            .field("dirty", &self.dirty)
            .field("children", &self.children)
            .finish()
    }
}

impl ViewDesc {
    // ---- construction ----

    /// Descriptor for the document, rendered into `mount`
    #[instrument(skip_all, fields(mount = mount.index(), blocks = doc.child_count()))]
    pub(crate) fn create_doc(
        cx: &mut RenderCx<'_>,
        mount: DomId,
        doc: &Node,
        outer: &[Decoration],
        inner: &DecorationSet,
    ) -> ViewDesc {
        let id = DescId::next();
        cx.dom.set_desc(mount, Some(id));
        let levels = compute_levels(outer, false, true);
        let level_doms = build_level_doms(cx.dom, id, mount, &levels);
        let mut desc = ViewDesc {
            id,
            kind: DescKind::Node(NodeDesc {
                node: doc.clone(),
                outer: outer.to_vec(),
                inner: inner.clone(),
                node_dom: mount,
                levels,
                level_doms,
                custom: None,
                root: true,
            }),
            dom: mount,
            content_dom: Some(mount),
            children: Vec::new(),
            dirty: Dirty::Clean,
        };
        desc.update_children(cx, doc, inner, 0);
        cx.stats.created += 1;
        desc
    }

    pub(crate) fn create_node(
        cx: &mut RenderCx<'_>,
        node: &Node,
        outer: &[Decoration],
        inner: &DecorationSet,
        pos: usize,
    ) -> ViewDesc {
        let id = DescId::next();
        let (node_dom, content_dom, custom) = match cx.views.node_view(node.type_name()) {
            Some(factory) => {
                let ctx = NodeViewContext {
                    node,
                    pos,
                    outer,
                    inner,
                    editable: cx.editable,
                };
                let view = factory(&ctx, cx.dom);
                let content = if node.is_leaf() { None } else { view.content_dom() };
                (view.dom(), content, Some(view))
            }
            None => match node.text() {
                Some(text) => (cx.dom.create_text(text), None, None),
                None => {
                    let tag = node.node_type().tag.clone();
                    let el = cx.dom.create_element(&tag);
                    for (name, value) in node.attrs() {
                        cx.dom.set_attr(el, name, value);
                    }
                    if node.is_leaf() && tag != "br" {
                        cx.dom.set_attr(el, "contenteditable", "false");
                    }
                    (el, (!node.is_leaf()).then_some(el), None)
                }
            },
        };
        cx.dom.set_desc(node_dom, Some(id));
        if let Some(content) = content_dom {
            cx.dom.set_desc(content, Some(id));
        }

        let levels = compute_levels(outer, node.is_text(), false);
        let level_doms = build_level_doms(cx.dom, id, node_dom, &levels);
        let dom = level_doms.last().copied().unwrap_or(node_dom);
        let mut desc = ViewDesc {
            id,
            kind: DescKind::Node(NodeDesc {
                node: node.clone(),
                outer: outer.to_vec(),
                inner: inner.clone(),
                node_dom,
                levels,
                level_doms,
                custom,
                root: false,
            }),
            dom,
            content_dom,
            children: Vec::new(),
            dirty: Dirty::Clean,
        };
        if content_dom.is_some() {
            desc.update_children(cx, node, inner, pos + 1);
        }
        cx.stats.created += 1;
        trace!(desc = id.0, node = %node.type_name(), pos, "Created node descriptor");
        desc
    }

    pub(crate) fn create_mark(cx: &mut RenderCx<'_>, mark: &Mark) -> ViewDesc {
        let id = DescId::next();
        let (dom, content_dom, custom) = match cx.views.mark_view(mark.name()) {
            Some(factory) => {
                let view = factory(mark, true, cx.dom);
                (view.dom(), view.content_dom(), Some(view))
            }
            None => {
                let el = cx.dom.create_element(&mark.mark_type().tag);
                for (name, value) in mark.attrs() {
                    cx.dom.set_attr(el, name, value);
                }
                (el, Some(el), None)
            }
        };
        cx.dom.set_desc(dom, Some(id));
        if let Some(content) = content_dom {
            cx.dom.set_desc(content, Some(id));
        }
        cx.stats.created += 1;
        ViewDesc {
            id,
            kind: DescKind::Mark(MarkDesc {
                mark: mark.clone(),
                custom,
            }),
            dom,
            content_dom: content_dom.or(Some(dom)),
            children: Vec::new(),
            dirty: Dirty::Clean,
        }
    }

    pub(crate) fn create_widget(cx: &mut RenderCx<'_>, deco: &Decoration) -> ViewDesc {
        let id = DescId::next();
        let dom = match deco.widget_spec() {
            Some(spec) => (spec.render)(cx.dom),
            None => cx.dom.create_element("span"),
        };
        cx.dom.set_attr(dom, "contenteditable", "false");
        cx.dom.set_desc(dom, Some(id));
        cx.stats.created += 1;
        ViewDesc {
            id,
            kind: DescKind::Widget(WidgetDesc { deco: deco.clone() }),
            dom,
            content_dom: None,
            children: Vec::new(),
            dirty: Dirty::Clean,
        }
    }

    // ---- accessors ----

    pub fn id(&self) -> DescId {
        self.id
    }

    /// Outermost DOM of this descriptor
    pub fn dom(&self) -> DomId {
        self.dom
    }

    pub fn content_dom(&self) -> Option<DomId> {
        self.content_dom
    }

    /// The node's own DOM, inside any decoration wrappers
    pub fn node_dom(&self) -> Option<DomId> {
        match &self.kind {
            DescKind::Node(nd) => Some(nd.node_dom),
            _ => None,
        }
    }

    pub fn children(&self) -> &[ViewDesc] {
        &self.children
    }

    pub fn node(&self) -> Option<&Node> {
        match &self.kind {
            DescKind::Node(nd) => Some(&nd.node),
            _ => None,
        }
    }

    pub fn mark(&self) -> Option<&Mark> {
        match &self.kind {
            DescKind::Mark(md) => Some(&md.mark),
            _ => None,
        }
    }

    pub fn widget(&self) -> Option<&Decoration> {
        match &self.kind {
            DescKind::Widget(wd) => Some(&wd.deco),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.node().map(Node::is_text).unwrap_or(false)
    }

    pub fn dirty(&self) -> Dirty {
        self.dirty
    }

    pub(crate) fn custom_view(&self) -> Option<&dyn NodeView> {
        match &self.kind {
            DescKind::Node(nd) => nd.custom.as_deref(),
            _ => None,
        }
    }

    /// Number of document positions this descriptor covers
    pub fn size(&self) -> usize {
        match &self.kind {
            DescKind::Node(nd) if nd.root => nd.node.content_size(),
            DescKind::Node(nd) => nd.node.node_size(),
            DescKind::Mark(_) => self.children.iter().map(ViewDesc::size).sum(),
            DescKind::Widget(_) => 0,
        }
    }

    /// Positions between this descriptor's start and its content's start
    pub fn border(&self) -> usize {
        match &self.kind {
            DescKind::Node(nd) if !nd.root && !nd.node.is_text() && !nd.node.is_leaf() => 1,
            _ => 0,
        }
    }

    /// Total descriptors in this subtree, this one included
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ViewDesc::count).sum::<usize>()
    }

    // ---- reconciliation ----

    /// Rendered from exactly this node and decorations, with nothing dirty
    pub fn matches_node(&self, node: &Node, outer: &[Decoration], inner: &DecorationSet) -> bool {
        let DescKind::Node(nd) = &self.kind else {
            return false;
        };
        self.dirty == Dirty::Clean
            && (Node::ptr_eq(&nd.node, node) || nd.node == *node)
            && same_outer_deco(&nd.outer, outer)
            && nd.inner == *inner
    }

    pub(crate) fn is_mark_for(&self, mark: &Mark) -> bool {
        self.dirty == Dirty::Clean && self.mark() == Some(mark)
    }

    /// Patch this descriptor to show `node`. Returns `false` when it can't,
    /// leaving the caller to rebuild.
    pub(crate) fn update(
        &mut self,
        cx: &mut RenderCx<'_>,
        node: &Node,
        outer: &[Decoration],
        inner: &DecorationSet,
        pos: usize,
    ) -> bool {
        let dirty = self.dirty;
        let DescKind::Node(nd) = &mut self.kind else {
            return false;
        };
        if dirty == Dirty::Node || !nd.node.same_markup(node) {
            return false;
        }
        if let Some(custom) = nd.custom.as_mut() {
            if !custom.update(cx.dom, node, outer, inner) {
                trace!(desc = self.id.0, "Node view refused update");
                return false;
            }
        } else if let Some(text) = node.text() {
            cx.dom.set_text(nd.node_dom, text);
        }

        if !same_outer_deco(&nd.outer, outer) {
            let levels = compute_levels(outer, node.is_text(), nd.root);
            self.dom = patch_levels(cx.dom, self.id, nd, levels);
            nd.outer = outer.to_vec();
        }
        let content_changed = !Node::ptr_eq(&nd.node, node) && nd.node != *node;
        let inner_changed = nd.inner != *inner;
        nd.node = node.clone();
        nd.inner = inner.clone();

        if self.content_dom.is_some() && (dirty != Dirty::Clean || content_changed || inner_changed) {
            let border = self.border();
            self.update_children(cx, node, inner, pos + border);
        }
        self.dirty = Dirty::Clean;
        cx.stats.updated += 1;
        true
    }

    /// Reconcile the children against `node`'s content and re-render them
    fn update_children(&mut self, cx: &mut RenderCx<'_>, node: &Node, inner: &DecorationSet, base: usize) {
        let old = std::mem::take(&mut self.children);
        self.children = updater::update_children(cx, node, inner, old, base);
        self.render_children(cx.dom);
    }

    /// Place the children's DOM inside the content DOM, in order
    pub(crate) fn render_children(&self, dom: &mut Dom) {
        if let Some(content) = self.content_dom {
            let doms: Vec<DomId> = self.children.iter().map(|c| c.dom).collect();
            dom.sync_children(content, &doms);
        }
    }

    pub(crate) fn take_children(&mut self) -> Vec<ViewDesc> {
        std::mem::take(&mut self.children)
    }

    pub(crate) fn set_children(&mut self, children: Vec<ViewDesc>) {
        self.children = children;
        self.dirty = Dirty::Clean;
    }

    pub(crate) fn set_widget(&mut self, deco: Decoration) {
        if let DescKind::Widget(wd) = &mut self.kind {
            wd.deco = deco;
        }
    }

    /// Release everything this descriptor owns, children first
    pub(crate) fn destroy(self, cx: &mut RenderCx<'_>) {
        let ViewDesc {
            id,
            kind,
            dom,
            children,
            ..
        } = self;
        for child in children {
            child.destroy(cx);
        }
        match kind {
            DescKind::Node(mut nd) => {
                if let Some(custom) = nd.custom.as_mut() {
                    custom.destroy(cx.dom);
                }
                if nd.root {
                    if let Some(base) = nd.levels.first() {
                        apply_attrs(cx.dom, nd.node_dom, base, &DecoAttrs::default());
                    }
                    for stray in cx.dom.children(nd.node_dom).to_vec() {
                        cx.dom.release(stray, None);
                    }
                    cx.dom.set_desc(nd.node_dom, None);
                } else {
                    cx.dom.release(dom, Some(id));
                }
            }
            DescKind::Mark(mut md) => {
                if let Some(custom) = md.custom.as_mut() {
                    custom.destroy(cx.dom);
                }
                cx.dom.release(dom, Some(id));
            }
            DescKind::Widget(_) => cx.dom.release(dom, Some(id)),
        }
        cx.stats.destroyed += 1;
    }

    /// Flag a descriptor dirty; its ancestors become [`Dirty::Child`]
    pub(crate) fn mark_dirty(&mut self, id: DescId, level: Dirty) -> bool {
        if self.id == id {
            self.dirty = self.dirty.max(level);
            return true;
        }
        for child in self.children.iter_mut() {
            if child.mark_dirty(id, level) {
                self.dirty = self.dirty.max(Dirty::Child);
                return true;
            }
        }
        false
    }

    // ---- node selection ----

    pub(crate) fn select_node(&mut self, dom: &mut Dom) {
        if let DescKind::Node(nd) = &mut self.kind {
            match nd.custom.as_mut() {
                Some(custom) => custom.select_node(dom),
                None => dom.add_class(nd.node_dom, SELECTED_NODE_CLASS),
            }
        }
    }

    pub(crate) fn deselect_node(&mut self, dom: &mut Dom) {
        if let DescKind::Node(nd) = &mut self.kind {
            match nd.custom.as_mut() {
                Some(custom) => custom.deselect_node(dom),
                None => dom.remove_class(nd.node_dom, SELECTED_NODE_CLASS),
            }
        }
    }

    // ---- lookups ----

    /// Descriptor with `id` and the position where it starts
    pub fn locate(&self, id: DescId) -> Option<(&ViewDesc, usize)> {
        self.locate_from(id, 0)
    }

    fn locate_from(&self, id: DescId, start: usize) -> Option<(&ViewDesc, usize)> {
        if self.id == id {
            return Some((self, start));
        }
        let mut pos = start + self.border();
        for child in &self.children {
            if let Some(found) = child.locate_from(id, pos) {
                return Some(found);
            }
            pos += child.size();
        }
        None
    }

    pub(crate) fn find_mut(&mut self, id: DescId) -> Option<&mut ViewDesc> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Node descriptor starting at `pos` (relative to this descriptor's content)
    pub fn desc_at(&self, pos: usize) -> Option<&ViewDesc> {
        let mut offset = 0;
        for child in &self.children {
            let end = offset + child.size();
            match &child.kind {
                DescKind::Widget(_) => {}
                DescKind::Mark(_) => {
                    if pos >= offset && pos < end {
                        return child.desc_at(pos - offset);
                    }
                }
                DescKind::Node(_) => {
                    if pos == offset {
                        return Some(child);
                    }
                    if pos > offset && pos < end && child.border() > 0 {
                        return child.desc_at(pos - offset - 1);
                    }
                }
            }
            offset = end;
        }
        None
    }

    /// Descriptor owning a DOM node: the nearest tagged ancestor
    pub fn nearest_desc(&self, dom: &Dom, node: DomId) -> Option<(&ViewDesc, usize)> {
        let mut cur = node;
        loop {
            if let Some(id) = dom.desc_of(cur) {
                if let Some(found) = self.locate(id) {
                    return Some(found);
                }
            }
            cur = dom.parent(cur)?;
        }
    }

    fn ends_in_text(&self) -> bool {
        match &self.kind {
            DescKind::Node(nd) => nd.node.is_text(),
            DescKind::Mark(_) => self
                .children
                .iter()
                .rev()
                .find(|c| c.size() > 0)
                .map(ViewDesc::ends_in_text)
                .unwrap_or(false),
            DescKind::Widget(_) => false,
        }
    }

    fn starts_with_text(&self) -> bool {
        match &self.kind {
            DescKind::Node(nd) => nd.node.is_text(),
            DescKind::Mark(_) => self
                .children
                .iter()
                .find(|c| c.size() > 0)
                .map(ViewDesc::starts_with_text)
                .unwrap_or(false),
            DescKind::Widget(_) => false,
        }
    }

    /// DOM point for a position relative to this descriptor's content.
    /// At boundaries next to text the point is put inside the text node,
    /// before it when `side <= 0` and after it otherwise.
    pub fn dom_from_pos(&self, dom: &Dom, pos: usize, side: i32) -> Option<DomPoint> {
        if let DescKind::Node(nd) = &self.kind {
            if nd.node.is_text() {
                return Some(DomPoint::new(nd.node_dom, pos.min(nd.node.node_size())));
            }
        }
        let content = self.content_dom?;

        let mut offset = 0;
        let mut before: Option<&ViewDesc> = None;
        let mut after: Option<&ViewDesc> = None;
        for child in &self.children {
            let size = child.size();
            let end = offset + size;
            if pos > offset && pos < end {
                return match &child.kind {
                    DescKind::Mark(_) => child.dom_from_pos(dom, pos - offset, side),
                    _ if child.is_text() => child.dom_from_pos(dom, pos - offset, side),
                    _ if child.content_dom.is_some() => {
                        child.dom_from_pos(dom, pos - offset - child.border(), side)
                    }
                    _ => Some(DomPoint::new(content, dom.index_in_parent(child.dom)?)),
                };
            }
            if size > 0 && end == pos {
                before = Some(child);
            }
            if size > 0 && offset == pos && after.is_none() {
                after = Some(child);
            }
            offset = end;
        }

        let prefer_before = |d: &ViewDesc| d.ends_in_text().then(|| d.dom_from_pos(dom, d.size(), side));
        let prefer_after = |d: &ViewDesc| d.starts_with_text().then(|| d.dom_from_pos(dom, 0, side));
        let text_point = if side <= 0 {
            before.and_then(prefer_before).or_else(|| after.and_then(prefer_after))
        } else {
            after.and_then(prefer_after).or_else(|| before.and_then(prefer_before))
        };
        if let Some(point) = text_point {
            return point;
        }

        let mut offset = 0;
        for child in &self.children {
            let sits_before = match child.widget().and_then(Decoration::widget_spec) {
                Some(spec) => offset == pos && spec.side < 0,
                None => false,
            };
            if offset >= pos && !sits_before {
                let index = dom.index_in_parent(child.dom)?;
                return Some(DomPoint::new(content, index));
            }
            offset += child.size();
        }
        Some(DomPoint::new(content, dom.children(content).len()))
    }

    /// Document position of a DOM point inside this tree
    pub fn pos_from_dom(&self, dom: &Dom, point: DomPoint) -> Option<usize> {
        if !dom.contains(self.dom, point.node) {
            return None;
        }
        let mut cur = point.node;
        let mut via: Option<DomId> = None;
        let (desc, start) = loop {
            if let Some(id) = dom.desc_of(cur) {
                if let Some(found) = self.locate(id) {
                    break found;
                }
            }
            via = Some(cur);
            cur = dom.parent(cur)?;
        };

        if desc.is_text() {
            let offset = if via.is_none() { point.offset } else { 0 };
            return Some(start + offset.min(desc.size()));
        }
        if desc.content_dom == Some(cur) {
            let index = match via {
                None => point.offset,
                Some(child) => dom.index_in_parent(child)?,
            };
            let mut pos = start + desc.border();
            for child in &desc.children {
                match dom.index_in_parent(child.dom) {
                    Some(i) if dom.parent(child.dom) == Some(cur) && i < index => pos += child.size(),
                    _ => {}
                }
            }
            return Some(pos);
        }
        if via.is_none() && point.offset > 0 {
            Some(start + desc.size())
        } else {
            Some(start)
        }
    }
}

/// Split outer decorations into attribute levels. Level 0 goes on the
/// node's own DOM; every decoration naming an element pushes a wrapper.
fn compute_levels(outer: &[Decoration], is_text: bool, root: bool) -> Vec<DecoAttrs> {
    let mut levels = vec![DecoAttrs::default()];
    for deco in outer {
        let Some(attrs) = deco.attrs() else {
            continue;
        };
        if let (Some(name), false) = (&attrs.node_name, root) {
            levels.push(DecoAttrs::wrapper(name.clone()));
        }
        let mut plain = attrs.clone();
        plain.node_name = None;
        if let Some(top) = levels.last_mut() {
            top.merge(&plain);
        }
    }
    // Text can't carry attributes
    if is_text && !levels[0].is_empty() {
        levels[0].node_name = Some("span".to_string());
    }
    levels
}

fn build_level_doms(dom: &mut Dom, id: DescId, node_dom: DomId, levels: &[DecoAttrs]) -> Vec<DomId> {
    let mut doms = Vec::with_capacity(levels.len());
    let mut inner = node_dom;
    for (i, level) in levels.iter().enumerate() {
        let target = match (&level.node_name, i) {
            (None, 0) => node_dom,
            (name, _) => {
                let el = dom.create_element(name.as_deref().unwrap_or("span"));
                dom.set_desc(el, Some(id));
                dom.append_child(el, inner);
                el
            }
        };
        apply_attrs(dom, target, &DecoAttrs::default(), level);
        doms.push(target);
        inner = target;
    }
    doms
}

/// Move `nd` to new attribute levels, rebuilding wrappers when their
/// structure changed. Returns the new outer DOM.
fn patch_levels(dom: &mut Dom, id: DescId, nd: &mut NodeDesc, levels: Vec<DecoAttrs>) -> DomId {
    let same_structure = nd.levels.len() == levels.len()
        && nd
            .levels
            .iter()
            .zip(&levels)
            .all(|(a, b)| a.node_name == b.node_name);
    if same_structure {
        for ((old, new), &target) in nd.levels.iter().zip(&levels).zip(&nd.level_doms) {
            apply_attrs(dom, target, old, new);
        }
    } else {
        if let Some(base) = nd.levels.first() {
            if base.node_name.is_none() {
                apply_attrs(dom, nd.node_dom, base, &DecoAttrs::default());
            }
        }
        if let Some(&outer) = nd.level_doms.last() {
            if outer != nd.node_dom {
                dom.detach(nd.node_dom);
                dom.release(outer, Some(id));
            }
        }
        nd.level_doms = build_level_doms(dom, id, nd.node_dom, &levels);
    }
    nd.levels = levels;
    nd.level_doms.last().copied().unwrap_or(nd.node_dom)
}

fn tokens(value: Option<&str>, sep: char) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(sep)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Move an element from `old` decoration attributes to `new` ones,
/// leaving attributes that neither set untouched
fn apply_attrs(dom: &mut Dom, el: DomId, old: &DecoAttrs, new: &DecoAttrs) {
    if dom.is_text(el) {
        return;
    }
    for name in old.attrs.keys() {
        if !new.attrs.contains_key(name) {
            dom.remove_attr(el, name);
        }
    }
    for (name, value) in &new.attrs {
        dom.set_attr(el, name, value);
    }

    let old_classes = tokens(old.class.as_deref(), ' ');
    let new_classes = tokens(new.class.as_deref(), ' ');
    for class in old_classes.iter().filter(|c| !new_classes.contains(c)) {
        dom.remove_class(el, class);
    }
    for class in &new_classes {
        dom.add_class(el, class);
    }

    let old_styles = tokens(old.style.as_deref(), ';');
    let new_styles = tokens(new.style.as_deref(), ';');
    if old_styles != new_styles {
        let mut current: Vec<String> = tokens(dom.attr(el, "style"), ';')
            .into_iter()
            .filter(|s| !old_styles.contains(s))
            .collect();
        current.extend(new_styles.iter().cloned());
        if current.is_empty() {
            dom.remove_attr(el, "style");
        } else {
            let joined = current.join("; ");
            dom.set_attr(el, "style", &joined);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::WidgetSpec;
    use verso_model::{Attrs, Schema};

    struct Fixture {
        dom: Dom,
        views: NodeViewRegistry,
        stats: RenderStats,
        mount: DomId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut dom = Dom::new();
            let mount = dom.create_element("div");
            Self {
                dom,
                views: NodeViewRegistry::default(),
                stats: RenderStats::default(),
                mount,
            }
        }

        fn cx(&mut self) -> RenderCx<'_> {
            RenderCx {
                dom: &mut self.dom,
                views: &self.views,
                stats: &mut self.stats,
                editable: true,
            }
        }
    }

    fn schema() -> Schema {
        Schema::basic()
    }

    #[test]
    fn test_renders_document() {
        let schema = schema();
        let strong = schema.mark("strong", Attrs::new()).unwrap();
        let para = schema
            .node(
                "paragraph",
                Attrs::new(),
                vec![
                    schema.text("Hi ", vec![]).unwrap(),
                    schema.text("there", vec![strong]).unwrap(),
                ],
            )
            .unwrap();
        let doc = schema.node("doc", Attrs::new(), vec![para]).unwrap();

        let mut fx = Fixture::new();
        let mount = fx.mount;
        let desc = ViewDesc::create_doc(&mut fx.cx(), mount, &doc, &[], &DecorationSet::empty());

        assert_eq!(fx.dom.to_html(mount), "<div><p>Hi <strong>there</strong></p></div>");
        // doc, paragraph, two texts, one mark
        assert_eq!(desc.count(), 5);
        assert_eq!(fx.stats.created, 5);
    }

    #[test]
    fn test_positions_round_trip() {
        let doc = schema().doc_of_paragraphs(&["Hello", "World"]).unwrap();
        let mut fx = Fixture::new();
        let mount = fx.mount;
        let desc = ViewDesc::create_doc(&mut fx.cx(), mount, &doc, &[], &DecorationSet::empty());

        for pos in [1, 3, 6, 8, 12] {
            let point = desc.dom_from_pos(&fx.dom, pos, -1).unwrap();
            assert_eq!(desc.pos_from_dom(&fx.dom, point), Some(pos), "pos {}", pos);
        }
        // Block boundaries point into the document element
        assert_eq!(desc.dom_from_pos(&fx.dom, 7, 0), Some(DomPoint::new(mount, 1)));
        assert_eq!(desc.pos_from_dom(&fx.dom, DomPoint::new(mount, 2)), Some(14));
    }

    #[test]
    fn test_update_patches_text_in_place() {
        let schema = schema();
        let doc = schema.doc_of_paragraphs(&["Hello"]).unwrap();
        let next = schema.doc_of_paragraphs(&["Hello world"]).unwrap();
        let mut fx = Fixture::new();
        let mount = fx.mount;
        let mut desc = ViewDesc::create_doc(&mut fx.cx(), mount, &doc, &[], &DecorationSet::empty());
        let text_id = desc.children()[0].children()[0].id();

        assert!(desc.update(&mut fx.cx(), &next, &[], &DecorationSet::empty(), 0));
        assert_eq!(desc.children()[0].children()[0].id(), text_id);
        assert_eq!(fx.dom.to_html(mount), "<div><p>Hello world</p></div>");
        assert_eq!(fx.stats.created, 3);
        assert_eq!(fx.stats.destroyed, 0);
    }

    #[test]
    fn test_markup_change_fails_update() {
        let schema = schema();
        let doc = schema.doc_of_paragraphs(&["Hi"]).unwrap();
        let mut fx = Fixture::new();
        let heading = schema
            .node("heading", Attrs::new(), vec![schema.text("Hi", vec![]).unwrap()])
            .unwrap();

        let mut para_desc = ViewDesc::create_node(&mut fx.cx(), doc.child(0).unwrap(), &[], &DecorationSet::empty(), 0);
        assert!(!para_desc.update(&mut fx.cx(), &heading, &[], &DecorationSet::empty(), 0));
    }

    #[test]
    fn test_node_decoration_wrapper() {
        let doc = schema().doc_of_paragraphs(&["Hi"]).unwrap();
        let mut fx = Fixture::new();
        let mount = fx.mount;
        let outer = vec![Decoration::node(0, 4, DecoAttrs::wrapper("section").with_attr("data-x", "1"))];
        let mut desc = ViewDesc::create_node(&mut fx.cx(), doc.child(0).unwrap(), &outer, &DecorationSet::empty(), 0);
        fx.dom.append_child(mount, desc.dom());
        assert_eq!(fx.dom.to_html(mount), "<div><section data-x=\"1\"><p>Hi</p></section></div>");

        let para = doc.child(0).unwrap().clone();
        let plain = vec![Decoration::node(0, 4, DecoAttrs::class("hl"))];
        assert!(desc.update(&mut fx.cx(), &para, &plain, &DecorationSet::empty(), 0));
        fx.dom.sync_children(mount, &[desc.dom()]);
        assert_eq!(fx.dom.to_html(mount), "<div><p class=\"hl\">Hi</p></div>");
    }

    #[test]
    fn test_inline_decoration_splits_text() {
        let doc = schema().doc_of_paragraphs(&["Hello"]).unwrap();
        let decos = DecorationSet::create(&doc, vec![Decoration::inline(2, 4, DecoAttrs::class("hl"))]);
        let mut fx = Fixture::new();
        let mount = fx.mount;
        let desc = ViewDesc::create_doc(&mut fx.cx(), mount, &doc, &[], &decos);
        assert_eq!(
            fx.dom.to_html(mount),
            "<div><p>H<span class=\"hl\">el</span>lo</p></div>"
        );
        let point = desc.dom_from_pos(&fx.dom, 3, 1).unwrap();
        assert_eq!(desc.pos_from_dom(&fx.dom, point), Some(3));
    }

    #[test]
    fn test_widget_has_no_size() {
        let doc = schema().doc_of_paragraphs(&["ab"]).unwrap();
        let widget = WidgetSpec::new(|dom: &mut Dom| dom.create_element("img")).with_key("w");
        let decos = DecorationSet::create(&doc, vec![Decoration::widget(2, widget)]);
        let mut fx = Fixture::new();
        let mount = fx.mount;
        let desc = ViewDesc::create_doc(&mut fx.cx(), mount, &doc, &[], &decos);

        assert_eq!(
            fx.dom.to_html(mount),
            "<div><p>a<img contenteditable=\"false\"></img>b</p></div>"
        );
        assert_eq!(desc.size(), 4);
        assert_eq!(desc.children()[0].children().len(), 3);
    }

    #[test]
    fn test_destroy_releases_dom_but_keeps_mount() {
        let doc = schema().doc_of_paragraphs(&["a", "b"]).unwrap();
        let outer = vec![Decoration::node(0, 6, DecoAttrs::class("verso"))];
        let mut fx = Fixture::new();
        let mount = fx.mount;
        let desc = ViewDesc::create_doc(&mut fx.cx(), mount, &doc, &outer, &DecorationSet::empty());
        let nodes_before = fx.dom.len();
        desc.destroy(&mut fx.cx());

        assert!(fx.dom.exists(mount));
        assert_eq!(fx.dom.to_html(mount), "<div></div>");
        assert_eq!(fx.dom.len(), nodes_before - 4);
        assert_eq!(fx.stats.destroyed, 5);
    }

    #[test]
    fn test_mark_dirty_propagates() {
        let doc = schema().doc_of_paragraphs(&["a"]).unwrap();
        let mut fx = Fixture::new();
        let mount = fx.mount;
        let mut desc = ViewDesc::create_doc(&mut fx.cx(), mount, &doc, &[], &DecorationSet::empty());
        let text = desc.children()[0].children()[0].id();
        assert!(desc.mark_dirty(text, Dirty::Node));
        assert_eq!(desc.dirty(), Dirty::Child);
        assert!(!desc.matches_node(&doc, &[], &DecorationSet::empty()));
    }
}

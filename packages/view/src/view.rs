//! # Editor View
//!
//! Owns the rendered surface for an [`EditorState`] and brings it up to
//! date whenever a new state arrives.
//!
//! ## Update cycle
//!
//! ```text
//! apply(state, reconfigure)
//!   1. stored marks mid-composition   → end composition, force selection
//!   2. resolve editable + attributes  → cursor wrapper
//!   3. reconfigure                    → rebuild node view registry
//!   4. outer/inner decorations for the document
//!   5. tree already matches?          → skip patch
//!   6. selection needs sync?
//!   7. snapshot scroll position        (preserve mode only)
//!   8. patch (or rebuild) + write selection, observer paused
//!   9. plugin views: recreate or update
//!  10. scroll: reset / to selection / restore snapshot
//! ```
//!
//! Transactions deferred while the cycle runs (from plugin views) are
//! applied right after it, in order.

use crate::decoration::{DecoAttrs, Decoration, DecorationSet, WidgetSpec};
use crate::dom::{Dom, DomId, DomPoint};
use crate::error::{ViewError, ViewResult};
use crate::layout::{Layout, Rect};
use crate::plugin_view::PluginViewRegistry;
use crate::props::{EditorProps, NodeViewRegistry, PropSources, ScrollToSelectionProp};
use crate::scroll::{scroll_rect_into_view, ScrollSnapshot};
use crate::selection::{SelectionCompat, SelectionSync, SharedAncestorPolicy};
use crate::state::{EditorState, Plugin, PluginSet, Transaction};
use crate::viewdesc::{RenderCx, RenderStats, ViewDesc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use tracing::{debug, instrument, trace, warn};
use verso_model::{Mark, Node, Selection};

pub(crate) const CURSOR_WRAPPER_KEY: &str = "cursor-wrapper";
/// Class on the placeholder that keeps composed text inside stored marks
pub const CURSOR_WRAPPER_CLASS: &str = "verso-cursor-wrapper";
const MAX_DEFERRED_ROUNDS: usize = 32;

/// Tunables for scrolling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    /// Distance from the viewport edge at which scrolling kicks in
    pub scroll_threshold: f64,
    /// Space kept around a rect scrolled into view
    pub scroll_margin: f64,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            scroll_threshold: 0.0,
            scroll_margin: 5.0,
        }
    }
}

/// Everything needed to mount a view
#[derive(Clone, Debug)]
pub struct ViewConfig {
    pub state: EditorState,
    pub props: EditorProps,
    /// Plugins attached to the view rather than the state
    pub plugins: Vec<Plugin>,
    pub options: ViewOptions,
}

impl ViewConfig {
    pub fn new(state: EditorState) -> Self {
        Self {
            state,
            props: EditorProps::default(),
            plugins: Vec::new(),
            options: ViewOptions::default(),
        }
    }

    pub fn with_props(mut self, props: EditorProps) -> Self {
        self.props = props;
        self
    }

    pub fn with_plugins(mut self, plugins: Vec<Plugin>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_options(mut self, options: ViewOptions) -> Self {
        self.options = options;
        self
    }
}

/// What an update does to the scroll position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollMode {
    #[default]
    Preserve,
    Reset,
    ToSelection,
}

/// Outcome of one update cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UpdateReport {
    /// The rendered tree was patched or rebuilt
    pub doc_updated: bool,
    /// The whole tree was thrown away and built again
    pub rebuilt: bool,
    /// The selection was synced to the platform
    pub selection_updated: bool,
    pub selection_forced: bool,
    pub composition_ended: bool,
    pub scroll: ScrollMode,
}

/// Direction for [`EditorView::end_of_textblock`]. Left and right assume
/// left-to-right text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDirection {
    Up,
    Down,
    Left,
    Right,
    Backward,
    Forward,
}

#[derive(Debug, Clone)]
pub(crate) struct Composition {
    /// Marks typed text should get, captured when the composition started
    pub(crate) mark_cursor: Option<Vec<Mark>>,
}

struct ResolvedProps {
    editable: bool,
    /// Only resolved on reconfiguration
    node_views: Option<NodeViewRegistry>,
    attrs: DecoAttrs,
    decorations: Vec<DecorationSet>,
}

fn resolve_props(props: &EditorProps, direct: &PluginSet, state: &EditorState, reconfigure: bool) -> ResolvedProps {
    let sources = PropSources::new(props, direct.plugins(), state.plugins().plugins());
    let editable = sources.editable(state);
    ResolvedProps {
        editable,
        node_views: reconfigure.then(|| NodeViewRegistry::build(&sources)),
        attrs: sources.attributes(state, editable),
        decorations: sources.decorations(state),
    }
}

pub struct EditorView {
    pub(crate) dom: Dom,
    mount: DomId,
    pub(crate) state: EditorState,
    props: EditorProps,
    direct_plugins: PluginSet,
    direct_plugins_changed: bool,
    options: ViewOptions,
    pub(crate) doc_view: Option<ViewDesc>,
    node_views: NodeViewRegistry,
    editable: bool,
    pub(crate) cursor_wrapper: Option<Decoration>,
    pub(crate) composition: Option<Composition>,
    pub(crate) selection_sync: SelectionSync,
    compat: Box<dyn SelectionCompat>,
    plugin_views: PluginViewRegistry,
    /// Size of `plugin_views`, kept while the registry is out for updates
    plugin_view_count: usize,
    deferred: RefCell<VecDeque<Transaction>>,
    mouse_down: bool,
    stats: RenderStats,
    last_report: UpdateReport,
    pub(crate) destroyed: bool,
}

impl EditorView {
    /// Render `config.state` into `mount`, which must exist in `dom`
    pub fn new(dom: Dom, mount: DomId, config: ViewConfig) -> ViewResult<EditorView> {
        if !dom.exists(mount) {
            return Err(ViewError::UnknownDomNode(mount.index()));
        }
        Ok(Self::mount_into(dom, mount, config))
    }

    /// Mount into a fresh headless DOM
    pub fn headless(config: ViewConfig) -> EditorView {
        let mut dom = Dom::new();
        let mount = dom.create_element("div");
        Self::mount_into(dom, mount, config)
    }

    fn mount_into(dom: Dom, mount: DomId, config: ViewConfig) -> EditorView {
        let ViewConfig {
            state,
            props,
            plugins,
            options,
        } = config;
        let direct_plugins = PluginSet::new(plugins);
        let resolved = resolve_props(&props, &direct_plugins, &state, true);

        let mut view = EditorView {
            dom,
            mount,
            state,
            props,
            direct_plugins,
            direct_plugins_changed: false,
            options,
            doc_view: None,
            node_views: resolved.node_views.unwrap_or_default(),
            editable: resolved.editable,
            cursor_wrapper: None,
            composition: None,
            selection_sync: SelectionSync::new(),
            compat: Box::new(SharedAncestorPolicy),
            plugin_views: PluginViewRegistry::default(),
            plugin_view_count: 0,
            deferred: RefCell::new(VecDeque::new()),
            mouse_down: false,
            stats: RenderStats::default(),
            last_report: UpdateReport::default(),
            destroyed: false,
        };

        let (outer, inner) = view.doc_decorations(resolved.attrs, resolved.decorations);
        {
            let _pause = view.dom.pause_observer();
            let mut cx = RenderCx {
                dom: &mut view.dom,
                views: &view.node_views,
                stats: &mut view.stats,
                editable: view.editable,
            };
            let mut doc_view = ViewDesc::create_doc(&mut cx, mount, view.state.doc(), &outer, &inner);
            view.selection_sync
                .write(&mut view.dom, &mut doc_view, view.state.selection(), false);
            debug!(
                descriptors = doc_view.count(),
                editable = view.editable,
                "Mounted editor view"
            );
            view.doc_view = Some(doc_view);
        }

        let registry = PluginViewRegistry::create(&view, &view.direct_plugins, view.state.plugins());
        view.set_plugin_views(registry);
        view.drain_deferred();
        view
    }

    /// Use a different platform selection workaround policy
    pub fn with_selection_compat(mut self, compat: Box<dyn SelectionCompat>) -> Self {
        self.compat = compat;
        self
    }

    // ---- accessors ----

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn props(&self) -> &EditorProps {
        &self.props
    }

    pub fn direct_plugins(&self) -> &PluginSet {
        &self.direct_plugins
    }

    pub fn options(&self) -> ViewOptions {
        self.options
    }

    pub fn editable(&self) -> bool {
        self.editable
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    /// The platform, for changes made outside the view. Read them back with
    /// [`EditorView::flush`].
    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    pub fn mount(&self) -> DomId {
        self.mount
    }

    pub fn doc_view(&self) -> Option<&ViewDesc> {
        self.doc_view.as_ref()
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn last_report(&self) -> UpdateReport {
        self.last_report
    }

    pub fn plugin_view_count(&self) -> usize {
        self.plugin_view_count
    }

    fn set_plugin_views(&mut self, registry: PluginViewRegistry) {
        self.plugin_view_count = registry.len();
        self.plugin_views = registry;
    }

    pub fn is_composing(&self) -> bool {
        self.composition.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn has_focus(&self) -> bool {
        self.dom.has_focus()
    }

    pub fn set_mouse_down(&mut self, down: bool) {
        self.mouse_down = down;
    }

    // ---- updates ----

    /// Bring the rendered surface up to date with `state`
    #[instrument(skip(self, state))]
    pub fn apply(&mut self, state: EditorState, reconfigure: bool) -> UpdateReport {
        if self.destroyed {
            warn!("Ignoring update on a destroyed view");
            return UpdateReport::default();
        }
        let report = self.apply_state(state, reconfigure);
        self.drain_deferred();
        report
    }

    /// Apply `state`, treating a change of plugin set as a reconfiguration
    pub fn update_state(&mut self, state: EditorState) -> UpdateReport {
        let reconfigure = !state.plugins().ptr_eq(self.state.plugins());
        self.apply(state, reconfigure)
    }

    /// Apply a transaction to the current state and show the result
    pub fn dispatch(&mut self, tr: Transaction) -> ViewResult<UpdateReport> {
        if self.destroyed {
            return Err(ViewError::Destroyed);
        }
        let state = self.state.apply(tr)?;
        Ok(self.apply(state, false))
    }

    /// Queue a transaction to be applied once the running update finishes
    pub fn defer(&self, tr: Transaction) {
        self.deferred.borrow_mut().push_back(tr);
    }

    /// Replace the view's own props and reconfigure
    pub fn set_props(&mut self, props: EditorProps) -> UpdateReport {
        self.props = props;
        self.apply(self.state.clone(), true)
    }

    /// Replace the view's direct plugins and reconfigure
    pub fn set_plugins(&mut self, plugins: Vec<Plugin>) -> UpdateReport {
        self.direct_plugins = PluginSet::new(plugins);
        self.direct_plugins_changed = true;
        self.apply(self.state.clone(), true)
    }

    fn doc_decorations(&self, attrs: DecoAttrs, mut sets: Vec<DecorationSet>) -> (Vec<Decoration>, DecorationSet) {
        let doc = self.state.doc();
        let outer = vec![Decoration::node(0, doc.content_size(), attrs)];
        if let Some(wrapper) = &self.cursor_wrapper {
            sets.push(DecorationSet::create(doc, vec![wrapper.clone()]));
        }
        (outer, DecorationSet::merge(&sets))
    }

    pub(crate) fn needs_cursor_wrapper(&self) -> bool {
        match &self.composition {
            Some(composition) => composition.mark_cursor.is_some() || self.state.selection().is_node(),
            None => false,
        }
    }

    fn update_cursor_wrapper(&mut self) {
        if !self.needs_cursor_wrapper() {
            if self.cursor_wrapper.take().is_some() {
                trace!("Removed cursor wrapper");
            }
            return;
        }
        let marks = self
            .composition
            .as_ref()
            .and_then(|c| c.mark_cursor.clone())
            .unwrap_or_default();
        let spec = WidgetSpec::new(|dom: &mut Dom| {
            let el = dom.create_element("span");
            dom.add_class(el, CURSOR_WRAPPER_CLASS);
            el
        })
        .with_key(CURSOR_WRAPPER_KEY)
        .with_marks(marks);
        self.cursor_wrapper = Some(Decoration::widget(self.state.selection().head(), spec));
    }

    fn apply_state(&mut self, state: EditorState, reconfigure: bool) -> UpdateReport {
        let prev = std::mem::replace(&mut self.state, state);
        let mut report = UpdateReport::default();
        let mut force_selection = false;

        if self.composition.is_some()
            && self.state.stored_marks().is_some()
            && self.state.stored_marks() != prev.stored_marks()
        {
            debug!("Stored marks changed during composition, ending it");
            self.composition = None;
            report.composition_ended = true;
            force_selection = true;
        }

        let resolved = resolve_props(&self.props, &self.direct_plugins, &self.state, reconfigure);
        let editable_changed = resolved.editable != self.editable;
        self.editable = resolved.editable;
        self.update_cursor_wrapper();

        let mut redraw = false;
        if let Some(node_views) = resolved.node_views {
            if !node_views.same_as(&self.node_views) {
                debug!(?node_views, "Node views changed");
                self.node_views = node_views;
                redraw = true;
            }
            if editable_changed {
                debug!(editable = self.editable, "Editability changed on reconfigure");
                redraw = true;
            }
        }

        let (outer, inner) = self.doc_decorations(resolved.attrs, resolved.decorations);
        let Some(doc_view) = self.doc_view.as_ref() else {
            return report;
        };
        let update_doc = redraw || !doc_view.matches_node(self.state.doc(), &outer, &inner);
        let update_sel = force_selection
            || update_doc
            || !Node::ptr_eq(prev.doc(), self.state.doc())
            || prev.selection() != self.state.selection();

        report.scroll = if reconfigure {
            ScrollMode::Reset
        } else if self.state.scroll_to_selection() > prev.scroll_to_selection() {
            ScrollMode::ToSelection
        } else {
            ScrollMode::Preserve
        };
        let snapshot = (update_sel
            && report.scroll == ScrollMode::Preserve
            && !self.dom.capabilities().scroll_anchoring)
            .then(|| ScrollSnapshot::store(&self.dom, self.mount, doc_view));

        if update_sel {
            let _pause = self.dom.pause_observer();
            let mut force = force_selection;
            if update_doc {
                report.rebuilt = self.patch_doc(&outer, &inner, redraw);
                report.doc_updated = true;
                if self.composition.is_none()
                    && self.compat.force_resync(
                        self.dom.capabilities(),
                        prev.doc(),
                        prev.selection(),
                        self.state.doc(),
                        self.state.selection(),
                    )
                {
                    trace!("Selection context changed, forcing resync");
                    force = true;
                }
            }
            self.sync_selection(force);
            report.selection_updated = true;
            report.selection_forced = force;
        }

        if std::mem::take(&mut self.direct_plugins_changed) || !prev.plugins().ptr_eq(self.state.plugins()) {
            self.plugin_views.destroy();
            self.plugin_view_count = 0;
            let registry = PluginViewRegistry::create(self, &self.direct_plugins, self.state.plugins());
            self.set_plugin_views(registry);
        } else {
            // Hooks see the view without the registry; the count stays valid
            let mut views = std::mem::take(&mut self.plugin_views);
            views.update(self, &prev);
            self.plugin_views = views;
        }

        match report.scroll {
            ScrollMode::Reset => self.dom.set_scroll_top(0.0),
            ScrollMode::ToSelection => self.scroll_to_selection(),
            ScrollMode::Preserve => {
                if let (Some(snapshot), Some(doc_view)) = (snapshot, self.doc_view.as_ref()) {
                    snapshot.restore(&mut self.dom, self.mount, doc_view);
                }
            }
        }

        debug!(
            doc_updated = report.doc_updated,
            rebuilt = report.rebuilt,
            selection_updated = report.selection_updated,
            scroll = ?report.scroll,
            "Applied state"
        );
        self.last_report = report;
        report
    }

    /// Patch the document tree in place, rebuilding it when that fails or
    /// `redraw` asks for it. Returns whether it was rebuilt.
    fn patch_doc(&mut self, outer: &[Decoration], inner: &DecorationSet, redraw: bool) -> bool {
        let mut cx = RenderCx {
            dom: &mut self.dom,
            views: &self.node_views,
            stats: &mut self.stats,
            editable: self.editable,
        };
        let doc = self.state.doc();
        if !redraw {
            if let Some(doc_view) = self.doc_view.as_mut() {
                if doc_view.update(&mut cx, doc, outer, inner, 0) {
                    return false;
                }
                warn!("Patching the document failed, rebuilding");
            }
        }
        if let Some(old) = self.doc_view.take() {
            old.destroy(&mut cx);
        }
        let doc_view = ViewDesc::create_doc(&mut cx, self.mount, doc, outer, inner);
        debug!(descriptors = doc_view.count(), "Rebuilt document view");
        self.doc_view = Some(doc_view);
        true
    }

    pub(crate) fn sync_selection(&mut self, force: bool) {
        let Some(doc_view) = self.doc_view.as_mut() else {
            return;
        };
        let sel = *self.state.selection();
        let dragging = !force
            && self.mouse_down
            && self.dom.selection().is_some()
            && self.dom.selection() == self.selection_sync.observed()
            && self
                .dom
                .selection()
                .and_then(|platform| doc_view.pos_from_dom(&self.dom, platform.anchor))
                == Some(sel.anchor());
        if dragging {
            // The platform is tracking a drag; only restamp node selection
            self.selection_sync.sync_node_selection(&mut self.dom, doc_view, &sel);
            self.selection_sync.set_observed(self.dom.selection());
        } else {
            self.selection_sync.write(&mut self.dom, doc_view, &sel, force);
        }
    }

    pub(crate) fn drain_deferred(&mut self) {
        let mut rounds = 0;
        loop {
            let Some(tr) = self.deferred.borrow_mut().pop_front() else {
                break;
            };
            rounds += 1;
            if rounds > MAX_DEFERRED_ROUNDS {
                let dropped = self.deferred.borrow().len() + 1;
                warn!(dropped, "Deferred transactions keep coming, dropping the rest");
                self.deferred.borrow_mut().clear();
                break;
            }
            match self.state.apply(tr) {
                Ok(state) => {
                    self.apply_state(state, false);
                }
                Err(err) => warn!(error = %err, "Dropping deferred transaction"),
            }
        }
    }

    fn scroll_to_selection(&mut self) {
        let handlers: Vec<ScrollToSelectionProp> =
            PropSources::new(&self.props, self.direct_plugins.plugins(), self.state.plugins().plugins())
                .iter()
                .filter_map(|props| props.handle_scroll_to_selection.clone())
                .collect();
        let view: &EditorView = self;
        if handlers.iter().any(|handler| handler(view)) {
            trace!("Scroll to selection handled by a prop");
            return;
        }
        let layout = self.layout();
        let Some(rect) = self.content_selection_rect(&layout) else {
            return;
        };
        scroll_rect_into_view(
            &mut self.dom,
            rect,
            self.options.scroll_threshold,
            self.options.scroll_margin,
            layout.content_height(),
        );
    }

    // ---- geometry ----

    fn layout(&self) -> Layout {
        Layout::compute(&self.dom, self.mount)
    }

    fn live_doc_view(&self) -> ViewResult<&ViewDesc> {
        self.doc_view.as_ref().ok_or(ViewError::Destroyed)
    }

    fn to_viewport(&self, rect: Rect) -> Rect {
        let top = self.dom.viewport().scroll_top;
        Rect::new(rect.left, rect.top - top, rect.right, rect.bottom - top)
    }

    fn caret_rect(&self, layout: &Layout, pos: usize, side: i32) -> ViewResult<Rect> {
        self.state.doc().resolve(pos)?;
        let point = self
            .live_doc_view()?
            .dom_from_pos(&self.dom, pos, side)
            .ok_or(ViewError::PositionNotFound)?;
        layout.coords_at(&self.dom, point).ok_or(ViewError::PositionNotFound)
    }

    fn content_selection_rect(&self, layout: &Layout) -> Option<Rect> {
        let sel = self.state.selection();
        if let Selection::Node { anchor, .. } = *sel {
            if let Some(rect) = self.node_dom(anchor).and_then(|id| layout.rect(id)) {
                return Some(rect);
            }
        }
        let head = self.caret_rect(layout, sel.head(), -1).ok()?;
        match self.caret_rect(layout, sel.anchor(), 1) {
            Ok(anchor) if !sel.empty() => Some(anchor.union(&head)),
            _ => Some(head),
        }
    }

    /// Caret rectangle for `pos`, in viewport coordinates
    pub fn coords_at_pos(&self, pos: usize, side: i32) -> ViewResult<Rect> {
        let layout = self.layout();
        self.caret_rect(&layout, pos, side).map(|rect| self.to_viewport(rect))
    }

    /// Document position nearest to a viewport coordinate
    pub fn pos_at_coords(&self, x: f64, y: f64) -> Option<usize> {
        let layout = self.layout();
        let point = layout.point_at(x, y + self.dom.viewport().scroll_top)?;
        self.doc_view.as_ref()?.pos_from_dom(&self.dom, point)
    }

    /// Document position of a platform location
    pub fn pos_at_dom(&self, node: DomId, offset: usize) -> ViewResult<usize> {
        if !self.dom.exists(node) {
            return Err(ViewError::UnknownDomNode(node.index()));
        }
        self.live_doc_view()?
            .pos_from_dom(&self.dom, DomPoint::new(node, offset))
            .ok_or(ViewError::PositionNotFound)
    }

    /// Platform location of a document position
    pub fn dom_at_pos(&self, pos: usize, side: i32) -> ViewResult<DomPoint> {
        self.state.doc().resolve(pos)?;
        self.live_doc_view()?
            .dom_from_pos(&self.dom, pos, side)
            .ok_or(ViewError::PositionNotFound)
    }

    /// DOM of the node starting at `pos`
    pub fn node_dom(&self, pos: usize) -> Option<DomId> {
        self.doc_view.as_ref()?.desc_at(pos)?.node_dom()
    }

    /// Bounding rectangle of the selection, in viewport coordinates
    pub fn selection_rect(&self) -> Option<Rect> {
        let layout = self.layout();
        self.content_selection_rect(&layout).map(|rect| self.to_viewport(rect))
    }

    /// Whether the cursor sits at the edge of its textblock in `dir`
    pub fn end_of_textblock(&self, dir: TextDirection) -> bool {
        let Ok(head) = self.state.selection().resolve_head(self.state.doc()) else {
            return false;
        };
        if !head.parent().is_textblock() {
            return false;
        }
        match dir {
            TextDirection::Backward | TextDirection::Left => head.parent_offset == 0,
            TextDirection::Forward | TextDirection::Right => head.parent_offset == head.parent().content_size(),
            TextDirection::Up | TextDirection::Down => {
                let layout = self.layout();
                let side = if dir == TextDirection::Up { -1 } else { 1 };
                let Ok(caret) = self.caret_rect(&layout, head.pos, side) else {
                    return false;
                };
                let before = head.start(head.depth()) - 1;
                let Some(block) = self.node_dom(before).and_then(|id| layout.rect(id)) else {
                    return false;
                };
                let lh = self.dom.metrics().line_height;
                if dir == TextDirection::Up {
                    caret.top < block.top + lh
                } else {
                    caret.bottom > block.bottom - lh
                }
            }
        }
    }

    // ---- focus and teardown ----

    /// Focus the surface and show the selection
    pub fn focus(&mut self) {
        self.dom.set_focus(true);
        let _pause = self.dom.pause_observer();
        self.sync_selection(false);
    }

    /// Tear down plugin views and the rendered tree. The mount element
    /// stays, emptied. Further updates are ignored.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.plugin_views.destroy();
        self.plugin_view_count = 0;
        self.deferred.borrow_mut().clear();
        self.composition = None;
        self.cursor_wrapper = None;
        if let Some(doc_view) = self.doc_view.take() {
            let _pause = self.dom.pause_observer();
            let mut cx = RenderCx {
                dom: &mut self.dom,
                views: &self.node_views,
                stats: &mut self.stats,
                editable: self.editable,
            };
            doc_view.destroy(&mut cx);
        }
        self.dom.set_selection(None);
        debug!(destroyed = self.stats.destroyed, "Destroyed editor view");
    }
}

impl std::fmt::Debug for EditorView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorView")
            .field("mount", &self.mount)
            .field("editable", &self.editable)
            .field("composing", &self.composition.is_some())
            .field("plugin_views", &self.plugin_view_count)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

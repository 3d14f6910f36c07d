//! Child reconciliation for one descriptor.
//!
//! The new content is flattened into a list of [`ChildItem`]s (nodes with
//! the decorations that apply to them, and widgets). The items are then
//! matched against the old child descriptors front to back:
//!
//! 1. an old descriptor that already renders exactly this item is reused,
//! 2. otherwise the next old descriptor is updated in place if it can be,
//! 3. otherwise a new descriptor is created.
//!
//! Before that, the unchanged tail of the content is paired with the old
//! tail, so an insertion near the start doesn't make every following
//! sibling get patched into its neighbour's content.
//!
//! Inline content is grouped under mark descriptors. Frames on a stack
//! track the marks currently open; a mark descriptor from the old tree is
//! reused when a matching one is close ahead.

use crate::decoration::{Decoration, DecorationKind, DecorationSet};
use crate::viewdesc::{DescId, RenderCx, ViewDesc};
use std::collections::{HashMap, VecDeque};
use tracing::trace;
use verso_model::{Mark, Node};

/// How far ahead to look for a reusable node descriptor
const NODE_LOOKAHEAD: usize = 5;
/// How far ahead to look for a reusable mark descriptor
const MARK_LOOKAHEAD: usize = 3;

pub(crate) enum ChildItem {
    Widget(Decoration),
    Node {
        node: Node,
        /// Offset in the parent's content
        offset: usize,
        outer: Vec<Decoration>,
        inner: DecorationSet,
    },
}

/// Flatten `parent`'s content with its decorations (relative to the
/// content start). Text is split wherever an inline decoration starts or
/// ends, and wherever a widget sits.
pub(crate) fn iter_deco(parent: &Node, decos: &DecorationSet) -> Vec<ChildItem> {
    let widgets: Vec<&Decoration> = decos.iter().filter(|d| d.is_widget()).collect();
    let mut wi = 0;
    let mut items = Vec::with_capacity(parent.child_count());
    let mut offset = 0;

    for child in parent.children() {
        let end = offset + child.node_size();
        while wi < widgets.len() && widgets[wi].from <= offset {
            if widgets[wi].from == offset {
                items.push(ChildItem::Widget(widgets[wi].clone()));
            }
            wi += 1;
        }

        let node_decos: Vec<Decoration> = decos
            .iter()
            .filter(|d| matches!(d.kind(), DecorationKind::Node(_)) && d.from == offset && d.to == end)
            .cloned()
            .collect();
        let inline: Vec<&Decoration> = if child.is_inline() {
            decos
                .iter()
                .filter(|d| matches!(d.kind(), DecorationKind::Inline(_)) && d.from < end && d.to > offset)
                .collect()
        } else {
            Vec::new()
        };

        if child.is_text() {
            let mut cuts = vec![offset, end];
            for d in &inline {
                cuts.extend([d.from, d.to].into_iter().filter(|&p| p > offset && p < end));
            }
            cuts.extend(
                widgets[wi..]
                    .iter()
                    .map(|w| w.from)
                    .filter(|&p| p > offset && p < end),
            );
            cuts.sort_unstable();
            cuts.dedup();

            for pair in cuts.windows(2) {
                let (from, to) = (pair[0], pair[1]);
                while wi < widgets.len() && widgets[wi].from <= from {
                    if widgets[wi].from == from && from > offset {
                        items.push(ChildItem::Widget(widgets[wi].clone()));
                    }
                    wi += 1;
                }
                let mut outer = node_decos.clone();
                outer.extend(
                    inline
                        .iter()
                        .filter(|d| d.from <= from && d.to >= to)
                        .map(|d| (*d).clone()),
                );
                items.push(ChildItem::Node {
                    node: child.cut(from - offset, to - offset),
                    offset: from,
                    outer,
                    inner: DecorationSet::empty(),
                });
            }
        } else {
            let mut outer = node_decos;
            outer.extend(inline.into_iter().cloned());
            items.push(ChildItem::Node {
                node: child.clone(),
                offset,
                outer,
                inner: decos.for_child(offset, child),
            });
        }
        offset = end;
    }

    items.extend(
        widgets[wi..]
            .iter()
            .filter(|w| w.from == offset)
            .map(|w| ChildItem::Widget((*w).clone())),
    );
    items
}

struct Frame {
    /// Mark descriptor being filled; `None` for the parent itself
    mark: Option<ViewDesc>,
    pool: VecDeque<ViewDesc>,
    out: Vec<ViewDesc>,
}

struct TreeUpdater {
    stack: Vec<Frame>,
    /// Old descriptors paired with the item index they render unchanged
    pre_matched: HashMap<DescId, usize>,
}

/// Reconcile `old` children against `parent`'s content, `base` being the
/// absolute position where that content starts
pub(crate) fn update_children(
    cx: &mut RenderCx<'_>,
    parent: &Node,
    inner: &DecorationSet,
    old: Vec<ViewDesc>,
    base: usize,
) -> Vec<ViewDesc> {
    let items = iter_deco(parent, inner);
    let mut updater = TreeUpdater {
        pre_matched: pre_match(&old, &items),
        stack: vec![Frame {
            mark: None,
            pool: old.into(),
            out: Vec::with_capacity(items.len()),
        }],
    };

    for (index, item) in items.into_iter().enumerate() {
        match item {
            ChildItem::Widget(deco) => {
                let marks = deco
                    .widget_spec()
                    .map(|spec| spec.marks.clone())
                    .unwrap_or_default();
                updater.sync_to_marks(cx, &marks);
                updater.place_widget(cx, deco);
            }
            ChildItem::Node {
                node,
                offset,
                outer,
                inner,
            } => {
                let marks = if node.is_inline() {
                    node.marks().to_vec()
                } else {
                    Vec::new()
                };
                updater.sync_to_marks(cx, &marks);
                let pos = base + offset;
                if !updater.find_node_match(cx, &node, &outer, &inner, index)
                    && !updater.update_next_node(cx, &node, &outer, &inner, pos, index)
                {
                    updater.add_node(cx, &node, &outer, &inner, pos);
                }
            }
        }
    }
    updater.finish(cx)
}

/// Pair the unchanged tail of the new content with the old children
fn pre_match(old: &[ViewDesc], items: &[ChildItem]) -> HashMap<DescId, usize> {
    let mut matched = HashMap::new();
    for (desc, (index, item)) in old.iter().rev().zip(items.iter().enumerate().rev()) {
        let ChildItem::Node {
            node, outer, inner, ..
        } = item
        else {
            break;
        };
        if node.is_inline() && !node.marks().is_empty() {
            break;
        }
        if !desc.matches_node(node, outer, inner) {
            break;
        }
        matched.insert(desc.id(), index);
    }
    matched
}

impl TreeUpdater {
    fn top(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn destroy_front(&mut self, cx: &mut RenderCx<'_>, count: usize) {
        for _ in 0..count {
            if let Some(desc) = self.top().pool.pop_front() {
                desc.destroy(cx);
            }
        }
    }

    /// Close mark frames that don't fit `marks`, then open the missing ones
    fn sync_to_marks(&mut self, cx: &mut RenderCx<'_>, marks: &[Mark]) {
        let mut depth = 0;
        while depth < marks.len() && depth + 1 < self.stack.len() {
            let open = self.stack[depth + 1].mark.as_ref().and_then(ViewDesc::mark);
            if open != Some(&marks[depth]) || !marks[depth].mark_type().spanning {
                break;
            }
            depth += 1;
        }
        while self.stack.len() > depth + 1 {
            self.close_frame(cx);
        }

        for mark in &marks[depth..] {
            let found = self.stack.last().and_then(|frame| {
                let i = frame
                    .pool
                    .iter()
                    .take(MARK_LOOKAHEAD)
                    .position(|d| d.is_mark_for(mark))?;
                // Never skip past a descriptor the tail still needs
                let skips_pre_matched = frame
                    .pool
                    .iter()
                    .take(i)
                    .any(|d| self.pre_matched.contains_key(&d.id()));
                (!skips_pre_matched).then_some(i)
            });
            let frame = match found {
                Some(i) => {
                    self.destroy_front(cx, i);
                    match self.top().pool.pop_front() {
                        Some(mut desc) => {
                            let pool = desc.take_children().into();
                            Frame {
                                mark: Some(desc),
                                pool,
                                out: Vec::new(),
                            }
                        }
                        None => continue,
                    }
                }
                None => Frame {
                    mark: Some(ViewDesc::create_mark(cx, mark)),
                    pool: VecDeque::new(),
                    out: Vec::new(),
                },
            };
            self.stack.push(frame);
        }
    }

    fn close_frame(&mut self, cx: &mut RenderCx<'_>) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        for desc in frame.pool {
            desc.destroy(cx);
        }
        if let Some(mut mark) = frame.mark {
            mark.set_children(frame.out);
            mark.render_children(cx.dom);
            self.top().out.push(mark);
        }
    }

    fn find_node_match(
        &mut self,
        cx: &mut RenderCx<'_>,
        node: &Node,
        outer: &[Decoration],
        inner: &DecorationSet,
        index: usize,
    ) -> bool {
        let pre_matched = &self.pre_matched;
        let top = self.stack.last().map(|f| &f.pool);
        let Some(pool) = top else {
            return false;
        };
        let mut found = None;
        for (i, desc) in pool.iter().take(NODE_LOOKAHEAD).enumerate() {
            if let Some(&target) = pre_matched.get(&desc.id()) {
                if target != index {
                    break;
                }
            }
            if desc.matches_node(node, outer, inner) {
                found = Some(i);
                break;
            }
        }
        let Some(i) = found else {
            return false;
        };
        self.destroy_front(cx, i);
        if let Some(desc) = self.top().pool.pop_front() {
            self.top().out.push(desc);
        }
        true
    }

    fn update_next_node(
        &mut self,
        cx: &mut RenderCx<'_>,
        node: &Node,
        outer: &[Decoration],
        inner: &DecorationSet,
        pos: usize,
        index: usize,
    ) -> bool {
        let target = self
            .stack
            .last()
            .and_then(|frame| frame.pool.front())
            .and_then(|desc| self.pre_matched.get(&desc.id()).copied());
        if target.is_some_and(|target| target != index) {
            return false;
        }
        let top = self.top();
        let Some(front) = top.pool.front_mut() else {
            return false;
        };
        if front.node().is_none() || !front.update(cx, node, outer, inner, pos) {
            return false;
        }
        if let Some(desc) = top.pool.pop_front() {
            top.out.push(desc);
        }
        true
    }

    fn add_node(
        &mut self,
        cx: &mut RenderCx<'_>,
        node: &Node,
        outer: &[Decoration],
        inner: &DecorationSet,
        pos: usize,
    ) {
        let desc = ViewDesc::create_node(cx, node, outer, inner, pos);
        self.top().out.push(desc);
    }

    fn place_widget(&mut self, cx: &mut RenderCx<'_>, deco: Decoration) {
        let top = self.top();
        let reusable = top
            .pool
            .front()
            .and_then(ViewDesc::widget)
            .map(|w| w.same_kind(&deco))
            .unwrap_or(false);
        if reusable {
            if let Some(mut desc) = top.pool.pop_front() {
                desc.set_widget(deco);
                top.out.push(desc);
                return;
            }
        }
        let desc = ViewDesc::create_widget(cx, &deco);
        self.top().out.push(desc);
    }

    fn finish(mut self, cx: &mut RenderCx<'_>) -> Vec<ViewDesc> {
        while self.stack.len() > 1 {
            self.close_frame(cx);
        }
        let Some(frame) = self.stack.pop() else {
            return Vec::new();
        };
        if !frame.pool.is_empty() {
            trace!(count = frame.pool.len(), "Destroying unmatched descriptors");
        }
        for desc in frame.pool {
            desc.destroy(cx);
        }
        frame.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::{DecoAttrs, WidgetSpec};
    use crate::dom::Dom;
    use verso_model::{Attrs, Schema};

    fn node_offsets(items: &[ChildItem]) -> Vec<(usize, String)> {
        items
            .iter()
            .map(|item| match item {
                ChildItem::Widget(d) => (d.from, "widget".to_string()),
                ChildItem::Node { node, offset, .. } => (*offset, node.text_content()),
            })
            .collect()
    }

    #[test]
    fn test_iter_deco_plain_children() {
        let doc = Schema::basic().doc_of_paragraphs(&["ab", "cd"]).unwrap();
        let items = iter_deco(&doc, &DecorationSet::empty());
        assert_eq!(node_offsets(&items), vec![(0, "ab".to_string()), (4, "cd".to_string())]);
    }

    #[test]
    fn test_iter_deco_splits_text() {
        let schema = Schema::basic();
        let para = schema
            .node("paragraph", Attrs::new(), vec![schema.text("abcdef", vec![]).unwrap()])
            .unwrap();
        let widget = WidgetSpec::new(|dom: &mut Dom| dom.create_element("span"));
        let decos = DecorationSet::create(
            &para,
            vec![
                Decoration::inline(1, 3, DecoAttrs::class("x")),
                Decoration::widget(5, widget),
            ],
        );
        let items = iter_deco(&para, &decos);
        assert_eq!(
            node_offsets(&items),
            vec![
                (0, "a".to_string()),
                (1, "bc".to_string()),
                (3, "de".to_string()),
                (5, "widget".to_string()),
                (5, "f".to_string()),
            ]
        );
        let ChildItem::Node { outer, .. } = &items[1] else {
            panic!("expected a node");
        };
        assert_eq!(outer.len(), 1);
    }

    #[test]
    fn test_inline_decorations_skip_blocks() {
        let doc = Schema::basic().doc_of_paragraphs(&["ab"]).unwrap();
        let decos = DecorationSet::create(&doc, vec![Decoration::inline(0, 4, DecoAttrs::class("x"))]);
        let items = iter_deco(&doc, &decos);
        let ChildItem::Node { outer, inner, .. } = &items[0] else {
            panic!("expected a node");
        };
        assert!(outer.is_empty());
        assert_eq!(inner.len(), 1);
    }
}

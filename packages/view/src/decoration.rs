//! # Decorations
//!
//! Presentational annotations layered over a document without changing it.
//!
//! ## Variants
//!
//! - **Widget**: a caller-rendered DOM node placed at a single position
//! - **Inline**: attributes applied to the inline content of a range
//! - **Node**: attributes merged onto one node's own DOM. When the
//!   attributes name an element (`node_name`) the node is wrapped in it
//!
//! Decorations are recomputed from state on every update, so two sets are
//! compared structurally: equal ranges and equal payloads, regardless of
//! whether they are the same allocation.

use crate::dom::{Dom, DomId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use verso_model::{Mapping, Mark, Node};

/// Renders a widget's DOM
pub type WidgetRender = Arc<dyn Fn(&mut Dom) -> DomId>;

/// Attributes a decoration adds to rendered nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoAttrs {
    /// Wrap the node in an element of this name instead of touching its own DOM
    pub node_name: Option<String>,
    pub class: Option<String>,
    pub style: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl DecoAttrs {
    pub fn class(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            ..Self::default()
        }
    }

    pub fn style(style: impl Into<String>) -> Self {
        Self {
            style: Some(style.into()),
            ..Self::default()
        }
    }

    pub fn wrapper(node_name: impl Into<String>) -> Self {
        Self {
            node_name: Some(node_name.into()),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.class.is_none() && self.style.is_none() && self.attrs.is_empty()
    }

    /// Merge `other` into `self`: classes and styles concatenate, other attributes overwrite
    pub fn merge(&mut self, other: &DecoAttrs) {
        if let Some(class) = &other.class {
            self.class = Some(match self.class.take() {
                Some(existing) => format!("{} {}", existing, class),
                None => class.clone(),
            });
        }
        if let Some(style) = &other.style {
            self.style = Some(match self.style.take() {
                Some(existing) => format!("{};{}", existing, style),
                None => style.clone(),
            });
        }
        for (name, value) in &other.attrs {
            self.attrs.insert(name.clone(), value.clone());
        }
    }

    /// Flat attribute list as written to the DOM
    pub fn dom_attrs(&self) -> BTreeMap<String, String> {
        let mut out = self.attrs.clone();
        if let Some(class) = &self.class {
            out.insert("class".to_string(), class.clone());
        }
        if let Some(style) = &self.style {
            out.insert("style".to_string(), style.clone());
        }
        out
    }
}

/// Widget payload
#[derive(Clone)]
pub struct WidgetSpec {
    /// Widgets with equal keys are interchangeable
    pub key: Option<String>,
    /// Ordering among widgets at the same position (negative first)
    pub side: i32,
    /// Marks the widget is rendered inside of
    pub marks: Vec<Mark>,
    pub render: WidgetRender,
}

impl WidgetSpec {
    pub fn new(render: impl Fn(&mut Dom) -> DomId + 'static) -> Self {
        Self {
            key: None,
            side: 0,
            marks: Vec::new(),
            render: Arc::new(render),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_side(mut self, side: i32) -> Self {
        self.side = side;
        self
    }

    pub fn with_marks(mut self, marks: Vec<Mark>) -> Self {
        self.marks = marks;
        self
    }

    fn same(&self, other: &WidgetSpec) -> bool {
        let key_eq = match (&self.key, &other.key) {
            (Some(a), Some(b)) => a == b,
            (None, None) => Arc::ptr_eq(&self.render, &other.render),
            _ => false,
        };
        key_eq && self.side == other.side && self.marks == other.marks
    }
}

impl fmt::Debug for WidgetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetSpec")
            .field("key", &self.key)
            .field("side", &self.side)
            .field("marks", &self.marks)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum DecorationKind {
    Widget(WidgetSpec),
    Inline(DecoAttrs),
    Node(DecoAttrs),
}

impl PartialEq for DecorationKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DecorationKind::Widget(a), DecorationKind::Widget(b)) => a.same(b),
            (DecorationKind::Inline(a), DecorationKind::Inline(b)) => a == b,
            (DecorationKind::Node(a), DecorationKind::Node(b)) => a == b,
            _ => false,
        }
    }
}

/// One decoration over `from..to` (a point for widgets)
#[derive(Debug, Clone)]
pub struct Decoration {
    pub from: usize,
    pub to: usize,
    kind: Arc<DecorationKind>,
}

impl Decoration {
    pub fn widget(pos: usize, spec: WidgetSpec) -> Self {
        Self {
            from: pos,
            to: pos,
            kind: Arc::new(DecorationKind::Widget(spec)),
        }
    }

    pub fn inline(from: usize, to: usize, attrs: DecoAttrs) -> Self {
        Self {
            from,
            to,
            kind: Arc::new(DecorationKind::Inline(attrs)),
        }
    }

    /// Decoration of the node spanning exactly `from..to`
    pub fn node(from: usize, to: usize, attrs: DecoAttrs) -> Self {
        Self {
            from,
            to,
            kind: Arc::new(DecorationKind::Node(attrs)),
        }
    }

    pub fn kind(&self) -> &DecorationKind {
        &self.kind
    }

    pub fn is_widget(&self) -> bool {
        matches!(*self.kind, DecorationKind::Widget(_))
    }

    pub fn widget_spec(&self) -> Option<&WidgetSpec> {
        match &*self.kind {
            DecorationKind::Widget(spec) => Some(spec),
            _ => None,
        }
    }

    /// Attributes of inline and node decorations
    pub fn attrs(&self) -> Option<&DecoAttrs> {
        match &*self.kind {
            DecorationKind::Inline(attrs) | DecorationKind::Node(attrs) => Some(attrs),
            DecorationKind::Widget(_) => None,
        }
    }

    /// Same payload, ignoring the range
    pub fn same_kind(&self, other: &Decoration) -> bool {
        Arc::ptr_eq(&self.kind, &other.kind) || *self.kind == *other.kind
    }

    fn shifted(&self, from: usize, to: usize) -> Decoration {
        Decoration {
            from,
            to,
            kind: self.kind.clone(),
        }
    }

    fn sort_key(&self) -> (usize, i32, usize) {
        let side = self.widget_spec().map(|w| w.side).unwrap_or(0);
        (self.from, side, self.to)
    }
}

impl PartialEq for Decoration {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from && self.to == other.to && self.same_kind(other)
    }
}

/// Whether two outer decoration lists render the same
pub fn same_outer_deco(a: &[Decoration], b: &[Decoration]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_kind(y))
}

/// Immutable, position-sorted collection of decorations
#[derive(Debug, Clone, Default)]
pub struct DecorationSet {
    decos: Arc<Vec<Decoration>>,
}

impl DecorationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set for `doc`, dropping decorations outside its content
    pub fn create(doc: &Node, decorations: Vec<Decoration>) -> Self {
        let size = doc.content_size();
        let decos = decorations
            .into_iter()
            .filter(|d| d.from <= d.to && d.to <= size)
            .filter(|d| d.is_widget() || d.from < d.to)
            .collect();
        Self::from_sorted(decos)
    }

    fn from_sorted(mut decos: Vec<Decoration>) -> Self {
        decos.sort_by_key(Decoration::sort_key);
        Self {
            decos: Arc::new(decos),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.decos.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decos.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decos.iter()
    }

    /// Decorations touching `from..to` (widgets at either end included)
    pub fn find(&self, from: usize, to: usize) -> Vec<&Decoration> {
        self.decos
            .iter()
            .filter(|d| {
                if d.is_widget() || from == to {
                    d.from <= to && d.to >= from
                } else {
                    d.from < to && d.to > from
                }
            })
            .collect()
    }

    /// Union of several sets
    pub fn merge(sets: &[DecorationSet]) -> DecorationSet {
        let non_empty: Vec<&DecorationSet> = sets.iter().filter(|s| !s.is_empty()).collect();
        match non_empty.len() {
            0 => DecorationSet::empty(),
            1 => non_empty[0].clone(),
            _ => Self::from_sorted(
                non_empty
                    .iter()
                    .flat_map(|s| s.decos.iter().cloned())
                    .collect(),
            ),
        }
    }

    /// Same set with one more decoration
    pub fn add(&self, deco: Decoration) -> DecorationSet {
        let mut decos: Vec<Decoration> = self.decos.iter().cloned().collect();
        decos.push(deco);
        Self::from_sorted(decos)
    }

    /// Map through a document change. Inline decorations that collapse and
    /// node decorations whose node was replaced are dropped.
    pub fn map(&self, mapping: &Mapping, doc: &Node) -> DecorationSet {
        if self.is_empty() || mapping.is_empty() {
            return self.clone();
        }
        let mut out = Vec::with_capacity(self.decos.len());
        for deco in self.decos.iter() {
            match &*deco.kind {
                DecorationKind::Widget(spec) => {
                    let assoc = if spec.side < 0 { -1 } else { 1 };
                    let result = mapping.map_result(deco.from, assoc);
                    if !result.deleted {
                        out.push(deco.shifted(result.pos, result.pos));
                    }
                }
                DecorationKind::Inline(_) => {
                    let from = mapping.map(deco.from, 1);
                    let to = mapping.map(deco.to, -1);
                    if from < to {
                        out.push(deco.shifted(from, to));
                    }
                }
                DecorationKind::Node(_) => {
                    let from = mapping.map_result(deco.from, 1);
                    let to = mapping.map_result(deco.to, -1);
                    if from.deleted || to.deleted || from.pos >= to.pos {
                        continue;
                    }
                    let fits = doc
                        .node_at(from.pos)
                        .map(|n| !n.is_text() && n.node_size() == to.pos - from.pos)
                        .unwrap_or(false);
                    if fits {
                        out.push(deco.shifted(from.pos, to.pos));
                    }
                }
            }
        }
        Self::from_sorted(out)
    }

    /// Decorations inside the content of the child spanning
    /// `offset..offset + child.node_size()`, relative to that content
    pub fn for_child(&self, offset: usize, child: &Node) -> DecorationSet {
        if self.is_empty() || child.is_text() || child.is_leaf() {
            return DecorationSet::empty();
        }
        let start = offset + 1;
        let end = start + child.content_size();
        let mut out = Vec::new();
        for deco in self.decos.iter() {
            if deco.from > end {
                break;
            }
            match &*deco.kind {
                DecorationKind::Widget(_) => {
                    if deco.from >= start && deco.from <= end {
                        out.push(deco.shifted(deco.from - start, deco.from - start));
                    }
                }
                DecorationKind::Node(_) => {
                    if deco.from >= start && deco.to <= end {
                        out.push(deco.shifted(deco.from - start, deco.to - start));
                    }
                }
                DecorationKind::Inline(_) => {
                    let from = deco.from.max(start);
                    let to = deco.to.min(end);
                    if from < to {
                        out.push(deco.shifted(from - start, to - start));
                    }
                }
            }
        }
        if out.is_empty() {
            DecorationSet::empty()
        } else {
            Self::from_sorted(out)
        }
    }
}

impl PartialEq for DecorationSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.decos, &other.decos) || self.decos == other.decos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verso_model::{Attrs, Schema, StepMap};

    fn doc() -> Node {
        Schema::basic().doc_of_paragraphs(&["Hello", "World"]).unwrap()
    }

    #[test]
    fn test_structural_equality() {
        let doc = doc();
        let a = DecorationSet::create(&doc, vec![Decoration::inline(1, 3, DecoAttrs::class("hl"))]);
        let b = DecorationSet::create(&doc, vec![Decoration::inline(1, 3, DecoAttrs::class("hl"))]);
        assert_eq!(a, b);

        let c = DecorationSet::create(&doc, vec![Decoration::inline(1, 4, DecoAttrs::class("hl"))]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_keyed_widgets_compare_equal() {
        let make = || WidgetSpec::new(|dom: &mut Dom| dom.create_element("span")).with_key("w");
        assert_eq!(Decoration::widget(2, make()), Decoration::widget(2, make()));

        let unkeyed = || WidgetSpec::new(|dom: &mut Dom| dom.create_element("span"));
        assert_ne!(Decoration::widget(2, unkeyed()), Decoration::widget(2, unkeyed()));
    }

    #[test]
    fn test_create_drops_out_of_range() {
        let doc = doc();
        let set = DecorationSet::create(
            &doc,
            vec![
                Decoration::inline(1, 50, DecoAttrs::class("x")),
                Decoration::inline(3, 3, DecoAttrs::class("empty")),
                Decoration::node(0, 7, DecoAttrs::class("p")),
            ],
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_for_child_clips_and_shifts() {
        let doc = doc();
        let set = DecorationSet::create(
            &doc,
            vec![
                Decoration::inline(3, 10, DecoAttrs::class("x")),
                Decoration::node(0, 7, DecoAttrs::class("p")),
            ],
        );
        let first = set.for_child(0, doc.child(0).unwrap());
        let decos: Vec<(usize, usize)> = first.iter().map(|d| (d.from, d.to)).collect();
        assert_eq!(decos, vec![(2, 5)]);

        let second = set.for_child(7, doc.child(1).unwrap());
        let decos: Vec<(usize, usize)> = second.iter().map(|d| (d.from, d.to)).collect();
        assert_eq!(decos, vec![(0, 2)]);
    }

    #[test]
    fn test_find() {
        let doc = doc();
        let set = DecorationSet::create(
            &doc,
            vec![
                Decoration::inline(1, 3, DecoAttrs::class("a")),
                Decoration::inline(9, 11, DecoAttrs::class("b")),
            ],
        );
        assert_eq!(set.find(2, 4).len(), 1);
        assert_eq!(set.find(0, 14).len(), 2);
        assert_eq!(set.find(4, 8).len(), 0);
    }

    #[test]
    fn test_map_through_insertion() {
        let doc = doc();
        let set = DecorationSet::create(
            &doc,
            vec![
                Decoration::inline(2, 4, DecoAttrs::class("a")),
                Decoration::node(7, 14, DecoAttrs::class("p")),
            ],
        );
        let mut mapping = Mapping::new();
        mapping.push(StepMap::replace(1, 0, 3));
        let schema = Schema::basic();
        let new_doc = schema
            .node(
                "doc",
                Attrs::new(),
                vec![
                    schema
                        .node("paragraph", Attrs::new(), vec![schema.text("abcHello", Vec::new()).unwrap()])
                        .unwrap(),
                    doc.child(1).unwrap().clone(),
                ],
            )
            .unwrap();

        let mapped = set.map(&mapping, &new_doc);
        let ranges: Vec<(usize, usize)> = mapped.iter().map(|d| (d.from, d.to)).collect();
        assert_eq!(ranges, vec![(5, 7), (10, 17)]);
    }

    #[test]
    fn test_merge_combines_sources() {
        let doc = doc();
        let a = DecorationSet::create(&doc, vec![Decoration::inline(8, 9, DecoAttrs::class("a"))]);
        let b = DecorationSet::create(&doc, vec![Decoration::inline(1, 2, DecoAttrs::class("b"))]);
        let merged = DecorationSet::merge(&[a.clone(), DecorationSet::empty(), b]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.iter().next().map(|d| d.from), Some(1));
        assert_eq!(DecorationSet::merge(&[a.clone()]), a);
    }

    #[test]
    fn test_attr_merge() {
        let mut attrs = DecoAttrs::class("a").with_attr("title", "one");
        attrs.merge(&DecoAttrs::class("b").with_attr("title", "two"));
        attrs.merge(&DecoAttrs::style("color: red"));
        let flat = attrs.dom_attrs();
        assert_eq!(flat.get("class").map(String::as_str), Some("a b"));
        assert_eq!(flat.get("title").map(String::as_str), Some("two"));
        assert_eq!(flat.get("style").map(String::as_str), Some("color: red"));
    }
}

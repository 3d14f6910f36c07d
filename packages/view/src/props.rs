//! # Props
//!
//! Extension points the view consults, and the fixed order it consults
//! them in: the view's own props first, then the view's direct plugins,
//! then the plugins of the current state.
//!
//! Most props resolve first-truthy-wins. `decorations` merge across all
//! providers, `editable` is false as soon as one provider says so, and
//! `attributes` concatenate classes while other names keep the first
//! value seen.

use crate::decoration::{DecoAttrs, DecorationSet};
use crate::node_view::{MarkViewFactory, NodeViewFactory};
use crate::state::{EditorState, Plugin};
use crate::view::EditorView;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use verso_model::Selection;

pub type DecorationsProp = Arc<dyn Fn(&EditorState) -> DecorationSet>;
pub type EditableProp = Arc<dyn Fn(&EditorState) -> bool>;
/// Return `true` to take over scrolling the selection into view
pub type ScrollToSelectionProp = Arc<dyn Fn(&EditorView) -> bool>;
/// Turn a platform anchor/head pair into a logical selection
pub type SelectionBetweenProp = Arc<dyn Fn(&EditorState, usize, usize) -> Option<Selection>>;

/// Attributes for the editable surface element
#[derive(Clone)]
pub enum AttributesProp {
    Static(BTreeMap<String, String>),
    Computed(Arc<dyn Fn(&EditorState) -> BTreeMap<String, String>>),
}

impl AttributesProp {
    fn resolve(&self, state: &EditorState) -> BTreeMap<String, String> {
        match self {
            AttributesProp::Static(attrs) => attrs.clone(),
            AttributesProp::Computed(f) => f(state),
        }
    }
}

/// One provider's set of props
#[derive(Clone, Default)]
pub struct EditorProps {
    pub node_views: BTreeMap<String, NodeViewFactory>,
    pub mark_views: BTreeMap<String, MarkViewFactory>,
    pub decorations: Option<DecorationsProp>,
    pub editable: Option<EditableProp>,
    pub attributes: Option<AttributesProp>,
    pub handle_scroll_to_selection: Option<ScrollToSelectionProp>,
    pub create_selection_between: Option<SelectionBetweenProp>,
}

impl EditorProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node_view(mut self, type_name: impl Into<String>, factory: NodeViewFactory) -> Self {
        self.node_views.insert(type_name.into(), factory);
        self
    }

    pub fn with_mark_view(mut self, mark_name: impl Into<String>, factory: MarkViewFactory) -> Self {
        self.mark_views.insert(mark_name.into(), factory);
        self
    }

    pub fn with_decorations(mut self, f: impl Fn(&EditorState) -> DecorationSet + 'static) -> Self {
        self.decorations = Some(Arc::new(f));
        self
    }

    pub fn with_editable(mut self, f: impl Fn(&EditorState) -> bool + 'static) -> Self {
        self.editable = Some(Arc::new(f));
        self
    }

    pub fn with_attributes(mut self, attrs: BTreeMap<String, String>) -> Self {
        self.attributes = Some(AttributesProp::Static(attrs));
        self
    }

    pub fn with_computed_attributes(
        mut self,
        f: impl Fn(&EditorState) -> BTreeMap<String, String> + 'static,
    ) -> Self {
        self.attributes = Some(AttributesProp::Computed(Arc::new(f)));
        self
    }

    pub fn with_scroll_to_selection(mut self, f: impl Fn(&EditorView) -> bool + 'static) -> Self {
        self.handle_scroll_to_selection = Some(Arc::new(f));
        self
    }

    pub fn with_selection_between(
        mut self,
        f: impl Fn(&EditorState, usize, usize) -> Option<Selection> + 'static,
    ) -> Self {
        self.create_selection_between = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for EditorProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorProps")
            .field("node_views", &self.node_views.keys().collect::<Vec<_>>())
            .field("mark_views", &self.mark_views.keys().collect::<Vec<_>>())
            .field("decorations", &self.decorations.is_some())
            .field("editable", &self.editable.is_some())
            .field("attributes", &self.attributes.is_some())
            .finish()
    }
}

/// Ordered prop providers
pub struct PropSources<'a> {
    providers: Vec<&'a EditorProps>,
}

impl<'a> PropSources<'a> {
    pub fn new(direct: &'a EditorProps, direct_plugins: &'a [Plugin], state_plugins: &'a [Plugin]) -> Self {
        let mut providers = Vec::with_capacity(1 + direct_plugins.len() + state_plugins.len());
        providers.push(direct);
        providers.extend(direct_plugins.iter().map(Plugin::props));
        providers.extend(state_plugins.iter().map(Plugin::props));
        Self { providers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a EditorProps> + '_ {
        self.providers.iter().copied()
    }

    /// First non-empty result across providers, in order
    pub fn resolve<T>(&self, f: impl FnMut(&'a EditorProps) -> Option<T>) -> Option<T> {
        self.iter().find_map(f)
    }

    pub fn editable(&self, state: &EditorState) -> bool {
        self.iter()
            .filter_map(|props| props.editable.as_ref())
            .all(|f| f(state))
    }

    pub fn decorations(&self, state: &EditorState) -> Vec<DecorationSet> {
        self.iter()
            .filter_map(|props| props.decorations.as_ref())
            .map(|f| f(state))
            .filter(|set| !set.is_empty())
            .collect()
    }

    /// Attributes of the editable surface
    pub fn attributes(&self, state: &EditorState, editable: bool) -> DecoAttrs {
        let mut out = DecoAttrs::class("verso");
        for props in self.iter() {
            let Some(attributes) = &props.attributes else {
                continue;
            };
            for (name, value) in attributes.resolve(state) {
                match name.as_str() {
                    "class" => out.merge(&DecoAttrs::class(value)),
                    "style" => out.merge(&DecoAttrs::style(value)),
                    "contenteditable" => {}
                    _ => {
                        out.attrs.entry(name).or_insert(value);
                    }
                }
            }
        }
        out.attrs
            .entry("translate".to_string())
            .or_insert_with(|| "no".to_string());
        out.attrs
            .insert("contenteditable".to_string(), editable.to_string());
        out
    }
}

/// Effective node and mark view factories, first registrant per name wins
#[derive(Clone, Default)]
pub struct NodeViewRegistry {
    nodes: BTreeMap<String, NodeViewFactory>,
    marks: BTreeMap<String, MarkViewFactory>,
}

impl NodeViewRegistry {
    pub fn build(sources: &PropSources<'_>) -> Self {
        let mut registry = Self::default();
        for props in sources.iter() {
            for (name, factory) in &props.node_views {
                registry
                    .nodes
                    .entry(name.clone())
                    .or_insert_with(|| factory.clone());
            }
            for (name, factory) in &props.mark_views {
                registry
                    .marks
                    .entry(name.clone())
                    .or_insert_with(|| factory.clone());
            }
        }
        registry
    }

    pub fn node_view(&self, type_name: &str) -> Option<&NodeViewFactory> {
        self.nodes.get(type_name)
    }

    pub fn mark_view(&self, mark_name: &str) -> Option<&MarkViewFactory> {
        self.marks.get(mark_name)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.marks.is_empty()
    }

    /// Same names mapped to the very same factories
    pub fn same_as(&self, other: &NodeViewRegistry) -> bool {
        fn same<T: ?Sized>(a: &BTreeMap<String, Arc<T>>, b: &BTreeMap<String, Arc<T>>) -> bool {
            a.len() == b.len()
                && a
                    .iter()
                    .zip(b)
                    .all(|((ka, fa), (kb, fb))| ka == kb && Arc::ptr_eq(fa, fb))
        }
        same(&self.nodes, &other.nodes) && same(&self.marks, &other.marks)
    }
}

impl fmt::Debug for NodeViewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeViewRegistry")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("marks", &self.marks.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;
    use crate::node_view::{NodeView, NodeViewContext};
    use crate::state::StateConfig;
    use crate::DomId;
    use verso_model::Schema;

    struct Hr(DomId);

    impl NodeView for Hr {
        fn dom(&self) -> DomId {
            self.0
        }
    }

    fn factory() -> NodeViewFactory {
        Arc::new(|_ctx: &NodeViewContext<'_>, dom: &mut Dom| Box::new(Hr(dom.create_element("hr"))) as Box<dyn NodeView>)
    }

    fn state() -> EditorState {
        let schema = Arc::new(Schema::basic());
        let doc = schema.doc_of_paragraphs(&["Hi"]).unwrap();
        EditorState::create(StateConfig::new(schema, doc))
    }

    #[test]
    fn test_first_truthy_wins() {
        let direct = EditorProps::new();
        let plugins = vec![
            Plugin::new("a").with_props(EditorProps::new().with_selection_between(|_, _, _| None)),
            Plugin::new("b").with_props(EditorProps::new().with_selection_between(|_, a, _| Some(Selection::Text { anchor: a, head: a }))),
        ];
        let sources = PropSources::new(&direct, &plugins, &[]);
        let state = state();
        let resolved = sources.resolve(|props| {
            props
                .create_selection_between
                .as_ref()
                .and_then(|f| f(&state, 2, 3))
        });
        assert_eq!(resolved, Some(Selection::Text { anchor: 2, head: 2 }));
    }

    #[test]
    fn test_editable_any_false_wins() {
        let direct = EditorProps::new().with_editable(|_| true);
        let plugins = vec![Plugin::new("ro").with_props(EditorProps::new().with_editable(|_| false))];
        let state = state();
        assert!(!PropSources::new(&direct, &plugins, &[]).editable(&state));
        assert!(PropSources::new(&direct, &[], &[]).editable(&state));
    }

    #[test]
    fn test_attributes_merge() {
        let mut first = BTreeMap::new();
        first.insert("class".to_string(), "one".to_string());
        first.insert("spellcheck".to_string(), "false".to_string());
        let mut second = BTreeMap::new();
        second.insert("class".to_string(), "two".to_string());
        second.insert("spellcheck".to_string(), "true".to_string());
        second.insert("contenteditable".to_string(), "true".to_string());

        let direct = EditorProps::new().with_attributes(first);
        let plugins = vec![Plugin::new("p").with_props(EditorProps::new().with_attributes(second))];
        let attrs = PropSources::new(&direct, &plugins, &[]).attributes(&state(), false);

        assert_eq!(attrs.class.as_deref(), Some("verso one two"));
        assert_eq!(attrs.attrs.get("spellcheck").map(String::as_str), Some("false"));
        assert_eq!(attrs.attrs.get("contenteditable").map(String::as_str), Some("false"));
        assert_eq!(attrs.attrs.get("translate").map(String::as_str), Some("no"));
    }

    #[test]
    fn test_registry_first_registrant_wins() {
        let winner = factory();
        let direct = EditorProps::new().with_node_view("horizontal_rule", winner.clone());
        let plugins = vec![Plugin::new("p").with_props(EditorProps::new().with_node_view("horizontal_rule", factory()))];
        let registry = NodeViewRegistry::build(&PropSources::new(&direct, &plugins, &[]));
        assert!(Arc::ptr_eq(registry.node_view("horizontal_rule").unwrap(), &winner));

        let again = NodeViewRegistry::build(&PropSources::new(&direct, &plugins, &[]));
        assert!(registry.same_as(&again));
        assert!(!registry.same_as(&NodeViewRegistry::default()));
    }
}

//! # Editor State
//!
//! Immutable snapshot the view renders: document, selection, stored
//! marks, active plugins and the scroll request counter.
//!
//! A [`Transaction`] collects steps and selection intents against one
//! state and produces the next one through [`EditorState::apply`].

use crate::error::{ViewError, ViewResult};
use crate::plugin_view::PluginViewFactory;
use crate::props::EditorProps;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use verso_model::{Mark, Node, Schema, Selection, Step, Transform};

/// Named extension carrying props and an optional plugin view
#[derive(Clone)]
pub struct Plugin {
    key: String,
    props: EditorProps,
    view: Option<PluginViewFactory>,
}

impl Plugin {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            props: EditorProps::default(),
            view: None,
        }
    }

    pub fn with_props(mut self, props: EditorProps) -> Self {
        self.props = props;
        self
    }

    pub fn with_view(mut self, factory: PluginViewFactory) -> Self {
        self.view = Some(factory);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn props(&self) -> &EditorProps {
        &self.props
    }

    pub fn view_factory(&self) -> Option<&PluginViewFactory> {
        self.view.as_ref()
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("key", &self.key)
            .field("view", &self.view.is_some())
            .finish()
    }
}

/// Shared plugin list. Identity, not content, tells whether the set changed.
#[derive(Clone, Debug, Default)]
pub struct PluginSet(Arc<Vec<Plugin>>);

impl PluginSet {
    pub fn new(plugins: Vec<Plugin>) -> Self {
        Self(Arc::new(plugins))
    }

    pub fn ptr_eq(&self, other: &PluginSet) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.0.iter()
    }
}

/// Parameters for [`EditorState::create`]
pub struct StateConfig {
    pub schema: Arc<Schema>,
    pub doc: Node,
    pub selection: Option<Selection>,
    pub plugins: Vec<Plugin>,
}

impl StateConfig {
    pub fn new(schema: Arc<Schema>, doc: Node) -> Self {
        Self {
            schema,
            doc,
            selection: None,
            plugins: Vec::new(),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_plugins(mut self, plugins: Vec<Plugin>) -> Self {
        self.plugins = plugins;
        self
    }
}

#[derive(Clone, Debug)]
pub struct EditorState {
    schema: Arc<Schema>,
    doc: Node,
    selection: Selection,
    stored_marks: Option<Vec<Mark>>,
    plugins: PluginSet,
    scroll_to_selection: u64,
}

impl EditorState {
    pub fn create(config: StateConfig) -> EditorState {
        let selection = config
            .selection
            .map(|sel| sel.clamp(&config.doc))
            .unwrap_or_else(|| Selection::at_start(&config.doc));
        EditorState {
            schema: config.schema,
            doc: config.doc,
            selection,
            stored_marks: None,
            plugins: PluginSet::new(config.plugins),
            scroll_to_selection: 0,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn stored_marks(&self) -> Option<&[Mark]> {
        self.stored_marks.as_deref()
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    pub fn scroll_to_selection(&self) -> u64 {
        self.scroll_to_selection
    }

    pub fn tr(&self) -> Transaction {
        Transaction {
            transform: Transform::new(self.doc.clone()),
            base_selection: self.selection,
            selection: None,
            stored_marks: self.stored_marks.clone(),
            stored_marks_set: false,
            scroll: false,
        }
    }

    /// Next state after `tr`; fails when `tr` was built for another document
    pub fn apply(&self, tr: Transaction) -> ViewResult<EditorState> {
        if !Node::ptr_eq(tr.transform.before(), &self.doc) {
            return Err(ViewError::StaleTransaction);
        }
        let doc = tr.transform.doc().clone();
        let selection = tr.selection();
        let selection_changed = tr.selection.is_some();
        let stored_marks = if tr.stored_marks_set {
            tr.stored_marks.clone()
        } else if tr.doc_changed() || selection_changed {
            None
        } else {
            self.stored_marks.clone()
        };
        debug!(
            steps = tr.transform.steps().len(),
            selection_changed,
            scroll = tr.scroll,
            "Applying transaction"
        );
        Ok(EditorState {
            schema: self.schema.clone(),
            doc,
            selection,
            stored_marks,
            plugins: self.plugins.clone(),
            scroll_to_selection: self.scroll_to_selection + u64::from(tr.scroll),
        })
    }

    /// Same content with a new plugin list
    pub fn reconfigure(&self, plugins: Vec<Plugin>) -> EditorState {
        EditorState {
            plugins: PluginSet::new(plugins),
            ..self.clone()
        }
    }
}

/// Pending change to an [`EditorState`]
#[derive(Clone, Debug)]
pub struct Transaction {
    transform: Transform,
    base_selection: Selection,
    selection: Option<Selection>,
    stored_marks: Option<Vec<Mark>>,
    stored_marks_set: bool,
    scroll: bool,
}

impl Transaction {
    pub fn doc(&self) -> &Node {
        self.transform.doc()
    }

    pub fn before(&self) -> &Node {
        self.transform.before()
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn doc_changed(&self) -> bool {
        self.transform.doc_changed()
    }

    pub fn selection_set(&self) -> bool {
        self.selection.is_some()
    }

    /// Selection after this transaction, mapped through its steps unless set explicitly
    pub fn selection(&self) -> Selection {
        match self.selection {
            Some(sel) => sel.clamp(self.transform.doc()),
            None => self
                .base_selection
                .map(self.transform.mapping(), self.transform.doc()),
        }
    }

    pub fn step(&mut self, step: Step) -> ViewResult<&mut Self> {
        self.transform.step(step)?;
        Ok(self)
    }

    /// Replace the selection with text, using stored marks when present
    pub fn insert_text(&mut self, text: &str) -> ViewResult<&mut Self> {
        let sel = self.selection();
        self.step(Step::ReplaceText {
            from: sel.from(),
            to: sel.to(),
            text: text.to_string(),
            marks: self.stored_marks.clone(),
        })?;
        let end = self.transform.mapping().map(sel.to(), 1);
        self.set_selection(Selection::Text {
            anchor: end,
            head: end,
        });
        Ok(self)
    }

    pub fn replace_text(&mut self, from: usize, to: usize, text: &str) -> ViewResult<&mut Self> {
        self.step(Step::ReplaceText {
            from,
            to,
            text: text.to_string(),
            marks: None,
        })
    }

    pub fn delete(&mut self, from: usize, to: usize) -> ViewResult<&mut Self> {
        self.replace_text(from, to, "")
    }

    pub fn add_mark(&mut self, from: usize, to: usize, mark: Mark) -> ViewResult<&mut Self> {
        self.step(Step::AddMark { from, to, mark })
    }

    pub fn remove_mark(&mut self, from: usize, to: usize, mark: Mark) -> ViewResult<&mut Self> {
        self.step(Step::RemoveMark { from, to, mark })
    }

    pub fn set_node_attr(&mut self, pos: usize, name: &str, value: Option<&str>) -> ViewResult<&mut Self> {
        self.step(Step::SetAttr {
            pos,
            name: name.to_string(),
            value: value.map(str::to_string),
        })
    }

    pub fn insert_node(&mut self, pos: usize, node: Node) -> ViewResult<&mut Self> {
        self.step(Step::InsertNode { pos, node })
    }

    pub fn delete_node(&mut self, pos: usize) -> ViewResult<&mut Self> {
        self.step(Step::DeleteNode { pos })
    }

    /// Selection in terms of the transaction's current document
    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = Some(selection);
        self
    }

    pub fn set_stored_marks(&mut self, marks: Option<Vec<Mark>>) -> &mut Self {
        self.stored_marks = marks;
        self.stored_marks_set = true;
        self
    }

    pub fn scroll_into_view(&mut self) -> &mut Self {
        self.scroll = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verso_model::Attrs;

    fn state(paragraphs: &[&str]) -> EditorState {
        let schema = Arc::new(Schema::basic());
        let doc = schema.doc_of_paragraphs(paragraphs).unwrap();
        EditorState::create(StateConfig::new(schema, doc))
    }

    #[test]
    fn test_insert_text_moves_cursor() {
        let state = state(&["Hello"]);
        let mut tr = state.tr();
        tr.set_selection(Selection::Text { anchor: 6, head: 6 });
        tr.insert_text(" world").unwrap();
        let next = state.apply(tr).unwrap();

        assert_eq!(next.doc().text_content(), "Hello world");
        assert_eq!(*next.selection(), Selection::Text { anchor: 12, head: 12 });
    }

    #[test]
    fn test_selection_maps_through_steps() {
        let state = state(&["Hello"]);
        let mut tr = state.tr();
        tr.set_selection(Selection::Text { anchor: 4, head: 4 });
        let state = state.apply(tr).unwrap();

        let mut tr = state.tr();
        tr.replace_text(1, 1, "ab").unwrap();
        let next = state.apply(tr).unwrap();
        assert_eq!(*next.selection(), Selection::Text { anchor: 6, head: 6 });
    }

    #[test]
    fn test_stale_transaction_rejected() {
        let state = state(&["Hello"]);
        let mut first = state.tr();
        first.replace_text(1, 1, "x").unwrap();
        let next = state.apply(first).unwrap();

        let stale = state.tr();
        assert_eq!(next.apply(stale).unwrap_err(), ViewError::StaleTransaction);
    }

    #[test]
    fn test_stored_marks_cleared_on_change() {
        let state = state(&["Hello"]);
        let strong = state.schema().mark("strong", Attrs::new()).unwrap();
        let mut tr = state.tr();
        tr.set_stored_marks(Some(vec![strong.clone()]));
        let with_marks = state.apply(tr).unwrap();
        assert_eq!(with_marks.stored_marks(), Some(&[strong][..]));

        let unchanged = with_marks.apply(with_marks.tr()).unwrap();
        assert!(unchanged.stored_marks().is_some());

        let mut tr = with_marks.tr();
        tr.replace_text(1, 1, "x").unwrap();
        assert!(with_marks.apply(tr).unwrap().stored_marks().is_none());
    }

    #[test]
    fn test_scroll_counter_and_reconfigure() {
        let state = state(&["Hello"]);
        let mut tr = state.tr();
        tr.scroll_into_view();
        let next = state.apply(tr).unwrap();
        assert_eq!(next.scroll_to_selection(), 1);
        assert!(next.plugins().ptr_eq(state.plugins()));

        let reconfigured = next.reconfigure(vec![Plugin::new("extra")]);
        assert!(!reconfigured.plugins().ptr_eq(next.plugins()));
        assert!(Node::ptr_eq(reconfigured.doc(), next.doc()));
    }
}

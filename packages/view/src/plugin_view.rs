//! Plugin views: per-plugin objects living as long as the plugin is active

use crate::state::{EditorState, PluginSet};
use crate::view::EditorView;
use std::sync::Arc;
use tracing::debug;

/// Object a plugin keeps alongside the view
pub trait PluginView {
    /// Called after every update cycle with the state before it
    fn update(&mut self, _view: &EditorView, _prev_state: &EditorState) {}

    fn destroy(&mut self) {}
}

pub type PluginViewFactory = Arc<dyn Fn(&EditorView) -> Box<dyn PluginView>>;

/// Live plugin views, in plugin order (direct plugins first)
#[derive(Default)]
pub struct PluginViewRegistry {
    views: Vec<(String, Box<dyn PluginView>)>,
}

impl PluginViewRegistry {
    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.views.iter().map(|(key, _)| key.as_str())
    }

    /// Create one view per plugin that has a view factory
    pub fn create(view: &EditorView, direct: &PluginSet, state_plugins: &PluginSet) -> Self {
        let views: Vec<(String, Box<dyn PluginView>)> = direct
            .iter()
            .chain(state_plugins.iter())
            .filter_map(|plugin| {
                let factory = plugin.view_factory()?;
                Some((plugin.key().to_string(), factory(view)))
            })
            .collect();
        debug!(count = views.len(), "Created plugin views");
        Self { views }
    }

    pub fn update(&mut self, view: &EditorView, prev_state: &EditorState) {
        for (_, plugin_view) in self.views.iter_mut() {
            plugin_view.update(view, prev_state);
        }
    }

    pub fn destroy(&mut self) {
        for (key, mut plugin_view) in self.views.drain(..) {
            debug!(plugin = %key, "Destroying plugin view");
            plugin_view.destroy();
        }
    }
}

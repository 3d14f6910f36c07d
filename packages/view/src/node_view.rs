//! Caller-supplied rendering for specific node and mark types

use crate::decoration::{Decoration, DecorationSet};
use crate::dom::{Dom, DomId, MutationRecord};
use std::sync::Arc;
use verso_model::{Mark, Node};

/// Class put on the DOM of a selected node
pub const SELECTED_NODE_CLASS: &str = "verso-selectednode";

/// Read-only information handed to node view factories
#[derive(Debug, Clone, Copy)]
pub struct NodeViewContext<'a> {
    pub node: &'a Node,
    /// Position directly before the node
    pub pos: usize,
    pub outer: &'a [Decoration],
    pub inner: &'a DecorationSet,
    pub editable: bool,
}

/// Custom rendering and behavior for one node
pub trait NodeView {
    /// Outer DOM node of the view
    fn dom(&self) -> DomId;

    /// Where the view wants the node's content rendered, if anywhere
    fn content_dom(&self) -> Option<DomId> {
        None
    }

    /// Try to show `node` in place. Returning `false` makes the view get
    /// destroyed and recreated.
    fn update(
        &mut self,
        _dom: &mut Dom,
        _node: &Node,
        _outer: &[Decoration],
        _inner: &DecorationSet,
    ) -> bool {
        false
    }

    fn select_node(&mut self, dom: &mut Dom) {
        dom.add_class(self.dom(), SELECTED_NODE_CLASS);
    }

    fn deselect_node(&mut self, dom: &mut Dom) {
        dom.remove_class(self.dom(), SELECTED_NODE_CLASS);
    }

    /// Release anything the view holds besides its DOM
    fn destroy(&mut self, _dom: &mut Dom) {}

    /// Mutations the view handles itself and the view layer should not read
    fn ignore_mutation(&self, _record: &MutationRecord) -> bool {
        false
    }
}

/// Custom rendering for one mark
pub trait MarkView {
    fn dom(&self) -> DomId;

    fn content_dom(&self) -> Option<DomId> {
        Some(self.dom())
    }

    fn destroy(&mut self, _dom: &mut Dom) {}
}

pub type NodeViewFactory = Arc<dyn Fn(&NodeViewContext<'_>, &mut Dom) -> Box<dyn NodeView>>;

/// Mark view factory; the flag tells whether the marked content is inline
pub type MarkViewFactory = Arc<dyn Fn(&Mark, bool, &mut Dom) -> Box<dyn MarkView>>;

//! # Schema
//!
//! Node and mark type registry.
//!
//! The view layer only needs enough structure to render nodes and to
//! tell inline content from blocks, so a type is a name, a kind and a
//! handful of flags. Rendering uses `tag` as the element name.

use crate::{Attrs, Mark, ModelError, ModelResult, Node};
use std::collections::HashMap;
use std::sync::Arc;

/// Broad category of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Block-level node (document, paragraph, blockquote...)
    Block,
    /// Inline non-text node (image, hard break...)
    Inline,
    /// Text node
    Text,
}

/// Description of one node type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeType {
    pub name: String,
    pub kind: NodeKind,
    /// Leaf nodes have no content
    pub leaf: bool,
    /// Whether the children of this block are inline
    pub inline_content: bool,
    /// Atoms are treated as a single unit by selection
    pub atom: bool,
    /// Whether a node selection may target this node
    pub selectable: bool,
    /// Element name used when rendering
    pub tag: String,
}

impl NodeType {
    pub fn block(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Block,
            leaf: false,
            inline_content: false,
            atom: false,
            selectable: true,
            tag: tag.into(),
        }
    }

    pub fn textblock(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            inline_content: true,
            ..Self::block(name, tag)
        }
    }

    pub fn block_leaf(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            leaf: true,
            atom: true,
            ..Self::block(name, tag)
        }
    }

    pub fn inline_leaf(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Inline,
            leaf: true,
            inline_content: false,
            atom: true,
            selectable: true,
            tag: tag.into(),
        }
    }

    pub fn text() -> Self {
        Self {
            name: "text".to_string(),
            kind: NodeKind::Text,
            leaf: true,
            inline_content: false,
            atom: false,
            selectable: false,
            tag: String::new(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.kind, NodeKind::Inline | NodeKind::Text)
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn is_textblock(&self) -> bool {
        self.kind == NodeKind::Block && self.inline_content
    }
}

/// Description of one mark type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkType {
    pub name: String,
    pub tag: String,
    /// Spanning marks render as one wrapper across adjacent nodes
    pub spanning: bool,
    /// Rank decides nesting order of marks on the same node
    pub rank: usize,
}

/// Registry of node and mark types
#[derive(Debug, Clone)]
pub struct Schema {
    nodes: HashMap<String, Arc<NodeType>>,
    marks: HashMap<String, Arc<MarkType>>,
    top: String,
}

impl Schema {
    /// Create a schema whose top node type is `top`
    pub fn new(top: impl Into<String>) -> Self {
        Self {
            nodes: HashMap::new(),
            marks: HashMap::new(),
            top: top.into(),
        }
    }

    pub fn add_node(mut self, ty: NodeType) -> Self {
        self.nodes.insert(ty.name.clone(), Arc::new(ty));
        self
    }

    pub fn add_mark(mut self, name: impl Into<String>, tag: impl Into<String>) -> Self {
        let name = name.into();
        let rank = self.marks.len();
        self.marks.insert(
            name.clone(),
            Arc::new(MarkType {
                name,
                tag: tag.into(),
                spanning: true,
                rank,
            }),
        );
        self
    }

    /// Schema with the usual document, paragraph, heading and inline types
    pub fn basic() -> Self {
        Self::new("doc")
            .add_node(NodeType::block("doc", "div"))
            .add_node(NodeType::textblock("paragraph", "p"))
            .add_node(NodeType::textblock("heading", "h1"))
            .add_node(NodeType::block("blockquote", "blockquote"))
            .add_node(NodeType::block_leaf("horizontal_rule", "hr"))
            .add_node(NodeType::inline_leaf("image", "img"))
            .add_node(NodeType {
                selectable: false,
                ..NodeType::inline_leaf("hard_break", "br")
            })
            .add_node(NodeType::text())
            .add_mark("link", "a")
            .add_mark("strong", "strong")
            .add_mark("em", "em")
            .add_mark("code", "code")
    }

    pub fn node_type(&self, name: &str) -> ModelResult<Arc<NodeType>> {
        self.nodes
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownType(name.to_string()))
    }

    pub fn mark_type(&self, name: &str) -> ModelResult<Arc<MarkType>> {
        self.marks
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownType(name.to_string()))
    }

    pub fn top_type(&self) -> ModelResult<Arc<NodeType>> {
        self.node_type(&self.top)
    }

    /// Build a non-text node
    pub fn node(&self, name: &str, attrs: Attrs, children: Vec<Node>) -> ModelResult<Node> {
        let ty = self.node_type(name)?;
        if ty.is_text() {
            return Err(ModelError::InvalidContent(
                "text nodes are built with Schema::text".to_string(),
            ));
        }
        Node::new(ty, attrs, children, Vec::new())
    }

    /// Build a text node carrying `marks`
    pub fn text(&self, text: &str, marks: Vec<Mark>) -> ModelResult<Node> {
        let ty = self.node_type("text")?;
        Node::new_text(ty, text, marks)
    }

    /// Build a mark instance
    pub fn mark(&self, name: &str, attrs: Attrs) -> ModelResult<Mark> {
        Ok(Mark::new(self.mark_type(name)?, attrs))
    }

    /// Shorthand for a document of paragraphs with plain text
    pub fn doc_of_paragraphs(&self, paragraphs: &[&str]) -> ModelResult<Node> {
        let mut blocks = Vec::with_capacity(paragraphs.len());
        for text in paragraphs {
            let content = if text.is_empty() {
                Vec::new()
            } else {
                vec![self.text(text, Vec::new())?]
            };
            blocks.push(self.node("paragraph", Attrs::new(), content)?);
        }
        self.node(&self.top, Attrs::new(), blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_schema_types() {
        let schema = Schema::basic();
        assert!(schema.node_type("paragraph").unwrap().is_textblock());
        assert!(schema.node_type("image").unwrap().is_inline());
        assert!(schema.node_type("text").unwrap().is_text());
        assert!(!schema.node_type("doc").unwrap().is_textblock());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let schema = Schema::basic();
        let err = schema.node("table", Attrs::new(), Vec::new()).unwrap_err();
        assert_eq!(err, ModelError::UnknownType("table".to_string()));
    }

    #[test]
    fn test_mark_ranks_follow_registration() {
        let schema = Schema::basic();
        let link = schema.mark_type("link").unwrap();
        let code = schema.mark_type("code").unwrap();
        assert!(link.rank < code.rank);
    }
}

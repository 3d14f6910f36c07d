//! # Document Nodes
//!
//! Immutable, reference-counted document tree.
//!
//! Cloning a [`Node`] is cheap and shares structure. Every transform keeps
//! the identity of subtrees it does not touch, which is what lets the view
//! layer skip unchanged parts of the document with a pointer comparison.
//!
//! ## Positions
//!
//! ```text
//!   0   1 2 3 4 5 6   7
//!   <p> H e l l o </p>
//! ```
//!
//! A text node counts one position per character, a leaf counts one, and
//! any other node counts its content plus one token for each of its
//! opening and closing boundaries.

use crate::schema::{NodeType, Schema};
use crate::{Mark, ModelError, ModelResult};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Node and mark attributes
pub type Attrs = BTreeMap<String, String>;

/// Immutable document node
#[derive(Clone)]
pub struct Node(Arc<NodeData>);

struct NodeData {
    ty: Arc<NodeType>,
    attrs: Attrs,
    content: Vec<Node>,
    content_size: usize,
    text: Option<String>,
    text_len: usize,
    marks: Vec<Mark>,
}

impl Node {
    /// Create a non-text node, validating and normalizing its content
    pub fn new(
        ty: Arc<NodeType>,
        attrs: Attrs,
        children: Vec<Node>,
        marks: Vec<Mark>,
    ) -> ModelResult<Node> {
        if ty.leaf && !children.is_empty() {
            return Err(ModelError::InvalidContent(format!(
                "leaf node {} cannot have content",
                ty.name
            )));
        }
        for child in &children {
            if ty.inline_content && !child.is_inline() {
                return Err(ModelError::InvalidContent(format!(
                    "{} cannot contain block node {}",
                    ty.name,
                    child.type_name()
                )));
            }
            if !ty.inline_content && child.is_inline() {
                return Err(ModelError::InvalidContent(format!(
                    "{} cannot contain inline node {}",
                    ty.name,
                    child.type_name()
                )));
            }
        }
        let content = if ty.inline_content {
            normalize_inline(children)
        } else {
            children
        };
        Ok(Self::from_parts(ty, attrs, content, marks))
    }

    /// Create a text node
    pub fn new_text(ty: Arc<NodeType>, text: &str, marks: Vec<Mark>) -> ModelResult<Node> {
        if text.is_empty() {
            return Err(ModelError::InvalidContent(
                "empty text nodes are not allowed".to_string(),
            ));
        }
        Ok(Node(Arc::new(NodeData {
            ty,
            attrs: Attrs::new(),
            content: Vec::new(),
            content_size: 0,
            text_len: text.chars().count(),
            text: Some(text.to_string()),
            marks,
        })))
    }

    fn from_parts(ty: Arc<NodeType>, attrs: Attrs, content: Vec<Node>, marks: Vec<Mark>) -> Node {
        let content_size = content.iter().map(Node::node_size).sum();
        Node(Arc::new(NodeData {
            ty,
            attrs,
            content,
            content_size,
            text: None,
            text_len: 0,
            marks,
        }))
    }

    pub fn node_type(&self) -> &NodeType {
        &self.0.ty
    }

    pub(crate) fn type_arc(&self) -> Arc<NodeType> {
        self.0.ty.clone()
    }

    pub fn type_name(&self) -> &str {
        &self.0.ty.name
    }

    pub fn attrs(&self) -> &Attrs {
        &self.0.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.0.attrs.get(name).map(String::as_str)
    }

    pub fn marks(&self) -> &[Mark] {
        &self.0.marks
    }

    pub fn children(&self) -> &[Node] {
        &self.0.content
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.0.content.get(index)
    }

    pub fn child_count(&self) -> usize {
        self.0.content.len()
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.0.content.first()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.0.content.last()
    }

    pub fn text(&self) -> Option<&str> {
        self.0.text.as_deref()
    }

    pub fn is_text(&self) -> bool {
        self.0.ty.is_text()
    }

    pub fn is_inline(&self) -> bool {
        self.0.ty.is_inline()
    }

    pub fn is_block(&self) -> bool {
        !self.0.ty.is_inline()
    }

    pub fn is_textblock(&self) -> bool {
        self.0.ty.is_textblock()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.ty.leaf
    }

    pub fn is_atom(&self) -> bool {
        self.0.ty.atom
    }

    pub fn node_size(&self) -> usize {
        if self.is_text() {
            self.0.text_len
        } else if self.is_leaf() {
            1
        } else {
            self.0.content_size + 2
        }
    }

    pub fn content_size(&self) -> usize {
        if self.is_text() {
            self.0.text_len
        } else {
            self.0.content_size
        }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self) -> String {
        match &self.0.text {
            Some(text) => text.clone(),
            None => self.0.content.iter().map(Node::text_content).collect(),
        }
    }

    /// Structural identity: both handles point at the same node value
    pub fn ptr_eq(a: &Node, b: &Node) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Same type, attributes and marks (content may differ)
    pub fn same_markup(&self, other: &Node) -> bool {
        self.0.ty.name == other.0.ty.name
            && self.0.attrs == other.0.attrs
            && self.0.marks == other.0.marks
    }

    /// Copy of this node with different content
    pub fn copy_with(&self, content: Vec<Node>) -> Node {
        let content = if self.is_textblock() {
            normalize_inline(content)
        } else {
            content
        };
        Self::from_parts(
            self.0.ty.clone(),
            self.0.attrs.clone(),
            content,
            self.0.marks.clone(),
        )
    }

    /// Copy of this text node with different text, keeping marks
    pub fn with_text(&self, text: &str) -> ModelResult<Node> {
        Node::new_text(self.0.ty.clone(), text, self.0.marks.clone())
    }

    pub fn with_marks(&self, marks: Vec<Mark>) -> Node {
        Node(Arc::new(NodeData {
            ty: self.0.ty.clone(),
            attrs: self.0.attrs.clone(),
            content: self.0.content.clone(),
            content_size: self.0.content_size,
            text: self.0.text.clone(),
            text_len: self.0.text_len,
            marks,
        }))
    }

    pub fn with_attr(&self, name: &str, value: Option<&str>) -> Node {
        let mut attrs = self.0.attrs.clone();
        match value {
            Some(value) => {
                attrs.insert(name.to_string(), value.to_string());
            }
            None => {
                attrs.remove(name);
            }
        }
        Node(Arc::new(NodeData {
            ty: self.0.ty.clone(),
            attrs,
            content: self.0.content.clone(),
            content_size: self.0.content_size,
            text: self.0.text.clone(),
            text_len: self.0.text_len,
            marks: self.0.marks.clone(),
        }))
    }

    /// Slice of a text node between two character offsets
    pub fn cut(&self, from: usize, to: usize) -> Node {
        match &self.0.text {
            Some(text) if from > 0 || to < self.0.text_len => {
                let sliced = char_slice(text, from, to.min(self.0.text_len));
                Node(Arc::new(NodeData {
                    ty: self.0.ty.clone(),
                    attrs: Attrs::new(),
                    content: Vec::new(),
                    content_size: 0,
                    text_len: sliced.chars().count(),
                    text: Some(sliced),
                    marks: self.0.marks.clone(),
                }))
            }
            _ => self.clone(),
        }
    }

    /// Replace the child at `index`, sharing every other child
    pub fn replace_child(&self, index: usize, child: Node) -> Node {
        let mut content = self.0.content.clone();
        if index < content.len() {
            content[index] = child;
        }
        self.copy_with(content)
    }

    /// Index of the child containing content offset `offset`, with that child's start
    pub fn find_index(&self, offset: usize) -> (usize, usize) {
        let mut pos = 0;
        for (i, child) in self.0.content.iter().enumerate() {
            let end = pos + child.node_size();
            if offset < end {
                return (i, pos);
            }
            pos = end;
        }
        (self.0.content.len(), pos)
    }

    /// Node starting at content position `pos`, searching descendants
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        let mut node = self;
        let mut pos = pos;
        loop {
            let (index, start) = node.find_index(pos);
            let child = node.child(index)?;
            if start == pos {
                return Some(child);
            }
            if child.is_text() || child.is_leaf() {
                return None;
            }
            pos -= start + 1;
            node = child;
        }
    }

    /// Call `f` for every descendant overlapping `from..to`, with its start position.
    /// Returning `false` skips that node's children.
    pub fn nodes_between<F>(&self, from: usize, to: usize, f: &mut F)
    where
        F: FnMut(&Node, usize) -> bool,
    {
        self.nodes_between_inner(from, to, 0, f);
    }

    fn nodes_between_inner<F>(&self, from: usize, to: usize, base: usize, f: &mut F)
    where
        F: FnMut(&Node, usize) -> bool,
    {
        let mut pos = 0;
        for child in &self.0.content {
            let end = pos + child.node_size();
            if end > from && pos < to || (from == to && pos <= from && end >= from) {
                if f(child, base + pos) && !child.is_leaf() && !child.is_text() {
                    let start = pos + 1;
                    child.nodes_between_inner(
                        from.saturating_sub(start),
                        to.saturating_sub(start).min(child.content_size()),
                        base + start,
                        f,
                    );
                }
            }
            if pos >= to {
                break;
            }
            pos = end;
        }
    }

    /// JSON representation `{type, attrs?, content?, text?, marks?}`
    pub fn to_json(&self) -> ModelResult<Value> {
        serde_json::to_value(self).map_err(|err| ModelError::InvalidJson(err.to_string()))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        Node::ptr_eq(self, other)
            || (self.same_markup(other)
                && self.0.text == other.0.text
                && self.0.content == other.0.content)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = &self.0.text {
            if self.0.marks.is_empty() {
                return write!(f, "{:?}", text);
            }
            return write!(f, "{:?}{:?}", self.0.marks, text);
        }
        write!(f, "{}", self.0.ty.name)?;
        if !self.0.attrs.is_empty() {
            write!(f, "{:?}", self.0.attrs)?;
        }
        if !self.0.content.is_empty() {
            f.debug_list().entries(self.0.content.iter()).finish()?;
        }
        Ok(())
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.0.ty.name)?;
        if !self.0.attrs.is_empty() {
            map.serialize_entry("attrs", &self.0.attrs)?;
        }
        if !self.0.content.is_empty() {
            map.serialize_entry("content", &self.0.content)?;
        }
        if let Some(text) = &self.0.text {
            map.serialize_entry("text", text)?;
        }
        if !self.0.marks.is_empty() {
            map.serialize_entry("marks", &self.0.marks)?;
        }
        map.end()
    }
}

impl Schema {
    /// Rebuild a node from its JSON representation
    pub fn node_from_json(&self, value: &Value) -> ModelResult<Node> {
        let obj = value
            .as_object()
            .ok_or_else(|| ModelError::InvalidJson("node must be an object".to_string()))?;
        let type_name = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::InvalidJson("node is missing \"type\"".to_string()))?;
        let marks = match obj.get("marks") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|m| self.mark_from_json(m))
                .collect::<ModelResult<Vec<_>>>()?,
            Some(_) => return Err(ModelError::InvalidJson("\"marks\" must be an array".to_string())),
            None => Vec::new(),
        };
        if let Some(text) = obj.get("text") {
            let text = text
                .as_str()
                .ok_or_else(|| ModelError::InvalidJson("\"text\" must be a string".to_string()))?;
            return self.text(text, marks);
        }
        let attrs = attrs_from_json(obj.get("attrs"))?;
        let content = match obj.get("content") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|c| self.node_from_json(c))
                .collect::<ModelResult<Vec<_>>>()?,
            Some(_) => {
                return Err(ModelError::InvalidJson("\"content\" must be an array".to_string()))
            }
            None => Vec::new(),
        };
        Node::new(self.node_type(type_name)?, attrs, content, marks)
    }

    pub fn mark_from_json(&self, value: &Value) -> ModelResult<Mark> {
        let name = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::InvalidJson("mark is missing \"type\"".to_string()))?;
        self.mark(name, attrs_from_json(value.get("attrs"))?)
    }
}

fn attrs_from_json(value: Option<&Value>) -> ModelResult<Attrs> {
    let mut attrs = Attrs::new();
    match value {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (key, value) in map {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                attrs.insert(key.clone(), value);
            }
        }
        Some(_) => return Err(ModelError::InvalidJson("\"attrs\" must be an object".to_string())),
    }
    Ok(attrs)
}

/// Merge adjacent text nodes with equal marks
pub(crate) fn normalize_inline(children: Vec<Node>) -> Vec<Node> {
    let mut result: Vec<Node> = Vec::with_capacity(children.len());
    for child in children {
        if let (Some(last), Some(text)) = (result.last_mut(), child.text()) {
            if let Some(prev) = last.text() {
                if last.marks() == child.marks() {
                    let mut joined = String::with_capacity(prev.len() + text.len());
                    joined.push_str(prev);
                    joined.push_str(text);
                    let merged = Node(Arc::new(NodeData {
                        ty: child.0.ty.clone(),
                        attrs: Attrs::new(),
                        content: Vec::new(),
                        content_size: 0,
                        text_len: last.0.text_len + child.0.text_len,
                        text: Some(joined),
                        marks: child.0.marks.clone(),
                    }));
                    *last = merged;
                    continue;
                }
            }
        }
        result.push(child);
    }
    result
}

/// Substring by character offsets
pub(crate) fn char_slice(text: &str, from: usize, to: usize) -> String {
    text.chars().skip(from).take(to.saturating_sub(from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Node {
        Schema::basic().doc_of_paragraphs(&["Hello", "World"]).unwrap()
    }

    #[test]
    fn test_sizes() {
        let doc = doc();
        assert_eq!(doc.content_size(), 14);
        assert_eq!(doc.child(0).unwrap().node_size(), 7);
        assert_eq!(doc.child(0).unwrap().child(0).unwrap().node_size(), 5);
    }

    #[test]
    fn test_node_at() {
        let doc = doc();
        assert_eq!(doc.node_at(0).unwrap().type_name(), "paragraph");
        assert_eq!(doc.node_at(1).unwrap().text(), Some("Hello"));
        assert_eq!(doc.node_at(7).unwrap().type_name(), "paragraph");
        assert!(doc.node_at(3).is_none());
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let schema = Schema::basic();
        let p = schema
            .node(
                "paragraph",
                Attrs::new(),
                vec![
                    schema.text("Hel", Vec::new()).unwrap(),
                    schema.text("lo", Vec::new()).unwrap(),
                ],
            )
            .unwrap();
        assert_eq!(p.child_count(), 1);
        assert_eq!(p.text_content(), "Hello");
    }

    #[test]
    fn test_block_in_textblock_is_rejected() {
        let schema = Schema::basic();
        let inner = schema.node("paragraph", Attrs::new(), Vec::new()).unwrap();
        let result = schema.node("paragraph", Attrs::new(), vec![inner]);
        assert!(matches!(result, Err(ModelError::InvalidContent(_))));
    }

    #[test]
    fn test_equality_is_structural_with_identity_shortcut() {
        let a = doc();
        let b = doc();
        assert!(!Node::ptr_eq(&a, &b));
        assert_eq!(a, b);
        let c = a.clone();
        assert!(Node::ptr_eq(&a, &c));
    }

    #[test]
    fn test_cut_text() {
        let schema = Schema::basic();
        let text = schema.text("Hello", Vec::new()).unwrap();
        assert_eq!(text.cut(1, 3).text(), Some("el"));
        assert!(Node::ptr_eq(&text.cut(0, 5), &text));
    }

    #[test]
    fn test_json_round_trip() {
        let schema = Schema::basic();
        let strong = schema.mark("strong", Attrs::new()).unwrap();
        let p = schema
            .node(
                "paragraph",
                Attrs::new(),
                vec![
                    schema.text("plain ", Vec::new()).unwrap(),
                    schema.text("bold", vec![strong]).unwrap(),
                ],
            )
            .unwrap();
        let doc = schema.node("doc", Attrs::new(), vec![p]).unwrap();

        let json = doc.to_json().unwrap();
        assert_eq!(json["content"][0]["content"][1]["marks"][0]["type"], "strong");
        let back = schema.node_from_json(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_nodes_between_visits_overlapping_nodes() {
        let doc = doc();
        let mut seen = Vec::new();
        doc.nodes_between(2, 9, &mut |node, pos| {
            seen.push((node.type_name().to_string(), pos));
            true
        });
        assert_eq!(
            seen,
            vec![
                ("paragraph".to_string(), 0),
                ("text".to_string(), 1),
                ("paragraph".to_string(), 7),
                ("text".to_string(), 8),
            ]
        );
    }
}

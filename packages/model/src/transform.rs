//! # Steps and Transforms
//!
//! A [`Step`] is one atomic document change. Applying it produces a new
//! document plus a [`StepMap`] describing how positions moved.
//!
//! Only the ancestors of the changed range are copied. Every other node
//! in the result is the very same value as in the input document.

use crate::node::normalize_inline;
use crate::{Mapping, Mark, ModelError, ModelResult, Node, NodeType, ResolvedPos, StepMap};
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

/// Atomic document change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Step {
    /// Replace `from..to` (inside one textblock) with text
    ReplaceText {
        from: usize,
        to: usize,
        text: String,
        /// Marks for the inserted text, defaults to the marks at `from`
        marks: Option<Vec<Mark>>,
    },
    AddMark { from: usize, to: usize, mark: Mark },
    RemoveMark { from: usize, to: usize, mark: Mark },
    /// Set (or clear, with `None`) an attribute of the node starting at `pos`
    SetAttr {
        pos: usize,
        name: String,
        value: Option<String>,
    },
    InsertNode { pos: usize, node: Node },
    /// Delete the node starting at `pos`
    DeleteNode { pos: usize },
}

impl Step {
    pub fn apply(&self, doc: &Node) -> ModelResult<(Node, StepMap)> {
        trace!(step = ?self, "Applying step");
        match self {
            Step::ReplaceText {
                from,
                to,
                text,
                marks,
            } => replace_text(doc, *from, *to, text, marks.as_deref()),
            Step::AddMark { from, to, mark } => {
                let doc = map_marks(doc, *from, *to, &|set: &[Mark]| mark.add_to_set(set));
                Ok((doc, StepMap::default()))
            }
            Step::RemoveMark { from, to, mark } => {
                let doc = map_marks(doc, *from, *to, &|set: &[Mark]| mark.remove_from_set(set));
                Ok((doc, StepMap::default()))
            }
            Step::SetAttr { pos, name, value } => {
                let res = doc.resolve(*pos)?;
                let target = node_starting_at(&res)?;
                let updated = target.with_attr(name, value.as_deref());
                let depth = res.depth();
                let parent = res.parent().replace_child(res.index(depth), updated);
                Ok((rebuild(&res, depth, parent), StepMap::default()))
            }
            Step::InsertNode { pos, node } => insert_node(doc, *pos, node),
            Step::DeleteNode { pos } => {
                let res = doc.resolve(*pos)?;
                let target = node_starting_at(&res)?;
                let depth = res.depth();
                let index = res.index(depth);
                let mut content = res.parent().children().to_vec();
                content.remove(index);
                let parent = res.parent().copy_with(content);
                Ok((
                    rebuild(&res, depth, parent),
                    StepMap::replace(*pos, target.node_size(), 0),
                ))
            }
        }
    }
}

/// Copy the ancestors of `res` down to `depth`, putting `node` at `depth`
fn rebuild(res: &ResolvedPos, depth: usize, node: Node) -> Node {
    let mut node = node;
    for d in (0..depth).rev() {
        node = res.node(d).replace_child(res.index(d), node);
    }
    node
}

fn node_starting_at(res: &ResolvedPos) -> ModelResult<Node> {
    if res.text_offset() != 0 {
        return Err(ModelError::NoNodeAt(res.pos));
    }
    res.parent()
        .child(res.index(res.depth()))
        .cloned()
        .ok_or(ModelError::NoNodeAt(res.pos))
}

/// Inline children of `parent` cut to content range `from..to`
fn slice_inline(parent: &Node, from: usize, to: usize) -> Vec<Node> {
    let mut out = Vec::new();
    let mut pos = 0;
    for child in parent.children() {
        let end = pos + child.node_size();
        if end > from && pos < to {
            if child.is_text() {
                let start = from.saturating_sub(pos);
                let stop = (to - pos).min(child.node_size());
                out.push(child.cut(start, stop));
            } else {
                out.push(child.clone());
            }
        }
        pos = end;
    }
    out
}

fn replace_text(
    doc: &Node,
    from: usize,
    to: usize,
    text: &str,
    marks: Option<&[Mark]>,
) -> ModelResult<(Node, StepMap)> {
    if from > to {
        return Err(ModelError::NotInTextblock { from, to });
    }
    let res_from = doc.resolve(from)?;
    let res_to = doc.resolve(to)?;
    let depth = res_from.depth();
    if !res_from.parent().is_textblock()
        || res_to.depth() != depth
        || res_to.start(depth) != res_from.start(depth)
    {
        return Err(ModelError::NotInTextblock { from, to });
    }
    let parent = res_from.parent();
    let start = res_from.start(depth);
    let (a, b) = (from - start, to - start);

    let mut content = slice_inline(parent, 0, a);
    if !text.is_empty() {
        let marks = marks
            .map(<[Mark]>::to_vec)
            .unwrap_or_else(|| res_from.marks());
        content.push(Node::new_text(text_type(parent, doc), text, marks)?);
    }
    content.extend(slice_inline(parent, b, parent.content_size()));

    let updated = parent.copy_with(content);
    let size = text.chars().count();
    Ok((rebuild(&res_from, depth, updated), StepMap::replace(from, to - from, size)))
}

/// Text node type used by the document, so inserted text shares the schema's type
fn text_type(parent: &Node, doc: &Node) -> Arc<NodeType> {
    fn find(node: &Node) -> Option<Arc<NodeType>> {
        for child in node.children() {
            if child.is_text() {
                return Some(child.type_arc());
            }
            if let Some(found) = find(child) {
                return Some(found);
            }
        }
        None
    }
    find(parent)
        .or_else(|| find(doc))
        .unwrap_or_else(|| Arc::new(NodeType::text()))
}

fn map_marks(node: &Node, from: usize, to: usize, f: &dyn Fn(&[Mark]) -> Vec<Mark>) -> Node {
    if node.is_textblock() {
        let mut content = Vec::with_capacity(node.child_count());
        let mut pos = 0;
        for child in node.children() {
            let end = pos + child.node_size();
            if end <= from || pos >= to {
                content.push(child.clone());
            } else {
                let start = from.saturating_sub(pos);
                let stop = (to - pos).min(child.node_size());
                if start > 0 {
                    content.push(child.cut(0, start));
                }
                content.push(child.cut(start, stop).with_marks(f(child.marks())));
                if stop < child.node_size() {
                    content.push(child.cut(stop, child.node_size()));
                }
            }
            pos = end;
        }
        return node.copy_with(normalize_inline(content));
    }

    let mut changed = false;
    let mut content = Vec::with_capacity(node.child_count());
    let mut pos = 0;
    for child in node.children() {
        let end = pos + child.node_size();
        if end > from && pos < to && !child.is_leaf() {
            let inner_from = from.saturating_sub(pos + 1);
            let inner_to = (to.saturating_sub(pos + 1)).min(child.content_size());
            content.push(map_marks(child, inner_from, inner_to, f));
            changed = true;
        } else {
            content.push(child.clone());
        }
        pos = end;
    }
    if changed {
        node.copy_with(content)
    } else {
        node.clone()
    }
}

fn insert_node(doc: &Node, pos: usize, node: &Node) -> ModelResult<(Node, StepMap)> {
    let res = doc.resolve(pos)?;
    let depth = res.depth();
    let parent = res.parent();
    if parent.is_textblock() != node.is_inline() {
        return Err(ModelError::InvalidContent(format!(
            "cannot insert {} into {}",
            node.type_name(),
            parent.type_name()
        )));
    }
    let index = res.index(depth);
    let offset = res.text_offset();
    let mut content: Vec<Node> = parent.children()[..index.min(parent.child_count())].to_vec();
    if offset > 0 {
        if let Some(text) = parent.child(index) {
            content.push(text.cut(0, offset));
            content.push(node.clone());
            content.push(text.cut(offset, text.node_size()));
            content.extend(parent.children()[index + 1..].iter().cloned());
        }
    } else {
        content.push(node.clone());
        content.extend(parent.children()[index.min(parent.child_count())..].iter().cloned());
    }
    let updated = parent.copy_with(content);
    Ok((rebuild(&res, depth, updated), StepMap::replace(pos, 0, node.node_size())))
}

/// Accumulates steps against a starting document
#[derive(Debug, Clone)]
pub struct Transform {
    doc: Node,
    before: Node,
    steps: Vec<Step>,
    mapping: Mapping,
}

impl Transform {
    pub fn new(doc: Node) -> Self {
        Self {
            before: doc.clone(),
            doc,
            steps: Vec::new(),
            mapping: Mapping::new(),
        }
    }

    /// Apply a step, leaving the transform unchanged on failure
    pub fn step(&mut self, step: Step) -> ModelResult<&mut Self> {
        let (doc, map) = step.apply(&self.doc)?;
        self.doc = doc;
        self.mapping.push(map);
        self.steps.push(step);
        Ok(self)
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn before(&self) -> &Node {
        &self.before
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attrs, Schema};

    fn schema() -> Schema {
        Schema::basic()
    }

    #[test]
    fn test_insert_text_keeps_sibling_identity() {
        let doc = schema().doc_of_paragraphs(&["Hello", "Other"]).unwrap();
        let (next, map) = Step::ReplaceText {
            from: 6,
            to: 6,
            text: " world".to_string(),
            marks: None,
        }
        .apply(&doc)
        .unwrap();

        assert_eq!(next.child(0).unwrap().text_content(), "Hello world");
        assert_eq!(next.child(0).unwrap().child_count(), 1);
        assert!(Node::ptr_eq(next.child(1).unwrap(), doc.child(1).unwrap()));
        assert_eq!(map.map(6, 1), 12);
    }

    #[test]
    fn test_replace_text_across_blocks_is_rejected() {
        let doc = schema().doc_of_paragraphs(&["Hello", "Other"]).unwrap();
        let err = Step::ReplaceText {
            from: 3,
            to: 9,
            text: String::new(),
            marks: None,
        }
        .apply(&doc)
        .unwrap_err();
        assert_eq!(err, ModelError::NotInTextblock { from: 3, to: 9 });
    }

    #[test]
    fn test_add_mark_splits_text() {
        let schema = schema();
        let doc = schema.doc_of_paragraphs(&["Hello"]).unwrap();
        let strong = schema.mark("strong", Attrs::new()).unwrap();
        let (next, _) = Step::AddMark {
            from: 2,
            to: 4,
            mark: strong.clone(),
        }
        .apply(&doc)
        .unwrap();

        let p = next.child(0).unwrap();
        assert_eq!(p.child_count(), 3);
        assert_eq!(p.child(1).unwrap().text(), Some("el"));
        assert_eq!(p.child(1).unwrap().marks(), &[strong.clone()][..]);

        let (back, _) = Step::RemoveMark { from: 2, to: 4, mark: strong }
            .apply(&next)
            .unwrap();
        assert_eq!(back.child(0).unwrap().child_count(), 1);
        assert_eq!(back, doc);
    }

    #[test]
    fn test_set_attr() {
        let doc = schema().doc_of_paragraphs(&["A", "B"]).unwrap();
        let (next, _) = Step::SetAttr {
            pos: 3,
            name: "align".to_string(),
            value: Some("center".to_string()),
        }
        .apply(&doc)
        .unwrap();
        assert_eq!(next.child(1).unwrap().attr("align"), Some("center"));
        assert!(Node::ptr_eq(next.child(0).unwrap(), doc.child(0).unwrap()));
    }

    #[test]
    fn test_insert_and_delete_node() {
        let schema = schema();
        let doc = schema.doc_of_paragraphs(&["Hello"]).unwrap();
        let image = schema.node("image", Attrs::new(), Vec::new()).unwrap();

        let (with_image, map) = Step::InsertNode { pos: 3, node: image }.apply(&doc).unwrap();
        let p = with_image.child(0).unwrap();
        assert_eq!(p.child_count(), 3);
        assert_eq!(p.child(1).unwrap().type_name(), "image");
        assert_eq!(map.map(4, 1), 5);

        let (without, _) = Step::DeleteNode { pos: 3 }.apply(&with_image).unwrap();
        assert_eq!(without, doc);
    }

    #[test]
    fn test_transform_accumulates_mapping() {
        let doc = schema().doc_of_paragraphs(&["Hello"]).unwrap();
        let mut tr = Transform::new(doc);
        tr.step(Step::ReplaceText {
            from: 1,
            to: 1,
            text: ">".to_string(),
            marks: None,
        })
        .unwrap();
        tr.step(Step::ReplaceText {
            from: 7,
            to: 7,
            text: "!".to_string(),
            marks: None,
        })
        .unwrap();
        assert_eq!(tr.doc().text_content(), ">Hello!");
        assert_eq!(tr.mapping().map(5, 1), 6);
        assert!(tr.doc_changed());
    }
}

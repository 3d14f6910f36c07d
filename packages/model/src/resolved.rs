//! Resolved positions: a document position with its ancestor path

use crate::{Mark, ModelError, ModelResult, Node};

#[derive(Debug, Clone)]
struct PathEntry {
    node: Node,
    /// Index of the child the position points into (or before)
    index: usize,
    /// Absolute position where `node`'s content starts
    start: usize,
    /// Offset of child `index` inside `node`'s content
    child_offset: usize,
}

/// A position resolved against a particular document
#[derive(Debug, Clone)]
pub struct ResolvedPos {
    pub pos: usize,
    /// Offset of the position inside its innermost parent's content
    pub parent_offset: usize,
    path: Vec<PathEntry>,
}

impl ResolvedPos {
    pub(crate) fn resolve(doc: &Node, pos: usize) -> ModelResult<ResolvedPos> {
        if pos > doc.content_size() {
            return Err(ModelError::PositionOutOfRange {
                pos,
                size: doc.content_size(),
            });
        }
        let mut path = Vec::new();
        let mut node = doc.clone();
        let mut start = 0;
        let mut parent_offset = pos;
        loop {
            let (index, child_offset) = node.find_index(parent_offset);
            let rem = parent_offset - child_offset;
            path.push(PathEntry {
                node: node.clone(),
                index,
                start,
                child_offset,
            });
            if rem == 0 {
                break;
            }
            let child = match node.child(index) {
                Some(child) if !child.is_text() && !child.is_leaf() => child.clone(),
                _ => break,
            };
            start += child_offset + 1;
            parent_offset = rem - 1;
            node = child;
        }
        Ok(ResolvedPos {
            pos,
            parent_offset,
            path,
        })
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn parent(&self) -> &Node {
        &self.path[self.depth()].node
    }

    pub fn doc(&self) -> &Node {
        &self.path[0].node
    }

    /// Ancestor at `depth` (0 is the document)
    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth.min(self.depth())].node
    }

    pub fn index(&self, depth: usize) -> usize {
        self.path[depth.min(self.depth())].index
    }

    /// Start of the content of the ancestor at `depth`
    pub fn start(&self, depth: usize) -> usize {
        self.path[depth.min(self.depth())].start
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Position directly before the ancestor at `depth` (depth >= 1)
    pub fn before(&self, depth: usize) -> usize {
        self.start(depth).saturating_sub(1)
    }

    /// Position directly after the ancestor at `depth` (depth >= 1)
    pub fn after(&self, depth: usize) -> usize {
        self.end(depth) + 1
    }

    /// Offset into the text node the position points into, if any
    pub fn text_offset(&self) -> usize {
        let entry = &self.path[self.depth()];
        self.pos - (entry.start + entry.child_offset)
    }

    pub fn node_after(&self) -> Option<Node> {
        let child = self.parent().child(self.index(self.depth()))?;
        let offset = self.text_offset();
        if offset > 0 {
            Some(child.cut(offset, child.node_size()))
        } else {
            Some(child.clone())
        }
    }

    pub fn node_before(&self) -> Option<Node> {
        let index = self.index(self.depth());
        let offset = self.text_offset();
        if offset > 0 {
            return self.parent().child(index).map(|c| c.cut(0, offset));
        }
        if index == 0 {
            return None;
        }
        self.parent().child(index - 1).cloned()
    }

    /// Deepest depth whose node contains both this position and `pos`
    pub fn shared_depth(&self, pos: usize) -> usize {
        for depth in (1..=self.depth()).rev() {
            if self.start(depth) <= pos && self.end(depth) >= pos {
                return depth;
            }
        }
        0
    }

    /// Marks that apply to text inserted here
    pub fn marks(&self) -> Vec<Mark> {
        if self.parent().child_count() == 0 {
            return Vec::new();
        }
        if let Some(before) = self.node_before() {
            return before.marks().to_vec();
        }
        self.node_after()
            .map(|after| after.marks().to_vec())
            .unwrap_or_default()
    }
}

impl Node {
    /// Resolve a content position against this node
    pub fn resolve(&self, pos: usize) -> ModelResult<ResolvedPos> {
        ResolvedPos::resolve(self, pos)
    }
}

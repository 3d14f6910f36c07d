//! # Layout
//!
//! Deterministic geometry for the headless platform.
//!
//! Block elements stack vertically and span the full width. Inline
//! content flows in lines of `width / char_width` characters; every
//! character, and every inline leaf such as an image, takes one cell.
//! An empty block still takes one line.

use crate::dom::{Dom, DomData, DomId, DomPoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "div", "dl", "figure", "footer", "h1", "h2", "h3", "h4",
    "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section", "table", "ul",
];

const INLINE_LEAF_TAGS: &[&str] = &["img", "input", "video"];

pub fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

/// Font and surface measurements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub width: f64,
    pub line_height: f64,
    pub char_width: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            width: 400.0,
            line_height: 20.0,
            char_width: 10.0,
        }
    }
}

impl Metrics {
    fn chars_per_line(&self) -> usize {
        ((self.width / self.char_width).floor() as usize).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

struct Flow {
    y: f64,
    col: usize,
    line_open: bool,
}

/// Geometry of one rendered subtree
#[derive(Debug, Clone)]
pub struct Layout {
    metrics: Metrics,
    rects: BTreeMap<DomId, Rect>,
    /// Left/top of every character cell of a text node, plus the end cell
    cells: BTreeMap<DomId, Vec<(f64, f64)>>,
    height: f64,
}

impl Layout {
    pub fn compute(dom: &Dom, root: DomId) -> Layout {
        let mut layout = Layout {
            metrics: dom.metrics(),
            rects: BTreeMap::new(),
            cells: BTreeMap::new(),
            height: 0.0,
        };
        let mut flow = Flow {
            y: 0.0,
            col: 0,
            line_open: false,
        };
        layout.flow(dom, root, &mut flow, true);
        layout.close_line(&mut flow);
        layout.height = flow.y;
        layout
    }

    fn newline(&self, flow: &mut Flow) {
        flow.y += self.metrics.line_height;
        flow.col = 0;
        flow.line_open = false;
    }

    fn close_line(&self, flow: &mut Flow) {
        if flow.line_open {
            self.newline(flow);
        }
    }

    fn place_cell(&self, flow: &mut Flow) -> (f64, f64) {
        if flow.col >= self.metrics.chars_per_line() {
            self.newline(flow);
        }
        let cell = (flow.col as f64 * self.metrics.char_width, flow.y);
        flow.col += 1;
        flow.line_open = true;
        cell
    }

    fn flow(&mut self, dom: &Dom, id: DomId, flow: &mut Flow, is_root: bool) {
        let Some(node) = dom.node(id) else {
            return;
        };
        let lh = self.metrics.line_height;
        let cw = self.metrics.char_width;
        match &node.data {
            DomData::Text(text) => {
                let mut cells = Vec::with_capacity(text.len() + 1);
                for _ in text.chars() {
                    cells.push(self.place_cell(flow));
                }
                let end = (flow.col as f64 * cw, flow.y);
                cells.push(end);
                let first = cells[0];
                let rect = if first.1 == end.1 {
                    Rect::new(first.0, first.1, end.0, end.1 + lh)
                } else {
                    Rect::new(0.0, first.1, self.metrics.width, end.1 + lh)
                };
                self.rects.insert(id, rect);
                self.cells.insert(id, cells);
            }
            DomData::Element { tag, .. } => {
                if is_root || is_block_tag(tag) {
                    self.close_line(flow);
                    let top = flow.y;
                    for &child in &node.children {
                        self.flow(dom, child, flow, false);
                    }
                    self.close_line(flow);
                    if flow.y == top {
                        flow.y += lh;
                    }
                    self.rects
                        .insert(id, Rect::new(0.0, top, self.metrics.width, flow.y));
                } else if tag == "br" {
                    let left = flow.col as f64 * cw;
                    self.rects
                        .insert(id, Rect::new(left, flow.y, left, flow.y + lh));
                    self.newline(flow);
                } else if INLINE_LEAF_TAGS.contains(&tag.as_str()) {
                    let (left, top) = self.place_cell(flow);
                    self.rects
                        .insert(id, Rect::new(left, top, left + cw, top + lh));
                } else {
                    let start = (flow.col as f64 * cw, flow.y);
                    for &child in &node.children {
                        self.flow(dom, child, flow, false);
                    }
                    let end = (flow.col as f64 * cw, flow.y);
                    let rect = if start.1 == end.1 {
                        Rect::new(start.0, start.1, end.0, end.1 + lh)
                    } else {
                        Rect::new(0.0, start.1, self.metrics.width, end.1 + lh)
                    };
                    self.rects.insert(id, rect);
                }
            }
        }
    }

    pub fn content_height(&self) -> f64 {
        self.height
    }

    pub fn rect(&self, id: DomId) -> Option<Rect> {
        self.rects.get(&id).copied()
    }

    /// Zero-width caret rectangle at a DOM point
    pub fn coords_at(&self, dom: &Dom, point: DomPoint) -> Option<Rect> {
        let lh = self.metrics.line_height;
        if let Some(cells) = self.cells.get(&point.node) {
            let (left, top) = cells[point.offset.min(cells.len() - 1)];
            return Some(Rect::new(left, top, left, top + lh));
        }
        let children = dom.children(point.node);
        if let Some(&child) = children.get(point.offset) {
            if let Some(cells) = self.cells.get(&child) {
                let (left, top) = cells[0];
                return Some(Rect::new(left, top, left, top + lh));
            }
            let rect = self.rect(child)?;
            return Some(Rect::new(rect.left, rect.top, rect.left, rect.top + lh));
        }
        if point.offset > 0 {
            if let Some(&last) = children.get(point.offset - 1).or(children.last()) {
                if let Some(cells) = self.cells.get(&last) {
                    let (left, top) = cells[cells.len() - 1];
                    return Some(Rect::new(left, top, left, top + lh));
                }
                let rect = self.rect(last)?;
                return Some(Rect::new(rect.right, rect.bottom - lh, rect.right, rect.bottom));
            }
        }
        let rect = self.rect(point.node)?;
        Some(Rect::new(rect.left, rect.top, rect.left, rect.top + lh))
    }

    /// DOM point nearest to a coordinate
    pub fn point_at(&self, x: f64, y: f64) -> Option<DomPoint> {
        let lh = self.metrics.line_height;
        let cw = self.metrics.char_width;
        let y = y.clamp(0.0, (self.height - 1.0).max(0.0));

        let mut best: Option<(f64, DomPoint)> = None;
        for (&id, cells) in &self.cells {
            for (index, &(left, top)) in cells[..cells.len() - 1].iter().enumerate() {
                if y < top || y >= top + lh {
                    continue;
                }
                let offset = if x < left + cw / 2.0 { index } else { index + 1 };
                let distance = (x - (left + cw / 2.0)).abs();
                if best.map(|(d, _)| distance < d).unwrap_or(true) {
                    best = Some((distance, DomPoint::new(id, offset)));
                }
            }
        }
        if let Some((_, point)) = best {
            return Some(point);
        }

        // No text on that line: innermost element covering it
        self.rects
            .iter()
            .filter(|(id, rect)| !self.cells.contains_key(*id) && rect.top <= y && y < rect.bottom)
            .min_by(|(_, a), (_, b)| a.height().total_cmp(&b.height()))
            .map(|(&id, _)| DomPoint::new(id, 0))
    }
}

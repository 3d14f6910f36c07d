//! # Scroll Manager
//!
//! Keeps the visible content steady across an update when the platform
//! doesn't anchor scrolling by itself, and brings rectangles into view.
//!
//! ## Preservation
//!
//! ```text
//! store:    element at the top of the viewport + its top edge
//! (update)
//! restore:  scroll_top += new top edge - old top edge
//! ```

use crate::dom::{Dom, DomId, DomPoint};
use crate::layout::{Layout, Rect};
use crate::viewdesc::ViewDesc;
use tracing::trace;

/// Where the viewport was before an update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSnapshot {
    /// Platform point at the top of the viewport
    anchor: Option<DomPoint>,
    /// Document position of the anchor, for when its DOM doesn't survive
    anchor_pos: Option<usize>,
    anchor_top: f64,
    scroll_top: f64,
}

impl ScrollSnapshot {
    pub fn store(dom: &Dom, mount: DomId, doc_view: &ViewDesc) -> ScrollSnapshot {
        let layout = Layout::compute(dom, mount);
        let scroll_top = dom.viewport().scroll_top;
        let anchor = layout.point_at(1.0, scroll_top + 1.0);
        let anchor_top = anchor
            .and_then(|point| layout.coords_at(dom, point))
            .map(|rect| rect.top)
            .unwrap_or(scroll_top);
        ScrollSnapshot {
            anchor,
            anchor_pos: anchor.and_then(|point| doc_view.pos_from_dom(dom, point)),
            anchor_top,
            scroll_top,
        }
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    /// Shift the viewport by however far the anchor moved
    pub fn restore(&self, dom: &mut Dom, mount: DomId, doc_view: &ViewDesc) {
        if dom.capabilities().scroll_anchoring {
            return;
        }
        let layout = Layout::compute(dom, mount);
        let surviving = self
            .anchor
            .filter(|point| dom.contains(mount, point.node))
            .and_then(|point| layout.coords_at(dom, point));
        let moved = surviving.or_else(|| {
            self.anchor_pos
                .and_then(|pos| doc_view.dom_from_pos(dom, pos, 1))
                .and_then(|point| layout.coords_at(dom, point))
        });
        let target = match moved {
            Some(rect) => self.scroll_top + (rect.top - self.anchor_top),
            None => self.scroll_top,
        };
        if target != dom.viewport().scroll_top {
            trace!(from = dom.viewport().scroll_top, to = target, "Restoring scroll position");
            dom.set_scroll_top(target);
        }
    }
}

/// Scroll so `rect` (content coordinates) is visible, keeping `margin`
/// around it. Nothing moves while the rect is further than `threshold`
/// inside the viewport.
pub fn scroll_rect_into_view(dom: &mut Dom, rect: Rect, threshold: f64, margin: f64, content_height: f64) -> bool {
    let viewport = dom.viewport();
    let top = viewport.scroll_top;
    let bottom = top + viewport.height;
    let target = if rect.top < top + threshold {
        rect.top - margin
    } else if rect.bottom > bottom - threshold {
        rect.bottom - viewport.height + margin
    } else {
        return false;
    };
    let max = (content_height - viewport.height).max(0.0);
    let target = target.clamp(0.0, max);
    if target == top {
        return false;
    }
    trace!(from = top, to = target, "Scrolling rect into view");
    dom.set_scroll_top(target);
    true
}

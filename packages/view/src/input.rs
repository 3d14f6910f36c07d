//! # Reading the DOM back
//!
//! Changes the platform makes on its own (typing, composition, stray
//! mutations) are recorded by the observer and turned back into a
//! transaction by [`EditorView::flush`].
//!
//! - Character data changes in a rendered text node become a text
//!   replacement covering the part that differs.
//! - Text typed into the cursor wrapper is inserted at its position with
//!   the wrapper's marks.
//! - Any other mutation marks the owning descriptor dirty, and the next
//!   update repairs it from the document.
//!
//! A composed text node already holding the new text is not rewritten by
//! the update that follows, because its content no longer differs.

use crate::dom::{DomId, MutationKind};
use crate::error::{ViewError, ViewResult};
use crate::selection::SelectionBetween;
use crate::view::{Composition, EditorView, UpdateReport, CURSOR_WRAPPER_KEY};
use crate::viewdesc::{DescId, Dirty};
use tracing::{debug, instrument, trace};
use verso_model::{Mark, Selection, Step};

/// Text the DOM shows at `start` instead of `old`
#[derive(Debug)]
struct TextChange {
    start: usize,
    /// Orders changes sharing a start: insertions apply last
    rank: u8,
    old: String,
    new: String,
    marks: Vec<Mark>,
}

/// Common prefix and suffix of two strings, in chars: `(from, to, inserted)`
/// such that replacing `old[from..to]` with `inserted` gives `new`
fn diff_text(old: &str, new: &str) -> (usize, usize, String) {
    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();
    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    let inserted = new[prefix..new.len() - suffix].iter().collect();
    (prefix, old.len() - suffix, inserted)
}

impl EditorView {
    /// Read pending platform changes into the state. Returns `None` when
    /// there was nothing to read.
    #[instrument(skip(self))]
    pub fn flush(&mut self) -> ViewResult<Option<UpdateReport>> {
        if self.destroyed {
            return Err(ViewError::Destroyed);
        }
        let records = self.dom.take_records();
        let selection_moved = self.dom.selection() != self.selection_sync.observed();
        if records.is_empty() && !selection_moved {
            return Ok(None);
        }
        let doc_view = self.doc_view.as_ref().ok_or(ViewError::Destroyed)?;

        let mut changes: Vec<TextChange> = Vec::new();
        let mut dirty: Vec<(DescId, Dirty)> = Vec::new();
        let mut wrapper: Option<DomId> = None;
        for record in &records {
            if !self.dom.exists(record.target) {
                continue;
            }
            let Some((desc, start)) = doc_view.nearest_desc(&self.dom, record.target) else {
                trace!(target = record.target.index(), "Mutation outside the document");
                continue;
            };
            if desc.custom_view().is_some_and(|view| view.ignore_mutation(record)) {
                continue;
            }
            if let Some(spec) = desc.widget().and_then(|deco| deco.widget_spec()) {
                if spec.key.as_deref() == Some(CURSOR_WRAPPER_KEY) && wrapper.is_none() {
                    let text = self.dom.text_content(desc.dom());
                    if !text.is_empty() {
                        changes.push(TextChange {
                            start,
                            rank: 0,
                            old: String::new(),
                            new: text,
                            marks: spec.marks.clone(),
                        });
                        wrapper = Some(desc.dom());
                    }
                }
                continue;
            }
            match record.kind {
                MutationKind::CharacterData if desc.is_text() && desc.node_dom() == Some(record.target) => {
                    let (Some(node), Some(text)) = (desc.node(), self.dom.text(record.target)) else {
                        continue;
                    };
                    changes.retain(|c| !(c.start == start && c.rank == 1));
                    changes.push(TextChange {
                        start,
                        rank: 1,
                        old: node.text().unwrap_or_default().to_string(),
                        new: text.to_string(),
                        marks: node.marks().to_vec(),
                    });
                }
                MutationKind::ChildList if desc.content_dom() == Some(record.target) => {
                    dirty.push((desc.id(), Dirty::Content));
                }
                _ => dirty.push((desc.id(), Dirty::Node)),
            }
        }

        // Later positions first, so earlier ones stay valid
        changes.sort_by(|a, b| (b.start, b.rank).cmp(&(a.start, a.rank)));
        let mut tr = self.state.tr();
        for change in &changes {
            let (from, to, inserted) = diff_text(&change.old, &change.new);
            if from == to && inserted.is_empty() {
                continue;
            }
            tr.step(Step::ReplaceText {
                from: change.start + from,
                to: change.start + to,
                text: inserted,
                marks: Some(change.marks.clone()),
            })?;
        }
        debug!(
            records = records.len(),
            text_changes = changes.len(),
            dirty = dirty.len(),
            "Read DOM changes"
        );

        if selection_moved || tr.doc_changed() {
            let between_prop = self
                .props_sources_selection_between()
                .map(|f| {
                    let state = &self.state;
                    move |anchor: usize, head: usize| f(state, anchor, head)
                });
            let between: Option<SelectionBetween<'_>> = between_prop
                .as_ref()
                .map(|f| f as &dyn Fn(usize, usize) -> Option<Selection>);
            let mapping = tr.doc_changed().then(|| tr.transform().mapping());
            let read = self
                .selection_sync
                .read(&self.dom, doc_view, tr.doc(), mapping, between);
            if let Some(sel) = read {
                tr.set_selection(sel);
            }
        }

        if let Some(wrapper) = wrapper {
            let _pause = self.dom.pause_observer();
            for child in self.dom.children(wrapper).to_vec() {
                self.dom.release(child, None);
            }
            if let Some(composition) = self.composition.as_mut() {
                composition.mark_cursor = None;
            }
        }
        if let Some(doc_view) = self.doc_view.as_mut() {
            for &(id, level) in &dirty {
                doc_view.mark_dirty(id, level);
            }
        }

        let state_changed = tr.doc_changed() || tr.selection() != *self.state.selection();
        let report = if state_changed {
            let state = self.state.apply(tr)?;
            self.apply(state, false)
        } else if !dirty.is_empty() {
            debug!(count = dirty.len(), "Repairing externally modified DOM");
            self.apply(self.state.clone(), false)
        } else {
            self.selection_sync.set_observed(self.dom.selection());
            return Ok(None);
        };
        self.selection_sync.set_observed(self.dom.selection());
        Ok(Some(report))
    }

    fn props_sources_selection_between(&self) -> Option<crate::props::SelectionBetweenProp> {
        crate::props::PropSources::new(
            self.props(),
            self.direct_plugins().plugins(),
            self.state.plugins().plugins(),
        )
        .resolve(|props| props.create_selection_between.clone())
    }

    /// Begin an input method composition
    pub fn start_composition(&mut self) -> ViewResult<()> {
        if self.destroyed {
            return Err(ViewError::Destroyed);
        }
        if self.composition.is_some() {
            return Err(ViewError::CompositionActive);
        }
        let mark_cursor = self.state.stored_marks().map(<[Mark]>::to_vec);
        debug!(marks = mark_cursor.as_ref().map(Vec::len), "Composition started");
        self.composition = Some(Composition { mark_cursor });
        if self.needs_cursor_wrapper() {
            self.apply(self.state.clone(), false);
        }
        Ok(())
    }

    /// Finish the composition, reading whatever it left in the DOM
    pub fn end_composition(&mut self) -> ViewResult<Option<UpdateReport>> {
        if self.composition.is_none() {
            return Err(ViewError::NoComposition);
        }
        let report = self.flush()?;
        self.composition = None;
        debug!("Composition ended");
        if self.cursor_wrapper.is_some() {
            return Ok(Some(self.apply(self.state.clone(), false)));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_text() {
        assert_eq!(diff_text("Hello", "Hello world"), (5, 5, " world".to_string()));
        assert_eq!(diff_text("Hello", "Help"), (3, 5, "p".to_string()));
        assert_eq!(diff_text("aaa", "aa"), (2, 3, String::new()));
        assert_eq!(diff_text("abc", "abc"), (3, 3, String::new()));
        assert_eq!(diff_text("héllo", "hello"), (1, 2, "e".to_string()));
    }
}

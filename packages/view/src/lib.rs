//! # Verso View
//!
//! Keeps a live rendered tree in sync with an immutable editor state.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ EditorState (doc, selection, plugins)        │
//! └──────────────────────────────────────────────┘
//!                      ↓ apply
//! ┌──────────────────────────────────────────────┐
//! │ EditorView                                   │
//! │  - props + decorations resolved per update   │
//! │  - ViewDesc tree patched in place            │
//! │  - selection written to the platform         │
//! │  - scroll preserved or moved to selection    │
//! │  - plugin views notified                     │
//! └──────────────────────────────────────────────┘
//!                      ↓ mutations
//! ┌──────────────────────────────────────────────┐
//! │ Dom (headless platform + layout)             │
//! └──────────────────────────────────────────────┘
//!                      ↓ flush
//!            transactions back into the state
//! ```
//!
//! ## Core Principles
//!
//! 1. **Reuse over rebuild**: unchanged nodes keep their descriptors and DOM
//! 2. **Idempotent updates**: applying the same state twice touches nothing
//! 3. **Own mutations are invisible**: the observer is paused while the view
//!    writes, so only foreign changes get read back
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use verso_model::Schema;
//! use verso_view::{EditorState, EditorView, StateConfig, ViewConfig};
//!
//! let schema = Arc::new(Schema::basic());
//! let doc = schema.doc_of_paragraphs(&["Hello"])?;
//! let state = EditorState::create(StateConfig::new(schema, doc));
//! let mut view = EditorView::headless(ViewConfig::new(state));
//!
//! let mut tr = view.state().tr();
//! tr.insert_text("Hi ")?;
//! view.dispatch(tr)?;
//! ```

pub mod decoration;
pub mod dom;
pub mod error;
pub mod input;
pub mod layout;
pub mod node_view;
pub mod plugin_view;
pub mod props;
pub mod scroll;
pub mod selection;
pub mod state;
mod updater;
pub mod view;
pub mod viewdesc;

pub use decoration::{DecoAttrs, Decoration, DecorationKind, DecorationSet, WidgetSpec};
pub use dom::{Capabilities, Dom, DomId, DomPoint, DomSelection, MutationKind, MutationRecord, Viewport};
pub use error::{ViewError, ViewResult};
pub use layout::{Layout, Metrics, Rect};
pub use node_view::{MarkView, MarkViewFactory, NodeView, NodeViewContext, NodeViewFactory, SELECTED_NODE_CLASS};
pub use plugin_view::{PluginView, PluginViewFactory};
pub use props::{EditorProps, NodeViewRegistry};
pub use selection::{SelectionCompat, SharedAncestorPolicy};
pub use state::{EditorState, Plugin, PluginSet, StateConfig, Transaction};
pub use view::{EditorView, ScrollMode, TextDirection, UpdateReport, ViewConfig, ViewOptions, CURSOR_WRAPPER_CLASS};
pub use viewdesc::{DescId, Dirty, RenderStats, ViewDesc};

pub use verso_model as model;

//! # Verso Model
//!
//! Immutable document model consumed by the verso view layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ schema: node + mark types                   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ model: persistent node tree                 │
//! │  - Structural sharing between versions      │
//! │  - Integer positions (ResolvedPos)          │
//! │  - Steps + position mapping                 │
//! │  - Logical selection                        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ view: reconciles rendered DOM with model    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Nodes are values**: a change produces a new document, never mutates
//! 2. **Sharing is identity**: untouched subtrees are the very same `Arc`,
//!    so the view can skip them with a pointer comparison
//! 3. **Positions are integers**: every boundary between tokens is a position
//!
//! ## Usage
//!
//! ```rust,ignore
//! use verso_model::{Schema, Step, Transform};
//!
//! let schema = Schema::basic();
//! let doc = schema.doc_of_paragraphs(&["Hello", "World"])?;
//!
//! let mut tr = Transform::new(doc);
//! tr.step(Step::ReplaceText { from: 6, to: 6, text: "!".into(), marks: None })?;
//! assert_eq!(tr.doc().text_content(), "Hello!World");
//! ```

mod error;
mod mapping;
mod mark;
mod node;
mod resolved;
mod schema;
mod selection;
mod transform;

pub use error::{ModelError, ModelResult};
pub use mapping::{MapResult, Mapping, ReplacedRange, StepMap};
pub use mark::Mark;
pub use node::{Attrs, Node};
pub use resolved::ResolvedPos;
pub use schema::{MarkType, NodeKind, NodeType, Schema};
pub use selection::Selection;
pub use transform::{Step, Transform};

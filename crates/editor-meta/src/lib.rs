#![warn(missing_docs)]
//! Editor Meta - structural per-line metadata for line-oriented text editors
//!
//! # Overview
//!
//! `editor-meta` tracks a small bundle of derived facts for every line of a host document
//! (fold nesting, bracket positions, lexer state, save revision, attached markers) and
//! implements the algorithms that consume them. It never owns the text: lines are addressed
//! through stable [`LineId`] handles issued by a [`TextBuffer`] implementation, and every value
//! the highlighter derives is written back through the [`LineMetadataStore`].
//!
//! # Core Features
//!
//! - **Lazy per-line records**: absent records read as defaults, stale handles read as "no metadata"
//! - **Code folding**: fold/unfold that keeps nested collapsed regions collapsed, bulk toggles, validation
//! - **Bracket matching**: forward/backward matching across lines with mismatch detection, block navigation
//! - **Revision tracking**: save generations and "changed since save" per line in O(1)
//! - **Marks**: priority-ordered gutter markers with exactly one gutter decision per change
//! - **Block selection**: rectangular editing with tab-aware visual columns
//! - **Incremental invalidation**: re-lex only until the lexer state settles
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  DocumentMetadata / SharedDocument          │  ← Public API, notifications
//! ├─────────────────────────────────────────────┤
//! │  Folding · Brackets · Block selection       │  ← Algorithms (pull-based)
//! ├─────────────────────────────────────────────┤
//! │  Marks · Revisions · Re-highlight driver    │  ← Bookkeeping
//! ├─────────────────────────────────────────────┤
//! │  LineMetadataStore                          │  ← Per-line records
//! ├─────────────────────────────────────────────┤
//! │  TextBuffer (host) / RopeBuffer             │  ← Line handles and text
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use editor_meta::{DocumentMetadata, RopeBuffer, TextBuffer};
//! use editor_meta_lang::LanguageConfig;
//!
//! let buffer = RopeBuffer::from_lines(&["  if (x) {", "    y();", "  }"]);
//! let mut doc = DocumentMetadata::new(buffer, LanguageConfig::c_like("c"));
//!
//! let ids: Vec<_> = (0..3).map(|n| doc.buffer().line_at(n).unwrap()).collect();
//! for (id, indent) in ids.iter().zip([0, 1, 0]) {
//!     doc.store_mut().set_folding_indent(*id, indent);
//! }
//!
//! assert!(doc.can_fold(ids[0]));
//! doc.toggle_fold(ids[0], false);
//! assert!(!doc.buffer().is_visible(ids[1]));
//! assert!(doc.buffer().is_visible(ids[2]));
//! ```
//!
//! # Module Description
//!
//! - [`buffer`] - the host buffer seam and a rope-backed reference buffer
//! - [`store`] - per-line metadata records
//! - [`revision`] - save-generation tracking
//! - [`marks`] - mark attachment and gutter width decisions
//! - [`brackets`] - bracket matching and structural navigation
//! - [`folding`] - fold engine and fold validator
//! - [`columns`] - visual column math
//! - [`block_selection`] - rectangular selection
//! - [`invalidation`] - incremental re-highlight driver
//! - [`document`] - the document facade
//! - [`shared`] - shared handle with a re-entrancy guard

pub mod block_selection;
pub mod brackets;
pub mod buffer;
pub mod columns;
pub mod document;
mod error;
pub mod folding;
pub mod invalidation;
pub mod marks;
pub mod revision;
pub mod shared;
pub mod store;

pub use block_selection::{BlockSelection, BlockSelectionEngine, CharCursor};
pub use brackets::{BracketLocation, BracketMatch, BracketMatcher, LinePosition, SearchScope};
pub use buffer::{LineId, RopeBuffer, TextBuffer, lines};
pub use columns::{ColumnPosition, column_at, column_count_for_text, position_at_column};
pub use document::{DocumentMetadata, MetadataCallback, MetadataChange};
pub use error::MetaError;
pub use folding::{FoldEngine, FoldValidator, can_fold, validate_all};
pub use invalidation::{
    LexerContext, LineLexer, LineUpdate, RehighlightRange, apply_line_update, rehighlight,
};
pub use marks::{GutterUpdate, Mark, MarkId, MarkRegistry};
pub use revision::RevisionTracker;
pub use shared::{SharedDocument, WeakDocument};
pub use store::{Bracket, BracketKind, LineMetadata, LineMetadataStore};

//! Save-generation tracking.
//!
//! The tracker keeps one document-wide `last_save_revision` counter; each line carries a
//! revision stamp in its metadata record. Immediately after a save every line's revision
//! equals `last_save_revision`. Editing a line stamps it with `-(last_save_revision + 1)`,
//! a negative sentinel meaning "dirty relative to the current save generation"; untouched
//! lines keep their stamp.
//!
//! Lines without a record (or whose record was stamped by the last save) read as the current
//! generation, so a save only touches allocated records instead of every line.

use crate::buffer::{LineId, TextBuffer, lines};
use crate::store::LineMetadataStore;

/// Document-scoped save-generation state.
#[derive(Debug, Clone, Default)]
pub struct RevisionTracker {
    last_save_revision: i32,
}

impl RevisionTracker {
    /// Start at generation 0, with every line clean.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current save generation.
    pub fn last_save_revision(&self) -> i32 {
        self.last_save_revision
    }

    /// The sentinel stamped on lines edited since the last save.
    pub fn dirty_revision(&self) -> i32 {
        -(self.last_save_revision + 1)
    }

    /// Revision stamp of `line`.
    pub fn line_revision(&self, store: &LineMetadataStore, line: LineId) -> i32 {
        store
            .get(line)
            .and_then(|m| m.revision)
            .unwrap_or(self.last_save_revision)
    }

    /// Returns `true` if `line` was edited since the last save.
    pub fn is_modified(&self, store: &LineMetadataStore, line: LineId) -> bool {
        self.line_revision(store, line) < 0
    }

    /// Lines edited since the last save, in document order.
    pub fn modified_lines<B: TextBuffer + ?Sized>(
        &self,
        store: &LineMetadataStore,
        buffer: &B,
    ) -> Vec<LineId> {
        lines(buffer)
            .filter(|line| self.is_modified(store, *line))
            .collect()
    }

    /// Stamp `line` as edited in the current generation.
    pub fn on_edit(&self, store: &mut LineMetadataStore, line: LineId) {
        store.get_or_create(line).revision = Some(self.dirty_revision());
    }

    /// Start a new save generation and stamp every line with it.
    pub fn on_save(&mut self, store: &mut LineMetadataStore) -> i32 {
        self.last_save_revision += 1;
        for (_, m) in store.iter_mut() {
            m.revision = None;
        }
        tracing::debug!(
            revision = self.last_save_revision,
            "Stamped lines with new save generation"
        );
        self.last_save_revision
    }

    /// The document was reloaded from disk: all surviving lines are clean in a new generation
    /// and records of lines that no longer exist are dropped.
    pub fn on_reload<B: TextBuffer + ?Sized>(
        &mut self,
        store: &mut LineMetadataStore,
        buffer: &B,
    ) -> i32 {
        let dropped = store.prune(buffer);
        if dropped > 0 {
            tracing::trace!(dropped, "Dropped stale line records on reload");
        }
        self.on_save(store)
    }
}

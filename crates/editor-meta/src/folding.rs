//! Code folding over per-line fold indents.
//!
//! A line *can fold* when the next line's fold indent is strictly greater than its own; the
//! region it folds is the run of following lines whose indent stays greater. Line visibility
//! itself is owned by the host buffer ([`TextBuffer::set_visible`]); the `folded` flag lives in
//! the line's metadata.

use crate::buffer::{LineId, TextBuffer, lines};
use crate::store::LineMetadataStore;

/// Returns `true` if `line` starts a foldable region.
///
/// The document end is a boundary: the last line never folds.
pub fn can_fold<B: TextBuffer + ?Sized>(buffer: &B, store: &LineMetadataStore, line: LineId) -> bool {
    buffer
        .next_line(line)
        .is_some_and(|next| store.folding_indent(next) > store.folding_indent(line))
}

/// Fold and unfold operations over one document.
pub struct FoldEngine<'a, B: TextBuffer + ?Sized> {
    buffer: &'a mut B,
    store: &'a mut LineMetadataStore,
}

impl<'a, B: TextBuffer + ?Sized> FoldEngine<'a, B> {
    /// Create an engine over `buffer` and its metadata.
    pub fn new(buffer: &'a mut B, store: &'a mut LineMetadataStore) -> Self {
        Self { buffer, store }
    }

    /// See [`can_fold`].
    pub fn can_fold(&self, line: LineId) -> bool {
        can_fold(&*self.buffer, self.store, line)
    }

    /// Whether `line` begins a collapsed region.
    pub fn is_folded(&self, line: LineId) -> bool {
        self.store.is_folded(line)
    }

    /// First and last line (inclusive) that folding `line` would hide.
    pub fn fold_range(&self, line: LineId) -> Option<(LineId, LineId)> {
        if !self.can_fold(line) {
            return None;
        }
        let indent = self.store.folding_indent(line);
        let first = self.buffer.next_line(line)?;
        let mut last = first;
        while let Some(next) = self.buffer.next_line(last) {
            if self.store.folding_indent(next) <= indent {
                break;
            }
            last = next;
        }
        Some((first, last))
    }

    /// Set the collapsed-placeholder markers of `line`.
    pub fn set_folding_markers(&mut self, line: LineId, start_included: bool, end_included: bool) {
        self.store
            .set_folding_markers(line, start_included, end_included);
    }

    /// Collapsed-placeholder markers of `line`: `(start_included, end_included)`.
    pub fn folding_markers(&self, line: LineId) -> (bool, bool) {
        self.store.get(line).map_or((false, false), |m| {
            (m.folding_start_included, m.folding_end_included)
        })
    }

    fn show(&mut self, line: LineId, visible: bool) -> bool {
        if self.buffer.is_visible(line) == visible {
            return false;
        }
        self.buffer.set_visible(line, visible);
        true
    }

    /// Fold (`unfold == false`) or unfold the region started by `line`.
    ///
    /// Unfolding keeps nested folded regions collapsed. `line` must be able to fold; calling
    /// this on any other line is a programming error (a no-op in release builds).
    ///
    /// Returns the number of lines whose visibility changed.
    pub fn toggle_fold(&mut self, line: LineId, unfold: bool) -> usize {
        debug_assert!(self.can_fold(line), "toggle_fold on a line that cannot fold");
        if !self.can_fold(line) {
            return 0;
        }
        let indent = self.store.folding_indent(line);
        let mut changed = 0;
        // Indent of a nested folded header whose body is being skipped.
        let mut skip_until: Option<u32> = None;
        let mut current = self.buffer.next_line(line);

        while let Some(l) = current {
            let level = self.store.folding_indent(l);
            if level <= indent {
                break;
            }
            current = self.buffer.next_line(l);
            if let Some(limit) = skip_until {
                if level > limit {
                    continue;
                }
                skip_until = None;
            }
            if self.show(l, unfold) {
                changed += 1;
            }
            if unfold && self.store.is_folded(l) && self.can_fold(l) {
                skip_until = Some(level);
            }
        }

        self.store.set_folded(line, !unfold);
        tracing::trace!(line = line.raw(), unfold, changed, "Toggled fold");
        changed
    }

    /// Fold every foldable region if any visible one is expanded, otherwise unfold everything.
    ///
    /// Returns whether the action was "fold", and the number of lines whose visibility changed.
    pub fn toggle_all(&mut self) -> (bool, usize) {
        let any_expanded = lines(&*self.buffer).any(|l| {
            self.buffer.is_visible(l) && self.can_fold(l) && !self.store.is_folded(l)
        });
        let changed = self.apply_to_all(!any_expanded);
        (any_expanded, changed)
    }

    /// Fold every foldable region.
    pub fn fold_all(&mut self) -> usize {
        self.apply_to_all(false)
    }

    /// Unfold every foldable region.
    pub fn unfold_all(&mut self) -> usize {
        self.apply_to_all(true)
    }

    fn apply_to_all(&mut self, unfold: bool) -> usize {
        let headers: Vec<LineId> = lines(&*self.buffer)
            .filter(|l| self.can_fold(*l))
            .collect();
        let changed: usize = headers
            .into_iter()
            .map(|l| self.toggle_fold(l, unfold))
            .sum();
        tracing::debug!(unfold, changed, "Applied fold action to whole document");
        changed
    }

    /// Unfold every folded ancestor region of `line` so that it becomes visible.
    ///
    /// Returns the number of lines whose visibility changed.
    pub fn ensure_visible(&mut self, line: LineId) -> usize {
        if !self.buffer.is_valid(line) || self.buffer.is_visible(line) {
            return 0;
        }
        let mut indent = self.store.folding_indent(line);
        let mut changed = 0;
        let mut current = self.buffer.prev_line(line);
        while let Some(l) = current {
            let level = self.store.folding_indent(l);
            if level < indent && self.can_fold(l) {
                if self.store.is_folded(l) {
                    changed += self.toggle_fold(l, true);
                }
                if self.buffer.is_visible(l) {
                    break;
                }
                indent = level;
            }
            current = self.buffer.prev_line(l);
        }
        changed
    }
}

/// Incremental fold re-validation after visibility or indent changes made elsewhere.
///
/// Feed every line in document order through [`FoldValidator::process`], then call
/// [`FoldValidator::finish`].
pub struct FoldValidator<'a, B: TextBuffer + ?Sized> {
    buffer: &'a mut B,
    store: &'a mut LineMetadataStore,
    /// Indent level at which the enclosing collapsed region began.
    inside_fold: Option<u32>,
    size_changed: bool,
}

impl<'a, B: TextBuffer + ?Sized> FoldValidator<'a, B> {
    /// Create a validator.
    pub fn new(buffer: &'a mut B, store: &'a mut LineMetadataStore) -> Self {
        Self {
            buffer,
            store,
            inside_fold: None,
            size_changed: false,
        }
    }

    /// Validate `line` against the line before it.
    ///
    /// The first line of the document is outside every fold and is always shown.
    pub fn process(&mut self, line: LineId) {
        let Some(previous) = self.buffer.prev_line(line) else {
            self.inside_fold = None;
            if !self.buffer.is_visible(line) {
                self.buffer.set_visible(line, true);
                self.size_changed = true;
                tracing::debug!(line = line.raw(), "Showed hidden first line");
            }
            return;
        };
        let prev_folded = self.store.is_folded(previous);
        let prev_can_fold = can_fold(&*self.buffer, self.store, previous);
        let visible = self.buffer.is_visible(line);

        if prev_folded && !prev_can_fold {
            self.store.set_folded(previous, false);
            tracing::debug!(line = previous.raw(), "Cleared folded flag on line that cannot fold");
        } else if !prev_folded && prev_can_fold && self.buffer.is_visible(previous) && !visible {
            self.store.set_folded(previous, true);
            tracing::debug!(line = previous.raw(), "Marked line with hidden body as folded");
        }

        let level = self.store.folding_indent(line);
        if self.store.is_folded(previous) && self.inside_fold.is_none() {
            self.inside_fold = Some(level);
        }

        let should_be_visible = match self.inside_fold {
            None => true,
            Some(fold_level) if level < fold_level => {
                self.inside_fold = None;
                true
            }
            Some(_) => false,
        };

        if should_be_visible != visible {
            self.buffer.set_visible(line, should_be_visible);
            self.size_changed = true;
        }
    }

    /// Finish validation. Returns `true` if any line's visibility was corrected.
    pub fn finish(self) -> bool {
        if self.size_changed {
            tracing::debug!("Fold validation changed document size");
        }
        self.size_changed
    }
}

/// Run a [`FoldValidator`] over the whole document.
pub fn validate_all<B: TextBuffer + ?Sized>(buffer: &mut B, store: &mut LineMetadataStore) -> bool {
    let all: Vec<LineId> = lines(&*buffer).collect();
    let mut validator = FoldValidator::new(buffer, store);
    for line in all {
        validator.process(line);
    }
    validator.finish()
}

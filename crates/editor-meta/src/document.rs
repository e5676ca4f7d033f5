//! Document-level facade.
//!
//! [`DocumentMetadata`] owns a host buffer together with all metadata derived for it and routes
//! every mutation through one place, so line lifecycle events, revision stamps, gutter
//! decisions and fold validation stay consistent. Observers register with
//! [`DocumentMetadata::subscribe`]; notifications are fired synchronously, once, as the last
//! step of the operation that caused them.

use std::rc::Rc;

use editor_meta_lang::LanguageConfig;

use crate::block_selection::BlockSelectionEngine;
use crate::brackets::BracketMatcher;
use crate::buffer::{LineId, TextBuffer};
use crate::error::MetaError;
use crate::folding::{FoldEngine, can_fold, validate_all};
use crate::invalidation::{LineLexer, RehighlightRange, rehighlight};
use crate::marks::{GutterUpdate, Mark, MarkRegistry};
use crate::revision::RevisionTracker;
use crate::store::LineMetadataStore;

/// A change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataChange {
    /// The mark set changed; the gutter must act on the decision.
    Gutter(GutterUpdate),
    /// A fold was toggled (`line` is `None` for document-wide actions).
    FoldsChanged {
        /// Header line of the toggled region.
        line: Option<LineId>,
        /// Number of lines whose visibility changed.
        lines_changed: usize,
    },
    /// Fold validation corrected line visibility.
    DocumentSizeChanged,
    /// Line text changed through a metadata-driven edit or a lifecycle call.
    LinesModified(Vec<LineId>),
    /// Lines were re-lexed.
    Rehighlighted(RehighlightRange),
    /// A new save generation started.
    Saved {
        /// The new save revision.
        revision: i32,
    },
    /// The document was reloaded.
    Reloaded {
        /// The new save revision.
        revision: i32,
    },
}

/// Callback type for [`DocumentMetadata::subscribe`].
pub type MetadataCallback = Box<dyn FnMut(&MetadataChange)>;

/// A host buffer plus every piece of structural metadata attached to it.
pub struct DocumentMetadata<B: TextBuffer> {
    buffer: B,
    store: LineMetadataStore,
    revisions: RevisionTracker,
    marks: MarkRegistry,
    config: LanguageConfig,
    block_selection: BlockSelectionEngine,
    lexer: Option<Box<dyn LineLexer>>,
    callbacks: Vec<MetadataCallback>,
}

impl<B: TextBuffer> DocumentMetadata<B> {
    /// Wrap `buffer` with empty metadata.
    pub fn new(buffer: B, config: LanguageConfig) -> Self {
        let block_selection = BlockSelectionEngine::new(config.tabs);
        Self {
            buffer,
            store: LineMetadataStore::new(),
            revisions: RevisionTracker::new(),
            marks: MarkRegistry::new(),
            config,
            block_selection,
            lexer: None,
            callbacks: Vec::new(),
        }
    }

    /// Attach a highlighter; lifecycle calls re-lex affected lines through it.
    ///
    /// The whole document is lexed immediately.
    pub fn with_lexer(mut self, lexer: Box<dyn LineLexer>) -> Self {
        self.set_lexer(lexer);
        self
    }

    /// Replace the highlighter and lex the whole document.
    pub fn set_lexer(&mut self, lexer: Box<dyn LineLexer>) {
        self.lexer = Some(lexer);
        if let (Some(first), Some(last)) = (self.buffer.first_line(), self.buffer.last_line()) {
            self.refresh(first, last);
        }
    }

    /// Register a change callback.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&MetadataChange) + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    fn notify(&mut self, change: MetadataChange) {
        for callback in &mut self.callbacks {
            callback(&change);
        }
    }

    /// The host buffer.
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Mutable access to the host buffer.
    ///
    /// Edits made here must be reported through the `on_line_*` lifecycle methods.
    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    /// Per-line metadata.
    pub fn store(&self) -> &LineMetadataStore {
        &self.store
    }

    /// Mutable per-line metadata, for highlighters that write values directly.
    pub fn store_mut(&mut self) -> &mut LineMetadataStore {
        &mut self.store
    }

    /// Save-generation state.
    pub fn revisions(&self) -> &RevisionTracker {
        &self.revisions
    }

    /// Mark relation and gutter bookkeeping.
    pub fn marks(&self) -> &MarkRegistry {
        &self.marks
    }

    /// Language configuration.
    pub fn config(&self) -> &LanguageConfig {
        &self.config
    }

    /// Block selection session state.
    pub fn block_selection(&self) -> &BlockSelectionEngine {
        &self.block_selection
    }

    /// Mutable block selection session state (for navigation commands).
    pub fn block_selection_mut(&mut self) -> &mut BlockSelectionEngine {
        &mut self.block_selection
    }

    // Marks.

    /// Attach `mark` to `line`.
    pub fn add_mark(&mut self, line: LineId, mark: &Rc<Mark>) -> Result<GutterUpdate, MetaError> {
        let update = self
            .marks
            .add_mark(&mut self.store, &self.buffer, line, mark)?;
        self.notify(MetadataChange::Gutter(update.clone()));
        Ok(update)
    }

    /// Detach `mark` from `line`.
    pub fn remove_mark(&mut self, line: LineId, mark: &Mark) -> Result<GutterUpdate, MetaError> {
        let update = self.marks.remove_mark(&mut self.store, line, mark)?;
        self.notify(MetadataChange::Gutter(update.clone()));
        Ok(update)
    }

    /// Move `mark` from `from` to `to` as a single transition.
    pub fn move_mark(
        &mut self,
        mark: &Mark,
        from: LineId,
        to: LineId,
    ) -> Result<GutterUpdate, MetaError> {
        let update = self
            .marks
            .move_mark(&mut self.store, &self.buffer, mark, from, to)?;
        self.notify(MetadataChange::Gutter(update.clone()));
        Ok(update)
    }

    /// Show or hide an attached mark.
    pub fn set_mark_visible(&mut self, mark: &Mark, visible: bool) -> Option<GutterUpdate> {
        let update = self.marks.set_visible(mark, visible)?;
        self.notify(MetadataChange::Gutter(update.clone()));
        Some(update)
    }

    /// Live marks on `line`, ascending by priority.
    pub fn marks_on(&self, line: LineId) -> Vec<Rc<Mark>> {
        self.marks.marks_on(&self.store, line)
    }

    // Brackets.

    /// A bracket matcher over the current metadata.
    pub fn brackets(&self) -> BracketMatcher<'_, B> {
        BracketMatcher::new(&self.buffer, &self.store, &self.config.brackets)
    }

    // Folding.

    /// Returns `true` if `line` starts a foldable region.
    pub fn can_fold(&self, line: LineId) -> bool {
        can_fold(&self.buffer, &self.store, line)
    }

    fn folds(&mut self) -> FoldEngine<'_, B> {
        FoldEngine::new(&mut self.buffer, &mut self.store)
    }

    /// Fold or unfold the region started by `line`. See [`FoldEngine::toggle_fold`].
    pub fn toggle_fold(&mut self, line: LineId, unfold: bool) -> usize {
        let lines_changed = self.folds().toggle_fold(line, unfold);
        self.notify(MetadataChange::FoldsChanged {
            line: Some(line),
            lines_changed,
        });
        lines_changed
    }

    /// Fold everything, or unfold everything if nothing visible is expanded.
    ///
    /// Returns whether the action was "fold", and the number of lines whose visibility changed.
    pub fn toggle_all(&mut self) -> (bool, usize) {
        let (folded, lines_changed) = self.folds().toggle_all();
        self.notify(MetadataChange::FoldsChanged {
            line: None,
            lines_changed,
        });
        (folded, lines_changed)
    }

    /// Fold every foldable region.
    pub fn fold_all(&mut self) -> usize {
        let lines_changed = self.folds().fold_all();
        self.notify(MetadataChange::FoldsChanged {
            line: None,
            lines_changed,
        });
        lines_changed
    }

    /// Unfold every foldable region.
    pub fn unfold_all(&mut self) -> usize {
        let lines_changed = self.folds().unfold_all();
        self.notify(MetadataChange::FoldsChanged {
            line: None,
            lines_changed,
        });
        lines_changed
    }

    /// Unfold the regions hiding `line`.
    pub fn ensure_visible(&mut self, line: LineId) -> usize {
        let lines_changed = self.folds().ensure_visible(line);
        if lines_changed > 0 {
            self.notify(MetadataChange::FoldsChanged {
                line: Some(line),
                lines_changed,
            });
        }
        lines_changed
    }

    /// Re-validate fold state against current indents and visibility.
    pub fn validate_folds(&mut self) -> bool {
        let changed = validate_all(&mut self.buffer, &mut self.store);
        if changed {
            self.notify(MetadataChange::DocumentSizeChanged);
        }
        changed
    }

    // Highlighting.

    /// Re-lex `first..=last` with the attached lexer and re-validate folds.
    fn refresh(&mut self, first: LineId, last: LineId) {
        let Some(lexer) = self.lexer.as_mut() else {
            return;
        };
        let Some(range) = rehighlight(&self.buffer, &mut self.store, lexer.as_mut(), first, last)
        else {
            return;
        };
        self.notify(MetadataChange::Rehighlighted(range));
        self.validate_folds();
    }

    /// Re-lex with an explicit lexer (for hosts that keep their highlighter outside).
    pub fn rehighlight_with<L: LineLexer + ?Sized>(
        &mut self,
        lexer: &mut L,
        first: LineId,
        last: LineId,
    ) -> Option<RehighlightRange> {
        let range = rehighlight(&self.buffer, &mut self.store, lexer, first, last)?;
        self.notify(MetadataChange::Rehighlighted(range));
        self.validate_folds();
        Some(range)
    }

    // Line lifecycle.

    /// The text of `line` changed.
    pub fn on_line_edited(&mut self, line: LineId) {
        if !self.buffer.is_valid(line) {
            return;
        }
        self.revisions.on_edit(&mut self.store, line);
        self.notify(MetadataChange::LinesModified(vec![line]));
        self.refresh(line, line);
    }

    /// `line` was inserted into the buffer.
    pub fn on_line_inserted(&mut self, line: LineId) {
        if !self.buffer.is_valid(line) {
            return;
        }
        self.revisions.on_edit(&mut self.store, line);
        self.marks.refresh_line_numbers(&self.buffer);
        self.notify(MetadataChange::LinesModified(vec![line]));
        self.refresh(line, line);
    }

    /// `line` was removed from the buffer.
    ///
    /// When its text was joined into another line, pass that line as `absorbed_by`: marks move
    /// there and it is stamped as edited. Otherwise the removed line's marks are detached.
    pub fn on_line_removed(&mut self, line: LineId, absorbed_by: Option<LineId>) {
        let update = match absorbed_by {
            Some(to) => self
                .marks
                .relocate_line(&mut self.store, &self.buffer, line, to),
            None => self.marks.detach_line(&mut self.store, line),
        };
        self.store.remove_line(line);
        self.marks.refresh_line_numbers(&self.buffer);
        tracing::trace!(line = line.raw(), absorbed = absorbed_by.is_some(), "Line removed");
        if let Some(update) = update {
            self.notify(MetadataChange::Gutter(update));
        }
        if let Some(to) = absorbed_by {
            self.on_line_edited(to);
        }
        self.validate_folds();
    }

    /// Lines edited since the last save, in document order.
    pub fn modified_lines(&self) -> Vec<LineId> {
        self.revisions.modified_lines(&self.store, &self.buffer)
    }

    /// Returns `true` if `line` was edited since the last save.
    pub fn is_modified(&self, line: LineId) -> bool {
        self.revisions.is_modified(&self.store, line)
    }

    /// Start a new save generation.
    pub fn on_save(&mut self) -> i32 {
        let revision = self.revisions.on_save(&mut self.store);
        self.notify(MetadataChange::Saved { revision });
        revision
    }

    /// The document was reloaded from disk.
    pub fn on_reload(&mut self) -> i32 {
        let revision = self.revisions.on_reload(&mut self.store, &self.buffer);
        if let Some(update) = self.marks.purge_dropped(&mut self.store) {
            self.notify(MetadataChange::Gutter(update));
        }
        self.marks.refresh_line_numbers(&self.buffer);
        self.notify(MetadataChange::Reloaded { revision });
        if let (Some(first), Some(last)) = (self.buffer.first_line(), self.buffer.last_line()) {
            self.refresh(first, last);
        }
        revision
    }

    // Block selection edits.

    fn after_block_edit(&mut self, touched: Vec<LineId>) -> Vec<LineId> {
        if touched.is_empty() {
            return touched;
        }
        for line in &touched {
            self.revisions.on_edit(&mut self.store, *line);
        }
        self.marks.refresh_line_numbers(&self.buffer);
        self.notify(MetadataChange::LinesModified(touched.clone()));
        let first = touched.iter().copied().min_by_key(|l| self.buffer.line_number(*l));
        let last = touched.iter().copied().max_by_key(|l| self.buffer.line_number(*l));
        if let (Some(first), Some(last)) = (first, last) {
            self.refresh(first, last);
        }
        touched
    }

    /// Insert `text` into the block selection. See [`BlockSelectionEngine::insert_text`].
    pub fn block_insert_text(&mut self, text: &str) -> Vec<LineId> {
        let touched = self.block_selection.insert_text(&mut self.buffer, text);
        self.after_block_edit(touched)
    }

    /// Remove the block selection's contents. See [`BlockSelectionEngine::remove_text`].
    pub fn block_remove_text(&mut self) -> Vec<LineId> {
        let touched = self.block_selection.remove_text(&mut self.buffer);
        self.after_block_edit(touched)
    }

    /// Type over the block selection. See [`BlockSelectionEngine::replace_text`].
    pub fn block_replace_text(&mut self, text: &str) -> Vec<LineId> {
        let touched = self.block_selection.replace_text(&mut self.buffer, text);
        self.after_block_edit(touched)
    }

    /// Transform the block selection's contents line by line.
    pub fn block_transform<F: FnMut(&str) -> String>(&mut self, f: F) -> Vec<LineId> {
        let touched = self.block_selection.transform(&mut self.buffer, f);
        self.after_block_edit(touched)
    }
}

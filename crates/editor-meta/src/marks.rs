//! Line marks (breakpoints, bookmarks, diagnostics markers, ...) and gutter sizing.
//!
//! Marks are owned by the caller (`Rc<Mark>`); lines only hold weak references, ordered
//! ascending by priority. The registry owns the authoritative mark -> line relation. The
//! mark itself only carries a line-number cache for display, refreshed by the registry.
//!
//! Every structural change to the mark set ends in exactly one [`GutterUpdate`] decision:
//! either a narrow repaint of the touched lines or a full gutter-width recompute.

use crate::MetaError;
use crate::buffer::{LineId, TextBuffer};
use crate::store::{LineMetadata, LineMetadataStore};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MARK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`Mark`], unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkId(u64);

/// A caller-owned marker attachable to one line at a time.
#[derive(Debug)]
pub struct Mark {
    id: MarkId,
    priority: i32,
    visible: Cell<bool>,
    width_factor: f64,
    draggable: bool,
    clickable: bool,
    line_number: Cell<Option<usize>>,
}

impl Mark {
    /// Create a visible mark with width factor 1.0. Lower priorities sort first.
    pub fn new(priority: i32) -> Self {
        Self {
            id: MarkId(NEXT_MARK_ID.fetch_add(1, Ordering::Relaxed)),
            priority,
            visible: Cell::new(true),
            width_factor: 1.0,
            draggable: false,
            clickable: false,
            line_number: Cell::new(None),
        }
    }

    /// Set the gutter width factor (clamped to at least 1.0).
    pub fn with_width_factor(mut self, width_factor: f64) -> Self {
        self.width_factor = if width_factor.is_finite() {
            width_factor.max(1.0)
        } else {
            1.0
        };
        self
    }

    /// Set initial visibility.
    pub fn with_visible(self, visible: bool) -> Self {
        self.visible.set(visible);
        self
    }

    /// Allow the mark to be dragged to another line.
    pub fn with_draggable(mut self, draggable: bool) -> Self {
        self.draggable = draggable;
        self
    }

    /// Allow the mark to be clicked.
    pub fn with_clickable(mut self, clickable: bool) -> Self {
        self.clickable = clickable;
        self
    }

    /// Mark identity.
    pub fn id(&self) -> MarkId {
        self.id
    }

    /// Sort priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether the mark is drawn.
    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    /// Gutter width factor (>= 1.0).
    pub fn width_factor(&self) -> f64 {
        self.width_factor
    }

    /// Whether the mark can be dragged.
    pub fn is_draggable(&self) -> bool {
        self.draggable
    }

    /// Whether the mark reacts to clicks.
    pub fn is_clickable(&self) -> bool {
        self.clickable
    }

    /// Cached zero-based line number of the attachment (display only).
    pub fn line_number(&self) -> Option<usize> {
        self.line_number.get()
    }
}

/// Weak entry stored in a line's mark list.
#[derive(Debug, Clone)]
pub(crate) struct MarkRef {
    id: MarkId,
    priority: i32,
    mark: Weak<Mark>,
}

impl MarkRef {
    fn new(mark: &Rc<Mark>) -> Self {
        Self {
            id: mark.id,
            priority: mark.priority,
            mark: Rc::downgrade(mark),
        }
    }

    pub(crate) fn upgrade(&self) -> Option<Rc<Mark>> {
        self.mark.upgrade()
    }
}

fn insert_by_priority(metadata: &mut LineMetadata, entry: MarkRef) {
    let pos = metadata
        .marks
        .iter()
        .position(|r| entry.priority < r.priority)
        .unwrap_or(metadata.marks.len());
    metadata.marks.insert(pos, entry);
}

/// What the gutter has to do after a mark change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GutterUpdate {
    /// Only these lines' gutter cells need repainting.
    RepaintLines(Vec<LineId>),
    /// The gutter width may have changed; recompute it and repaint everything.
    RecomputeWidth,
}

impl GutterUpdate {
    fn repaint(line: LineId) -> Self {
        Self::RepaintLines(vec![line])
    }

    fn escalate(self, full: bool) -> Self {
        if full { Self::RecomputeWidth } else { self }
    }
}

#[derive(Debug)]
struct Attachment {
    line: LineId,
    width_factor: f64,
    mark: Weak<Mark>,
}

/// Document-wide mark relation and gutter width bookkeeping.
#[derive(Debug)]
pub struct MarkRegistry {
    attachments: HashMap<MarkId, Attachment>,
    max_width_factor: f64,
}

impl MarkRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            attachments: HashMap::new(),
            max_width_factor: 1.0,
        }
    }

    /// Largest width factor among visible attached marks (1.0 when there are none).
    pub fn max_width_factor(&self) -> f64 {
        self.max_width_factor
    }

    /// Returns `true` if any mark is attached.
    pub fn has_marks(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Returns `true` if `mark` is attached to some line.
    pub fn is_attached(&self, mark: &Mark) -> bool {
        self.attachments.contains_key(&mark.id)
    }

    /// The line `mark` is attached to.
    pub fn line_of(&self, mark: &Mark) -> Option<LineId> {
        self.attachments.get(&mark.id).map(|a| a.line)
    }

    /// Live marks on `line`, ascending by priority.
    pub fn marks_on(&self, store: &LineMetadataStore, line: LineId) -> Vec<Rc<Mark>> {
        store.get(line).map(LineMetadata::marks).unwrap_or_default()
    }

    /// All live attached marks, ordered by cached line number then priority.
    pub fn marks(&self) -> Vec<Rc<Mark>> {
        let mut marks: Vec<Rc<Mark>> = self
            .attachments
            .values()
            .filter_map(|a| a.mark.upgrade())
            .collect();
        marks.sort_by_key(|m| (m.line_number(), m.priority(), m.id()));
        marks
    }

    fn visible_max(&self) -> f64 {
        self.attachments
            .values()
            .filter_map(|a| a.mark.upgrade())
            .filter(|m| m.is_visible())
            .map(|m| m.width_factor())
            .fold(1.0, f64::max)
    }

    /// Returns `true` if the maximum width factor must be recomputed after removing a
    /// visible mark of `width_factor`.
    fn removal_may_shrink(&self, width_factor: f64) -> bool {
        self.max_width_factor > 1.0 && width_factor > 1.0 && width_factor >= self.max_width_factor
    }

    fn decide_after_removal(&mut self, visible: bool, width_factor: f64, lines: Vec<LineId>) -> GutterUpdate {
        if self.attachments.is_empty() {
            self.max_width_factor = 1.0;
            return GutterUpdate::RecomputeWidth;
        }
        if !visible || !self.removal_may_shrink(width_factor) {
            return GutterUpdate::RepaintLines(lines);
        }
        let max = self.visible_max();
        if max < self.max_width_factor {
            tracing::trace!(from = self.max_width_factor, to = max, "Mark width factor shrank");
            self.max_width_factor = max;
            GutterUpdate::RecomputeWidth
        } else {
            GutterUpdate::RepaintLines(lines)
        }
    }

    fn decide_after_addition(&mut self, mark: &Mark, first: bool, line: LineId) -> GutterUpdate {
        let mut grew = false;
        if mark.is_visible() && mark.width_factor() > self.max_width_factor {
            self.max_width_factor = mark.width_factor();
            grew = true;
        }
        if grew || first {
            GutterUpdate::RecomputeWidth
        } else {
            GutterUpdate::repaint(line)
        }
    }

    fn purge_dropped_inner(&mut self, store: &mut LineMetadataStore) -> bool {
        let dead: Vec<(MarkId, LineId)> = self
            .attachments
            .iter()
            .filter(|(_, a)| a.mark.strong_count() == 0)
            .map(|(id, a)| (*id, a.line))
            .collect();
        if dead.is_empty() {
            return false;
        }
        for (id, line) in &dead {
            self.attachments.remove(id);
            if let Some(m) = store.get_mut(*line) {
                m.marks.retain(|r| r.id != *id);
            }
        }
        tracing::trace!(count = dead.len(), "Purged marks released by their owner");
        let max = self.visible_max();
        if self.attachments.is_empty() || max < self.max_width_factor {
            self.max_width_factor = max;
            return true;
        }
        false
    }

    /// Forget marks whose owner dropped them.
    ///
    /// Returns `None` if nothing was purged, otherwise the gutter decision for the purge.
    pub fn purge_dropped(&mut self, store: &mut LineMetadataStore) -> Option<GutterUpdate> {
        let lines: Vec<LineId> = self
            .attachments
            .values()
            .filter(|a| a.mark.strong_count() == 0)
            .map(|a| a.line)
            .collect();
        if lines.is_empty() {
            return None;
        }
        let full = self.purge_dropped_inner(store);
        Some(GutterUpdate::RepaintLines(lines).escalate(full))
    }

    /// Attach `mark` to `line`.
    ///
    /// Fails with [`MetaError::AlreadyAttached`] if the mark already has an attachment and with
    /// [`MetaError::StaleLine`] if `line` no longer exists.
    pub fn add_mark<B: TextBuffer + ?Sized>(
        &mut self,
        store: &mut LineMetadataStore,
        buffer: &B,
        line: LineId,
        mark: &Rc<Mark>,
    ) -> Result<GutterUpdate, MetaError> {
        let purged = self.purge_dropped_inner(store);
        if self.attachments.contains_key(&mark.id) {
            return Err(MetaError::AlreadyAttached(mark.id));
        }
        let Some(number) = buffer.line_number(line) else {
            return Err(MetaError::StaleLine(line));
        };

        let first = self.attachments.is_empty();
        insert_by_priority(store.get_or_create(line), MarkRef::new(mark));
        mark.line_number.set(Some(number));
        self.attachments.insert(
            mark.id,
            Attachment {
                line,
                width_factor: mark.width_factor,
                mark: Rc::downgrade(mark),
            },
        );

        let update = self.decide_after_addition(mark, first, line).escalate(purged);
        tracing::debug!(mark = ?mark.id, ?line, ?update, "Attached mark");
        Ok(update)
    }

    /// Detach `mark` from `line`.
    pub fn remove_mark(
        &mut self,
        store: &mut LineMetadataStore,
        line: LineId,
        mark: &Mark,
    ) -> Result<GutterUpdate, MetaError> {
        let purged = self.purge_dropped_inner(store);
        if self.line_of(mark) != Some(line) {
            return Err(MetaError::NotAttached {
                mark: mark.id,
                line,
            });
        }

        self.attachments.remove(&mark.id);
        if let Some(m) = store.get_mut(line) {
            m.marks.retain(|r| r.id != mark.id);
        }
        mark.line_number.set(None);

        let update = self
            .decide_after_removal(mark.is_visible(), mark.width_factor, vec![line])
            .escalate(purged);
        tracing::debug!(mark = ?mark.id, ?line, ?update, "Detached mark");
        Ok(update)
    }

    /// Move `mark` from `from` to `to` as a single transition.
    ///
    /// The set of attached marks does not change, so the gutter width cannot change either;
    /// observers never see the mark detached.
    pub fn move_mark<B: TextBuffer + ?Sized>(
        &mut self,
        store: &mut LineMetadataStore,
        buffer: &B,
        mark: &Mark,
        from: LineId,
        to: LineId,
    ) -> Result<GutterUpdate, MetaError> {
        let purged = self.purge_dropped_inner(store);
        if self.line_of(mark) != Some(from) {
            return Err(MetaError::NotAttached {
                mark: mark.id,
                line: from,
            });
        }
        let Some(number) = buffer.line_number(to) else {
            return Err(MetaError::StaleLine(to));
        };

        let mut lines = vec![from];
        if from != to {
            let entry = store.get_mut(from).and_then(|m| {
                let idx = m.marks.iter().position(|r| r.id == mark.id)?;
                Some(m.marks.remove(idx))
            });
            if let Some(entry) = entry {
                insert_by_priority(store.get_or_create(to), entry);
            }
            if let Some(a) = self.attachments.get_mut(&mark.id) {
                a.line = to;
            }
            lines.push(to);
        }
        mark.line_number.set(Some(number));

        let update = GutterUpdate::RepaintLines(lines).escalate(purged);
        tracing::debug!(mark = ?mark.id, ?from, ?to, ?update, "Moved mark");
        Ok(update)
    }

    /// Show or hide `mark`.
    ///
    /// Returns `None` if the visibility did not change or the mark is not attached.
    pub fn set_visible(&mut self, mark: &Mark, visible: bool) -> Option<GutterUpdate> {
        if mark.is_visible() == visible {
            return None;
        }
        mark.visible.set(visible);
        let line = self.line_of(mark)?;
        let update = if visible {
            self.decide_after_addition(mark, false, line)
        } else {
            self.decide_after_removal(true, mark.width_factor, vec![line])
        };
        Some(update)
    }

    /// Move every mark on `from` onto `to` (e.g. `from` was joined into `to`).
    pub fn relocate_line<B: TextBuffer + ?Sized>(
        &mut self,
        store: &mut LineMetadataStore,
        buffer: &B,
        from: LineId,
        to: LineId,
    ) -> Option<GutterUpdate> {
        if from == to {
            return None;
        }
        let entries = store
            .get_mut(from)
            .map(|m| std::mem::take(&mut m.marks))
            .unwrap_or_default();
        if entries.is_empty() {
            return None;
        }
        let number = buffer.line_number(to);
        for entry in entries {
            if let Some(a) = self.attachments.get_mut(&entry.id) {
                a.line = to;
            }
            if let Some(mark) = entry.upgrade() {
                mark.line_number.set(number);
            }
            insert_by_priority(store.get_or_create(to), entry);
        }
        tracing::debug!(?from, ?to, "Relocated marks of removed line");
        Some(GutterUpdate::RepaintLines(vec![from, to]))
    }

    /// Detach every mark on `line` (e.g. the line was removed).
    pub fn detach_line(
        &mut self,
        store: &mut LineMetadataStore,
        line: LineId,
    ) -> Option<GutterUpdate> {
        let entries = store
            .get_mut(line)
            .map(|m| std::mem::take(&mut m.marks))
            .unwrap_or_default();
        if entries.is_empty() {
            return None;
        }
        let mut widest_visible = 1.0f64;
        let mut any_visible = false;
        for entry in &entries {
            if let Some(a) = self.attachments.remove(&entry.id) {
                let visible = a.mark.upgrade().is_none_or(|m| m.is_visible());
                if visible {
                    any_visible = true;
                    widest_visible = widest_visible.max(a.width_factor);
                }
            }
            if let Some(mark) = entry.upgrade() {
                mark.line_number.set(None);
            }
        }
        Some(self.decide_after_removal(any_visible, widest_visible, vec![line]))
    }

    /// Refresh every attached mark's line-number cache from `buffer`.
    pub fn refresh_line_numbers<B: TextBuffer + ?Sized>(&self, buffer: &B) {
        for a in self.attachments.values() {
            if let Some(mark) = a.mark.upgrade() {
                mark.line_number.set(buffer.line_number(a.line));
            }
        }
    }
}

impl Default for MarkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

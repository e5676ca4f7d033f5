//! Per-line metadata records.
//!
//! [`LineMetadataStore`] is a sparse map from [`LineId`] to [`LineMetadata`]. Records are
//! created lazily on first write; every read on a line without a record (including stale
//! handles) yields the field defaults. A record whose fields are all at their defaults may
//! be evicted at any time via [`LineMetadataStore::compact`]; nothing observable depends on
//! a record physically existing.

use crate::buffer::{LineId, TextBuffer};
use crate::marks::{Mark, MarkRef};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Whether a bracket opens or closes a nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketKind {
    /// Opening bracket.
    Open,
    /// Closing bracket.
    Close,
}

/// One bracket-like character recorded by the highlighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    /// Open or close.
    pub kind: BracketKind,
    /// The bracket character.
    pub character: char,
    /// Character offset of the bracket within its line.
    pub offset: usize,
}

impl Bracket {
    /// An opening bracket at `offset`.
    pub fn open(character: char, offset: usize) -> Self {
        Self {
            kind: BracketKind::Open,
            character,
            offset,
        }
    }

    /// A closing bracket at `offset`.
    pub fn close(character: char, offset: usize) -> Self {
        Self {
            kind: BracketKind::Close,
            character,
            offset,
        }
    }

    /// Returns `true` for an opening bracket.
    pub fn is_open(&self) -> bool {
        self.kind == BracketKind::Open
    }

    /// Exclusive end of the bracket (`offset + 1`).
    pub fn end_offset(&self) -> usize {
        self.offset + 1
    }
}

/// Derived facts attached to one line.
#[derive(Default)]
pub struct LineMetadata {
    /// Attached marks, ascending by priority. Maintained by the mark registry only.
    pub(crate) marks: Vec<MarkRef>,
    /// Brackets on the line, left to right.
    pub parentheses: Vec<Bracket>,
    /// Fold nesting depth; the line can fold iff the next line's indent is greater.
    pub folding_indent: u32,
    /// Show the first character of a collapsed region in its placeholder.
    pub folding_start_included: bool,
    /// Show the last character of a collapsed region in its placeholder.
    pub folding_end_included: bool,
    /// Opaque lexer state at the end of the line (compared for equality only).
    pub lexer_state: u8,
    /// Brace nesting depth at the end of the line, as written by the highlighter.
    pub brace_depth: i32,
    /// The line sits inside an inactive preprocessor branch.
    pub ifdefed_out: bool,
    /// The line begins a currently collapsed region.
    pub folded: bool,
    /// Save-generation stamp; `None` means "stamped with the current save generation".
    pub(crate) revision: Option<i32>,
    /// Formatter payload owned by this record.
    pub formatter_data: Option<Box<dyn Any>>,
}

impl LineMetadata {
    /// Create an all-default record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if every field holds its default and no marks are attached.
    pub fn is_default(&self) -> bool {
        self.marks.is_empty()
            && self.parentheses.is_empty()
            && self.folding_indent == 0
            && !self.folding_start_included
            && !self.folding_end_included
            && self.lexer_state == 0
            && self.brace_depth == 0
            && !self.ifdefed_out
            && !self.folded
            && self.revision.is_none()
            && self.formatter_data.is_none()
    }

    /// Live attached marks, ascending by priority.
    pub fn marks(&self) -> Vec<Rc<Mark>> {
        self.marks.iter().filter_map(MarkRef::upgrade).collect()
    }

    /// Number of attached mark entries (including ones whose owner already dropped them).
    pub fn mark_count(&self) -> usize {
        self.marks.len()
    }

    /// Returns `true` if the highlighter recorded any brackets on this line.
    pub fn has_brackets(&self) -> bool {
        !self.parentheses.is_empty()
    }

    /// Downcast the formatter payload.
    pub fn formatter_data<T: Any>(&self) -> Option<&T> {
        self.formatter_data.as_ref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for LineMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineMetadata")
            .field("marks", &self.marks.len())
            .field("parentheses", &self.parentheses)
            .field("folding_indent", &self.folding_indent)
            .field("folding_start_included", &self.folding_start_included)
            .field("folding_end_included", &self.folding_end_included)
            .field("lexer_state", &self.lexer_state)
            .field("brace_depth", &self.brace_depth)
            .field("ifdefed_out", &self.ifdefed_out)
            .field("folded", &self.folded)
            .field("revision", &self.revision)
            .field("formatter_data", &self.formatter_data.is_some())
            .finish()
    }
}

/// Sparse, lazily allocated metadata records keyed by line handle.
#[derive(Debug, Default)]
pub struct LineMetadataStore {
    records: HashMap<LineId, LineMetadata>,
}

impl LineMetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing record for `line`, never allocating.
    pub fn get(&self, line: LineId) -> Option<&LineMetadata> {
        self.records.get(&line)
    }

    /// Existing record for `line`, mutably, never allocating.
    pub fn get_mut(&mut self, line: LineId) -> Option<&mut LineMetadata> {
        self.records.get_mut(&line)
    }

    /// Record for `line`, allocated on first access.
    pub fn get_or_create(&mut self, line: LineId) -> &mut LineMetadata {
        self.records.entry(line).or_default()
    }

    /// Destroy the record for a removed line (and its formatter payload).
    pub fn remove_line(&mut self, line: LineId) -> Option<LineMetadata> {
        self.records.remove(&line)
    }

    /// Number of allocated records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no records are allocated.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate allocated records (unordered).
    pub fn iter(&self) -> impl Iterator<Item = (LineId, &LineMetadata)> {
        self.records.iter().map(|(id, m)| (*id, m))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (LineId, &mut LineMetadata)> {
        self.records.iter_mut().map(|(id, m)| (*id, m))
    }

    /// Evict records that hold only defaults. Returns the number evicted.
    pub fn compact(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, m| !m.is_default());
        before - self.records.len()
    }

    /// Drop records whose handles are no longer valid in `buffer`. Returns the number dropped.
    pub fn prune<B: TextBuffer + ?Sized>(&mut self, buffer: &B) -> usize {
        let before = self.records.len();
        self.records.retain(|id, _| buffer.is_valid(*id));
        before - self.records.len()
    }

    /// Brackets on `line` (empty when absent).
    pub fn parentheses(&self, line: LineId) -> &[Bracket] {
        self.get(line)
            .map(|m| m.parentheses.as_slice())
            .unwrap_or_default()
    }

    /// Returns `true` if `line` has recorded brackets.
    pub fn has_brackets(&self, line: LineId) -> bool {
        self.get(line).is_some_and(LineMetadata::has_brackets)
    }

    /// Fold indent of `line` (0 when absent).
    pub fn folding_indent(&self, line: LineId) -> u32 {
        self.get(line).map_or(0, |m| m.folding_indent)
    }

    /// Lexer state of `line` (0 when absent).
    pub fn lexer_state(&self, line: LineId) -> u8 {
        self.get(line).map_or(0, |m| m.lexer_state)
    }

    /// Brace depth at the end of `line` (0 when absent).
    pub fn brace_depth(&self, line: LineId) -> i32 {
        self.get(line).map_or(0, |m| m.brace_depth)
    }

    /// Whether `line` is inside an inactive preprocessor branch.
    pub fn ifdefed_out(&self, line: LineId) -> bool {
        self.get(line).is_some_and(|m| m.ifdefed_out)
    }

    /// Whether `line` begins a collapsed region.
    pub fn is_folded(&self, line: LineId) -> bool {
        self.get(line).is_some_and(|m| m.folded)
    }

    /// Replace the bracket list of `line`.
    pub fn set_parentheses(&mut self, line: LineId, parentheses: Vec<Bracket>) {
        if parentheses.is_empty() {
            if let Some(m) = self.get_mut(line) {
                m.parentheses.clear();
            }
            return;
        }
        self.get_or_create(line).parentheses = parentheses;
    }

    /// Set the fold indent of `line`.
    pub fn set_folding_indent(&mut self, line: LineId, indent: u32) {
        if indent == 0 && !self.records.contains_key(&line) {
            return;
        }
        self.get_or_create(line).folding_indent = indent;
    }

    /// Set the collapsed-placeholder markers of `line`.
    pub fn set_folding_markers(&mut self, line: LineId, start_included: bool, end_included: bool) {
        if !start_included && !end_included && !self.records.contains_key(&line) {
            return;
        }
        let m = self.get_or_create(line);
        m.folding_start_included = start_included;
        m.folding_end_included = end_included;
    }

    /// Set the lexer state of `line`. Returns `true` if the value changed.
    pub fn set_lexer_state(&mut self, line: LineId, state: u8) -> bool {
        if self.lexer_state(line) == state {
            return false;
        }
        self.get_or_create(line).lexer_state = state;
        true
    }

    /// Set the brace depth at the end of `line`. Returns `true` if the value changed.
    pub fn set_brace_depth(&mut self, line: LineId, depth: i32) -> bool {
        if self.brace_depth(line) == depth {
            return false;
        }
        self.get_or_create(line).brace_depth = depth;
        true
    }

    /// Mark `line` as inside/outside an inactive preprocessor branch. Returns `true` on change.
    pub fn set_ifdefed_out(&mut self, line: LineId, ifdefed_out: bool) -> bool {
        if self.ifdefed_out(line) == ifdefed_out {
            return false;
        }
        self.get_or_create(line).ifdefed_out = ifdefed_out;
        true
    }

    /// Set the folded flag of `line`.
    pub fn set_folded(&mut self, line: LineId, folded: bool) {
        if !folded && !self.records.contains_key(&line) {
            return;
        }
        self.get_or_create(line).folded = folded;
    }

    /// Attach (or clear) the formatter payload of `line`.
    pub fn set_formatter_data(&mut self, line: LineId, data: Option<Box<dyn Any>>) {
        match data {
            Some(data) => self.get_or_create(line).formatter_data = Some(data),
            None => {
                if let Some(m) = self.get_mut(line) {
                    m.formatter_data = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_default_without_allocating() {
        let store = LineMetadataStore::new();
        let line = LineId::from_raw(7);
        assert!(store.get(line).is_none());
        assert_eq!(store.folding_indent(line), 0);
        assert!(store.parentheses(line).is_empty());
        assert!(!store.is_folded(line));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clearing_to_default_does_not_allocate() {
        let mut store = LineMetadataStore::new();
        let line = LineId::from_raw(1);
        store.set_parentheses(line, Vec::new());
        store.set_folding_indent(line, 0);
        store.set_folded(line, false);
        assert!(!store.set_lexer_state(line, 0));
        assert!(store.is_empty());
    }

    #[test]
    fn test_compact_evicts_default_records_only() {
        let mut store = LineMetadataStore::new();
        let a = LineId::from_raw(1);
        let b = LineId::from_raw(2);
        store.set_folding_indent(a, 2);
        store.set_folding_indent(b, 1);
        store.set_folding_indent(b, 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.compact(), 1);
        assert_eq!(store.folding_indent(a), 2);
        assert_eq!(store.folding_indent(b), 0);
    }

    #[test]
    fn test_formatter_data_owned_by_record() {
        let mut store = LineMetadataStore::new();
        let line = LineId::from_raw(3);
        store.set_formatter_data(line, Some(Box::new(42u32)));
        assert_eq!(store.get(line).unwrap().formatter_data::<u32>(), Some(&42));
        assert_eq!(store.get(line).unwrap().formatter_data::<i64>(), None);
        let removed = store.remove_line(line).unwrap();
        assert!(removed.formatter_data.is_some());
        assert!(store.get(line).is_none());
    }

    #[test]
    fn test_lexer_state_change_detection() {
        let mut store = LineMetadataStore::new();
        let line = LineId::from_raw(4);
        assert!(store.set_lexer_state(line, 3));
        assert!(!store.set_lexer_state(line, 3));
        assert!(store.set_lexer_state(line, 0));
    }
}

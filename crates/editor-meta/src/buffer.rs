//! Text buffer seam.
//!
//! The metadata layer never owns document text. It addresses lines through stable
//! [`LineId`] handles issued by a host buffer implementing [`TextBuffer`], reads line text
//! for tab-column math, and drives the buffer's own insert/remove entry points as the effect
//! of block-selection edits.
//!
//! [`RopeBuffer`] is a small rope-backed reference implementation, used by tests, benches and
//! hosts that do not bring their own storage.

use ropey::Rope;
use std::collections::{HashMap, HashSet};

/// Opaque, stable handle to one line of the host document.
///
/// A handle stays valid while its line exists; once the line is removed every query on the
/// handle returns `None` (or the field default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineId(u64);

impl LineId {
    /// Create a handle from a raw host-side identifier.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw host-side identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// The host document, as seen by the metadata layer.
///
/// Offsets are in Unicode scalar values (`char`) within a single line, excluding the line
/// terminator.
pub trait TextBuffer {
    /// Number of lines in the document (at least 1 for a non-empty buffer).
    fn line_count(&self) -> usize;

    /// Handle of the line at zero-based `number`.
    fn line_at(&self, number: usize) -> Option<LineId>;

    /// Zero-based number of `line`, or `None` if the handle is stale.
    fn line_number(&self, line: LineId) -> Option<usize>;

    /// Text of `line` without its terminator.
    fn line_text(&self, line: LineId) -> Option<String>;

    /// Whether `line` is currently shown. Stale handles report `false`.
    fn is_visible(&self, line: LineId) -> bool;

    /// Show or hide `line`. Ignored for stale handles.
    fn set_visible(&mut self, line: LineId, visible: bool);

    /// Insert `text` (which must not contain line breaks) at `offset` in `line`.
    ///
    /// Returns `false` if the handle is stale or the offset is past the end of the line.
    fn insert_in_line(&mut self, line: LineId, offset: usize, text: &str) -> bool;

    /// Remove the half-open range `start..end` from `line`.
    ///
    /// Returns `false` if the handle is stale or the range is invalid.
    fn remove_in_line(&mut self, line: LineId, start: usize, end: usize) -> bool;

    /// Break `line` at `offset`; the text after `offset` moves to a new line inserted right
    /// after it. Returns the new line's handle.
    fn split_line(&mut self, line: LineId, offset: usize) -> Option<LineId>;

    /// Returns `true` if `line` still exists.
    fn is_valid(&self, line: LineId) -> bool {
        self.line_number(line).is_some()
    }

    /// Handle of the first line.
    fn first_line(&self) -> Option<LineId> {
        self.line_at(0)
    }

    /// Handle of the last line.
    fn last_line(&self) -> Option<LineId> {
        self.line_count()
            .checked_sub(1)
            .and_then(|n| self.line_at(n))
    }

    /// The line after `line` in document order.
    fn next_line(&self, line: LineId) -> Option<LineId> {
        self.line_number(line).and_then(|n| self.line_at(n + 1))
    }

    /// The line before `line` in document order.
    fn prev_line(&self, line: LineId) -> Option<LineId> {
        self.line_number(line)?
            .checked_sub(1)
            .and_then(|n| self.line_at(n))
    }

    /// Length of `line` in characters (0 for stale handles).
    fn line_len(&self, line: LineId) -> usize {
        self.line_text(line).map_or(0, |t| t.chars().count())
    }
}

/// Iterate all line handles of `buffer` in document order.
pub fn lines<B: TextBuffer + ?Sized>(buffer: &B) -> impl Iterator<Item = LineId> + '_ {
    (0..buffer.line_count()).filter_map(move |n| buffer.line_at(n))
}

/// Rope-backed [`TextBuffer`] with stable line handles.
///
/// Internally stores LF-normalized text. Only `'\n'` breaks lines: a lone `'\r'` or a Unicode
/// separator such as U+2028 is ordinary line content. Line handles survive edits within a line;
/// splitting a line issues a fresh handle for the tail, and removing or joining lines retires
/// handles.
pub struct RopeBuffer {
    rope: Rope,
    ids: Vec<LineId>,
    numbers: HashMap<LineId, usize>,
    hidden: HashSet<LineId>,
    next_id: u64,
}

impl RopeBuffer {
    /// Create a buffer holding a single empty line.
    pub fn new() -> Self {
        Self::from_text("")
    }

    /// Build a buffer from text (`"\r\n"` is normalized to `'\n'`).
    pub fn from_text(text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n");
        let rope = Rope::from_str(&normalized);
        let count = rope.len_lines();
        let mut buffer = Self {
            rope,
            ids: Vec::with_capacity(count),
            numbers: HashMap::with_capacity(count),
            hidden: HashSet::new(),
            next_id: 0,
        };
        for _ in 0..count {
            let id = buffer.issue_id();
            buffer.ids.push(id);
        }
        buffer.rebuild_numbers();
        buffer
    }

    /// Build a buffer from individual lines.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let text = lines
            .iter()
            .map(|l| l.as_ref())
            .collect::<Vec<_>>()
            .join("\n");
        Self::from_text(&text)
    }

    fn issue_id(&mut self) -> LineId {
        let id = LineId(self.next_id);
        self.next_id += 1;
        id
    }

    fn rebuild_numbers(&mut self) {
        self.numbers.clear();
        for (number, id) in self.ids.iter().enumerate() {
            self.numbers.insert(*id, number);
        }
    }

    fn line_start_char(&self, number: usize) -> usize {
        self.rope.line_to_char(number)
    }

    fn line_len_at(&self, number: usize) -> usize {
        let line = self.rope.line(number);
        let mut len = line.len_chars();
        if len > 0 && line.char(len - 1) == '\n' {
            len -= 1;
        }
        len
    }

    /// Complete document text.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Text of every line, in order.
    pub fn line_texts(&self) -> Vec<String> {
        lines(self)
            .filter_map(|id| self.line_text(id))
            .collect()
    }

    /// Insert a new line holding `text` so that it becomes line `number`.
    ///
    /// `number == line_count()` appends after the last line.
    pub fn insert_line(&mut self, number: usize, text: &str) -> Option<LineId> {
        let count = self.ids.len();
        if number > count || text.contains('\n') {
            return None;
        }
        if number == count {
            let end = self.rope.len_chars();
            self.rope.insert(end, "\n");
            self.rope.insert(end + 1, text);
        } else {
            let start = self.line_start_char(number);
            self.rope.insert(start, "\n");
            self.rope.insert(start, text);
        }
        let id = self.issue_id();
        self.ids.insert(number, id);
        self.rebuild_numbers();
        Some(id)
    }

    /// Remove line `number` entirely, returning its retired handle.
    ///
    /// The last remaining line of a document cannot be removed; it is cleared instead and
    /// `None` is returned.
    pub fn remove_line(&mut self, number: usize) -> Option<LineId> {
        let count = self.ids.len();
        if number >= count {
            return None;
        }
        if count == 1 {
            let len = self.rope.len_chars();
            self.rope.remove(0..len);
            return None;
        }
        let (start, end) = if number + 1 < count {
            (
                self.line_start_char(number),
                self.line_start_char(number + 1),
            )
        } else {
            (self.line_start_char(number) - 1, self.rope.len_chars())
        };
        self.rope.remove(start..end);
        let id = self.ids.remove(number);
        self.hidden.remove(&id);
        self.rebuild_numbers();
        Some(id)
    }

    /// Join `line` with the line after it. Returns the retired handle of the absorbed line.
    pub fn join_with_next(&mut self, line: LineId) -> Option<LineId> {
        let number = self.line_number(line)?;
        if number + 1 >= self.ids.len() {
            return None;
        }
        let newline = self.line_start_char(number) + self.line_len_at(number);
        self.rope.remove(newline..newline + 1);
        let id = self.ids.remove(number + 1);
        self.hidden.remove(&id);
        self.rebuild_numbers();
        Some(id)
    }

    /// Replace the whole text of `line`.
    pub fn set_line_text(&mut self, line: LineId, text: &str) -> bool {
        let Some(number) = self.line_number(line) else {
            return false;
        };
        if text.contains('\n') {
            return false;
        }
        let start = self.line_start_char(number);
        let len = self.line_len_at(number);
        self.rope.remove(start..start + len);
        self.rope.insert(start, text);
        true
    }
}

impl Default for RopeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer for RopeBuffer {
    fn line_count(&self) -> usize {
        self.ids.len()
    }

    fn line_at(&self, number: usize) -> Option<LineId> {
        self.ids.get(number).copied()
    }

    fn line_number(&self, line: LineId) -> Option<usize> {
        self.numbers.get(&line).copied()
    }

    fn line_text(&self, line: LineId) -> Option<String> {
        let number = self.line_number(line)?;
        let mut text = self.rope.line(number).to_string();
        if text.ends_with('\n') {
            text.pop();
        }
        Some(text)
    }

    fn is_visible(&self, line: LineId) -> bool {
        self.is_valid(line) && !self.hidden.contains(&line)
    }

    fn set_visible(&mut self, line: LineId, visible: bool) {
        if !self.is_valid(line) {
            return;
        }
        if visible {
            self.hidden.remove(&line);
        } else {
            self.hidden.insert(line);
        }
    }

    fn insert_in_line(&mut self, line: LineId, offset: usize, text: &str) -> bool {
        let Some(number) = self.line_number(line) else {
            return false;
        };
        if offset > self.line_len_at(number) || text.contains('\n') {
            return false;
        }
        let at = self.line_start_char(number) + offset;
        self.rope.insert(at, text);
        true
    }

    fn remove_in_line(&mut self, line: LineId, start: usize, end: usize) -> bool {
        let Some(number) = self.line_number(line) else {
            return false;
        };
        if start > end || end > self.line_len_at(number) {
            return false;
        }
        let base = self.line_start_char(number);
        self.rope.remove(base + start..base + end);
        true
    }

    fn split_line(&mut self, line: LineId, offset: usize) -> Option<LineId> {
        let number = self.line_number(line)?;
        if offset > self.line_len_at(number) {
            return None;
        }
        let at = self.line_start_char(number) + offset;
        self.rope.insert(at, "\n");
        let id = self.issue_id();
        self.ids.insert(number + 1, id);
        self.rebuild_numbers();
        Some(id)
    }

    fn line_len(&self, line: LineId) -> usize {
        self.line_number(line).map_or(0, |n| self.line_len_at(n))
    }
}

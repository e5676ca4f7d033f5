//! Rectangular ("block") selection.
//!
//! A [`BlockSelection`] stores two opposite corners of a rectangle in *visual* columns
//! (tab-expanded), keyed by zero-based line numbers. [`BlockSelectionEngine`] materializes the
//! rectangle into per-line character ranges and applies edits through the host
//! [`TextBuffer`]'s own entry points.
//!
//! Per line, a rectangle edge can land:
//!
//! - exactly on a character boundary
//! - inside a tab: the tab is replaced by spaces before editing so the edge becomes exact
//! - past the end of the line: insertion pads the line with spaces, removal skips the line
//!
//! Lines are processed from the last selected line to the first so that line splits caused
//! by multi-line insertion never shift lines that are still to be processed.

use crate::brackets::LinePosition;
use crate::buffer::{LineId, TextBuffer};
use crate::columns::{
    ColumnPosition, cell_width_at, column_at, column_count_for_text, position_at_column,
};
use editor_meta_lang::TabSettings;

/// Two corners of a rectangular selection, in visual columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSelection {
    /// Line of the moving corner.
    pub position_line: usize,
    /// Visual column of the moving corner.
    pub position_column: usize,
    /// Line of the fixed corner.
    pub anchor_line: usize,
    /// Visual column of the fixed corner.
    pub anchor_column: usize,
}

impl BlockSelection {
    /// A selection with both corners given.
    pub fn new(anchor_line: usize, anchor_column: usize, position_line: usize, position_column: usize) -> Self {
        Self {
            position_line,
            position_column,
            anchor_line,
            anchor_column,
        }
    }

    /// An empty selection (both corners at one place).
    pub fn caret(line: usize, column: usize) -> Self {
        Self::new(line, column, line, column)
    }

    /// First selected line.
    pub fn first_line(&self) -> usize {
        self.anchor_line.min(self.position_line)
    }

    /// Last selected line.
    pub fn last_line(&self) -> usize {
        self.anchor_line.max(self.position_line)
    }

    /// Number of selected lines.
    pub fn line_count(&self) -> usize {
        self.last_line() - self.first_line() + 1
    }

    /// Left edge of the rectangle.
    pub fn first_visual_column(&self) -> usize {
        self.anchor_column.min(self.position_column)
    }

    /// Right edge of the rectangle.
    pub fn last_visual_column(&self) -> usize {
        self.anchor_column.max(self.position_column)
    }

    /// Width of the rectangle in cells.
    pub fn width(&self) -> usize {
        self.last_visual_column() - self.first_visual_column()
    }

    /// Returns `true` if position and anchor coincide.
    pub fn is_empty(&self) -> bool {
        self.position_line == self.anchor_line && self.position_column == self.anchor_column
    }

    /// Returns `true` if `line` is inside the rectangle's line range.
    pub fn contains_line(&self, line: usize) -> bool {
        (self.first_line()..=self.last_line()).contains(&line)
    }

    /// Set the columns of both corners, keeping which corner is the left one.
    fn set_columns(&mut self, left: usize, right: usize) {
        if self.anchor_column <= self.position_column {
            self.anchor_column = left;
            self.position_column = right;
        } else {
            self.anchor_column = right;
            self.position_column = left;
        }
    }

    /// Move the later corner down by `lines`.
    fn grow_last_line(&mut self, lines: usize) {
        if self.anchor_line > self.position_line {
            self.anchor_line += lines;
        } else {
            self.position_line += lines;
        }
    }
}

/// A character-offset selection: anchor and position as line/offset pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharCursor {
    /// Fixed end.
    pub anchor: LinePosition,
    /// Moving end.
    pub position: LinePosition,
}

impl CharCursor {
    /// Returns `true` if anchor and position differ.
    pub fn has_selection(&self) -> bool {
        self.anchor != self.position
    }
}

/// Session state and edit operations for a block selection.
#[derive(Debug, Clone, Default)]
pub struct BlockSelectionEngine {
    selection: Option<BlockSelection>,
    tabs: TabSettings,
}

impl BlockSelectionEngine {
    /// Create an engine without an active selection.
    pub fn new(tabs: TabSettings) -> Self {
        Self {
            selection: None,
            tabs,
        }
    }

    /// Tab settings used for column math.
    pub fn tabs(&self) -> TabSettings {
        self.tabs
    }

    /// Change the tab settings.
    pub fn set_tabs(&mut self, tabs: TabSettings) {
        self.tabs = tabs;
    }

    /// The active selection, if any.
    pub fn selection(&self) -> Option<&BlockSelection> {
        self.selection.as_ref()
    }

    /// Returns `true` if a block selection is active.
    pub fn is_active(&self) -> bool {
        self.selection.is_some()
    }

    /// Replace the active selection.
    pub fn set_selection(&mut self, selection: BlockSelection) {
        self.selection = Some(selection);
    }

    /// Drop the active selection.
    pub fn clear(&mut self) {
        self.selection = None;
    }

    /// Start a new selection with both corners at `line`/`column`.
    pub fn set_anchor(&mut self, line: usize, column: usize) {
        self.selection = Some(BlockSelection::caret(line, column));
    }

    /// Move the position corner to `line`/`column`, starting a selection there if none is
    /// active.
    pub fn set_position(&mut self, line: usize, column: usize) {
        match &mut self.selection {
            Some(sel) => {
                sel.position_line = line;
                sel.position_column = column;
            }
            None => self.set_anchor(line, column),
        }
    }

    /// Move the position corner by a delta, clamped to the document's lines and column 0.
    pub fn move_position<B: TextBuffer + ?Sized>(
        &mut self,
        buffer: &B,
        line_delta: isize,
        column_delta: isize,
    ) {
        let Some(sel) = &mut self.selection else {
            return;
        };
        let max_line = buffer.line_count().saturating_sub(1);
        sel.position_line = sel.position_line.saturating_add_signed(line_delta).min(max_line);
        sel.position_column = sel.position_column.saturating_add_signed(column_delta);
    }

    fn offset_for_column<B: TextBuffer + ?Sized>(
        &self,
        buffer: &B,
        number: usize,
        column: usize,
    ) -> Option<LinePosition> {
        let line = buffer.line_at(number)?;
        let text = buffer.line_text(line)?;
        let pos = position_at_column(&text, column, self.tabs);
        Some(LinePosition::new(line, pos.offset))
    }

    /// The corners as character offsets, unnormalized. Columns past the end of a line clamp
    /// to the line end.
    pub fn cursor<B: TextBuffer + ?Sized>(&self, buffer: &B) -> Option<CharCursor> {
        let sel = self.selection?;
        Some(CharCursor {
            anchor: self.offset_for_column(buffer, sel.anchor_line, sel.anchor_column)?,
            position: self.offset_for_column(buffer, sel.position_line, sel.position_column)?,
        })
    }

    /// The full selection as a character range.
    ///
    /// The corner on the earlier line uses the rectangle's left edge and the corner on the
    /// later line uses its right edge (the reverse when the anchor is below the position).
    pub fn selection_range<B: TextBuffer + ?Sized>(&self, buffer: &B) -> Option<CharCursor> {
        let sel = self.selection?;
        let (anchor_column, position_column) = if sel.anchor_line <= sel.position_line {
            (sel.first_visual_column(), sel.last_visual_column())
        } else {
            (sel.last_visual_column(), sel.first_visual_column())
        };
        Some(CharCursor {
            anchor: self.offset_for_column(buffer, sel.anchor_line, anchor_column)?,
            position: self.offset_for_column(buffer, sel.position_line, position_column)?,
        })
    }

    /// Text inside the rectangle, one line per selected line.
    ///
    /// Tabs cut by an edge contribute the spaces that fall inside the rectangle, and lines
    /// shorter than the right edge are padded with spaces.
    pub fn selected_text<B: TextBuffer + ?Sized>(&self, buffer: &B) -> String {
        let Some(sel) = self.selection else {
            return String::new();
        };
        let (left, right) = (sel.first_visual_column(), sel.last_visual_column());
        let mut out = Vec::with_capacity(sel.line_count());
        for number in sel.first_line()..=sel.last_line() {
            let text = buffer
                .line_at(number)
                .and_then(|line| buffer.line_text(line))
                .unwrap_or_default();
            let mut piece = String::new();
            let mut col = 0usize;
            for ch in text.chars() {
                if col >= right {
                    break;
                }
                let w = cell_width_at(ch, col, self.tabs);
                let end = col + w;
                if col >= left && end <= right {
                    piece.push(ch);
                } else if end > left {
                    let overlap = end.min(right) - col.max(left);
                    piece.extend(std::iter::repeat_n(' ', overlap));
                }
                col = end;
            }
            if col < right {
                let pad = right - col.max(left);
                piece.extend(std::iter::repeat_n(' ', pad));
            }
            out.push(piece);
        }
        out.join("\n")
    }

    /// If `column` falls inside a tab on `line`, replace that tab by spaces.
    fn split_tab_at_column<B: TextBuffer + ?Sized>(&self, buffer: &mut B, line: LineId, column: usize) {
        let Some(text) = buffer.line_text(line) else {
            return;
        };
        let pos = position_at_column(&text, column, self.tabs);
        if !pos.is_inside_char() {
            return;
        }
        let tab_offset = pos.offset - 1;
        if text.chars().nth(tab_offset) != Some('\t') {
            return;
        }
        let tab_column = column_at(&text, tab_offset, self.tabs);
        let spaces = " ".repeat(cell_width_at('\t', tab_column, self.tabs));
        if buffer.remove_in_line(line, tab_offset, tab_offset + 1) {
            buffer.insert_in_line(line, tab_offset, &spaces);
        }
    }

    /// Make `column` addressable on `line` for insertion: split a tab under it or pad the
    /// line with spaces up to it. Returns the character offset of `column`.
    fn materialize_column<B: TextBuffer + ?Sized>(
        &self,
        buffer: &mut B,
        line: LineId,
        column: usize,
    ) -> Option<usize> {
        self.split_tab_at_column(buffer, line, column);
        let text = buffer.line_text(line)?;
        let pos = position_at_column(&text, column, self.tabs);
        if pos.is_past_end() {
            let pad = " ".repeat(pos.remainder as usize);
            buffer.insert_in_line(line, pos.offset, &pad);
            return Some(pos.offset + pad.chars().count());
        }
        Some(pos.offset)
    }

    /// Insert `text` at the rectangle's left edge on every selected line.
    ///
    /// When `text` has as many lines as the selection, line *i* of the text goes into selected
    /// line *i*; otherwise every selected line receives the whole text. All text lines are
    /// padded to a common visual width first. Afterwards the selection spans exactly the
    /// inserted rectangle. Empty `text` only collapses the selection to its left edge.
    ///
    /// Returns the lines whose text changed (including lines created by splits).
    pub fn insert_text<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B, text: &str) -> Vec<LineId> {
        let Some(mut sel) = self.selection else {
            return Vec::new();
        };
        let column = sel.first_visual_column();
        if text.is_empty() {
            sel.set_columns(column, column);
            self.selection = Some(sel);
            return Vec::new();
        }
        let (pieces, width) = self.pad_pieces(text, column);
        let per_line = pieces.len() == sel.line_count();
        let mut touched = Vec::new();

        for number in (sel.first_line()..=sel.last_line()).rev() {
            let Some(line) = buffer.line_at(number) else {
                continue;
            };
            let Some(offset) = self.materialize_column(buffer, line, column) else {
                continue;
            };
            if per_line {
                let piece = &pieces[number - sel.first_line()];
                buffer.insert_in_line(line, offset, piece);
                touched.push(line);
                continue;
            }
            let mut current = line;
            let mut at = offset;
            for (k, piece) in pieces.iter().enumerate() {
                if k > 0 {
                    let Some(tail) = buffer.split_line(current, at) else {
                        break;
                    };
                    current = tail;
                    at = 0;
                }
                buffer.insert_in_line(current, at, piece);
                at += piece.chars().count();
                touched.push(current);
            }
        }

        if !per_line && pieces.len() > 1 {
            sel.grow_last_line((pieces.len() - 1) * sel.line_count());
        }
        sel.set_columns(column, column + width);
        self.selection = Some(sel);
        tracing::debug!(
            lines = touched.len(),
            width,
            per_line,
            "Inserted text into block selection"
        );
        touched.reverse();
        touched
    }

    fn pad_pieces(&self, text: &str, column: usize) -> (Vec<String>, usize) {
        let mut pieces: Vec<String> = text
            .split('\n')
            .map(|p| p.strip_suffix('\r').unwrap_or(p).to_string())
            .collect();
        let widths: Vec<usize> = pieces
            .iter()
            .map(|p| column_count_for_text(p, column, self.tabs))
            .collect();
        let width = widths.iter().copied().max().unwrap_or(0);
        for (piece, w) in pieces.iter_mut().zip(widths) {
            piece.extend(std::iter::repeat_n(' ', width - w));
        }
        (pieces, width)
    }

    /// Remove the rectangle's contents from every selected line.
    ///
    /// A zero-width rectangle is a no-op. Lines that end before the left edge are left
    /// untouched. Tabs cut by an edge are replaced by spaces first. Afterwards both corners
    /// sit on the left edge.
    pub fn remove_text<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B) -> Vec<LineId> {
        let Some(mut sel) = self.selection else {
            return Vec::new();
        };
        let (left, right) = (sel.first_visual_column(), sel.last_visual_column());
        if left == right {
            return Vec::new();
        }
        let mut touched = Vec::new();
        for number in (sel.first_line()..=sel.last_line()).rev() {
            let Some(line) = buffer.line_at(number) else {
                continue;
            };
            let Some(text) = buffer.line_text(line) else {
                continue;
            };
            let start = position_at_column(&text, left, self.tabs);
            let line_len = text.chars().count();
            if !(start.offset < line_len || start.is_inside_char()) {
                continue;
            }
            self.split_tab_at_column(buffer, line, right);
            self.split_tab_at_column(buffer, line, left);
            let Some((start, end)) = self.edge_offsets(buffer, line, left, right) else {
                continue;
            };
            if start < end && buffer.remove_in_line(line, start, end) {
                touched.push(line);
            }
        }
        sel.set_columns(left, left);
        self.selection = Some(sel);
        tracing::debug!(lines = touched.len(), left, right, "Removed block selection");
        touched.reverse();
        touched
    }

    /// Character offsets of the left and right edges on `line`, clamped to the line end.
    fn edge_offsets<B: TextBuffer + ?Sized>(
        &self,
        buffer: &B,
        line: LineId,
        left: usize,
        right: usize,
    ) -> Option<(usize, usize)> {
        let text = buffer.line_text(line)?;
        let start: ColumnPosition = position_at_column(&text, left, self.tabs);
        let end = position_at_column(&text, right, self.tabs);
        Some((start.offset, end.offset))
    }

    /// Replace the part of every selected line inside the rectangle with `f(part)`.
    ///
    /// Lines where the rectangle covers no characters are skipped, as are results containing
    /// line breaks. The selection is unchanged.
    pub fn transform<B, F>(&mut self, buffer: &mut B, mut f: F) -> Vec<LineId>
    where
        B: TextBuffer + ?Sized,
        F: FnMut(&str) -> String,
    {
        let Some(sel) = self.selection else {
            return Vec::new();
        };
        let (left, right) = (sel.first_visual_column(), sel.last_visual_column());
        let mut touched = Vec::new();
        for number in (sel.first_line()..=sel.last_line()).rev() {
            let Some(line) = buffer.line_at(number) else {
                continue;
            };
            let Some((start, end)) = self.edge_offsets(buffer, line, left, right) else {
                continue;
            };
            if start >= end {
                continue;
            }
            let Some(text) = buffer.line_text(line) else {
                continue;
            };
            let part: String = text.chars().skip(start).take(end - start).collect();
            let replaced = f(&part);
            if replaced == part {
                continue;
            }
            if replaced.contains('\n') {
                tracing::warn!(line = number, "Block transform produced a line break; skipped");
                continue;
            }
            if buffer.remove_in_line(line, start, end) {
                buffer.insert_in_line(line, start, &replaced);
                touched.push(line);
            }
        }
        touched.reverse();
        touched
    }

    /// Type `text` over the rectangle: remove its contents, insert `text`, then collapse the
    /// selection to a zero-width rectangle right after the inserted text.
    pub fn replace_text<B: TextBuffer + ?Sized>(&mut self, buffer: &mut B, text: &str) -> Vec<LineId> {
        let mut touched = self.remove_text(buffer);
        for line in self.insert_text(buffer, text) {
            if !touched.contains(&line) {
                touched.push(line);
            }
        }
        if let Some(sel) = &mut self.selection {
            let right = sel.last_visual_column();
            sel.set_columns(right, right);
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RopeBuffer;

    fn engine() -> BlockSelectionEngine {
        BlockSelectionEngine::new(TabSettings::new(4))
    }

    #[test]
    fn test_corner_normalization() {
        let sel = BlockSelection::new(4, 6, 2, 3);
        assert_eq!(sel.first_line(), 2);
        assert_eq!(sel.last_line(), 4);
        assert_eq!(sel.first_visual_column(), 3);
        assert_eq!(sel.last_visual_column(), 6);
        assert!(!sel.is_empty());
        assert!(BlockSelection::caret(1, 1).is_empty());
    }

    #[test]
    fn test_selection_range_orders_by_line() {
        let buffer = RopeBuffer::from_lines(&["abcdefgh", "abcdefgh"]);
        let mut engine = engine();
        // Anchor bottom-left, position top-right.
        engine.set_selection(BlockSelection::new(1, 2, 0, 5));
        let range = engine.selection_range(&buffer).unwrap();
        assert_eq!(range.anchor.offset, 5);
        assert_eq!(range.position.offset, 2);
        assert_eq!(range.position.line, buffer.line_at(0).unwrap());
    }

    #[test]
    fn test_remove_splits_tab_under_left_edge() {
        let mut buffer = RopeBuffer::from_lines(&["a\tbcd"]);
        let mut engine = engine();
        engine.set_selection(BlockSelection::new(0, 2, 0, 5));
        let touched = engine.remove_text(&mut buffer);
        assert_eq!(touched.len(), 1);
        // The tab becomes three spaces; the cells 2..5 (two spaces and 'b') go away.
        assert_eq!(buffer.line_texts(), vec!["a cd"]);
    }

    #[test]
    fn test_insert_pads_short_lines() {
        let mut buffer = RopeBuffer::from_lines(&["abcdef", "ab"]);
        let mut engine = engine();
        engine.set_selection(BlockSelection::new(0, 4, 1, 4));
        engine.insert_text(&mut buffer, "X");
        assert_eq!(buffer.line_texts(), vec!["abcdXef", "ab  X"]);
    }

    #[test]
    fn test_selected_text_pads_and_cuts_tabs() {
        let buffer = RopeBuffer::from_lines(&["a\tb", "xy"]);
        let mut engine = engine();
        engine.set_selection(BlockSelection::new(0, 2, 1, 5));
        assert_eq!(engine.selected_text(&buffer), "  b\n   ");
    }
}

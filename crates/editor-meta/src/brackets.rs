//! Bracket matching and structural navigation across line boundaries.
//!
//! All scans read the per-line bracket lists recorded by the highlighter and keep a single
//! nesting counter. Lines flagged `ifdefed_out` are invisible to every scan.
//!
//! - [`BracketMatcher::match_forward`] / [`BracketMatcher::match_backward`] find the partner of
//!   a specific bracket and report [`BracketMatch::Mismatch`] when the partner's character
//!   does not pair with it.
//! - [`BracketMatcher::find_previous_open`] / [`BracketMatcher::find_next_close`] treat every
//!   bracket kind as one family and are used for "select enclosing block" and "go to block
//!   start/end".
//!
//! Caret arithmetic is half-open: a bracket at `offset` occupies `offset..offset + 1`, and a
//! closing bracket's matchable boundary is `offset + 1`.

use crate::buffer::{LineId, TextBuffer};
use crate::store::{Bracket, LineMetadataStore};
use editor_meta_lang::BracketPairs;

/// Returns `true` if `bracket` lies before `caret` on the caret's line.
///
/// An opening bracket's boundary is its own offset and a closing bracket's is the offset after
/// it. A closing bracket right before the caret therefore still counts as after it, and
/// backward and forward scans always agree on which side a bracket is.
fn is_before_caret(bracket: &Bracket, caret: usize) -> bool {
    let boundary = if bracket.is_open() {
        bracket.offset
    } else {
        bracket.end_offset()
    };
    boundary < caret
}

/// A caret-like position: line handle plus character offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePosition {
    /// Line handle.
    pub line: LineId,
    /// Character offset within the line.
    pub offset: usize,
}

impl LinePosition {
    /// Create a position.
    pub fn new(line: LineId, offset: usize) -> Self {
        Self { line, offset }
    }
}

/// A bracket found by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketLocation {
    /// Line the bracket is on.
    pub line: LineId,
    /// The bracket itself.
    pub bracket: Bracket,
}

impl BracketLocation {
    /// Position of the bracket character.
    pub fn start(&self) -> LinePosition {
        LinePosition::new(self.line, self.bracket.offset)
    }

    /// Position just after the bracket character.
    pub fn end(&self) -> LinePosition {
        LinePosition::new(self.line, self.bracket.end_offset())
    }
}

/// Outcome of a forward/backward bracket match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketMatch {
    /// No bracket at the requested position, or the scan ran off the document.
    NoMatch,
    /// Found a partner of the expected character.
    Match(BracketLocation),
    /// Found the structural partner, but its character does not pair with the origin.
    Mismatch(BracketLocation),
}

impl BracketMatch {
    /// Returns `true` for [`BracketMatch::Match`].
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match(_))
    }

    /// The partner location, for both matches and mismatches.
    pub fn location(&self) -> Option<BracketLocation> {
        match self {
            Self::NoMatch => None,
            Self::Match(loc) | Self::Mismatch(loc) => Some(*loc),
        }
    }
}

/// How far [`BracketMatcher::find_previous_open`] may search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Cross line boundaries up to the document start.
    Document,
    /// Stay within the caret's line.
    CurrentLine,
}

/// Read-only bracket scanner over a buffer and its metadata.
pub struct BracketMatcher<'a, B: TextBuffer + ?Sized> {
    buffer: &'a B,
    store: &'a LineMetadataStore,
    pairs: &'a BracketPairs,
}

impl<'a, B: TextBuffer + ?Sized> BracketMatcher<'a, B> {
    /// Create a matcher.
    pub fn new(buffer: &'a B, store: &'a LineMetadataStore, pairs: &'a BracketPairs) -> Self {
        Self {
            buffer,
            store,
            pairs,
        }
    }

    /// Brackets of `line` that scans may see.
    fn scannable(&self, line: LineId) -> Option<&'a [Bracket]> {
        let store: &'a LineMetadataStore = self.store;
        if store.ifdefed_out(line) {
            return None;
        }
        let list = store.parentheses(line);
        (!list.is_empty()).then_some(list)
    }

    fn next_scannable(&self, mut line: LineId) -> Option<(LineId, &'a [Bracket])> {
        loop {
            line = self.buffer.next_line(line)?;
            if let Some(list) = self.scannable(line) {
                return Some((line, list));
            }
        }
    }

    fn prev_scannable(&self, mut line: LineId) -> Option<(LineId, &'a [Bracket])> {
        loop {
            line = self.buffer.prev_line(line)?;
            if let Some(list) = self.scannable(line) {
                return Some((line, list));
            }
        }
    }

    fn judge(&self, open: char, close: char, partner: BracketLocation) -> BracketMatch {
        if self.pairs.pairs_with(open, close) {
            BracketMatch::Match(partner)
        } else {
            BracketMatch::Mismatch(partner)
        }
    }

    /// Match the opening bracket at `offset` on `line` with its closing partner.
    pub fn match_forward(&self, line: LineId, offset: usize) -> BracketMatch {
        let Some(mut list) = self.scannable(line) else {
            return BracketMatch::NoMatch;
        };
        let Some(idx) = list.iter().position(|b| b.offset == offset && b.is_open()) else {
            return BracketMatch::NoMatch;
        };
        let open = list[idx];
        let mut current = line;
        let mut i = idx + 1;
        let mut depth = 0u32;

        loop {
            while let Some(b) = list.get(i) {
                if b.is_open() {
                    depth += 1;
                } else if depth > 0 {
                    depth -= 1;
                } else {
                    let partner = BracketLocation {
                        line: current,
                        bracket: *b,
                    };
                    return self.judge(open.character, b.character, partner);
                }
                i += 1;
            }
            let Some((next, next_list)) = self.next_scannable(current) else {
                return BracketMatch::NoMatch;
            };
            current = next;
            list = next_list;
            i = 0;
        }
    }

    /// Match the closing bracket at `offset` on `line` with its opening partner.
    pub fn match_backward(&self, line: LineId, offset: usize) -> BracketMatch {
        let Some(mut list) = self.scannable(line) else {
            return BracketMatch::NoMatch;
        };
        let Some(idx) = list.iter().position(|b| b.offset == offset && !b.is_open()) else {
            return BracketMatch::NoMatch;
        };
        let close = list[idx];
        let mut current = line;
        // Number of brackets left to scan on the current line.
        let mut remaining = idx;
        let mut depth = 0u32;

        loop {
            while remaining > 0 {
                remaining -= 1;
                let b = list[remaining];
                if !b.is_open() {
                    depth += 1;
                } else if depth > 0 {
                    depth -= 1;
                } else {
                    let partner = BracketLocation {
                        line: current,
                        bracket: b,
                    };
                    return self.judge(b.character, close.character, partner);
                }
            }
            let Some((prev, prev_list)) = self.prev_scannable(current) else {
                return BracketMatch::NoMatch;
            };
            current = prev;
            list = prev_list;
            remaining = list.len();
        }
    }

    /// Match the bracket touching `caret`: a closing bracket just before the caret is matched
    /// backward, otherwise an opening bracket just after it is matched forward.
    ///
    /// Returns the origin bracket and the match outcome, or `None` if no bracket touches the
    /// caret.
    pub fn match_at_caret(
        &self,
        line: LineId,
        caret: usize,
    ) -> Option<(BracketLocation, BracketMatch)> {
        let list = self.scannable(line)?;
        if let Some(b) = caret
            .checked_sub(1)
            .and_then(|before| list.iter().find(|b| b.offset == before && !b.is_open()))
        {
            let origin = BracketLocation { line, bracket: *b };
            return Some((origin, self.match_backward(line, b.offset)));
        }
        let b = list.iter().find(|b| b.offset == caret && b.is_open())?;
        let origin = BracketLocation { line, bracket: *b };
        Some((origin, self.match_forward(line, b.offset)))
    }

    fn scan_previous_open(
        &self,
        line: LineId,
        caret: usize,
        scope: SearchScope,
        accept: impl Fn(&Bracket) -> bool,
    ) -> Option<LinePosition> {
        let mut depth = 0u32;
        let mut current = Some(line);
        while let Some(l) = current {
            if let Some(list) = self.scannable(l) {
                for b in list.iter().rev() {
                    if !accept(b) {
                        continue;
                    }
                    if l == line && !is_before_caret(b, caret) {
                        continue;
                    }
                    if !b.is_open() {
                        depth += 1;
                    } else if depth > 0 {
                        depth -= 1;
                    } else {
                        return Some(LinePosition::new(l, b.offset));
                    }
                }
            }
            if scope == SearchScope::CurrentLine {
                return None;
            }
            current = self.buffer.prev_line(l);
        }
        None
    }

    fn scan_next_close(
        &self,
        line: LineId,
        caret: usize,
        accept: impl Fn(&Bracket) -> bool,
    ) -> Option<LinePosition> {
        let mut depth = 0u32;
        let mut current = Some(line);
        while let Some(l) = current {
            if let Some(list) = self.scannable(l) {
                for b in list {
                    if !accept(b) {
                        continue;
                    }
                    if l == line && is_before_caret(b, caret) {
                        continue;
                    }
                    if b.is_open() {
                        depth += 1;
                    } else if depth > 0 {
                        depth -= 1;
                    } else {
                        return Some(LinePosition::new(l, b.end_offset()));
                    }
                }
            }
            current = self.buffer.next_line(l);
        }
        None
    }

    /// Position of the nearest unbalanced opening bracket before `caret`, of any kind.
    pub fn find_previous_open(
        &self,
        line: LineId,
        caret: usize,
        scope: SearchScope,
    ) -> Option<LinePosition> {
        self.scan_previous_open(line, caret, scope, |_| true)
    }

    /// Position just after the nearest unbalanced closing bracket after `caret`, of any kind.
    pub fn find_next_close(&self, line: LineId, caret: usize) -> Option<LinePosition> {
        self.scan_next_close(line, caret, |_| true)
    }

    /// Like [`Self::find_previous_open`], restricted to block-delimiting brackets.
    pub fn find_previous_block_open(&self, line: LineId, caret: usize) -> Option<LinePosition> {
        self.scan_previous_open(line, caret, SearchScope::Document, |b| {
            self.pairs.is_block_char(b.character)
        })
    }

    /// Like [`Self::find_next_close`], restricted to block-delimiting brackets.
    pub fn find_next_block_close(&self, line: LineId, caret: usize) -> Option<LinePosition> {
        self.scan_next_close(line, caret, |b| self.pairs.is_block_char(b.character))
    }

    /// The smallest bracketed range enclosing `caret`: from the enclosing opening bracket to
    /// just after its closing partner.
    pub fn enclosing_range(&self, line: LineId, caret: usize) -> Option<(LinePosition, LinePosition)> {
        let start = self.find_previous_open(line, caret, SearchScope::Document)?;
        let end = self.find_next_close(line, caret)?;
        Some((start, end))
    }
}

//! Visual column math.
//!
//! A visual column accounts for tab expansion (tab stops every `tab_size` cells) and for
//! wide characters (UAX #11). Converting a column back to a character offset may land
//! exactly on a character boundary, inside a multi-cell character (typically a tab), or past
//! the end of the line; [`ColumnPosition`] reports which.

use editor_meta_lang::TabSettings;
use unicode_width::UnicodeWidthChar;

/// Visual width of a non-tab character (UAX #11).
pub fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(1)
}

/// Width in cells of `ch` when it starts at visual column `column`.
pub fn cell_width_at(ch: char, column: usize, tabs: TabSettings) -> usize {
    if ch == '\t' {
        tabs.next_tab_stop(column) - column
    } else {
        char_width(ch)
    }
}

/// Result of resolving a visual column to a character offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnPosition {
    /// Character offset in the line.
    ///
    /// When the column falls inside a character this is the offset *after* that character.
    pub offset: usize,
    /// Requested column minus the column actually reached at `offset`.
    ///
    /// - `0`: exact character boundary
    /// - negative: the column falls inside the character before `offset`; `-remainder`
    ///   cells of it lie past the requested column
    /// - positive: the column lies past the end of the line by `remainder` cells
    pub remainder: isize,
}

impl ColumnPosition {
    /// The column is exactly on a character boundary.
    pub fn is_exact(&self) -> bool {
        self.remainder == 0
    }

    /// The column falls inside a multi-cell character.
    pub fn is_inside_char(&self) -> bool {
        self.remainder < 0
    }

    /// The column lies past the end of the line.
    pub fn is_past_end(&self) -> bool {
        self.remainder > 0
    }
}

/// Resolve visual `column` on `text` to a character offset.
pub fn position_at_column(text: &str, column: usize, tabs: TabSettings) -> ColumnPosition {
    let mut col = 0usize;
    let mut offset = 0usize;
    for ch in text.chars() {
        if col >= column {
            break;
        }
        col += cell_width_at(ch, col, tabs);
        offset += 1;
    }
    ColumnPosition {
        offset,
        remainder: column as isize - col as isize,
    }
}

/// Visual column of character `offset` on `text` (offsets past the end extend by one cell each).
pub fn column_at(text: &str, offset: usize, tabs: TabSettings) -> usize {
    let mut col = 0usize;
    let mut consumed = 0usize;
    for ch in text.chars().take(offset) {
        col += cell_width_at(ch, col, tabs);
        consumed += 1;
    }
    col + (offset - consumed)
}

/// Number of cells `text` occupies when it starts at `start_column`.
pub fn column_count_for_text(text: &str, start_column: usize, tabs: TabSettings) -> usize {
    let mut col = start_column;
    for ch in text.chars() {
        col += cell_width_at(ch, col, tabs);
    }
    col - start_column
}

/// Visual width of the whole line.
pub fn line_width(text: &str, tabs: TabSettings) -> usize {
    column_count_for_text(text, 0, tabs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tabs() -> TabSettings {
        TabSettings::new(4)
    }

    #[test]
    fn test_exact_boundaries() {
        let p = position_at_column("abcdef", 3, tabs());
        assert_eq!(p.offset, 3);
        assert!(p.is_exact());
        assert_eq!(position_at_column("a\tb", 4, tabs()).offset, 2);
    }

    #[test]
    fn test_inside_tab_reports_negative_remainder() {
        // "a\tb": 'a' at col 0, tab spans cols 1..4, 'b' at col 4.
        let p = position_at_column("a\tb", 2, tabs());
        assert_eq!(p.offset, 2);
        assert_eq!(p.remainder, -2);
        assert!(p.is_inside_char());
    }

    #[test]
    fn test_past_end_reports_positive_remainder() {
        let p = position_at_column("ab", 5, tabs());
        assert_eq!(p.offset, 2);
        assert_eq!(p.remainder, 3);
        assert!(p.is_past_end());
    }

    #[test]
    fn test_column_at_expands_tabs() {
        assert_eq!(column_at("\tx", 1, tabs()), 4);
        assert_eq!(column_at("ab\tx", 3, tabs()), 4);
        assert_eq!(column_at("ab", 4, tabs()), 4);
    }

    #[test]
    fn test_column_count_depends_on_start_column() {
        assert_eq!(column_count_for_text("\t", 0, tabs()), 4);
        assert_eq!(column_count_for_text("\t", 3, tabs()), 1);
        assert_eq!(column_count_for_text("ab", 7, tabs()), 2);
    }

    #[test]
    fn test_wide_characters() {
        assert_eq!(line_width("中a", tabs()), 3);
        let p = position_at_column("中a", 1, tabs());
        assert_eq!(p.offset, 1);
        assert_eq!(p.remainder, -1);
    }
}

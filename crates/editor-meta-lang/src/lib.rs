#![warn(missing_docs)]
//! `editor-meta-lang` - data-driven language configuration helpers for `editor-meta`.
//!
//! This crate intentionally stays lightweight and has no dependencies. It provides small
//! structs that hosts use to configure the metadata layer in a language-aware way:
//! which characters pair up as brackets, how wide a tab is, and which comment /
//! preprocessor tokens a simple lexer should recognize.

/// Default tab size, in visual columns.
pub const DEFAULT_TAB_SIZE: usize = 4;

/// Comment tokens for a given language.
///
/// Simple line lexers use this to skip brackets inside comments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentConfig {
    /// Line comment token (e.g. `//`, `#`).
    pub line: Option<String>,
    /// Block comment start token (e.g. `/*`).
    pub block_start: Option<String>,
    /// Block comment end token (e.g. `*/`).
    pub block_end: Option<String>,
}

impl CommentConfig {
    /// Create a config that supports only line comments.
    pub fn line(token: impl Into<String>) -> Self {
        Self {
            line: Some(token.into()),
            block_start: None,
            block_end: None,
        }
    }

    /// Create a config that supports both line and block comments.
    pub fn line_and_block(
        line: impl Into<String>,
        block_start: impl Into<String>,
        block_end: impl Into<String>,
    ) -> Self {
        Self {
            line: Some(line.into()),
            block_start: Some(block_start.into()),
            block_end: Some(block_end.into()),
        }
    }

    /// Returns the line comment token if one is configured and non-empty.
    pub fn line_token(&self) -> Option<&str> {
        self.line.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns `(start, end)` block comment tokens if both are configured and non-empty.
    pub fn block_tokens(&self) -> Option<(&str, &str)> {
        let start = self.block_start.as_deref().filter(|s| !s.is_empty())?;
        let end = self.block_end.as_deref().filter(|s| !s.is_empty())?;
        Some((start, end))
    }
}

/// A single bracket pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketPair {
    /// Opening character.
    pub open: char,
    /// Closing character.
    pub close: char,
    /// Whether this pair delimits a code block (used by "go to block start/end").
    pub block: bool,
}

impl BracketPair {
    /// Create a non-block pair.
    pub const fn new(open: char, close: char) -> Self {
        Self {
            open,
            close,
            block: false,
        }
    }

    /// Create a pair that delimits code blocks.
    pub const fn block(open: char, close: char) -> Self {
        Self {
            open,
            close,
            block: true,
        }
    }
}

/// The table of bracket pairs for a language.
///
/// Bracket matching consults this table only to decide whether a found partner has the
/// expected character (`Match` vs `Mismatch`); nesting is counted across all kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketPairs {
    pairs: Vec<BracketPair>,
}

impl BracketPairs {
    /// Create a table from explicit pairs.
    pub fn new(pairs: Vec<BracketPair>) -> Self {
        Self { pairs }
    }

    /// Add the `+`/`-` pair highlighters use to mark keyword blocks (`begin`/`end` and the like).
    pub fn with_keyword_block_pair(mut self) -> Self {
        if !self.pairs.iter().any(|p| p.open == '+') {
            self.pairs.push(BracketPair::block('+', '-'));
        }
        self
    }

    /// Add an extra pair.
    pub fn with_pair(mut self, pair: BracketPair) -> Self {
        self.pairs.push(pair);
        self
    }

    /// All configured pairs.
    pub fn pairs(&self) -> &[BracketPair] {
        &self.pairs
    }

    /// The closing character expected for `open`, if `open` is a known opening bracket.
    pub fn closing_for(&self, open: char) -> Option<char> {
        self.pairs.iter().find(|p| p.open == open).map(|p| p.close)
    }

    /// The opening character expected for `close`, if `close` is a known closing bracket.
    pub fn opening_for(&self, close: char) -> Option<char> {
        self.pairs.iter().find(|p| p.close == close).map(|p| p.open)
    }

    /// Returns `true` if `ch` opens any configured pair.
    pub fn is_open(&self, ch: char) -> bool {
        self.pairs.iter().any(|p| p.open == ch)
    }

    /// Returns `true` if `ch` closes any configured pair.
    pub fn is_close(&self, ch: char) -> bool {
        self.pairs.iter().any(|p| p.close == ch)
    }

    /// Returns `true` if `ch` belongs to a block-delimiting pair.
    pub fn is_block_char(&self, ch: char) -> bool {
        self.pairs
            .iter()
            .any(|p| p.block && (p.open == ch || p.close == ch))
    }

    /// Returns `true` if `open` and `close` form a configured pair.
    ///
    /// An opening character with no configured partner pairs with anything.
    pub fn pairs_with(&self, open: char, close: char) -> bool {
        self.closing_for(open).is_none_or(|expected| expected == close)
    }
}

impl Default for BracketPairs {
    fn default() -> Self {
        Self::new(vec![
            BracketPair::new('(', ')'),
            BracketPair::new('[', ']'),
            BracketPair::block('{', '}'),
        ])
    }
}

/// Tab settings used for visual column math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabSettings {
    /// Width of a tab stop in visual columns (always at least 1 when used).
    pub tab_size: usize,
}

impl TabSettings {
    /// Create tab settings with the given tab size.
    pub fn new(tab_size: usize) -> Self {
        Self { tab_size }
    }

    /// The effective tab size (never zero).
    pub fn effective_tab_size(&self) -> usize {
        self.tab_size.max(1)
    }

    /// Visual column reached after a tab placed at `column`.
    pub fn next_tab_stop(&self, column: usize) -> usize {
        let tab = self.effective_tab_size();
        column - (column % tab) + tab
    }
}

impl Default for TabSettings {
    fn default() -> Self {
        Self::new(DEFAULT_TAB_SIZE)
    }
}

/// Complete per-language configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
    /// Language identifier (e.g. `"cpp"`).
    pub id: String,
    /// Bracket pairs.
    pub brackets: BracketPairs,
    /// Tab settings.
    pub tabs: TabSettings,
    /// Comment tokens.
    pub comments: CommentConfig,
    /// Whether `#if`/`#else`/`#endif` style preprocessor directives are recognized.
    pub preprocessor: bool,
}

impl LanguageConfig {
    /// A plain-text configuration: default brackets and tabs, no comments.
    pub fn plain(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            brackets: BracketPairs::default(),
            tabs: TabSettings::default(),
            comments: CommentConfig::default(),
            preprocessor: false,
        }
    }

    /// A C-family configuration (`//`, `/* */`, preprocessor).
    pub fn c_like(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            brackets: BracketPairs::default(),
            tabs: TabSettings::default(),
            comments: CommentConfig::line_and_block("//", "/*", "*/"),
            preprocessor: true,
        }
    }

    /// Override the tab size.
    pub fn with_tab_size(mut self, tab_size: usize) -> Self {
        self.tabs = TabSettings::new(tab_size);
        self
    }

    /// Override the bracket table.
    pub fn with_brackets(mut self, brackets: BracketPairs) -> Self {
        self.brackets = brackets;
        self
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self::plain("text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pairs() {
        let pairs = BracketPairs::default();
        assert_eq!(pairs.closing_for('{'), Some('}'));
        assert_eq!(pairs.opening_for(']'), Some('['));
        assert!(pairs.pairs_with('(', ')'));
        assert!(!pairs.pairs_with('{', ')'));
        assert!(pairs.is_block_char('}'));
        assert!(!pairs.is_block_char(')'));
    }

    #[test]
    fn test_keyword_block_pair_added_once() {
        let pairs = BracketPairs::default()
            .with_keyword_block_pair()
            .with_keyword_block_pair();
        assert_eq!(pairs.pairs().len(), 4);
        assert!(pairs.pairs_with('+', '-'));
        assert!(pairs.is_block_char('+'));
    }

    #[test]
    fn test_tab_stops() {
        let tabs = TabSettings::new(4);
        assert_eq!(tabs.next_tab_stop(0), 4);
        assert_eq!(tabs.next_tab_stop(3), 4);
        assert_eq!(tabs.next_tab_stop(4), 8);
        assert_eq!(TabSettings::new(0).next_tab_stop(5), 6);
    }

    #[test]
    fn test_comment_tokens() {
        let c = LanguageConfig::c_like("c").comments;
        assert_eq!(c.line_token(), Some("//"));
        assert_eq!(c.block_tokens(), Some(("/*", "*/")));
        assert_eq!(CommentConfig::default().line_token(), None);
    }
}

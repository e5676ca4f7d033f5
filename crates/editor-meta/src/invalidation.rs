//! Incremental re-highlight invalidation.
//!
//! The metadata layer never computes bracket lists, fold indents or lexer state itself. An
//! external highlighter implements [`LineLexer`]; after an edit, [`rehighlight`] re-lexes the
//! dirty lines and keeps going past them only while a line's end-of-line state keeps changing
//! (which changes the input of the line after it).

use crate::buffer::{LineId, TextBuffer};
use crate::store::{Bracket, LineMetadataStore};

/// End-of-line lexer context carried from one line into the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexerContext {
    /// Opaque lexer state.
    pub state: u8,
    /// Block bracket nesting depth.
    pub brace_depth: i32,
}

/// Everything a highlighter derives for one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineUpdate {
    /// Brackets in the line, left to right.
    pub parentheses: Vec<Bracket>,
    /// Fold nesting level of the line.
    pub folding_indent: u32,
    /// Show the region's first character in the collapsed placeholder.
    pub folding_start_included: bool,
    /// Show the region's last character in the collapsed placeholder.
    pub folding_end_included: bool,
    /// Lexer state at the end of the line.
    pub lexer_state: u8,
    /// Block bracket depth at the end of the line.
    pub brace_depth: i32,
    /// The line is inside an inactive preprocessor branch.
    pub ifdefed_out: bool,
}

impl LineUpdate {
    /// The context this update hands to the next line.
    pub fn context(&self) -> LexerContext {
        LexerContext {
            state: self.lexer_state,
            brace_depth: self.brace_depth,
        }
    }
}

/// A line-at-a-time highlighter.
pub trait LineLexer {
    /// Lex one line given the context left by the previous line.
    fn lex_line(&mut self, text: &str, previous: LexerContext) -> LineUpdate;
}

/// Write `update` into the metadata of `line`.
///
/// Returns `true` if the line's end-of-line context (lexer state or brace depth) changed.
pub fn apply_line_update(store: &mut LineMetadataStore, line: LineId, update: LineUpdate) -> bool {
    let state_changed = store.set_lexer_state(line, update.lexer_state);
    let depth_changed = store.set_brace_depth(line, update.brace_depth);
    store.set_parentheses(line, update.parentheses);
    store.set_folding_indent(line, update.folding_indent);
    store.set_folding_markers(
        line,
        update.folding_start_included,
        update.folding_end_included,
    );
    store.set_ifdefed_out(line, update.ifdefed_out);
    state_changed || depth_changed
}

/// Lines covered by one [`rehighlight`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RehighlightRange {
    /// First re-lexed line.
    pub first: LineId,
    /// Last re-lexed line.
    pub last: LineId,
    /// Number of re-lexed lines.
    pub lines: usize,
}

/// Re-lex `first_dirty..=last_dirty`, then continue until a line's stored end-of-line context
/// comes out unchanged.
///
/// Returns `None` if `first_dirty` is stale.
pub fn rehighlight<B, L>(
    buffer: &B,
    store: &mut LineMetadataStore,
    lexer: &mut L,
    first_dirty: LineId,
    last_dirty: LineId,
) -> Option<RehighlightRange>
where
    B: TextBuffer + ?Sized,
    L: LineLexer + ?Sized,
{
    let first_number = buffer.line_number(first_dirty)?;
    let last_number = buffer
        .line_number(last_dirty)
        .map_or(first_number, |n| n.max(first_number));

    let mut context = buffer
        .prev_line(first_dirty)
        .map(|prev| LexerContext {
            state: store.lexer_state(prev),
            brace_depth: store.brace_depth(prev),
        })
        .unwrap_or_default();

    let mut number = first_number;
    let mut last = first_dirty;
    let mut count = 0;
    while let Some(line) = buffer.line_at(number) {
        let text = buffer.line_text(line).unwrap_or_default();
        let update = lexer.lex_line(&text, context);
        context = update.context();
        let changed = apply_line_update(store, line, update);
        last = line;
        count += 1;
        if number >= last_number && !changed {
            break;
        }
        number += 1;
    }

    tracing::debug!(
        first = first_number,
        dirty_until = last_number,
        relexed = count,
        "Re-highlighted lines"
    );
    Some(RehighlightRange {
        first: first_dirty,
        last,
        lines: count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RopeBuffer;

    /// Counts `{`/`}` and reports the running depth as lexer state.
    struct DepthLexer {
        calls: usize,
    }

    impl LineLexer for DepthLexer {
        fn lex_line(&mut self, text: &str, previous: LexerContext) -> LineUpdate {
            self.calls += 1;
            let mut depth = previous.brace_depth;
            let mut parentheses = Vec::new();
            for (i, ch) in text.chars().enumerate() {
                match ch {
                    '{' => {
                        depth += 1;
                        parentheses.push(Bracket::open('{', i));
                    }
                    '}' => {
                        depth -= 1;
                        parentheses.push(Bracket::close('}', i));
                    }
                    _ => {}
                }
            }
            LineUpdate {
                parentheses,
                folding_indent: previous.brace_depth.max(0) as u32,
                lexer_state: depth.clamp(0, 255) as u8,
                brace_depth: depth,
                ..LineUpdate::default()
            }
        }
    }

    #[test]
    fn test_stops_once_context_settles() {
        let mut buffer = RopeBuffer::from_lines(&["a", "b", "c", "d"]);
        let mut store = LineMetadataStore::new();
        let mut lexer = DepthLexer { calls: 0 };
        let first = buffer.first_line().unwrap();
        let last = buffer.last_line().unwrap();
        rehighlight(&buffer, &mut store, &mut lexer, first, last).unwrap();
        assert_eq!(lexer.calls, 4);

        // Editing line 1 without changing its end context re-lexes only that line.
        let second = buffer.line_at(1).unwrap();
        buffer.set_line_text(second, "bb");
        lexer.calls = 0;
        let range = rehighlight(&buffer, &mut store, &mut lexer, second, second).unwrap();
        assert_eq!(lexer.calls, 1);
        assert_eq!(range.last, second);

        // Opening a brace changes every following line's context.
        buffer.set_line_text(second, "{");
        lexer.calls = 0;
        let range = rehighlight(&buffer, &mut store, &mut lexer, second, second).unwrap();
        assert_eq!(lexer.calls, 3);
        assert_eq!(range.last, last);
        assert_eq!(store.folding_indent(last), 1);
    }
}

//! `editor-meta-highlight-simple` - a small line lexer for `editor-meta`.
//!
//! [`CLikeLexer`] implements [`LineLexer`] for C-family text. It is not a parser: it only finds
//! what the metadata layer consumes.
//!
//! - brackets outside comments and string/char literals
//! - fold indents derived from block bracket depth
//! - `#if 0` regions, reported as ifdefed-out lines
//! - optional keyword blocks (`begin`/`end` style), reported as the `+`/`-` bracket pair
//!
//! The lexer state byte packs two things: bit 0 is set while inside a block comment, the upper
//! seven bits hold the nesting depth of inactive preprocessor branches.

use editor_meta::{Bracket, LexerContext, LineLexer, LineUpdate};
use editor_meta_lang::{BracketPairs, CommentConfig, LanguageConfig};
use regex::Regex;

const IN_BLOCK_COMMENT: u8 = 1;
const MAX_INACTIVE_DEPTH: u8 = u8::MAX >> 1;

fn decode_state(state: u8) -> (bool, u8) {
    (state & IN_BLOCK_COMMENT != 0, state >> 1)
}

fn encode_state(in_comment: bool, inactive: u8) -> u8 {
    (inactive.min(MAX_INACTIVE_DEPTH) << 1) | u8::from(in_comment)
}

/// A recognized preprocessor directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    /// `#if`, `#ifdef`, `#ifndef`; `disabled` for a literal `#if 0`.
    If { disabled: bool },
    /// `#else`, `#elif`.
    Else,
    /// `#endif`.
    EndIf,
}

/// Keyword pair lexed as a block bracket pair.
#[derive(Debug, Clone)]
struct KeywordBlocks {
    open: Regex,
    close: Regex,
}

/// Line lexer for C-like languages.
#[derive(Debug, Clone)]
pub struct CLikeLexer {
    pairs: BracketPairs,
    comments: CommentConfig,
    preprocessor: bool,
    directive: Regex,
    disabled_if: Regex,
    keywords: Option<KeywordBlocks>,
}

impl CLikeLexer {
    /// Build a lexer from a language configuration.
    pub fn new(config: &LanguageConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            pairs: config.brackets.clone(),
            comments: config.comments.clone(),
            preprocessor: config.preprocessor,
            directive: Regex::new(r"^\s*#\s*(ifdef|ifndef|if|elif|else|endif)\b")?,
            disabled_if: Regex::new(r"^\s*#\s*if\s+0\b")?,
            keywords: None,
        })
    }

    /// Also lex whole-word `open`/`close` keywords as a block pair (`+`/`-`).
    ///
    /// The document's bracket table should carry the same pair
    /// ([`BracketPairs::with_keyword_block_pair`]) for matching to pair them up.
    pub fn with_keyword_blocks(mut self, open: &str, close: &str) -> Result<Self, regex::Error> {
        self.keywords = Some(KeywordBlocks {
            open: Regex::new(&format!(r"\b{}\b", regex::escape(open)))?,
            close: Regex::new(&format!(r"\b{}\b", regex::escape(close)))?,
        });
        self.pairs = self.pairs.clone().with_keyword_block_pair();
        Ok(self)
    }

    fn directive(&self, text: &str) -> Option<Directive> {
        let caps = self.directive.captures(text)?;
        let directive = match caps.get(1)?.as_str() {
            "if" | "ifdef" | "ifndef" => Directive::If {
                disabled: self.disabled_if.is_match(text),
            },
            "elif" | "else" => Directive::Else,
            _ => Directive::EndIf,
        };
        Some(directive)
    }

    /// Char offsets and lengths of keyword block tokens, sorted by offset.
    fn keyword_tokens(&self, text: &str) -> Vec<(usize, usize, char)> {
        let Some(keywords) = &self.keywords else {
            return Vec::new();
        };
        let char_offset = |byte: usize| text[..byte].chars().count();
        let mut tokens: Vec<(usize, usize, char)> = keywords
            .open
            .find_iter(text)
            .map(|m| (char_offset(m.start()), m.as_str().chars().count(), '+'))
            .chain(
                keywords
                    .close
                    .find_iter(text)
                    .map(|m| (char_offset(m.start()), m.as_str().chars().count(), '-')),
            )
            .collect();
        tokens.sort_unstable_by_key(|t| t.0);
        tokens
    }

    fn lex_code(&self, text: &str, previous: LexerContext, in_comment: bool) -> LineUpdate {
        let chars: Vec<char> = text.chars().collect();
        let keywords = self.keyword_tokens(text);
        let line_comment: Option<Vec<char>> =
            self.comments.line_token().map(|t| t.chars().collect());
        let block_comment: Option<(Vec<char>, Vec<char>)> = self
            .comments
            .block_tokens()
            .map(|(s, e)| (s.chars().collect(), e.chars().collect()));

        let mut scan = LineScan::new(previous.brace_depth);
        let mut in_comment = in_comment;
        let mut i = 0;
        while i < chars.len() {
            if in_comment {
                match &block_comment {
                    Some((_, end)) if starts_with_at(&chars, i, end) => {
                        in_comment = false;
                        i += end.len();
                    }
                    Some(_) => i += 1,
                    // Block comments are not configured; the state is stale.
                    None => in_comment = false,
                }
                continue;
            }

            let ch = chars[i];
            if ch.is_whitespace() {
                i += 1;
                continue;
            }
            if line_comment
                .as_ref()
                .is_some_and(|t| starts_with_at(&chars, i, t))
            {
                break;
            }
            if let Some((start, _)) = &block_comment
                && starts_with_at(&chars, i, start)
            {
                in_comment = true;
                i += start.len();
                continue;
            }
            if ch == '"' || ch == '\'' {
                i = skip_literal(&chars, i);
                scan.first_token = false;
                continue;
            }
            if let Some(&(_, len, kw)) = keywords.iter().find(|t| t.0 == i) {
                let last = self.is_last_token(&chars, i + len, line_comment.as_deref());
                scan.bracket(&self.pairs, kw, i, last);
                i += len;
                continue;
            }
            if self.is_bracket_char(ch) {
                let last = self.is_last_token(&chars, i + 1, line_comment.as_deref());
                scan.bracket(&self.pairs, ch, i, last);
            } else {
                scan.first_token = false;
            }
            i += 1;
        }

        let (_, inactive) = decode_state(previous.state);
        LineUpdate {
            parentheses: scan.parentheses,
            folding_indent: scan.indent,
            folding_start_included: scan.start_included,
            folding_end_included: scan.end_included,
            lexer_state: encode_state(in_comment, inactive),
            brace_depth: scan.depth,
            ifdefed_out: false,
        }
    }

    /// `+` and `-` are reserved for keyword blocks and never lexed as characters.
    fn is_bracket_char(&self, ch: char) -> bool {
        ch != '+' && ch != '-' && (self.pairs.is_open(ch) || self.pairs.is_close(ch))
    }

    /// Nothing but whitespace, a `;` or a line comment follows `from`.
    fn is_last_token(&self, chars: &[char], from: usize, line_comment: Option<&[char]>) -> bool {
        let Some(next) = (from..chars.len()).find(|&j| !chars[j].is_whitespace()) else {
            return true;
        };
        chars[next] == ';' || line_comment.is_some_and(|t| starts_with_at(chars, next, t))
    }
}

/// Running state while scanning one line.
struct LineScan {
    parentheses: Vec<Bracket>,
    depth: i32,
    indent: u32,
    start_included: bool,
    end_included: bool,
    first_token: bool,
}

impl LineScan {
    fn new(start_depth: i32) -> Self {
        Self {
            parentheses: Vec::new(),
            depth: start_depth,
            indent: start_depth.max(0) as u32,
            start_included: false,
            end_included: false,
            first_token: true,
        }
    }

    fn bracket(&mut self, pairs: &BracketPairs, ch: char, offset: usize, last_token: bool) {
        let block = pairs.is_block_char(ch);
        if pairs.is_open(ch) {
            self.parentheses.push(Bracket::open(ch, offset));
            if block {
                self.depth += 1;
                // A block opened by the line's first token belongs to the block.
                if self.first_token {
                    self.indent += 1;
                    self.start_included = true;
                }
            }
        } else {
            self.parentheses.push(Bracket::close(ch, offset));
            if block {
                self.depth -= 1;
                if self.depth < self.indent as i32 {
                    self.indent = self.depth.max(0) as u32;
                    if last_token {
                        self.end_included = true;
                    }
                }
            }
        }
        self.first_token = false;
    }
}

fn starts_with_at(chars: &[char], at: usize, token: &[char]) -> bool {
    !token.is_empty() && chars.get(at..at + token.len()) == Some(token)
}

/// Offset just past the string or char literal opening at `start`.
fn skip_literal(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

impl LineLexer for CLikeLexer {
    fn lex_line(&mut self, text: &str, previous: LexerContext) -> LineUpdate {
        let (in_comment, inactive_before) = decode_state(previous.state);
        let passthrough = |inactive: u8, ifdefed_out: bool| LineUpdate {
            folding_indent: previous.brace_depth.max(0) as u32,
            lexer_state: encode_state(in_comment, inactive),
            brace_depth: previous.brace_depth,
            ifdefed_out,
            ..LineUpdate::default()
        };

        if self.preprocessor
            && !in_comment
            && let Some(directive) = self.directive(text)
        {
            let inactive = match directive {
                Directive::If { .. } if inactive_before > 0 => {
                    inactive_before.saturating_add(1).min(MAX_INACTIVE_DEPTH)
                }
                Directive::If { disabled } => u8::from(disabled),
                Directive::Else if inactive_before == 1 => 0,
                Directive::Else => inactive_before,
                Directive::EndIf => inactive_before.saturating_sub(1),
            };
            if inactive != inactive_before {
                tracing::trace!(
                    ?directive,
                    from = inactive_before,
                    to = inactive,
                    "Inactive preprocessor depth changed"
                );
            }
            return passthrough(inactive, inactive_before > 0 && inactive > 0);
        }

        if inactive_before > 0 {
            return passthrough(inactive_before, true);
        }
        self.lex_code(text, previous, in_comment)
    }
}

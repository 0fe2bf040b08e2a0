// ABOUTME: Cursor over the tokens of a single tag with position save/restore
// ABOUTME: Provides keyword tests on the raw tag and trie-style multi-token lookup

use super::token::{tokenize, Token, TokenPattern};
use crate::compiler::error::{Result, TemplateError};

/// One level of a multi-token lookup table
#[derive(Debug)]
pub struct AssocNode<T: 'static> {
    pub value: Option<T>,
    pub children: &'static [(&'static str, AssocNode<T>)],
}

/// Saved cursor position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position(usize);

#[derive(Debug, Clone)]
pub struct TagCursor {
    raw: String,
    line: u32,
    tokens: Vec<Token>,
    pos: usize,
}

impl TagCursor {
    /// Create a cursor for the content between two delimiters
    pub fn new(raw: impl Into<String>, line: u32) -> Self {
        Self {
            raw: raw.into(),
            line,
            tokens: Vec::new(),
            pos: 0,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Line the tag starts on
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Whether the trimmed tag starts with `word` followed by a non-identifier character
    pub fn starts_with_word(&self, word: &str) -> bool {
        let content = self.raw.trim_start();
        match content.get(..word.len()) {
            Some(head) if head.eq_ignore_ascii_case(word) => !content[word.len()..]
                .starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_'),
            _ => false,
        }
    }

    /// Whether the trimmed tag is exactly `word`
    pub fn is_word(&self, word: &str) -> bool {
        self.raw.trim().eq_ignore_ascii_case(word)
    }

    pub fn begins_with(&self, prefix: &str) -> bool {
        self.raw.trim_start().starts_with(prefix)
    }

    pub fn ends_with(&self, suffix: &str) -> bool {
        self.raw.trim_end().ends_with(suffix)
    }

    /// Split the raw tag into tokens and move to the first significant one
    pub fn tokenize(&mut self, pattern: TokenPattern) -> Result<()> {
        self.tokens = tokenize(&self.raw, self.line, pattern);
        self.pos = 0;
        self.skip_whitespace();

        if self.is_finished() {
            return Err(TemplateError::parsing(self.line, "tag was empty"));
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while self
            .tokens
            .get(self.pos)
            .is_some_and(Token::is_whitespace)
        {
            self.pos += 1;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub fn text(&self) -> Option<&str> {
        self.current().map(|token| token.text.as_str())
    }

    /// Whether the current token equals `text`
    pub fn at(&self, text: &str) -> bool {
        self.text() == Some(text)
    }

    /// Whether the current token equals `text`, ignoring ASCII case
    pub fn at_word(&self, word: &str) -> bool {
        self.text().is_some_and(|t| t.eq_ignore_ascii_case(word))
    }

    /// Line of the current token, or of the last token once finished
    pub fn current_line(&self) -> u32 {
        self.current()
            .or_else(|| self.tokens.last())
            .map(|token| token.line)
            .unwrap_or(self.line)
    }

    /// Next significant token after the current one
    pub fn peek(&self) -> Option<&Token> {
        self.tokens
            .iter()
            .skip(self.pos + 1)
            .find(|token| !token.is_whitespace())
    }

    /// Whether the current token directly follows the previous one, with no whitespace between
    pub fn glued(&self) -> bool {
        self.pos > 0
            && self
                .tokens
                .get(self.pos - 1)
                .is_some_and(|token| !token.is_whitespace())
    }

    /// Whether the current token is `text` and directly follows the previous one
    pub fn glued_at(&self, text: &str) -> bool {
        self.glued() && self.at(text)
    }

    /// Move to the next significant token
    pub fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
            self.skip_whitespace();
        }
    }

    /// Consume the current token, which must equal `expected`
    pub fn expect(&mut self, expected: &str) -> Result<()> {
        match self.text() {
            Some(text) if text == expected => {
                self.advance();
                Ok(())
            }
            Some(text) => Err(TemplateError::parsing(
                self.current_line(),
                format!("expected '{}' but got '{}'", expected, text),
            )),
            None => Err(TemplateError::parsing(
                self.current_line(),
                format!("expected '{}' but reached the end of the tag", expected),
            )),
        }
    }

    /// Consume tokens up to `end`, returning their raw text with whitespace kept
    pub fn take_raw_until(&mut self, end: &str) -> Option<String> {
        let offset = self.tokens[self.pos.min(self.tokens.len())..]
            .iter()
            .position(|token| token.text == end)?;
        let raw: String = self.tokens[self.pos..self.pos + offset]
            .iter()
            .map(|token| token.text.as_str())
            .collect();
        self.pos += offset;
        Some(raw)
    }

    pub fn position(&self) -> Position {
        Position(self.pos)
    }

    pub fn restore(&mut self, position: Position) {
        self.pos = position.0;
    }

    /// Look up a multi-token phrase, rolling back when no complete entry matches
    pub fn map_assoc<T: Copy>(&mut self, root: &AssocNode<T>) -> Option<T> {
        let start = self.position();
        let mut node = root;
        let mut depth = 0;

        while let Some(text) = self.text() {
            match node.children.iter().find(|(key, _)| key.eq_ignore_ascii_case(text)) {
                Some((_, child)) => {
                    node = child;
                    depth += 1;
                    self.advance();
                }
                None => break,
            }
        }

        match (depth, node.value) {
            (0, _) | (_, None) => {
                self.restore(start);
                None
            }
            (_, Some(value)) => Some(value),
        }
    }
}

// ABOUTME: Template source scanner separating literal text from delimited tag regions
// ABOUTME: Tracks source lines and skips delimiters that appear inside quoted strings within tags

use super::token::newlines;
use crate::compiler::error::{Result, TemplateError};

/// A piece of template source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk<'a> {
    Text { text: &'a str, line: u32 },
    Tag { content: &'a str, line: u32 },
}

#[derive(Debug)]
pub struct Scanner<'a> {
    source: &'a str,
    start: &'a str,
    end: &'a str,
    pos: usize,
    line: u32,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str, start: &'a str, end: &'a str, first_line: u32) -> Self {
        Self {
            source,
            start,
            end,
            pos: 0,
            line: first_line,
        }
    }

    /// Find the end delimiter of a tag whose content starts at `from`
    fn find_tag_end(&self, from: usize) -> Option<usize> {
        let bytes = self.source.as_bytes();
        let end = self.end.as_bytes();
        let mut i = from;
        let mut quote: Option<u8> = None;

        while i < bytes.len() {
            match quote {
                Some(q) => {
                    if bytes[i] == b'\\' {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == q {
                        quote = None;
                    }
                }
                None => {
                    if bytes[i..].starts_with(end) {
                        return Some(i);
                    }
                    if bytes[i] == b'\'' || bytes[i] == b'"' {
                        quote = Some(bytes[i]);
                    }
                }
            }
            i += 1;
        }

        // An unbalanced quote inside the tag falls back to the first end delimiter
        quote.and_then(|_| self.source[from..].find(self.end).map(|offset| from + offset))
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.source.len() {
            return None;
        }

        let rest = &self.source[self.pos..];
        match rest.find(self.start) {
            Some(0) => {
                let content_start = self.pos + self.start.len();
                let tag_line = self.line;
                match self.find_tag_end(content_start) {
                    Some(content_end) => {
                        let content = &self.source[content_start..content_end];
                        self.line += newlines(content);
                        self.pos = content_end + self.end.len();
                        Some(Ok(Chunk::Tag {
                            content,
                            line: tag_line,
                        }))
                    }
                    None => {
                        self.pos = self.source.len();
                        Some(Err(TemplateError::parsing(tag_line, "unterminated tag")))
                    }
                }
            }
            Some(offset) => {
                let text = &rest[..offset];
                let line = self.line;
                self.line += newlines(text);
                self.pos += offset;
                Some(Ok(Chunk::Text { text, line }))
            }
            None => {
                let line = self.line;
                self.line += newlines(rest);
                self.pos = self.source.len();
                Some(Ok(Chunk::Text { text: rest, line }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Chunk<'_>> {
        Scanner::new(source, "{", "}", 1)
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_text_and_tags() {
        let chunks = scan("Hello {$name}!\n{if $a}x{/if}");
        assert_eq!(
            chunks,
            vec![
                Chunk::Text {
                    text: "Hello ",
                    line: 1
                },
                Chunk::Tag {
                    content: "$name",
                    line: 1
                },
                Chunk::Text {
                    text: "!\n",
                    line: 1
                },
                Chunk::Tag {
                    content: "if $a",
                    line: 2
                },
                Chunk::Text { text: "x", line: 2 },
                Chunk::Tag {
                    content: "/if",
                    line: 2
                },
            ]
        );
    }

    #[test]
    fn test_delimiters_inside_quotes() {
        let chunks = scan(r#"{"Hi {$user}!"} and {'}'}"#);
        assert_eq!(
            chunks[0],
            Chunk::Tag {
                content: r#""Hi {$user}!""#,
                line: 1
            }
        );
        assert_eq!(
            chunks[2],
            Chunk::Tag {
                content: "'}'",
                line: 1
            }
        );
    }

    #[test]
    fn test_custom_delimiters_and_lines() {
        let chunks: Vec<_> = Scanner::new("a\n<%\n$x\n%>b", "<%", "%>", 10)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(
            chunks[1],
            Chunk::Tag {
                content: "\n$x\n",
                line: 11
            }
        );
        assert_eq!(chunks[2], Chunk::Text { text: "b", line: 13 });
    }

    #[test]
    fn test_multibyte_text_inside_and_outside_tags() {
        let chunks = scan("Grüße {* Kommentar über *}é{'ü}'}ß");
        assert_eq!(
            chunks,
            vec![
                Chunk::Text {
                    text: "Grüße ",
                    line: 1
                },
                Chunk::Tag {
                    content: "* Kommentar über *",
                    line: 1
                },
                Chunk::Text { text: "é", line: 1 },
                Chunk::Tag {
                    content: "'ü}'",
                    line: 1
                },
                Chunk::Text { text: "ß", line: 1 },
            ]
        );

        let chunks: Vec<_> = Scanner::new("{é»x»", "{", "»", 1)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(
            chunks[0],
            Chunk::Tag {
                content: "é",
                line: 1
            }
        );
    }

    #[test]
    fn test_unterminated_tag() {
        let result: Result<Vec<_>> = Scanner::new("ok\n{$a", "{", "}", 1).collect();
        let err = result.unwrap_err();
        assert_eq!(err.line(), 2);
        assert!(err.to_string().contains("unterminated tag"));
    }
}

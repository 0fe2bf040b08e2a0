// ABOUTME: Parser module for template source and tag content
// ABOUTME: Exports the source scanner, the tag tokenizer and the tag cursor

pub mod cursor;
pub mod scanner;
pub mod token;

pub use cursor::{AssocNode, Position, TagCursor};
pub use scanner::{Chunk, Scanner};
pub use token::{is_name, tokenize, Token, TokenPattern};

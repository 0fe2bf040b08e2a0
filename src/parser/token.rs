// ABOUTME: Tokenizer splitting tag content into lexemes with their source lines
// ABOUTME: Uses a fixed base pattern optionally extended with conditional operators

use once_cell::sync::Lazy;
use regex::Regex;

/// Property marker, identifier, number, quoted strings, then any single character
const BASE_PATTERN: &str =
    r#"->|[A-Za-z_][A-Za-z0-9_]*|[0-9]+(?:\.[0-9]+)?|'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*""#;

/// Operators recognized inside conditional tags, longest first
pub const CONDITIONAL_OPERATORS: &[&str] = &["===", "!==", "==", "!=", ">=", "<=", "||", "&&"];

static BASE: Lazy<Regex> = Lazy::new(|| build_regex(&[]));

static CONDITIONAL: Lazy<Regex> = Lazy::new(|| build_regex(CONDITIONAL_OPERATORS));

fn build_regex(operators: &[&str]) -> Regex {
    let mut pattern = format!(r"(?s)\s+|{}", BASE_PATTERN);
    for operator in operators {
        pattern.push('|');
        pattern.push_str(&regex::escape(operator));
    }
    pattern.push_str("|.");
    Regex::new(&pattern).expect("token pattern is a valid regex")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPattern {
    Base,
    Conditional,
}

impl TokenPattern {
    fn regex(self) -> &'static Regex {
        match self {
            TokenPattern::Base => &BASE,
            TokenPattern::Conditional => &CONDITIONAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub line: u32,
}

impl Token {
    pub fn is_whitespace(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }

    pub fn is_identifier(&self) -> bool {
        is_name(&self.text)
    }

    pub fn is_number(&self) -> bool {
        self.text.starts_with(|c: char| c.is_ascii_digit())
    }
}

/// Split tag content into tokens, keeping whitespace runs as their own tokens
pub fn tokenize(source: &str, first_line: u32, pattern: TokenPattern) -> Vec<Token> {
    let mut line = first_line;
    pattern
        .regex()
        .find_iter(source)
        .map(|found| {
            let token = Token {
                text: found.as_str().to_string(),
                line,
            };
            line += newlines(found.as_str());
            token
        })
        .collect()
}

/// Whether `text` is a valid variable, dsn or id name
pub fn is_name(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn newlines(text: &str) -> u32 {
    u32::try_from(text.matches('\n').count()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str, pattern: TokenPattern) -> Vec<String> {
        tokenize(source, 1, pattern)
            .into_iter()
            .filter(|t| !t.is_whitespace())
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_base_tokens() {
        assert_eq!(
            texts("$user->name('a b', 2.5)", TokenPattern::Base),
            vec!["$", "user", "->", "name", "(", "'a b'", ",", "2.5", ")"]
        );
    }

    #[test]
    fn test_escaped_quotes_stay_in_one_token() {
        assert_eq!(
            texts(r#""say \"hi\"" 'it\'s'"#, TokenPattern::Base),
            vec![r#""say \"hi\"""#, r"'it\'s'"]
        );
    }

    #[test]
    fn test_conditional_operators() {
        assert_eq!(
            texts("$a===1&&$b!=2||$c<=3", TokenPattern::Conditional),
            vec!["$", "a", "===", "1", "&&", "$", "b", "!=", "2", "||", "$", "c", "<=", "3"]
        );
        assert_eq!(
            texts("$a&&$b", TokenPattern::Base),
            vec!["$", "a", "&", "&", "$", "b"]
        );
    }

    #[test]
    fn test_whitespace_tokens_and_lines() {
        let tokens = tokenize("$a\n  and\n$b", 4, TokenPattern::Base);
        let and = tokens.iter().find(|t| t.text == "and").unwrap();
        let b = tokens.iter().find(|t| t.text == "b").unwrap();
        assert_eq!(and.line, 5);
        assert_eq!(b.line, 6);
        assert!(tokens.iter().any(Token::is_whitespace));
    }

    #[test]
    fn test_token_classes() {
        let tokens = tokenize("abc 12 _x", 1, TokenPattern::Base);
        assert!(tokens[0].is_identifier());
        assert!(tokens[2].is_number());
        assert!(tokens[4].is_identifier());
        assert!(!tokens[2].is_identifier());
        assert!(is_name("Page_2"));
        assert!(!is_name("2page"));
        assert!(!is_name("my-var"));
    }
}

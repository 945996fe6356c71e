//! Tokenizer for the expression language.

use super::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    At,
    Dot,
    Comma,
    LParen,
    RParen,
    Semicolon,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    BangEqual,
    BangEqualEqual,
    EqualEqual,
    EqualEqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AndAnd,
    OrOr,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Tokenize expression text. The returned list always ends with `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer { source, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let offset = self.pos;
            let Some(ch) = self.bump() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    offset,
                });
                return Ok(tokens);
            };

            let kind = match ch {
                '0'..='9' => self.number(offset)?,
                '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.number(offset)?,
                '"' | '\'' => self.string(ch, offset)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.identifier(offset),
                '@' => TokenKind::At,
                '.' => TokenKind::Dot,
                ',' => TokenKind::Comma,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ';' => TokenKind::Semicolon,
                '?' => TokenKind::Question,
                ':' => TokenKind::Colon,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' if self.eat('*') => TokenKind::StarStar,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '%' => TokenKind::Percent,
                '!' if self.eat('=') => {
                    if self.eat('=') {
                        TokenKind::BangEqualEqual
                    } else {
                        TokenKind::BangEqual
                    }
                }
                '!' => TokenKind::Bang,
                '=' if self.eat('=') => {
                    if self.eat('=') {
                        TokenKind::EqualEqualEqual
                    } else {
                        TokenKind::EqualEqual
                    }
                }
                '<' if self.eat('=') => TokenKind::LessEqual,
                '<' => TokenKind::Less,
                '>' if self.eat('=') => TokenKind::GreaterEqual,
                '>' => TokenKind::Greater,
                '&' if self.eat('&') => TokenKind::AndAnd,
                '|' if self.eat('|') => TokenKind::OrOr,
                other => {
                    return Err(ParseError::new(
                        format!("Unexpected character '{}'", other),
                        offset,
                    ));
                }
            };
            tokens.push(Token { kind, offset });
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.pos;
                    self.pos += 2;
                    match self.source[self.pos..].find("*/") {
                        Some(end) => self.pos += end + 2,
                        None => return Err(ParseError::new("Unterminated comment", start)),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_at(1).is_none_or(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
                if sign {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }

        let text = &self.source[start..self.pos];
        if self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            return Err(ParseError::new(
                format!("Invalid number literal '{}'", text),
                start,
            ));
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| ParseError::new(format!("Invalid number literal '{}'", text), start))
    }

    fn string(&mut self, quote: char, start: usize) -> Result<TokenKind, ParseError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::new("Unterminated string", start)),
                Some(c) if c == quote => return Ok(TokenKind::Str(value)),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some(c) => value.push(c),
                    None => return Err(ParseError::new("Unterminated string", start)),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn identifier(&mut self, start: usize) -> TokenKind {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        TokenKind::Ident(self.source[start..self.pos].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenizes_operators() {
        assert_eq!(
            kinds("a ** 2 >= b && !c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::StarStar,
                TokenKind::Number(2.0),
                TokenKind::GreaterEqual,
                TokenKind::Ident("b".into()),
                TokenKind::AndAnd,
                TokenKind::Bang,
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("1 === 1 !== 2"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::EqualEqualEqual,
                TokenKind::Number(1.0),
                TokenKind::BangEqualEqual,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenizes_numbers() {
        assert_eq!(kinds("3.25")[0], TokenKind::Number(3.25));
        assert_eq!(kinds(".5")[0], TokenKind::Number(0.5));
        assert_eq!(kinds("1e3")[0], TokenKind::Number(1000.0));
        assert_eq!(kinds("2.5E-1")[0], TokenKind::Number(0.25));
        assert!(tokenize("12abc").is_err());
    }

    #[test]
    fn test_tokenizes_strings_with_escapes() {
        assert_eq!(kinds(r#""a\"b""#)[0], TokenKind::Str("a\"b".into()));
        assert_eq!(kinds(r"'x\ny'")[0], TokenKind::Str("x\ny".into()));
        let err = tokenize("'open").unwrap_err();
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_skips_comments() {
        assert_eq!(
            kinds("1 // trailing\n + /* inline */ 2"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Plus,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
        assert!(tokenize("1 /* open").is_err());
    }

    #[test]
    fn test_rejects_single_equals() {
        let err = tokenize("a = 1").unwrap_err();
        assert_eq!(err.offset, 2);
    }
}

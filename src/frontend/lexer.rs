//! Lexer for Carbide
//!
//! Converts source code into a stream of tokens.
#![allow(dead_code)]

use crate::frontend::token::{StringPart, Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// The lexer state
pub struct Lexer {
    /// Source code as characters
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    /// Current line (1-based)
    line: u32,
    /// Current column (1-based)
    col: u32,
    /// Span at the start of the current token
    start_span: Span,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            start_span: Span::new(1, 1),
        }
    }

    /// Get the current character without advancing
    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    /// Get the next character without advancing
    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        match c {
            Some('\n') => {
                self.line += 1;
                self.col = 1;
            }
            Some(_) => self.col += 1,
            None => {}
        }
        c
    }

    /// Check if we've reached the end of input
    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Create a token spanning from the current token start
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.start_span)
    }

    /// Skip whitespace and comments
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                // Whitespace
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                // Line comment
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                // Block comment (nesting allowed)
                '/' if self.peek_next() == Some('*') => {
                    self.advance(); // skip /
                    self.advance(); // skip *
                    let mut depth = 1;
                    while depth > 0 && !self.is_at_end() {
                        match (self.peek(), self.peek_next()) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                depth -= 1;
                            }
                            (Some('/'), Some('*')) => {
                                self.advance();
                                self.advance();
                                depth += 1;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.source[start..self.pos].iter().collect();

        let kind = TokenKind::keyword_from_str(&text).unwrap_or(TokenKind::Ident(text));

        self.make_token(kind)
    }

    /// Read a number literal (integer or float)
    fn read_number(&mut self) -> Token {
        let start = self.pos;

        // Hex literal
        if self.peek() == Some('0') && matches!(self.peek_next(), Some('x') | Some('X')) {
            self.advance(); // 0
            self.advance(); // x

            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() || c == '_' {
                    self.advance();
                } else {
                    break;
                }
            }

            let text: String = self.source[start..self.pos]
                .iter()
                .filter(|&&c| c != '_')
                .collect();

            let value = i64::from_str_radix(&text[2..], 16).unwrap_or(0);
            return self.make_token(TokenKind::IntLit(value));
        }

        // Regular decimal number
        let mut is_float = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        // Decimal point, but not a `..` range
        if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.advance(); // consume '.'

            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        let text: String = self.source[start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();

        if is_float {
            self.make_token(TokenKind::FloatLit(text.parse().unwrap_or(0.0)))
        } else {
            self.make_token(TokenKind::IntLit(text.parse().unwrap_or(0)))
        }
    }

    /// Read a string literal, splitting out `${...}` interpolation segments
    fn read_string(&mut self) -> Result<Token> {
        self.advance(); // opening quote

        let mut parts: Vec<StringPart> = Vec::new();
        let mut buf = String::new();

        loop {
            match self.peek() {
                None => {
                    return Err(Error::UnterminatedString {
                        span: self.start_span,
                    })
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('$') => '$',
                        Some('0') => '\0',
                        Some(other) => other,
                        None => {
                            return Err(Error::UnterminatedString {
                                span: self.start_span,
                            })
                        }
                    };
                    buf.push(escaped);
                }
                Some('$') if self.peek_next() == Some('{') => {
                    self.advance(); // $
                    self.advance(); // {
                    if !buf.is_empty() {
                        parts.push(StringPart::Lit(std::mem::take(&mut buf)));
                    }
                    // Collect the raw expression text up to the matching brace
                    let mut depth = 1;
                    let mut expr_src = String::new();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(Error::UnterminatedInterpolation {
                                    span: self.start_span,
                                })
                            }
                            Some('{') => {
                                depth += 1;
                                expr_src.push('{');
                                self.advance();
                            }
                            Some('}') => {
                                depth -= 1;
                                self.advance();
                                if depth == 0 {
                                    break;
                                }
                                expr_src.push('}');
                            }
                            Some(c) => {
                                expr_src.push(c);
                                self.advance();
                            }
                        }
                    }
                    parts.push(StringPart::Expr(expr_src));
                }
                Some(c) => {
                    buf.push(c);
                    self.advance();
                }
            }
        }

        if parts.is_empty() {
            Ok(self.make_token(TokenKind::StringLit(buf)))
        } else {
            if !buf.is_empty() {
                parts.push(StringPart::Lit(buf));
            }
            Ok(self.make_token(TokenKind::InterpLit(parts)))
        }
    }

    /// Produce the next token
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        self.start_span = Span::new(self.line, self.col);

        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(Token::eof(self.start_span)),
        };

        if c.is_alphabetic() || c == '_' {
            return Ok(self.read_identifier());
        }
        if c.is_ascii_digit() {
            return Ok(self.read_number());
        }
        if c == '"' {
            return self.read_string();
        }

        self.advance();
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => {
                if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '=' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::EqEq
                }
                Some('>') => {
                    self.advance();
                    TokenKind::FatArrow
                }
                _ => TokenKind::Eq,
            },
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Ne
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    TokenKind::And
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    TokenKind::OrOr
                } else {
                    TokenKind::Pipe
                }
            }
            '.' => {
                if self.peek() == Some('.') {
                    self.advance();
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            ':' => {
                if self.peek() == Some(':') {
                    self.advance();
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            '?' => TokenKind::Question,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            other => TokenKind::Unknown(other),
        };

        Ok(self.make_token(kind))
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let at_end = token.kind == TokenKind::Eof;
            tokens.push(token);
            if at_end {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .expect("lex failure")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_let_statement() {
        assert_eq!(
            kinds("let x: int = 42;"),
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".into()),
                TokenKind::Colon,
                TokenKind::Ident("int".into()),
                TokenKind::Eq,
                TokenKind::IntLit(42),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_range_without_float_confusion() {
        assert_eq!(
            kinds("0..10"),
            vec![
                TokenKind::IntLit(0),
                TokenKind::DotDot,
                TokenKind::IntLit(10),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("1.5"), vec![TokenKind::FloatLit(1.5), TokenKind::Eof]);
    }

    #[test]
    fn lexes_interpolated_string() {
        let toks = kinds(r#""hi ${name}!""#);
        match &toks[0] {
            TokenKind::InterpLit(parts) => {
                assert_eq!(
                    parts,
                    &vec![
                        StringPart::Lit("hi ".into()),
                        StringPart::Expr("name".into()),
                        StringPart::Lit("!".into()),
                    ]
                );
            }
            other => panic!("expected interpolated string, got {:?}", other),
        }
    }

    #[test]
    fn plain_string_stays_plain() {
        assert_eq!(
            kinds(r#""plain \n text""#),
            vec![TokenKind::StringLit("plain \n text".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let result = Lexer::new("\"oops").tokenize();
        assert!(matches!(result, Err(Error::UnterminatedString { .. })));
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = Lexer::new("let\n  x").tokenize().unwrap();
        assert_eq!(tokens[0].span, Span::new(1, 1));
        assert_eq!(tokens[1].span, Span::new(2, 3));
    }

    #[test]
    fn nested_block_comments() {
        assert_eq!(
            kinds("/* outer /* inner */ still */ 1"),
            vec![TokenKind::IntLit(1), TokenKind::Eof]
        );
    }

    #[test]
    fn hex_and_underscore_literals() {
        assert_eq!(
            kinds("0xFF 1_000"),
            vec![TokenKind::IntLit(255), TokenKind::IntLit(1000), TokenKind::Eof]
        );
    }
}

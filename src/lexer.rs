//! Lexer: source text to a linear token stream.
//!
//! Whitespace and `#` line comments are skipped. Lexing aborts on the
//! first malformed token; the error carries the line and column of the
//! offending byte.

use std::fmt;

use crate::token::{Span, Token, TokenKind};

/// Translate a byte offset into 1-based line and column numbers.
pub(crate) fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(offset, |newline| offset - newline - 1)
        + 1;
    (line, column)
}

/// A malformed token. Aborts the whole lex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub column: usize,
    pub kind: LexErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    UnexpectedCharacter(char),
    /// A lone `.`; only `..` is a token.
    ExpectedDotDot,
    UnterminatedString,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: ", self.line, self.column)?;
        match &self.kind {
            LexErrorKind::UnexpectedCharacter(c) => write!(f, "unexpected character `{c}`"),
            LexErrorKind::ExpectedDotDot => f.write_str("expected `..`"),
            LexErrorKind::UnterminatedString => f.write_str("unterminated string literal"),
        }
    }
}

impl std::error::Error for LexError {}

pub struct Lexer<'src> {
    source: &'src str,
    cursor: usize,
}

impl<'src> Lexer<'src> {
    /// Tokenize the whole buffer. The resulting stream always ends with
    /// an `Eof` token.
    pub fn lex(source: &'src str) -> Result<Vec<Token<'src>>, LexError> {
        let mut lexer = Lexer { source, cursor: 0 };
        let mut tokens = Vec::new();

        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        tokens.push(Token {
            lexeme: "",
            kind: TokenKind::Eof,
            span: Span {
                start: source.len(),
                end: source.len(),
            },
        });

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token<'src>>, LexError> {
        self.skip_whitespace_and_comments();

        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '0'..='9' => self.number(),
            '(' | ')' | '[' | ']' | '{' | '}' | ',' | '=' => self.single_character_token(c),
            ':' => self.colon(),
            '.' => self.dotdot()?,
            '"' => self.string_literal()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.keyword_or_identifier(),
            c => return Err(self.error(self.cursor, LexErrorKind::UnexpectedCharacter(c))),
        };

        Ok(Some(token))
    }

    fn single_character_token(&mut self, c: char) -> Token<'src> {
        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            ',' => TokenKind::Comma,
            '=' => TokenKind::Equals,
            _ => unreachable!("caller only dispatches single-character punctuation"),
        };

        let start = self.cursor;
        self.advance();
        self.token(start, kind)
    }

    fn keyword_or_identifier(&mut self) -> Token<'src> {
        let start = self.cursor;
        while let Some(c) = self.peek() {
            if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            self.advance();
        }

        let lexeme = &self.source[start..self.cursor];
        let kind = if Token::is_keyword(lexeme) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        self.token(start, kind)
    }

    fn number(&mut self) -> Token<'src> {
        let start = self.cursor;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        self.token(start, TokenKind::Number)
    }

    fn string_literal(&mut self) -> Result<Token<'src>, LexError> {
        let quote = self.cursor;
        self.advance();

        let start = self.cursor;
        loop {
            match self.peek() {
                Some('"') => break,
                Some(_) => self.advance(),
                None => return Err(self.error(quote, LexErrorKind::UnterminatedString)),
            }
        }

        let token = Token {
            lexeme: &self.source[start..self.cursor],
            kind: TokenKind::StringLiteral,
            span: Span {
                start,
                end: self.cursor,
            },
        };
        self.advance();
        Ok(token)
    }

    fn colon(&mut self) -> Token<'src> {
        let start = self.cursor;
        self.advance();
        if self.peek() == Some(':') {
            self.advance();
            return self.token(start, TokenKind::ColonColon);
        }
        self.token(start, TokenKind::Colon)
    }

    fn dotdot(&mut self) -> Result<Token<'src>, LexError> {
        let start = self.cursor;
        self.advance();
        if self.peek() == Some('.') {
            self.advance();
            return Ok(self.token(start, TokenKind::DotDot));
        }
        Err(self.error(start, LexErrorKind::ExpectedDotDot))
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.advance();
            } else if c == '#' {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn token(&self, start: usize, kind: TokenKind) -> Token<'src> {
        Token {
            lexeme: &self.source[start..self.cursor],
            kind,
            span: Span {
                start,
                end: self.cursor,
            },
        }
    }

    fn error(&self, offset: usize, kind: LexErrorKind) -> LexError {
        let (line, column) = line_col(self.source, offset);
        LexError { line, column, kind }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.cursor..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.cursor += c.len_utf8();
        }
    }
}

//! Lexer turning expression source into tokens.

use std::borrow::Cow;

use crate::core::span::Span;
use crate::core::token::{Token, TokenKind};
use crate::error::{ExpressionError, ExpressionResult};

/// Lexer over a single expression or script source string.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer.
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> ExpressionResult<Vec<Token<'a>>> {
        let mut tokens = Vec::with_capacity((self.input.len() / 5).max(8));
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> ExpressionResult<Token<'a>> {
        self.skip_whitespace();

        let start = self.position;
        let Some(ch) = self.current_char() else {
            return Ok(Token::new(TokenKind::Eof, Span::new(start, start)));
        };

        let token = match ch {
            '(' => self.single(TokenKind::LeftParen, start),
            ')' => self.single(TokenKind::RightParen, start),
            '[' => self.single(TokenKind::LeftBracket, start),
            ']' => self.single(TokenKind::RightBracket, start),
            '{' => self.single(TokenKind::LeftBrace, start),
            '}' => self.single(TokenKind::RightBrace, start),
            ',' => self.single(TokenKind::Comma, start),
            '.' => self.single(TokenKind::Dot, start),
            ':' => self.single(TokenKind::Colon, start),
            '?' => self.single(TokenKind::Question, start),
            ';' => self.single(TokenKind::Semicolon, start),

            '+' => self.single(TokenKind::Plus, start),
            '-' => self.single(TokenKind::Minus, start),
            '*' => self.single(TokenKind::Star, start),
            '/' => self.single(TokenKind::Slash, start),
            '%' => self.single(TokenKind::Percent, start),

            '=' if self.peek() == Some('=') => self.double(TokenKind::Equal, start),
            '=' => self.single(TokenKind::Assign, start),
            '!' if self.peek() == Some('=') => self.double(TokenKind::NotEqual, start),
            '!' => self.single(TokenKind::Not, start),
            '<' if self.peek() == Some('=') => self.double(TokenKind::LessEqual, start),
            '<' => self.single(TokenKind::LessThan, start),
            '>' if self.peek() == Some('=') => self.double(TokenKind::GreaterEqual, start),
            '>' => self.single(TokenKind::GreaterThan, start),

            '&' if self.peek() == Some('&') => self.double(TokenKind::And, start),
            '|' if self.peek() == Some('|') => self.double(TokenKind::Or, start),

            '"' | '\'' => self.read_string(ch)?,
            c if c.is_ascii_digit() => self.read_number()?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier_or_keyword(),

            _ => {
                return Err(ExpressionError::syntax(format!(
                    "unexpected character '{}' at position {}",
                    ch, self.position
                )));
            }
        };

        Ok(token)
    }

    fn single(&mut self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        self.advance();
        Token::new(kind, Span::new(start, self.position))
    }

    fn double(&mut self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        self.advance();
        self.advance();
        Token::new(kind, Span::new(start, self.position))
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let current = self.current_char()?;
        self.input[self.position + current.len_utf8()..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self, quote: char) -> ExpressionResult<Token<'a>> {
        let start_pos = self.position;
        self.advance(); // opening quote

        let mut has_escapes = false;
        while let Some(ch) = self.current_char() {
            if ch == quote {
                let end_pos = self.position;
                self.advance(); // closing quote
                let span = Span::new(start_pos, self.position);
                let raw = &self.input[start_pos + 1..end_pos];

                let text = if has_escapes {
                    Cow::Owned(unescape(raw))
                } else {
                    Cow::Borrowed(raw)
                };
                return Ok(Token::new(TokenKind::String(text), span));
            } else if ch == '\\' {
                has_escapes = true;
                self.advance();
                if self.current_char().is_some() {
                    self.advance();
                }
            } else {
                self.advance();
            }
        }

        Err(ExpressionError::syntax("unterminated string literal"))
    }

    fn read_number(&mut self) -> ExpressionResult<Token<'a>> {
        let start_pos = self.position;
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && !is_float {
                // Only part of the number if a digit follows; otherwise the
                // dot is a property access.
                match self.peek() {
                    Some(next) if next.is_ascii_digit() => {
                        is_float = true;
                        self.advance();
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }

        let num_str = &self.input[start_pos..self.position];
        let span = Span::new(start_pos, self.position);

        if is_float {
            num_str
                .parse::<f64>()
                .map(|f| Token::new(TokenKind::Float(f), span))
                .map_err(|_| ExpressionError::syntax(format!("invalid float literal: {}", num_str)))
        } else {
            num_str
                .parse::<i64>()
                .map(|i| Token::new(TokenKind::Integer(i), span))
                .map_err(|_| {
                    ExpressionError::syntax(format!("invalid integer literal: {}", num_str))
                })
        }
    }

    fn read_identifier_or_keyword(&mut self) -> Token<'a> {
        let start_pos = self.position;
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let name = &self.input[start_pos..self.position];
        let span = Span::new(start_pos, self.position);

        let kind = match name {
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            "null" => TokenKind::Null,
            "for" => TokenKind::For,
            _ => TokenKind::Identifier(name),
        };

        Token::new(kind, span)
    }
}

fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            }
        } else {
            result.push(ch);
        }
    }
    result
}

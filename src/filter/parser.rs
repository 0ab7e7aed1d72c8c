use std::iter::Peekable;
use std::str::CharIndices;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ComparisonOp, Filter};
use crate::row::RowProperty;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid filter at offset {offset}: {message}")]
pub struct FilterParseError {
    pub offset: usize,
    pub message: String,
}

impl FilterParseError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(RowProperty),
    OpenParen,
    CloseParen,
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn tokens(mut self) -> Result<Vec<(usize, Token)>, FilterParseError> {
        let mut tokens = Vec::new();
        while let Some(&(offset, ch)) = self.chars.peek() {
            if ch.is_whitespace() {
                self.chars.next();
                continue;
            }
            let token = match ch {
                '(' => {
                    self.chars.next();
                    Token::OpenParen
                }
                ')' => {
                    self.chars.next();
                    Token::CloseParen
                }
                '\'' => Token::Literal(RowProperty::String(self.quoted(offset)?)),
                c if c == '-' || c.is_ascii_digit() => Token::Literal(self.number(offset)?),
                c if c.is_alphabetic() || c == '_' => self.word(offset)?,
                other => {
                    return Err(FilterParseError::new(
                        offset,
                        format!("unexpected character `{}`", other),
                    ))
                }
            };
            tokens.push((offset, token));
        }
        Ok(tokens)
    }

    /// Reads a single-quoted string; `''` is an escaped quote.
    fn quoted(&mut self, start: usize) -> Result<String, FilterParseError> {
        self.chars.next();
        let mut value = String::new();
        while let Some((_, ch)) = self.chars.next() {
            if ch == '\'' {
                if matches!(self.chars.peek(), Some((_, '\''))) {
                    self.chars.next();
                    value.push('\'');
                } else {
                    return Ok(value);
                }
            } else {
                value.push(ch);
            }
        }
        Err(FilterParseError::new(start, "unterminated string literal"))
    }

    fn number(&mut self, start: usize) -> Result<RowProperty, FilterParseError> {
        let mut end = start;
        let mut is_double = false;
        let mut is_long = false;
        if let Some((offset, '-')) = self.chars.peek().copied() {
            self.chars.next();
            end = offset + 1;
            if matches!(self.chars.peek(), Some((_, 'I'))) {
                return match self.word(end)? {
                    Token::Literal(RowProperty::Double(value)) if value.is_infinite() => {
                        Ok(RowProperty::Double(-value))
                    }
                    _ => Err(FilterParseError::new(start, "invalid number")),
                };
            }
        }
        let mut previous = None;
        while let Some(&(offset, ch)) = self.chars.peek() {
            match ch {
                '0'..='9' => {}
                '.' | 'e' | 'E' => is_double = true,
                // exponent sign
                '+' | '-' if matches!(previous, Some('e' | 'E')) => {}
                'L' => {
                    self.chars.next();
                    is_long = true;
                    break;
                }
                _ => break,
            }
            self.chars.next();
            end = offset + ch.len_utf8();
            previous = Some(ch);
        }
        let text = &self.input[start..end];
        let invalid = || FilterParseError::new(start, format!("invalid number `{}`", text));
        if is_double {
            return text.parse::<f64>().map(RowProperty::Double).map_err(|_| invalid());
        }
        let value = text.parse::<i64>().map_err(|_| invalid())?;
        if is_long {
            return Ok(RowProperty::Int64(value));
        }
        Ok(i32::try_from(value)
            .map(RowProperty::Int32)
            .unwrap_or(RowProperty::Int64(value)))
    }

    fn word(&mut self, start: usize) -> Result<Token, FilterParseError> {
        let mut end = start;
        while let Some(&(offset, ch)) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.chars.next();
                end = offset + ch.len_utf8();
            } else {
                break;
            }
        }
        let word = &self.input[start..end];

        if !matches!(self.chars.peek(), Some((_, '\''))) {
            return Ok(match word {
                "true" => Token::Literal(RowProperty::Boolean(true)),
                "false" => Token::Literal(RowProperty::Boolean(false)),
                "NaN" => Token::Literal(RowProperty::Double(f64::NAN)),
                "INF" => Token::Literal(RowProperty::Double(f64::INFINITY)),
                _ => Token::Ident(word.to_string()),
            });
        }

        // typed literal: datetime'..', guid'..', X'..' / binary'..'
        let quote_offset = end;
        let raw = self.quoted(quote_offset)?;
        let literal = match word {
            "datetime" => DateTime::parse_from_rfc3339(&raw)
                .map(|value| RowProperty::DateTime(value.with_timezone(&Utc)))
                .map_err(|e| FilterParseError::new(start, format!("invalid datetime: {}", e)))?,
            "guid" => Uuid::parse_str(&raw)
                .map(RowProperty::Guid)
                .map_err(|e| FilterParseError::new(start, format!("invalid guid: {}", e)))?,
            "X" | "binary" => RowProperty::Binary(decode_hex(&raw).ok_or_else(|| {
                FilterParseError::new(start, format!("invalid binary literal `{}`", raw))
            })?),
            other => {
                return Err(FilterParseError::new(
                    start,
                    format!("unknown literal prefix `{}`", other),
                ))
            }
        };
        Ok(Token::Literal(literal))
    }
}

fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    if raw.len() % 2 != 0 {
        return None;
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| raw.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    position: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(_, token)| token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).map(|(_, token)| token.clone());
        self.position += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word == keyword)
    }

    fn or_expr(&mut self) -> Result<Filter, FilterParseError> {
        let mut left = self.and_expr()?;
        while self.peek_keyword("or") {
            self.next();
            left = left.or(self.and_expr()?);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Filter, FilterParseError> {
        let mut left = self.unary()?;
        while self.peek_keyword("and") {
            self.next();
            left = left.and(self.unary()?);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Filter, FilterParseError> {
        if self.peek_keyword("not") {
            self.next();
            return Ok(self.unary()?.not());
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Filter, FilterParseError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::OpenParen) => {
                let inner = self.or_expr()?;
                match self.next() {
                    Some(Token::CloseParen) => Ok(inner),
                    _ => Err(FilterParseError::new(self.offset(), "expected `)`")),
                }
            }
            Some(Token::Ident(property)) => {
                let op_offset = self.offset();
                let op = match self.next() {
                    Some(Token::Ident(word)) => ComparisonOp::from_keyword(&word),
                    _ => None,
                }
                .ok_or_else(|| FilterParseError::new(op_offset, "expected comparison operator"))?;
                let value_offset = self.offset();
                match self.next() {
                    Some(Token::Literal(value)) => Ok(Filter::Compare {
                        property,
                        op,
                        value,
                    }),
                    _ => Err(FilterParseError::new(value_offset, "expected literal value")),
                }
            }
            Some(_) => Err(FilterParseError::new(offset, "expected property or `(`")),
            None => Err(FilterParseError::new(offset, "unexpected end of filter")),
        }
    }
}

pub(super) fn parse(input: &str) -> Result<Filter, FilterParseError> {
    let tokens = Lexer::new(input).tokens()?;
    let mut parser = Parser {
        tokens,
        position: 0,
        end: input.len(),
    };
    let filter = parser.or_expr()?;
    if parser.position < parser.tokens.len() {
        return Err(FilterParseError::new(parser.offset(), "unexpected trailing input"));
    }
    Ok(filter)
}

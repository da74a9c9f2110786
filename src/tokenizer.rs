//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer knows nothing about the grammar beyond recognising the six
//! punctuators and decimal literals. The result always ends with a single
//! `Eof` token located one past the last byte of the input.

use snafu::ResultExt;

use crate::error::{CompileResult, NumberOutOfRangeSnafu, UnrecognizedCharacterSnafu};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  /// One of `+ - * / ( )`.
  Punct(char),
  Num(i64),
  Eof,
}

/// A classified lexeme and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  pub fn new(kind: TokenKind, loc: usize, len: usize) -> Self {
    Self { kind, loc, len }
  }
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    // C `isspace` also covers vertical tab, which `is_ascii_whitespace` omits.
    if c.is_ascii_whitespace() || c == b'\x0b' {
      i += 1;
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text.parse::<i64>().context(NumberOutOfRangeSnafu {
        text,
        loc: start,
      })?;
      tokens.push(Token::new(TokenKind::Num(value), start, i - start));
      continue;
    }

    if matches!(c, b'+' | b'-' | b'*' | b'/' | b'(' | b')') {
      tokens.push(Token::new(TokenKind::Punct(char::from(c)), i, 1));
      i += 1;
      continue;
    }

    let ch = input[i..].chars().next().unwrap_or('\0');
    return UnrecognizedCharacterSnafu { ch, loc: i }.fail();
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0));
  log::debug!("tokenized {} bytes into {} tokens", input.len(), tokens.len());
  Ok(tokens)
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: &Token, source: &str) -> String {
  match token.kind {
    TokenKind::Eof => "EOF".to_string(),
    _ => token_text(token, source).to_string(),
  }
}

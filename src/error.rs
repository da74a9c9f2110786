//! Shared error type for the compilation pipeline.
//!
//! Every lexical or syntactic failure records the byte offset it refers to.
//! Rendering happens once, at the boundary, in the chibicc style: the input
//! line followed by a caret under the offending byte and the message.

use std::num::ParseIntError;

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("invalid token: '{}'", ch.escape_debug()))]
  UnrecognizedCharacter { ch: char, loc: usize },

  #[snafu(display("number out of range: {text}"))]
  NumberOutOfRange {
    text: String,
    loc: usize,
    source: ParseIntError,
  },

  #[snafu(display("expected \"{expected}\", but got \"{got}\""))]
  ExpectedToken {
    expected: char,
    got: String,
    loc: usize,
  },

  #[snafu(display("expected a number, but got \"{got}\""))]
  ExpectedNumber { got: String, loc: usize },

  #[snafu(display("unexpected token \"{got}\""))]
  TrailingInput { got: String, loc: usize },
}

impl CompileError {
  /// Byte offset into the source that the error points at.
  pub fn loc(&self) -> usize {
    match self {
      Self::UnrecognizedCharacter { loc, .. }
      | Self::NumberOutOfRange { loc, .. }
      | Self::ExpectedToken { loc, .. }
      | Self::ExpectedNumber { loc, .. }
      | Self::TrailingInput { loc, .. } => *loc,
    }
  }

  /// Format the two-line diagnostic for `source`.
  pub fn render(&self, source: &str) -> String {
    let safe_loc = self.loc().min(source.len());
    let column = source
      .get(..safe_loc)
      .map_or(safe_loc, |prefix| prefix.chars().count());
    format!("{source}\n{}^ {self}", " ".repeat(column))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn render_places_caret_under_offset() {
    let err = CompileError::ExpectedNumber {
      got: "EOF".to_string(),
      loc: 2,
    };
    assert_eq!(
      err.render("1+"),
      "1+\n  ^ expected a number, but got \"EOF\""
    );
  }

  #[test]
  fn render_counts_characters_not_bytes() {
    let err = CompileError::UnrecognizedCharacter { ch: 'x', loc: 3 };
    // 'é' occupies two bytes but one column.
    assert_eq!(err.render("é+x"), "é+x\n  ^ invalid token: 'x'");
  }

  #[test]
  fn render_clamps_offset_past_end() {
    let err = CompileError::TrailingInput {
      got: "EOF".to_string(),
      loc: 10,
    };
    assert_eq!(err.render("12"), "12\n  ^ unexpected token \"EOF\"");
  }
}

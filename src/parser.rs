//! Recursive-descent parser producing a binary expression tree.
//!
//! Each precedence level is one helper that folds its operators to the left:
//!
//! ```text
//! expr    = mul ( ('+' | '-') mul )*
//! mul     = primary ( ('*' | '/') primary )*
//! primary = '(' expr ')' | num
//! ```
//!
//! The first grammar violation is returned immediately; there is no
//! backtracking and no recovery.

use std::{fmt, mem};

use crate::error::{
  CompileResult, ExpectedNumberSnafu, ExpectedTokenSnafu, TrailingInputSnafu,
};
use crate::tokenizer::{Token, TokenKind, describe_token};

/// Free stack below which a recursive walk switches to a fresh segment.
pub(crate) const STACK_RED_ZONE: usize = 64 * 1024;
/// Size of each segment allocated once the red zone is reached.
pub(crate) const STACK_SEGMENT: usize = 1024 * 1024;

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
}

impl BinaryOp {
  fn from_punct(c: char) -> Option<Self> {
    match c {
      '+' => Some(Self::Add),
      '-' => Some(Self::Sub),
      '*' => Some(Self::Mul),
      '/' => Some(Self::Div),
      _ => None,
    }
  }

  pub fn symbol(self) -> char {
    match self {
      Self::Add => '+',
      Self::Sub => '-',
      Self::Mul => '*',
      Self::Div => '/',
    }
  }

  /// Apply the operator the way the generated machine code does: wrapping
  /// two's-complement arithmetic and truncating division. `None` when `idiv`
  /// would fault.
  pub fn apply(self, lhs: i64, rhs: i64) -> Option<i64> {
    match self {
      Self::Add => Some(lhs.wrapping_add(rhs)),
      Self::Sub => Some(lhs.wrapping_sub(rhs)),
      Self::Mul => Some(lhs.wrapping_mul(rhs)),
      Self::Div => lhs.checked_div(rhs),
    }
  }
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
  Num {
    value: i64,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
}

impl AstNode {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  /// Evaluate the tree with the semantics of the emitted code.
  pub fn eval(&self) -> Option<i64> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || match self {
      Self::Num { value } => Some(*value),
      Self::Binary { op, lhs, rhs } => op.apply(lhs.eval()?, rhs.eval()?),
    })
  }
}

// Long operator chains build trees as deep as the input is long; tear them
// down with a worklist instead of recursive drop glue.
impl Drop for AstNode {
  fn drop(&mut self) {
    let Self::Binary { lhs, rhs, .. } = self else {
      return;
    };
    let mut pending = vec![
      mem::replace(lhs.as_mut(), AstNode::number(0)),
      mem::replace(rhs.as_mut(), AstNode::number(0)),
    ];
    while let Some(mut node) = pending.pop() {
      if let Self::Binary { lhs, rhs, .. } = &mut node {
        pending.push(mem::replace(lhs.as_mut(), AstNode::number(0)));
        pending.push(mem::replace(rhs.as_mut(), AstNode::number(0)));
      }
    }
  }
}

/// Fully parenthesised rendering, e.g. `((8 - 3) - 2)`.
impl fmt::Display for AstNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || match self {
      Self::Num { value } => write!(f, "{value}"),
      Self::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
    })
  }
}

/// Parse a complete expression; every token up to `Eof` must be consumed.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<AstNode> {
  let mut stream = TokenStream::new(tokens, source);
  let node = parse_expr(&mut stream)?;

  if !stream.is_eof() {
    let (loc, got) = stream.describe_current();
    return TrailingInputSnafu { got, loc }.fail();
  }

  log::debug!("parsed {node}");
  Ok(node)
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mut node = parse_mul(stream)?;

  while let Some(op) = stream.consume_op(&[BinaryOp::Add, BinaryOp::Sub]) {
    let rhs = parse_mul(stream)?;
    node = AstNode::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mut node = parse_primary(stream)?;

  while let Some(op) = stream.consume_op(&[BinaryOp::Mul, BinaryOp::Div]) {
    let rhs = parse_primary(stream)?;
    node = AstNode::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<AstNode> {
  if stream.equal('(') {
    let node =
      stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || parse_expr(stream))?;
    stream.skip(')')?;
    return Ok(node);
  }

  let value = stream.get_number()?;
  Ok(AstNode::number(value))
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  ///
  /// The stream must end in `Eof`; one is appended if the caller left it off.
  fn new(mut tokens: Vec<Token>, source: &'a str) -> Self {
    if tokens.last().map(|token| token.kind) != Some(TokenKind::Eof) {
      tokens.push(Token::new(TokenKind::Eof, source.len(), 0));
    }
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  /// The current token. `pos` never moves past the trailing `Eof`.
  fn peek(&self) -> &Token {
    &self.tokens[self.pos]
  }

  /// Offset and description of the current token, for diagnostics.
  fn describe_current(&self) -> (usize, String) {
    let token = self.peek();
    (token.loc, describe_token(token, self.source))
  }

  /// Consume the current token if it is the given punctuator.
  fn equal(&mut self, c: char) -> bool {
    if self.peek().kind == TokenKind::Punct(c) {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Consume the current token if it spells one of `ops`.
  fn consume_op(&mut self, ops: &[BinaryOp]) -> Option<BinaryOp> {
    let TokenKind::Punct(c) = self.peek().kind else {
      return None;
    };
    let op = BinaryOp::from_punct(c).filter(|op| ops.contains(op))?;
    self.pos += 1;
    Some(op)
  }

  fn skip(&mut self, c: char) -> CompileResult<()> {
    if self.equal(c) {
      return Ok(());
    }
    let (loc, got) = self.describe_current();
    ExpectedTokenSnafu {
      expected: c,
      got,
      loc,
    }
    .fail()
  }

  /// Consume the current token as an integer literal.
  fn get_number(&mut self) -> CompileResult<i64> {
    if let TokenKind::Num(value) = self.peek().kind {
      self.pos += 1;
      return Ok(value);
    }
    let (loc, got) = self.describe_current();
    ExpectedNumberSnafu { got, loc }.fail()
  }

  fn is_eof(&self) -> bool {
    self.peek().kind == TokenKind::Eof
  }
}


#[cfg(test)]
mod proptests {
  use super::*;
  use crate::tokenizer::tokenize;
  use proptest::prelude::*;

  const SPACES: [&str; 6] = ["", "", " ", "\t", "\n", "\x0b"];

  fn arb_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![
      Just(BinaryOp::Add),
      Just(BinaryOp::Sub),
      Just(BinaryOp::Mul),
      Just(BinaryOp::Div),
    ]
  }

  fn arb_tree() -> impl Strategy<Value = AstNode> {
    let leaf = prop_oneof![
      4 => (0i64..=100).prop_map(AstNode::number),
      1 => (0i64..=i64::MAX).prop_map(AstNode::number),
    ];
    leaf.prop_recursive(6, 64, 2, |inner| {
      (arb_op(), inner.clone(), inner)
        .prop_map(|(op, lhs, rhs)| AstNode::binary(op, lhs, rhs))
    })
  }

  fn level(op: BinaryOp) -> u8 {
    match op {
      BinaryOp::Add | BinaryOp::Sub => 0,
      BinaryOp::Mul | BinaryOp::Div => 1,
    }
  }

  /// Whether `child` must be parenthesised to keep its place under `parent`.
  fn needs_parens(child: &AstNode, parent: BinaryOp, is_rhs: bool) -> bool {
    match child {
      AstNode::Num { .. } => false,
      AstNode::Binary { op, .. } if is_rhs => level(*op) <= level(parent),
      AstNode::Binary { op, .. } => level(*op) < level(parent),
    }
  }

  fn space(seeds: &mut impl Iterator<Item = u8>, out: &mut String) {
    let seed = seeds.next().unwrap_or(0);
    out.push_str(SPACES[usize::from(seed) % SPACES.len()]);
  }

  /// Print `node` with the fewest parentheses the grammar needs, plus
  /// whitespace and the occasional redundant pair picked by `seeds`.
  fn render(
    node: &AstNode,
    required: bool,
    seeds: &mut impl Iterator<Item = u8>,
    out: &mut String,
  ) {
    let wrap = required || seeds.next().is_some_and(|seed| seed % 7 == 0);
    space(seeds, out);
    if wrap {
      out.push('(');
      space(seeds, out);
    }
    match node {
      AstNode::Num { value } => out.push_str(&value.to_string()),
      AstNode::Binary { op, lhs, rhs } => {
        render(lhs, needs_parens(lhs, *op, false), seeds, out);
        space(seeds, out);
        out.push(op.symbol());
        render(rhs, needs_parens(rhs, *op, true), seeds, out);
      }
    }
    space(seeds, out);
    if wrap {
      out.push(')');
      space(seeds, out);
    }
  }

  /// Widened arithmetic truncated back to 64 bits; division faults where
  /// the quotient does not fit.
  fn reference_eval(node: &AstNode) -> Option<i64> {
    match node {
      AstNode::Num { value } => Some(*value),
      AstNode::Binary { op, lhs, rhs } => {
        let lhs = i128::from(reference_eval(lhs)?);
        let rhs = i128::from(reference_eval(rhs)?);
        match op {
          BinaryOp::Add => Some((lhs + rhs) as i64),
          BinaryOp::Sub => Some((lhs - rhs) as i64),
          BinaryOp::Mul => Some((lhs * rhs) as i64),
          BinaryOp::Div if rhs == 0 => None,
          BinaryOp::Div => i64::try_from(lhs / rhs).ok(),
        }
      }
    }
  }

  proptest! {
    #[test]
    fn prop_rendered_tree_parses_back(
      tree in arb_tree(),
      seeds in prop::collection::vec(any::<u8>(), 1..32),
    ) {
      let mut source = String::new();
      render(&tree, false, &mut seeds.iter().copied().cycle(), &mut source);

      let parsed = tokenize(&source)
        .and_then(|tokens| parse(tokens, &source))
        .map_err(|err| TestCaseError::fail(err.render(&source)))?;

      prop_assert_eq!(&parsed, &tree, "source: {:?}", source);
      prop_assert_eq!(parsed.eval(), reference_eval(&tree), "source: {:?}", source);
    }

    #[test]
    fn prop_fully_parenthesised_display_parses_back(tree in arb_tree()) {
      let source = tree.to_string();
      let parsed = tokenize(&source)
        .and_then(|tokens| parse(tokens, &source))
        .map_err(|err| TestCaseError::fail(err.render(&source)))?;
      prop_assert_eq!(parsed, tree);
    }
  }
}

//! Crate root: wires together the compilation pipeline.
//!
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns the grammar and returns a binary expression tree.
//! - `codegen` lowers the tree into x86-64 stack-machine assembly.
//! - `error` holds the positional error type shared by the other modules.

pub mod codegen;
pub mod error;
pub mod parser;
pub mod tokenizer;

pub use codegen::Syntax;
pub use error::{CompileError, CompileResult};
pub use parser::AstNode;

/// Lex and parse `expr` into its expression tree.
pub fn parse_expression(expr: &str) -> CompileResult<AstNode> {
  let tokens = tokenizer::tokenize(expr)?;
  parser::parse(tokens, expr)
}

/// Compile an expression into an assembly listing for `main`.
pub fn generate_assembly(expr: &str, syntax: Syntax) -> CompileResult<String> {
  let node = parse_expression(expr)?;
  Ok(codegen::generate(&node, syntax))
}

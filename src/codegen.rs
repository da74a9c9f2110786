//! Code generation: lower the expression tree into x86-64 assembly.
//!
//! The emitter is a stack machine. Every subtree leaves exactly one value on
//! the stack, so a binary node only has to pop its two operands into `%rdi`
//! and `%rax`, combine them and push the result. The entry point pops the
//! final value into `%rax` and returns.

use std::fmt;

use crate::parser::{AstNode, BinaryOp, STACK_RED_ZONE, STACK_SEGMENT};

/// Assembler dialect of the emitted text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Syntax {
  /// `.intel_syntax noprefix`, destination first.
  #[default]
  Intel,
  /// GNU as default: `%` registers, `$` immediates, source first.
  Att,
}

#[derive(Debug, Clone, Copy)]
enum Reg {
  Rax,
  Rdi,
}

impl Reg {
  fn name(self) -> &'static str {
    match self {
      Reg::Rax => "rax",
      Reg::Rdi => "rdi",
    }
  }
}

/// Instruction operand, rendered per dialect.
#[derive(Debug, Clone, Copy)]
enum Operand {
  Reg(Reg),
  Imm(i64),
}

struct Dialect(Syntax, Operand);

impl fmt::Display for Dialect {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.0, self.1) {
      (Syntax::Intel, Operand::Reg(reg)) => f.write_str(reg.name()),
      (Syntax::Intel, Operand::Imm(value)) => write!(f, "{value}"),
      (Syntax::Att, Operand::Reg(reg)) => write!(f, "%{}", reg.name()),
      (Syntax::Att, Operand::Imm(value)) => write!(f, "${value}"),
    }
  }
}

/// Accumulates assembly lines for one compilation.
struct Emitter {
  syntax: Syntax,
  asm: String,
}

impl Emitter {
  fn new(syntax: Syntax) -> Self {
    Self {
      syntax,
      asm: String::new(),
    }
  }

  fn line(&mut self, text: &str) {
    self.asm.push_str(text);
    self.asm.push('\n');
  }

  fn op(&self, operand: Operand) -> Dialect {
    Dialect(self.syntax, operand)
  }

  fn insn0(&mut self, mnemonic: &str) {
    self.line(&format!("    {mnemonic}"));
  }

  fn insn1(&mut self, mnemonic: &str, operand: Operand) {
    let operand = self.op(operand);
    self.line(&format!("    {mnemonic} {operand}"));
  }

  /// Two-operand instruction; `dst` is written.
  fn insn2(&mut self, mnemonic: &str, dst: Operand, src: Operand) {
    let (dst, src) = (self.op(dst), self.op(src));
    let text = match self.syntax {
      Syntax::Intel => format!("    {mnemonic} {dst}, {src}"),
      Syntax::Att => format!("    {mnemonic} {src}, {dst}"),
    };
    self.line(&text);
  }

  fn push_imm(&mut self, value: i64) {
    // `push imm32` sign-extends; anything wider has to go through a register.
    if i32::try_from(value).is_ok() {
      self.insn1("push", Operand::Imm(value));
    } else {
      self.insn2("mov", Operand::Reg(Reg::Rax), Operand::Imm(value));
      self.insn1("push", Operand::Reg(Reg::Rax));
    }
  }

  fn push(&mut self, reg: Reg) {
    self.insn1("push", Operand::Reg(reg));
  }

  fn pop(&mut self, reg: Reg) {
    self.insn1("pop", Operand::Reg(reg));
  }
}

/// Emit a complete `main` whose return value is the value of `node`.
pub fn generate(node: &AstNode, syntax: Syntax) -> String {
  let mut out = Emitter::new(syntax);
  if syntax == Syntax::Intel {
    out.line(".intel_syntax noprefix");
  }
  out.line(".global main");
  out.line("main:");

  emit_expr(node, &mut out);

  out.pop(Reg::Rax);
  out.insn0("ret");

  log::debug!("emitted {} lines of assembly", out.asm.lines().count());
  out.asm
}

/// Emit stack-based code for a single expression node.
fn emit_expr(node: &AstNode, out: &mut Emitter) {
  stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || match node {
    AstNode::Num { value } => out.push_imm(*value),
    AstNode::Binary { op, lhs, rhs } => {
      emit_expr(lhs, out);
      emit_expr(rhs, out);
      out.pop(Reg::Rdi);
      out.pop(Reg::Rax);
      let (rax, rdi) = (Operand::Reg(Reg::Rax), Operand::Reg(Reg::Rdi));
      match op {
        BinaryOp::Add => out.insn2("add", rax, rdi),
        BinaryOp::Sub => out.insn2("sub", rax, rdi),
        BinaryOp::Mul => out.insn2("imul", rax, rdi),
        BinaryOp::Div => {
          out.insn0("cqo");
          out.insn1("idiv", rdi);
        }
      }
      out.push(Reg::Rax);
    }
  })
}

use std::process;

use clap::Parser;
use rcalc::{Syntax, codegen, parse_expression};

#[derive(Parser, Debug)]
#[command(name = "rcalc", version, about = "Compile an integer expression to x86-64 assembly")]
struct Cli {
  /// Expression to compile, e.g. "(2+3)*4"
  #[arg(value_name = "EXPR", allow_hyphen_values = true)]
  expr: String,

  /// Assembler dialect of the output
  #[arg(long, value_enum, default_value_t = Syntax::Intel)]
  syntax: Syntax,

  /// Print the parsed tree to stderr before emitting assembly
  #[arg(long)]
  emit_ast: bool,
}

fn main() {
  env_logger::init();
  let cli = Cli::parse();

  let node = match parse_expression(&cli.expr) {
    Ok(node) => node,
    Err(err) => {
      eprintln!("{}", err.render(&cli.expr));
      process::exit(1);
    }
  };

  if cli.emit_ast {
    eprintln!("{node}");
  }

  print!("{}", codegen::generate(&node, cli.syntax));
}

//! Serialización textual del módulo generado.
//!
//! El artefacto es un listado en estilo ensamblador: directivas de
//! módulo al inicio, luego la función de entrada con una etiqueta
//! `L{n}` por bloque básico y una operación con mnemónico por línea.
//! Los destinos de salto se imprimen con la etiqueta del bloque
//! destino, nunca con su índice interno.

use std::io::{self, Write};

use crate::{
    cfg::BlockId,
    ir::{Op, Program, Terminator},
};

pub fn write<W: Write>(program: &Program, output: &mut W) -> io::Result<()> {
    for external in &program.externals {
        let arguments = if external.variadic { "..." } else { "" };
        writeln!(output, ".extern {}({})", external.name, arguments)?;
    }

    for global in &program.globals {
        writeln!(output, ".lcomm {}, {}", global.name, global.elements)?;
    }

    writeln!(output, ".text")?;

    let function = &program.entry;
    writeln!(output, ".global {0}\n{0}:", function.name)?;

    let target = |block: BlockId| format!("L{}", function.blocks[block.0].label);

    for block in &function.blocks {
        writeln!(output, "L{}:", block.label)?;

        for op in &block.ops {
            match op {
                Op::LoadConst(value, into) => emit!(output, "const", "{}, {}", into, value)?,
                Op::LoadVar(var, into) => {
                    emit!(output, "load", "{}, vars[{}]", into, var.index())?
                }

                Op::StoreVar(from, var) => {
                    emit!(output, "store", "{}, vars[{}]", from, var.index())?
                }

                Op::Arith(op, result, lhs, rhs) => {
                    use crate::lex::ArithOp::*;

                    let mnemonic = match op {
                        Add => "add",
                        Sub => "sub",
                        Mul => "mul",
                        Div => "sdiv",
                    };

                    emit!(output, mnemonic, "{}, {}, {}", result, lhs, rhs)?;
                }

                Op::Compare(cmp, result, lhs, rhs) => {
                    use crate::lex::CmpOp::*;

                    let mnemonic = match cmp {
                        Eq => "cmpeq",
                        Ne => "cmpne",
                        Lt => "cmplt",
                        Le => "cmple",
                        Gt => "cmpgt",
                        Ge => "cmpge",
                    };

                    emit!(output, mnemonic, "{}, {}, {}", result, lhs, rhs)?;
                }

                Op::PrintCall { format, arg } => match arg {
                    Some(arg) => emit!(output, "print", "\"{}\", {}", escape(format), arg)?,
                    None => emit!(output, "print", "\"{}\"", escape(format))?,
                },
            }
        }

        match block.terminator {
            Terminator::Jump(to) => emit!(output, "br", "{}", target(to))?,
            Terminator::Branch {
                condition,
                then_to,
                else_to,
            } => emit!(
                output,
                "cbr",
                "{}, {}, {}",
                condition,
                target(then_to),
                target(else_to)
            )?,

            Terminator::Return(code) => emit!(output, "ret", "{}", code)?,
        }
    }

    Ok(())
}

fn escape(string: &str) -> String {
    let mut escaped = String::with_capacity(string.len());
    for c in string.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cfg::build_blocks, emit::emit, lex::tokenize_str, parse::parse};

    fn listing(source: &str) -> String {
        let program = parse(tokenize_str(source).unwrap()).unwrap();
        let blocks = build_blocks(&program);
        let module = emit(&program, &blocks).unwrap();

        let mut output = Vec::new();
        write(&module, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn straight_line_listing_matches_expected_text() {
        let expected = "\
.extern printf(...)
.lcomm vars, 26
.text
.global main
main:
L10:
\tconst   %0, 5
\tstore   %0, vars[0]
\tload    %1, vars[0]
\tprint   \"%d\", %1
\tbr      L21
L21:
\tret     0
";

        assert_eq!(listing("10 LET A = 5\n20 PRINT A"), expected);
    }

    #[test]
    fn branch_targets_use_block_labels() {
        let text = listing(
            "10 LET A = 1\n\
             20 IF A = 1 THEN GOTO 40\n\
             30 PRINTLN \"skipped\"\n\
             40 PRINTLN A",
        );

        assert!(text.contains("\tcbr     %3, L40, L30\n"));
        assert!(text.contains("L30:\n\tprint   \"skipped\\n\"\n\tbr      L40\n"));
        assert!(text.ends_with("\tret     0\n"));
    }

    #[test]
    fn arithmetic_statement_uses_three_address_form() {
        let text = listing("10 LET B = A + 7");

        assert!(text.contains("\tload    %0, vars[0]\n"));
        assert!(text.contains("\tconst   %1, 7\n"));
        assert!(text.contains("\tadd     %2, %0, %1\n"));
        assert!(text.contains("\tstore   %2, vars[1]\n"));
    }

    #[test]
    fn string_payloads_are_escaped() {
        let text = listing("10 PRINTLN \"a\tb\"");
        assert!(text.contains("\tprint   \"a\\tb\\n\"\n"));
    }
}

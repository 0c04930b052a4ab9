//! Emisión de representación intermedia.
//!
//! Esta fase recorre las instrucciones en orden ascendente de
//! etiqueta manteniendo un cursor de bloque actual. Al llegar a una
//! etiqueta que abre bloque, el bloque anterior se termina con un
//! salto incondicional hacia el nuevo, salvo que ya haya sido
//! terminado por el branch condicional de un `IF`: un bloque nunca
//! recibe un segundo terminador. Los destinos de salto se resuelven
//! contra la tabla de instrucciones, por lo que un `GOTO` hacia una
//! etiqueta inexistente es un error estático de esta fase y no un
//! fallo en tiempo de ejecución del programa generado.
//!
//! El bloque sintético final contiene la única secuencia de salida
//! del programa: retorno con código 0.

use thiserror::Error;

use crate::{
    cfg::{BlockId, BlockMap},
    ir::{self, Local, Op, Terminator},
    parse::{Instruction, IntExpr, Payload, Program},
};

/// Error de emisión.
///
/// Con excepción de los destinos de salto sin resolver, estas
/// condiciones son violaciones de invariantes internos entre el
/// constructor de bloques y el emisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EmitError {
    /// Un `IF ... GOTO` refiere a una etiqueta sin instrucción.
    #[error("Jump target {target} at line {from} does not name a statement")]
    UnresolvedJumpTarget { from: i32, target: i32 },

    /// Ninguna frontera de bloque corresponde a esta etiqueta.
    #[error("No basic block begins at label {0}")]
    MissingBlock(i32),

    /// Un bloque quedó sin terminador al finalizar la emisión.
    #[error("Block at label {0} was never terminated")]
    OpenBlock(i32),
}

/// Baja el programa completo a su representación intermedia.
pub fn emit(program: &Program, blocks: &BlockMap) -> Result<ir::Program, EmitError> {
    let first = program.first_label();
    let entry = blocks.get(first).ok_or(EmitError::MissingBlock(first))?;

    let emitter = Emitter {
        program,
        map: blocks,
        blocks: blocks
            .labels()
            .map(|(label, _)| PendingBlock {
                label,
                ops: Vec::new(),
                terminator: None,
            })
            .collect(),
        current: entry,
        next_local: 0,
    };

    emitter.run()
}

/// Un bloque en construcción, aún sin terminador garantizado.
struct PendingBlock {
    label: i32,
    ops: Vec<Op>,
    terminator: Option<Terminator>,
}

struct Emitter<'a> {
    program: &'a Program,
    map: &'a BlockMap,
    blocks: Vec<PendingBlock>,
    current: BlockId,
    next_local: u32,
}

impl Emitter<'_> {
    fn run(mut self) -> Result<ir::Program, EmitError> {
        let program = self.program;
        for (label, instruction) in program.instructions() {
            if let Some(id) = self.map.get(label) {
                if id != self.current {
                    self.enter(id);
                }
            }

            self.lower(label, instruction)?;
        }

        // Si la última instrucción no era un IF, el flujo cae al
        // bloque final
        let trailing = self.map.trailing();
        self.enter(trailing);
        self.blocks[trailing.0].terminator = Some(Terminator::Return(0));

        let blocks = self
            .blocks
            .into_iter()
            .map(|block| match block.terminator {
                Some(terminator) => Ok(ir::Block {
                    label: block.label,
                    ops: block.ops,
                    terminator,
                }),

                None => Err(EmitError::OpenBlock(block.label)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ir::Program {
            externals: vec![ir::External {
                name: "printf",
                variadic: true,
            }],
            globals: vec![ir::Global {
                name: "vars",
                elements: 26,
            }],
            entry: ir::Function {
                name: "main",
                blocks,
            },
        })
    }

    /// Cambia el cursor de inserción a un nuevo bloque.
    ///
    /// Un bloque ya terminado por un branch no recibe la arista de
    /// fallthrough; de lo contrario se insertaría un segundo
    /// terminador.
    fn enter(&mut self, id: BlockId) {
        let current = &mut self.blocks[self.current.0];
        if current.terminator.is_none() {
            current.terminator = Some(Terminator::Jump(id));
        }

        self.current = id;
    }

    fn lower(&mut self, label: i32, instruction: &Instruction) -> Result<(), EmitError> {
        match instruction {
            Instruction::Let { target, lhs, op } => {
                let mut value = self.eval(*lhs);
                if let Some((op, rhs)) = op {
                    let rhs = self.eval(*rhs);
                    let result = self.alloc();

                    self.push(Op::Arith(*op, result, value, rhs));
                    value = result;
                }

                self.push(Op::StoreVar(value, *target));
            }

            Instruction::If {
                lhs,
                cmp,
                rhs,
                target,
            } => {
                let lhs = self.eval(*lhs);
                let rhs = self.eval(*rhs);
                let condition = self.alloc();
                self.push(Op::Compare(*cmp, condition, lhs, rhs));

                if !self.program.contains(*target) {
                    return Err(EmitError::UnresolvedJumpTarget {
                        from: label,
                        target: *target,
                    });
                }

                let then_to = self.map.get(*target).ok_or(EmitError::MissingBlock(*target))?;
                let else_to = match self.program.successor(label) {
                    Some(next) => self.map.get(next).ok_or(EmitError::MissingBlock(next))?,
                    None => self.map.trailing(),
                };

                self.blocks[self.current.0].terminator = Some(Terminator::Branch {
                    condition,
                    then_to,
                    else_to,
                });
            }

            Instruction::Print(payload) => self.print(payload, false),
            Instruction::Println(payload) => self.print(payload, true),
        }

        Ok(())
    }

    fn print(&mut self, payload: &Payload, newline: bool) {
        let (format, arg) = match payload {
            Payload::Str(string) => {
                let mut format = string.clone();
                if newline {
                    format.push('\n');
                }

                (format, None)
            }

            Payload::Expr(expr) => {
                let format = if newline { "%d\n" } else { "%d" };
                (format.to_owned(), Some(self.eval(*expr)))
            }
        };

        self.push(Op::PrintCall { format, arg });
    }

    /// Materializa un operando atómico en una local nueva.
    fn eval(&mut self, expr: IntExpr) -> Local {
        let into = self.alloc();
        match expr {
            IntExpr::Const(value) => self.push(Op::LoadConst(value, into)),
            IntExpr::Var(var) => self.push(Op::LoadVar(var, into)),
        }

        into
    }

    fn alloc(&mut self) -> Local {
        let local = Local(self.next_local);
        self.next_local += 1;
        local
    }

    fn push(&mut self, op: Op) {
        self.blocks[self.current.0].ops.push(op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cfg::build_blocks,
        lex::{tokenize_str, CmpOp, VarRef},
        parse::parse,
    };

    fn lower(source: &str) -> Result<ir::Program, EmitError> {
        let program = parse(tokenize_str(source).unwrap()).unwrap();
        let blocks = build_blocks(&program);
        emit(&program, &blocks)
    }

    fn var(letter: char) -> VarRef {
        VarRef::from_letter(letter).unwrap()
    }

    #[test]
    fn straight_line_program_emits_two_blocks_and_one_jump() {
        let module = lower("10 LET A = 5\n20 PRINT A").unwrap();
        let blocks = &module.entry.blocks;

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].terminator, Terminator::Jump(BlockId(1)));
        assert_eq!(blocks[1].terminator, Terminator::Return(0));
        assert!(blocks[1].ops.is_empty());
    }

    #[test]
    fn store_and_load_use_variable_slot_zero() {
        let module = lower("10 LET A = 5\n20 PRINT A").unwrap();
        let ops = &module.entry.blocks[0].ops;

        assert_eq!(
            *ops,
            vec![
                Op::LoadConst(5, Local(0)),
                Op::StoreVar(Local(0), var('A')),
                Op::LoadVar(var('A'), Local(1)),
                Op::PrintCall {
                    format: String::from("%d"),
                    arg: Some(Local(1)),
                },
            ]
        );

        assert_eq!(var('A').index(), 0);
    }

    #[test]
    fn conditional_branch_covers_both_edges() {
        let module = lower(
            "10 LET A = 1\n\
             20 IF A = 1 THEN GOTO 40\n\
             30 PRINTLN \"unreachable\"\n\
             40 PRINTLN \"reached\"",
        )
        .unwrap();

        let blocks = &module.entry.blocks;
        let labels: Vec<_> = blocks.iter().map(|block| block.label).collect();
        assert_eq!(labels, vec![10, 30, 40, 41]);

        // El bloque de entrada contiene el LET y el test del IF
        assert_eq!(
            blocks[0].terminator,
            Terminator::Branch {
                condition: Local(3),
                then_to: BlockId(2),
                else_to: BlockId(1),
            }
        );
        assert!(matches!(
            blocks[0].ops.last(),
            Some(Op::Compare(CmpOp::Eq, Local(3), Local(1), Local(2)))
        ));

        // El código muerto en 30 se emite igual, sin eliminación
        assert_eq!(
            blocks[1].ops,
            vec![Op::PrintCall {
                format: String::from("unreachable\n"),
                arg: None,
            }]
        );
        assert_eq!(blocks[1].terminator, Terminator::Jump(BlockId(2)));

        assert_eq!(blocks[2].terminator, Terminator::Jump(BlockId(3)));
        assert_eq!(blocks[3].terminator, Terminator::Return(0));
    }

    #[test]
    fn landing_after_branch_gets_no_fallthrough_edge() {
        // El bloque del IF ya fue terminado por su branch; el landing
        // inmediato no debe insertarle un segundo terminador
        let module = lower("10 IF A = 1 THEN GOTO 20\n20 PRINTLN \"x\"").unwrap();
        let blocks = &module.entry.blocks;

        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[0].terminator,
            Terminator::Branch {
                condition: Local(2),
                then_to: BlockId(1),
                else_to: BlockId(1),
            }
        );
        assert_eq!(blocks[1].terminator, Terminator::Jump(BlockId(2)));
    }

    #[test]
    fn final_if_falls_through_into_trailing_block() {
        let module = lower("10 LET A = 1\n20 IF A = 2 THEN GOTO 10").unwrap();
        let blocks = &module.entry.blocks;

        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0].terminator,
            Terminator::Branch {
                condition: Local(3),
                then_to: BlockId(0),
                else_to: BlockId(1),
            }
        );
        assert_eq!(blocks[1].terminator, Terminator::Return(0));
    }

    #[test]
    fn unresolved_goto_target_is_a_static_error() {
        let error = lower("10 IF 1 = 1 THEN GOTO 99").unwrap_err();
        assert!(matches!(
            error,
            EmitError::UnresolvedJumpTarget {
                from: 10,
                target: 99,
            }
        ));
    }

    #[test]
    fn block_count_matches_boundary_formula() {
        let source = "10 LET A = 1\n\
                      20 IF A = 1 THEN GOTO 50\n\
                      30 LET A = A + 1\n\
                      40 IF A > 3 THEN GOTO 20\n\
                      50 PRINTLN A";

        let program = parse(tokenize_str(source).unwrap()).unwrap();
        let blocks = build_blocks(&program);

        // {10} ∪ {50, 20} ∪ {30, 50} ∪ {51}
        assert_eq!(blocks.len(), 5);

        let module = emit(&program, &blocks).unwrap();
        assert_eq!(module.entry.blocks.len(), 5);
    }

    #[test]
    fn module_declares_printf_and_the_variable_store() {
        let module = lower("10 PRINT 1").unwrap();

        assert_eq!(module.externals.len(), 1);
        assert_eq!(module.externals[0].name, "printf");
        assert!(module.externals[0].variadic);

        assert_eq!(module.globals.len(), 1);
        assert_eq!(module.globals[0].name, "vars");
        assert_eq!(module.globals[0].elements, 26);

        assert_eq!(module.entry.name, "main");
    }
}

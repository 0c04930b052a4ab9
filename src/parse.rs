//! Análisis sintáctico.
//!
//! El parser agrupa el flujo de tokens en una tabla de instrucciones
//! indexada por etiqueta. Cada sentencia tiene aridad fija, por lo
//! cual no hay backtracking: se lee la etiqueta, se despacha sobre la
//! palabra clave y se consume la cantidad exacta de tokens antes de
//! exigir el fin de línea. Durante esta misma pasada se descubren los
//! destinos de salto ("landings") y los puntos de fallthrough, que
//! las fases posteriores usan para delimitar bloques básicos. El
//! orden ascendente de etiquetas no es incidental: el constructor de
//! grafo de control depende de él para encontrar sucesores.

use std::{
    collections::{BTreeMap, BTreeSet},
    iter::Peekable,
    ops::Bound,
};

use thiserror::Error;

use crate::{
    lex::{ArithOp, CmpOp, Keyword, Token, VarRef},
    source::{Located, Location},
};

/// Expresión entera atómica: constante o variable, sin anidamiento.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntExpr {
    Const(i32),
    Var(VarRef),
}

/// Carga útil de `PRINT`/`PRINTLN`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Str(String),
    Expr(IntExpr),
}

/// Una sentencia ya reconocida, sin su etiqueta.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Asignación, con operación binaria opcional.
    Let {
        target: VarRef,
        lhs: IntExpr,
        op: Option<(ArithOp, IntExpr)>,
    },

    /// Salto condicional hacia una etiqueta constante.
    If {
        lhs: IntExpr,
        cmp: CmpOp,
        rhs: IntExpr,
        target: i32,
    },

    Print(Payload),
    Println(Payload),
}

/// Tabla de instrucciones por etiqueta, junto a los conjuntos
/// derivados que delimitan bloques básicos.
#[derive(Debug)]
pub struct Program {
    instructions: BTreeMap<i32, Instruction>,
    jump_landings: BTreeSet<i32>,
    fallthrough_points: BTreeSet<i32>,
}

impl Program {
    /// Itera las instrucciones en orden ascendente de etiqueta.
    pub fn instructions(&self) -> impl Iterator<Item = (i32, &Instruction)> + '_ {
        self.instructions
            .iter()
            .map(|(&label, instruction)| (label, instruction))
    }

    /// Determina si una etiqueta nombra una instrucción.
    pub fn contains(&self, label: i32) -> bool {
        self.instructions.contains_key(&label)
    }

    /// Cantidad de instrucciones.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Etiqueta de la primera instrucción.
    pub fn first_label(&self) -> i32 {
        *self
            .instructions
            .keys()
            .next()
            .expect("parser guarantees at least one instruction")
    }

    /// Etiqueta de la última instrucción.
    pub fn last_label(&self) -> i32 {
        *self
            .instructions
            .keys()
            .next_back()
            .expect("parser guarantees at least one instruction")
    }

    /// Etiqueta inmediatamente siguiente en orden de programa.
    pub fn successor(&self, label: i32) -> Option<i32> {
        self.instructions
            .range((Bound::Excluded(label), Bound::Unbounded))
            .next()
            .map(|(&label, _)| label)
    }

    /// Etiquetas que son destino de algún `IF ... GOTO`.
    pub fn jump_landings(&self) -> &BTreeSet<i32> {
        &self.jump_landings
    }

    /// Etiquetas de los `IF`, cuya condición falsa continúa en la
    /// siguiente línea.
    pub fn fallthrough_points(&self) -> &BTreeSet<i32> {
        &self.fallthrough_points
    }
}

/// Error de análisis sintáctico.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected a line label, found {0}")]
    ExpectedLabel(Token),

    #[error("Expected a statement keyword, found {0}")]
    ExpectedStatement(Token),

    #[error("Expected a variable, found {0}")]
    ExpectedVar(Token),

    #[error("Expected a comparison operator, found {0}")]
    ExpectedCmp(Token),

    #[error("Expected an operand, found {0}")]
    ExpectedOperand(Token),

    #[error("`GOTO` target must be a constant label, found {0}")]
    ExpectedConstLabel(Token),

    #[error("Trailing tokens at end of line, found {0}")]
    ExpectedEol(Token),

    #[error("Duplicate label {0}")]
    DuplicateLabel(i32),

    #[error("Label {0} does not increase over previous label {1}")]
    DecreasingLabel(i32, i32),

    #[error("Program contains no statements")]
    EmptyProgram,

    #[error("Abrupt end of token stream")]
    UnexpectedEof,
}

/// Resultado del análisis sintáctico.
pub type Parse<T> = Result<T, Located<ParserError>>;

/// Dispone el flujo de tokens en una tabla de instrucciones.
pub fn parse(tokens: Vec<Located<Token>>) -> Parse<Program> {
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
        last_known: Location::default(),
        last_label: None,
    };

    parser.program()
}

struct Parser<I: Iterator<Item = Located<Token>>> {
    tokens: Peekable<I>,
    last_known: Location,
    last_label: Option<i32>,
}

impl<I: Iterator<Item = Located<Token>>> Parser<I> {
    fn program(&mut self) -> Parse<Program> {
        let mut program = Program {
            instructions: BTreeMap::new(),
            jump_landings: BTreeSet::new(),
            fallthrough_points: BTreeSet::new(),
        };

        while self.tokens.peek().is_some() {
            self.statement(&mut program)?;
        }

        if program.instructions.is_empty() {
            return self.fail(ParserError::EmptyProgram);
        }

        Ok(program)
    }

    fn statement(&mut self, program: &mut Program) -> Parse<()> {
        let label = self.label()?;

        let instruction = match self.next()?.into_inner() {
            Token::Keyword(Keyword::Let) => self.let_statement()?,
            Token::Keyword(Keyword::If) => self.if_statement(label, program)?,
            Token::Keyword(Keyword::Print) => Instruction::Print(self.payload()?),
            Token::Keyword(Keyword::Println) => Instruction::Println(self.payload()?),
            found => return self.fail(ParserError::ExpectedStatement(found)),
        };

        match self.next()?.into_inner() {
            Token::Eol => (),
            found => return self.fail(ParserError::ExpectedEol(found)),
        }

        program.instructions.insert(label, instruction);
        Ok(())
    }

    /// Lee una etiqueta y exige que crezca estrictamente.
    fn label(&mut self) -> Parse<i32> {
        let label = match self.next()?.into_inner() {
            Token::IntLiteral(label) => label,
            found => return self.fail(ParserError::ExpectedLabel(found)),
        };

        match self.last_label.replace(label) {
            Some(previous) if label == previous => self.fail(ParserError::DuplicateLabel(label)),
            Some(previous) if label < previous => {
                self.fail(ParserError::DecreasingLabel(label, previous))
            }

            _ => Ok(label),
        }
    }

    fn let_statement(&mut self) -> Parse<Instruction> {
        let target = match self.next()?.into_inner() {
            Token::Var(var) => var,
            found => return self.fail(ParserError::ExpectedVar(found)),
        };

        let lhs = self.operand()?;
        let op = match self.tokens.peek().map(Located::val) {
            Some(&Token::Op(op)) => {
                self.next()?;
                Some((op, self.operand()?))
            }

            _ => None,
        };

        Ok(Instruction::Let { target, lhs, op })
    }

    /// Reconoce un `IF` y registra su destino de salto y su punto de
    /// fallthrough en el programa.
    fn if_statement(&mut self, label: i32, program: &mut Program) -> Parse<Instruction> {
        let lhs = self.operand()?;
        let cmp = match self.next()?.into_inner() {
            Token::Cmp(cmp) => cmp,
            found => return self.fail(ParserError::ExpectedCmp(found)),
        };

        let rhs = self.operand()?;
        let target = match self.next()?.into_inner() {
            Token::IntLiteral(target) => target,
            found => return self.fail(ParserError::ExpectedConstLabel(found)),
        };

        program.jump_landings.insert(target);
        program.fallthrough_points.insert(label);

        Ok(Instruction::If {
            lhs,
            cmp,
            rhs,
            target,
        })
    }

    fn payload(&mut self) -> Parse<Payload> {
        match self.next()?.into_inner() {
            Token::StrLiteral(string) => Ok(Payload::Str(string)),
            Token::IntLiteral(value) => Ok(Payload::Expr(IntExpr::Const(value))),
            Token::Var(var) => Ok(Payload::Expr(IntExpr::Var(var))),
            found => self.fail(ParserError::ExpectedOperand(found)),
        }
    }

    fn operand(&mut self) -> Parse<IntExpr> {
        match self.next()?.into_inner() {
            Token::IntLiteral(value) => Ok(IntExpr::Const(value)),
            Token::Var(var) => Ok(IntExpr::Var(var)),
            found => self.fail(ParserError::ExpectedOperand(found)),
        }
    }

    fn next(&mut self) -> Parse<Located<Token>> {
        match self.tokens.next() {
            Some(token) => {
                self.last_known = token.location().clone();
                Ok(token)
            }

            None => self.fail(ParserError::UnexpectedEof),
        }
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Located::at(error, self.last_known.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::tokenize_str;

    fn program(source: &str) -> Program {
        parse(tokenize_str(source).unwrap()).unwrap()
    }

    fn parse_error(source: &str) -> ParserError {
        parse(tokenize_str(source).unwrap())
            .unwrap_err()
            .into_inner()
    }

    #[test]
    fn one_instruction_per_source_line() {
        let program = program(
            "10 LET A = 1\n\
             20 IF A = 1 THEN GOTO 40\n\
             30 PRINTLN \"unreachable\"\n\
             40 PRINTLN \"reached\"",
        );

        assert_eq!(program.len(), 4);
        assert_eq!(program.first_label(), 10);
        assert_eq!(program.last_label(), 40);
    }

    #[test]
    fn if_registers_landing_and_fallthrough() {
        let program = program("10 LET A = 1\n20 IF A = 1 THEN GOTO 40\n40 PRINT A");

        assert!(program.jump_landings().contains(&40));
        assert!(program.fallthrough_points().contains(&20));
        assert!(!program.fallthrough_points().contains(&10));
    }

    #[test]
    fn let_without_operator_has_no_op() {
        let program = program("10 LET A = 5");

        match program.instructions().next() {
            Some((10, Instruction::Let { lhs, op, .. })) => {
                assert_eq!(*lhs, IntExpr::Const(5));
                assert_eq!(*op, None);
            }

            other => panic!("unexpected instruction: {:?}", other),
        };
    }

    #[test]
    fn let_with_operator_couples_op_and_rhs() {
        let program = program("10 LET A = B / 2");

        match program.instructions().next() {
            Some((10, Instruction::Let { op, .. })) => {
                assert_eq!(*op, Some((ArithOp::Div, IntExpr::Const(2))));
            }

            other => panic!("unexpected instruction: {:?}", other),
        };
    }

    #[test]
    fn print_accepts_constant_payload() {
        let program = program("10 PRINT 42\n20 PRINTLN 43");

        let instructions: Vec<_> = program.instructions().collect();
        assert_eq!(
            *instructions[0].1,
            Instruction::Print(Payload::Expr(IntExpr::Const(42)))
        );
        assert_eq!(
            *instructions[1].1,
            Instruction::Println(Payload::Expr(IntExpr::Const(43)))
        );
    }

    #[test]
    fn successor_follows_program_order() {
        let program = program("10 LET A = 1\n25 PRINT A\n40 PRINT A");

        assert_eq!(program.successor(10), Some(25));
        assert_eq!(program.successor(25), Some(40));
        assert_eq!(program.successor(40), None);
    }

    #[test]
    fn rejects_duplicate_label() {
        let error = parse_error("10 LET A = 1\n10 PRINT A");
        assert!(matches!(error, ParserError::DuplicateLabel(10)));
    }

    #[test]
    fn rejects_decreasing_label() {
        let error = parse_error("20 LET A = 1\n10 PRINT A");
        assert!(matches!(error, ParserError::DecreasingLabel(10, 20)));
    }

    #[test]
    fn rejects_variable_goto_target() {
        let error = parse_error("10 IF 1 = 1 THEN GOTO A");
        assert!(matches!(error, ParserError::ExpectedConstLabel(_)));
    }

    #[test]
    fn rejects_empty_program() {
        let error = parse_error("");
        assert!(matches!(error, ParserError::EmptyProgram));
    }
}

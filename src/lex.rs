//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. El lenguaje de entrada es
//! estrictamente orientado a líneas: cada línea consiste de una
//! etiqueta numérica seguida de exactamente una sentencia (`LET`,
//! `IF`, `PRINT` o `PRINTLN`). Por lo tanto, el lexer descompone la
//! entrada línea por línea, despachando sobre la palabra clave para
//! decidir la forma del resto de la sentencia, y emite un
//! [`Token::Eol`] al final de cada línea para que el parser pueda
//! reconocer fronteras de sentencia.
//!
//! # Contenido de un token
//! Este lexer no produce lexemas para casos donde no son necesarios.
//! Los separadores fijos de cada sentencia (el `=` de `LET`, las
//! palabras `THEN` y `GOTO` de `IF`) se validan y consumen sin emitir
//! token alguno. Las constantes literales se resuelven a sus valores
//! en vez de preservar sus lexemas. Las variables se resuelven a su
//! índice dentro del almacén de 26 celdas.
//!
//! # Reglas importantes del lenguaje
//! - Las palabras clave son case-insensitive.
//! - Las variables son una única letra mayúscula `A`-`Z`.
//! - Los literales de cadena van entre comillas dobles, preservan
//!   espacios interiores y no procesan secuencias de escape.
//!
//! # Errores
//! El lexer falla ante el primer error encontrado; no se retorna
//! lista parcial de tokens ni hay recuperación dentro de una línea.

use crate::source::{Located, Location};
use std::{
    fmt::{self, Display},
    io,
    str::FromStr,
};

use thiserror::Error;

// Case-insensitive
pub use unicase::Ascii as NoCase;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el lector de líneas.
    #[error("I/O error")]
    Input(#[from] io::Error),

    /// La línea no comienza con una etiqueta entera.
    #[error("Line must begin with a numeric label")]
    MissingLabel,

    /// La etiqueta no está seguida de sentencia alguna.
    #[error("Expected a statement keyword after the label")]
    MissingKeyword,

    /// Palabra clave de sentencia desconocida.
    #[error("Unknown statement keyword `{0}`")]
    UnknownKeyword(String),

    /// `LET` sin su `=` en la posición esperada.
    #[error("`LET` must take the form `LET X = <expression>`")]
    MalformedLet,

    /// `IF` sin `THEN GOTO` en las posiciones esperadas.
    #[error("`IF` must take the form `IF <condition> THEN GOTO <label>`")]
    MalformedIf,

    /// Operador aritmético desconocido.
    #[error("Unknown arithmetic operator `{0}`")]
    UnknownOp(String),

    /// Operador de comparación desconocido.
    #[error("Unknown comparison operator `{0}`")]
    UnknownCmp(String),

    /// Se esperaba una variable `A`-`Z`.
    #[error("Expected a variable `A`-`Z`, found `{0}`")]
    ExpectedVar(String),

    /// Se esperaba un literal entero o una variable.
    #[error("Expected an integer literal or a variable `A`-`Z`, found `{0}`")]
    BadOperand(String),

    /// La sentencia terminó antes de uno de sus operandos.
    #[error("Expected an operand")]
    MissingOperand,

    /// Literal de cadena sin comilla de cierre.
    #[error("Unterminated string literal")]
    UnterminatedString,

    /// Sobra texto luego de una sentencia completa.
    #[error("Trailing input after statement")]
    TrailingInput,
}

/// Referencia a una de las 26 variables `A`-`Z`.
///
/// El programa generado respalda estas variables con un único arreglo
/// global de 26 enteros; una referencia es el índice dentro del mismo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VarRef(u8);

impl VarRef {
    /// Construye a partir de una letra mayúscula.
    pub fn from_letter(letter: char) -> Option<Self> {
        if letter.is_ascii_uppercase() {
            Some(VarRef(letter as u8 - b'A'))
        } else {
            None
        }
    }

    /// Obtiene el índice dentro del almacén de variables.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Obtiene la letra original.
    pub fn letter(self) -> char {
        (b'A' + self.0) as char
    }
}

impl Display for VarRef {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.letter())
    }
}

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Fin de línea.
    Eol,

    /// Literal de cadena.
    StrLiteral(String),

    /// Literal de entero.
    IntLiteral(i32),

    /// Referencia a variable.
    Var(VarRef),

    /// Operador aritmético.
    Op(ArithOp),

    /// Operador de comparación.
    Cmp(CmpOp),

    /// Palabra clave.
    Keyword(Keyword),
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Eol => fmt.write_str("end of line"),
            StrLiteral(string) => write!(fmt, "string literal {:?}", string),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            Var(var) => write!(fmt, "variable `{}`", var),
            Op(op) => write!(fmt, "operator `{}`", op),
            Cmp(cmp) => write!(fmt, "comparison `{}`", cmp),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
        }
    }
}

/// Una palabra clave de sentencia.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Let,
    If,
    Print,
    Println,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;

        let string = match self {
            Let => "LET",
            If => "IF",
            Print => "PRINT",
            Println => "PRINTLN",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(NoCase<&str>, Keyword)] = &[
            (NoCase::new("LET"), Let),
            (NoCase::new("IF"), If),
            (NoCase::new("PRINT"), Print),
            (NoCase::new("PRINTLN"), Println),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == NoCase::new(string))
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Un operador aritmético binario.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl Display for ArithOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ArithOp::*;

        let string = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
        };

        fmt.write_str(string)
    }
}

impl FromStr for ArithOp {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use ArithOp::*;

        match string {
            "+" => Ok(Add),
            "-" => Ok(Sub),
            "*" => Ok(Mul),
            "/" => Ok(Div),
            _ => Err(()),
        }
    }
}

/// Un operador de comparación con signo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Lt,
    Gt,
    Ne,
    Le,
    Ge,
}

impl Display for CmpOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CmpOp::*;

        let string = match self {
            Eq => "=",
            Lt => "<",
            Gt => ">",
            Ne => "<>",
            Le => "<=",
            Ge => ">=",
        };

        fmt.write_str(string)
    }
}

impl FromStr for CmpOp {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use CmpOp::*;

        match string {
            "=" => Ok(Eq),
            "<" => Ok(Lt),
            ">" => Ok(Gt),
            "<>" => Ok(Ne),
            "<=" => Ok(Le),
            ">=" => Ok(Ge),
            _ => Err(()),
        }
    }
}

/// Resultado del análisis léxico.
pub type Lex<T> = Result<T, Located<LexerError>>;

/// Reduce la entrada a una secuencia de tokens o al primer error
/// léxico encontrado.
pub fn tokenize<I>(lines: I) -> Lex<Vec<Located<Token>>>
where
    I: IntoIterator<Item = Result<Located<String>, Located<io::Error>>>,
{
    let mut tokens = Vec::new();
    for line in lines {
        let line = line.map_err(|error| error.map(LexerError::Input))?;

        let (location, text) = line.split();
        let mut scanner = Scanner {
            rest: &text,
            location,
        };

        scanner.line(&mut tokens)?;
    }

    Ok(tokens)
}

/// Cursor sobre una única línea de entrada.
struct Scanner<'a> {
    rest: &'a str,
    location: Location,
}

impl<'a> Scanner<'a> {
    /// Escanea la línea completa, delimitada por un [`Token::Eol`].
    fn line(&mut self, tokens: &mut Vec<Located<Token>>) -> Lex<()> {
        let label = match self.word() {
            Some(word) => match word.parse() {
                Ok(label) => label,
                Err(_) => return self.fail(LexerError::MissingLabel),
            },
            None => return self.fail(LexerError::MissingLabel),
        };

        tokens.push(self.locate(Token::IntLiteral(label)));

        let keyword = match self.word() {
            Some(word) => match word.parse() {
                Ok(keyword) => keyword,
                Err(()) => return self.fail(LexerError::UnknownKeyword(word.to_owned())),
            },
            None => return self.fail(LexerError::MissingKeyword),
        };

        tokens.push(self.locate(Token::Keyword(keyword)));
        match keyword {
            Keyword::Let => self.let_statement(tokens)?,
            Keyword::If => self.if_statement(tokens)?,
            Keyword::Print | Keyword::Println => self.payload(tokens)?,
        }

        if !self.at_end() {
            return self.fail(LexerError::TrailingInput);
        }

        tokens.push(self.locate(Token::Eol));
        Ok(())
    }

    /// `LET <var> = <operando> [<op> <operando>]`.
    ///
    /// La presencia del segundo operando se detecta por agotamiento
    /// de la línea luego del primero.
    fn let_statement(&mut self, tokens: &mut Vec<Located<Token>>) -> Lex<()> {
        let target = self.variable()?;
        tokens.push(self.locate(Token::Var(target)));

        match self.word() {
            Some("=") => (),
            _ => return self.fail(LexerError::MalformedLet),
        }

        let operand = self.operand()?;
        tokens.push(operand);

        if !self.at_end() {
            let op = self.arith_op()?;
            tokens.push(op);

            let operand = self.operand()?;
            tokens.push(operand);
        }

        Ok(())
    }

    /// `IF <operando> <cmp> <operando> THEN GOTO <operando>`.
    fn if_statement(&mut self, tokens: &mut Vec<Located<Token>>) -> Lex<()> {
        let lhs = self.operand()?;
        tokens.push(lhs);

        let cmp = self.cmp_op()?;
        tokens.push(cmp);

        let rhs = self.operand()?;
        tokens.push(rhs);

        for expected in &["THEN", "GOTO"] {
            match self.word() {
                Some(word) if NoCase::new(word) == NoCase::new(*expected) => (),
                _ => return self.fail(LexerError::MalformedIf),
            }
        }

        let target = self.operand()?;
        tokens.push(target);
        Ok(())
    }

    /// Carga útil de `PRINT`/`PRINTLN`: cadena, entero o variable.
    fn payload(&mut self, tokens: &mut Vec<Located<Token>>) -> Lex<()> {
        self.skip_spaces();

        if let Some(rest) = self.rest.strip_prefix('"') {
            match rest.find('"') {
                Some(end) => {
                    tokens.push(self.locate(Token::StrLiteral(rest[..end].to_owned())));
                    self.rest = &rest[end + 1..];
                    Ok(())
                }

                None => self.fail(LexerError::UnterminatedString),
            }
        } else {
            let operand = self.operand()?;
            tokens.push(operand);
            Ok(())
        }
    }

    /// Un literal entero o una referencia a variable.
    fn operand(&mut self) -> Lex<Located<Token>> {
        let word = match self.word() {
            Some(word) => word,
            None => return self.fail(LexerError::MissingOperand),
        };

        if let Ok(value) = word.parse() {
            return Ok(self.locate(Token::IntLiteral(value)));
        }

        let mut chars = word.chars();
        match (chars.next().and_then(VarRef::from_letter), chars.next()) {
            (Some(var), None) => Ok(self.locate(Token::Var(var))),
            _ => self.fail(LexerError::BadOperand(word.to_owned())),
        }
    }

    /// Una referencia a variable, obligatoriamente.
    fn variable(&mut self) -> Lex<VarRef> {
        let word = match self.word() {
            Some(word) => word,
            None => return self.fail(LexerError::MissingOperand),
        };

        let mut chars = word.chars();
        match (chars.next().and_then(VarRef::from_letter), chars.next()) {
            (Some(var), None) => Ok(var),
            _ => self.fail(LexerError::ExpectedVar(word.to_owned())),
        }
    }

    fn arith_op(&mut self) -> Lex<Located<Token>> {
        let word = match self.word() {
            Some(word) => word,
            None => return self.fail(LexerError::MissingOperand),
        };

        match word.parse() {
            Ok(op) => Ok(self.locate(Token::Op(op))),
            Err(()) => self.fail(LexerError::UnknownOp(word.to_owned())),
        }
    }

    fn cmp_op(&mut self) -> Lex<Located<Token>> {
        let word = match self.word() {
            Some(word) => word,
            None => return self.fail(LexerError::MissingOperand),
        };

        match word.parse() {
            Ok(cmp) => Ok(self.locate(Token::Cmp(cmp))),
            Err(()) => self.fail(LexerError::UnknownCmp(word.to_owned())),
        }
    }

    /// Obtiene la siguiente palabra delimitada por espacios.
    fn word(&mut self) -> Option<&'a str> {
        self.skip_spaces();
        if self.rest.is_empty() {
            return None;
        }

        let end = self
            .rest
            .find(char::is_whitespace)
            .unwrap_or_else(|| self.rest.len());

        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(word)
    }

    fn skip_spaces(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn at_end(&mut self) -> bool {
        self.skip_spaces();
        self.rest.is_empty()
    }

    fn locate<T>(&self, value: T) -> Located<T> {
        Located::at(value, self.location.clone())
    }

    fn fail<T>(&self, error: LexerError) -> Lex<T> {
        Err(self.locate(error))
    }
}

/// Tokeniza directamente desde un string, para módulos de prueba.
#[cfg(test)]
pub(crate) fn tokenize_str(source: &str) -> Lex<Vec<Located<Token>>> {
    tokenize(crate::source::lines(source.as_bytes(), "test.bas"))
}

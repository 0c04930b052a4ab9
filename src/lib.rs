//! Compilador de BASIC mínimo con numeración de líneas.
//!
//! # Front end
//! Cada programa deriva de un único archivo de código fuente. Este
//! archivo se somete primero a análisis léxico en [`lex`], de lo cual
//! se obtiene un flujo de tokens. El flujo de tokens se dispone en una
//! tabla de instrucciones ordenada por etiqueta por medio de análisis
//! sintáctico en [`parse`]; el lenguaje carece de anidamiento, por lo
//! que no existe un árbol sintáctico propiamente dicho.
//!
//! # Back end
//! El programa se particiona en bloques básicos en [`cfg`] a partir de
//! sus etiquetas y destinos de salto, luego cada instrucción se baja a
//! la representación intermedia descrita en [`ir`] por medio de
//! [`emit`]. El módulo resultante se serializa como listado textual en
//! [`target`].

#[macro_use]
mod macros;

pub mod cfg;
pub mod emit;
pub mod error;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod source;

mod codegen;

/// Emisión del artefacto final.
///
/// Este módulo reexporta la serialización textual del módulo generado.
pub mod target {
    pub use crate::codegen::write;
}

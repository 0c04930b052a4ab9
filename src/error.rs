//! Presentación de diagnósticos.
//!
//! La pipeline de compilación falla ante el primer error encontrado.
//! Los errores de cada fase identifican su clase y ubicación, pero no
//! formatean prosa para una persona; ese es el trabajo de este módulo.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

/// Un error con ubicación conocida en el código fuente.
pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Un diagnóstico listo para mostrarse a una persona.
pub struct Diagnostic {
    kind: &'static str,
    error: Box<dyn 'static + LocatedError>,
}

impl Diagnostic {
    /// Cambia la clase reportada ("error" por defecto).
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostic { kind, ..self }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostic {
    fn from(error: E) -> Self {
        Diagnostic {
            kind: "error",
            error: Box::new(error),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "{}: {}", self.kind, self.error.source())?;
        write!(fmt, " --> {}", self.error.location())
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el compilador construye
//! deben llevar cuenta de la posición en el código fuente original
//! de la cual derivan, lo cual permite señalar un punto exacto
//! en donde ocurre un error de abstracción arbitraria. Debido a
//! que la gramática de entrada es estrictamente orientada a líneas,
//! una ubicación se reduce a un origen y un número de línea.

use std::{
    fmt::{self, Debug, Display, Formatter},
    io::{self, BufRead},
    rc::Rc,
};

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Una ubicación está conformada por un origen y un número de línea.
#[derive(Clone, PartialEq, Eq)]
pub struct Location {
    from: Rc<str>,
    line: u32,
}

impl Location {
    /// Obtiene el número de línea, empezando por 1.
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl Default for Location {
    fn default() -> Self {
        Location {
            from: Rc::from(""),
            line: 0,
        }
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.from, self.line)
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Transforma un flujo de entrada estándar en uno que itera por línea.
///
/// Cada línea emitida queda asociada a la ubicación que le corresponde
/// en el origen. Los errores de E/S también quedan ubicados, de manera
/// que el tokenizador puede reportarlos sin contexto adicional.
pub fn lines<R, S>(
    reader: R,
    name: S,
) -> impl Iterator<Item = Result<Located<String>, Located<io::Error>>>
where
    R: BufRead,
    S: Into<String>,
{
    let from: Rc<str> = Rc::from(name.into());

    reader.lines().enumerate().map(move |(index, line)| {
        let location = Location {
            from: Rc::clone(&from),
            line: index as u32 + 1,
        };

        match line {
            Ok(line) => Ok(Located::at(line, location)),
            Err(error) => Err(Located::at(error, location)),
        }
    })
}

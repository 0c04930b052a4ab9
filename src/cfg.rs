//! Partición del programa en bloques básicos.
//!
//! Un bloque básico es una corrida máxima de instrucciones en línea
//! recta con una única entrada y un único terminador. Las fronteras
//! de bloque se determinan por completo a partir de etiquetas, sin
//! dependencia alguna de la representación intermedia: debe comenzar
//! bloque toda etiqueta que sea destino de salto, toda etiqueta que
//! siga inmediatamente a un `IF` (su condición falsa cae ahí desde
//! otro camino que el salto explícito), la primera instrucción del
//! programa, y una etiqueta sintética final para que un `IF` en la
//! última línea siempre tenga destino de fallthrough. Este conjunto
//! es exactamente el corte mínimo de vértices necesario para colocar
//! instrucciones de salto.
//!
//! Los bloques se crean una única vez, en orden ascendente de
//! etiqueta, y nunca se funden ni eliminan después.

use std::collections::{BTreeMap, BTreeSet};

use crate::parse::Program;

/// Identificador de un bloque básico.
///
/// Es un índice dentro del vector de bloques de la función generada,
/// asignado en orden ascendente de etiqueta.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

/// Mapa de etiqueta de inicio a bloque básico.
#[derive(Debug)]
pub struct BlockMap {
    by_label: BTreeMap<i32, BlockId>,
}

impl BlockMap {
    /// Obtiene el bloque que comienza exactamente en una etiqueta.
    pub fn get(&self, label: i32) -> Option<BlockId> {
        self.by_label.get(&label).copied()
    }

    /// Obtiene el bloque sintético final.
    pub fn trailing(&self) -> BlockId {
        *self
            .by_label
            .values()
            .next_back()
            .expect("a block map always includes the trailing block")
    }

    /// Itera fronteras en orden ascendente de etiqueta.
    pub fn labels(&self) -> impl Iterator<Item = (i32, BlockId)> + '_ {
        self.by_label.iter().map(|(&label, &id)| (label, id))
    }

    /// Cantidad de bloques.
    pub fn len(&self) -> usize {
        self.by_label.len()
    }
}

/// Determina las fronteras de bloque de un programa.
pub fn build_blocks(program: &Program) -> BlockMap {
    let mut labels = BTreeSet::new();

    labels.insert(program.first_label());
    labels.extend(program.jump_landings().iter().copied());

    for &point in program.fallthrough_points() {
        if let Some(successor) = program.successor(point) {
            labels.insert(successor);
        }
    }

    // Bloque final, necesario para programas que terminan en IF
    labels.insert(program.last_label() + 1);

    let by_label = labels
        .into_iter()
        .enumerate()
        .map(|(index, label)| (label, BlockId(index)))
        .collect();

    BlockMap { by_label }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::tokenize_str, parse::parse};

    fn blocks(source: &str) -> BlockMap {
        build_blocks(&parse(tokenize_str(source).unwrap()).unwrap())
    }

    #[test]
    fn straight_line_program_has_entry_and_trailing_blocks() {
        let blocks = blocks("10 LET A = 1\n20 PRINT A");

        assert_eq!(blocks.len(), 2);
        let labels: Vec<_> = blocks.labels().map(|(label, _)| label).collect();
        assert_eq!(labels, vec![10, 21]);
    }

    #[test]
    fn fallthrough_successor_opens_a_block() {
        // La etiqueta 30 no es destino de salto, pero sigue a un IF
        let blocks = blocks(
            "10 LET A = 1\n\
             20 IF A = 1 THEN GOTO 40\n\
             30 PRINTLN \"unreachable\"\n\
             40 PRINTLN \"reached\"",
        );

        let labels: Vec<_> = blocks.labels().map(|(label, _)| label).collect();
        assert_eq!(labels, vec![10, 30, 40, 41]);
    }

    #[test]
    fn block_ids_follow_ascending_label_order() {
        let blocks = blocks("10 IF 1 = 1 THEN GOTO 30\n20 PRINT 1\n30 PRINT 2");

        let ids: Vec<_> = blocks.labels().map(|(_, id)| id).collect();
        assert_eq!(ids, vec![BlockId(0), BlockId(1), BlockId(2), BlockId(3)]);
        assert_eq!(blocks.get(30), Some(BlockId(2)));
        assert_eq!(blocks.trailing(), BlockId(3));
    }

    #[test]
    fn final_if_adds_no_successor_beyond_trailing() {
        let blocks = blocks("10 LET A = 1\n20 IF A = 2 THEN GOTO 10");

        // 10 es primera instrucción y landing a la vez; 21 es el
        // bloque final que sirve de fallthrough al IF en 20
        let labels: Vec<_> = blocks.labels().map(|(label, _)| label).collect();
        assert_eq!(labels, vec![10, 21]);
    }
}

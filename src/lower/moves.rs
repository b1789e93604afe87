//! Cycle decomposer.
//!
//! Partitions the pair set of one permutation into disjoint cycles and
//! chains over register indices.  From any unchecked pair we first walk
//! backwards (following `out_reg == head`) until we either revisit the
//! starting pair's output register (a cycle) or run out of producers (the
//! head of a chain, whose previous inhabitant is dead), then walk forwards
//! from that start recording registers.

use smallvec::SmallVec;

use super::pairs::RegPair;
use crate::ir::Reg;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MoveKind {
    Cycle,
    Chain,
}

pub(crate) struct PermMove {
    pub kind: MoveKind,
    pub elems: SmallVec<[Reg; 8]>,
}

pub(crate) fn decompose_pairs(pairs: &mut [RegPair]) -> Vec<PermMove> {
    let mut moves = Vec::new();
    while let Some(start) = pairs.iter().position(|p| !p.checked) {
        moves.push(extract_move(pairs, start));
    }
    moves
}

fn extract_move(pairs: &mut [RegPair], start: usize) -> PermMove {
    let start_out = pairs[start].out_reg;

    // Backward walk to the start of the move.
    let mut head = pairs[start].in_reg;
    while head != start_out {
        match pairs.iter().position(|p| p.out_reg == head) {
            Some(i) => head = pairs[i].in_reg,
            None => break,
        }
    }
    let kind = if head == start_out {
        MoveKind::Cycle
    } else {
        MoveKind::Chain
    };

    // Forward walk, recording every register and checking off the pairs it
    // spans.
    let mut elems: SmallVec<[Reg; 8]> = SmallVec::new();
    elems.push(head);
    let mut cursor = head;
    loop {
        match pairs.iter().position(|p| p.in_reg == cursor) {
            Some(i) => {
                pairs[i].checked = true;
                let next = pairs[i].out_reg;
                if kind == MoveKind::Cycle && next == head {
                    break;
                }
                elems.push(next);
                cursor = next;
            }
            None => break,
        }
    }

    PermMove { kind, elems }
}

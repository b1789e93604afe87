//! Post-register-allocation lowering of permutation nodes.
//!
//! The driver walks every block; each permutation is first offered to
//! push-through, and whatever remains of it is decomposed into register
//! pairs, cycles and chains, and emitted as concrete copies and exchanges.

mod emit;
mod free_regs;
mod moves;
mod pairs;
mod push_through;

pub use free_regs::FreeRegs;

use tracing::debug;

use crate::analysis::Liveness;
use crate::error::LoweringError;
use crate::ir::{Context, Function, Value};

use moves::{decompose_pairs, MoveKind};
use pairs::build_pairs;

/// Options for the lowering pass.
pub struct LowerConfig {
    /// Allow the emitter to break cycles with copies through a free scratch
    /// register.  When off (or when no register is free), cycles are broken
    /// with pairwise exchanges instead.
    pub use_copies: bool,
}

impl Default for LowerConfig {
    fn default() -> LowerConfig {
        LowerConfig { use_copies: true }
    }
}

/// Lower every permutation node in `function` to copies and exchanges.
///
/// Preconditions: the schedule exists and every data value carries an
/// assigned physical register.  On return no permutation of arity greater
/// than two remains, and the surviving arity-2 perms are bare exchanges.
/// The liveness analysis is consumed: it is stale after this pass and must
/// be recomputed by anyone needing it again.
pub fn lower_nodes_after_ra(
    context: &mut Context,
    function: Function,
    liveness: Liveness,
    config: &LowerConfig,
) -> Result<(), LoweringError> {
    let free_regs = FreeRegs::compute(context, function, &liveness)?;

    for block in function.block_iter(context) {
        for node in block.sched_vec(context) {
            if !node.is_alive(context) || !node.is_perm(context) {
                continue;
            }
            if push_through::push_through(context, &liveness, node)? {
                lower_perm_node(context, node, &free_regs, config)?;
            }
        }
    }
    Ok(())
}

/// Try to sink independent predecessors past `perm`, shrinking it.  Returns
/// `true` when the perm still requires lowering and `false` when it was
/// eliminated entirely.
pub fn push_through_perm(
    context: &mut Context,
    liveness: &Liveness,
    perm: Value,
) -> Result<bool, LoweringError> {
    push_through::push_through(context, liveness, perm)
}

fn lower_perm_node(
    context: &mut Context,
    perm: Value,
    free_regs: &FreeRegs,
    config: &LowerConfig,
) -> Result<(), LoweringError> {
    let block = perm.block(context);
    if !block.is_scheduled(context, perm) {
        return Err(LoweringError::NotScheduled(perm.describe(context)));
    }

    let mut pairs = build_pairs(context, perm)?;
    if pairs.is_empty() {
        // Pure identity permutation; everything was spliced away.
        block.sched_remove(context, perm);
        perm.kill(context);
        return Ok(());
    }

    let arity = perm.arity(context);
    let moves = decompose_pairs(&mut pairs);

    // An arity-2 perm forming a single cycle already is an exchange; leave
    // it alone.
    if arity == 2 && moves.len() == 1 && moves[0].kind == MoveKind::Cycle {
        debug!("{} kept as a bare exchange", perm.describe(context));
        return Ok(());
    }

    let scratch = if config.use_copies {
        free_regs.scratch_for(perm)
    } else {
        None
    };

    debug!(
        "lowering {} into {} move(s)",
        perm.describe(context),
        moves.len()
    );
    let mut point = block.sched_prev(context, perm);
    for mv in &moves {
        point = emit::emit_move(context, block, &mut pairs, mv, scratch, point)?;
    }

    block.sched_remove(context, perm);
    perm.kill(context);
    Ok(())
}

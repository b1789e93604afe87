//! Perm push-through.
//!
//! Before lowering a permutation, try to sink the instructions scheduled
//! immediately before it past it.  A candidate may sink when its output is
//! one of the perm's operands: instead of being shuffled, the candidate is
//! rescheduled after the perm and writes straight into the projection's
//! register, and the slot disappears.  Every sunk slot shrinks the
//! permutation; sinking all of them removes it entirely.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::analysis::{data_defs, data_uses, Liveness};
use crate::error::LoweringError;
use crate::ir::{Context, NodeKind, RegClass, Value};

/// Returns `true` when the perm still requires lowering, `false` when it was
/// eliminated entirely.
pub(crate) fn push_through(
    context: &mut Context,
    liveness: &Liveness,
    perm: Value,
) -> Result<bool, LoweringError> {
    let block = perm.block(context);
    if !block.is_scheduled(context, perm) {
        return Err(LoweringError::NotScheduled(perm.describe(context)));
    }

    let projs = perm.projections(context);
    let cls = match projs.first().and_then(|q| q.register(context)) {
        Some(reg) => reg.class(context),
        None => return Ok(true),
    };

    let frontier = find_frontier(context, liveness, perm, cls, &projs);

    let arity = perm.arity(context);
    let mut moved = vec![false; arity];
    let mut n_moved = 0;

    loop {
        let candidate = match block.sched_prev(context, perm) {
            Some(c) => c,
            None => break,
        };
        // Movable nodes sit strictly between the frontier and the perm.
        if Some(candidate) == frontier {
            break;
        }

        // The candidate's single output, possibly seen through a
        // projection, must be an operand of the perm.
        let defs = data_defs(context, candidate);
        if defs.len() != 1 {
            break;
        }
        let operand = defs[0];
        let slot = (0..arity).find(|&i| !moved[i] && perm.operand(context, i) == Some(operand));
        let slot = match slot {
            Some(s) => s,
            None => break,
        };
        let proj = match perm
            .projections(context)
            .into_iter()
            .find(|q| q.proj_index(context) == Some(slot))
        {
            Some(q) => q,
            None => break,
        };

        let movable_kind = match candidate.kind(context) {
            NodeKind::Instr(info) => {
                !info.modifies_flags && info.out_reqs.iter().all(|req| req.is_normal())
            }
            NodeKind::Copy { unspillable } => !*unspillable,
            _ => false,
        };
        if !movable_kind {
            break;
        }

        // Moving a node that reads the perm's class past the perm would
        // stretch those operands' live ranges across it.
        let inflates_pressure = candidate.operands(context).iter().any(|op| {
            op.mode(context).is_data()
                && op
                    .register(context)
                    .map(|r| r.class(context) == cls)
                    .unwrap_or(false)
        });
        if inflates_pressure {
            break;
        }

        let reg = proj
            .register(context)
            .ok_or_else(|| LoweringError::MissingRegister(proj.describe(context)))?;

        debug!(
            "sinking {} past {} into {}",
            candidate.describe(context),
            perm.describe(context),
            reg.name(context)
        );
        block.sched_remove(context, candidate);
        block.insert_after(context, perm, candidate);
        operand.set_register(context, reg);
        proj.replace_uses(context, operand);
        proj.kill(context);
        moved[slot] = true;
        n_moved += 1;
    }

    if n_moved == 0 {
        return Ok(true);
    }
    if n_moved == arity {
        debug!("{} eliminated by push-through", perm.describe(context));
        block.sched_remove(context, perm);
        perm.kill(context);
        return Ok(false);
    }

    // Shrink: keep only the slots that did not move and renumber the
    // surviving projections contiguously.
    let old_operands = perm.operands(context);
    let mut remap: FxHashMap<usize, usize> = FxHashMap::default();
    let mut new_operands = Vec::with_capacity(arity - n_moved);
    for (i, op) in old_operands.iter().enumerate() {
        if !moved[i] {
            remap.insert(i, new_operands.len());
            new_operands.push(*op);
        }
    }
    for proj in perm.projections(context) {
        let old = proj.proj_index(context).unwrap();
        proj.set_proj_index(context, remap[&old]);
    }
    perm.set_operands(context, new_operands);
    debug!(
        "{} shrunk to arity {} by push-through",
        perm.describe(context),
        arity - n_moved
    );
    Ok(true)
}

/// The nearest preceding instruction that lets a value of the perm's class
/// die: one of its operands does not interfere with the perm's projections,
/// so its live range ends before the perm.  The perm may not conceptually
/// move above such an instruction, since the dead value would become live
/// across it and raise the register pressure by one.
fn find_frontier(
    context: &Context,
    liveness: &Liveness,
    perm: Value,
    cls: RegClass,
    projs: &[Value],
) -> Option<Value> {
    let block = perm.block(context);
    let one_proj = projs[0];
    let mut cursor = block.sched_prev(context, perm);
    while let Some(node) = cursor {
        let kills = data_uses(context, node).into_iter().any(|op| {
            op.register(context)
                .map(|r| r.class(context) == cls)
                .unwrap_or(false)
                && !liveness.values_interfere(context, op, one_proj)
        });
        if kills {
            return Some(node);
        }
        cursor = block.sched_prev(context, node);
    }
    None
}

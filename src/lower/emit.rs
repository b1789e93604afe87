//! Move emitter.
//!
//! Replaces one cycle or chain with concrete copy and exchange nodes,
//! inserted into the schedule right before the permutation, and re-points
//! the permutation's projections onto the new nodes so their users are
//! untouched.
//!
//! Chains become `k - 1` copies emitted from the tail backward, so no source
//! register is overwritten before it is read.  Cycles become either
//! `k + 1` copies through a scratch register, or `k - 1` two-register
//! exchanges; an exchange is a fresh arity-2 perm whose projection 0 carries
//! the higher element and projection 1 the lower one.  When exchanges are
//! chained, the "other" projection of each exchange is a new intermediate
//! that becomes the in-value of the next one down.

use tracing::debug;

use super::moves::{MoveKind, PermMove};
use super::pairs::RegPair;
use crate::error::LoweringError;
use crate::ir::{Block, Context, Reg, Value};

pub(crate) fn emit_move(
    context: &mut Context,
    block: Block,
    pairs: &mut [RegPair],
    mv: &PermMove,
    scratch: Option<Reg>,
    mut point: Option<Value>,
) -> Result<Option<Value>, LoweringError> {
    let elems = &mv.elems;
    let k = elems.len();
    debug_assert!(k >= 2);

    match mv.kind {
        MoveKind::Chain => {
            for i in (0..k - 1).rev() {
                point = Some(emit_copy_into(
                    context,
                    block,
                    pairs,
                    elems[i],
                    elems[i + 1],
                    point,
                )?);
            }
        }
        MoveKind::Cycle => match scratch {
            Some(scratch) if k > 2 => {
                debug!(
                    "lowering {}-cycle with scratch register {}",
                    k,
                    scratch.name(context)
                );
                // Save the last element, rotate the rest as a chain, then
                // restore the saved value into the first element.
                let saved_src = in_value(context, pairs, elems[k - 1])?;
                let saved = Value::new_copy(context, block, saved_src, false);
                saved.set_register(context, scratch);
                block.insert_after_point(context, point, saved);
                point = Some(saved);

                for i in (0..k - 1).rev() {
                    point = Some(emit_copy_into(
                        context,
                        block,
                        pairs,
                        elems[i],
                        elems[i + 1],
                        point,
                    )?);
                }

                let restore = Value::new_copy(context, block, saved, false);
                restore.set_register(context, elems[0]);
                let proj = out_proj(context, pairs, elems[0])?;
                proj.replace_uses(context, restore);
                proj.kill(context);
                block.insert_after_point(context, point, restore);
                point = Some(restore);
            }
            _ => {
                debug!("lowering {}-cycle with exchanges", k);
                for i in (0..=k - 2).rev() {
                    let in_lo = in_value(context, pairs, elems[i])?;
                    let in_hi = in_value(context, pairs, elems[i + 1])?;
                    let xchg = Value::new_perm(context, block, vec![in_lo, in_hi]);

                    // The original projection for the higher register becomes
                    // this exchange's projection 0.
                    let q_hi = out_proj(context, pairs, elems[i + 1])?;
                    q_hi.set_operand(context, 0, xchg);
                    q_hi.set_proj_index(context, 0);

                    if i > 0 {
                        // The cycle is not done yet: the value previously in
                        // the higher register now sits in the lower one, so a
                        // fresh intermediate projection feeds the next
                        // exchange down.
                        let inter = Value::new_proj(context, xchg, 1);
                        inter.set_register(context, elems[i]);
                        set_in_value(context, pairs, elems[i], inter)?;
                    } else {
                        let q_lo = out_proj(context, pairs, elems[0])?;
                        q_lo.set_operand(context, 0, xchg);
                        q_lo.set_proj_index(context, 1);
                    }

                    block.insert_after_point(context, point, xchg);
                    point = Some(xchg);
                }
            }
        },
    }

    Ok(point)
}

/// One copy realizing the pair `src_reg -> dst_reg`; the permutation's
/// projection for `dst_reg` is replaced by the copy.
fn emit_copy_into(
    context: &mut Context,
    block: Block,
    pairs: &mut [RegPair],
    src_reg: Reg,
    dst_reg: Reg,
    point: Option<Value>,
) -> Result<Value, LoweringError> {
    let src = in_value(context, pairs, src_reg)?;
    let cpy = Value::new_copy(context, block, src, false);
    cpy.set_register(context, dst_reg);

    let proj = out_proj(context, pairs, dst_reg)?;
    proj.replace_uses(context, cpy);
    proj.kill(context);

    block.insert_after_point(context, point, cpy);
    Ok(cpy)
}

fn in_value(context: &Context, pairs: &[RegPair], reg: Reg) -> Result<Value, LoweringError> {
    pairs
        .iter()
        .find(|p| p.in_reg == reg)
        .map(|p| p.in_value)
        .ok_or_else(|| {
            LoweringError::MalformedGraph(format!("no pair consumes register {}", reg.name(context)))
        })
}

fn set_in_value(
    context: &Context,
    pairs: &mut [RegPair],
    reg: Reg,
    value: Value,
) -> Result<(), LoweringError> {
    pairs
        .iter_mut()
        .find(|p| p.in_reg == reg)
        .map(|p| p.in_value = value)
        .ok_or_else(|| {
            LoweringError::MalformedGraph(format!("no pair consumes register {}", reg.name(context)))
        })
}

fn out_proj(context: &Context, pairs: &[RegPair], reg: Reg) -> Result<Value, LoweringError> {
    pairs
        .iter()
        .find(|p| p.out_reg == reg)
        .map(|p| p.out_value)
        .ok_or_else(|| {
            LoweringError::MalformedGraph(format!("no pair produces register {}", reg.name(context)))
        })
}

//! Constraint assurer.
//!
//! An instruction whose output must occupy a register distinct from one of
//! its inputs gets an unspillable copy of that input scheduled before it and
//! a keep edge scheduled after it.  The keep makes the copy and the
//! instruction's output simultaneously live, so any subsequent allocation or
//! verification is forced to give them distinct registers.  After all
//! instructions are processed, redundant copy-keeps are melted, SSA form is
//! reconstructed per copied value, and copy-keeps left without users are
//! demoted to plain keeps.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::LoweringError;
use crate::ir::{Context, Function, Mode, RegClass, Value};
use crate::ssa;

struct OpCopyEntry {
    #[allow(dead_code)]
    cls: Option<RegClass>,
    copies: IndexSet<Value>,
}

type OpCopyTable = IndexMap<Value, OpCopyEntry>;

/// Enforce every `must_differ` output requirement in `function`.
///
/// Precondition: the schedule exists.  Postcondition: for every constrained
/// output there is an unspillable copy of the offending operand and a keep
/// binding the two; running the pass again leaves the graph unchanged.
pub fn assure_constraints(context: &mut Context, function: Function) -> Result<(), LoweringError> {
    let mut table: OpCopyTable = IndexMap::new();

    for block in function.block_iter(context) {
        for node in block.sched_vec(context) {
            match node.mode(context) {
                Mode::Tuple => {
                    for proj in node.projections(context) {
                        assure_different(context, proj, node, &mut table)?;
                    }
                }
                Mode::Data => assure_different(context, node, node, &mut table)?,
                Mode::Control => (),
            }
        }
    }

    melt_copykeeps(context, &mut table);

    // Reconstruct SSA form per copied value: the definitions are the value
    // itself plus every copy made of it; users get re-pointed to whichever
    // definition dominates them.
    let entries: Vec<(Value, Vec<Value>)> = table
        .iter()
        .map(|(value, entry)| (*value, entry.copies.iter().copied().collect()))
        .collect();
    for (original, copies) in entries {
        ssa::reconstruct(context, function, original, &copies)?;

        // Not every copy-keep is really needed; the ones that ended up with
        // no users become plain keeps.
        for cp in copies {
            if cp.is_copy_keep(context) && !cp.has_users(context) {
                let block = cp.block(context);
                let keep = Value::new_keep(context, block, cp.operands(context));
                block.sched_replace(context, cp, keep);
                cp.kill(context);
            }
        }
    }

    Ok(())
}

fn assure_different(
    context: &mut Context,
    out_val: Value,
    skipped: Value,
    table: &mut OpCopyTable,
) -> Result<(), LoweringError> {
    let req = out_val.output_req(context);
    if req.must_differ == 0 {
        return Ok(());
    }

    // A should-be-same x must-differ pair over the same operand is vacuous.
    if req.must_differ.count_ones() == 1 && req.should_be_same.count_ones() == 1 {
        let idx_other = req.must_differ.trailing_zeros() as usize;
        let idx_same = req.should_be_same.trailing_zeros() as usize;
        let other = skipped.operand(context, idx_other);
        let same = skipped.operand(context, idx_same);
        if other.is_some() && other == same {
            return Ok(());
        }
    }

    let arity = skipped.arity(context);
    for pos in 0..u32::BITS as usize {
        if req.must_differ & (1u32 << pos) == 0 {
            continue;
        }
        let other = skipped
            .operand(context, pos)
            .ok_or(LoweringError::ConstraintOperandOutOfRange { pos, arity })?;
        gen_different_pattern(context, out_val, skipped, other, table)?;
    }
    Ok(())
}

fn gen_different_pattern(
    context: &mut Context,
    out_val: Value,
    skipped: Value,
    other: Value,
    table: &mut OpCopyTable,
) -> Result<(), LoweringError> {
    if !other.mode(context).is_data() {
        return Ok(());
    }
    let block = out_val.block(context);
    let anchor = out_val.skip_proj(context);
    if !block.is_scheduled(context, anchor) {
        return Err(LoweringError::NotScheduled(anchor.describe(context)));
    }

    // Already enforced on a previous run: the operand is an unspillable copy
    // a keep already binds to this output.
    if already_enforced(context, out_val, anchor, other) {
        return Ok(());
    }

    // The operand could be defined in a block far away; an unspillable copy
    // right before the instruction pins it down.  Reuse one if the schedule
    // already has it.
    let cpy = match find_copy(context, anchor, other) {
        Some(existing) => {
            debug!(
                "reusing {} for {}",
                existing.describe(context),
                other.describe(context)
            );
            existing
        }
        None => {
            let cpy = Value::new_copy(context, block, other, true);
            // Put it above the run of copies directly preceding the
            // instruction.
            let mut point = anchor;
            while let Some(prev) = block.sched_prev(context, point) {
                if prev.is_copy(context) {
                    point = prev;
                } else {
                    break;
                }
            }
            block.insert_before(context, point, cpy);
            debug!(
                "created {} for {}",
                cpy.describe(context),
                other.describe(context)
            );
            cpy
        }
    };

    // If the value has other users its live range survives anyway, so a
    // copy-keep tracks the constrained output; otherwise a plain keep binds
    // output and copy.
    let has_other_users = other
        .users(context)
        .iter()
        .any(|&(user, _)| user != cpy && user != skipped && user.skip_proj(context) != anchor);
    let keep = if has_other_users {
        let keep = Value::new_copy_keep(context, block, cpy, vec![out_val]);
        block.insert_after(context, anchor, keep);
        Some(keep)
    } else {
        let keep = Value::new_keep(context, block, vec![out_val, cpy]);
        block.insert_after(context, anchor, keep);
        None
    };

    let entry = table.entry(other).or_insert_with(|| OpCopyEntry {
        cls: other.register(context).map(|r| r.class(context)),
        copies: IndexSet::new(),
    });
    entry.copies.insert(cpy);
    if let Some(keep) = keep {
        entry.copies.insert(keep);
    }
    Ok(())
}

fn already_enforced(context: &Context, out_val: Value, anchor: Value, other: Value) -> bool {
    if !other.is_unspillable_copy(context) {
        return false;
    }
    other.users(context).iter().any(|&(user, _)| {
        if user.is_keep(context) {
            user.operands(context)
                .iter()
                .any(|&op| op == out_val || op == anchor)
        } else if user.is_copy_keep(context) {
            user.operand(context, 0) == Some(other)
                && user.operands(context)[1..]
                    .iter()
                    .any(|&op| op == out_val || op == anchor)
        } else {
            false
        }
    })
}

/// Scan backward from `anchor`, crossing only copy nodes, for an existing
/// unspillable copy of `src`.
fn find_copy(context: &Context, anchor: Value, src: Value) -> Option<Value> {
    let block = anchor.block(context);
    let mut cursor = block.sched_prev(context, anchor);
    while let Some(node) = cursor {
        if !node.is_copy(context) {
            return None;
        }
        if node.is_unspillable_copy(context) && node.operand(context, 0) == Some(src) {
            return Some(node);
        }
        cursor = block.sched_prev(context, node);
    }
    None
}

/// Fuse copy-keeps that keep outputs of the same underlying tuple node into
/// one copy-keep with several kept inputs, scheduled right after the keep
/// run following that node.
fn melt_copykeeps(context: &mut Context, table: &mut OpCopyTable) {
    for entry in table.values_mut() {
        let copykeeps: Vec<Value> = entry
            .copies
            .iter()
            .copied()
            .filter(|c| c.is_copy_keep(context))
            .collect();
        if copykeeps.len() < 2 {
            continue;
        }

        let mut groups: IndexMap<Value, Vec<Value>> = IndexMap::new();
        for ck in copykeeps {
            let target = ck.operand(context, 1).unwrap().skip_proj(context);
            groups.entry(target).or_default().push(ck);
        }

        for (target, group) in groups {
            if group.len() < 2 {
                continue;
            }
            debug!("melting {} copy-keeps behind one node", group.len());
            let src = group[0].operand(context, 0).unwrap();
            let block = group[0].block(context);

            let mut kept: Vec<Value> = Vec::new();
            for ck in &group {
                for op in &ck.operands(context)[1..] {
                    if !kept.contains(op) {
                        kept.push(*op);
                    }
                }
            }
            for ck in &group {
                entry.copies.shift_remove(ck);
                block.sched_remove(context, *ck);
                ck.kill(context);
            }

            let fused = Value::new_copy_keep(context, block, src, kept);
            let mut point = target;
            while let Some(next) = block.sched_next(context, point) {
                if next.is_keep(context) || next.is_copy_keep(context) {
                    point = next;
                } else {
                    break;
                }
            }
            block.insert_after(context, point, fused);
            entry.copies.insert(fused);
        }
    }
}

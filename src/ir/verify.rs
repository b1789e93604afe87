//! Structural verifier.
//!
//! Checks the graph invariants the lowering passes rely on: coherent
//! operand/user edges, projection indices in range, permutations confined to
//! one register class with equal input/output register multisets, and
//! schedule/block agreement.  The test suites run this after every
//! transformation.

use rustc_hash::FxHashSet;

use crate::error::LoweringError;

use super::*;

pub fn verify(context: &Context, function: Function) -> Result<(), LoweringError> {
    let mut seen: FxHashSet<Value> = FxHashSet::default();

    for block in function.block_iter(context) {
        for node in block.sched_vec(context) {
            if node.block(context) != block {
                return Err(LoweringError::MalformedGraph(format!(
                    "{} scheduled in a block it does not belong to",
                    node.describe(context)
                )));
            }
            if !seen.insert(node) {
                return Err(LoweringError::MalformedGraph(format!(
                    "{} scheduled more than once",
                    node.describe(context)
                )));
            }
            verify_edges(context, node)?;
            for proj in node.projections(context) {
                verify_edges(context, proj)?;
                let index = proj.proj_index(context).unwrap();
                // A perm's outputs mirror its operands; other tuple nodes
                // declare their output count through their requirements.
                let n_outputs = match node.kind(context) {
                    NodeKind::Perm => Some(node.arity(context)),
                    NodeKind::Instr(info) if node.mode(context) == Mode::Tuple => {
                        Some(info.out_reqs.len())
                    }
                    _ => None,
                };
                if let Some(n) = n_outputs {
                    if index >= n {
                        return Err(LoweringError::ProjIndexOutOfRange { index, arity: n });
                    }
                }
            }
            if node.is_perm(context) {
                verify_perm(context, node)?;
            }
        }
    }
    Ok(())
}

fn verify_edges(context: &Context, node: Value) -> Result<(), LoweringError> {
    for (pos, op) in node.operands(context).iter().enumerate() {
        if !op.is_alive(context) {
            return Err(LoweringError::MalformedGraph(format!(
                "{} has a dead operand at position {}",
                node.describe(context),
                pos
            )));
        }
        if !op.users(context).iter().any(|&(u, p)| u == node && p == pos) {
            return Err(LoweringError::MalformedGraph(format!(
                "operand edge {} -> {} not mirrored in the users list",
                node.describe(context),
                op.describe(context)
            )));
        }
    }
    for (user, pos) in node.users(context) {
        if user.operand(context, pos) != Some(node) {
            return Err(LoweringError::MalformedGraph(format!(
                "user edge {} -> {} not mirrored in the operands list",
                node.describe(context),
                user.describe(context)
            )));
        }
    }
    Ok(())
}

fn verify_perm(context: &Context, perm: Value) -> Result<(), LoweringError> {
    let mut cls = None;
    let mut ins: Vec<Reg> = Vec::new();
    for op in perm.operands(context) {
        let reg = op
            .register(context)
            .ok_or_else(|| LoweringError::MissingRegister(op.describe(context)))?;
        check_class(context, &mut cls, reg)?;
        ins.push(reg);
    }
    let mut outs: Vec<Reg> = Vec::new();
    for proj in perm.projections(context) {
        let reg = proj
            .register(context)
            .ok_or_else(|| LoweringError::MissingRegister(proj.describe(context)))?;
        check_class(context, &mut cls, reg)?;
        outs.push(reg);
    }

    // A perm with all projections attached must shuffle exactly the
    // registers it consumes.
    if outs.len() == ins.len() {
        let key = |r: &Reg| r.global_index(context);
        ins.sort_by_key(key);
        outs.sort_by_key(key);
        if ins != outs {
            return Err(LoweringError::MalformedGraph(format!(
                "{} input/output register multisets differ",
                perm.describe(context)
            )));
        }
    }
    Ok(())
}

fn check_class(
    context: &Context,
    cls: &mut Option<RegClass>,
    reg: Reg,
) -> Result<(), LoweringError> {
    let reg_cls = reg.class(context);
    match cls {
        None => *cls = Some(reg_cls),
        Some(expected) if *expected != reg_cls => {
            return Err(LoweringError::MixedRegisterClasses(
                expected.name(context).to_owned(),
                reg_cls.name(context).to_owned(),
            ));
        }
        _ => (),
    }
    Ok(())
}

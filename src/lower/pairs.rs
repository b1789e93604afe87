//! Pair builder.
//!
//! Turns a permutation node into its working set of register pairs.  Slots
//! whose operand and projection carry the same register are no-ops: the
//! projection's users are spliced onto the operand and the slot is dropped.
//! Everything that remains satisfies `in_reg != out_reg`.

use tracing::trace;

use crate::error::LoweringError;
use crate::ir::{Context, Reg, RegClass, Value};

pub(crate) struct RegPair {
    pub in_reg: Reg,
    pub in_value: Value,
    pub out_reg: Reg,
    pub out_value: Value,
    pub checked: bool,
}

pub(crate) fn build_pairs(
    context: &mut Context,
    perm: Value,
) -> Result<Vec<RegPair>, LoweringError> {
    let mut pairs = Vec::new();
    let mut cls: Option<RegClass> = None;

    for proj in perm.projections(context) {
        let index = proj.proj_index(context).unwrap();
        let operand = perm
            .operand(context, index)
            .ok_or(LoweringError::ProjIndexOutOfRange {
                index,
                arity: perm.arity(context),
            })?;
        let in_reg = operand
            .register(context)
            .ok_or_else(|| LoweringError::MissingRegister(operand.describe(context)))?;
        let out_reg = proj
            .register(context)
            .ok_or_else(|| LoweringError::MissingRegister(proj.describe(context)))?;
        check_class(context, &mut cls, in_reg)?;
        check_class(context, &mut cls, out_reg)?;

        if in_reg == out_reg {
            // No-op slot: the value already sits where it must end up.
            trace!(
                "eliding no-op slot {} of {}",
                in_reg.name(context),
                perm.describe(context)
            );
            proj.replace_uses(context, operand);
            proj.kill(context);
        } else {
            pairs.push(RegPair {
                in_reg,
                in_value: operand,
                out_reg,
                out_value: proj,
                checked: false,
            });
        }
    }

    Ok(pairs)
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

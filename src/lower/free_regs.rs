//! Free-register oracle.
//!
//! Run once per function before lowering.  For every permutation node, walk
//! its block in reverse from the end, applying inverse liveness (definition
//! kills, use gens) over the physical registers of the perm's class, until
//! the perm is reached; the perm's own operands count as uses.  The first
//! allocatable register by class index that is not live at that point is the
//! perm's scratch register.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::analysis::{data_defs, data_uses, Liveness};
use crate::error::LoweringError;
use crate::ir::{Context, Function, Reg, RegClass, Value};

pub struct FreeRegs {
    map: FxHashMap<Value, Reg>,
}

impl FreeRegs {
    pub fn compute(
        context: &Context,
        function: Function,
        liveness: &Liveness,
    ) -> Result<FreeRegs, LoweringError> {
        let mut map = FxHashMap::default();

        for block in function.block_iter(context) {
            let sched = block.sched_vec(context);
            for perm in sched.iter().copied().filter(|n| n.is_perm(context)) {
                let cls = match perm_class(context, perm) {
                    Some(cls) => cls,
                    None => continue,
                };

                let mut live: FxHashSet<Reg> = liveness
                    .live_at_end(&block)
                    .iter()
                    .filter_map(|v| v.register(context))
                    .filter(|r| r.class(context) == cls && !r.is_virtual(context))
                    .collect();

                for node in sched.iter().copied().rev() {
                    if node == perm {
                        // The perm consumes its operands, so their registers
                        // are live at its position.
                        for used in data_uses(context, node) {
                            track(context, &mut live, cls, used, true);
                        }
                        break;
                    }
                    for def in data_defs(context, node) {
                        track(context, &mut live, cls, def, false);
                    }
                    for used in data_uses(context, node) {
                        track(context, &mut live, cls, used, true);
                    }
                }

                let free = cls.regs(context).into_iter().find(|reg| {
                    !reg.is_virtual(context)
                        && function.is_allocatable(context, *reg)
                        && !live.contains(reg)
                });
                if let Some(reg) = free {
                    debug!(
                        "free register {} available for {}",
                        reg.name(context),
                        perm.describe(context)
                    );
                    map.insert(perm, reg);
                }
            }
        }

        Ok(FreeRegs { map })
    }

    pub fn scratch_for(&self, perm: Value) -> Option<Reg> {
        self.map.get(&perm).copied()
    }
}

fn perm_class(context: &Context, perm: Value) -> Option<RegClass> {
    perm.projections(context)
        .first()
        .and_then(|q| q.register(context))
        .or_else(|| perm.operand(context, 0).and_then(|op| op.register(context)))
        .map(|r| r.class(context))
}

fn track(context: &Context, live: &mut FxHashSet<Reg>, cls: RegClass, value: Value, gen: bool) {
    if let Some(reg) = value.register(context) {
        if reg.class(context) == cls && !reg.is_virtual(context) {
            if gen {
                live.insert(reg);
            } else {
                live.remove(&reg);
            }
        }
    }
}

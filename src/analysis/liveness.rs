//! Liveness oracle.
//!
//! Classic backward dataflow over the block graph.  A value becomes live at
//! its uses and dies at its definition; a projection's definition point is
//! its parent's schedule position.  Keep and copy-keep nodes count as
//! ordinary users, which is exactly how they extend live ranges.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ir::{Block, Context, Function, Mode, Value};

pub struct Liveness {
    live_in: FxHashMap<Block, FxHashSet<Value>>,
    live_out: FxHashMap<Block, FxHashSet<Value>>,
}

/// The schedule position a value is defined at: itself, or the parent for a
/// projection.
pub fn def_node(context: &Context, value: Value) -> Value {
    value.skip_proj(context)
}

/// The data values a node consumes.
pub fn data_uses(context: &Context, node: Value) -> Vec<Value> {
    node.operands(context)
        .into_iter()
        .filter(|op| op.mode(context).is_data())
        .collect()
}

/// The data values a node defines: itself, or its projections for a
/// tuple-mode node.
pub fn data_defs(context: &Context, node: Value) -> Vec<Value> {
    match node.mode(context) {
        Mode::Data => vec![node],
        Mode::Tuple => node.projections(context),
        Mode::Control => vec![],
    }
}

impl Liveness {
    pub fn compute(context: &Context, function: Function) -> Liveness {
        let blocks: Vec<Block> = function.block_iter(context).collect();
        let mut live_in: FxHashMap<Block, FxHashSet<Value>> = FxHashMap::default();
        let mut live_out: FxHashMap<Block, FxHashSet<Value>> = FxHashMap::default();
        for block in &blocks {
            live_in.insert(*block, FxHashSet::default());
            live_out.insert(*block, FxHashSet::default());
        }

        let mut changed = true;
        while changed {
            changed = false;
            for block in blocks.iter().rev() {
                let mut out: FxHashSet<Value> = FxHashSet::default();
                for succ in block.successors(context) {
                    out.extend(live_in[&succ].iter().copied());
                }

                let mut live = out.clone();
                for node in block.sched_vec(context).into_iter().rev() {
                    for def in data_defs(context, node) {
                        live.remove(&def);
                    }
                    for used in data_uses(context, node) {
                        live.insert(used);
                    }
                }

                if out != live_out[block] {
                    live_out.insert(*block, out);
                    changed = true;
                }
                if live != live_in[block] {
                    live_in.insert(*block, live);
                    changed = true;
                }
            }
        }

        Liveness { live_in, live_out }
    }

    pub fn live_at_end<'a>(&'a self, block: &Block) -> &'a FxHashSet<Value> {
        &self.live_out[block]
    }

    pub fn live_at_entry<'a>(&'a self, block: &Block) -> &'a FxHashSet<Value> {
        &self.live_in[block]
    }

    /// Whether two values are simultaneously live anywhere: one of them is
    /// still live at the other's definition point.
    pub fn values_interfere(&self, context: &Context, a: Value, b: Value) -> bool {
        if a == b {
            return false;
        }
        self.live_past_def(context, a, b) || self.live_past_def(context, b, a)
    }

    /// Is `a` live at the definition point of `x`?
    fn live_past_def(&self, context: &Context, a: Value, x: Value) -> bool {
        let def_x = def_node(context, x);
        let block = def_x.block(context);
        let sched = block.sched_vec(context);
        let pos = |node: Value| sched.iter().position(|&n| n == node);

        let def_a = def_node(context, a);
        let x_pos = match pos(def_x) {
            Some(p) => p,
            None => return false,
        };

        // Is `a` defined at all at x's position?
        let a_defined_before = if def_a.block(context) == block {
            match pos(def_a) {
                Some(p) => p < x_pos,
                None => false,
            }
        } else {
            self.live_in[&block].contains(&a)
        };
        if !a_defined_before {
            return false;
        }

        if self.live_out[&block].contains(&a) {
            return true;
        }

        // Any use of `a` after x's definition in this block?
        a.users(context).iter().any(|&(user, _)| {
            let user_def = def_node(context, user);
            user_def.block(context) == block
                && matches!(pos(user_def), Some(p) if p > x_pos)
        })
    }
}

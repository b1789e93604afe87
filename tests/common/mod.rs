//! Shared fixtures: a small register file, graph builders for permutation
//! scenarios, and a register-file simulator that executes a lowered
//! schedule.

#![allow(dead_code)]

use std::collections::HashMap;

use ra_lowering::ir::{
    Block, Context, Function, InstrInfo, Mode, NodeKind, Reg, RegClass, Value,
};

pub fn gp_class(ctx: &mut Context, n: usize) -> RegClass {
    let names: Vec<String> = (0..n).map(|i| format!("r{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    RegClass::new(ctx, "gp", &refs)
}

pub struct PermGraph {
    pub func: Function,
    pub block: Block,
    pub cls: RegClass,
    pub perm: Value,
    pub sources: Vec<Value>,
    pub projs: Vec<Value>,
    pub sink: Value,
}

/// One source instruction per input register, an optional flags-clobbering
/// barrier (which pins the sources in place against push-through), the perm,
/// its projections, and a sink consuming every projection so they stay live.
///
/// `inputs[i]` is the class-local register index of operand `i`;
/// `outs` lists `(slot, register index)` for the projections to create;
/// slots without an entry model dead permutation outputs.
pub fn build_perm_graph(
    ctx: &mut Context,
    cls: RegClass,
    inputs: &[usize],
    outs: &[(usize, usize)],
    barrier: bool,
) -> PermGraph {
    let func = Function::new(ctx, "f");
    let block = func.entry_block(ctx);

    let mut sources = Vec::new();
    for &src in inputs {
        let def = Value::new_instr(ctx, block, InstrInfo::simple("ldr"), Mode::Data, vec![]);
        def.set_register(ctx, cls.reg(ctx, src).unwrap());
        block.append(ctx, def);
        sources.push(def);
    }

    if barrier {
        let cmp = Value::new_instr(
            ctx,
            block,
            InstrInfo {
                name: "cmp".to_owned(),
                modifies_flags: true,
                out_reqs: vec![Default::default()],
            },
            Mode::Data,
            vec![],
        );
        block.append(ctx, cmp);
    }

    let perm = Value::new_perm(ctx, block, sources.clone());
    block.append(ctx, perm);

    let mut projs = Vec::new();
    for &(slot, dst) in outs {
        let proj = Value::new_proj(ctx, perm, slot);
        proj.set_register(ctx, cls.reg(ctx, dst).unwrap());
        projs.push(proj);
    }

    let sink = Value::new_instr(ctx, block, InstrInfo::simple("use"), Mode::Data, projs.clone());
    block.append(ctx, sink);

    PermGraph {
        func,
        block,
        cls,
        perm,
        sources,
        projs,
        sink,
    }
}

/// Execute the block's schedule over an abstract register file.  Ordinary
/// instructions write themselves into their register; copies transfer
/// whatever their source's register holds; arity-2 perms are exchanges and
/// swap their operands' registers.
pub fn run_schedule(ctx: &Context, block: Block) -> HashMap<Reg, Value> {
    let mut file: HashMap<Reg, Value> = HashMap::new();
    for node in block.sched_vec(ctx) {
        match node.kind(ctx) {
            NodeKind::Instr(_) => {
                if let Some(reg) = node.register(ctx) {
                    file.insert(reg, node);
                }
            }
            NodeKind::Copy { .. } => {
                let src = node.operand(ctx, 0).unwrap();
                let src_reg = src.register(ctx).unwrap();
                let value = file.get(&src_reg).copied().unwrap_or(src);
                file.insert(node.register(ctx).unwrap(), value);
            }
            NodeKind::Perm => {
                assert_eq!(node.arity(ctx), 2, "only exchanges survive lowering");
                let a = node.operand(ctx, 0).unwrap().register(ctx).unwrap();
                let b = node.operand(ctx, 1).unwrap().register(ctx).unwrap();
                let va = file.get(&a).copied();
                let vb = file.get(&b).copied();
                match vb {
                    Some(v) => file.insert(a, v),
                    None => file.remove(&a),
                };
                match va {
                    Some(v) => file.insert(b, v),
                    None => file.remove(&b),
                };
            }
            _ => (),
        }
    }
    file
}

/// Scheduled nodes of the given kinds, in order.
pub fn count_kind(ctx: &Context, block: Block, pred: impl Fn(&NodeKind) -> bool) -> usize {
    block
        .sched_vec(ctx)
        .into_iter()
        .filter(|n| pred(n.kind(ctx)))
        .count()
}

/// Maximum number of simultaneously live values of `cls` anywhere in the
/// block.
pub fn max_pressure(ctx: &Context, func: Function, block: Block, cls: RegClass) -> usize {
    use ra_lowering::analysis::{data_defs, data_uses, Liveness};
    use std::collections::HashSet;

    let lv = Liveness::compute(ctx, func);
    let in_cls = |v: Value| {
        v.register(ctx)
            .map(|r| r.class(ctx) == cls)
            .unwrap_or(false)
    };

    let mut live: HashSet<Value> = lv
        .live_at_end(&block)
        .iter()
        .copied()
        .filter(|v| in_cls(*v))
        .collect();
    let mut max = live.len();
    for node in block.sched_vec(ctx).into_iter().rev() {
        for def in data_defs(ctx, node) {
            live.remove(&def);
        }
        for used in data_uses(ctx, node) {
            if in_cls(used) {
                live.insert(used);
            }
        }
        max = max.max(live.len());
    }
    max
}

//! Deterministic textual dump of a function.
//!
//! Values are numbered in schedule order (projections directly after their
//! parent, in index order), so two structurally identical graphs print the
//! same text regardless of node identity.  The test suites compare these
//! dumps.

use std::fmt::Write;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use super::*;

pub fn to_string(context: &Context, function: Function) -> String {
    let mut numbers: FxHashMap<Value, usize> = FxHashMap::default();
    let mut next = 0;

    // Number everything first so operand references never dangle.
    for block in function.block_iter(context) {
        for node in block.sched_vec(context) {
            number(context, &mut numbers, &mut next, node);
        }
    }

    let mut out = String::new();
    writeln!(out, "fn {}:", function.name(context)).unwrap();
    for block in function.block_iter(context) {
        writeln!(out, "{}:", block.label(context)).unwrap();
        for node in block.sched_vec(context) {
            write_node(context, &numbers, &mut out, node, 2);
            for proj in node.projections(context) {
                write_node(context, &numbers, &mut out, proj, 4);
            }
        }
    }
    out
}

fn number(context: &Context, numbers: &mut FxHashMap<Value, usize>, next: &mut usize, node: Value) {
    numbers.insert(node, *next);
    *next += 1;
    for proj in node.projections(context) {
        numbers.insert(proj, *next);
        *next += 1;
    }
}

fn write_node(
    context: &Context,
    numbers: &FxHashMap<Value, usize>,
    out: &mut String,
    node: Value,
    indent: usize,
) {
    let name = |value: Value| match numbers.get(&value) {
        Some(n) => format!("v{}", n),
        None => "v?".to_owned(),
    };
    let operand_list = |ops: &[Value]| ops.iter().map(|op| name(*op)).join(", ");

    let operands = node.operands(context);
    let body = match node.kind(context) {
        NodeKind::Instr(info) => format!("instr {} ({})", info.name, operand_list(&operands)),
        NodeKind::Perm => format!("perm ({})", operand_list(&operands)),
        NodeKind::Proj(index) => format!("proj {} {}", name(operands[0]), index),
        NodeKind::Copy { unspillable: false } => format!("copy {}", name(operands[0])),
        NodeKind::Copy { unspillable: true } => format!("ucopy {}", name(operands[0])),
        NodeKind::Keep => format!("keep ({})", operand_list(&operands)),
        NodeKind::CopyKeep => format!(
            "copykeep {} keep ({})",
            name(operands[0]),
            operand_list(&operands[1..])
        ),
    };

    let reg = match node.register(context) {
        Some(reg) => format!(" -> {}", reg.name(context)),
        None => String::new(),
    };

    writeln!(out, "{:indent$}{} = {}{}", "", name(node), body, reg, indent = indent).unwrap();
}

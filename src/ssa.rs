//! SSA reconstruction service.
//!
//! After a pass introduces extra definitions (copies) of a value, every user
//! of the original must be re-pointed to whichever definition dominates it.
//! All definitions handed to [`reconstruct`] copy the same abstract value,
//! so any dominating choice is semantically the identity; the service picks
//! the nearest one (latest earlier definition within the user's block,
//! immediate-dominator walk across blocks).  A user no definition dominates
//! means the graph is corrupt.

use petgraph::algo::dominators::{self, Dominators};
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::analysis::def_node;
use crate::error::LoweringError;
use crate::ir::{Block, Context, Function, Value};

pub fn reconstruct(
    context: &mut Context,
    function: Function,
    original: Value,
    defs: &[Value],
) -> Result<(), LoweringError> {
    let mut all_defs: Vec<Value> = Vec::with_capacity(defs.len() + 1);
    all_defs.push(original);
    for def in defs {
        if !all_defs.contains(def) {
            all_defs.push(*def);
        }
    }

    let doms = block_dominators(context, function);

    for (user, pos) in original.users(context) {
        if all_defs.contains(&user) {
            continue;
        }
        let chosen = dominating_def(context, &doms, &all_defs, user)?;
        if chosen != original {
            trace!(
                "ssa: repointing {} operand {} to {}",
                user.describe(context),
                pos,
                chosen.describe(context)
            );
            user.set_operand(context, pos, chosen);
        }
    }
    Ok(())
}

struct BlockDominators {
    graph: DiGraph<Block, ()>,
    indices: FxHashMap<Block, NodeIndex>,
    doms: Dominators<NodeIndex>,
}

fn block_dominators(context: &Context, function: Function) -> BlockDominators {
    let mut graph: DiGraph<Block, ()> = DiGraph::new();
    let mut indices: FxHashMap<Block, NodeIndex> = FxHashMap::default();
    for block in function.block_iter(context) {
        indices.insert(block, graph.add_node(block));
    }
    for block in function.block_iter(context) {
        for succ in block.successors(context) {
            graph.add_edge(indices[&block], indices[&succ], ());
        }
    }
    let entry = indices[&function.entry_block(context)];
    let doms = dominators::simple_fast(&graph, entry);
    BlockDominators { graph, indices, doms }
}

fn dominating_def(
    context: &Context,
    doms: &BlockDominators,
    defs: &[Value],
    user: Value,
) -> Result<Value, LoweringError> {
    let anchor = def_node(context, user);
    let user_block = anchor.block(context);
    if !user_block.is_scheduled(context, anchor) {
        return Err(LoweringError::NotScheduled(anchor.describe(context)));
    }

    // Within the user's block: the latest definition scheduled strictly
    // before the user wins.
    let sched = user_block.sched_vec(context);
    let user_pos = sched.iter().position(|&n| n == anchor).unwrap();
    let mut best: Option<(usize, Value)> = None;
    for def in defs {
        let def_anchor = def_node(context, *def);
        if def_anchor.block(context) != user_block {
            continue;
        }
        if let Some(p) = sched.iter().position(|&n| n == def_anchor) {
            if p < user_pos && best.map(|(bp, _)| p > bp).unwrap_or(true) {
                best = Some((p, *def));
            }
        }
    }
    if let Some((_, def)) = best {
        return Ok(def);
    }

    // Otherwise walk up the dominator tree and take the last definition in
    // the first dominating block that has one.
    let mut cursor = doms.doms.immediate_dominator(doms.indices[&user_block]);
    while let Some(idx) = cursor {
        let block = doms.graph[idx];
        let sched = block.sched_vec(context);
        let mut best: Option<(usize, Value)> = None;
        for def in defs {
            let def_anchor = def_node(context, *def);
            if def_anchor.block(context) != block {
                continue;
            }
            if let Some(p) = sched.iter().position(|&n| n == def_anchor) {
                if best.map(|(bp, _)| p > bp).unwrap_or(true) {
                    best = Some((p, *def));
                }
            }
        }
        if let Some((_, def)) = best {
            return Ok(def);
        }
        cursor = doms.doms.immediate_dominator(idx);
    }

    Err(LoweringError::SsaReconstruction(format!(
        "no definition dominates user {}",
        user.describe(context)
    )))
}

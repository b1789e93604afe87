//! Constraint assurance: the must-differ scenario, keep melting, and
//! idempotence.

mod common;

use ra_lowering::assure_constraints;
use ra_lowering::ir::{
    printer, verify, Context, Function, InstrInfo, Mode, OutputReq, Value,
};

fn differ_req(must_differ: u32) -> OutputReq {
    OutputReq {
        limited: false,
        must_differ,
        should_be_same: 0,
    }
}

#[test]
fn must_differ_inserts_copy_and_keep() {
    let mut ctx = Context::new();
    let func = Function::new(&mut ctx, "f");
    let block = func.entry_block(&ctx);

    let a = Value::new_instr(&mut ctx, block, InstrInfo::simple("lda"), Mode::Data, vec![]);
    block.append(&mut ctx, a);
    let b = Value::new_instr(&mut ctx, block, InstrInfo::simple("ldb"), Mode::Data, vec![]);
    block.append(&mut ctx, b);

    // The output must not share a register with operand 1.
    let sub = Value::new_instr(
        &mut ctx,
        block,
        InstrInfo {
            name: "sub".to_owned(),
            modifies_flags: false,
            out_reqs: vec![differ_req(0b10)],
        },
        Mode::Data,
        vec![a, b],
    );
    block.append(&mut ctx, sub);

    assure_constraints(&mut ctx, func).unwrap();
    verify::verify(&ctx, func).unwrap();

    // Expected shape: a, b, copy of b, sub, keep(sub, copy).
    let sched = block.sched_vec(&ctx);
    assert_eq!(sched.len(), 5);
    let cpy = sched[2];
    assert!(cpy.is_unspillable_copy(&ctx));
    assert_eq!(cpy.operand(&ctx, 0), Some(b));
    assert_eq!(sched[3], sub);
    let keep = sched[4];
    assert!(keep.is_keep(&ctx));
    assert_eq!(keep.operands(&ctx), vec![sub, cpy]);

    // SSA reconstruction re-pointed the instruction at the copy.
    assert_eq!(sub.operand(&ctx, 1), Some(cpy));
}

#[test]
fn every_must_differ_bit_gets_its_own_guard() {
    let mut ctx = Context::new();
    let func = Function::new(&mut ctx, "f");
    let block = func.entry_block(&ctx);

    let defs: Vec<Value> = ["lda", "ldb", "ldc"]
        .iter()
        .map(|name| {
            let def = Value::new_instr(&mut ctx, block, InstrInfo::simple(*name), Mode::Data, vec![]);
            block.append(&mut ctx, def);
            def
        })
        .collect();

    let instr = Value::new_instr(
        &mut ctx,
        block,
        InstrInfo {
            name: "mad".to_owned(),
            modifies_flags: false,
            out_reqs: vec![differ_req(0b101)],
        },
        Mode::Data,
        defs.clone(),
    );
    block.append(&mut ctx, instr);

    assure_constraints(&mut ctx, func).unwrap();
    verify::verify(&ctx, func).unwrap();

    for &pos in &[0usize, 2] {
        let operand = instr.operand(&ctx, pos).unwrap();
        assert!(operand.is_unspillable_copy(&ctx));
        assert_eq!(operand.operand(&ctx, 0), Some(defs[pos]));
        // A keep chain binds the instruction to the copy.
        let kept = block.sched_vec(&ctx).into_iter().any(|n| {
            n.is_keep(&ctx) && {
                let ops = n.operands(&ctx);
                ops.contains(&instr) && ops.contains(&operand)
            }
        });
        assert!(kept, "no keep binds the copy at operand {}", pos);
    }
    // Operand 1 is unconstrained and untouched.
    assert_eq!(instr.operand(&ctx, 1), Some(defs[1]));
}

#[test]
fn copy_keep_tracks_values_with_other_users() {
    let mut ctx = Context::new();
    let func = Function::new(&mut ctx, "f");
    let block = func.entry_block(&ctx);

    let a = Value::new_instr(&mut ctx, block, InstrInfo::simple("lda"), Mode::Data, vec![]);
    block.append(&mut ctx, a);
    let b = Value::new_instr(&mut ctx, block, InstrInfo::simple("ldb"), Mode::Data, vec![]);
    block.append(&mut ctx, b);

    let sub = Value::new_instr(
        &mut ctx,
        block,
        InstrInfo {
            name: "sub".to_owned(),
            modifies_flags: false,
            out_reqs: vec![differ_req(0b10)],
        },
        Mode::Data,
        vec![a, b],
    );
    block.append(&mut ctx, sub);

    // A later consumer keeps b's live range going past the instruction.
    let store = Value::new_instr(
        &mut ctx,
        block,
        InstrInfo::simple("store"),
        Mode::Data,
        vec![b],
    );
    block.append(&mut ctx, store);

    assure_constraints(&mut ctx, func).unwrap();
    verify::verify(&ctx, func).unwrap();

    let copy_keeps: Vec<Value> = block
        .sched_vec(&ctx)
        .into_iter()
        .filter(|n| n.is_copy_keep(&ctx))
        .collect();
    assert_eq!(copy_keeps.len(), 1);
    let ck = copy_keeps[0];

    let cpy = ck.operand(&ctx, 0).unwrap();
    assert!(cpy.is_unspillable_copy(&ctx));
    assert_eq!(cpy.operand(&ctx, 0), Some(b));
    assert!(ck.operands(&ctx)[1..].contains(&sub));

    // The copy-keep is a definition too: the later consumer reads it.
    assert_eq!(store.operand(&ctx, 0), Some(ck));
    assert_eq!(sub.operand(&ctx, 1), Some(cpy));
}

#[test]
fn copy_keeps_behind_one_tuple_node_are_melted() {
    let mut ctx = Context::new();
    let func = Function::new(&mut ctx, "f");
    let block = func.entry_block(&ctx);

    let v = Value::new_instr(&mut ctx, block, InstrInfo::simple("ldv"), Mode::Data, vec![]);
    block.append(&mut ctx, v);

    // Both outputs of one tuple instruction must differ from operand 0.
    let pair = Value::new_instr(
        &mut ctx,
        block,
        InstrInfo {
            name: "divmod".to_owned(),
            modifies_flags: false,
            out_reqs: vec![differ_req(0b1), differ_req(0b1)],
        },
        Mode::Tuple,
        vec![v],
    );
    block.append(&mut ctx, pair);
    let quot = Value::new_proj(&mut ctx, pair, 0);
    let rem = Value::new_proj(&mut ctx, pair, 1);

    let consume = Value::new_instr(
        &mut ctx,
        block,
        InstrInfo::simple("use"),
        Mode::Data,
        vec![quot, rem],
    );
    block.append(&mut ctx, consume);
    let store = Value::new_instr(
        &mut ctx,
        block,
        InstrInfo::simple("store"),
        Mode::Data,
        vec![v],
    );
    block.append(&mut ctx, store);

    assure_constraints(&mut ctx, func).unwrap();
    verify::verify(&ctx, func).unwrap();

    // The two copy-keeps were melted into one with both projections kept.
    let copy_keeps: Vec<Value> = block
        .sched_vec(&ctx)
        .into_iter()
        .filter(|n| n.is_copy_keep(&ctx))
        .collect();
    assert_eq!(copy_keeps.len(), 1);
    let fused = copy_keeps[0];
    let kept = fused.operands(&ctx)[1..].to_vec();
    assert!(kept.contains(&quot) && kept.contains(&rem));

    // One shared unspillable copy feeds it, and the tuple instruction now
    // reads that copy.
    let cpy = fused.operand(&ctx, 0).unwrap();
    assert!(cpy.is_unspillable_copy(&ctx));
    assert_eq!(cpy.operand(&ctx, 0), Some(v));
    assert_eq!(pair.operand(&ctx, 0), Some(cpy));

    // The later consumer of v reads the fused copy-keep's output.
    assert_eq!(store.operand(&ctx, 0), Some(fused));
}

#[test]
fn reconstruction_repoints_users_in_dominated_blocks() {
    let mut ctx = Context::new();
    let func = Function::new(&mut ctx, "f");
    let entry = func.entry_block(&ctx);
    let body = func.create_block(&mut ctx, Some("body".to_owned()));
    let exit = func.create_block(&mut ctx, Some("exit".to_owned()));
    entry.add_successor(&mut ctx, body);
    body.add_successor(&mut ctx, exit);

    let v = Value::new_instr(&mut ctx, entry, InstrInfo::simple("ldv"), Mode::Data, vec![]);
    entry.append(&mut ctx, v);

    let u = Value::new_instr(&mut ctx, body, InstrInfo::simple("ldu"), Mode::Data, vec![]);
    body.append(&mut ctx, u);
    let sub = Value::new_instr(
        &mut ctx,
        body,
        InstrInfo {
            name: "sub".to_owned(),
            modifies_flags: false,
            out_reqs: vec![differ_req(0b10)],
        },
        Mode::Data,
        vec![u, v],
    );
    body.append(&mut ctx, sub);

    let store = Value::new_instr(
        &mut ctx,
        exit,
        InstrInfo::simple("store"),
        Mode::Data,
        vec![v],
    );
    exit.append(&mut ctx, store);

    assure_constraints(&mut ctx, func).unwrap();
    verify::verify(&ctx, func).unwrap();

    // The copy pins v down in the body block; v has a distant user, so the
    // keep is a copy-keep whose output serves that user.
    let copy_keeps: Vec<Value> = body
        .sched_vec(&ctx)
        .into_iter()
        .filter(|n| n.is_copy_keep(&ctx))
        .collect();
    assert_eq!(copy_keeps.len(), 1);
    let ck = copy_keeps[0];
    let cpy = ck.operand(&ctx, 0).unwrap();
    assert!(cpy.is_unspillable_copy(&ctx));
    assert_eq!(sub.operand(&ctx, 1), Some(cpy));
    assert_eq!(store.operand(&ctx, 0), Some(ck));
}

#[test]
fn equal_same_and_differ_operands_are_vacuous() {
    let mut ctx = Context::new();
    let func = Function::new(&mut ctx, "f");
    let block = func.entry_block(&ctx);

    let a = Value::new_instr(&mut ctx, block, InstrInfo::simple("lda"), Mode::Data, vec![]);
    block.append(&mut ctx, a);
    let instr = Value::new_instr(
        &mut ctx,
        block,
        InstrInfo {
            name: "addmul".to_owned(),
            modifies_flags: false,
            out_reqs: vec![OutputReq {
                limited: false,
                must_differ: 0b10,
                should_be_same: 0b01,
            }],
        },
        Mode::Data,
        vec![a, a],
    );
    block.append(&mut ctx, instr);

    let before = printer::to_string(&ctx, func);
    assure_constraints(&mut ctx, func).unwrap();
    verify::verify(&ctx, func).unwrap();
    assert_eq!(printer::to_string(&ctx, func), before);
}

#[test]
fn assure_constraints_is_idempotent() {
    for with_other_user in [false, true] {
        let mut ctx = Context::new();
        let func = Function::new(&mut ctx, "f");
        let block = func.entry_block(&ctx);

        let a = Value::new_instr(&mut ctx, block, InstrInfo::simple("lda"), Mode::Data, vec![]);
        block.append(&mut ctx, a);
        let b = Value::new_instr(&mut ctx, block, InstrInfo::simple("ldb"), Mode::Data, vec![]);
        block.append(&mut ctx, b);
        let sub = Value::new_instr(
            &mut ctx,
            block,
            InstrInfo {
                name: "sub".to_owned(),
                modifies_flags: false,
                out_reqs: vec![differ_req(0b10)],
            },
            Mode::Data,
            vec![a, b],
        );
        block.append(&mut ctx, sub);
        if with_other_user {
            let store = Value::new_instr(
                &mut ctx,
                block,
                InstrInfo::simple("store"),
                Mode::Data,
                vec![b],
            );
            block.append(&mut ctx, store);
        }

        assure_constraints(&mut ctx, func).unwrap();
        let once = printer::to_string(&ctx, func);

        assure_constraints(&mut ctx, func).unwrap();
        verify::verify(&ctx, func).unwrap();
        let twice = printer::to_string(&ctx, func);

        assert_eq!(once, twice, "second run changed the graph");
    }
}

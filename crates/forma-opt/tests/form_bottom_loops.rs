mod utils;

use cfgir::{
    inst::{BinaryOp, CmpKind, Op, Ty},
    Graph,
};
use forma_opt::{passes::FormBottomLoops, OptimizationPass};
use utils::{build_sum_loop, evaluate, Value};

fn sum_args(n: i64) -> Vec<Value> {
    let array: Vec<i64> = (0..100).map(|v| v * 3 + 1).collect();
    vec![Value::Int(n), Value::Array(array)]
}

///The transformed graph must compute exactly what the original computed,
/// for iteration counts {0, 1, 2, large}.
#[test]
fn rewritten_loop_is_equivalent() {
    for n in [0i64, 1, 2, 3, 97] {
        let mut fixture = build_sum_loop();
        let expected = evaluate(&fixture.graph, &sum_args(n), 10_000);

        let mut pass = FormBottomLoops::new(None);
        pass.run(&mut fixture.graph);

        assert!(
            fixture.graph.structure_valid(),
            "transformed graph is invalid for n = {n}"
        );
        let actual = evaluate(&fixture.graph, &sum_args(n), 10_000);
        assert_eq!(expected, actual, "diverged for n = {n}");
    }
}

#[test]
fn rewritten_loop_tests_at_the_bottom() {
    let mut fixture = build_sum_loop();
    let block_count_before = fixture.graph.block_refs().count();

    let mut pass = FormBottomLoops::new(None);
    pass.run(&mut fixture.graph);

    //one new block: the cloned header behind the back edge
    assert_eq!(fixture.graph.block_refs().count(), block_count_before + 1);

    //the old header now runs once: its only predecessor is the entry and
    //its phis collapsed to a single input
    assert_eq!(fixture.graph[fixture.header].preds().len(), 1);
    for phi in fixture.graph[fixture.header].phis() {
        assert_eq!(fixture.graph[*phi].inputs().len(), 1);
    }

    //the body no longer jumps back to the old header; the recurring test
    //lives in the body's new successor, which branches like the header did
    let new_header = fixture.graph[fixture.body].succs()[0];
    assert_ne!(new_header, fixture.header);
    let term = fixture.graph[new_header].terminator().unwrap();
    assert_eq!(fixture.graph[term].op, Op::Branch);
    assert!(fixture.graph[new_header]
        .succs()
        .contains(&fixture.body));
    assert!(fixture.graph[new_header]
        .succs()
        .contains(&fixture.exit));

    //a loop that executes n = 0 times never reaches the body
    let result = evaluate(&fixture.graph, &sum_args(0), 100);
    assert_eq!(result.ret, Some(Value::Int(0)));
    //n = 3 runs the body exactly three times: a[0] + a[1] + a[2]
    let result = evaluate(&fixture.graph, &sum_args(3), 1_000);
    assert_eq!(result.ret, Some(Value::Int(1 + 4 + 7)));
}

///A header holding an instruction with observable side effects must be
/// left alone, without the pipeline erroring out.
#[test]
fn unsafe_header_instruction_rejects_the_loop() {
    let mut graph = Graph::new();
    let entry = graph.entry();
    let header = graph.new_block();
    let body = graph.new_block();
    let exit = graph.new_block();

    let n = graph.add_param(0, Ty::Int);
    let zero = graph.const_int(entry, 0);
    graph.goto(entry, header);

    let i = graph.append_phi(header, Ty::Int, &[zero]);
    //observable: must not be duplicated
    graph.call(header, "tick", Ty::Void, &[]);
    let cond = graph.cmp(header, CmpKind::Lt, i, n);
    graph.branch(header, cond, body, exit);

    let one = graph.const_int(body, 1);
    let next = graph.binary(body, BinaryOp::Add, i, one);
    graph.goto(body, header);
    graph.add_phi_input(i, next);
    graph.ret(exit, Some(i));

    let before = evaluate(&graph, &[Value::Int(2)], 1_000);

    let mut pass = FormBottomLoops::new(None);
    pass.run(&mut graph);

    //untransformed: same block set, same behavior, "tick" still fires once
    //per header visit
    assert_eq!(graph[body].succs(), &[header]);
    let after = evaluate(&graph, &[Value::Int(2)], 1_000);
    assert_eq!(before, after);
    assert_eq!(after.effects.len(), 3);
}

///An already bottom-tested (single-block) loop is not applicable.
#[test]
fn single_block_loop_is_skipped() {
    let mut graph = Graph::new();
    let entry = graph.entry();
    let body = graph.new_block();
    let exit = graph.new_block();

    let n = graph.add_param(0, Ty::Int);
    let zero = graph.const_int(entry, 0);
    graph.goto(entry, body);

    let i = graph.append_phi(body, Ty::Int, &[zero]);
    let one = graph.const_int(body, 1);
    let next = graph.binary(body, BinaryOp::Add, i, one);
    let cond = graph.cmp(body, CmpKind::Lt, next, n);
    graph.branch(body, cond, body, exit);
    graph.add_phi_input(i, next);
    graph.ret(exit, Some(next));

    let blocks_before: Vec<_> = graph.block_refs().collect();
    let mut pass = FormBottomLoops::new(None);
    pass.run(&mut graph);
    let blocks_after: Vec<_> = graph.block_refs().collect();
    assert_eq!(blocks_before, blocks_after);
}

///Values defined in the header and used past the exit must resolve through
/// the outside fixups. The loop returns `2 * i_final`, where the doubling
/// lives in the header itself.
#[test]
fn header_values_used_after_the_loop_are_fixed_up() {
    fn build_doubling_loop() -> Graph {
        let mut graph = Graph::new();
        let entry = graph.entry();
        let header = graph.new_block();
        let body = graph.new_block();
        let exit = graph.new_block();

        let n = graph.add_param(0, Ty::Int);
        let zero = graph.const_int(entry, 0);
        graph.goto(entry, header);

        let i = graph.append_phi(header, Ty::Int, &[zero]);
        let two = graph.const_int(header, 2);
        //doubled lives in the header and is read after the loop
        let doubled = graph.binary(header, BinaryOp::Mul, i, two);
        let cond = graph.cmp(header, CmpKind::Lt, i, n);
        graph.branch(header, cond, body, exit);

        let one = graph.const_int(body, 1);
        let next = graph.binary(body, BinaryOp::Add, i, one);
        graph.goto(body, header);
        graph.add_phi_input(i, next);
        graph.ret(exit, Some(doubled));
        graph
    }

    for n_val in [0i64, 1, 4] {
        let reference = build_doubling_loop();
        let expected = evaluate(&reference, &[Value::Int(n_val)], 10_000);
        assert_eq!(expected.ret, Some(Value::Int(2 * n_val)));

        let mut transformed = build_doubling_loop();
        let mut pass = FormBottomLoops::new(None);
        pass.run(&mut transformed);
        assert!(transformed.structure_valid());
        let actual = evaluate(&transformed, &[Value::Int(n_val)], 10_000);
        assert_eq!(expected, actual, "diverged for n = {n_val}");
    }
}

///Two header phis carrying each other (a swap loop) exercise the recursive
/// fixup rule: the fixup of one phi is built from the other phi's fixup.
#[test]
fn mutually_referencing_header_phis_are_fixed_up() {
    fn build_swap_loop() -> Graph {
        let mut graph = Graph::new();
        let entry = graph.entry();
        let header = graph.new_block();
        let body = graph.new_block();
        let exit = graph.new_block();

        let n = graph.add_param(0, Ty::Int);
        let zero = graph.const_int(entry, 0);
        let five = graph.const_int(entry, 5);
        graph.goto(entry, header);

        //i and j swap on every iteration, k counts
        let i = graph.append_phi(header, Ty::Int, &[zero]);
        let j = graph.append_phi(header, Ty::Int, &[five]);
        let k = graph.append_phi(header, Ty::Int, &[zero]);
        let cond = graph.cmp(header, CmpKind::Lt, k, n);
        graph.branch(header, cond, body, exit);

        let one = graph.const_int(body, 1);
        let k_next = graph.binary(body, BinaryOp::Add, k, one);
        graph.goto(body, header);
        graph.add_phi_input(i, j);
        graph.add_phi_input(j, i);
        graph.add_phi_input(k, k_next);

        graph.ret(exit, Some(i));
        graph
    }

    for n in [0i64, 1, 2, 5] {
        let reference = build_swap_loop();
        let expected = evaluate(&reference, &[Value::Int(n)], 10_000);
        //i ends up 0 after an even number of swaps, 5 after an odd one
        let swapped = if n % 2 == 0 { 0 } else { 5 };
        assert_eq!(expected.ret, Some(Value::Int(swapped)));

        let mut transformed = build_swap_loop();
        let mut pass = FormBottomLoops::new(None);
        pass.run(&mut transformed);
        assert!(transformed.structure_valid());
        let actual = evaluate(&transformed, &[Value::Int(n)], 10_000);
        assert_eq!(expected, actual, "diverged for n = {n}");
    }
}

///Environment operands crossing the old header are repaired like data
/// inputs.
#[test]
fn env_operands_are_fixed_up() {
    let mut graph = Graph::new();
    let entry = graph.entry();
    let header = graph.new_block();
    let body = graph.new_block();
    let exit = graph.new_block();

    let n = graph.add_param(0, Ty::Int);
    let zero = graph.const_int(entry, 0);
    graph.goto(entry, header);

    let i = graph.append_phi(header, Ty::Int, &[zero]);
    let cond = graph.cmp(header, CmpKind::Lt, i, n);
    graph.branch(header, cond, body, exit);

    //the call's deopt state snapshots the induction phi
    let call = graph.call(body, "checkpoint", Ty::Void, &[]);
    graph.set_env(call, &[i]);
    let one = graph.const_int(body, 1);
    let next = graph.binary(body, BinaryOp::Add, i, one);
    graph.goto(body, header);
    graph.add_phi_input(i, next);
    graph.ret(exit, Some(i));

    let mut pass = FormBottomLoops::new(None);
    pass.run(&mut graph);
    assert!(graph.structure_valid());

    //the env operand was redirected off the old header phi onto a merge in
    //the loop body
    let env_value = graph[call].env()[0];
    assert_ne!(env_value, i);
    assert!(graph[env_value].is_phi());
    assert_eq!(graph[env_value].block(), Some(body));
}

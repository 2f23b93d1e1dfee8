use cfgir::{
    inst::{BinaryOp, CmpKind, Ty},
    Graph,
};

#[test]
fn diamond_dominators() {
    let mut graph = Graph::new();
    let entry = graph.entry();
    let left = graph.new_block();
    let right = graph.new_block();
    let merge = graph.new_block();

    let flag = graph.add_param(0, Ty::Bool);
    graph.branch(entry, flag, left, right);
    let a = graph.const_int(left, 1);
    graph.goto(left, merge);
    let b = graph.const_int(right, 2);
    graph.goto(right, merge);
    let phi = graph.append_phi(merge, Ty::Int, &[a, b]);
    graph.ret(merge, Some(phi));

    graph.compute_dominators();
    assert_eq!(graph[left].idom(), Some(entry));
    assert_eq!(graph[right].idom(), Some(entry));
    //the merge is dominated by the entry, not by either branch arm
    assert_eq!(graph[merge].idom(), Some(entry));
    assert!(graph.dominates(entry, merge));
    assert!(!graph.dominates(left, merge));
    assert!(graph.structure_valid());
}

#[test]
fn single_loop_detection() {
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

    let one = graph.const_int(body, 1);
    let next = graph.binary(body, BinaryOp::Add, i, one);
    graph.goto(body, header);
    graph.add_phi_input(i, next);
    graph.ret(exit, Some(i));

    graph.compute_loop_info();
    let loops: Vec<_> = graph.loop_refs().collect();
    assert_eq!(loops.len(), 1);
    let info = &graph[loops[0]];
    assert_eq!(info.header, header);
    assert_eq!(info.single_back_edge(), Some(body));
    assert!(info.contains(header) && info.contains(body));
    assert!(!info.contains(entry) && !info.contains(exit));
    assert_eq!(graph.loop_preheader(loops[0]), Some(entry));
}

#[test]
fn nested_loops_innermost_assignment() {
    let mut graph = Graph::new();
    let entry = graph.entry();
    let outer = graph.new_block();
    let inner = graph.new_block();
    let inner_latch = graph.new_block();
    let outer_latch = graph.new_block();
    let exit = graph.new_block();

    let p = graph.add_param(0, Ty::Bool);
    graph.goto(entry, outer);
    graph.branch(outer, p, inner, exit);
    graph.branch(inner, p, inner_latch, outer_latch);
    graph.goto(inner_latch, inner);
    graph.goto(outer_latch, outer);
    graph.ret(exit, None);

    graph.compute_loop_info();
    let loops: Vec<_> = graph.loop_refs().collect();
    assert_eq!(loops.len(), 2);

    let inner_loop = graph[inner].loop_info().unwrap();
    let outer_loop = graph[outer].loop_info().unwrap();
    assert_ne!(inner_loop, outer_loop);
    assert_eq!(graph[inner_loop].header, inner);
    assert_eq!(graph[outer_loop].header, outer);
    //the inner latch belongs to the inner loop, the outer latch only to the
    //outer one
    assert_eq!(graph[inner_latch].loop_info(), Some(inner_loop));
    assert_eq!(graph[outer_latch].loop_info(), Some(outer_loop));
    assert!(graph[outer_loop].contains(inner));
}

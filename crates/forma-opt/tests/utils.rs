//! Shared helpers for the pass tests: a tiny reference evaluator that
//! executes a graph over concrete arguments, and builders for the loop
//! shapes the transformation tests exercise.

use ahash::AHashMap;
use cfgir::{
    inst::{BinaryOp, CmpKind, Op, Ty},
    BlockRef, Graph, InstRef,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Array(Vec<i64>),
}

impl Value {
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(v) => *v,
            other => panic!("expected int, got {other:?}"),
        }
    }

    fn as_bool(&self) -> bool {
        match self {
            Value::Bool(v) => *v,
            other => panic!("expected bool, got {other:?}"),
        }
    }
}

///Result of one interpreted execution: the returned value and the sequence
/// of observable calls, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecResult {
    pub ret: Option<Value>,
    pub effects: Vec<String>,
}

///Executes `graph` over `args` by walking the CFG. Panics when `fuel`
/// block transitions are exceeded, so a miscompiled loop fails the test
/// instead of hanging it.
pub fn evaluate(graph: &Graph, args: &[Value], mut fuel: usize) -> ExecResult {
    let mut values: AHashMap<InstRef, Value> = AHashMap::default();
    let mut effects = Vec::new();
    let mut block = graph.entry();
    let mut came_from: Option<BlockRef> = None;

    loop {
        assert!(fuel > 0, "evaluation ran out of fuel; runaway loop?");
        fuel -= 1;

        //phis read their inputs in parallel, against the predecessor's
        //final state
        if let Some(pred) = came_from {
            let pred_idx = graph[block]
                .pred_index(pred)
                .expect("arrived over an unknown edge");
            let mut updates = Vec::new();
            for phi in graph[block].phis() {
                let input = graph[*phi].input(pred_idx);
                updates.push((*phi, values[&input].clone()));
            }
            for (phi, value) in updates {
                values.insert(phi, value);
            }
        }

        let mut next = None;
        for inst in graph[block].insts() {
            let i = graph.inst(*inst);
            match &i.op {
                Op::Param(idx) => {
                    values.insert(*inst, args[*idx as usize].clone());
                }
                Op::ConstInt(v) => {
                    values.insert(*inst, Value::Int(*v));
                }
                Op::ConstBool(v) => {
                    values.insert(*inst, Value::Bool(*v));
                }
                Op::Binary(op) => {
                    let a = values[&i.input(0)].as_int();
                    let b = values[&i.input(1)].as_int();
                    let v = match op {
                        BinaryOp::Add => a.wrapping_add(b),
                        BinaryOp::Sub => a.wrapping_sub(b),
                        BinaryOp::Mul => a.wrapping_mul(b),
                        BinaryOp::And => a & b,
                        BinaryOp::Or => a | b,
                    };
                    values.insert(*inst, Value::Int(v));
                }
                Op::Cmp(kind) => {
                    let a = values[&i.input(0)].as_int();
                    let b = values[&i.input(1)].as_int();
                    let v = match kind {
                        CmpKind::Eq => a == b,
                        CmpKind::Ne => a != b,
                        CmpKind::Lt => a < b,
                        CmpKind::Le => a <= b,
                        CmpKind::Gt => a > b,
                        CmpKind::Ge => a >= b,
                    };
                    values.insert(*inst, Value::Bool(v));
                }
                Op::ArrayGet => {
                    let array = match &values[&i.input(0)] {
                        Value::Array(a) => a.clone(),
                        other => panic!("expected array, got {other:?}"),
                    };
                    let index = values[&i.input(1)].as_int();
                    values.insert(*inst, Value::Int(array[index as usize]));
                }
                Op::Call(name) => {
                    effects.push(name.clone());
                    values.insert(*inst, Value::Int(0));
                }
                Op::Phi => unreachable!("phis live in the phi list"),
                Op::Goto => {
                    next = Some(graph[block].succs()[0]);
                }
                Op::Branch => {
                    let cond = values[&i.input(0)].as_bool();
                    let succs = graph[block].succs();
                    next = Some(if cond { succs[0] } else { succs[1] });
                }
                Op::Return => {
                    let ret = i.inputs().first().map(|v| values[v].clone());
                    return ExecResult { ret, effects };
                }
            }
        }

        came_from = Some(block);
        block = next.expect("block fell through without terminator");
    }
}

///Handles into the canonical test loop, so assertions can poke at specific
/// blocks after a transformation.
pub struct LoopFixture {
    pub graph: Graph,
    pub header: BlockRef,
    pub body: BlockRef,
    pub exit: BlockRef,
}

///`while (i < n) { sum += a[i]; i++; } return sum;` with header phis for
/// `i` and `sum`. Parameters: `n` at 0, `a` at 1.
pub fn build_sum_loop() -> LoopFixture {
    let mut graph = Graph::new();
    let entry = graph.entry();
    let header = graph.new_block();
    let body = graph.new_block();
    let exit = graph.new_block();

    let n = graph.add_param(0, Ty::Int);
    let a = graph.add_param(1, Ty::Array);
    let zero = graph.const_int(entry, 0);
    graph.goto(entry, header);

    let i = graph.append_phi(header, Ty::Int, &[zero]);
    let sum = graph.append_phi(header, Ty::Int, &[zero]);
    let cond = graph.cmp(header, CmpKind::Lt, i, n);
    graph.branch(header, cond, body, exit);

    let elem = graph.array_get(body, a, i);
    let sum_next = graph.binary(body, BinaryOp::Add, sum, elem);
    let one = graph.const_int(body, 1);
    let i_next = graph.binary(body, BinaryOp::Add, i, one);
    graph.goto(body, header);
    graph.add_phi_input(i, i_next);
    graph.add_phi_input(sum, sum_next);

    graph.ret(exit, Some(sum));

    LoopFixture {
        graph,
        header,
        body,
        exit,
    }
}

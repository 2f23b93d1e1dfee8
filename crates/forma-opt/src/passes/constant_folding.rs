/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Folds arithmetic and comparisons over constant operands, to fixpoint.

use cfgir::{
    inst::{BinaryOp, CmpKind, Op, Ty},
    Graph, InstRef,
};

use crate::{OptimizationPass, StatsSink};

pub struct ConstantFolding {
    verbose: bool,
    stats: Option<StatsSink>,
}

impl ConstantFolding {
    pub const PASS_NAME: &'static str = "constant_folding";

    pub fn new(stats: Option<StatsSink>) -> Self {
        ConstantFolding {
            verbose: false,
            stats,
        }
    }

    ///Constant result of `inst`, if both operands are constants.
    fn fold(graph: &Graph, inst: InstRef) -> Option<Op> {
        let (lhs, rhs) = {
            let i = graph.inst(inst);
            if i.inputs().len() != 2 {
                return None;
            }
            (i.input(0), i.input(1))
        };
        match (&graph.inst(inst).op, &graph.inst(lhs).op, &graph.inst(rhs).op) {
            (Op::Binary(op), Op::ConstInt(a), Op::ConstInt(b)) => {
                let value = match op {
                    BinaryOp::Add => a.wrapping_add(*b),
                    BinaryOp::Sub => a.wrapping_sub(*b),
                    BinaryOp::Mul => a.wrapping_mul(*b),
                    BinaryOp::And => a & b,
                    BinaryOp::Or => a | b,
                };
                Some(Op::ConstInt(value))
            }
            (Op::Cmp(kind), Op::ConstInt(a), Op::ConstInt(b)) => {
                let value = match kind {
                    CmpKind::Eq => a == b,
                    CmpKind::Ne => a != b,
                    CmpKind::Lt => a < b,
                    CmpKind::Le => a <= b,
                    CmpKind::Gt => a > b,
                    CmpKind::Ge => a >= b,
                };
                Some(Op::ConstBool(value))
            }
            _ => None,
        }
    }
}

impl OptimizationPass for ConstantFolding {
    fn name(&self) -> &str {
        Self::PASS_NAME
    }

    fn run(&mut self, graph: &mut Graph) {
        let mut folded = 0usize;
        let mut changed = true;
        while changed {
            changed = false;
            for block in graph.reverse_postorder() {
                for inst in graph.block(block).insts().to_vec() {
                    let Some(replacement) = Self::fold(graph, inst) else {
                        continue;
                    };
                    let ty = match replacement {
                        Op::ConstBool(_) => Ty::Bool,
                        _ => Ty::Int,
                    };
                    let constant = graph.create_inst(replacement, ty, &[]);
                    graph.attach_inst_before(block, inst, constant);
                    graph.replace_all_uses_with(inst, constant);
                    graph
                        .remove_inst(inst)
                        .expect("folded instruction still had uses");
                    folded += 1;
                    changed = true;
                }
            }
        }

        if folded > 0 {
            if let Some(stats) = &self.stats {
                stats.borrow_mut().add("constants_folded", folded as u64);
            }
            #[cfg(feature = "log")]
            if self.verbose {
                log::debug!("{}: folded {folded} instructions", Self::PASS_NAME);
            }
        }
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

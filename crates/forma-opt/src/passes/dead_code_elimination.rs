/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Worklist removal of unused pure instructions.
//!
//! An instruction is removable when nothing reads it (neither as a data
//! input nor from an environment) and deleting it cannot be observed: no
//! side effects, no throw, not a terminator, not a parameter.

use cfgir::{inst::Op, Graph, InstRef};

use crate::{OptimizationPass, StatsSink};

pub struct DeadCodeElimination {
    name: &'static str,
    verbose: bool,
    stats: Option<StatsSink>,
}

impl DeadCodeElimination {
    pub const PASS_NAME: &'static str = "dead_code_elimination";

    pub fn new(stats: Option<StatsSink>) -> Self {
        Self::with_name(Self::PASS_NAME, stats)
    }

    ///A DCE instance under a custom name, for the cleanup slots the
    /// placement table schedules after structural passes.
    pub fn with_name(name: &'static str, stats: Option<StatsSink>) -> Self {
        DeadCodeElimination {
            name,
            verbose: false,
            stats,
        }
    }

    fn removable(graph: &Graph, inst: InstRef) -> bool {
        let i = match graph.try_inst(inst) {
            Some(i) => i,
            None => return false,
        };
        if !i.uses().is_empty() || !i.env_uses().is_empty() {
            return false;
        }
        if i.block().is_none() {
            return false;
        }
        !(i.op.has_side_effects()
            || i.op.can_throw()
            || i.op.is_terminator()
            || matches!(i.op, Op::Param(_)))
    }
}

impl OptimizationPass for DeadCodeElimination {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&mut self, graph: &mut Graph) {
        //seed with every currently dead instruction, then chase the inputs
        //that removals orphan
        let mut worklist: Vec<InstRef> = graph
            .inst_refs()
            .filter(|inst| Self::removable(graph, *inst))
            .collect();

        let mut removed = 0usize;
        while let Some(inst) = worklist.pop() {
            if !Self::removable(graph, inst) {
                continue;
            }
            let inputs = graph.inst(inst).inputs().to_vec();
            let env = graph.inst(inst).env().to_vec();
            graph.remove_inst(inst).expect("dead instruction had users");
            removed += 1;
            worklist.extend(inputs);
            worklist.extend(env);
        }

        if removed > 0 {
            if let Some(stats) = &self.stats {
                stats.borrow_mut().add("dead_insts_removed", removed as u64);
            }
            #[cfg(feature = "log")]
            if self.verbose {
                log::debug!("{}: removed {removed} instructions", self.name);
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

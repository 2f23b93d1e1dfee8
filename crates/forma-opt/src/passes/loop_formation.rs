/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Recomputes dominators and natural-loop metadata.
//!
//! Structural passes leave loop metadata stale; the curated base order
//! schedules a loop-formation instance (under a distinguishing name) in
//! front of every consumer of that metadata.

use cfgir::Graph;

use crate::OptimizationPass;

pub struct LoopFormation {
    name: &'static str,
    verbose: bool,
}

impl LoopFormation {
    pub const PASS_NAME: &'static str = "loop_formation";

    pub fn new() -> Self {
        Self::with_name(Self::PASS_NAME)
    }

    ///A loop-formation instance under a custom name, so the pipeline can
    /// schedule it multiple times without violating name uniqueness.
    pub fn with_name(name: &'static str) -> Self {
        LoopFormation {
            name,
            verbose: false,
        }
    }
}

impl Default for LoopFormation {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizationPass for LoopFormation {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&mut self, graph: &mut Graph) {
        graph.compute_loop_info();
        #[cfg(feature = "log")]
        if self.verbose {
            log::debug!(
                "{}: {} loops after recomputation",
                self.name,
                graph.loop_refs().count()
            );
        }
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

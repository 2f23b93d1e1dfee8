/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! # Formac
//!
//! Ties the optimization framework into an executable pipeline: the curated
//! base order, the placement directive table, the pass-manager options and
//! the debug observer. One [Pipeline] instance optimizes one compilation
//! unit; independent units may run on independent threads, they only share
//! the process-wide print-once diagnostic.

use std::{cell::RefCell, rc::Rc};

use cfgir::Graph;
use forma_common::split_string_into_set;
use forma_opt::{
    framework::{
        build_pass_list, fill_verbose, print_pass_list_once, remove_disabled, run_optimizations,
        CustomPassPlacement, PassPlacement,
    },
    observer::PassObserver,
    passes::{ConstantFolding, DeadCodeElimination, FormBottomLoops, LoopFormation},
    OptStats, OptimizationPass, StatsSink,
};

mod error;
pub mod observer;
pub use error::PipelineError;

///Options the driver reads from the outside world. The core only ever sees
/// them as already-parsed sets and flags.
#[derive(Debug, Clone, Default)]
pub struct PassManagerOptions {
    ///Comma separated names of passes to skip. Names that are not compiled
    /// in are silently ignored.
    pub disable_pass_list: String,
    ///Comma separated names of passes to run verbose.
    pub print_pass_list: String,
    ///Marks every pass verbose, regardless of [Self::print_pass_list].
    pub print_all_passes: bool,
    ///Requests the one-time print of the executable plan.
    pub print_pass_names: bool,
    ///Debug aid for bisecting miscompiles: number of passes allowed to run.
    pub stop_optimizing_after: Option<u32>,
}

///Placement directives for the passes that do not simply append to the base
/// order. Curated together with [Pipeline::base_order]; an anchor missing
/// there is a build bug caught by the pipeline tests.
pub const FORMA_PASS_PLACEMENT: &[CustomPassPlacement] = &[
    CustomPassPlacement {
        pass_to_place: FormBottomLoops::PASS_NAME,
        pass_relative_to: ConstantFolding::PASS_NAME,
        directive: PassPlacement::InsertAfter,
    },
    CustomPassPlacement {
        pass_to_place: "loop_formation_before_bottom_loops",
        pass_relative_to: FormBottomLoops::PASS_NAME,
        directive: PassPlacement::InsertBefore,
    },
    CustomPassPlacement {
        pass_to_place: LoopFormation::PASS_NAME,
        pass_relative_to: FormBottomLoops::PASS_NAME,
        directive: PassPlacement::InsertAfter,
    },
    CustomPassPlacement {
        pass_to_place: "dce_after_bottom_loops",
        pass_relative_to: LoopFormation::PASS_NAME,
        directive: PassPlacement::InsertAfter,
    },
];

///An executable optimization pipeline for one compilation unit.
pub struct Pipeline {
    pub options: PassManagerOptions,
    stats: StatsSink,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_options(PassManagerOptions::default())
    }

    pub fn with_options(options: PassManagerOptions) -> Self {
        Pipeline {
            options,
            stats: Rc::new(RefCell::new(OptStats::new())),
        }
    }

    ///The statistics sink all passes of this pipeline report into.
    pub fn stats(&self) -> StatsSink {
        self.stats.clone()
    }

    ///The curated base order. Entries carrying a directive in
    /// [FORMA_PASS_PLACEMENT] are relocated while the list is built; the
    /// rest keep their position.
    fn base_order(&self) -> Vec<Box<dyn OptimizationPass>> {
        let stats = || Some(self.stats.clone());
        vec![
            Box::new(ConstantFolding::new(stats())),
            Box::new(DeadCodeElimination::new(stats())),
            Box::new(FormBottomLoops::new(stats())),
            Box::new(LoopFormation::with_name("loop_formation_before_bottom_loops")),
            Box::new(LoopFormation::new()),
            Box::new(DeadCodeElimination::with_name(
                "dce_after_bottom_loops",
                stats(),
            )),
        ]
    }

    ///Optimizes `graph` in place: placement, filtering, verbosity, the
    /// one-time plan print, then sequential execution.
    pub fn optimize_graph(
        &self,
        graph: &mut Graph,
        observer: &mut dyn PassObserver,
    ) -> Result<(), PipelineError> {
        let mut list = build_pass_list(self.base_order(), FORMA_PASS_PLACEMENT)?;

        let disabled = split_string_into_set(&self.options.disable_pass_list);
        remove_disabled(&mut list, &disabled);

        let print_passes = split_string_into_set(&self.options.print_pass_list);
        fill_verbose(&mut list, self.options.print_all_passes, &print_passes);

        print_pass_list_once(&list, self.options.print_pass_names);

        run_optimizations(
            graph,
            &mut list,
            self.options.stop_optimizing_after,
            observer,
        );
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

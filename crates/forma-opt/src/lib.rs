/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! # Forma-Opt
//!
//! The optimization framework of the forma backend: the contract every pass
//! implements, the placement/filter/verbosity machinery that turns a curated
//! base order plus directives into the final pass plan, and the sequential
//! execution driver.
//!
//! The pipeline only ever sees passes through [OptimizationPass]; concrete
//! pass internals never leak into the framework. The hard transformation
//! lives in [passes::form_bottom_loops].

use std::{cell::RefCell, rc::Rc};

use ahash::AHashMap;
use cfgir::Graph;

pub mod error;
pub mod framework;
pub mod observer;
pub mod passes;

pub use error::OptError;

///The capability every optimization pass implements. The framework orders,
/// filters and runs passes exclusively through this trait.
pub trait OptimizationPass {
    ///Stable identifier used for ordering, filtering and diagnostics. Must
    /// be unique within one pipeline instance.
    fn name(&self) -> &str;

    ///Runs the pass over `graph`. The graph is valid SSA on entry and must
    /// be valid SSA again on return. Non-applicability is not an error; a
    /// pass that finds nothing to do simply returns.
    fn run(&mut self, graph: &mut Graph);

    fn set_verbose(&mut self, verbose: bool);

    fn is_verbose(&self) -> bool;
}

///Named counters a pass can report into, shared by all passes of one
/// pipeline instance.
#[derive(Debug, Default)]
pub struct OptStats {
    counters: AHashMap<&'static str, u64>,
}

impl OptStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&mut self, counter: &'static str) {
        self.add(counter, 1);
    }

    pub fn add(&mut self, counter: &'static str, amount: u64) {
        *self.counters.entry(counter).or_insert(0) += amount;
    }

    pub fn get(&self, counter: &str) -> u64 {
        self.counters.get(counter).copied().unwrap_or(0)
    }
}

///Shared handle on the statistics sink. Pipelines are single threaded per
/// compilation unit, so a plain `Rc<RefCell<_>>` is all that is needed.
pub type StatsSink = Rc<RefCell<OptStats>>;

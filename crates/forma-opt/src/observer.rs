/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! The seam between the execution driver and whatever renders debug traces.
//!
//! The driver's only obligation is to call the observer immediately before
//! and immediately after each pass's `run`; formatting and output belong to
//! the observer implementation.

use cfgir::Graph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPoint {
    Before,
    After,
}

pub trait PassObserver {
    ///Called at both boundaries of every executed pass. `graph_valid` is
    /// the result of structural SSA validation at that point; a `false`
    /// after a pass means that pass corrupted the graph.
    fn pass_boundary(&mut self, graph: &Graph, pass_name: &str, point: PassPoint, graph_valid: bool);
}

///Observer that ignores everything; the default for library users that do
/// not want traces.
pub struct NullObserver;

impl PassObserver for NullObserver {
    fn pass_boundary(&mut self, _: &Graph, _: &str, _: PassPoint, _: bool) {}
}

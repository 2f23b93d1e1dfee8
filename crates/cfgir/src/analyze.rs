/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Analyses over the graph: traversal orders, dominators and natural loops.
//!
//! All analyses are demand driven. [compute_loop_info](crate::Graph::compute_loop_info)
//! refreshes dominators and the loop arena from the current CFG; passes that
//! restructure control flow are expected to re-run it (or schedule a
//! loop-formation pass) before anyone consumes the metadata again.

pub mod dominators;
pub mod loops;
pub mod postorder;

pub use loops::LoopInfo;

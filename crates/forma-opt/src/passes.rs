/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! The concrete passes of the pipeline. Each implements
//! [OptimizationPass](crate::OptimizationPass) and nothing else; the
//! framework never depends on a concrete pass type.

pub mod constant_folding;
pub mod dead_code_elimination;
pub mod form_bottom_loops;
pub mod loop_formation;

pub use constant_folding::ConstantFolding;
pub use dead_code_elimination::DeadCodeElimination;
pub use form_bottom_loops::FormBottomLoops;
pub use loop_formation::LoopFormation;

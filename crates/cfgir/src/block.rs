/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Basic blocks: a phi list, an ordered instruction list ending in a single
//! terminator, and the pred/succ edge lists that all analyses run over.

use smallvec::SmallVec;

use crate::{BlockRef, InstRef, LoopRef};

///A maximal straight-line instruction sequence with one entry and one exit.
///
/// Invariants (checked by [structure_valid](crate::Graph::structure_valid)):
/// - `insts` ends with the block's only terminator,
/// - `phis[i]` has exactly one input per entry of `preds`, where input `i`
///   corresponds to `preds[i]`,
/// - `preds`/`succs` mirror the neighboring blocks' lists.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub(crate) phis: Vec<InstRef>,
    pub(crate) insts: Vec<InstRef>,
    pub(crate) preds: SmallVec<[BlockRef; 2]>,
    pub(crate) succs: SmallVec<[BlockRef; 2]>,
    ///Immediate dominator, set by
    /// [compute_dominators](crate::Graph::compute_dominators).
    pub(crate) idom: Option<BlockRef>,
    ///Innermost containing loop, set by
    /// [compute_loop_info](crate::Graph::compute_loop_info).
    pub(crate) loop_info: Option<LoopRef>,
}

impl Block {
    pub fn phis(&self) -> &[InstRef] {
        &self.phis
    }

    pub fn insts(&self) -> &[InstRef] {
        &self.insts
    }

    pub fn preds(&self) -> &[BlockRef] {
        &self.preds
    }

    pub fn succs(&self) -> &[BlockRef] {
        &self.succs
    }

    ///The last instruction of the block, which is the terminator on any
    /// fully built block.
    pub fn terminator(&self) -> Option<InstRef> {
        self.insts.last().copied()
    }

    pub fn idom(&self) -> Option<BlockRef> {
        self.idom
    }

    pub fn loop_info(&self) -> Option<LoopRef> {
        self.loop_info
    }

    ///Index of `pred` in this block's predecessor list. This is the input
    /// index the block's phis use for values arriving over that edge.
    pub fn pred_index(&self, pred: BlockRef) -> Option<usize> {
        self.preds.iter().position(|p| *p == pred)
    }
}

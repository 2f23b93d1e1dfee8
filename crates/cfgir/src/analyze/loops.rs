/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Natural-loop detection from back edges.
//!
//! A back edge is an edge `latch -> header` where `header` dominates
//! `latch`. The loop body is everything that reaches a latch without going
//! through the header. Each block records its innermost containing loop.

use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;

use crate::{BlockRef, Graph, LoopRef};

///Metadata of one natural loop.
#[derive(Debug, Clone)]
pub struct LoopInfo {
    pub header: BlockRef,
    ///Source blocks of the back edges entering `header`.
    pub back_edges: SmallVec<[BlockRef; 1]>,
    ///All member blocks, the header included.
    pub blocks: AHashSet<BlockRef>,
}

impl LoopInfo {
    pub fn contains(&self, block: BlockRef) -> bool {
        self.blocks.contains(&block)
    }

    ///The single back-edge block, if the loop has exactly one.
    pub fn single_back_edge(&self) -> Option<BlockRef> {
        if self.back_edges.len() == 1 {
            Some(self.back_edges[0])
        } else {
            None
        }
    }
}

impl Graph {
    ///Recomputes dominators and rebuilds the loop arena from the current
    /// CFG. All previously handed out [LoopRef]s become stale.
    pub fn compute_loop_info(&mut self) {
        self.compute_dominators();
        self.loops.clear();
        for (_, block) in self.blocks.iter_mut() {
            block.loop_info = None;
        }

        //collect back edges per header
        let mut headers: AHashMap<BlockRef, SmallVec<[BlockRef; 1]>> = AHashMap::default();
        for block in self.postorder() {
            for succ in self.block(block).succs().to_vec() {
                if self.dominates(succ, block) {
                    headers.entry(succ).or_default().push(block);
                }
            }
        }

        let mut found: Vec<LoopRef> = Vec::with_capacity(headers.len());
        for (header, back_edges) in headers {
            let mut blocks = AHashSet::default();
            blocks.insert(header);
            let mut stack: Vec<BlockRef> = back_edges.iter().copied().collect();
            while let Some(next) = stack.pop() {
                if blocks.insert(next) {
                    for pred in self.block(next).preds() {
                        stack.push(*pred);
                    }
                }
            }
            found.push(self.loops.insert(LoopInfo {
                header,
                back_edges,
                blocks,
            }));
        }

        //assign the innermost loop per block: write larger loops first so
        //smaller (nested) ones overwrite
        found.sort_by_key(|l| std::cmp::Reverse(self.loops[*l].blocks.len()));
        for lref in found {
            let members: Vec<_> = self.loops[lref].blocks.iter().copied().collect();
            for member in members {
                self.block_mut(member).loop_info = Some(lref);
            }
        }

        #[cfg(feature = "log")]
        log::debug!("loop analysis found {} loops", self.loops.len());
    }

    ///The unique predecessor of the loop's header outside the loop, if there
    /// is exactly one.
    pub fn loop_preheader(&self, lref: LoopRef) -> Option<BlockRef> {
        let info = self.loop_info(lref);
        let mut preheader = None;
        for pred in self.block(info.header).preds() {
            if !info.contains(*pred) {
                if preheader.is_some() {
                    return None;
                }
                preheader = Some(*pred);
            }
        }
        preheader
    }
}

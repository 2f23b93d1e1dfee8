/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Depth-first traversal orders over the CFG.

use ahash::AHashSet;

use crate::{BlockRef, Graph};

impl Graph {
    ///Post-order over all blocks reachable from the entry.
    pub fn postorder(&self) -> Vec<BlockRef> {
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut seen = AHashSet::with_capacity(self.blocks.len());
        //iterative DFS; the stack carries (block, next-successor-index)
        let mut stack = vec![(self.entry, 0usize)];
        seen.insert(self.entry);
        loop {
            let (block, child) = match stack.last_mut() {
                Some(top) => {
                    let snapshot = *top;
                    top.1 += 1;
                    snapshot
                }
                None => break,
            };
            let succs = self.block(block).succs();
            if child < succs.len() {
                let next = succs[child];
                if seen.insert(next) {
                    stack.push((next, 0));
                }
            } else {
                order.push(block);
                stack.pop();
            }
        }
        order
    }

    ///Reverse post-order: every block is visited before its (non-back-edge)
    /// successors, which is the order the iterative dominator computation
    /// wants.
    pub fn reverse_postorder(&self) -> Vec<BlockRef> {
        let mut order = self.postorder();
        order.reverse();
        order
    }
}

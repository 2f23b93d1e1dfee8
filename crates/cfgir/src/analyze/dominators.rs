/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Iterative dominator computation following the data-flow formulation of
//! _A Simple, Fast Dominance Algorithm_ (Cooper, Harvey, Kennedy).

use ahash::AHashMap;

use crate::{BlockRef, Graph};

impl Graph {
    ///Recomputes the immediate dominator of every reachable block. The entry
    /// block (and unreachable blocks) end up with `idom == None`.
    pub fn compute_dominators(&mut self) {
        let rpo = self.reverse_postorder();
        let mut rpo_index = AHashMap::with_capacity(rpo.len());
        for (idx, block) in rpo.iter().enumerate() {
            rpo_index.insert(*block, idx);
        }

        //idom fixpoint, with the entry mapped onto itself while iterating
        let mut idom: AHashMap<BlockRef, BlockRef> = AHashMap::with_capacity(rpo.len());
        idom.insert(self.entry, self.entry);

        let mut changed = true;
        while changed {
            changed = false;
            for block in rpo.iter().skip(1) {
                let mut new_idom: Option<BlockRef> = None;
                for pred in self.block(*block).preds() {
                    //only predecessors that already have a candidate participate
                    if !idom.contains_key(pred) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => *pred,
                        Some(current) => intersect(*pred, current, &idom, &rpo_index),
                    });
                }
                let new_idom = new_idom.expect("reachable block without processed predecessor");
                if idom.get(block) != Some(&new_idom) {
                    idom.insert(*block, new_idom);
                    changed = true;
                }
            }
        }

        for (bref, block) in self.blocks.iter_mut() {
            block.idom = if bref == self.entry {
                None
            } else {
                idom.get(&bref).copied()
            };
        }
    }

    ///True if `a` dominates `b` under the dominator tree computed by
    /// [Self::compute_dominators]. Every block dominates itself.
    pub fn dominates(&self, a: BlockRef, b: BlockRef) -> bool {
        let mut runner = b;
        loop {
            if runner == a {
                return true;
            }
            match self.block(runner).idom {
                Some(next) => runner = next,
                None => return false,
            }
        }
    }
}

fn intersect(
    mut a: BlockRef,
    mut b: BlockRef,
    idom: &AHashMap<BlockRef, BlockRef>,
    rpo_index: &AHashMap<BlockRef, usize>,
) -> BlockRef {
    while a != b {
        while rpo_index[&a] > rpo_index[&b] {
            a = idom[&a];
        }
        while rpo_index[&b] > rpo_index[&a] {
            b = idom[&b];
        }
    }
    a
}

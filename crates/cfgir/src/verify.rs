//! Structural SSA validation helpers on the graph.

use ahash::AHashMap;

use crate::{Graph, InstRef};

impl Graph {
    ///Returns true if the graph is a structurally valid SSA CFG.
    ///
    /// Checked: pred/succ symmetry, exactly one terminator per block sitting
    /// at the end of the instruction list, phi input counts matching the
    /// predecessor count, def-use symmetry, and defs dominating their uses.
    /// Findings are printed, so a failing pass can be diagnosed from the log
    /// of the run that produced the broken graph.
    pub fn structure_valid(&mut self) -> bool {
        let mut found_error = false;

        //edge symmetry
        for bref in self.blocks.keys() {
            for succ in self.block(bref).succs() {
                if self.block(*succ).pred_index(bref).is_none() {
                    println!("block {bref:?} lists successor {succ:?}, which does not know it");
                    found_error = true;
                }
            }
            for pred in self.block(bref).preds() {
                if !self.block(*pred).succs().contains(&bref) {
                    println!("block {bref:?} lists predecessor {pred:?}, which does not know it");
                    found_error = true;
                }
            }
        }

        //block layout
        for (bref, block) in self.blocks.iter() {
            match block.terminator() {
                None => {
                    println!("block {bref:?} has no terminator");
                    found_error = true;
                }
                Some(term) => {
                    if !self.inst(term).is_terminator() {
                        println!("block {bref:?} does not end in a terminator");
                        found_error = true;
                    }
                }
            }
            for inst in block.insts() {
                let i = self.inst(*inst);
                if i.is_terminator() && Some(*inst) != block.terminator() {
                    println!("terminator {inst:?} in the middle of block {bref:?}");
                    found_error = true;
                }
                if i.block() != Some(bref) {
                    println!("instruction {inst:?} in block {bref:?} claims block {:?}", i.block());
                    found_error = true;
                }
            }
            for phi in block.phis() {
                let p = self.inst(*phi);
                if !p.is_phi() {
                    println!("non-phi {phi:?} in the phi list of {bref:?}");
                    found_error = true;
                }
                if p.inputs().len() != block.preds().len() {
                    println!(
                        "phi {phi:?} has {} inputs but {bref:?} has {} predecessors",
                        p.inputs().len(),
                        block.preds().len()
                    );
                    found_error = true;
                }
                if p.block() != Some(bref) {
                    println!("phi {phi:?} in block {bref:?} claims block {:?}", p.block());
                    found_error = true;
                }
            }
        }

        //def-use symmetry
        for (iref, inst) in self.insts.iter() {
            for (index, input) in inst.inputs().iter().enumerate() {
                match self.insts.get(*input) {
                    None => {
                        println!("instruction {iref:?} reads deleted value {input:?}");
                        found_error = true;
                    }
                    Some(def) => {
                        if !def.uses().iter().any(|u| u.user == iref && u.index == index) {
                            println!("{input:?} does not record the use by {iref:?}#{index}");
                            found_error = true;
                        }
                    }
                }
            }
            for u in inst.uses() {
                let holds = self
                    .insts
                    .get(u.user)
                    .map(|user| user.inputs().get(u.index) == Some(&iref))
                    .unwrap_or(false);
                if !holds {
                    println!("{iref:?} records a use by {:?}#{} that does not exist", u.user, u.index);
                    found_error = true;
                }
            }
        }

        if !found_error {
            found_error = !self.defs_dominate_uses();
        }

        !found_error
    }

    ///Checks the SSA dominance property. Recomputes dominators, so this is
    /// only called on an otherwise structurally sound graph.
    fn defs_dominate_uses(&mut self) -> bool {
        self.compute_dominators();

        //position of every attached instruction within its block, for the
        //same-block ordering check
        let mut position: AHashMap<InstRef, usize> = AHashMap::with_capacity(self.insts.len());
        for (_, block) in self.blocks.iter() {
            for (idx, phi) in block.phis().iter().enumerate() {
                position.insert(*phi, idx);
            }
            let phi_count = block.phis().len();
            for (idx, inst) in block.insts().iter().enumerate() {
                position.insert(*inst, phi_count + idx);
            }
        }

        let mut ok = true;
        for (iref, inst) in self.insts.iter() {
            let def_block = match inst.block() {
                Some(b) => b,
                //unattached instructions are checked via the attachment
                //asserts of the mutators, not here
                None => continue,
            };
            for u in inst.uses() {
                let user = self.inst(u.user);
                let use_block = match user.block() {
                    Some(b) => b,
                    None => continue,
                };
                let dominated = if user.is_phi() {
                    //a phi reads its input at the end of the matching
                    //predecessor
                    let pred = self.block(use_block).preds()[u.index];
                    self.dominates(def_block, pred)
                } else if use_block == def_block {
                    position[&iref] < position[&u.user]
                } else {
                    self.dominates(def_block, use_block)
                };
                if !dominated {
                    println!(
                        "def {iref:?} ({def_block:?}) does not dominate its use by {:?} ({use_block:?})",
                        u.user
                    );
                    ok = false;
                }
            }
        }
        ok
    }
}

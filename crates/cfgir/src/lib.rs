//! # CfgIR
//!
//! An arena based SSA control-flow-graph IR, kept independent of any concrete
//! compiler frontend or backend. Blocks, instructions and loops live in
//! [slotmap](https://docs.rs/slotmap) arenas and reference each other through
//! keys, which makes the structure's inherent cycles (loop back edges, phi
//! self references, use lists pointing back at definitions) representable
//! without ownership cycles.
//!
//! The crate provides the graph model itself, the def-use and environment-use
//! bookkeeping, dominator and natural-loop analysis in [analyze], structural
//! SSA validation in [verify], and (behind the `dot` feature) a graphviz dump
//! of the graph.
//!
//! Mutation goes through the methods on [Graph]. They keep the pred/succ and
//! def-use symmetry intact, so a transformation pass can never observe a
//! half-updated edge.

use slotmap::{new_key_type, SlotMap};

pub mod analyze;
pub mod block;
pub mod builder;
#[cfg(feature = "dot")]
pub mod dot;
pub mod err;
pub mod inst;
pub mod verify;

use analyze::loops::LoopInfo;
use block::Block;
use err::GraphError;
use inst::{Instruction, Op, Ty, Use};

new_key_type! {pub struct BlockRef;}
new_key_type! {pub struct InstRef;}
new_key_type! {pub struct LoopRef;}

///The graph of one compilation unit. Owns every block, instruction and loop
/// record; all cross references are arena keys.
pub struct Graph {
    pub(crate) blocks: SlotMap<BlockRef, Block>,
    pub(crate) insts: SlotMap<InstRef, Instruction>,
    pub(crate) loops: SlotMap<LoopRef, LoopInfo>,

    ///Entry block of this unit. Has no predecessors, holds the parameters.
    pub(crate) entry: BlockRef,
}

impl Graph {
    pub fn new() -> Self {
        let mut blocks = SlotMap::with_key();
        let entry = blocks.insert(Block::default());
        Graph {
            blocks,
            insts: SlotMap::with_key(),
            loops: SlotMap::with_key(),
            entry,
        }
    }

    pub fn entry(&self) -> BlockRef {
        self.entry
    }

    ///Returns reference to the block, assuming that it exists. Panics if it does not exist.
    pub fn block(&self, bref: BlockRef) -> &Block {
        self.blocks.get(bref).unwrap()
    }

    ///Returns reference to the block, assuming that it exists. Panics if it does not exist.
    pub fn block_mut(&mut self, bref: BlockRef) -> &mut Block {
        self.blocks.get_mut(bref).unwrap()
    }

    ///Returns reference to the instruction, assuming that it exists. Panics if it does not exist.
    pub fn inst(&self, iref: InstRef) -> &Instruction {
        self.insts.get(iref).unwrap()
    }

    ///Returns reference to the instruction, assuming that it exists. Panics if it does not exist.
    pub fn inst_mut(&mut self, iref: InstRef) -> &mut Instruction {
        self.insts.get_mut(iref).unwrap()
    }

    ///Returns the instruction if its key is still live.
    pub fn try_inst(&self, iref: InstRef) -> Option<&Instruction> {
        self.insts.get(iref)
    }

    pub fn block_refs(&self) -> impl Iterator<Item = BlockRef> + '_ {
        self.blocks.keys()
    }

    pub fn inst_refs(&self) -> impl Iterator<Item = InstRef> + '_ {
        self.insts.keys()
    }

    pub fn loop_refs(&self) -> impl Iterator<Item = LoopRef> + '_ {
        self.loops.keys()
    }

    pub fn loop_info(&self, lref: LoopRef) -> &LoopInfo {
        self.loops.get(lref).unwrap()
    }

    pub fn new_block(&mut self) -> BlockRef {
        self.blocks.insert(Block::default())
    }

    //---------------------------------------------------------------------
    // Instruction creation & attachment
    //---------------------------------------------------------------------

    ///Creates an unattached instruction and registers it as a user of all of
    /// its inputs. The instruction must be attached with [Self::attach_inst]
    /// or [Self::attach_phi] before anything may reference it.
    pub fn create_inst(&mut self, op: Op, ty: Ty, inputs: &[InstRef]) -> InstRef {
        let iref = self.insts.insert(Instruction::new(op, ty, inputs));
        for (index, input) in inputs.iter().enumerate() {
            self.insts.get_mut(*input).unwrap().uses.push(Use {
                user: iref,
                index,
            });
        }
        iref
    }

    ///Appends `inst` to the end of `block`'s instruction list.
    pub fn attach_inst(&mut self, block: BlockRef, inst: InstRef) {
        assert!(
            !self.inst(inst).is_phi(),
            "phis are attached via attach_phi"
        );
        assert!(
            self.inst(inst).block.is_none(),
            "instruction is already attached"
        );
        self.inst_mut(inst).block = Some(block);
        self.block_mut(block).insts.push(inst);
    }

    ///Appends the phi `inst` to `block`'s phi list. The phi must carry
    /// exactly one input per predecessor of `block`, input `i` belonging to
    /// `preds[i]`.
    pub fn attach_phi(&mut self, block: BlockRef, inst: InstRef) {
        assert!(self.inst(inst).is_phi());
        assert!(self.inst(inst).block.is_none());
        assert_eq!(
            self.inst(inst).inputs.len(),
            self.block(block).preds.len(),
            "phi input count must match predecessor count"
        );
        self.inst_mut(inst).block = Some(block);
        self.block_mut(block).phis.push(inst);
    }

    ///Inserts `inst` into `block` directly before `anchor`. Used when a
    /// replacement value must dominate the instruction it replaces.
    pub fn attach_inst_before(&mut self, block: BlockRef, anchor: InstRef, inst: InstRef) {
        assert!(!self.inst(inst).is_phi());
        assert!(self.inst(inst).block.is_none());
        let pos = self
            .block(block)
            .insts
            .iter()
            .position(|i| *i == anchor)
            .expect("anchor instruction is not in the target block");
        self.inst_mut(inst).block = Some(block);
        self.block_mut(block).insts.insert(pos, inst);
    }

    ///Creates an instruction and appends it to `block` in one go.
    pub fn append(&mut self, block: BlockRef, op: Op, ty: Ty, inputs: &[InstRef]) -> InstRef {
        let iref = self.create_inst(op, ty, inputs);
        self.attach_inst(block, iref);
        iref
    }

    ///Creates a phi in `block` with one input per predecessor.
    pub fn append_phi(&mut self, block: BlockRef, ty: Ty, inputs: &[InstRef]) -> InstRef {
        let iref = self.create_inst(Op::Phi, ty, inputs);
        self.attach_phi(block, iref);
        iref
    }

    ///Sets the environment (side-table) operands of `inst`, registering the
    /// matching env uses. May only be set once, before graph surgery uses
    /// the instruction.
    pub fn set_env(&mut self, inst: InstRef, env: &[InstRef]) {
        assert!(
            self.inst(inst).env.is_empty(),
            "environment is only set once"
        );
        self.inst_mut(inst).env = smallvec::SmallVec::from_slice(env);
        for (index, value) in env.iter().enumerate() {
            self.insts.get_mut(*value).unwrap().env_uses.push(Use {
                user: inst,
                index,
            });
        }
    }

    ///Clones `src` into a new, unattached instruction with identical op,
    /// type, inputs and environment, registering it as a user of all of
    /// them. The clone has no uses of its own.
    pub fn clone_inst(&mut self, src: InstRef) -> InstRef {
        let (op, ty, inputs, env) = {
            let inst = self.inst(src);
            (
                inst.op.clone(),
                inst.ty,
                inst.inputs.clone(),
                inst.env.clone(),
            )
        };
        let clone = self.create_inst(op, ty, &inputs);
        if !env.is_empty() {
            self.set_env(clone, &env);
        }
        clone
    }

    //---------------------------------------------------------------------
    // Edge bookkeeping
    //---------------------------------------------------------------------

    ///Adds the CFG edge `from -> to`. The caller is responsible for keeping
    /// the edge order consistent with `from`'s terminator (a [Op::Branch]
    /// takes `succs[0]` when its condition holds), and for giving any phi in
    /// `to` an input for the new edge (see [Self::add_phi_input]).
    pub fn connect_blocks(&mut self, from: BlockRef, to: BlockRef) {
        self.block_mut(from).succs.push(to);
        self.block_mut(to).preds.push(from);
    }

    ///Appends `value` as the input of `phi` for the most recently added
    /// predecessor edge of its block. Used when closing a loop: the phi is
    /// created with its forward inputs, the back edge is connected, then the
    /// loop-carried input is added.
    pub fn add_phi_input(&mut self, phi: InstRef, value: InstRef) {
        assert!(self.inst(phi).is_phi());
        let index = self.inst(phi).inputs.len();
        if let Some(block) = self.inst(phi).block {
            assert!(
                index < self.block(block).preds.len(),
                "phi would have more inputs than its block has predecessors"
            );
        }
        self.inst_mut(phi).inputs.push(value);
        self.insts.get_mut(value).unwrap().uses.push(Use { user: phi, index });
    }

    ///Replaces the successor edge `from -> old_to` with `from -> new_to`,
    /// keeping the successor slot (and with it the branch polarity) stable.
    ///
    /// `old_to` loses `from` as a predecessor; any phi in `old_to` drops the
    /// input belonging to that edge. `new_to` must not have phis yet, since
    /// it gains a predecessor.
    pub fn redirect_successor(
        &mut self,
        from: BlockRef,
        old_to: BlockRef,
        new_to: BlockRef,
    ) -> Result<(), GraphError> {
        let slot = self
            .block(from)
            .succs
            .iter()
            .position(|s| *s == old_to)
            .ok_or(GraphError::NotASuccessor(old_to, from))?;
        self.block_mut(from).succs[slot] = new_to;

        let pred_idx = self
            .block(old_to)
            .pred_index(from)
            .ok_or(GraphError::NotASuccessor(old_to, from))?;
        self.block_mut(old_to).preds.remove(pred_idx);
        //drop the phi inputs that arrived over the removed edge
        let phis = self.block(old_to).phis.clone();
        for phi in phis {
            self.remove_input(phi, pred_idx);
        }

        assert!(
            self.block(new_to).phis.is_empty(),
            "redirecting onto a block with phis would desync phi inputs"
        );
        self.block_mut(new_to).preds.push(from);
        Ok(())
    }

    //---------------------------------------------------------------------
    // Input replacement
    //---------------------------------------------------------------------

    ///Replaces input `index` of `user` with `new_input`.
    ///
    /// Panics if `new_input` is not attached to a block. An unattached
    /// replacement means the caller wired in an instruction it never
    /// inserted, which is a latent miscompile, not a recoverable state.
    pub fn replace_input(&mut self, user: InstRef, index: usize, new_input: InstRef) {
        assert!(
            self.inst(new_input).block.is_some(),
            "new input {new_input:?} is not attached to any block"
        );
        let old = self.inst(user).inputs[index];
        if old == new_input {
            return;
        }
        #[cfg(feature = "log")]
        log::trace!("replacing input #{index} of {user:?}: {old:?} -> {new_input:?}");
        self.unregister_use(old, user, index);
        self.inst_mut(user).inputs[index] = new_input;
        self.insts.get_mut(new_input).unwrap().uses.push(Use {
            user,
            index,
        });
    }

    ///Replaces environment operand `index` of `user` with `new_input`, with
    /// the same attachment requirement as [Self::replace_input].
    pub fn replace_env_input(&mut self, user: InstRef, index: usize, new_input: InstRef) {
        assert!(
            self.inst(new_input).block.is_some(),
            "new env input {new_input:?} is not attached to any block"
        );
        let old = self.inst(user).env[index];
        if old == new_input {
            return;
        }
        #[cfg(feature = "log")]
        log::trace!("replacing env input #{index} of {user:?}: {old:?} -> {new_input:?}");
        self.unregister_env_use(old, user, index);
        self.inst_mut(user).env[index] = new_input;
        self.insts.get_mut(new_input).unwrap().env_uses.push(Use {
            user,
            index,
        });
    }

    ///Rewires every use and env use of `of` to `with`. Mostly interesting
    /// for folding passes; structural passes usually redirect selectively.
    pub fn replace_all_uses_with(&mut self, of: InstRef, with: InstRef) {
        let uses = self.inst(of).uses.clone();
        for u in uses {
            self.replace_input(u.user, u.index, with);
        }
        let env_uses = self.inst(of).env_uses.clone();
        for u in env_uses {
            self.replace_env_input(u.user, u.index, with);
        }
    }

    ///Drops input `index` of `inst` entirely (shifting the remaining inputs
    /// left). Only meaningful for phis whose predecessor edge disappeared.
    pub(crate) fn remove_input(&mut self, inst: InstRef, index: usize) {
        let old = self.inst(inst).inputs[index];
        self.unregister_use(old, inst, index);
        self.inst_mut(inst).inputs.remove(index);
        //re-key the uses of inputs that shifted down
        let inputs = self.inst(inst).inputs.clone();
        for (new_index, input) in inputs.iter().enumerate().skip(index) {
            for u in self.insts.get_mut(*input).unwrap().uses.iter_mut() {
                if u.user == inst && u.index == new_index + 1 {
                    u.index = new_index;
                    break;
                }
            }
        }
    }

    fn unregister_use(&mut self, def: InstRef, user: InstRef, index: usize) {
        let uses = &mut self.insts.get_mut(def).unwrap().uses;
        let pos = uses
            .iter()
            .position(|u| u.user == user && u.index == index)
            .expect("use list out of sync with input list");
        uses.swap_remove(pos);
    }

    fn unregister_env_use(&mut self, def: InstRef, user: InstRef, index: usize) {
        let env_uses = &mut self.insts.get_mut(def).unwrap().env_uses;
        let pos = env_uses
            .iter()
            .position(|u| u.user == user && u.index == index)
            .expect("env use list out of sync with env list");
        env_uses.swap_remove(pos);
    }

    //---------------------------------------------------------------------
    // Removal
    //---------------------------------------------------------------------

    ///Removes `inst` from its block and the arena. Fails while the
    /// instruction still has uses or env uses.
    pub fn remove_inst(&mut self, inst: InstRef) -> Result<(), GraphError> {
        {
            let i = self.insts.get(inst).ok_or(GraphError::InvalidInst(inst))?;
            if !i.uses.is_empty() || !i.env_uses.is_empty() {
                return Err(GraphError::StillInUse(inst));
            }
        }
        let inputs = self.inst(inst).inputs.clone();
        for (index, input) in inputs.iter().enumerate() {
            self.unregister_use(*input, inst, index);
        }
        let env = self.inst(inst).env.clone();
        for (index, value) in env.iter().enumerate() {
            self.unregister_env_use(*value, inst, index);
        }
        if let Some(block) = self.inst(inst).block {
            let b = self.block_mut(block);
            b.phis.retain(|i| *i != inst);
            b.insts.retain(|i| *i != inst);
        }
        self.insts.remove(inst);
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<BlockRef> for Graph {
    type Output = Block;
    fn index(&self, index: BlockRef) -> &Self::Output {
        self.block(index)
    }
}

impl std::ops::IndexMut<BlockRef> for Graph {
    fn index_mut(&mut self, index: BlockRef) -> &mut Self::Output {
        self.block_mut(index)
    }
}

impl std::ops::Index<InstRef> for Graph {
    type Output = Instruction;
    fn index(&self, index: InstRef) -> &Self::Output {
        self.inst(index)
    }
}

impl std::ops::IndexMut<InstRef> for Graph {
    fn index_mut(&mut self, index: InstRef) -> &mut Self::Output {
        self.inst_mut(index)
    }
}

impl std::ops::Index<LoopRef> for Graph {
    type Output = LoopInfo;
    fn index(&self, index: LoopRef) -> &Self::Output {
        self.loop_info(index)
    }
}

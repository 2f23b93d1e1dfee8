/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! The instruction catalog of the IR.
//!
//! Each [Instruction] is a single SSA value (or a terminator) living in a
//! [Block](crate::block::Block). The [Op] enum classifies side effects and
//! throw behavior, which is what transformation gates query before they
//! duplicate or move code.

use smallvec::SmallVec;

use crate::{BlockRef, InstRef};

///Type of a value produced by an [Instruction].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ty {
    Int,
    Bool,
    ///Reference to an int array. Only produced by parameters.
    Array,
    ///Produced by terminators and other non-value instructions.
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

///Operation of a single instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    ///The `n`-th function parameter. Only valid in the entry block.
    Param(u32),
    ConstInt(i64),
    ConstBool(bool),
    ///inputs: `[lhs, rhs]`
    Binary(BinaryOp),
    ///inputs: `[lhs, rhs]`, produces [Ty::Bool]
    Cmp(CmpKind),
    ///inputs: `[array, index]`. Throws on an out-of-bounds index.
    ArrayGet,
    ///Call to an opaque external function. Globally observable.
    Call(String),
    ///Merge of one value per predecessor. Input `i` corresponds to
    /// `preds[i]` of the owning block.
    Phi,
    ///Unconditional jump to `succs[0]`.
    Goto,
    ///inputs: `[condition]`. Jumps to `succs[0]` if the condition holds,
    /// to `succs[1]` otherwise.
    Branch,
    ///inputs: `[value]` or empty for void returns.
    Return,
}

impl Op {
    ///True if executing this operation is observable beyond its own result.
    pub fn has_side_effects(&self) -> bool {
        matches!(self, Op::Call(_))
    }

    ///True if this operation can transfer control to an exception handler.
    pub fn can_throw(&self) -> bool {
        matches!(self, Op::ArrayGet | Op::Call(_))
    }

    ///True if executing this operation twice is indistinguishable from
    /// executing it once. This is what loop-restructuring gates query
    /// before they copy a block.
    pub fn is_safe_to_duplicate(&self) -> bool {
        matches!(
            self,
            Op::ConstInt(_) | Op::ConstBool(_) | Op::Binary(_) | Op::Cmp(_)
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Op::Phi)
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::Goto | Op::Branch | Op::Return)
    }
}

///A single recorded use: `user`'s input (or environment slot) `index`
/// reads the instruction the use is registered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub user: InstRef,
    pub index: usize,
}

///A single instruction in the arena. Inputs and uses are kept symmetric by
/// the mutators on [Graph](crate::Graph); never edit the lists directly.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub op: Op,
    pub ty: Ty,
    pub(crate) inputs: SmallVec<[InstRef; 2]>,
    pub(crate) uses: Vec<Use>,
    ///Environment (side-table) operands. Deoptimization state that is not
    /// a data input, but still a recorded use of the referenced values.
    pub(crate) env: SmallVec<[InstRef; 4]>,
    pub(crate) env_uses: Vec<Use>,
    pub(crate) block: Option<BlockRef>,
}

impl Instruction {
    pub(crate) fn new(op: Op, ty: Ty, inputs: &[InstRef]) -> Self {
        Instruction {
            op,
            ty,
            inputs: SmallVec::from_slice(inputs),
            uses: Vec::with_capacity(0),
            env: SmallVec::new(),
            env_uses: Vec::with_capacity(0),
            block: None,
        }
    }

    pub fn inputs(&self) -> &[InstRef] {
        &self.inputs
    }

    pub fn input(&self, index: usize) -> InstRef {
        self.inputs[index]
    }

    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    pub fn env(&self) -> &[InstRef] {
        &self.env
    }

    pub fn env_uses(&self) -> &[Use] {
        &self.env_uses
    }

    ///The block this instruction is attached to, if any. Unattached
    /// instructions only exist transiently during graph surgery.
    pub fn block(&self) -> Option<BlockRef> {
        self.block
    }

    pub fn is_phi(&self) -> bool {
        self.op.is_phi()
    }

    pub fn is_terminator(&self) -> bool {
        self.op.is_terminator()
    }
}

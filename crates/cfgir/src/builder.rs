/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Construction helpers for building graphs by hand, used by frontends and
//! by the test suites. These are thin wrappers over the raw mutators that
//! keep terminator and edge creation in one call.

use crate::{
    inst::{BinaryOp, CmpKind, Op, Ty},
    BlockRef, Graph, InstRef,
};

impl Graph {
    ///Declares parameter `index` in the entry block.
    pub fn add_param(&mut self, index: u32, ty: Ty) -> InstRef {
        let entry = self.entry();
        self.append(entry, Op::Param(index), ty, &[])
    }

    pub fn const_int(&mut self, block: BlockRef, value: i64) -> InstRef {
        self.append(block, Op::ConstInt(value), Ty::Int, &[])
    }

    pub fn const_bool(&mut self, block: BlockRef, value: bool) -> InstRef {
        self.append(block, Op::ConstBool(value), Ty::Bool, &[])
    }

    pub fn binary(
        &mut self,
        block: BlockRef,
        op: BinaryOp,
        lhs: InstRef,
        rhs: InstRef,
    ) -> InstRef {
        self.append(block, Op::Binary(op), Ty::Int, &[lhs, rhs])
    }

    pub fn cmp(&mut self, block: BlockRef, kind: CmpKind, lhs: InstRef, rhs: InstRef) -> InstRef {
        self.append(block, Op::Cmp(kind), Ty::Bool, &[lhs, rhs])
    }

    pub fn array_get(&mut self, block: BlockRef, array: InstRef, index: InstRef) -> InstRef {
        self.append(block, Op::ArrayGet, Ty::Int, &[array, index])
    }

    pub fn call(
        &mut self,
        block: BlockRef,
        callee: &str,
        ty: Ty,
        args: &[InstRef],
    ) -> InstRef {
        self.append(block, Op::Call(callee.to_owned()), ty, args)
    }

    ///Terminates `block` with an unconditional jump.
    pub fn goto(&mut self, block: BlockRef, target: BlockRef) -> InstRef {
        let term = self.append(block, Op::Goto, Ty::Void, &[]);
        self.connect_blocks(block, target);
        term
    }

    ///Terminates `block` with a two-way branch. `if_true` becomes
    /// `succs[0]`, `if_false` becomes `succs[1]`.
    pub fn branch(
        &mut self,
        block: BlockRef,
        condition: InstRef,
        if_true: BlockRef,
        if_false: BlockRef,
    ) -> InstRef {
        let term = self.append(block, Op::Branch, Ty::Void, &[condition]);
        self.connect_blocks(block, if_true);
        self.connect_blocks(block, if_false);
        term
    }

    pub fn ret(&mut self, block: BlockRef, value: Option<InstRef>) -> InstRef {
        match value {
            Some(v) => self.append(block, Op::Return, Ty::Void, &[v]),
            None => self.append(block, Op::Return, Ty::Void, &[]),
        }
    }
}

use thiserror::Error;

use crate::{BlockRef, InstRef};

///Errors that happen when operating on the graph directly. For instance, when
/// trying to remove an instruction that is still in use, or rewiring an edge
/// that does not exist.
#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("The instruction {0:?} is invalid. It might have been deleted since its creation.")]
    InvalidInst(InstRef),
    #[error("The block {0:?} is invalid. It might have been deleted since its creation.")]
    InvalidBlock(BlockRef),

    #[error("The instruction {0:?} is still in use and cannot be removed")]
    StillInUse(InstRef),
    #[error("{0:?} is not a successor of {1:?}")]
    NotASuccessor(BlockRef, BlockRef),
    #[error("Block {0:?} has no terminator")]
    NoTerminator(BlockRef),
    #[error("Input index {index} out of range on {inst:?}")]
    InvalidInputIndex { inst: InstRef, index: usize },
}

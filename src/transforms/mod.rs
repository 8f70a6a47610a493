//! Graph-to-graph lowering passes.

pub mod loop_lowering;

pub use loop_lowering::{lower_loop, LoopOp};

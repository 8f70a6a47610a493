//! Operation dialects.
//!
//! Each dialect groups related operations under a shared namespace:
//! `arith` for scalar and tensor arithmetic, `tensor` for shape
//! manipulation, `flow` for structured control flow.

pub mod arith;
pub mod flow;
pub mod tensor;

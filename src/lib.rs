//! Arena-based tensor graph IR with structured-loop lowering.
//!
//! The crate has three layers:
//!
//! - the arena ([`IrContext`], [`refs`], [`types`]): nodes, values and
//!   graphs addressed by index, with automatic use-chains;
//! - dialects ([`dialect`]): typed views and constructors for the
//!   operations the IR knows about;
//! - transforms ([`transforms`]): the lowering from the permissive source
//!   loop operation to the strict [`dialect::flow`] loop construct.

pub mod context;
pub mod diagnostic;
pub mod dialect;
pub mod errors;
pub mod ir;
pub mod ops;
pub mod printer;
pub mod refs;
pub mod transforms;
pub mod types;

pub use context::{GraphData, GraphParamData, IrContext, NodeData, NodeDataBuilder, Use, ValueData};
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use errors::LowerError;
pub use ir::Symbol;
pub use ops::{ConversionError, GraphOp};
pub use printer::{print_graph, print_node};
pub use refs::{GraphRef, NodeRef, TypeRef, ValueDef, ValueRef};
pub use transforms::{lower_loop, LoopOp};
pub use types::{Attribute, ElementType, Shape, TensorType, TypeInterner};

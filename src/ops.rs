//! Typed views over generic nodes.
//!
//! Dialect modules define lightweight wrapper structs around `NodeRef` that
//! implement [`GraphOp`]. A wrapper is constructed by checking the node's
//! dialect and operation name, after which its accessors decode operands and
//! attributes with the right types.

use crate::context::IrContext;
use crate::ir::Symbol;
use crate::refs::NodeRef;

/// Error that occurs when converting a generic node to a typed wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The node is not the expected operation.
    WrongOperation {
        expected: &'static str,
        actual: String,
    },
    /// The node has the wrong number of operands.
    WrongOperandCount { expected: usize, actual: usize },
    /// A required attribute is missing.
    MissingAttribute(&'static str),
    /// An attribute has the wrong type.
    WrongAttributeType(&'static str),
}

impl std::fmt::Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongOperation { expected, actual } => {
                write!(f, "expected operation '{expected}', found '{actual}'")
            }
            Self::WrongOperandCount { expected, actual } => {
                write!(f, "expected {expected} operand(s), found {actual}")
            }
            Self::MissingAttribute(name) => write!(f, "missing attribute '{name}'"),
            Self::WrongAttributeType(name) => write!(f, "attribute '{name}' has wrong type"),
        }
    }
}

impl std::error::Error for ConversionError {}

/// A typed view over a node in the arena.
pub trait GraphOp: Sized + Copy {
    const DIALECT_NAME: &'static str;
    const OP_NAME: &'static str;

    /// Try to view `node` as this operation.
    fn from_node(ctx: &IrContext, node: NodeRef) -> Result<Self, ConversionError>;

    /// The underlying node.
    fn node_ref(&self) -> NodeRef;

    /// Check whether a node is this operation without constructing the view.
    fn matches(ctx: &IrContext, node: NodeRef) -> bool {
        let data = ctx.node(node);
        data.dialect == Self::DIALECT_NAME && data.name == Self::OP_NAME
    }
}

/// Shared `from_node` precondition check for wrapper impls.
pub(crate) fn expect_op<T: GraphOp>(
    ctx: &IrContext,
    node: NodeRef,
) -> Result<(), ConversionError> {
    if T::matches(ctx, node) {
        Ok(())
    } else {
        let data = ctx.node(node);
        Err(ConversionError::WrongOperation {
            expected: T::OP_NAME,
            actual: format!("{}.{}", data.dialect, data.name),
        })
    }
}

/// Check the node's operand count before accessors index into it.
pub(crate) fn expect_operands(
    ctx: &IrContext,
    node: NodeRef,
    expected: usize,
) -> Result<(), ConversionError> {
    let actual = ctx.node_operands(node).len();
    if actual == expected {
        Ok(())
    } else {
        Err(ConversionError::WrongOperandCount { expected, actual })
    }
}

/// Fetch a required attribute, or report it missing.
pub(crate) fn required_attr<'a>(
    ctx: &'a IrContext,
    node: NodeRef,
    key: Symbol,
    name: &'static str,
) -> Result<&'a crate::types::Attribute, ConversionError> {
    ctx.node(node)
        .attributes
        .get(&key)
        .ok_or(ConversionError::MissingAttribute(name))
}

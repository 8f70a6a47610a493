//! Arithmetic dialect: constants and elementwise operations.

use crate::context::{IrContext, NodeDataBuilder};
use crate::ops::{expect_op, expect_operands, required_attr, ConversionError, GraphOp};
use crate::refs::{NodeRef, TypeRef, ValueRef};
use crate::symbols;
use crate::types::{Attribute, ElementType};

symbols! {
    DIALECT_NAME => "arith",
    CONST => "const",
    OR => "or",
    ADD => "add",
    VALUE => "value",
}

// ============================================================================
// arith.const
// ============================================================================

/// A constant: no operands, one result, a `value` attribute.
#[derive(Clone, Copy, Debug)]
pub struct Const(NodeRef);

impl GraphOp for Const {
    const DIALECT_NAME: &'static str = "arith";
    const OP_NAME: &'static str = "const";

    fn from_node(ctx: &IrContext, node: NodeRef) -> Result<Self, ConversionError> {
        expect_op::<Self>(ctx, node)?;
        required_attr(ctx, node, VALUE(), "value")?;
        Ok(Self(node))
    }

    fn node_ref(&self) -> NodeRef {
        self.0
    }
}

impl Const {
    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.node_result(self.0, 0)
    }

    pub fn value<'a>(&self, ctx: &'a IrContext) -> &'a Attribute {
        &ctx.node(self.0).attributes[&VALUE()]
    }

    /// The boolean payload, if this constant holds one.
    pub fn as_bool(&self, ctx: &IrContext) -> Option<bool> {
        self.value(ctx).as_bool()
    }
}

/// Create an `arith.const` node with the given result type and payload.
pub fn r#const(ctx: &mut IrContext, ty: TypeRef, value: Attribute) -> Const {
    let data = NodeDataBuilder::new(DIALECT_NAME(), CONST())
        .result(ty)
        .attr(VALUE(), value)
        .build(ctx);
    Const(ctx.create_node(data))
}

/// Create a boolean constant of shape `[1]`.
pub fn bool_const(ctx: &mut IrContext, value: bool) -> Const {
    let ty = ctx.types.tensor(ElementType::Boolean, [1]);
    r#const(ctx, ty, Attribute::Bool(value))
}

/// Create an `i64` constant of shape `[1]`.
pub fn i64_const(ctx: &mut IrContext, value: i64) -> Const {
    let ty = ctx.types.tensor(ElementType::I64, [1]);
    r#const(ctx, ty, Attribute::Int(value))
}

// ============================================================================
// arith.or
// ============================================================================

/// Elementwise logical OR: two operands, one result.
#[derive(Clone, Copy, Debug)]
pub struct Or(NodeRef);

impl GraphOp for Or {
    const DIALECT_NAME: &'static str = "arith";
    const OP_NAME: &'static str = "or";

    fn from_node(ctx: &IrContext, node: NodeRef) -> Result<Self, ConversionError> {
        expect_op::<Self>(ctx, node)?;
        expect_operands(ctx, node, 2)?;
        Ok(Self(node))
    }

    fn node_ref(&self) -> NodeRef {
        self.0
    }
}

impl Or {
    pub fn lhs(&self, ctx: &IrContext) -> ValueRef {
        ctx.node_operands(self.0)[0]
    }

    pub fn rhs(&self, ctx: &IrContext) -> ValueRef {
        ctx.node_operands(self.0)[1]
    }

    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.node_result(self.0, 0)
    }
}

/// Create an `arith.or` node.
pub fn or(ctx: &mut IrContext, lhs: ValueRef, rhs: ValueRef, result_ty: TypeRef) -> Or {
    let data = NodeDataBuilder::new(DIALECT_NAME(), OR())
        .operand(lhs)
        .operand(rhs)
        .result(result_ty)
        .build(ctx);
    Or(ctx.create_node(data))
}

// ============================================================================
// arith.add
// ============================================================================

/// Elementwise addition: two operands, one result.
#[derive(Clone, Copy, Debug)]
pub struct Add(NodeRef);

impl GraphOp for Add {
    const DIALECT_NAME: &'static str = "arith";
    const OP_NAME: &'static str = "add";

    fn from_node(ctx: &IrContext, node: NodeRef) -> Result<Self, ConversionError> {
        expect_op::<Self>(ctx, node)?;
        expect_operands(ctx, node, 2)?;
        Ok(Self(node))
    }

    fn node_ref(&self) -> NodeRef {
        self.0
    }
}

impl Add {
    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.node_result(self.0, 0)
    }
}

/// Create an `arith.add` node.
pub fn add(ctx: &mut IrContext, lhs: ValueRef, rhs: ValueRef, result_ty: TypeRef) -> Add {
    let data = NodeDataBuilder::new(DIALECT_NAME(), ADD())
        .operand(lhs)
        .operand(rhs)
        .result(result_ty)
        .build(ctx);
    Add(ctx.create_node(data))
}

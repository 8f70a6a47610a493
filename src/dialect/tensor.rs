//! Tensor dialect: shape manipulation.

use crate::context::{IrContext, NodeDataBuilder};
use crate::ops::{expect_op, expect_operands, required_attr, ConversionError, GraphOp};
use crate::refs::{NodeRef, ValueRef};
use crate::symbols;
use crate::types::{Attribute, TensorType};

symbols! {
    DIALECT_NAME => "tensor",
    UNSQUEEZE => "unsqueeze",
    AXIS => "axis",
}

/// Insert a size-1 dimension at `axis`: one operand, one result.
#[derive(Clone, Copy, Debug)]
pub struct Unsqueeze(NodeRef);

impl GraphOp for Unsqueeze {
    const DIALECT_NAME: &'static str = "tensor";
    const OP_NAME: &'static str = "unsqueeze";

    fn from_node(ctx: &IrContext, node: NodeRef) -> Result<Self, ConversionError> {
        expect_op::<Self>(ctx, node)?;
        expect_operands(ctx, node, 1)?;
        required_attr(ctx, node, AXIS(), "axis")?
            .as_int()
            .ok_or(ConversionError::WrongAttributeType("axis"))?;
        Ok(Self(node))
    }

    fn node_ref(&self) -> NodeRef {
        self.0
    }
}

impl Unsqueeze {
    pub fn input(&self, ctx: &IrContext) -> ValueRef {
        ctx.node_operands(self.0)[0]
    }

    pub fn axis(&self, ctx: &IrContext) -> i64 {
        ctx.node(self.0).attributes[&AXIS()]
            .as_int()
            .unwrap_or_default()
    }

    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.node_result(self.0, 0)
    }
}

/// Create a `tensor.unsqueeze` node.
///
/// The result type is the input type with a size-1 dimension inserted
/// at `axis`.
pub fn unsqueeze(ctx: &mut IrContext, input: ValueRef, axis: usize) -> Unsqueeze {
    let input_ty = ctx.types.get(ctx.value_ty(input)).clone();
    let result_ty = ctx.types.intern(TensorType::new(
        input_ty.element,
        input_ty.shape.unsqueeze(axis),
    ));
    let data = NodeDataBuilder::new(DIALECT_NAME(), UNSQUEEZE())
        .operand(input)
        .attr(AXIS(), Attribute::Int(axis as i64))
        .result(result_ty)
        .build(ctx);
    Unsqueeze(ctx.create_node(data))
}

//! Flow dialect: structured control flow.
//!
//! The `flow.loop` operation is a strict structured loop. Its execution
//! model is fixed: a trip-count operand, an initial-condition operand,
//! one body graph, and explicit descriptors binding body parameters and
//! outputs to the loop's operands and results.
//!
//! Descriptors are stored as attributes so the node stays representable
//! in the generic arena:
//!
//! - `special_ports`: `[iteration_param, condition_output]`, where an
//!   absent iteration parameter is encoded as `-1`.
//! - `body_params`: indices of the body parameters fed per iteration,
//!   in body parameter order.
//! - `merged_inputs`: a list of `[operand, body_param, body_output]`
//!   triples, one per loop-carried value.
//! - `outputs`: a list of tagged descriptors. Tag `0` is an iteration
//!   value `[0, body_output, iteration]`; tag `1` is concatenated slices
//!   `[1, body_output, start, stride, part_size, end, axis]`.

use smallvec::SmallVec;

use crate::context::{IrContext, NodeDataBuilder};
use crate::ir::Symbol;
use crate::ops::{expect_op, required_attr, ConversionError, GraphOp};
use crate::refs::{GraphRef, NodeRef, ValueRef};
use crate::symbols;
use crate::types::Attribute;

symbols! {
    DIALECT_NAME => "flow",
    LOOP => "loop",
    SPECIAL_PORTS => "special_ports",
    BODY_PARAMS => "body_params",
    MERGED_INPUTS => "merged_inputs",
    OUTPUTS => "outputs",
}

/// Ports of the body graph with fixed semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpecialBodyPorts {
    /// Body parameter receiving the zero-based iteration number, if any.
    pub current_iteration_param: Option<u32>,
    /// Body output read as the continue-condition after each iteration.
    pub condition_output: u32,
}

/// A loop-carried value: operand feeding the first iteration, body
/// parameter receiving it, body output feeding the next iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergedInput {
    pub operand: u32,
    pub body_param: u32,
    pub body_output: u32,
}

/// How a loop result is produced from body outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopOutput {
    /// The value of a body output at one iteration. Iteration `-1` means
    /// the last executed iteration.
    IterValue { body_output: u32, iteration: i64 },
    /// Slices of a body output from every iteration, concatenated along
    /// `axis`. `end == -1` means through the last iteration.
    ConcatSlices {
        body_output: u32,
        start: i64,
        stride: i64,
        part_size: i64,
        end: i64,
        axis: i64,
    },
}

impl LoopOutput {
    fn encode(&self) -> Attribute {
        match *self {
            Self::IterValue {
                body_output,
                iteration,
            } => Attribute::ints([0, body_output as i64, iteration]),
            Self::ConcatSlices {
                body_output,
                start,
                stride,
                part_size,
                end,
                axis,
            } => Attribute::ints([1, body_output as i64, start, stride, part_size, end, axis]),
        }
    }

    fn decode(attr: &Attribute) -> Result<Self, ConversionError> {
        let ints = attr
            .as_ints()
            .ok_or(ConversionError::WrongAttributeType("outputs"))?;
        match ints {
            [0, body_output, iteration] => Ok(Self::IterValue {
                body_output: *body_output as u32,
                iteration: *iteration,
            }),
            [1, body_output, start, stride, part_size, end, axis] => Ok(Self::ConcatSlices {
                body_output: *body_output as u32,
                start: *start,
                stride: *stride,
                part_size: *part_size,
                end: *end,
                axis: *axis,
            }),
            _ => Err(ConversionError::WrongAttributeType("outputs")),
        }
    }
}

// ============================================================================
// flow.loop
// ============================================================================

/// A strict structured loop.
///
/// Operand 0 is the trip count, operand 1 the initial condition, operands
/// `2..` the initial values of the loop-carried inputs. The single subgraph
/// is the loop body.
#[derive(Clone, Copy, Debug)]
pub struct Loop(NodeRef);

impl GraphOp for Loop {
    const DIALECT_NAME: &'static str = "flow";
    const OP_NAME: &'static str = "loop";

    fn from_node(ctx: &IrContext, node: NodeRef) -> Result<Self, ConversionError> {
        expect_op::<Self>(ctx, node)?;
        required_attr(ctx, node, SPECIAL_PORTS(), "special_ports")?;
        required_attr(ctx, node, MERGED_INPUTS(), "merged_inputs")?;
        required_attr(ctx, node, OUTPUTS(), "outputs")?;
        Ok(Self(node))
    }

    fn node_ref(&self) -> NodeRef {
        self.0
    }
}

impl Loop {
    pub fn trip_count(&self, ctx: &IrContext) -> ValueRef {
        ctx.node_operands(self.0)[0]
    }

    pub fn exec_condition(&self, ctx: &IrContext) -> ValueRef {
        ctx.node_operands(self.0)[1]
    }

    pub fn body(&self, ctx: &IrContext) -> GraphRef {
        ctx.node(self.0).subgraphs[0]
    }

    pub fn special_body_ports(&self, ctx: &IrContext) -> SpecialBodyPorts {
        let ints = ctx.node(self.0).attributes[&SPECIAL_PORTS()]
            .as_ints()
            .unwrap_or_default();
        SpecialBodyPorts {
            current_iteration_param: match ints.first() {
                Some(&i) if i >= 0 => Some(i as u32),
                _ => None,
            },
            condition_output: ints.get(1).copied().unwrap_or(0) as u32,
        }
    }

    /// Indices of body parameters fed each iteration, in body order.
    pub fn body_params(&self, ctx: &IrContext) -> SmallVec<[u32; 4]> {
        ctx.node(self.0)
            .attributes
            .get(&BODY_PARAMS())
            .and_then(Attribute::as_ints)
            .map(|ints| ints.iter().map(|&i| i as u32).collect())
            .unwrap_or_default()
    }

    pub fn merged_inputs(&self, ctx: &IrContext) -> SmallVec<[MergedInput; 4]> {
        let Some(list) = ctx.node(self.0).attributes[&MERGED_INPUTS()].as_list() else {
            return SmallVec::new();
        };
        list.iter()
            .filter_map(Attribute::as_ints)
            .filter_map(|ints| match ints {
                [operand, body_param, body_output] => Some(MergedInput {
                    operand: *operand as u32,
                    body_param: *body_param as u32,
                    body_output: *body_output as u32,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn outputs(&self, ctx: &IrContext) -> SmallVec<[LoopOutput; 4]> {
        let Some(list) = ctx.node(self.0).attributes[&OUTPUTS()].as_list() else {
            return SmallVec::new();
        };
        list.iter()
            .filter_map(|a| LoopOutput::decode(a).ok())
            .collect()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for `flow.loop` nodes.
///
/// Result types are derived from the output descriptors: an iteration
/// value has the type of its body output, concatenated slices have a
/// dynamic shape over the same element type.
pub struct LoopBuilder {
    trip_count: ValueRef,
    exec_condition: ValueRef,
    carried_operands: Vec<ValueRef>,
    body: Option<GraphRef>,
    body_params: Vec<u32>,
    special_ports: SpecialBodyPorts,
    merged_inputs: Vec<MergedInput>,
    outputs: Vec<LoopOutput>,
    origin: Option<Symbol>,
}

impl LoopBuilder {
    pub fn new(trip_count: ValueRef, exec_condition: ValueRef) -> Self {
        Self {
            trip_count,
            exec_condition,
            carried_operands: Vec::new(),
            body: None,
            body_params: Vec::new(),
            special_ports: SpecialBodyPorts {
                current_iteration_param: None,
                condition_output: 0,
            },
            merged_inputs: Vec::new(),
            outputs: Vec::new(),
            origin: None,
        }
    }

    pub fn special_body_ports(mut self, ports: SpecialBodyPorts) -> Self {
        self.special_ports = ports;
        self
    }

    /// Attach the body graph and declare which of its parameters are fed
    /// each iteration.
    pub fn body(mut self, graph: GraphRef, params: impl IntoIterator<Item = u32>) -> Self {
        self.body = Some(graph);
        self.body_params = params.into_iter().collect();
        self
    }

    pub fn origin(mut self, origin: Symbol) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Bind a loop-carried value: `init` feeds `body_param` on the first
    /// iteration, `body_output` feeds it on each subsequent one.
    pub fn merged_input(&mut self, init: ValueRef, body_param: u32, body_output: u32) {
        let operand = 2 + self.carried_operands.len() as u32;
        self.carried_operands.push(init);
        self.merged_inputs.push(MergedInput {
            operand,
            body_param,
            body_output,
        });
    }

    /// Declare a result carrying the value of `body_output` at `iteration`.
    /// Returns the result index.
    pub fn iter_value(&mut self, body_output: u32, iteration: i64) -> usize {
        self.outputs.push(LoopOutput::IterValue {
            body_output,
            iteration,
        });
        self.outputs.len() - 1
    }

    /// Declare a result concatenating per-iteration slices of `body_output`
    /// along `axis`. Returns the result index.
    #[allow(clippy::too_many_arguments)]
    pub fn concatenated_slices(
        &mut self,
        body_output: u32,
        start: i64,
        stride: i64,
        part_size: i64,
        end: i64,
        axis: i64,
    ) -> usize {
        self.outputs.push(LoopOutput::ConcatSlices {
            body_output,
            start,
            stride,
            part_size,
            end,
            axis,
        });
        self.outputs.len() - 1
    }

    /// Create the node.
    ///
    /// # Panics
    ///
    /// Panics if no body graph was attached, or if an output descriptor
    /// names a body output that does not exist.
    pub fn build(self, ctx: &mut IrContext) -> Loop {
        let body = self.body.expect("LoopBuilder::build: body graph not set");

        let body_outputs: Vec<ValueRef> = ctx.graph_outputs(body).to_vec();
        let result_types: Vec<_> = self
            .outputs
            .iter()
            .map(|out| match *out {
                LoopOutput::IterValue { body_output, .. } => {
                    ctx.value_ty(body_outputs[body_output as usize])
                }
                LoopOutput::ConcatSlices { body_output, .. } => {
                    let elem = ctx
                        .types
                        .get(ctx.value_ty(body_outputs[body_output as usize]))
                        .element;
                    ctx.types.dynamic(elem)
                }
            })
            .collect();

        let special = Attribute::ints([
            self.special_ports
                .current_iteration_param
                .map_or(-1, |i| i as i64),
            self.special_ports.condition_output as i64,
        ]);
        let merged = Attribute::List(
            self.merged_inputs
                .iter()
                .map(|m| {
                    Attribute::ints([m.operand as i64, m.body_param as i64, m.body_output as i64])
                })
                .collect(),
        );
        let outputs = Attribute::List(self.outputs.iter().map(LoopOutput::encode).collect());

        let mut builder = NodeDataBuilder::new(DIALECT_NAME(), LOOP())
            .operand(self.trip_count)
            .operand(self.exec_condition)
            .operands(self.carried_operands)
            .results(result_types)
            .subgraph(body)
            .attr(SPECIAL_PORTS(), special)
            .attr(
                BODY_PARAMS(),
                Attribute::ints(self.body_params.iter().map(|&i| i as i64)),
            )
            .attr(MERGED_INPUTS(), merged)
            .attr(OUTPUTS(), outputs);
        if let Some(origin) = self.origin {
            builder = builder.origin(origin);
        }
        let data = builder.build(ctx);
        Loop(ctx.create_node(data))
    }
}

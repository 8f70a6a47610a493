//! Lowering of the permissive source loop operation to `flow.loop`.
//!
//! The source construct allows the trip count and the termination condition
//! to be omitted independently, and the condition to be a runtime value. The
//! target `flow.loop` expects both inputs to be present and typed. This pass
//! reconciles the two:
//!
//! 1. Missing trip count becomes the unbounded sentinel `-1`; a missing or
//!    constant-`true` condition becomes a fresh constant `true`.
//! 2. A constant-`false` condition means zero iterations: the result is the
//!    initial carried values repeated, and no loop node is built.
//! 3. The body signature is checked before any parameter or output of the
//!    body is indexed.
//! 4. Scalar scan outputs are promoted to rank 1 so they can be concatenated
//!    across iterations.
//! 5. A condition output matching a known always-true idiom is replaced by a
//!    constant `true` to sharpen downstream shape inference.
//! 6. The `flow.loop` node is assembled with merged inputs for the carried
//!    values, last-iteration outputs for the finals, and concatenated-slice
//!    outputs for the scans.

use tracing::{debug, warn};

use crate::context::IrContext;
use crate::diagnostic::Diagnostics;
use crate::dialect::{arith, flow, tensor};
use crate::errors::LowerError;
use crate::ir::Symbol;
use crate::ops::GraphOp;
use crate::refs::{GraphRef, ValueDef, ValueRef};

/// A source loop awaiting lowering.
///
/// Omitted optional inputs are `None` rather than sentinel nodes. The body
/// graph's parameters are `[iteration, condition, carried...]` and its
/// outputs are `[condition, carried..., scans...]`.
pub struct LoopOp {
    /// Name of the source-model node, carried into errors and diagnostics.
    pub origin: Symbol,
    pub trip_count: Option<ValueRef>,
    pub termination_cond: Option<ValueRef>,
    pub carried: Vec<ValueRef>,
    pub body: GraphRef,
}

/// Lower `op` into `target`, returning the loop results in final-values-
/// then-scan-outputs order.
///
/// When the condition is constantly `false`, no loop node is created and
/// the result is the initial carried values twice (finals, then degenerate
/// scans), `2k` values total. Otherwise the result has `k + m` values for
/// `k` carried dependencies and `m` scan outputs.
pub fn lower_loop(
    ctx: &mut IrContext,
    target: GraphRef,
    op: &LoopOp,
    diags: &mut Diagnostics,
) -> Result<Vec<ValueRef>, LowerError> {
    let trip_count = resolve_trip_count(ctx, target, op);
    let exec_cond = match resolve_termination_cond(ctx, target, op) {
        ResolvedCond::ZeroIterations => {
            debug!(origin = %op.origin, "condition is constant false, skipping loop construction");
            return Ok(zero_iteration_outputs(op));
        }
        ResolvedCond::Run(cond) => cond,
    };

    validate_body_signature(ctx, op)?;
    normalize_scan_outputs(ctx, op);
    fold_always_true_condition(ctx, op, diags);

    Ok(build_loop(ctx, target, op, trip_count, exec_cond))
}

// ============================================================================
// Optional-input resolution
// ============================================================================

fn resolve_trip_count(ctx: &mut IrContext, target: GraphRef, op: &LoopOp) -> ValueRef {
    match op.trip_count {
        Some(v) => v,
        None => {
            debug!(origin = %op.origin, "trip count omitted, using unbounded sentinel");
            let c = arith::i64_const(ctx, -1);
            ctx.push_node(target, c.node_ref());
            c.result(ctx)
        }
    }
}

enum ResolvedCond {
    /// Enter the loop with the given condition value.
    Run(ValueRef),
    /// The condition is constantly false; the loop body never executes.
    ZeroIterations,
}

fn resolve_termination_cond(ctx: &mut IrContext, target: GraphRef, op: &LoopOp) -> ResolvedCond {
    match op.termination_cond {
        Some(cond) => match constant_bool_value(ctx, cond) {
            Some(false) => return ResolvedCond::ZeroIterations,
            Some(true) => {}
            None => {
                // The target engine cannot express a runtime condition that
                // is false on entry; it is approximated as true here. A loop
                // whose condition computes to false at runtime before the
                // first iteration will still run once.
                debug!(
                    origin = %op.origin,
                    "termination condition is not statically known, approximating as true",
                );
            }
        },
        None => {
            debug!(origin = %op.origin, "termination condition omitted, defaulting to true");
        }
    }
    let c = arith::bool_const(ctx, true);
    ctx.push_node(target, c.node_ref());
    ResolvedCond::Run(c.result(ctx))
}

/// The boolean payload of `value`, if it is defined by a boolean constant.
fn constant_bool_value(ctx: &IrContext, value: ValueRef) -> Option<bool> {
    let ValueDef::NodeResult(node, 0) = ctx.value_def(value) else {
        return None;
    };
    arith::Const::from_node(ctx, node).ok()?.as_bool(ctx)
}

// ============================================================================
// Zero-iteration fast path
// ============================================================================

/// Finals and degenerate scans for a loop whose body never runs: the
/// initial carried values, twice. The body graph is not touched.
fn zero_iteration_outputs(op: &LoopOp) -> Vec<ValueRef> {
    let mut outputs = Vec::with_capacity(op.carried.len() * 2);
    outputs.extend_from_slice(&op.carried);
    outputs.extend_from_slice(&op.carried);
    outputs
}

// ============================================================================
// Body signature validation
// ============================================================================

/// Check the body's arity against the carried-dependency count. Must run
/// before anything indexes into the body's parameters or outputs.
fn validate_body_signature(ctx: &IrContext, op: &LoopOp) -> Result<(), LowerError> {
    let k = op.carried.len();
    let params = ctx.graph_params(op.body).len();
    if params < k + 2 {
        return Err(LowerError::BodyParamArity {
            origin: op.origin,
            actual: params,
            required: k + 2,
        });
    }
    let outputs = ctx.graph_outputs(op.body).len();
    if outputs < k + 1 {
        return Err(LowerError::BodyOutputArity {
            origin: op.origin,
            actual: outputs,
            required: k + 1,
        });
    }
    Ok(())
}

// ============================================================================
// Scan-output rank normalization
// ============================================================================

/// Promote rank-0 scan outputs to rank 1 by inserting a leading axis, so
/// the per-iteration values have an axis to concatenate along. Outputs of
/// unknown or non-scalar shape are left alone.
fn normalize_scan_outputs(ctx: &mut IrContext, op: &LoopOp) {
    let k = op.carried.len();
    let outputs: Vec<ValueRef> = ctx.graph_outputs(op.body).to_vec();
    for (index, &out) in outputs.iter().enumerate().skip(k + 1) {
        if !ctx.types.get(ctx.value_ty(out)).shape.is_scalar() {
            continue;
        }
        debug!(origin = %op.origin, output = index, "promoting scalar scan output to rank 1");
        let promoted = tensor::unsqueeze(ctx, out, 0);
        ctx.push_node(op.body, promoted.node_ref());
        let promoted = promoted.result(ctx);
        ctx.set_graph_output(op.body, index, promoted);
    }
}

// ============================================================================
// Condition pattern analysis
// ============================================================================

/// A structural rule that proves a condition value is always true.
struct ConditionRule {
    name: &'static str,
    matches: fn(&IrContext, ValueRef) -> bool,
}

/// Recognized always-true condition idioms. Currently a single rule: a
/// logical OR whose second operand is a constant `false` passes its first
/// operand through unchanged, and the resolver has already pinned that
/// operand to `true` on entry.
static CONDITION_RULES: &[ConditionRule] = &[ConditionRule {
    name: "or-false-identity",
    matches: |ctx, value| {
        let ValueDef::NodeResult(node, 0) = ctx.value_def(value) else {
            return false;
        };
        let Ok(or) = arith::Or::from_node(ctx, node) else {
            return false;
        };
        constant_bool_value(ctx, or.rhs(ctx)) == Some(false)
    },
}];

/// Replace the body's condition output with a constant `true` when a rule
/// proves it; otherwise record a diagnostic and keep the runtime value.
/// Purely a shape-inference aid, never a semantic change.
fn fold_always_true_condition(ctx: &mut IrContext, op: &LoopOp, diags: &mut Diagnostics) {
    let cond_out = ctx.graph_outputs(op.body)[0];
    let matched = CONDITION_RULES
        .iter()
        .find(|rule| (rule.matches)(ctx, cond_out));

    match matched {
        Some(rule) => {
            debug!(origin = %op.origin, rule = rule.name, "condition output folded to constant true");
            let c = arith::bool_const(ctx, true);
            ctx.push_node(op.body, c.node_ref());
            let folded = c.result(ctx);
            ctx.set_graph_output(op.body, 0, folded);
        }
        None => {
            warn!(origin = %op.origin, "condition output does not match a known always-true idiom");
            diags.warn(
                Some(op.origin),
                "termination condition is not provably constant; loop output shapes \
                 may stay dynamic",
            );
        }
    }
}

// ============================================================================
// Loop construction
// ============================================================================

/// Assemble the `flow.loop` node. Returns its results, `k` finals followed
/// by `m` scans.
fn build_loop(
    ctx: &mut IrContext,
    target: GraphRef,
    op: &LoopOp,
    trip_count: ValueRef,
    exec_cond: ValueRef,
) -> Vec<ValueRef> {
    let k = op.carried.len() as u32;
    let param_count = ctx.graph_params(op.body).len() as u32;
    let output_count = ctx.graph_outputs(op.body).len() as u32;

    // Per-iteration body parameters: the iteration counter, then the
    // carried slots. The condition slot (parameter 1) is driven by the
    // special-port binding, not fed positionally.
    let body_params = std::iter::once(0).chain(2..param_count);

    let mut builder = flow::LoopBuilder::new(trip_count, exec_cond)
        .special_body_ports(flow::SpecialBodyPorts {
            current_iteration_param: Some(0),
            condition_output: 0,
        })
        .body(op.body, body_params)
        .origin(op.origin);

    for (i, &init) in op.carried.iter().enumerate() {
        let i = i as u32;
        builder.merged_input(init, 2 + i, 1 + i);
    }

    // Finals first, scans second. Downstream consumers index into this
    // ordering, so it must not change.
    for i in 0..k {
        builder.iter_value(1 + i, -1);
    }
    for scan in (k + 1)..output_count {
        builder.concatenated_slices(scan, 0, 1, 1, -1, 0);
    }

    let looped = builder.build(ctx);
    ctx.push_node(target, looped.node_ref());
    debug!(
        origin = %op.origin,
        carried = k,
        scans = output_count - k - 1,
        "built flow.loop node",
    );
    ctx.node_results(looped.node_ref()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GraphData, GraphParamData, NodeDataBuilder};
    use crate::dialect::flow::{LoopOutput, MergedInput, SpecialBodyPorts};
    use crate::refs::NodeRef;
    use crate::types::{Attribute, ElementType, Shape};

    struct Fixture {
        ctx: IrContext,
        target: GraphRef,
    }

    impl Fixture {
        fn new() -> Self {
            let mut ctx = IrContext::new();
            let target = ctx.create_graph(GraphData::with_params(vec![]));
            Self { ctx, target }
        }

        fn i64_init(&mut self, value: i64) -> ValueRef {
            let c = arith::i64_const(&mut self.ctx, value);
            self.ctx.push_node(self.target, c.node_ref());
            c.result(&self.ctx)
        }

        fn bool_input(&mut self, value: bool) -> ValueRef {
            let c = arith::bool_const(&mut self.ctx, value);
            self.ctx.push_node(self.target, c.node_ref());
            c.result(&self.ctx)
        }

        /// A value that is not a compile-time constant.
        fn runtime_bool(&mut self) -> ValueRef {
            let ty = self.ctx.types.tensor(ElementType::Boolean, [1]);
            let a = self.bool_input(true);
            let b = self.bool_input(true);
            let o = arith::or(&mut self.ctx, a, b, ty);
            self.ctx.push_node(self.target, o.node_ref());
            o.result(&self.ctx)
        }

        /// A body computing a running sum: params `[iter, cond, sum]`,
        /// outputs `[cond, sum + iter]`. The condition output is the
        /// or-false identity over the condition parameter.
        fn running_sum_body(&mut self) -> GraphRef {
            let ctx = &mut self.ctx;
            let i64_ty = ctx.types.tensor(ElementType::I64, [1]);
            let bool_ty = ctx.types.tensor(ElementType::Boolean, [1]);

            let body = ctx.create_graph(GraphData::with_params(vec![
                GraphParamData { ty: i64_ty, name: Some(Symbol::new("iter")) },
                GraphParamData { ty: bool_ty, name: Some(Symbol::new("cond")) },
                GraphParamData { ty: i64_ty, name: Some(Symbol::new("sum")) },
            ]));
            let iter = ctx.graph_param(body, 0);
            let cond = ctx.graph_param(body, 1);
            let sum = ctx.graph_param(body, 2);

            let fals = arith::bool_const(ctx, false);
            ctx.push_node(body, fals.node_ref());
            let fals = fals.result(ctx);
            let cond_out = arith::or(ctx, cond, fals, bool_ty);
            ctx.push_node(body, cond_out.node_ref());
            let cond_out = cond_out.result(ctx);

            let next = arith::add(ctx, sum, iter, i64_ty);
            ctx.push_node(body, next.node_ref());
            let next = next.result(ctx);

            ctx.set_graph_outputs(body, [cond_out, next]);
            body
        }

        fn loop_nodes(&self) -> Vec<NodeRef> {
            self.ctx
                .all_nodes()
                .filter(|&n| flow::Loop::matches(&self.ctx, n))
                .collect()
        }
    }

    #[test]
    fn omitted_trip_count_becomes_unbounded_sentinel() {
        let mut fx = Fixture::new();
        let body = fx.running_sum_body();
        let init = fx.i64_init(0);
        let op = LoopOp {
            origin: Symbol::new("loop_a"),
            trip_count: None,
            termination_cond: None,
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        let outputs = lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();
        assert_eq!(outputs.len(), 1);

        let loops = fx.loop_nodes();
        assert_eq!(loops.len(), 1);
        let looped = flow::Loop::from_node(&fx.ctx, loops[0]).unwrap();
        let trip = looped.trip_count(&fx.ctx);
        let ValueDef::NodeResult(trip_node, 0) = fx.ctx.value_def(trip) else {
            panic!("trip count must come from a node result");
        };
        let trip_const = arith::Const::from_node(&fx.ctx, trip_node).unwrap();
        assert_eq!(trip_const.value(&fx.ctx), &Attribute::Int(-1));
    }

    #[test]
    fn omitted_condition_becomes_constant_true() {
        let mut fx = Fixture::new();
        let body = fx.running_sum_body();
        let init = fx.i64_init(0);
        let op = LoopOp {
            origin: Symbol::new("loop_b"),
            trip_count: None,
            termination_cond: None,
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();

        let loops = fx.loop_nodes();
        let looped = flow::Loop::from_node(&fx.ctx, loops[0]).unwrap();
        let cond = looped.exec_condition(&fx.ctx);
        assert_eq!(constant_bool_value(&fx.ctx, cond), Some(true));
    }

    #[test]
    fn constant_true_condition_collapses_to_fresh_true() {
        let mut fx = Fixture::new();
        let body = fx.running_sum_body();
        let init = fx.i64_init(0);
        let cond_in = fx.bool_input(true);
        let op = LoopOp {
            origin: Symbol::new("loop_c"),
            trip_count: None,
            termination_cond: Some(cond_in),
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();

        let loops = fx.loop_nodes();
        let looped = flow::Loop::from_node(&fx.ctx, loops[0]).unwrap();
        let cond = looped.exec_condition(&fx.ctx);
        assert_eq!(constant_bool_value(&fx.ctx, cond), Some(true));
        assert_ne!(cond, cond_in, "a fresh constant is used, not the input");
    }

    #[test]
    fn runtime_condition_is_approximated_as_true() {
        let mut fx = Fixture::new();
        let body = fx.running_sum_body();
        let init = fx.i64_init(0);
        let cond_in = fx.runtime_bool();
        let op = LoopOp {
            origin: Symbol::new("loop_d"),
            trip_count: None,
            termination_cond: Some(cond_in),
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();

        let loops = fx.loop_nodes();
        let looped = flow::Loop::from_node(&fx.ctx, loops[0]).unwrap();
        assert_eq!(
            constant_bool_value(&fx.ctx, looped.exec_condition(&fx.ctx)),
            Some(true)
        );
        // Approximation is silent; the diagnostic channel stays clean.
        assert!(diags.is_empty());
    }

    #[test]
    fn constant_false_condition_skips_loop_construction() {
        let mut fx = Fixture::new();
        let body = fx.running_sum_body();
        let init = fx.i64_init(7);
        let cond_in = fx.bool_input(false);
        let op = LoopOp {
            origin: Symbol::new("loop_e"),
            trip_count: None,
            termination_cond: Some(cond_in),
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        let outputs = lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();

        assert_eq!(outputs, vec![init, init]);
        assert!(fx.loop_nodes().is_empty(), "no loop node may be created");
    }

    #[test]
    fn constant_false_skips_body_validation() {
        let mut fx = Fixture::new();
        // A body that would fail validation: no parameters, no outputs.
        let body = fx.ctx.create_graph(GraphData::with_params(vec![]));
        let init = fx.i64_init(1);
        let cond_in = fx.bool_input(false);
        let op = LoopOp {
            origin: Symbol::new("loop_f"),
            trip_count: None,
            termination_cond: Some(cond_in),
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        let outputs = lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn body_with_too_few_params_is_rejected() {
        let mut fx = Fixture::new();
        let i64_ty = fx.ctx.types.tensor(ElementType::I64, [1]);
        let body = fx.ctx.create_graph(GraphData::with_params(vec![GraphParamData {
            ty: i64_ty,
            name: None,
        }]));
        let init = fx.i64_init(0);
        let op = LoopOp {
            origin: Symbol::new("loop_g"),
            trip_count: None,
            termination_cond: None,
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        let err = lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap_err();
        assert_eq!(
            err,
            LowerError::BodyParamArity {
                origin: Symbol::new("loop_g"),
                actual: 1,
                required: 3,
            }
        );
    }

    #[test]
    fn body_with_too_few_outputs_is_rejected() {
        let mut fx = Fixture::new();
        let ctx = &mut fx.ctx;
        let i64_ty = ctx.types.tensor(ElementType::I64, [1]);
        let bool_ty = ctx.types.tensor(ElementType::Boolean, [1]);
        let body = ctx.create_graph(GraphData::with_params(vec![
            GraphParamData { ty: i64_ty, name: None },
            GraphParamData { ty: bool_ty, name: None },
            GraphParamData { ty: i64_ty, name: None },
        ]));
        let cond = ctx.graph_param(body, 1);
        ctx.set_graph_outputs(body, [cond]);

        let init = fx.i64_init(0);
        let op = LoopOp {
            origin: Symbol::new("loop_h"),
            trip_count: None,
            termination_cond: None,
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        let err = lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap_err();
        assert_eq!(
            err,
            LowerError::BodyOutputArity {
                origin: Symbol::new("loop_h"),
                actual: 1,
                required: 2,
            }
        );
    }

    #[test]
    fn scalar_scan_output_gains_leading_axis() {
        let mut fx = Fixture::new();
        let ctx = &mut fx.ctx;
        let i64_ty = ctx.types.tensor(ElementType::I64, [1]);
        let bool_ty = ctx.types.tensor(ElementType::Boolean, [1]);
        let scalar_f32 = ctx.types.scalar(ElementType::F32);
        let vec_f32 = ctx.types.tensor(ElementType::F32, [4]);

        // k = 0: params [iter, cond], outputs [cond, scalar scan, vector scan]
        let body = ctx.create_graph(GraphData::with_params(vec![
            GraphParamData { ty: i64_ty, name: None },
            GraphParamData { ty: bool_ty, name: None },
        ]));
        let cond = ctx.graph_param(body, 1);
        let scalar_scan = arith::r#const(ctx, scalar_f32, Attribute::Int(0));
        ctx.push_node(body, scalar_scan.node_ref());
        let scalar_scan = scalar_scan.result(ctx);
        let vector_scan = arith::r#const(ctx, vec_f32, Attribute::Int(0));
        ctx.push_node(body, vector_scan.node_ref());
        let vector_scan = vector_scan.result(ctx);
        ctx.set_graph_outputs(body, [cond, scalar_scan, vector_scan]);

        let op = LoopOp {
            origin: Symbol::new("loop_i"),
            trip_count: None,
            termination_cond: None,
            carried: vec![],
            body,
        };
        let mut diags = Diagnostics::new();
        let outputs = lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();
        assert_eq!(outputs.len(), 2);

        let body_outs: Vec<ValueRef> = fx.ctx.graph_outputs(body).to_vec();
        let promoted_ty = fx.ctx.types.get(fx.ctx.value_ty(body_outs[1]));
        assert_eq!(promoted_ty.shape, Shape::fixed([1]));
        assert_eq!(promoted_ty.element, ElementType::F32);
        // Non-scalar scan is untouched
        assert_eq!(body_outs[2], vector_scan);
    }

    #[test]
    fn or_false_condition_is_folded_to_constant_true() {
        let mut fx = Fixture::new();
        let body = fx.running_sum_body();
        let init = fx.i64_init(0);
        let op = LoopOp {
            origin: Symbol::new("loop_j"),
            trip_count: None,
            termination_cond: None,
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();

        let cond_out = fx.ctx.graph_outputs(body)[0];
        assert_eq!(constant_bool_value(&fx.ctx, cond_out), Some(true));
        assert!(diags.is_empty());
    }

    #[test]
    fn unrecognized_condition_is_kept_and_diagnosed() {
        let mut fx = Fixture::new();
        let ctx = &mut fx.ctx;
        let i64_ty = ctx.types.tensor(ElementType::I64, [1]);
        let bool_ty = ctx.types.tensor(ElementType::Boolean, [1]);

        // Condition output is the condition parameter itself, not an OR.
        let body = ctx.create_graph(GraphData::with_params(vec![
            GraphParamData { ty: i64_ty, name: None },
            GraphParamData { ty: bool_ty, name: None },
            GraphParamData { ty: i64_ty, name: None },
        ]));
        let cond = ctx.graph_param(body, 1);
        let carried = ctx.graph_param(body, 2);
        ctx.set_graph_outputs(body, [cond, carried]);

        let init = fx.i64_init(0);
        let op = LoopOp {
            origin: Symbol::new("loop_k"),
            trip_count: None,
            termination_cond: None,
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();

        assert_eq!(fx.ctx.graph_outputs(body)[0], cond, "output unchanged");
        assert_eq!(diags.items().len(), 1);
        assert_eq!(diags.items()[0].origin, Some(Symbol::new("loop_k")));
    }

    #[test]
    fn malformed_or_condition_is_kept_and_diagnosed() {
        let mut fx = Fixture::new();
        let ctx = &mut fx.ctx;
        let i64_ty = ctx.types.tensor(ElementType::I64, [1]);
        let bool_ty = ctx.types.tensor(ElementType::Boolean, [1]);

        // Condition output is an or node with only one operand. The
        // identity rule must reject it instead of indexing past the end.
        let body = ctx.create_graph(GraphData::with_params(vec![
            GraphParamData { ty: i64_ty, name: None },
            GraphParamData { ty: bool_ty, name: None },
            GraphParamData { ty: i64_ty, name: None },
        ]));
        let cond = ctx.graph_param(body, 1);
        let carried = ctx.graph_param(body, 2);
        let data = NodeDataBuilder::new(Symbol::new("arith"), Symbol::new("or"))
            .operand(cond)
            .result(bool_ty)
            .build(ctx);
        let bad_or = ctx.create_node(data);
        ctx.push_node(body, bad_or);
        let cond_out = ctx.node_result(bad_or, 0);
        ctx.set_graph_outputs(body, [cond_out, carried]);

        let init = fx.i64_init(0);
        let op = LoopOp {
            origin: Symbol::new("loop_o"),
            trip_count: None,
            termination_cond: None,
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();

        assert_eq!(fx.ctx.graph_outputs(body)[0], cond_out, "output unchanged");
        assert_eq!(diags.items().len(), 1);
    }

    #[test]
    fn running_sum_builds_single_merged_loop() {
        let mut fx = Fixture::new();
        let body = fx.running_sum_body();
        let init = fx.i64_init(0);
        let op = LoopOp {
            origin: Symbol::new("loop_l"),
            trip_count: None,
            termination_cond: None,
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        let outputs = lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();
        assert_eq!(outputs.len(), 1, "one final value, zero scans");

        let loops = fx.loop_nodes();
        assert_eq!(loops.len(), 1);
        let looped = flow::Loop::from_node(&fx.ctx, loops[0]).unwrap();

        assert_eq!(
            looped.special_body_ports(&fx.ctx),
            SpecialBodyPorts {
                current_iteration_param: Some(0),
                condition_output: 0,
            }
        );
        assert_eq!(looped.body_params(&fx.ctx).as_slice(), &[0, 2]);
        assert_eq!(
            looped.merged_inputs(&fx.ctx).as_slice(),
            &[MergedInput {
                operand: 2,
                body_param: 2,
                body_output: 1,
            }]
        );
        assert_eq!(
            looped.outputs(&fx.ctx).as_slice(),
            &[LoopOutput::IterValue {
                body_output: 1,
                iteration: -1,
            }]
        );
        assert_eq!(fx.ctx.node_operands(loops[0])[2], init);
    }

    #[test]
    fn output_order_is_finals_then_scans() {
        let mut fx = Fixture::new();
        let ctx = &mut fx.ctx;
        let i64_ty = ctx.types.tensor(ElementType::I64, [1]);
        let bool_ty = ctx.types.tensor(ElementType::Boolean, [1]);

        // k = 2 carried, m = 1 scan
        let body = ctx.create_graph(GraphData::with_params(vec![
            GraphParamData { ty: i64_ty, name: None },
            GraphParamData { ty: bool_ty, name: None },
            GraphParamData { ty: i64_ty, name: None },
            GraphParamData { ty: i64_ty, name: None },
        ]));
        let cond = ctx.graph_param(body, 1);
        let a = ctx.graph_param(body, 2);
        let b = ctx.graph_param(body, 3);
        let scan = arith::i64_const(ctx, 9);
        ctx.push_node(body, scan.node_ref());
        let scan = scan.result(ctx);
        ctx.set_graph_outputs(body, [cond, a, b, scan]);

        let init_a = fx.i64_init(1);
        let init_b = fx.i64_init(2);
        let op = LoopOp {
            origin: Symbol::new("loop_m"),
            trip_count: None,
            termination_cond: None,
            carried: vec![init_a, init_b],
            body,
        };
        let mut diags = Diagnostics::new();
        let outputs = lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();
        assert_eq!(outputs.len(), 3);

        let loops = fx.loop_nodes();
        let looped = flow::Loop::from_node(&fx.ctx, loops[0]).unwrap();
        assert_eq!(
            looped.outputs(&fx.ctx).as_slice(),
            &[
                LoopOutput::IterValue { body_output: 1, iteration: -1 },
                LoopOutput::IterValue { body_output: 2, iteration: -1 },
                LoopOutput::ConcatSlices {
                    body_output: 3,
                    start: 0,
                    stride: 1,
                    part_size: 1,
                    end: -1,
                    axis: 0,
                },
            ]
        );
        // Finals keep the carried type; the scan result is dynamic.
        assert_eq!(fx.ctx.value_ty(outputs[0]), i64_ty);
        assert_eq!(fx.ctx.value_ty(outputs[1]), i64_ty);
        assert!(!fx.ctx.types.get(fx.ctx.value_ty(outputs[2])).shape.is_static());
    }

    #[test]
    fn explicit_trip_count_is_used_directly() {
        let mut fx = Fixture::new();
        let body = fx.running_sum_body();
        let init = fx.i64_init(0);
        let trip = fx.i64_init(10);
        let op = LoopOp {
            origin: Symbol::new("loop_n"),
            trip_count: Some(trip),
            termination_cond: None,
            carried: vec![init],
            body,
        };
        let mut diags = Diagnostics::new();
        lower_loop(&mut fx.ctx, fx.target, &op, &mut diags).unwrap();

        let loops = fx.loop_nodes();
        let looped = flow::Loop::from_node(&fx.ctx, loops[0]).unwrap();
        assert_eq!(looped.trip_count(&fx.ctx), trip);
    }
}

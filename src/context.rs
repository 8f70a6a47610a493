//! IrContext: arena-based mutable graph storage.
//!
//! All IR entities (nodes, values, graphs) are stored in `PrimaryMap`s owned
//! by `IrContext`. Operand and result lists use `EntityList + ListPool` for
//! compact per-field storage. Use-chains are maintained automatically, and
//! loop-carried bindings are expressed as explicit index edges rather than
//! pointer aliasing.

use std::collections::BTreeMap;

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::ir::Symbol;
use crate::refs::{GraphRef, NodeRef, TypeRef, ValueDef, ValueRef};
use crate::types::{Attribute, TypeInterner};

// ============================================================================
// Use-chain
// ============================================================================

/// A single use of a value: which node uses it, at which operand index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: NodeRef,
    pub operand_index: u32,
}

// ============================================================================
// Entity data types
// ============================================================================

/// Data for a single node in the arena.
pub struct NodeData {
    pub dialect: Symbol,
    pub name: Symbol,
    pub operands: EntityList<ValueRef>,
    pub results: EntityList<TypeRef>,
    pub attributes: BTreeMap<Symbol, Attribute>,
    pub subgraphs: SmallVec<[GraphRef; 1]>,
    /// Name of the source-model node this was lowered from, if any.
    /// Carried into errors and diagnostics.
    pub origin: Option<Symbol>,
    pub parent_graph: Option<GraphRef>,
}

/// Data for a single data value.
pub struct ValueData {
    pub def: ValueDef,
    pub ty: TypeRef,
}

/// Data for a graph parameter (type plus optional source name).
#[derive(Clone, Debug)]
pub struct GraphParamData {
    pub ty: TypeRef,
    pub name: Option<Symbol>,
}

/// Data for a graph: typed parameters, ordered node list, ordered outputs.
pub struct GraphData {
    pub params: Vec<GraphParamData>,
    pub nodes: SmallVec<[NodeRef; 8]>,
    pub outputs: SmallVec<[ValueRef; 4]>,
    pub parent_node: Option<NodeRef>,
}

impl GraphData {
    /// An empty graph with the given parameters. Nodes and outputs are
    /// filled in afterwards via `push_node` / `set_graph_outputs`.
    pub fn with_params(params: Vec<GraphParamData>) -> Self {
        Self {
            params,
            nodes: SmallVec::new(),
            outputs: SmallVec::new(),
            parent_node: None,
        }
    }
}

// ============================================================================
// IrContext
// ============================================================================

/// Arena-based mutable IR context.
///
/// Owns all IR entities and provides methods for creating, querying,
/// and mutating them. Use-chains are automatically maintained.
pub struct IrContext {
    nodes: PrimaryMap<NodeRef, NodeData>,
    values: PrimaryMap<ValueRef, ValueData>,
    graphs: PrimaryMap<GraphRef, GraphData>,

    /// Use-chain: for each value, the list of nodes that use it.
    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,

    /// Tensor type interner.
    pub types: TypeInterner,

    /// Backing pools for EntityList storage.
    value_pool: ListPool<ValueRef>,
    type_pool: ListPool<TypeRef>,

    /// Mapping from node to its result ValueRefs.
    result_values: SecondaryMap<NodeRef, EntityList<ValueRef>>,
    /// Mapping from graph to its parameter ValueRefs.
    param_values: SecondaryMap<GraphRef, EntityList<ValueRef>>,
}

impl IrContext {
    /// Create a new empty IR context.
    pub fn new() -> Self {
        Self {
            nodes: PrimaryMap::new(),
            values: PrimaryMap::new(),
            graphs: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            types: TypeInterner::new(),
            value_pool: ListPool::new(),
            type_pool: ListPool::new(),
            result_values: SecondaryMap::new(),
            param_values: SecondaryMap::new(),
        }
    }

    // ========================================================================
    // Node
    // ========================================================================

    /// Create a new node and allocate result values for it.
    ///
    /// Operands are registered in the use-chain. The node must not have a
    /// `parent_graph` set — use `push_node` to attach it to a graph after
    /// creation.
    ///
    /// # Panics
    ///
    /// Panics if `data.parent_graph` is `Some`, or if any graph in
    /// `data.subgraphs` already belongs to another node.
    pub fn create_node(&mut self, data: NodeData) -> NodeRef {
        assert!(
            data.parent_graph.is_none(),
            "create_node: node must not have parent_graph set; \
             use push_node to attach to a graph after creation",
        );

        let operand_slice: SmallVec<[ValueRef; 8]> =
            data.operands.as_slice(&self.value_pool).into();
        let result_types: SmallVec<[TypeRef; 4]> = data.results.as_slice(&self.type_pool).into();
        let subgraphs: SmallVec<[GraphRef; 1]> = data.subgraphs.clone();

        let node = self.nodes.push(data);

        // Back-link owned subgraphs to this node
        for &g in &subgraphs {
            if let Some(existing) = self.graphs[g].parent_node {
                panic!(
                    "create_node: graph {g} already belongs to node {existing}; \
                     cannot reassign to {node}",
                );
            }
            self.graphs[g].parent_node = Some(node);
        }

        // Register operand uses
        for (idx, &val) in operand_slice.iter().enumerate() {
            self.uses[val].push(Use {
                user: node,
                operand_index: idx as u32,
            });
        }

        // Allocate result values
        let mut result_value_list = EntityList::new();
        for (idx, &ty) in result_types.iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::NodeResult(node, idx as u32),
                ty,
            });
            result_value_list.push(v, &mut self.value_pool);
        }
        self.result_values[node] = result_value_list;

        node
    }

    /// Get immutable reference to node data.
    pub fn node(&self, n: NodeRef) -> &NodeData {
        &self.nodes[n]
    }

    /// Get mutable reference to node data.
    ///
    /// **Warning**: Modifying operands directly will desync the use-chain.
    /// Prefer `replace_all_uses` or re-creating the node.
    pub fn node_mut(&mut self, n: NodeRef) -> &mut NodeData {
        &mut self.nodes[n]
    }

    /// Get the operands of a node as a slice.
    pub fn node_operands(&self, n: NodeRef) -> &[ValueRef] {
        self.nodes[n].operands.as_slice(&self.value_pool)
    }

    /// Get the result types of a node as a slice.
    pub fn node_result_types(&self, n: NodeRef) -> &[TypeRef] {
        self.nodes[n].results.as_slice(&self.type_pool)
    }

    /// Get the i-th result value of a node.
    pub fn node_result(&self, n: NodeRef, index: u32) -> ValueRef {
        self.result_values[n].as_slice(&self.value_pool)[index as usize]
    }

    /// Get all result values of a node.
    pub fn node_results(&self, n: NodeRef) -> &[ValueRef] {
        self.result_values[n].as_slice(&self.value_pool)
    }

    /// Iterate over every node in the arena, in creation order.
    pub fn all_nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.nodes.keys()
    }

    // ========================================================================
    // Value
    // ========================================================================

    /// Get immutable reference to value data.
    pub fn value(&self, v: ValueRef) -> &ValueData {
        &self.values[v]
    }

    /// Get the type of a value.
    pub fn value_ty(&self, v: ValueRef) -> TypeRef {
        self.values[v].ty
    }

    /// Get the definition of a value.
    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    // ========================================================================
    // Graph
    // ========================================================================

    /// Create a new graph and allocate parameter values for it.
    pub fn create_graph(&mut self, data: GraphData) -> GraphRef {
        let param_types: Vec<TypeRef> = data.params.iter().map(|p| p.ty).collect();
        let graph = self.graphs.push(data);

        // Allocate graph parameter values
        let mut param_value_list = EntityList::new();
        for (idx, ty) in param_types.into_iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::GraphParam(graph, idx as u32),
                ty,
            });
            param_value_list.push(v, &mut self.value_pool);
        }
        self.param_values[graph] = param_value_list;

        graph
    }

    /// Get immutable reference to graph data.
    pub fn graph(&self, g: GraphRef) -> &GraphData {
        &self.graphs[g]
    }

    /// Get mutable reference to graph data.
    pub fn graph_mut(&mut self, g: GraphRef) -> &mut GraphData {
        &mut self.graphs[g]
    }

    /// Get the i-th graph parameter value.
    pub fn graph_param(&self, g: GraphRef, index: u32) -> ValueRef {
        self.param_values[g].as_slice(&self.value_pool)[index as usize]
    }

    /// Get all graph parameter values.
    pub fn graph_params(&self, g: GraphRef) -> &[ValueRef] {
        self.param_values[g].as_slice(&self.value_pool)
    }

    /// Get the graph's output values.
    pub fn graph_outputs(&self, g: GraphRef) -> &[ValueRef] {
        &self.graphs[g].outputs
    }

    /// Set the full output list of a graph.
    pub fn set_graph_outputs(&mut self, g: GraphRef, outputs: impl IntoIterator<Item = ValueRef>) {
        self.graphs[g].outputs = outputs.into_iter().collect();
    }

    /// Replace a single graph output.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set_graph_output(&mut self, g: GraphRef, index: usize, value: ValueRef) {
        self.graphs[g].outputs[index] = value;
    }

    /// Append a node to the end of a graph's node list.
    ///
    /// # Panics
    ///
    /// Panics if the node already belongs to a graph.
    pub fn push_node(&mut self, graph: GraphRef, node: NodeRef) {
        assert!(
            self.nodes[node].parent_graph.is_none(),
            "push_node: node {node} already belongs to graph {:?}; \
             remove it from the old graph first",
            self.nodes[node].parent_graph.unwrap(),
        );
        self.nodes[node].parent_graph = Some(graph);
        self.graphs[graph].nodes.push(node);
    }

    // ========================================================================
    // Use-chain
    // ========================================================================

    /// Get all uses of a value.
    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    /// Check if a value has any uses.
    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    // ========================================================================
    // RAUW (Replace All Uses With)
    // ========================================================================

    /// Replace all uses of `old` with `new` in all nodes.
    ///
    /// Updates both operand lists and the use-chain. Graph output lists are
    /// not operands and are rebound via `set_graph_output`.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        let old_uses = std::mem::take(&mut self.uses[old]);

        for u in &old_uses {
            let operands = &mut self.nodes[u.user].operands;
            let slice = operands.as_mut_slice(&mut self.value_pool);
            debug_assert_eq!(slice[u.operand_index as usize], old);
            slice[u.operand_index as usize] = new;

            self.uses[new].push(Use {
                user: u.user,
                operand_index: u.operand_index,
            });
        }
    }
}

impl Default for IrContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder for NodeData
// ============================================================================

/// Builder for constructing `NodeData` with pool-backed lists.
///
/// Collects operands and result types into `Vec`s, then packs them
/// into `EntityList`s on `build()`.
pub struct NodeDataBuilder {
    dialect: Symbol,
    name: Symbol,
    operands: Vec<ValueRef>,
    results: Vec<TypeRef>,
    attributes: BTreeMap<Symbol, Attribute>,
    subgraphs: SmallVec<[GraphRef; 1]>,
    origin: Option<Symbol>,
}

impl NodeDataBuilder {
    pub fn new(dialect: Symbol, name: Symbol) -> Self {
        Self {
            dialect,
            name,
            operands: Vec::new(),
            results: Vec::new(),
            attributes: BTreeMap::new(),
            subgraphs: SmallVec::new(),
            origin: None,
        }
    }

    pub fn operand(mut self, v: ValueRef) -> Self {
        self.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn result(mut self, ty: TypeRef) -> Self {
        self.results.push(ty);
        self
    }

    pub fn results(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.results.extend(tys);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.attributes.insert(key.into(), val);
        self
    }

    pub fn subgraph(mut self, g: GraphRef) -> Self {
        self.subgraphs.push(g);
        self
    }

    pub fn origin(mut self, origin: Symbol) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Build the `NodeData`, packing vecs into `EntityList`s using the
    /// context's pools.
    pub fn build(self, ctx: &mut IrContext) -> NodeData {
        let mut operands = EntityList::new();
        for v in self.operands {
            operands.push(v, &mut ctx.value_pool);
        }
        let mut results = EntityList::new();
        for ty in self.results {
            results.push(ty, &mut ctx.type_pool);
        }
        NodeData {
            dialect: self.dialect,
            name: self.name,
            operands,
            results,
            attributes: self.attributes,
            subgraphs: self.subgraphs,
            origin: self.origin,
            parent_graph: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElementType;

    fn i64_type(ctx: &mut IrContext) -> TypeRef {
        ctx.types.scalar(ElementType::I64)
    }

    #[test]
    fn create_node_and_read_back() {
        let mut ctx = IrContext::new();
        let i64_ty = i64_type(&mut ctx);

        let data = NodeDataBuilder::new(Symbol::new("arith"), Symbol::new("const"))
            .result(i64_ty)
            .attr("value", Attribute::Int(42))
            .build(&mut ctx);
        let node = ctx.create_node(data);

        assert_eq!(ctx.node(node).dialect, Symbol::new("arith"));
        assert_eq!(ctx.node(node).name, Symbol::new("const"));
        assert_eq!(ctx.node_result_types(node), &[i64_ty]);
        assert_eq!(
            ctx.node(node).attributes.get(&Symbol::new("value")),
            Some(&Attribute::Int(42))
        );
    }

    #[test]
    fn node_result_values() {
        let mut ctx = IrContext::new();
        let i64_ty = i64_type(&mut ctx);

        let data = NodeDataBuilder::new(Symbol::new("test"), Symbol::new("multi"))
            .result(i64_ty)
            .result(i64_ty)
            .build(&mut ctx);
        let node = ctx.create_node(data);

        let results = ctx.node_results(node);
        assert_eq!(results.len(), 2);

        let r0 = ctx.node_result(node, 0);
        let r1 = ctx.node_result(node, 1);
        assert_ne!(r0, r1);
        assert_eq!(ctx.value_ty(r0), i64_ty);
        assert_eq!(ctx.value_def(r0), ValueDef::NodeResult(node, 0));
        assert_eq!(ctx.value_def(r1), ValueDef::NodeResult(node, 1));
    }

    #[test]
    fn graph_params() {
        let mut ctx = IrContext::new();
        let i64_ty = i64_type(&mut ctx);

        let graph = ctx.create_graph(GraphData::with_params(vec![
            GraphParamData {
                ty: i64_ty,
                name: None,
            },
            GraphParamData {
                ty: i64_ty,
                name: Some(Symbol::new("sum")),
            },
        ]));

        let params = ctx.graph_params(graph);
        assert_eq!(params.len(), 2);

        let p0 = ctx.graph_param(graph, 0);
        let p1 = ctx.graph_param(graph, 1);
        assert_ne!(p0, p1);
        assert_eq!(ctx.value_ty(p0), i64_ty);
        assert_eq!(ctx.value_def(p0), ValueDef::GraphParam(graph, 0));
        assert_eq!(ctx.value_def(p1), ValueDef::GraphParam(graph, 1));
    }

    #[test]
    fn use_chain_tracking() {
        let mut ctx = IrContext::new();
        let i64_ty = i64_type(&mut ctx);

        let data1 = NodeDataBuilder::new(Symbol::new("arith"), Symbol::new("const"))
            .result(i64_ty)
            .build(&mut ctx);
        let n1 = ctx.create_node(data1);
        let v1 = ctx.node_result(n1, 0);

        assert!(!ctx.has_uses(v1));

        let data2 = NodeDataBuilder::new(Symbol::new("arith"), Symbol::new("neg"))
            .operand(v1)
            .result(i64_ty)
            .build(&mut ctx);
        let n2 = ctx.create_node(data2);

        let uses = ctx.uses(v1);
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].user, n2);
        assert_eq!(uses[0].operand_index, 0);
    }

    #[test]
    fn rauw() {
        let mut ctx = IrContext::new();
        let i64_ty = i64_type(&mut ctx);

        let mk_const = |ctx: &mut IrContext| {
            let data = NodeDataBuilder::new(Symbol::new("arith"), Symbol::new("const"))
                .result(i64_ty)
                .build(ctx);
            ctx.create_node(data)
        };

        let n1 = mk_const(&mut ctx);
        let v_old = ctx.node_result(n1, 0);
        let n2 = mk_const(&mut ctx);
        let v_new = ctx.node_result(n2, 0);

        let add = NodeDataBuilder::new(Symbol::new("arith"), Symbol::new("add"))
            .operand(v_old)
            .operand(v_old)
            .result(i64_ty)
            .build(&mut ctx);
        let n3 = ctx.create_node(add);

        assert_eq!(ctx.uses(v_old).len(), 2);
        ctx.replace_all_uses(v_old, v_new);

        assert!(!ctx.has_uses(v_old));
        assert_eq!(ctx.uses(v_new).len(), 2);
        assert_eq!(ctx.node_operands(n3), &[v_new, v_new]);
    }

    #[test]
    fn push_node_parent_tracking() {
        let mut ctx = IrContext::new();
        let i64_ty = i64_type(&mut ctx);

        let graph = ctx.create_graph(GraphData::with_params(vec![]));
        let data = NodeDataBuilder::new(Symbol::new("arith"), Symbol::new("const"))
            .result(i64_ty)
            .build(&mut ctx);
        let node = ctx.create_node(data);

        assert_eq!(ctx.node(node).parent_graph, None);
        ctx.push_node(graph, node);
        assert_eq!(ctx.node(node).parent_graph, Some(graph));
        assert_eq!(ctx.graph(graph).nodes.as_slice(), &[node]);
    }

    #[test]
    #[should_panic(expected = "already belongs to graph")]
    fn push_node_twice_panics() {
        let mut ctx = IrContext::new();
        let i64_ty = i64_type(&mut ctx);

        let g1 = ctx.create_graph(GraphData::with_params(vec![]));
        let g2 = ctx.create_graph(GraphData::with_params(vec![]));
        let data = NodeDataBuilder::new(Symbol::new("arith"), Symbol::new("const"))
            .result(i64_ty)
            .build(&mut ctx);
        let node = ctx.create_node(data);
        ctx.push_node(g1, node);
        ctx.push_node(g2, node);
    }

    #[test]
    #[should_panic(expected = "already belongs to node")]
    fn create_node_panics_when_subgraph_already_owned() {
        let mut ctx = IrContext::new();

        let graph = ctx.create_graph(GraphData::with_params(vec![]));

        let owner1 = NodeDataBuilder::new(Symbol::new("flow"), Symbol::new("loop"))
            .subgraph(graph)
            .build(&mut ctx);
        ctx.create_node(owner1);

        let owner2 = NodeDataBuilder::new(Symbol::new("flow"), Symbol::new("loop"))
            .subgraph(graph)
            .build(&mut ctx);
        ctx.create_node(owner2);
    }

    #[test]
    fn entity_ref_display() {
        use cranelift_entity::EntityRef;
        use crate::refs::{GraphRef, NodeRef, TypeRef, ValueRef};

        assert_eq!(format!("{}", NodeRef::new(0)), "n0");
        assert_eq!(format!("{}", ValueRef::new(5)), "v5");
        assert_eq!(format!("{}", GraphRef::new(2)), "g2");
        assert_eq!(format!("{}", TypeRef::new(3)), "ty3");
    }
}

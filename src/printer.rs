//! Textual form of graphs and nodes, for logs and tests.
//!
//! Values print as `v<n>`, nodes as operation lines. Attribute keys are
//! ordered by their text so output does not depend on interning order.

use std::fmt;

use crate::context::IrContext;
use crate::ir::Symbol;
use crate::refs::{GraphRef, NodeRef};
use crate::types::Attribute;

/// Render a graph, its nodes and nested bodies as text.
pub fn print_graph(ctx: &IrContext, graph: GraphRef) -> String {
    GraphPrinter { ctx, graph, indent: 0 }.to_string()
}

/// Render a single node line (plus nested bodies, if any).
pub fn print_node(ctx: &IrContext, node: NodeRef) -> String {
    let mut out = String::new();
    let mut f = Indented {
        out: &mut out,
        level: 0,
    };
    // Writing into a String cannot fail.
    let _ = f.node(ctx, node);
    out
}

struct GraphPrinter<'a> {
    ctx: &'a IrContext,
    graph: GraphRef,
    indent: usize,
}

impl fmt::Display for GraphPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        let mut w = Indented {
            out: &mut out,
            level: self.indent,
        };
        w.graph(self.ctx, self.graph)?;
        f.write_str(&out)
    }
}

struct Indented<'a> {
    out: &'a mut String,
    level: usize,
}

impl Indented<'_> {
    fn line_start(&mut self) {
        for _ in 0..self.level {
            self.out.push_str("  ");
        }
    }

    fn graph(&mut self, ctx: &IrContext, graph: GraphRef) -> fmt::Result {
        use fmt::Write;

        self.line_start();
        self.out.push_str("graph(");
        for (idx, &param) in ctx.graph_params(graph).iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            write!(self.out, "{param}: {}", ctx.types.get(ctx.value_ty(param)))?;
        }
        self.out.push_str(") {\n");

        self.level += 1;
        let nodes: Vec<NodeRef> = ctx.graph(graph).nodes.to_vec();
        for node in nodes {
            self.node(ctx, node)?;
        }
        self.level -= 1;

        self.line_start();
        self.out.push_str("} -> (");
        for (idx, &out) in ctx.graph_outputs(graph).iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            write!(self.out, "{out}")?;
        }
        self.out.push_str(")\n");
        Ok(())
    }

    fn node(&mut self, ctx: &IrContext, node: NodeRef) -> fmt::Result {
        use fmt::Write;

        let data = ctx.node(node);
        self.line_start();

        for (idx, &result) in ctx.node_results(node).iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            write!(self.out, "{result}")?;
        }
        if !ctx.node_results(node).is_empty() {
            self.out.push_str(" = ");
        }

        write!(self.out, "{}.{}", data.dialect, data.name)?;

        self.out.push('(');
        for (idx, &operand) in ctx.node_operands(node).iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            write!(self.out, "{operand}")?;
        }
        self.out.push(')');

        // Sorted by key text, not by interning order
        let mut keys: Vec<Symbol> = data.attributes.keys().copied().collect();
        keys.sort_by(|a, b| a.with_str(|sa| b.with_str(|sb| sa.cmp(sb))));
        if !keys.is_empty() {
            self.out.push_str(" {");
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    self.out.push_str(", ");
                }
                write!(self.out, "{key} = ")?;
                self.attr(ctx, &data.attributes[key])?;
            }
            self.out.push('}');
        }

        if !ctx.node_result_types(node).is_empty() {
            self.out.push_str(" : ");
            for (idx, &ty) in ctx.node_result_types(node).iter().enumerate() {
                if idx > 0 {
                    self.out.push_str(", ");
                }
                write!(self.out, "{}", ctx.types.get(ty))?;
            }
        }
        self.out.push('\n');

        let subgraphs: Vec<GraphRef> = data.subgraphs.to_vec();
        for sub in subgraphs {
            self.level += 1;
            self.graph(ctx, sub)?;
            self.level -= 1;
        }
        Ok(())
    }

    fn attr(&mut self, ctx: &IrContext, attr: &Attribute) -> fmt::Result {
        use fmt::Write;

        match attr {
            Attribute::Bool(v) => write!(self.out, "{v}"),
            Attribute::Int(v) => write!(self.out, "{v}"),
            Attribute::Ints(vs) => {
                self.out.push('[');
                for (idx, v) in vs.iter().enumerate() {
                    if idx > 0 {
                        self.out.push_str(", ");
                    }
                    write!(self.out, "{v}")?;
                }
                self.out.push(']');
                Ok(())
            }
            Attribute::Symbol(s) => write!(self.out, "\"{s}\""),
            Attribute::Type(ty) => write!(self.out, "{}", ctx.types.get(*ty)),
            Attribute::List(items) => {
                self.out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        self.out.push_str(", ");
                    }
                    self.attr(ctx, item)?;
                }
                self.out.push(']');
                Ok(())
            }
        }
    }
}

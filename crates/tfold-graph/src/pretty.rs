//! Pretty-printing for the graph IR.
//!
//! Renders graphs in a compact SSA form, one node per line:
//!
//! ```text
//! graph affine {
//!   %0 = Input "x" : f32[2,3]
//!   %1 = Constant(f32[3] [1, 2, 3]) : f32[3]
//!   %2 = Add(%0, %1) : f32[2,3]
//!   return y = %2
//! }
//! ```

use std::fmt;

use tfold_index::Idx;

use crate::graph::Graph;
use crate::{attr, AttrValue, Dim, Node, NodeId, OpKind, SparseLayout, ValueRef, ValueType};

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph {} {{", self.name())?;
        for (id, node) in self.nodes() {
            writeln!(f, "  {} = {node}", Percent(id))?;
        }
        for out in self.outputs() {
            writeln!(f, "  return {} = {}", out.name, out.value)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OpKind::Input => match self.attr(attr::NAME) {
                Some(AttrValue::Str(name)) => write!(f, "Input {name:?}")?,
                _ => write!(f, "Input")?,
            },
            OpKind::Constant => {
                match self.literal() {
                    Some(literal) => write!(f, "Constant({literal})")?,
                    None => write!(f, "Constant(?)")?,
                }
                if let Some(layout) = self.sparse_layout() {
                    write!(f, " sparse={layout}")?;
                }
            }
            kind => {
                write!(f, "{kind}(")?;
                for (i, input) in self.inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{input}")?;
                }
                write!(f, ")")?;
                let mut extra = self
                    .attrs
                    .iter()
                    .filter(|(name, _)| !matches!(name.as_str(), attr::VALUE | attr::SPARSE_LAYOUT | attr::NAME))
                    .peekable();
                if extra.peek().is_some() {
                    write!(f, " {{")?;
                    for (i, (name, value)) in extra.enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{name}={value}")?;
                    }
                    write!(f, "}}")?;
                }
            }
        }

        write!(f, " : ")?;
        for (i, ty) in self.outputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ty}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Percent(self.node))?;
        if self.output != 0 {
            write!(f, ".{}", self.output)?;
        }
        Ok(())
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.dtype)?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Static(n) => write!(f, "{n}"),
            Dim::Dynamic(var) => write!(f, "?{}", var.index()),
        }
    }
}

impl fmt::Display for SparseLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SparseLayout::Coo => "coo",
            SparseLayout::Csr => "csr",
            SparseLayout::Csc => "csc",
        })
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Ints(vs) => write!(f, "{vs:?}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Str(s) => write!(f, "{s:?}"),
            AttrValue::Tensor(literal) => write!(f, "{literal}"),
            AttrValue::Sparse(layout) => write!(f, "{layout}"),
        }
    }
}

struct Percent(NodeId);

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0.index())
    }
}

#[cfg(test)]
mod tests {
    use tfold_tensor::{DType, TensorLiteral};

    use crate::{Dim, DimVar, GraphBuilder, SparseLayout, ValueType};

    #[test]
    fn test_graph_display() {
        let mut b = GraphBuilder::new("affine");
        let x = b.input("x", ValueType::new(DType::Float32, [2, 3]));
        let c = b.constant(TensorLiteral::vector(vec![1.0f32, 2.0, 3.0]));
        let y = b.add(x, c).unwrap();
        b.output("y", y);
        let g = b.finish().unwrap();
        let expected = "graph affine {\n  \
                        %0 = Input \"x\" : f32[2,3]\n  \
                        %1 = Constant(f32[3] [1, 2, 3]) : f32[3]\n  \
                        %2 = Add(%0, %1) : f32[2,3]\n  \
                        return y = %2\n}";
        assert_eq!(g.to_string(), expected);
    }

    #[test]
    fn test_attributes_and_sparse_marker() {
        let mut b = GraphBuilder::new("t");
        let c = b.sparse_constant(TensorLiteral::vector(vec![0i32, 1]), SparseLayout::Csr);
        let t = b.transpose(c, Some(&[0])).unwrap();
        b.output("t", t);
        let g = b.finish().unwrap();
        assert_eq!(g.node(c.node).to_string(), "Constant(i32[2] [0, 1]) sparse=csr : i32[2]");
        assert_eq!(g.node(t.node).to_string(), "Transpose(%0) {perm=[0]} : i32[2]");
    }

    #[test]
    fn test_dynamic_dims() {
        let n: DimVar = tfold_index::Idx::new(3);
        let ty = ValueType::with_dims(DType::Int64, [Dim::Dynamic(n), Dim::Static(4)]);
        assert_eq!(ty.to_string(), "i64[?3,4]");
    }
}

/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Dot-graph rendering of the CFG, used by the per-pass debug dumps. The
//! renderer only reads the graph; it never influences a transformation.

use graphviz_rust::{
    attributes::NodeAttributes,
    dot_structures::{Edge, EdgeTy, Graph as DotGraph, Id, Node, NodeId, Stmt, Vertex},
    printer::{DotPrinter, PrinterContext},
};

use crate::{BlockRef, Graph};

fn block_id(block: BlockRef) -> NodeId {
    NodeId(Id::Plain(format!("\"{block:?}\"")), None)
}

impl Graph {
    ///Renders the CFG as a dot graph, one record-shaped node per block with
    /// its phis and instructions, titled with `name` (usually the pass that
    /// requested the dump).
    pub fn to_dot(&self, name: &str) -> String {
        let mut stmts = Vec::new();
        for (bref, block) in self.blocks.iter() {
            let mut label = format!("{bref:?}");
            for phi in block.phis() {
                let p = self.inst(*phi);
                label.push_str(&format!("\\n{phi:?} = phi{:?}", p.inputs()));
            }
            for inst in block.insts() {
                let i = self.inst(*inst);
                label.push_str(&format!("\\n{inst:?} = {:?}{:?}", i.op, i.inputs()));
            }
            stmts.push(Stmt::Node(Node {
                id: block_id(bref),
                attributes: vec![
                    NodeAttributes::label(format!("\"{label}\"")),
                    NodeAttributes::shape(graphviz_rust::attributes::shape::rect),
                ],
            }));
            for succ in block.succs() {
                stmts.push(Stmt::Edge(Edge {
                    ty: EdgeTy::Pair(Vertex::N(block_id(bref)), Vertex::N(block_id(*succ))),
                    attributes: vec![],
                }));
            }
        }

        let graph = DotGraph::DiGraph {
            id: Id::Plain(format!("\"{name}\"")),
            strict: false,
            stmts,
        };
        graph.print(&mut PrinterContext::default())
    }
}

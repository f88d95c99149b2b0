use std::fmt::{self, Display};
use std::ops::AddAssign;

use derivative::Derivative;
use itertools::Itertools;
use log::debug;
use num_rational::Rational64;
use petgraph::{
    graph::UnGraph,
    visit::{EdgeRef, NodeIndexable},
};
use serde::{Deserialize, Serialize};

use crate::field::FieldKind;
use crate::graph_util::{contract_graph_edge, Format};
use crate::symbol::Symbol;
use crate::topology::TopologyClass;

/// A vertex of an output diagram
///
/// After contracting out heavy lines a vertex can stand for several
/// space-time points.
#[derive(
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Deserialize,
    Serialize,
)]
pub struct DiagramVertex {
    pub points: Vec<Symbol>,
    pub external: bool,
    pub fields: Vec<FieldKind>,
}

impl AddAssign for DiagramVertex {
    fn add_assign(&mut self, rhs: Self) {
        self.points.extend(rhs.points);
        self.external |= rhs.external;
        self.fields.extend(rhs.fields);
    }
}

impl Display for DiagramVertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.points.iter().join(" "))?;
        if self.external {
            write!(f, " (external)")?;
        }
        write!(f, " [{}]", self.fields.iter().join(", "))
    }
}

/// A contraction of two fields
#[derive(Clone, Debug, Default, Derivative, Deserialize, Serialize)]
#[derivative(Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Propagator {
    pub from: FieldKind,
    pub to: FieldKind,
    #[derivative(
        PartialEq = "ignore",
        PartialOrd = "ignore",
        Ord = "ignore",
        Hash = "ignore"
    )]
    pub momentum: Symbol,
}

impl Display for Propagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>, {}", self.from, self.to, self.momentum)
    }
}

/// A fully contracted diagram
#[derive(Clone, Debug, Default)]
pub struct Diagram {
    graph: UnGraph<DiagramVertex, Propagator>,
    factor: i64,
    symmetry_factor: Rational64,
}

impl Diagram {
    pub(crate) fn new(
        graph: UnGraph<DiagramVertex, Propagator>,
        factor: i64,
        symmetry_factor: Rational64,
    ) -> Self {
        Self {
            graph,
            factor,
            symmetry_factor,
        }
    }

    pub fn graph(&self) -> &UnGraph<DiagramVertex, Propagator> {
        &self.graph
    }

    pub fn vertices(&self) -> impl Iterator<Item = &DiagramVertex> {
        self.graph.node_weights()
    }

    pub fn external_vertices(&self) -> impl Iterator<Item = &DiagramVertex> {
        self.vertices().filter(|v| v.external)
    }

    pub fn internal_vertices(&self) -> impl Iterator<Item = &DiagramVertex> {
        self.vertices().filter(|v| !v.external)
    }

    /// Propagators together with the indices of the vertices they connect
    pub fn propagators(
        &self,
    ) -> impl Iterator<Item = (usize, usize, &Propagator)> {
        self.graph.edge_references().map(|e| {
            (
                self.graph.to_index(e.source()),
                self.graph.to_index(e.target()),
                e.weight(),
            )
        })
    }

    /// Number of independent loops
    pub fn loops(&self) -> usize {
        (self.graph.edge_count() + 1).saturating_sub(self.graph.node_count())
    }

    pub fn topology(&self) -> TopologyClass {
        TopologyClass::of(&self.graph)
    }

    /// Number of Wick contractions represented by this diagram
    ///
    /// Equivalent leg assignments that were kept as separate terms in
    /// the expression are not included.
    pub fn factor(&self) -> i64 {
        self.factor
    }

    /// Inverse of the conventional symmetry factor
    ///
    /// This assumes that each vertex comes with the inverse factorials
    /// of its field multiplicities and each class of identical vertices
    /// with the inverse factorial of its size.
    pub fn symmetry_factor(&self) -> Rational64 {
        self.symmetry_factor
    }

    /// Shrink all internal propagators of the particle `name` to a point
    ///
    /// The two vertices connected by such a propagator are merged into
    /// a single vertex without the contracted fields.
    pub fn contract_out(&mut self, name: Symbol) {
        loop {
            let heavy = self
                .graph
                .edge_references()
                .find(|e| {
                    e.weight().from.name == name
                        && !self.graph[e.source()].external
                        && !self.graph[e.target()].external
                })
                .map(|e| {
                    let merged = std::cmp::min(
                        self.graph.to_index(e.source()),
                        self.graph.to_index(e.target()),
                    );
                    (e.id().index(), merged, [e.weight().from, e.weight().to])
                });
            let Some((idx, merged, contracted)) = heavy else {
                break;
            };
            let graph = std::mem::take(&mut self.graph);
            self.graph = contract_graph_edge(graph, idx);
            let merged = self.graph.from_index(merged);
            let vertex = &mut self.graph[merged];
            for kind in contracted {
                if let Some(pos) = vertex.fields.iter().position(|f| *f == kind) {
                    vertex.fields.remove(pos);
                }
            }
            debug!("Contracted {name} propagator into vertex {vertex}");
        }
    }
}

impl<'a> Format<'a> for Diagram {
    type Output = FormatDia<'a>;

    fn format(&'a self) -> Self::Output {
        FormatDia(self)
    }
}

pub struct FormatDia<'a>(&'a Diagram);

impl Display for FormatDia<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dia = self.0;
        writeln!(f, "Diagram {{\n   vertices: [")?;
        for (n, vx) in dia.vertices().enumerate() {
            writeln!(f, "      {n}: {vx},")?;
        }
        writeln!(f, "   ],\n   propagators: [")?;
        for (from, to, prop) in dia.propagators() {
            writeln!(f, "      ({from}, {to}): {prop},")?;
        }
        writeln!(f, "   ],")?;
        writeln!(
            f,
            "   factor: {}, symmetry factor: {}, loops: {}, topology: {}",
            dia.factor,
            dia.symmetry_factor,
            dia.loops(),
            dia.topology()
        )?;
        write!(f, "}}")
    }
}

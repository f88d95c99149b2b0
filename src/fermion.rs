use std::ops::Range;

use log::trace;

use crate::expr::Expr;
use crate::field::Field;
use crate::symbol::Symbol;
use crate::vertex::{Arena, NodeId};
use crate::wick::WickError;

/// Fermion fields connected alternately by propagators and vertices
///
/// Even positions are the left ends of propagators, odd positions the
/// right ends. The field at an odd position is connected to its
/// successor through a vertex.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FermionLine {
    nodes: Vec<NodeId>,
    closed: bool,
}

impl FermionLine {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Whether the line forms a loop
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum InsertionKind {
    /// Conjugation matrix at the open end of a line, transposed if
    /// `conjugated` is set
    External { conjugated: bool },
    /// Conjugation matrix between two neighbouring chain positions
    Internal,
}

/// Instruction to insert a charge conjugation matrix into a fermion chain
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Insertion {
    pub anchors: (usize, Option<usize>),
    pub kind: InsertionKind,
}

/// Conjugation state along a fermion line
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct FermionChain {
    conjugate: Vec<bool>,
    closed: bool,
}

impl FermionChain {
    pub fn new(conjugate: Vec<bool>, closed: bool) -> Self {
        Self { conjugate, closed }
    }

    pub(crate) fn from_line<F: Field>(arena: &Arena<F>, line: &FermionLine) -> Self {
        let conjugate = line
            .nodes()
            .iter()
            .map(|&n| arena.field(n).is_complex_conjugate())
            .collect();
        Self::new(conjugate, line.is_closed())
    }

    pub fn len(&self) -> usize {
        self.conjugate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conjugate.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Conjugate all fields in `range`
    ///
    /// Conjugating the same segment twice restores the chain.
    pub fn conjugate_segment(
        &mut self,
        range: Range<usize>,
    ) -> Result<(), WickError> {
        if range.start > range.end || range.end > self.len() {
            return Err(WickError::ChainIndex {
                index: range.end.max(range.start),
                len: self.len(),
            });
        }
        for c in &mut self.conjugate[range] {
            *c = !*c;
        }
        Ok(())
    }

    // fields at even positions should be conjugated, the others not
    fn mismatch(&self) -> impl Iterator<Item = bool> + '_ {
        self.conjugate
            .iter()
            .enumerate()
            .map(|(i, &c)| c != (i % 2 == 0))
    }

    /// Conjugation matrices needed to make the chain well-ordered
    ///
    /// Each maximal run of misordered fields is conjugated as a whole,
    /// so matrices only appear at the boundaries of such runs. With
    /// `rule_mode` only insertions inside the chain are kept.
    pub fn insertions(&self, rule_mode: bool) -> Vec<Insertion> {
        let mismatch = Vec::from_iter(self.mismatch());
        let len = mismatch.len();
        let mut res = Vec::new();
        if len == 0 {
            return res;
        }
        let external = |i: usize| Insertion {
            anchors: (i, None),
            kind: InsertionKind::External {
                conjugated: self.conjugate[i],
            },
        };
        if !self.closed && !rule_mode && mismatch[0] {
            res.push(external(0));
        }
        let nboundaries = if self.closed { len } else { len - 1 };
        for i in 0..nboundaries {
            let next = (i + 1) % len;
            if mismatch[i] != mismatch[next] {
                res.push(Insertion {
                    anchors: (i, Some(next)),
                    kind: InsertionKind::Internal,
                });
            }
        }
        if !self.closed && !rule_mode && len > 1 && mismatch[len - 1] {
            res.push(external(len - 1));
        }
        res
    }
}

// fermions at one vertex form bilinears in the order they appear
fn vertex_mates<F: Field>(arena: &Arena<F>) -> Vec<Option<NodeId>> {
    let mut mate = vec![None; arena.node_count()];
    for vertex in arena.vertices() {
        let fermions = Vec::from_iter(
            vertex
                .nodes()
                .iter()
                .copied()
                .filter(|&n| arena.field(n).is_fermionic()),
        );
        for pair in fermions.chunks_exact(2) {
            mate[pair[0].index()] = Some(pair[1]);
            mate[pair[1].index()] = Some(pair[0]);
        }
    }
    mate
}

/// Split the fermions of a fully contracted diagram into lines
///
/// Open lines come first. A line starts at its external end, preferring
/// conjugated fields and then the lexicographically smallest
/// particle and point names.
pub(crate) fn resolve_lines<F: Field>(
    arena: &Arena<F>,
    pairs: &[(NodeId, NodeId)],
) -> Result<Vec<FermionLine>, WickError> {
    let mut partner = vec![None; arena.node_count()];
    for &(a, b) in pairs {
        partner[a.index()] = Some(b);
        partner[b.index()] = Some(a);
    }
    let mate = vertex_mates(arena);

    let mut starts = Vec::from_iter(
        (0..arena.node_count())
            .map(NodeId)
            .filter(|&n| arena.field(n).is_fermionic()),
    );
    starts.sort_by_cached_key(|&n| {
        let f = arena.field(n);
        (
            mate[n.index()].is_some(),
            !f.is_external(),
            !f.is_complex_conjugate(),
            f.name().name(),
            f.point().name(),
            n,
        )
    });

    let mut visited = vec![false; arena.node_count()];
    let mut lines = Vec::new();
    for start in starts {
        if visited[start.index()] {
            continue;
        }
        let mut nodes = Vec::new();
        let mut current = start;
        let closed = loop {
            let Some(next) = partner[current.index()] else {
                return Err(WickError::MissingPartner(format!(
                    "{:?}",
                    arena.field(current)
                )));
            };
            visited[current.index()] = true;
            visited[next.index()] = true;
            nodes.push(current);
            nodes.push(next);
            match mate[next.index()] {
                None => break false,
                Some(m) if m == start => break true,
                Some(m) => current = m,
            }
        };
        trace!("Fermion line: {nodes:?}, closed: {closed}");
        lines.push(FermionLine { nodes, closed });
    }
    Ok(lines)
}

/// Whether conjugation matrices can occur at all
pub(crate) fn needs_resolution<F: Field>(fields: &[F]) -> bool {
    fields
        .iter()
        .any(|f| f.is_fermionic() && f.is_self_conjugate())
}

/// Conjugation matrices for all fermion lines of a fully contracted
/// diagram, as factors of its expression
pub(crate) fn conjugation_factors<F: Field>(
    arena: &Arena<F>,
    pairs: &[(NodeId, NodeId)],
    rule_mode: bool,
) -> Result<Vec<Expr>, WickError> {
    let c = Symbol::new("C");
    let ct = Symbol::new("CT");
    let mut factors = Vec::new();
    for line in resolve_lines(arena, pairs)? {
        let chain = FermionChain::from_line(arena, &line);
        let point = |i: usize| Expr::symbol(arena.field(line.nodes()[i]).point());
        for insertion in chain.insertions(rule_mode) {
            let factor = match (insertion.kind, insertion.anchors) {
                (InsertionKind::Internal, (a, Some(b))) => {
                    Expr::function(c, vec![point(a), point(b)])
                }
                (InsertionKind::External { conjugated }, (a, _)) => {
                    let name = if conjugated { ct } else { c };
                    Expr::function(name, vec![point(a)])
                }
                (InsertionKind::Internal, (a, None)) => {
                    return Err(WickError::ChainIndex {
                        index: a,
                        len: chain.len(),
                    })
                }
            };
            factors.push(factor);
        }
    }
    Ok(factors)
}

use std::fmt::{self, Display};

use ahash::RandomState;
use log::trace;

use crate::field::{Field, FieldKind};
use crate::symbol::Symbol;

type IndexMap<K, V> = indexmap::IndexMap<K, V, RandomState>;

/// Map from points to vertex ids
///
/// Internal vertices can only be degenerate if they share an id.
/// Typically the id identifies the interaction term a vertex
/// originates from.
pub type VertexIds = IndexMap<Symbol, u32>;

/// Index of a field occurrence in the original field list
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VertexId(pub(crate) usize);

impl VertexId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// All fields at one space-time point
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Vertex {
    point: Symbol,
    id: u32,
    external: bool,
    nodes: Vec<NodeId>,
}

impl Vertex {
    pub fn point(&self) -> Symbol {
        self.point
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    /// Fields in the order they appear in the original field list
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub(crate) fn contractible_nodes<'a, F: Field>(
        &'a self,
        fields: &'a [F],
        links: &'a Links,
        with: Option<&'a F>,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes.iter().copied().filter(move |&n| {
            links.is_free(n)
                && with
                    .map(|f| f.is_exactly_contractible_with(&fields[n.0]))
                    .unwrap_or(true)
        })
    }

    /// Number of free fields at this vertex that can be contracted with `field`
    pub(crate) fn degeneracy<F: Field>(
        &self,
        fields: &[F],
        links: &Links,
        field: NodeId,
    ) -> usize {
        self.contractible_nodes(fields, links, Some(&fields[field.0]))
            .filter(|&n| n != field)
            .count()
    }

    /// Whether the vertices are interchangeable
    ///
    /// This requires the same id and the same field content, where
    /// contracted fields additionally have to be contracted with the
    /// same kind of field at equivalent vertices.
    pub(crate) fn is_degenerate_with<F: Field>(
        &self,
        other: &Vertex,
        arena: &Arena<F>,
        links: &Links,
    ) -> bool {
        if self.id != other.id
            || self.external != other.external
            || self.nodes.len() != other.nodes.len()
        {
            return false;
        }
        if self.external && self.point != other.point {
            return false;
        }
        let signature = |v: &Vertex| {
            let mut sig = Vec::from_iter(
                v.nodes.iter().map(|&n| arena.signature(n, links)),
            );
            sig.sort();
            sig
        };
        signature(self) == signature(other)
    }
}

pub(crate) type LegKey = (FieldKind, Option<Symbol>);

/// Vertex a contracted field is connected to, up to degeneracy
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) enum PartnerVertex {
    External(Symbol),
    Internal(usize),
}

/// Immutable data shared by all branches of one calculation
#[derive(Clone, Debug)]
pub(crate) struct Arena<F> {
    fields: Vec<F>,
    vertex_of: Vec<VertexId>,
    vertices: Vec<Vertex>,
    // degeneracy class of each internal vertex
    class_of: Vec<Option<usize>>,
}

impl<F: Field> Arena<F> {
    pub(crate) fn new(fields: Vec<F>, ids: &VertexIds) -> Self {
        let mut by_point: IndexMap<Symbol, Vec<NodeId>> = IndexMap::default();
        for (n, field) in fields.iter().enumerate() {
            by_point.entry(field.point()).or_default().push(NodeId(n));
        }
        let mut vertex_of = vec![VertexId::default(); fields.len()];
        let mut vertices = Vec::with_capacity(by_point.len());
        for (v, (point, nodes)) in by_point.into_iter().enumerate() {
            for n in &nodes {
                vertex_of[n.0] = VertexId(v);
            }
            let external = nodes.iter().any(|n| fields[n.0].is_external());
            let id = ids.get(&point).copied().unwrap_or_default();
            vertices.push(Vertex {
                point,
                id,
                external,
                nodes,
            });
        }
        let mut arena = Self {
            fields,
            vertex_of,
            vertices,
            class_of: Vec::new(),
        };
        arena.class_of = arena.degeneracy_classes();
        trace!("Vertex degeneracy classes: {:?}", arena.class_of);
        arena
    }

    fn degeneracy_classes(&self) -> Vec<Option<usize>> {
        let links = Links::new(self.fields.len());
        let mut representatives: Vec<VertexId> = Vec::new();
        let mut classes = vec![None; self.vertices.len()];
        for (v, vertex) in self.vertices.iter().enumerate() {
            if vertex.is_external() {
                continue;
            }
            let class = representatives.iter().position(|r| {
                vertex.is_degenerate_with(&self.vertices[r.0], self, &links)
            });
            classes[v] = Some(class.unwrap_or_else(|| {
                representatives.push(VertexId(v));
                representatives.len() - 1
            }));
        }
        classes
    }

    pub(crate) fn fields(&self) -> &[F] {
        &self.fields
    }

    pub(crate) fn field(&self, n: NodeId) -> &F {
        &self.fields[n.0]
    }

    pub(crate) fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub(crate) fn vertex(&self, v: VertexId) -> &Vertex {
        &self.vertices[v.0]
    }

    pub(crate) fn vertex_of(&self, n: NodeId) -> VertexId {
        self.vertex_of[n.0]
    }

    pub(crate) fn class_of(&self, v: VertexId) -> Option<usize> {
        self.class_of[v.0]
    }

    pub(crate) fn node_count(&self) -> usize {
        self.fields.len()
    }

    fn partner_vertex(&self, n: NodeId) -> PartnerVertex {
        let v = self.vertex_of(n);
        match self.class_of(v) {
            Some(class) => PartnerVertex::Internal(class),
            None => PartnerVertex::External(self.vertex(v).point()),
        }
    }

    /// Kind and index of a field
    ///
    /// Fields at one vertex with the same key are interchangeable.
    pub(crate) fn leg_key(&self, n: NodeId) -> LegKey {
        let field = self.field(n);
        (field.kind(), field.index())
    }

    pub(crate) fn signature(
        &self,
        n: NodeId,
        links: &Links,
    ) -> (LegKey, Option<(LegKey, PartnerVertex)>) {
        let partner = links
            .partner(n)
            .map(|p| (self.leg_key(p), self.partner_vertex(p)));
        (self.leg_key(n), partner)
    }
}

/// Contractions performed so far in one branch
///
/// Every branch owns its copy. A link, once made, is never changed or
/// removed, so the linked part is identical in all descendants of the
/// branch that created it and only free fields differ between
/// branches.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub(crate) struct Links {
    partner: Vec<Option<NodeId>>,
    pairs: Vec<(NodeId, NodeId)>,
}

impl Links {
    pub(crate) fn new(nnodes: usize) -> Self {
        Self {
            partner: vec![None; nnodes],
            pairs: Vec::with_capacity(nnodes / 2),
        }
    }

    pub(crate) fn partner(&self, n: NodeId) -> Option<NodeId> {
        self.partner[n.0]
    }

    pub(crate) fn is_free(&self, n: NodeId) -> bool {
        self.partner[n.0].is_none()
    }

    pub(crate) fn link(&mut self, a: NodeId, b: NodeId) {
        debug_assert_ne!(a, b);
        debug_assert!(self.is_free(a) && self.is_free(b));
        self.partner[a.0] = Some(b);
        self.partner[b.0] = Some(a);
        self.pairs.push((a, b));
    }

    /// Contracted pairs in the order they were created
    pub(crate) fn pairs(&self) -> &[(NodeId, NodeId)] {
        &self.pairs
    }

    pub(crate) fn nfree(&self) -> usize {
        self.partner.iter().filter(|p| p.is_none()).count()
    }
}

/// A field occurrence together with its contraction state
#[derive(Copy, Clone, Debug)]
pub struct Node<'a, F> {
    pub id: NodeId,
    pub field: &'a F,
    pub vertex: VertexId,
    pub partner: Option<NodeId>,
}

impl<F> Node<'_, F> {
    pub fn is_free(&self) -> bool {
        self.partner.is_none()
    }
}

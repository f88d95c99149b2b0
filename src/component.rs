use crate::field::Field;
use crate::vertex::{Arena, Links, NodeId, VertexId};

/// The vertices linked into the diagram fragment grown so far
///
/// Vertices are only ever added, in the order in which they are
/// reached by the search.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ConnectedComponent {
    vertices: Vec<VertexId>,
}

impl ConnectedComponent {
    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn contains(&self, v: VertexId) -> bool {
        self.vertices.contains(&v)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub(crate) fn insert(&mut self, v: VertexId) {
        if !self.contains(v) {
            self.vertices.push(v)
        }
    }

    fn free_nodes<'a, F: Field>(
        &'a self,
        arena: &'a Arena<F>,
        links: &'a Links,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.vertices.iter().flat_map(move |&v| {
            arena.vertex(v).contractible_nodes(arena.fields(), links, None)
        })
    }

    /// Whether any field in the component is still uncontracted
    pub(crate) fn has_valence_left<F: Field>(
        &self,
        arena: &Arena<F>,
        links: &Links,
    ) -> bool {
        self.free_nodes(arena, links).next().is_some()
    }

    /// The field to be contracted next
    ///
    /// Fields at external vertices come first, the one with the
    /// smallest particle and point names. Otherwise, we take the first
    /// free field of the vertex that joined the component earliest.
    pub(crate) fn first_contractible_node<F: Field>(
        &self,
        arena: &Arena<F>,
        links: &Links,
    ) -> Option<NodeId> {
        let mut free = self.free_nodes(arena, links).peekable();
        let first = *free.peek()?;
        let external = free
            .filter(|&n| arena.vertex(arena.vertex_of(n)).is_external())
            .min_by_key(|&n| {
                let f = arena.field(n);
                (f.name().name(), f.point().name(), n)
            });
        Some(external.unwrap_or(first))
    }

    pub(crate) fn first_contractible_field<'a, F: Field>(
        &self,
        arena: &'a Arena<F>,
        links: &Links,
    ) -> Option<&'a F> {
        self.first_contractible_node(arena, links)
            .map(|n| arena.field(n))
    }

    /// Vertices inside the component with free fields that can be
    /// contracted with `field`, together with their degeneracy
    pub(crate) fn contractible_vertices<'a, F: Field>(
        &'a self,
        arena: &'a Arena<F>,
        links: &'a Links,
        field: NodeId,
    ) -> impl Iterator<Item = (VertexId, usize)> + 'a {
        self.vertices.iter().filter_map(move |&v| {
            let degeneracy = arena.vertex(v).degeneracy(arena.fields(), links, field);
            (degeneracy > 0).then_some((v, degeneracy))
        })
    }

    /// Contract `field` with `partner` and fold the partner's vertex
    /// into the component
    pub(crate) fn connect<F: Field>(
        &mut self,
        arena: &Arena<F>,
        links: &mut Links,
        field: NodeId,
        partner: NodeId,
    ) {
        debug_assert!(self.contains(arena.vertex_of(field)));
        links.link(field, partner);
        self.insert(arena.vertex_of(partner));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::QuantumField;
    use crate::symbols;
    use crate::vertex::VertexIds;

    #[test]
    fn grow() {
        symbols!(phi, x, y);
        let fields = vec![
            QuantumField::real_scalar(phi, y),
            QuantumField::real_scalar(phi, y),
            QuantumField::real_scalar(phi, y),
            QuantumField::real_scalar(phi, x).external(),
        ];
        let arena = Arena::new(fields, &VertexIds::default());
        let mut links = Links::new(arena.node_count());
        let vy = VertexId(0);
        let vx = VertexId(1);

        let mut component = ConnectedComponent::default();
        component.insert(vy);
        assert!(component.has_valence_left(&arena, &links));
        assert_eq!(component.first_contractible_node(&arena, &links), Some(NodeId(0)));
        assert_eq!(
            Vec::from_iter(component.contractible_vertices(&arena, &links, NodeId(0))),
            vec![(vy, 2)]
        );

        component.connect(&arena, &mut links, NodeId(0), NodeId(3));
        assert!(component.contains(vx));
        assert_eq!(component.len(), 2);
        assert_eq!(component.first_contractible_node(&arena, &links), Some(NodeId(1)));
        assert_eq!(
            component.first_contractible_field(&arena, &links),
            Some(&QuantumField::real_scalar(phi, y))
        );

        component.connect(&arena, &mut links, NodeId(1), NodeId(2));
        assert!(!component.has_valence_left(&arena, &links));
        assert_eq!(component.first_contractible_node(&arena, &links), None);
    }

    #[test]
    fn external_order() {
        symbols!(phi, psi, x1, x2, y);
        let fields = vec![
            QuantumField::dirac(psi, x1, false).external(),
            QuantumField::real_scalar(phi, x2).external(),
            QuantumField::real_scalar(phi, x2).external(),
            QuantumField::real_scalar(phi, y),
            QuantumField::dirac(psi, y, true),
            QuantumField::real_scalar(phi, y),
        ];
        let arena = Arena::new(fields, &VertexIds::default());
        let links = Links::new(arena.node_count());
        let mut component = ConnectedComponent::default();
        component.insert(VertexId(2));
        assert_eq!(component.first_contractible_node(&arena, &links), Some(NodeId(3)));

        // external fields win, ordered by particle name before point
        component.insert(VertexId(0));
        component.insert(VertexId(1));
        assert_eq!(component.first_contractible_node(&arena, &links), Some(NodeId(1)));
    }
}

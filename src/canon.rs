use log::trace;
use nauty_pet::prelude::*;
use petgraph::{graph::UnGraph, Undirected};

use crate::field::Field;
use crate::symbol::Symbol;
use crate::vertex::{Arena, LegKey, Links, NodeId};

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) enum NodeLabel {
    Internal { id: u32 },
    External { point: Option<Symbol>, incoming: bool },
    Leg(LegKey),
}

impl Default for NodeLabel {
    fn default() -> Self {
        Self::Internal { id: 0 }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) enum EdgeLabel {
    #[default]
    Leg,
    Propagator,
}

pub(crate) type CanonicalForm = CanonGraph<NodeLabel, EdgeLabel, Undirected>;

// Every vertex and every field becomes a graph node. Fields are
// connected to their vertex and to their contraction partner.
// Isomorphic diagrams have identical canonical forms.
//
// With `field_blind`, external vertices are only distinguished by
// whether they are incoming or outgoing.
pub(crate) fn into_canon<F: Field>(
    arena: &Arena<F>,
    links: &Links,
    field_blind: bool,
) -> CanonicalForm {
    let nnodes = arena.node_count();
    let mut g = UnGraph::with_capacity(
        arena.vertices().len() + nnodes,
        nnodes + links.pairs().len(),
    );
    let hubs = Vec::from_iter(arena.vertices().iter().map(|v| {
        let label = if v.is_external() {
            let incoming = v
                .nodes()
                .first()
                .map(|&n| arena.field(n).is_incoming())
                .unwrap_or(true);
            let point = (!field_blind).then_some(v.point());
            NodeLabel::External { point, incoming }
        } else {
            NodeLabel::Internal { id: v.id() }
        };
        g.add_node(label)
    }));
    let legs = Vec::from_iter((0..nnodes).map(NodeId).map(|n| {
        let leg = g.add_node(NodeLabel::Leg(arena.leg_key(n)));
        let hub = hubs[arena.vertex_of(n).index()];
        g.add_edge(hub, leg, EdgeLabel::Leg);
        leg
    }));
    for &(a, b) in links.pairs() {
        g.add_edge(legs[a.index()], legs[b.index()], EdgeLabel::Propagator);
    }
    let canon = CanonGraph::from(g);
    trace!("Canonically labelled: {canon:#?}");
    canon
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::QuantumField;
    use crate::symbols;
    use crate::vertex::VertexIds;

    fn log_init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn canon_with_pairs(
        arena: &Arena<QuantumField>,
        pairs: &[(usize, usize)],
        field_blind: bool,
    ) -> CanonicalForm {
        let mut links = Links::new(arena.node_count());
        for &(a, b) in pairs {
            links.link(NodeId(a), NodeId(b));
        }
        into_canon(arena, &links, field_blind)
    }

    #[test]
    fn channels() {
        log_init();
        symbols!(phi, x1, x2, x3, x4, y1, y2);
        let mut fields = Vec::from_iter(
            [x1, x2, x3, x4]
                .map(|x| QuantumField::real_scalar(phi, x).external()),
        );
        for y in [y1, y2] {
            fields.extend(std::iter::repeat(QuantumField::real_scalar(phi, y)).take(3));
        }
        let arena = Arena::new(fields, &VertexIds::default());

        let s = [(0, 4), (1, 5), (6, 7), (2, 8), (3, 9)];
        let s_swapped = [(0, 7), (1, 8), (9, 4), (2, 5), (3, 6)];
        let t = [(0, 4), (2, 5), (6, 7), (1, 8), (3, 9)];

        assert_eq!(
            canon_with_pairs(&arena, &s, false),
            canon_with_pairs(&arena, &s_swapped, false)
        );
        assert_ne!(
            canon_with_pairs(&arena, &s, false),
            canon_with_pairs(&arena, &t, false)
        );
        assert_eq!(
            canon_with_pairs(&arena, &s, true),
            canon_with_pairs(&arena, &t, true)
        );
    }

    #[test]
    fn indexed_legs() {
        log_init();
        symbols!(phi, x, y, a, b);
        let fields = vec![
            QuantumField::real_scalar(phi, x).external(),
            QuantumField::real_scalar(phi, y),
            QuantumField::real_scalar(phi, y).with_index(a),
            QuantumField::real_scalar(phi, y).with_index(a),
            QuantumField::real_scalar(phi, y).with_index(b),
            QuantumField::real_scalar(phi, y).with_index(b),
        ];
        let arena = Arena::new(fields, &VertexIds::default());
        let diagonal = [(0, 1), (2, 3), (4, 5)];
        let crossed = [(0, 1), (2, 4), (3, 5)];
        let crossed_again = [(0, 1), (2, 5), (3, 4)];
        assert_ne!(
            canon_with_pairs(&arena, &diagonal, false),
            canon_with_pairs(&arena, &crossed, false)
        );
        assert_eq!(
            canon_with_pairs(&arena, &crossed, false),
            canon_with_pairs(&arena, &crossed_again, false)
        );
    }
}

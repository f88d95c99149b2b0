use std::fmt::{self, Display};
use std::sync::Arc;

use ahash::AHashMap;
use log::trace;
use num_rational::Rational64;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::canon::{into_canon, CanonicalForm};
use crate::component::ConnectedComponent;
use crate::diagram::{Diagram, DiagramVertex, Propagator};
use crate::expr::Expr;
use crate::fermion::{conjugation_factors, needs_resolution};
use crate::field::Field;
use crate::sign::{fermion_sign, relabellings, LegSymmetry};
use crate::symbol::{Naming, Symbol};
use crate::topology::TopologyClass;
use crate::vertex::{Arena, LegKey, Links, Node, NodeId, VertexId, VertexIds};
use crate::wick::{Options, WickError};

/// Reason for abandoning a branch of the contraction search
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Pruned {
    /// The field to be contracted has no partner left
    NoPartner,
    /// The component was closed while other vertices are still unconnected
    Disconnected,
    /// The maximum number of loops was exceeded
    LoopOrder,
}

impl Display for Pruned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Pruned::*;
        match self {
            NoPartner => write!(f, "no contraction partner"),
            Disconnected => write!(f, "disconnected"),
            LoopOrder => write!(f, "too many loops"),
        }
    }
}

/// State of the contraction search for one candidate diagram
#[derive(Clone, Debug)]
pub struct Graph<F> {
    arena: Arc<Arena<F>>,
    links: Links,
    external_pool: Vec<VertexId>,
    internal_pool: Vec<VertexId>,
    component: ConnectedComponent,
    factor: i64,
    symmetries: Vec<LegSymmetry>,
    loops: usize,
    expression: Option<(Expr, Vec<Symbol>)>,
}

impl<F: Field> Graph<F> {
    /// Group the fields into vertices and seed the connected component
    ///
    /// The seed is the external vertex with the smallest field and
    /// point names or, in the absence of external fields, the first
    /// vertex.
    pub fn new(fields: Vec<F>, ids: &VertexIds) -> Self {
        let arena = Arena::new(fields, ids);
        let name_key = |v: &crate::vertex::Vertex| {
            v.nodes()
                .iter()
                .map(|&n| {
                    let f = arena.field(n);
                    (f.name().name(), f.point().name())
                })
                .min()
        };
        let seed = arena
            .vertices()
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_external())
            .min_by_key(|(_, v)| name_key(v))
            .map(|(n, _)| VertexId(n))
            .or_else(|| (!arena.vertices().is_empty()).then_some(VertexId(0)));

        let mut component = ConnectedComponent::default();
        let mut external_pool = Vec::new();
        let mut internal_pool = Vec::new();
        for (n, vertex) in arena.vertices().iter().enumerate() {
            let v = VertexId(n);
            if Some(v) == seed {
                component.insert(v);
            } else if vertex.is_external() {
                external_pool.push(v);
            } else {
                internal_pool.push(v);
            }
        }
        trace!("Seeding search with vertex {seed:?}");
        let links = Links::new(arena.node_count());
        Self {
            arena: Arc::new(arena),
            links,
            external_pool,
            internal_pool,
            component,
            factor: 1,
            symmetries: Vec::new(),
            loops: 0,
            expression: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.arena.node_count() == 0
    }

    pub fn fields(&self) -> &[F] {
        self.arena.fields()
    }

    pub fn node(&self, id: NodeId) -> Node<'_, F> {
        Node {
            id,
            field: self.arena.field(id),
            vertex: self.arena.vertex_of(id),
            partner: self.links.partner(id),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = Node<'_, F>> {
        (0..self.arena.node_count()).map(|n| self.node(NodeId(n)))
    }

    /// Contracted pairs in the order they were made
    pub fn pairs(&self) -> &[(NodeId, NodeId)] {
        self.links.pairs()
    }

    pub fn component(&self) -> &ConnectedComponent {
        &self.component
    }

    pub fn factor(&self) -> i64 {
        self.factor
    }

    pub fn loops(&self) -> usize {
        self.loops
    }

    /// Leg permutations to be summed over in the expression
    pub fn symmetries(&self) -> &[LegSymmetry] {
        &self.symmetries
    }

    /// Whether this can still become a connected diagram
    pub fn is_physical(&self) -> bool {
        self.is_empty()
            || self.component.has_valence_left(&self.arena, &self.links)
            || (self.external_pool.is_empty() && self.internal_pool.is_empty())
    }

    pub fn is_fully_connected(&self) -> bool {
        self.component.len() == self.arena.vertices().len()
            && !self.component.has_valence_left(&self.arena, &self.links)
    }

    /// Whether this is a complete diagram passing all filters
    pub fn is_valid(&self, options: &Options) -> bool {
        if !self.is_physical() || !self.is_fully_connected() {
            return false;
        }
        if let (true, Some(max)) = (options.discard_lower_orders, options.max_loops) {
            if self.loops != max {
                trace!("Discarding diagram with {} < {max} loops", self.loops);
                return false;
            }
        }
        if options.excludes_any() {
            let class = self.topology();
            if options.excludes(class) {
                trace!("Discarding {class} diagram");
                return false;
            }
        }
        true
    }

    pub fn topology(&self) -> TopologyClass {
        TopologyClass::of(&self.vertex_graph())
    }

    fn vertex_graph(&self) -> UnGraph<(), ()> {
        let edges = self.links.pairs().iter().map(|&(a, b)| {
            (
                self.arena.vertex_of(a).index() as u32,
                self.arena.vertex_of(b).index() as u32,
            )
        });
        let mut g = UnGraph::from_edges(edges);
        // isolated vertices only occur in incomplete graphs
        while g.node_count() < self.arena.vertices().len() {
            g.add_node(());
        }
        g
    }

    /// Contract the next field with each of its possible partners
    ///
    /// Fails if the number of contractions no longer fits the factor.
    pub fn contraction_step(
        &self,
        options: &Options,
    ) -> Result<Vec<Result<Self, Pruned>>, WickError> {
        let arena = &*self.arena;
        let Some(field) = self.component.first_contractible_node(arena, &self.links)
        else {
            let res = if self.is_fully_connected() {
                Ok(self.clone())
            } else {
                Err(Pruned::Disconnected)
            };
            return Ok(vec![res]);
        };
        trace!("Contracting {:?}", arena.field(field));
        let at_external = arena.vertex(arena.vertex_of(field)).is_external();
        let mut children = Vec::new();

        for (pos, &v) in self.external_pool.iter().enumerate() {
            for group in self.partner_groups(v, field) {
                let mut child = self.clone();
                child.external_pool.remove(pos);
                child.scale(group.len())?;
                child.component.connect(arena, &mut child.links, field, group[0]);
                children.push(child.checked(options));
            }
        }

        // equivalent vertices only contribute a multiplicity
        let mut seen_classes = Vec::new();
        for (pos, &v) in self.internal_pool.iter().enumerate() {
            let class = arena.class_of(v);
            if seen_classes.contains(&class) {
                continue;
            }
            seen_classes.push(class);
            let multiplicity = self
                .internal_pool
                .iter()
                .filter(|&&w| arena.class_of(w) == class)
                .count();
            for group in self.partner_groups(v, field) {
                let mut child = self.clone();
                child.internal_pool.remove(pos);
                child.scale(multiplicity)?;
                if at_external && group.len() > 1 && !options.symmetrize_external_legs {
                    child
                        .symmetries
                        .push(LegSymmetry::new(group[0], group[1..].to_vec()));
                } else {
                    child.scale(group.len())?;
                }
                child.component.connect(arena, &mut child.links, field, group[0]);
                children.push(child.checked(options));
            }
        }

        let in_component = Vec::from_iter(
            self.component
                .contractible_vertices(arena, &self.links, field)
                .map(|(v, _)| v),
        );
        for v in in_component {
            for group in self.partner_groups(v, field) {
                let mut child = self.clone();
                child.scale(group.len())?;
                child.loops += 1;
                child.component.connect(arena, &mut child.links, field, group[0]);
                children.push(child.checked(options));
            }
        }

        if children.is_empty() {
            children.push(Err(Pruned::NoPartner));
        }
        Ok(children)
    }

    fn scale(&mut self, n: usize) -> Result<(), WickError> {
        let scaled = i64::try_from(n)
            .ok()
            .and_then(|n| self.factor.checked_mul(n));
        match scaled {
            Some(factor) => {
                self.factor = factor;
                Ok(())
            }
            None => Err(WickError::Overflow(format!(
                "{} * {n} contractions",
                self.factor
            ))),
        }
    }

    // Free fields at `v` that can be contracted with `field`, grouped
    // into interchangeable fields
    fn partner_groups(&self, v: VertexId, field: NodeId) -> Vec<Vec<NodeId>> {
        let arena = &*self.arena;
        let mut groups: Vec<Vec<NodeId>> = Vec::new();
        let candidates = arena.vertex(v).contractible_nodes(
            arena.fields(),
            &self.links,
            Some(arena.field(field)),
        );
        for n in candidates.filter(|&n| n != field) {
            let f = arena.field(n);
            match groups
                .iter_mut()
                .find(|group| arena.field(group[0]).is_interchangeable_with(f))
            {
                Some(group) => group.push(n),
                None => groups.push(vec![n]),
            }
        }
        groups
    }

    fn checked(self, options: &Options) -> Result<Self, Pruned> {
        if options.max_loops.is_some_and(|max| self.loops > max) {
            trace!("Pruned: {}", Pruned::LoopOrder);
            return Err(Pruned::LoopOrder);
        }
        if !self.is_physical() {
            trace!("Pruned: {}", Pruned::Disconnected);
            return Err(Pruned::Disconnected);
        }
        Ok(self)
    }

    /// Key identifying isomorphic diagrams
    pub(crate) fn canonical_form(&self, field_blind: bool) -> (CanonicalForm, usize) {
        let canon = into_canon(&self.arena, &self.links, field_blind);
        (canon, self.symmetry_multiplicity())
    }

    fn symmetry_multiplicity(&self) -> usize {
        self.symmetries.iter().map(|s| s.multiplicity()).product()
    }

    /// Add the contractions of an isomorphic diagram
    pub(crate) fn absorb(&mut self, other: &Self) -> Result<(), WickError> {
        if self.loops != other.loops || self.pairs().len() != other.pairs().len() {
            return Err(WickError::Canonisation(format!(
                "{} loops, {} propagators vs. {} loops, {} propagators",
                self.loops,
                self.pairs().len(),
                other.loops,
                other.pairs().len()
            )));
        }
        self.factor = self.factor.checked_add(other.factor).ok_or_else(|| {
            WickError::Overflow(format!("{} + {}", self.factor, other.factor))
        })?;
        Ok(())
    }

    /// Inverse of the conventional symmetry factor
    pub fn symmetry_factor(&self) -> Result<Rational64, WickError> {
        let arena = &*self.arena;
        let overflow = || WickError::Overflow("symmetry factor".to_owned());
        let numerator = i64::try_from(self.symmetry_multiplicity())
            .ok()
            .and_then(|m| self.factor.checked_mul(m))
            .ok_or_else(overflow)?;
        let mut counts = Vec::new();
        let mut class_sizes: AHashMap<usize, i64> = AHashMap::new();
        for (n, vertex) in arena.vertices().iter().enumerate() {
            let Some(class) = arena.class_of(VertexId(n)) else {
                continue;
            };
            *class_sizes.entry(class).or_default() += 1;
            let mut legs: AHashMap<LegKey, i64> = AHashMap::new();
            for &node in vertex.nodes() {
                *legs.entry(arena.leg_key(node)).or_default() += 1;
            }
            counts.extend(legs.into_values());
        }
        counts.extend(class_sizes.into_values());
        let denominator = counts
            .into_iter()
            .try_fold(1i64, |acc, n| acc.checked_mul(factorial(n)?))
            .ok_or_else(overflow)?;
        Ok(Rational64::new(numerator, denominator))
    }

    /// Expression and output diagram of a complete graph
    ///
    /// The expression is computed once and cached together with the
    /// momenta assigned to the propagators.
    pub fn assemble(
        &mut self,
        naming: &mut Naming,
        expr_factor: &Expr,
        options: &Options,
    ) -> Result<(Expr, Diagram), WickError> {
        if let Some(free) = self.nodes().find(|n| n.is_free()) {
            return Err(WickError::MissingPartner(format!("{:?}", free.field)));
        }
        let (expr, momenta) = match &self.expression {
            Some(cached) => cached.clone(),
            None => {
                let momenta = Vec::from_iter(
                    self.links.pairs().iter().map(|_| naming.fresh_momentum()),
                );
                let expr = self.expression_with(&momenta, expr_factor, options)?;
                self.expression = Some((expr.clone(), momenta.clone()));
                (expr, momenta)
            }
        };
        Ok((expr, self.diagram(&momenta)?))
    }

    fn expression_with(
        &self,
        momenta: &[Symbol],
        expr_factor: &Expr,
        options: &Options,
    ) -> Result<Expr, WickError> {
        let arena = &*self.arena;
        let fields = arena.fields();
        let resolve = needs_resolution(fields);
        let mut terms = Vec::new();
        for relabelling in relabellings(&self.symmetries) {
            let pairs = Vec::from_iter(
                relabelling
                    .apply_to_pairs(self.links.pairs())
                    .into_iter()
                    .map(|pair| oriented(arena, pair)),
            );
            let mut factors = Vec::with_capacity(pairs.len() + 1);
            factors.push(Expr::num(fermion_sign(fields, &pairs)));
            for (&(a, b), &p) in pairs.iter().zip(momenta) {
                factors.push(arena.field(a).propagator(arena.field(b), p));
            }
            if resolve {
                factors.extend(conjugation_factors(arena, &pairs, options.rule_mode)?);
            }
            terms.push(Expr::product(factors));
        }
        let two_pi = Expr::num(2) * Expr::symbol(Symbol::new("pi"));
        let loops = -4 * self.loops as i32;
        Ok(Expr::sum(terms)
            * Expr::num(self.factor)
            * expr_factor.clone()
            * Expr::pow(two_pi, loops))
    }

    fn diagram(&self, momenta: &[Symbol]) -> Result<Diagram, WickError> {
        let arena = &*self.arena;
        let mut g = UnGraph::with_capacity(arena.vertices().len(), momenta.len());
        for vertex in arena.vertices() {
            g.add_node(DiagramVertex {
                points: vec![vertex.point()],
                external: vertex.is_external(),
                fields: vertex
                    .nodes()
                    .iter()
                    .map(|&n| arena.field(n).kind())
                    .collect(),
            });
        }
        for (&pair, &momentum) in self.links.pairs().iter().zip(momenta) {
            let (a, b) = oriented(arena, pair);
            let from = arena.vertex_of(a).index();
            let to = arena.vertex_of(b).index();
            g.add_edge(
                NodeIndex::new(from),
                NodeIndex::new(to),
                Propagator {
                    from: arena.field(a).kind(),
                    to: arena.field(b).kind(),
                    momentum,
                },
            );
        }
        Ok(Diagram::new(g, self.factor, self.symmetry_factor()?))
    }
}

// fermion propagators run from the field to its conjugate
fn oriented<F: Field>(arena: &Arena<F>, (a, b): (NodeId, NodeId)) -> (NodeId, NodeId) {
    let first = arena.field(a);
    if first.is_fermionic() && !first.is_self_conjugate() && first.is_complex_conjugate() {
        (b, a)
    } else {
        (a, b)
    }
}

fn factorial(n: i64) -> Option<i64> {
    (2..=n).try_fold(1i64, |acc, k| acc.checked_mul(k))
}

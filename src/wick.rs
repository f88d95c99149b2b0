use ahash::RandomState;
use indexmap::map::Entry;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canon::CanonicalForm;
use crate::diagram::Diagram;
use crate::expr::Expr;
use crate::field::Field;
use crate::graph::Graph;
use crate::symbol::Naming;
use crate::topology::TopologyClass;
use crate::vertex::VertexIds;

type IndexMap<K, V> = indexmap::IndexMap<K, V, RandomState>;

/// Settings for diagram generation
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct Options {
    pub exclude_tadpoles: bool,
    pub exclude_mass_corrections: bool,
    pub exclude_triangles: bool,
    pub exclude_boxes: bool,
    pub exclude_pentagons: bool,
    /// Count equivalent legs at vertices reached from external fields
    /// as an integer factor instead of summing over them in the
    /// expression
    pub symmetrize_external_legs: bool,
    /// Maximum number of loops
    pub max_loops: Option<usize>,
    /// Only keep diagrams with exactly `max_loops` loops
    pub discard_lower_orders: bool,
    /// Only insert conjugation matrices inside fermion chains
    pub rule_mode: bool,
    /// Identify diagrams that only differ in their external points
    pub field_blind: bool,
}

impl Options {
    pub fn excludes(&self, class: TopologyClass) -> bool {
        use TopologyClass::*;
        match class {
            Tadpole => self.exclude_tadpoles,
            MassCorrection => self.exclude_mass_corrections,
            Triangle => self.exclude_triangles,
            Box => self.exclude_boxes,
            Pentagon => self.exclude_pentagons,
            Tree | Higher(_) => false,
        }
    }

    pub fn excludes_any(&self) -> bool {
        self.exclude_tadpoles
            || self.exclude_mass_corrections
            || self.exclude_triangles
            || self.exclude_boxes
            || self.exclude_pentagons
    }
}

/// Broken invariant of the contraction algorithm
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WickError {
    #[error("Field {0} has no contraction partner")]
    MissingPartner(String),
    #[error("Index {index} out of range for fermion chain of length {len}")]
    ChainIndex { index: usize, len: usize },
    #[error("Diagrams with identical canonical form differ: {0}")]
    Canonisation(String),
    #[error("Integer overflow in {0}")]
    Overflow(String),
}

/// Generator of all connected diagrams for a correlator
#[derive(Clone, Debug)]
pub struct WickCalculator {
    options: Options,
    vertex_ids: VertexIds,
    expr_factor: Expr,
}

impl Default for WickCalculator {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl WickCalculator {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            vertex_ids: VertexIds::default(),
            expr_factor: Expr::one(),
        }
    }

    pub fn with_vertex_ids(mut self, vertex_ids: VertexIds) -> Self {
        self.vertex_ids = vertex_ids;
        self
    }

    /// Prefactor multiplying every expression
    pub fn with_factor(mut self, expr_factor: Expr) -> Self {
        self.expr_factor = expr_factor;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// All valid diagrams, with isomorphic diagrams merged
    pub fn graphs<F: Field>(
        &self,
        fields: Vec<F>,
    ) -> Result<Vec<Graph<F>>, WickError> {
        let nfields = fields.len();
        if nfields == 0 || nfields % 2 == 1 {
            info!("No contractions for {nfields} fields");
            return Ok(Vec::new());
        }
        if let Some(lonely) = fields.iter().enumerate().find(|(n, f)| {
            !fields
                .iter()
                .enumerate()
                .any(|(m, g)| m != *n && f.is_contractible_with(g))
        }) {
            info!("Vanishing correlator: no partner for {:?}", lonely.1);
            return Ok(Vec::new());
        }

        info!("Contracting {nfields} fields");
        let mut population = vec![Graph::new(fields, &self.vertex_ids)];
        for step in 0..nfields / 2 {
            let mut npruned = 0;
            let mut next = Vec::with_capacity(population.len());
            for graph in &population {
                for res in graph.contraction_step(&self.options)? {
                    match res {
                        Ok(child) => next.push(child),
                        Err(reason) => {
                            trace!("Pruned branch: {reason}");
                            npruned += 1;
                        }
                    }
                }
            }
            population = next;
            debug!(
                "Step {}: {} graphs, {npruned} pruned",
                step + 1,
                population.len()
            );
        }
        population.retain(|g| g.is_valid(&self.options));
        debug!("{} valid graphs", population.len());

        let mut classes: IndexMap<(CanonicalForm, usize), Graph<F>> =
            IndexMap::default();
        for graph in population {
            let key = graph.canonical_form(self.options.field_blind);
            match classes.entry(key) {
                Entry::Occupied(mut representative) => {
                    representative.get_mut().absorb(&graph)?
                }
                Entry::Vacant(entry) => {
                    entry.insert(graph);
                }
            }
        }
        info!("{} distinct diagrams", classes.len());
        Ok(classes.into_values().collect())
    }

    /// Expressions and diagrams for the correlator of `fields`
    ///
    /// An empty result means that the correlator vanishes.
    pub fn contract<F: Field>(
        &self,
        fields: Vec<F>,
        naming: &mut Naming,
    ) -> Result<Vec<(Expr, Diagram)>, WickError> {
        self.graphs(fields)?
            .into_iter()
            .map(|mut g| g.assemble(naming, &self.expr_factor, &self.options))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_rational::Rational64;
    use petgraph::algo::connected_components;

    use crate::field::QuantumField;
    use crate::symbol::Symbol;
    use crate::symbols;

    fn log_init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn externals(name: Symbol, points: &[Symbol]) -> Vec<QuantumField> {
        points
            .iter()
            .map(|&x| QuantumField::real_scalar(name, x).external())
            .collect()
    }

    fn cubic(name: Symbol, points: &[Symbol]) -> Vec<QuantumField> {
        points
            .iter()
            .flat_map(|&y| {
                std::iter::repeat(QuantumField::real_scalar(name, y)).take(3)
            })
            .collect()
    }

    fn contract(
        options: Options,
        fields: Vec<QuantumField>,
    ) -> Vec<(Expr, Diagram)> {
        WickCalculator::new(options)
            .contract(fields, &mut Naming::default())
            .unwrap()
    }

    fn check_laws(nfields: usize, res: &[(Expr, Diagram)]) {
        for (_, dia) in res {
            assert_eq!(2 * dia.propagators().count(), nfields);
            assert_eq!(connected_components(dia.graph()), 1);
            let nfields_at_vertices: usize =
                dia.vertices().map(|v| v.fields.len()).sum();
            assert_eq!(nfields_at_vertices, nfields);
        }
    }

    #[test]
    fn parity() {
        log_init();
        symbols!(phi, psi, x1, x2, x3, y);
        let fields = externals(phi, &[x1, x2, x3]);
        assert!(contract(Options::default(), fields).is_empty());

        let mut fields = externals(phi, &[x1, x2]);
        fields.extend(cubic(phi, &[y]));
        assert!(contract(Options::default(), fields).is_empty());

        assert!(contract(Options::default(), Vec::new()).is_empty());

        // nothing to contract the fermion with
        let fields = vec![
            QuantumField::dirac(psi, x1, false).external(),
            QuantumField::real_scalar(phi, x2).external(),
        ];
        assert!(contract(Options::default(), fields).is_empty());
    }

    #[test]
    fn free_propagator() {
        log_init();
        symbols!(psi, x1, x2);
        let fields = vec![
            QuantumField::dirac(psi, x1, false).external(),
            QuantumField::dirac(psi, x2, true).external(),
        ];
        let res = contract(Options::default(), fields);
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].0.to_string(), "prop(psi, x1, x2, p1)");
    }

    #[test]
    fn tree_channels() {
        log_init();
        symbols!(phi, x1, x2, x3, x4, y1, y2);
        let mut fields = externals(phi, &[x1, x2, x3, x4]);
        fields.extend(cubic(phi, &[y1, y2]));
        let nfields = fields.len();

        let res = contract(Options::default(), fields.clone());
        check_laws(nfields, &res);
        assert_eq!(res.len(), 3);
        for (expr, dia) in &res {
            assert_eq!(dia.loops(), 0);
            assert_eq!(dia.topology(), TopologyClass::Tree);
            assert_eq!(dia.factor(), 24);
            assert_eq!(dia.symmetry_factor(), Rational64::from(1));
            assert_eq!(dia.internal_vertices().count(), 2);
            // equivalent legs are summed over in the expression
            assert_eq!(
                expr.clone().split_coefficient().0,
                Rational64::from(72)
            );
            assert_eq!(expr.count_function(Symbol::new("prop")), 5);
        }

        let options = Options {
            symmetrize_external_legs: true,
            ..Default::default()
        };
        let res = contract(options, fields.clone());
        assert_eq!(res.len(), 3);
        for (expr, dia) in &res {
            assert_eq!(dia.factor(), 72);
            assert_eq!(dia.symmetry_factor(), Rational64::from(1));
            assert_eq!(
                expr.clone().split_coefficient().0,
                Rational64::from(72)
            );
        }

        let options = Options {
            field_blind: true,
            ..Default::default()
        };
        let res = contract(options, fields);
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].1.factor(), 72);
        assert_eq!(res[0].1.symmetry_factor(), Rational64::from(3));
    }

    #[test]
    fn identical_vertices() {
        log_init();
        symbols!(phi, x1, x2, x3, x4, y1, y2);
        let mut fields = externals(phi, &[x1, x2, x3, x4]);
        fields.extend(cubic(phi, &[y1, y2]));

        let mut ids = VertexIds::default();
        ids.insert(y1, 1);
        ids.insert(y2, 2);
        let res = WickCalculator::new(Options::default())
            .with_vertex_ids(ids)
            .contract(fields.clone(), &mut Naming::default())
            .unwrap();
        assert_eq!(res.len(), 6);
        for (_, dia) in &res {
            assert_eq!(dia.factor(), 12);
            assert_eq!(dia.symmetry_factor(), Rational64::from(1));
        }
        let distinguishable: i64 = res.iter().map(|(_, d)| d.factor()).sum();

        let res = contract(Options::default(), fields);
        let identical: i64 = res.iter().map(|(_, d)| d.factor()).sum();
        assert_eq!(identical, 72);
        assert_eq!(distinguishable, 72);
        // each class of identical diagrams has twice the factor
        assert!(res.iter().all(|(_, d)| d.factor() == 2 * 12));
    }

    #[test]
    fn yukawa_vertex() {
        log_init();
        symbols!(phi, psi, x1, x2, x3, y, p1, p2, p3);
        let fields = vec![
            QuantumField::dirac(psi, x1, false).external(),
            QuantumField::dirac(psi, x2, true).external(),
            QuantumField::real_scalar(phi, x3).external(),
            QuantumField::dirac(psi, y, true),
            QuantumField::dirac(psi, y, false),
            QuantumField::real_scalar(phi, y),
        ];
        let nfields = fields.len();
        let res = contract(Options::default(), fields.clone());
        check_laws(nfields, &res);
        assert_eq!(res.len(), 1);
        let (expr, dia) = &res[0];
        assert_eq!(dia.loops(), 0);
        assert_eq!(dia.factor(), 1);
        assert_eq!(expr.count_function(Symbol::new("C")), 0);

        // psi(x1) psi~(x2) psi~(y) psi(y) is an even reordering of
        // <psi(x1) psi~(y)> <psi(y) psi~(x2)>
        let expected = Expr::product([
            fields[2].propagator(&fields[5], p1),
            fields[0].propagator(&fields[3], p2),
            fields[4].propagator(&fields[1], p3),
        ]);
        assert_eq!(expr, &expected);

        // swapping the anticommuting external fields flips the sign
        let mut swapped = fields;
        swapped.swap(0, 1);
        let res = contract(Options::default(), swapped);
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].0, -expected);
    }

    #[test]
    fn majorana_vertex() {
        log_init();
        symbols!(chi, phi, x1, x2, x3, y);
        let fields = vec![
            QuantumField::majorana(chi, x1).external(),
            QuantumField::majorana(chi, x2).external(),
            QuantumField::real_scalar(phi, x3).external(),
            QuantumField::majorana(chi, y).conjugated(),
            QuantumField::majorana(chi, y),
            QuantumField::real_scalar(phi, y),
        ];
        let res = contract(Options::default(), fields.clone());
        assert_eq!(res.len(), 1);
        let (expr, dia) = &res[0];
        assert_eq!(dia.symmetry_factor(), Rational64::from(1));
        // two ways to attach the external fermions, with different
        // conjugation matrices
        assert_eq!(expr.terms().len(), 2);
        assert_eq!(expr.count_function(Symbol::new("C")), 4);

        let options = Options {
            rule_mode: true,
            ..Default::default()
        };
        let res = contract(options, fields);
        assert_eq!(res[0].0.count_function(Symbol::new("C")), 2);
    }

    #[test]
    fn tadpole() {
        log_init();
        symbols!(phi, x, y);
        let mut fields = externals(phi, &[x]);
        fields.extend(cubic(phi, &[y]));

        let res = contract(Options::default(), fields.clone());
        assert_eq!(res.len(), 1);
        let (expr, dia) = &res[0];
        assert_eq!(dia.loops(), 1);
        assert_eq!(dia.topology(), TopologyClass::Tadpole);
        assert_eq!(dia.symmetry_factor(), Rational64::new(1, 2));
        assert_eq!(expr.clone().split_coefficient().0, Rational64::new(3, 16));
        assert!(expr.to_string().contains("pi^(-4)"));

        let options = Options {
            exclude_tadpoles: true,
            ..Default::default()
        };
        assert!(contract(options, fields).is_empty());
    }

    #[test]
    fn self_energy() {
        log_init();
        symbols!(phi, x1, x2, y1, y2);
        let mut fields = externals(phi, &[x1, x2]);
        fields.extend(cubic(phi, &[y1, y2]));
        let nfields = fields.len();

        let res = contract(Options::default(), fields.clone());
        check_laws(nfields, &res);
        assert_eq!(res.len(), 2);
        let mut topologies = Vec::from_iter(res.iter().map(|(_, d)| d.topology()));
        topologies.sort();
        assert_eq!(topologies, [TopologyClass::Tadpole, TopologyClass::MassCorrection]);
        for (_, dia) in &res {
            assert_eq!(dia.loops(), 1);
            assert_eq!(dia.symmetry_factor(), Rational64::new(1, 2));
        }

        let options = Options {
            exclude_mass_corrections: true,
            ..Default::default()
        };
        let res = contract(options, fields.clone());
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].1.topology(), TopologyClass::Tadpole);

        let options = Options {
            exclude_tadpoles: true,
            ..Default::default()
        };
        let res = contract(options, fields.clone());
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].1.topology(), TopologyClass::MassCorrection);

        let options = Options {
            max_loops: Some(0),
            ..Default::default()
        };
        assert!(contract(options, fields.clone()).is_empty());

        let options = Options {
            max_loops: Some(1),
            discard_lower_orders: true,
            ..Default::default()
        };
        assert_eq!(contract(options, fields.clone()).len(), 2);

        let options = Options {
            max_loops: Some(2),
            discard_lower_orders: true,
            ..Default::default()
        };
        assert!(contract(options, fields).is_empty());
    }

    #[test]
    fn vacuum() {
        log_init();
        symbols!(phi, y1, y2);
        let res = contract(Options::default(), cubic(phi, &[y1, y2]));
        assert_eq!(res.len(), 2);
        for (_, dia) in &res {
            assert_eq!(dia.loops(), 2);
            let expected = match dia.topology() {
                TopologyClass::MassCorrection => Rational64::new(1, 12),
                TopologyClass::Tadpole => Rational64::new(1, 8),
                top => panic!("Unexpected topology {top}"),
            };
            assert_eq!(dia.symmetry_factor(), expected);
        }
    }

    #[test]
    fn box_exclusion() {
        log_init();
        symbols!(phi, x1, x2, x3, x4, y1, y2, y3, y4);
        let mut fields = externals(phi, &[x1, x2, x3, x4]);
        fields.extend(cubic(phi, &[y1, y2, y3, y4]));
        let nfields = fields.len();

        let all = contract(Options::default(), fields.clone());
        check_laws(nfields, &all);
        let count = |res: &[(Expr, Diagram)], class| {
            res.iter().filter(|(_, d)| d.topology() == class).count()
        };
        let nboxes = count(&all, TopologyClass::Box);
        let ntriangles = count(&all, TopologyClass::Triangle);
        assert!(nboxes > 0);
        assert!(ntriangles > 0);

        let options = Options {
            exclude_boxes: true,
            ..Default::default()
        };
        let res = contract(options, fields.clone());
        assert_eq!(res.len(), all.len() - nboxes);
        assert_eq!(count(&res, TopologyClass::Box), 0);

        let options = Options {
            exclude_triangles: true,
            exclude_boxes: true,
            ..Default::default()
        };
        let res = contract(options, fields);
        assert_eq!(res.len(), all.len() - nboxes - ntriangles);
    }

    fn neighbour(dia: &Diagram, x: Symbol) -> Option<usize> {
        let vx = dia.vertices().position(|v| v.points == [x])?;
        dia.propagators().find_map(|(a, b, _)| {
            if a == vx {
                Some(b)
            } else if b == vx {
                Some(a)
            } else {
                None
            }
        })
    }

    #[test]
    fn s_channel_exchange() {
        log_init();
        symbols!(phi, x1, x2, x3, x4, y1, y2);
        let mut fields = externals(phi, &[x1, x2, x3, x4]);
        fields.extend(cubic(phi, &[y1, y2]));

        // with identical external fields there is a single exchange
        // topology, collecting the s, t and u channels
        let options = Options {
            field_blind: true,
            ..Default::default()
        };
        let res = contract(options, fields.clone());
        assert_eq!(res.len(), 1);
        let (_, dia) = &res[0];
        assert_eq!(dia.loops(), 0);
        assert_eq!(dia.topology(), TopologyClass::Tree);
        assert_eq!(dia.symmetry_factor(), Rational64::from(3));

        let res = contract(Options::default(), fields);
        let s_channel = Vec::from_iter(
            res.iter()
                .filter(|(_, dia)| neighbour(dia, x1) == neighbour(dia, x2)),
        );
        assert_eq!(s_channel.len(), 1);
        let (_, dia) = s_channel[0];
        assert_eq!(dia.symmetry_factor(), Rational64::from(1));
        assert_eq!(neighbour(dia, x3), neighbour(dia, x4));
        assert_ne!(neighbour(dia, x1), neighbour(dia, x3));
    }

    #[test]
    fn fermion_loop() {
        log_init();
        symbols!(phi, psi, x1, x2, y1, y2);
        let mut fields = externals(phi, &[x1, x2]);
        for y in [y1, y2] {
            fields.push(QuantumField::dirac(psi, y, true));
            fields.push(QuantumField::dirac(psi, y, false));
            fields.push(QuantumField::real_scalar(phi, y));
        }
        let nfields = fields.len();
        let res = contract(Options::default(), fields);
        check_laws(nfields, &res);
        assert_eq!(res.len(), 1);
        let (expr, dia) = &res[0];
        assert_eq!(dia.loops(), 1);
        assert_eq!(dia.topology(), TopologyClass::MassCorrection);
        assert_eq!(dia.symmetry_factor(), Rational64::from(1));

        // -Tr[S(y1 - y2) S(y2 - y1)]
        let (coeff, rest) = expr.clone().split_coefficient();
        assert_eq!(coeff, Rational64::new(-1, 8));
        let rest = rest.to_string();
        assert!(rest.contains("prop(psi, y1, y2, "));
        assert!(rest.contains("prop(psi, y2, y1, "));
    }

    #[test]
    fn indexed_legs() {
        log_init();
        symbols!(phi, psi, x, y, a, b);
        let fields = vec![
            QuantumField::real_scalar(phi, x).external(),
            QuantumField::real_scalar(phi, y),
            QuantumField::dirac(psi, y, true).with_index(a),
            QuantumField::dirac(psi, y, false).with_index(a),
            QuantumField::dirac(psi, y, true).with_index(b),
            QuantumField::dirac(psi, y, false).with_index(b),
        ];
        let nfields = fields.len();
        let res = contract(Options::default(), fields);
        check_laws(nfields, &res);
        assert_eq!(res.len(), 2);

        let mut coefficients = Vec::new();
        for (expr, dia) in &res {
            assert_eq!(dia.loops(), 2);
            assert_eq!(dia.factor(), 1);
            assert_eq!(dia.symmetry_factor(), Rational64::from(1));
            let (coeff, rest) = expr.clone().split_coefficient();
            let rest = rest.to_string();
            if coeff < Rational64::from(0) {
                // one loop through both index pairs
                assert!(rest.contains("prop(psi, y(a), y(b), "));
                assert!(rest.contains("prop(psi, y(b), y(a), "));
            } else {
                assert!(rest.contains("prop(psi, y(a), y(a), "));
                assert!(rest.contains("prop(psi, y(b), y(b), "));
            }
            coefficients.push(coeff);
        }
        coefficients.sort();
        assert_eq!(
            coefficients,
            [Rational64::new(-1, 256), Rational64::new(1, 256)]
        );
    }

    #[test]
    fn overflow() {
        log_init();
        symbols!(phi, y);
        // 22! does not fit into the symmetry factor
        let fields = vec![QuantumField::real_scalar(phi, y); 22];
        let res = WickCalculator::default().contract(fields, &mut Naming::default());
        assert!(matches!(res, Err(WickError::Overflow(_))));
    }
}

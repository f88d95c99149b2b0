use itertools::Itertools;

use crate::field::Field;
use crate::vertex::NodeId;

/// Whether the permutation sorting `seq` is odd
///
/// The elements of `seq` have to be distinct.
pub fn is_odd_permutation<T: Ord>(seq: &[T]) -> bool {
    let mut order = Vec::from_iter(0..seq.len());
    order.sort_by(|&i, &j| seq[i].cmp(&seq[j]));
    debug_assert!(order.windows(2).all(|w| seq[w[0]] != seq[w[1]]));

    let mut visited = vec![false; seq.len()];
    let mut ncycles = 0;
    for start in 0..order.len() {
        if visited[start] {
            continue;
        }
        ncycles += 1;
        let mut i = start;
        while !visited[i] {
            visited[i] = true;
            i = order[i];
        }
    }
    (seq.len() - ncycles) % 2 == 1
}

/// Sign from reordering the fields into contracted pairs
///
/// Only anticommuting fields contribute. Fields are compared by their
/// position in the original field list.
pub(crate) fn fermion_sign<F: Field>(
    fields: &[F],
    pairs: &[(NodeId, NodeId)],
) -> i64 {
    let order = Vec::from_iter(
        pairs
            .iter()
            .flat_map(|&(a, b)| [a, b])
            .filter(|n| fields[n.0].is_fermionic()),
    );
    if is_odd_permutation(&order) {
        -1
    } else {
        1
    }
}

/// Equivalent legs at a vertex whose assignment was not branched on
///
/// The contraction was done with `chosen`. Contracting with any of the
/// `alternatives` instead gives another term in the expression.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LegSymmetry {
    chosen: NodeId,
    alternatives: Vec<NodeId>,
}

impl LegSymmetry {
    pub(crate) fn new(chosen: NodeId, alternatives: Vec<NodeId>) -> Self {
        debug_assert!(!alternatives.contains(&chosen));
        Self {
            chosen,
            alternatives,
        }
    }

    pub fn chosen(&self) -> NodeId {
        self.chosen
    }

    pub fn alternatives(&self) -> &[NodeId] {
        &self.alternatives
    }

    /// Number of terms generated by this symmetry
    pub fn multiplicity(&self) -> usize {
        self.alternatives.len() + 1
    }

    fn targets(&self) -> impl Iterator<Item = NodeId> + Clone + '_ {
        std::iter::once(self.chosen).chain(self.alternatives.iter().copied())
    }

    fn swap(&self, target: NodeId, n: NodeId) -> NodeId {
        if n == self.chosen {
            target
        } else if n == target {
            self.chosen
        } else {
            n
        }
    }
}

/// One term of the expansion of a list of leg symmetries
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct Relabelling<'a> {
    symmetries: &'a [LegSymmetry],
    targets: Vec<NodeId>,
}

impl Relabelling<'_> {
    pub(crate) fn apply(&self, n: NodeId) -> NodeId {
        // later symmetries were recorded on top of earlier ones
        self.symmetries
            .iter()
            .zip(&self.targets)
            .rev()
            .fold(n, |n, (sym, &target)| sym.swap(target, n))
    }

    pub(crate) fn apply_to_pairs(
        &self,
        pairs: &[(NodeId, NodeId)],
    ) -> Vec<(NodeId, NodeId)> {
        pairs
            .iter()
            .map(|&(a, b)| (self.apply(a), self.apply(b)))
            .collect()
    }
}

/// All relabellings generated by the given symmetries
///
/// The first relabelling is always the identity.
pub(crate) fn relabellings(symmetries: &[LegSymmetry]) -> Vec<Relabelling<'_>> {
    if symmetries.is_empty() {
        return vec![Relabelling {
            symmetries,
            targets: Vec::new(),
        }];
    }
    symmetries
        .iter()
        .map(|s| s.targets())
        .multi_cartesian_product()
        .map(|targets| Relabelling {
            symmetries,
            targets,
        })
        .collect()
}

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt::Display;
use std::ops::AddAssign;

use ahash::AHashMap;
use petgraph::{
    graph::{IndexType, UnGraph},
    visit::{EdgeRef, NodeIndexable},
    EdgeType, Graph,
};

pub trait Format<'a> {
    type Output: Display;

    fn format(&'a self) -> Self::Output;
}

pub fn into_nodes_edges<N, E, Ty, Ix>(
    g: Graph<N, E, Ty, Ix>,
) -> (Vec<N>, Vec<(usize, usize, E)>)
where
    Ty: EdgeType,
    Ix: IndexType,
{
    let edges = Vec::from_iter(
        g.edge_references()
            .map(|e| (g.to_index(e.source()), g.to_index(e.target()))),
    );
    let (nodes, e) = g.into_nodes_edges();
    let nodes = nodes.into_iter().map(|n| n.weight).collect();
    let edges = edges
        .into_iter()
        .zip(e.into_iter().map(|e| e.weight))
        .map(|((from, to), wt)| (from, to, wt))
        .collect();
    (nodes, edges)
}

pub fn from_nodes_edges<N, E, Ty, Ix>(
    nodes: Vec<N>,
    edges: Vec<(usize, usize, E)>,
) -> Graph<N, E, Ty, Ix>
where
    Ty: EdgeType,
    Ix: IndexType,
{
    let mut res = Graph::with_capacity(nodes.len(), edges.len());
    for node in nodes {
        res.add_node(node);
    }
    for edge in edges {
        let from = res.from_index(edge.0);
        let to = res.from_index(edge.1);
        res.add_edge(from, to, edge.2);
    }
    res
}

/// Remove the edge with index `idx`, merging its end points
///
/// The merged vertex takes the lower index, its weight is the sum of
/// the weights of the end points. A self-loop is simply removed.
pub fn contract_graph_edge<N, E, Ty, Ix>(
    g: Graph<N, E, Ty, Ix>,
    idx: usize,
) -> Graph<N, E, Ty, Ix>
where
    N: AddAssign,
    Ty: EdgeType,
    Ix: IndexType,
{
    let (mut nodes, mut edges) = into_nodes_edges(g);
    let contracted = edges.remove(idx);
    let (merged, removed) = minmax(contracted.0, contracted.1);
    if merged != removed {
        let removed_node = nodes.remove(removed);
        nodes[merged] += removed_node;
        for edge in &mut edges {
            for vx in [&mut edge.0, &mut edge.1] {
                match removed.cmp(vx) {
                    Ordering::Less => *vx -= 1,
                    Ordering::Equal => *vx = merged,
                    Ordering::Greater => {}
                }
            }
        }
    }
    from_nodes_edges(nodes, edges)
}

pub(crate) fn minmax<T: Ord>(s: T, t: T) -> (T, T) {
    if s < t {
        (s, t)
    } else {
        (t, s)
    }
}

/// Length of the shortest cycle
///
/// A self-loop is a cycle of length one and two parallel edges form a
/// cycle of length two. Returns `None` for forests.
pub fn min_cycle_length<N, E, Ix: IndexType>(
    g: &UnGraph<N, E, Ix>,
) -> Option<usize> {
    let mut multiplicity: AHashMap<(usize, usize), usize> = AHashMap::new();
    for edge in g.edge_references() {
        let (s, t) =
            minmax(g.to_index(edge.source()), g.to_index(edge.target()));
        if s == t {
            return Some(1);
        }
        *multiplicity.entry((s, t)).or_default() += 1;
    }
    if multiplicity.values().any(|&m| m > 1) {
        return Some(2);
    }

    let mut adjacent = vec![Vec::new(); g.node_count()];
    for &(s, t) in multiplicity.keys() {
        adjacent[s].push(t);
        adjacent[t].push(s);
    }

    // the shortest cycle through a vertex is found by a breadth-first
    // search starting there
    let mut shortest = None;
    for root in 0..adjacent.len() {
        let mut dist = vec![None; adjacent.len()];
        let mut parent = vec![None; adjacent.len()];
        let mut queue = VecDeque::from([root]);
        dist[root] = Some(0);
        while let Some(current) = queue.pop_front() {
            let d = dist[current].unwrap();
            for &next in &adjacent[current] {
                match dist[next] {
                    None => {
                        dist[next] = Some(d + 1);
                        parent[next] = Some(current);
                        queue.push_back(next);
                    }
                    Some(dn) if parent[current] != Some(next) => {
                        let len = d + dn + 1;
                        if shortest.map(|s| len < s).unwrap_or(true) {
                            shortest = Some(len);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    shortest
}

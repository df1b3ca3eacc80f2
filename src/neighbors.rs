//! C2 — the neighbor map.
//!
//! A keys-dense mapping from agent id to its set of neighbor ids, with O(1)
//! expected membership/iteration and set-algebra against other maps or raw
//! id sets. `spec.md` §4.1 calls for cheap intersect/subtract/union against
//! the agent-state sets (`disease::StatePartition`) without forcing callers
//! to materialize an intermediate collection when a filter loop is cheaper;
//! `intersect_keys`/`subtract_keys` below return iterators for exactly that
//! reason.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::AgentId;

/// A symmetric mapping from agent id to the set of its neighbors in one
/// contact layer (household, school, office, or inter-household).
#[derive(Debug, Clone, Default)]
pub struct NeighborMap {
    edges: HashMap<AgentId, HashSet<AgentId>>,
}

impl NeighborMap {
    pub fn new() -> Self {
        NeighborMap { edges: HashMap::new() }
    }

    /// Build from a raw adjacency map, validating the symmetry and
    /// no-self-loop invariants (`spec.md` I — household symmetry, P4).
    pub fn from_edges(edges: HashMap<AgentId, HashSet<AgentId>>) -> Result<Self> {
        for (&node, nbrs) in &edges {
            if nbrs.contains(&node) {
                return Err(Error::GraphInconsistent(format!("self-loop at node {node}")));
            }
            for &nbr in nbrs {
                let reciprocal = edges.get(&nbr).map(|s| s.contains(&node)).unwrap_or(false);
                if !reciprocal {
                    return Err(Error::GraphInconsistent(format!(
                        "asymmetric edge: {node} -> {nbr} has no reverse edge"
                    )));
                }
            }
        }
        Ok(NeighborMap { edges })
    }

    /// Insert a reciprocal edge between `a` and `b`. No-op (but rejects) if
    /// `a == b`.
    pub fn add_edge(&mut self, a: AgentId, b: AgentId) {
        assert_ne!(a, b, "neighbor maps may not contain self-loops");
        self.edges.entry(a).or_default().insert(b);
        self.edges.entry(b).or_default().insert(a);
    }

    /// Ensure `id` is present as a key, even with an empty neighbor set.
    pub fn ensure_node(&mut self, id: AgentId) {
        self.edges.entry(id).or_default();
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.edges.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Iterate the neighbors of `id`. Empty (not panicking) if absent.
    pub fn neighbors(&self, id: AgentId) -> impl Iterator<Item = AgentId> + '_ {
        self.edges.get(&id).into_iter().flat_map(|s| s.iter().copied())
    }

    /// Iterate all keys (agent ids that participate in this layer).
    pub fn keys(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.edges.keys().copied()
    }

    /// Iterate the subset of `ids` that is also a key of this map, without
    /// allocating an intermediate set.
    pub fn intersect_keys<'a>(&'a self, ids: &'a HashSet<AgentId>) -> impl Iterator<Item = AgentId> + 'a {
        ids.iter().copied().filter(move |id| self.edges.contains_key(id))
    }

    /// Iterate the subset of `ids` that is NOT a key of this map.
    pub fn subtract_keys<'a>(&'a self, ids: &'a HashSet<AgentId>) -> impl Iterator<Item = AgentId> + 'a {
        ids.iter().copied().filter(move |id| !self.edges.contains_key(id))
    }

    /// Union of this map's key-set with another's, as an owned set (the one
    /// set-algebra op that a caller generally does need materialized, since
    /// both households and school halves participate symmetrically in
    /// `Simulation::cohort_child`, `spec.md` §4.5 step 5).
    pub fn union_keys(&self, other: &NeighborMap) -> HashSet<AgentId> {
        let mut out: HashSet<AgentId> = self.edges.keys().copied().collect();
        out.extend(other.edges.keys().copied());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_edge_is_symmetric() {
        let mut m = NeighborMap::new();
        m.add_edge(1, 2);
        assert!(m.neighbors(1).any(|n| n == 2));
        assert!(m.neighbors(2).any(|n| n == 1));
    }

    #[test]
    fn from_edges_rejects_self_loop() {
        let mut raw = HashMap::new();
        raw.insert(1u32, HashSet::from([1u32]));
        assert!(NeighborMap::from_edges(raw).is_err());
    }

    #[test]
    fn from_edges_rejects_asymmetry() {
        let mut raw = HashMap::new();
        raw.insert(1u32, HashSet::from([2u32]));
        raw.insert(2u32, HashSet::new());
        assert!(NeighborMap::from_edges(raw).is_err());
    }

    #[test]
    fn from_edges_accepts_symmetric_graph() {
        let mut raw = HashMap::new();
        raw.insert(1u32, HashSet::from([2u32]));
        raw.insert(2u32, HashSet::from([1u32]));
        assert!(NeighborMap::from_edges(raw).is_ok());
    }

    #[test]
    fn intersect_and_subtract_keys() {
        let mut m = NeighborMap::new();
        m.add_edge(1, 2);
        m.ensure_node(3);
        let ids: HashSet<AgentId> = HashSet::from([1, 4, 3]);
        let mut inter: Vec<_> = m.intersect_keys(&ids).collect();
        inter.sort_unstable();
        assert_eq!(inter, vec![1, 3]);
        let mut diff: Vec<_> = m.subtract_keys(&ids).collect();
        diff.sort_unstable();
        assert_eq!(diff, vec![4]);
    }
}

//! NetworkTopology - trust-weighted community graph
//!
//! Undirected adjacency lists keyed by community id. Hop counts come from a
//! plain BFS; nothing here needs weighted paths.
//!
//! ```text
//! density                    = edges / (n·(n−1)/2)
//! coordination_effectiveness = 0.4·density + 0.6·average_trust
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use worldgame_common::{CommunityId, EntityKind, LedgerError, RegionId};

/// Undirected trust edge between two communities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustLink {
    pub a: CommunityId,
    pub b: CommunityId,
    /// Trust in [0, 1]
    pub trust: f64,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkTopology {
    adjacency: BTreeMap<CommunityId, BTreeMap<CommunityId, f64>>,
    region_of: BTreeMap<CommunityId, RegionId>,
}

impl NetworkTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: CommunityId, region: RegionId) {
        self.adjacency.entry(id.clone()).or_default();
        self.region_of.insert(id, region);
    }

    pub fn contains(&self, id: &CommunityId) -> bool {
        self.adjacency.contains_key(id)
    }

    /// Connect two known communities; trust is clamped to [0, 1] and a second
    /// call replaces the edge's trust
    pub fn connect(&mut self, a: &CommunityId, b: &CommunityId, trust: f64) -> Result<(), LedgerError> {
        for id in [a, b] {
            if !self.contains(id) {
                return Err(LedgerError::unknown(EntityKind::Community, id));
            }
        }
        if a == b {
            return Err(LedgerError::invalid(
                EntityKind::Community,
                a,
                "cannot connect a community to itself",
            ));
        }
        let trust = if trust.is_nan() { 0.0 } else { trust.clamp(0.0, 1.0) };
        if let Some(edges) = self.adjacency.get_mut(a) {
            edges.insert(b.clone(), trust);
        }
        if let Some(edges) = self.adjacency.get_mut(b) {
            edges.insert(a.clone(), trust);
        }
        Ok(())
    }

    /// Neighbours with edge trust, in id order
    pub fn neighbors(&self, id: &CommunityId) -> Result<Vec<(&CommunityId, f64)>, LedgerError> {
        self.adjacency
            .get(id)
            .map(|edges| edges.iter().map(|(n, t)| (n, *t)).collect())
            .ok_or_else(|| LedgerError::unknown(EntityKind::Community, id))
    }

    /// Trust on the edge between two communities, if connected
    pub fn trust(&self, a: &CommunityId, b: &CommunityId) -> Option<f64> {
        self.adjacency.get(a).and_then(|edges| edges.get(b)).copied()
    }

    /// BFS hop count; `None` when no path exists
    pub fn shortest_path_length(
        &self,
        from: &CommunityId,
        to: &CommunityId,
    ) -> Result<Option<usize>, LedgerError> {
        for id in [from, to] {
            if !self.contains(id) {
                return Err(LedgerError::unknown(EntityKind::Community, id));
            }
        }
        if from == to {
            return Ok(Some(0));
        }

        let mut visited: BTreeSet<&CommunityId> = BTreeSet::from([from]);
        let mut queue = VecDeque::from([(from, 0usize)]);

        while let Some((node, hops)) = queue.pop_front() {
            let Some(edges) = self.adjacency.get(node) else {
                continue;
            };
            for next in edges.keys() {
                if next == to {
                    return Ok(Some(hops + 1));
                }
                if visited.insert(next) {
                    queue.push_back((next, hops + 1));
                }
            }
        }
        Ok(None)
    }

    /// Mean pairwise hop count over a node set, charging `disconnected_hops`
    /// for unreachable pairs; `None` for fewer than two known nodes
    pub fn mean_path_length(&self, nodes: &[CommunityId], disconnected_hops: f64) -> Option<f64> {
        let known: Vec<&CommunityId> = nodes.iter().filter(|id| self.contains(id)).collect();
        if known.len() < 2 {
            return None;
        }

        let mut total = 0.0;
        let mut pairs = 0usize;
        for (i, a) in known.iter().enumerate() {
            for b in &known[i + 1..] {
                let hops = match self.shortest_path_length(a, b) {
                    Ok(Some(hops)) => hops as f64,
                    _ => disconnected_hops,
                };
                total += hops;
                pairs += 1;
            }
        }
        Some(total / pairs as f64)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|edges| edges.len()).sum::<usize>() / 2
    }

    /// Edges over possible edges; 0 for graphs with fewer than two nodes
    pub fn density(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }
        let possible = (n * (n - 1)) as f64 / 2.0;
        self.edge_count() as f64 / possible
    }

    /// Mean trust over all edges; 0 without edges
    pub fn average_trust(&self) -> f64 {
        let links = self.links();
        if links.is_empty() {
            return 0.0;
        }
        links.iter().map(|l| l.trust).sum::<f64>() / links.len() as f64
    }

    pub fn coordination_effectiveness(&self) -> f64 {
        0.4 * self.density() + 0.6 * self.average_trust()
    }

    /// Regions one edge away from any community of `region`, excluding itself
    pub fn neighboring_regions(&self, region: &RegionId) -> BTreeSet<RegionId> {
        let mut found = BTreeSet::new();
        for (node, node_region) in &self.region_of {
            if node_region != region {
                continue;
            }
            if let Some(edges) = self.adjacency.get(node) {
                for next in edges.keys() {
                    if let Some(next_region) = self.region_of.get(next) {
                        if next_region != region {
                            found.insert(next_region.clone());
                        }
                    }
                }
            }
        }
        found
    }

    /// Every edge once, with `a < b`
    pub fn links(&self) -> Vec<TrustLink> {
        self.adjacency
            .iter()
            .flat_map(|(a, edges)| {
                edges
                    .iter()
                    .filter(move |(b, _)| a < *b)
                    .map(move |(b, trust)| TrustLink {
                        a: a.clone(),
                        b: b.clone(),
                        trust: *trust,
                    })
            })
            .collect()
    }
}

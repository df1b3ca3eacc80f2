use std::collections::{HashMap, HashSet};

use getset::CopyGetters;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::neighbors::NeighborMap;
use crate::rng::Rng;
use crate::AgentId;

/// Empirical divisor from `gengraph.py`: the parent+child pool is divided
/// by this to get the pre-merge parent count `k`, chosen so the
/// merge/duplication pipeline below lands the final child:parent ratio
/// near 1:1.386.
const PARENT_CHILD_DIVISOR: f64 = 2.386296;
const SCHOOL_GRID_SIDE: usize = 5;
const OFFICE_CLUSTER_CAP: u32 = 16;

/// Inputs to the graph generator (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Target population size (approximate, due to rounding in the
    /// derived-size formulas).
    pub n: usize,
    /// Office clustering parameter, `(0, 0.5]`.
    pub sigma_office: f64,
    /// Fraction of school blocks assigned to split classes, `[0, 1]`.
    pub perc_split_classes: f64,
}

impl GraphConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n == 0 {
            return Err(Error::ConfigInvalid("graph population n must be positive".into()));
        }
        if !(self.sigma_office > 0.0 && self.sigma_office <= 0.5) {
            return Err(Error::ConfigInvalid(format!(
                "sigma_office must be in (0, 0.5], got {}",
                self.sigma_office
            )));
        }
        if !(0.0..=1.0).contains(&self.perc_split_classes) {
            return Err(Error::ConfigInvalid(format!(
                "perc_split_classes must be in [0, 1], got {}",
                self.perc_split_classes
            )));
        }
        Ok(())
    }
}

/// The five contact layers produced by [`generate`], re-idd to a dense
/// `0..population` range.
#[derive(Debug, Clone, CopyGetters)]
pub struct PopulationGraph {
    #[getset(get_copy = "pub")]
    population: usize,
    pub household: NeighborMap,
    pub school_standard: NeighborMap,
    pub school_split: [NeighborMap; 2],
    pub office: NeighborMap,
    pub interhousehold: NeighborMap,
}

impl PopulationGraph {
    /// Assemble a graph from already-built layers, for callers (tests,
    /// hand-authored fixtures) that bypass [`generate`] entirely.
    pub(crate) fn from_layers(
        population: usize,
        household: NeighborMap,
        school_standard: NeighborMap,
        school_split: [NeighborMap; 2],
        office: NeighborMap,
        interhousehold: NeighborMap,
    ) -> Self {
        PopulationGraph { population, household, school_standard, school_split, office, interhousehold }
    }
}

/// Raw (pre-re-id) adjacency under construction.
struct Raw {
    next_id: u32,
    node_order: Vec<u32>,
    child_nodes: HashSet<u32>,
    adult_nodes: HashSet<u32>,
    household: HashMap<u32, HashSet<u32>>,
    school_standard: HashMap<u32, HashSet<u32>>,
    school_split: [HashMap<u32, HashSet<u32>>; 2],
    office: HashMap<u32, HashSet<u32>>,
    interhousehold: HashMap<u32, HashSet<u32>>,
}

fn sorted_vec(ids: &HashSet<u32>) -> Vec<u32> {
    let mut v: Vec<u32> = ids.iter().copied().collect();
    v.sort_unstable();
    v
}

fn sorted_keys(map: &HashMap<u32, HashSet<u32>>) -> Vec<u32> {
    let mut v: Vec<u32> = map.keys().copied().collect();
    v.sort_unstable();
    v
}

/// Generate a population graph for the given configuration (`spec.md`
/// §4.2). Every random choice is drawn from `rng`, in the order the
/// procedure below lists, so that two calls with the same seed produce an
/// identical (pre-re-id, and therefore also post-re-id) graph.
pub fn generate(config: &GraphConfig, rng: &mut Rng) -> Result<PopulationGraph> {
    config.validate()?;

    let n_parents_children = (config.n as f64 * 0.55) as usize;
    let k = (n_parents_children as f64 / PARENT_CHILD_DIVISOR) as usize;
    if k == 0 {
        return Err(Error::ConfigInvalid("population too small to derive any households".into()));
    }

    let mut raw = Raw {
        next_id: 2 * k as u32,
        node_order: (0..2 * k as u32).collect(),
        child_nodes: (0..k as u32).collect(),
        adult_nodes: (k as u32..2 * k as u32).collect(),
        household: HashMap::new(),
        school_standard: HashMap::new(),
        school_split: [HashMap::new(), HashMap::new()],
        office: HashMap::new(),
        interhousehold: HashMap::new(),
    };

    pair_children_and_parents(&mut raw, rng);
    merge_parent_households(&mut raw, rng);
    duplicate_parents(&mut raw);
    let children_parent_nodes = sorted_keys(&raw.household);
    add_adult_singles(&mut raw, config.n, &children_parent_nodes, rng);
    add_adult_pairs(&mut raw, config.n, &children_parent_nodes, rng);
    build_school_grids(&mut raw, config.perc_split_classes, rng);
    build_office_clusters(&mut raw, config.sigma_office, rng);

    reid(raw)
}

/// Step 1: shuffle parent ids, zip with children `0..k-1`, one reciprocal
/// household edge per pair.
fn pair_children_and_parents(raw: &mut Raw, rng: &mut Rng) {
    let mut parents = sorted_vec(&raw.adult_nodes);
    rng.shuffle(&mut parents);
    for (child, &parent) in parents.iter().enumerate() {
        let child = child as u32;
        raw.household.entry(child).or_default().insert(parent);
        raw.household.entry(parent).or_default().insert(child);
    }
}

/// Step 2: partition shuffled parents into geometric buckets halving in
/// size; bucket 0 is kept nuclear, later buckets are chunked into groups of
/// increasing size and collapsed into one surviving household each.
fn merge_parent_households(raw: &mut Raw, rng: &mut Rng) {
    let mut parents = sorted_vec(&raw.adult_nodes);
    rng.shuffle(&mut parents);

    let total = parents.len();
    let mut buckets = Vec::new();
    let mut divisor = 2u32;
    let mut len_sum = 0usize;
    while len_sum < total {
        let take = ((total as f64) / divisor as f64).ceil() as usize;
        let end = (len_sum + take).min(total);
        buckets.push(parents[len_sum..end].to_vec());
        len_sum = end;
        divisor *= 2;
    }

    let mut merge_size = 2usize;
    for bucket in buckets.iter().skip(1) {
        for group in bucket.chunks(merge_size) {
            if group.len() < 2 {
                continue;
            }
            merge_group(raw, group[0], &group[1..]);
        }
        merge_size += 1;
    }
}

/// Collapse `merge_nodes`' households into `kept`'s: the union of `kept`,
/// its existing household, and every `merge_node`'s household becomes one
/// clique, and the `merge_node` ids are dropped from the graph entirely.
fn merge_group(raw: &mut Raw, kept: u32, merge_nodes: &[u32]) {
    let mut clique: HashSet<u32> = raw.household.get(&kept).cloned().unwrap_or_default();
    clique.insert(kept);
    for &merge_node in merge_nodes {
        if let Some(nbrs) = raw.household.get(&merge_node) {
            clique.extend(nbrs.iter().copied());
        }
        clique.remove(&merge_node);
    }
    for &member in &clique {
        let mut nbrs = clique.clone();
        nbrs.remove(&member);
        raw.household.insert(member, nbrs);
    }
    for &merge_node in merge_nodes {
        raw.household.remove(&merge_node);
        raw.node_order.retain(|&x| x != merge_node);
        raw.adult_nodes.remove(&merge_node);
    }
}

/// Step 3: every surviving parent gains a duplicate node (models the
/// second parent of a two-parent household) that inherits its whole
/// household plus an edge back to the original.
fn duplicate_parents(raw: &mut Raw) {
    for original in sorted_vec(&raw.adult_nodes) {
        let new_node = raw.next_id;
        raw.next_id += 1;
        raw.node_order.push(new_node);
        raw.adult_nodes.insert(new_node);

        let existing: HashSet<u32> = raw.household.get(&original).cloned().unwrap_or_default();
        let mut new_nbrs = existing.clone();
        new_nbrs.insert(original);
        raw.household.insert(new_node, new_nbrs);
        for node in existing {
            raw.household.entry(node).or_default().insert(new_node);
        }
        raw.household.entry(original).or_default().insert(new_node);
    }
}

fn record_interhousehold_edges(raw: &mut Raw, new_node: u32, relatives: &HashSet<u32>) {
    for &rel in relatives {
        raw.interhousehold.entry(new_node).or_default().insert(rel);
        raw.interhousehold.entry(rel).or_default().insert(new_node);
    }
}

/// Step 4: append isolated-household ids, each recording a reciprocal
/// inter-household edge to a random existing household (`spec.md` §4.2
/// step 4 — "records a reciprocal inter-household edge to that id's
/// household", implemented here as a genuinely symmetric edge set rather
/// than the prototype's overwrite-on-assign pattern, per the symmetry
/// invariant P4 requires of every contact layer including inter-household).
fn add_adult_singles(raw: &mut Raw, n: usize, children_parent_nodes: &[u32], rng: &mut Rng) {
    let num_singles = (n as f64 * 0.17) as usize;
    for _ in 0..num_singles {
        let new_node = raw.next_id;
        raw.next_id += 1;
        raw.node_order.push(new_node);
        raw.adult_nodes.insert(new_node);
        raw.household.insert(new_node, HashSet::new());

        let rel_node = *rng.choose(children_parent_nodes);
        let mut relatives: HashSet<u32> = raw.household.get(&rel_node).cloned().unwrap_or_default();
        relatives.insert(rel_node);
        record_interhousehold_edges(raw, new_node, &relatives);
    }
}

/// Step 5: append reciprocal household pairs, each recording an
/// inter-household edge to a random existing household.
fn add_adult_pairs(raw: &mut Raw, n: usize, children_parent_nodes: &[u32], rng: &mut Rng) {
    let num_pairs = ((n as f64 * 0.28) / 2.0) as usize;
    for _ in 0..num_pairs {
        let a = raw.next_id;
        let b = raw.next_id + 1;
        raw.next_id += 2;
        raw.node_order.push(a);
        raw.node_order.push(b);
        raw.adult_nodes.insert(a);
        raw.adult_nodes.insert(b);
        raw.household.entry(a).or_default().insert(b);
        raw.household.entry(b).or_default().insert(a);

        let rel_node = *rng.choose(children_parent_nodes);
        let mut relatives: HashSet<u32> = raw.household.get(&rel_node).cloned().unwrap_or_default();
        relatives.insert(rel_node);
        record_interhousehold_edges(raw, a, &relatives);
        record_interhousehold_edges(raw, b, &relatives);
    }
}

/// Step 6: shuffle children into blocks of 25 (dropping any remainder
/// block), split a `perc_split_classes` fraction of blocks into two
/// parity-masked halves, and build the rest as full standard classes.
fn build_school_grids(raw: &mut Raw, perc_split_classes: f64, rng: &mut Rng) {
    let l = SCHOOL_GRID_SIDE;
    let block_size = l * l;

    let mut children = sorted_vec(&raw.child_nodes);
    rng.shuffle(&mut children);

    let n_blocks = children.len() / block_size;
    let usable = &children[..n_blocks * block_size];
    let blocks: Vec<&[u32]> = usable.chunks(block_size).collect();

    let brkpnt = ((blocks.len() as f64) * perc_split_classes) as usize;
    let (split_blocks, standard_blocks) = blocks.split_at(brkpnt.min(blocks.len()));

    raw.school_split[0] = make_grid(split_blocks, l, Some(0));
    raw.school_split[1] = make_grid(split_blocks, l, Some(1));
    raw.school_standard = make_grid(standard_blocks, l, None);
}

/// Build the 8-neighborhood adjacency for a set of `l x l` blocks. When
/// `keep_parity` is `Some(p)`, only cells with `(i + j) % 2 == p` are kept
/// (both as keys and as neighbors) — this is what produces the two
/// independent split-class halves; `None` keeps every cell (a standard
/// class).
fn make_grid(blocks: &[&[u32]], l: usize, keep_parity: Option<u8>) -> HashMap<u32, HashSet<u32>> {
    let keep = |i: usize, j: usize| -> bool {
        match keep_parity {
            None => true,
            Some(p) => ((i + j) % 2) as u8 == p,
        }
    };

    let mut adj = HashMap::new();
    for &block in blocks {
        let grid: Vec<&[u32]> = block.chunks(l).collect();
        for i in 0..l {
            for j in 0..l {
                if !keep(i, j) {
                    continue;
                }
                let node = grid[i][j];
                let mut nbrs = HashSet::new();
                for di in -1i32..=1 {
                    for dj in -1i32..=1 {
                        if di == 0 && dj == 0 {
                            continue;
                        }
                        let (ni, nj) = (i as i32 + di, j as i32 + dj);
                        if ni < 0 || nj < 0 || ni >= l as i32 || nj >= l as i32 {
                            continue;
                        }
                        let (ni, nj) = (ni as usize, nj as usize);
                        if keep(ni, nj) {
                            nbrs.insert(grid[ni][nj]);
                        }
                    }
                }
                adj.insert(node, nbrs);
            }
        }
    }
    adj
}

/// Step 7: shuffle adults; a `1 - sigma_office` fraction becomes isolated
/// (present, no office neighbors); the rest is partitioned into halving
/// geometric buckets capped at cluster size 16, each bucket chunked into
/// cliques of its cluster size.
fn build_office_clusters(raw: &mut Raw, sigma_office: f64, rng: &mut Rng) {
    let mut adults = sorted_vec(&raw.adult_nodes);
    rng.shuffle(&mut adults);

    let total = adults.len();
    let mut buckets = Vec::new();
    let first_size = (((total as f64) * (1.0 - sigma_office)).ceil() as usize).min(total);
    buckets.push(adults[..first_size].to_vec());
    let mut len_sum = first_size;
    let mut divisor = 2u32;
    while len_sum < total {
        let size = ((total as f64) * sigma_office / divisor as f64).ceil() as usize;
        let end = (len_sum + size).min(total);
        buckets.push(adults[len_sum..end].to_vec());
        len_sum = end;
        divisor *= 2;
        if divisor > OFFICE_CLUSTER_CAP {
            if len_sum < total {
                buckets.push(adults[len_sum..].to_vec());
            }
            break;
        }
    }

    for &node in &buckets[0] {
        raw.office.entry(node).or_default();
    }

    let mut cluster_size = 2usize;
    for bucket in buckets.iter().skip(1) {
        for chunk in bucket.chunks(cluster_size) {
            let clique: HashSet<u32> = chunk.iter().copied().collect();
            for &node in chunk {
                let mut nbrs = clique.clone();
                nbrs.remove(&node);
                raw.office.insert(node, nbrs);
            }
        }
        cluster_size += 1;
    }
}

fn remap(old2new: &HashMap<u32, u32>, raw: HashMap<u32, HashSet<u32>>) -> HashMap<u32, HashSet<u32>> {
    raw.into_iter()
        .map(|(k, v)| {
            let new_k = old2new[&k];
            let new_v = v.into_iter().map(|x| old2new[&x]).collect();
            (new_k, new_v)
        })
        .collect()
}

/// Collapse the working id space to a dense `0..population` range, in
/// node-insertion order, and validate every layer's symmetry invariant.
fn reid(raw: Raw) -> Result<PopulationGraph> {
    let old2new: HashMap<u32, u32> =
        raw.node_order.iter().enumerate().map(|(i, &old)| (old, i as u32)).collect();
    let population = raw.node_order.len();

    let household = NeighborMap::from_edges(remap(&old2new, raw.household))?;
    let school_standard = NeighborMap::from_edges(remap(&old2new, raw.school_standard))?;
    let [split0, split1] = raw.school_split;
    let school_split =
        [NeighborMap::from_edges(remap(&old2new, split0))?, NeighborMap::from_edges(remap(&old2new, split1))?];
    let office = NeighborMap::from_edges(remap(&old2new, raw.office))?;
    let interhousehold = NeighborMap::from_edges(remap(&old2new, raw.interhousehold))?;

    Ok(PopulationGraph { population, household, school_standard, school_split, office, interhousehold })
}

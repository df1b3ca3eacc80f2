//! C5 — visit binding.
//!
//! Per-household selection of recurring candidate venues per location type
//! (`spec.md` §6 "Visit-binding contract"). The upstream assignment of
//! households to physical coordinates and the OSM extraction that produces
//! the location roster are external collaborators (out of scope, `spec.md`
//! §1); this module implements only the selection policy §6 documents,
//! consuming a roster of already-built [`Location`]s and a household
//! position table.
//!
//! Candidate venues are stored as indices into the caller's location
//! roster rather than references, since `Location::spread` needs `&mut`
//! access to the same roster every round (teacher precedent:
//! `sim/population.rs` keeps agents in a flat `Vec` and refers to them by
//! index rather than threading references through `Simulation`).

use std::collections::HashMap;

use crate::location::Location;
use crate::params::LocationKind;
use crate::rng::Rng;
use crate::AgentId;

fn euclidean(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Per-household, per-type candidate venue lists (`spec.md` §6). Built once
/// at setup and immutable afterward (`spec.md` §3 "Visit binding").
#[derive(Debug, Clone, Default)]
pub struct VisitBinder {
    bindings: HashMap<AgentId, HashMap<LocationKind, Vec<usize>>>,
}

impl VisitBinder {
    /// Build bindings for every household, given each household's member
    /// ids, its position (supplied by the external building-to-household
    /// assignment), and the full location roster. Every member of a
    /// household shares the same candidate lists.
    pub fn build(
        households: &[(Vec<AgentId>, (f64, f64))],
        locations: &[Location],
        rng: &mut Rng,
    ) -> Self {
        let mut by_kind: HashMap<LocationKind, Vec<usize>> = HashMap::new();
        for (i, loc) in locations.iter().enumerate() {
            by_kind.entry(loc.kind()).or_default().push(i);
        }

        let mut bindings = HashMap::new();
        for (members, position) in households {
            let mut per_type = HashMap::new();
            for kind in LocationKind::ALL {
                let Some(candidates) = by_kind.get(&kind) else { continue };
                if candidates.is_empty() {
                    continue;
                }
                let picks = match kind {
                    LocationKind::Supermarket => nearest_n(candidates, locations, *position, 3),
                    LocationKind::Shop | LocationKind::Leisure => {
                        tag_weighted_nearest(candidates, locations, *position, 5, rng)
                    }
                    LocationKind::Restaurant | LocationKind::Nightlife => {
                        uniform_random_n(candidates, 5, rng)
                    }
                };
                if !picks.is_empty() {
                    per_type.insert(kind, picks);
                }
            }
            for &member in members {
                bindings.insert(member, per_type.clone());
            }
        }
        VisitBinder { bindings }
    }

    /// Candidate venue indices for `agent`'s household at `kind`, or an
    /// empty slice if the household has no such binding (`spec.md` §6
    /// requires a non-empty list per configured type, but a type absent
    /// from the roster entirely yields none here rather than panicking).
    pub fn candidates(&self, agent: AgentId, kind: LocationKind) -> &[usize] {
        self.bindings
            .get(&agent)
            .and_then(|m| m.get(&kind))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Every location type this agent's household has at least one
    /// candidate venue for.
    pub fn bound_kinds(&self, agent: AgentId) -> Vec<LocationKind> {
        self.bindings.get(&agent).map(|m| m.keys().copied().collect()).unwrap_or_default()
    }
}

/// 3-nearest-by-distance policy (supermarket).
fn nearest_n(candidates: &[usize], locations: &[Location], from: (f64, f64), n: usize) -> Vec<usize> {
    let mut ranked: Vec<(usize, f64)> = candidates
        .iter()
        .map(|&i| (i, euclidean(from, (locations[i].x(), locations[i].y()))))
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(i, _)| i).collect()
}

/// 5 uniformly random instances (restaurant, nightlife).
fn uniform_random_n(candidates: &[usize], n: usize, rng: &mut Rng) -> Vec<usize> {
    (0..n).map(|_| *rng.choose(candidates)).collect()
}

/// 5 tag-weighted picks (weight proportional to how many instances of that
/// tag exist); for each picked tag, the nearest instance of that tag to
/// `from` (shop, leisure).
fn tag_weighted_nearest(
    candidates: &[usize],
    locations: &[Location],
    from: (f64, f64),
    n: usize,
    rng: &mut Rng,
) -> Vec<usize> {
    let mut by_tag: HashMap<&str, Vec<usize>> = HashMap::new();
    for &i in candidates {
        by_tag.entry(locations[i].tag().as_str()).or_default().push(i);
    }
    let mut tags: Vec<&str> = by_tag.keys().copied().collect();
    tags.sort_unstable();
    if tags.is_empty() {
        return Vec::new();
    }
    let weights: Vec<f64> = tags.iter().map(|t| by_tag[t].len() as f64).collect();

    (0..n)
        .map(|_| {
            let tag = tags[rng.weighted_index(&weights)];
            let instances = &by_tag[tag];
            nearest_n(instances, locations, from, 1)[0]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::LocationParams;

    fn loc(kind: LocationKind, tag: &str, x: f64, y: f64) -> Location {
        Location::new(kind, tag.into(), x, y, 100.0, LocationParams { avg_visit_time: 60.0, need_minutes: 60.0, contact_mult: 0.25 })
    }

    #[test]
    fn supermarket_picks_three_nearest() {
        let locations = vec![
            loc(LocationKind::Supermarket, "a", 0.0, 0.0),
            loc(LocationKind::Supermarket, "b", 1.0, 0.0),
            loc(LocationKind::Supermarket, "c", 2.0, 0.0),
            loc(LocationKind::Supermarket, "d", 10.0, 0.0),
        ];
        let households = vec![(vec![1u32], (0.0, 0.0))];
        let mut rng = Rng::seeded(1);
        let binder = VisitBinder::build(&households, &locations, &mut rng);
        let picks = binder.candidates(1, LocationKind::Supermarket);
        assert_eq!(picks.len(), 3);
        assert!(!picks.contains(&3));
    }

    #[test]
    fn restaurant_picks_five_with_replacement_allowed() {
        let locations = vec![loc(LocationKind::Restaurant, "r", 0.0, 0.0), loc(LocationKind::Restaurant, "r", 5.0, 5.0)];
        let households = vec![(vec![1u32], (0.0, 0.0))];
        let mut rng = Rng::seeded(2);
        let binder = VisitBinder::build(&households, &locations, &mut rng);
        assert_eq!(binder.candidates(1, LocationKind::Restaurant).len(), 5);
    }

    #[test]
    fn missing_type_yields_no_candidates() {
        let locations = vec![loc(LocationKind::Supermarket, "a", 0.0, 0.0)];
        let households = vec![(vec![1u32], (0.0, 0.0))];
        let mut rng = Rng::seeded(3);
        let binder = VisitBinder::build(&households, &locations, &mut rng);
        assert!(binder.candidates(1, LocationKind::Nightlife).is_empty());
    }
}

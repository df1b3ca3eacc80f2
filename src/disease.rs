//! C6 — the disease state machine.
//!
//! Agents progress through `Susceptible -> Exposed[*] -> Infectious[*] ->
//! Recovered` (`spec.md` §4.4). Rather than storing a state value per agent
//! (the representation `covid-rs`'s own `agent.rs`/`VariantSEICHAR` uses),
//! state is held as one id-set per sub-state — the "set-based
//! representation" `spec.md` §3/§9 calls the invariant the rest of the
//! simulator's algorithms exploit, since it turns per-round transmission
//! cohort construction into O(|infectious|) set reads instead of an O(n)
//! population scan.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::AgentId;

/// The two disease-profile variants `spec.md` §4.4 allows choosing between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseProfile {
    /// 7 states: Susceptible, E1, E2, E3, I1, I2, Recovered.
    Default,
    /// 4 states: Susceptible, I1, I2, Recovered. No exposed stage.
    ShortIncubation,
}

impl DiseaseProfile {
    fn num_exposed(self) -> usize {
        match self {
            DiseaseProfile::Default => 3,
            DiseaseProfile::ShortIncubation => 0,
        }
    }

    fn num_infectious(self) -> usize {
        2
    }

    /// Total number of tracked sub-states, including Susceptible (index 0)
    /// and Recovered (the last index).
    fn num_states(self) -> usize {
        1 + self.num_exposed() + self.num_infectious() + 1
    }
}

/// The set-per-sub-state partition of the population (`spec.md` §3
/// "Disease state"). Index `0` is always Susceptible, the last index is
/// always Recovered; everything in between is exposed sub-states (if any)
/// followed by infectious sub-states, in progression order.
#[derive(Debug, Clone)]
pub struct StatePartition {
    profile: DiseaseProfile,
    sets: Vec<HashSet<AgentId>>,
}

impl StatePartition {
    /// Build a partition with the entire population susceptible.
    pub fn new(profile: DiseaseProfile, population: impl IntoIterator<Item = AgentId>) -> Self {
        let mut sets = vec![HashSet::new(); profile.num_states()];
        sets[0] = population.into_iter().collect();
        StatePartition { profile, sets }
    }

    pub fn profile(&self) -> DiseaseProfile {
        self.profile
    }

    pub fn susceptible_index(&self) -> usize {
        0
    }

    pub fn recovered_index(&self) -> usize {
        self.sets.len() - 1
    }

    /// Index of the sub-state freshly infected agents enter this round:
    /// the first exposed sub-state, or I1 when the profile has none
    /// (`spec.md` §4.4, I4).
    pub fn first_infected_index(&self) -> usize {
        1
    }

    /// Inclusive range of indices that count as "exposed" for cohort
    /// purposes. Empty for `ShortIncubation`.
    pub fn exposed_indices(&self) -> std::ops::Range<usize> {
        1..(1 + self.profile.num_exposed())
    }

    /// Inclusive range of indices that count as "infectious".
    pub fn infectious_indices(&self) -> std::ops::RangeInclusive<usize> {
        let start = 1 + self.profile.num_exposed();
        let end = start + self.profile.num_infectious() - 1;
        start..=end
    }

    /// The named predicate for the short-incubation PCR eligibility rule
    /// (`spec.md` §9 Open Question #2, `SPEC_FULL.md` §REDESIGN FLAGS #2):
    /// agents currently in the second sub-state of the Infectious
    /// partition.
    pub fn is_in_second_infectious_substate(&self, id: AgentId) -> bool {
        let fallback = *self.infectious_indices().start();
        let second = self.infectious_indices().nth(1).unwrap_or(fallback);
        self.sets[second].contains(&id)
    }

    pub fn is_susceptible(&self, id: AgentId) -> bool {
        self.sets[0].contains(&id)
    }

    pub fn is_recovered(&self, id: AgentId) -> bool {
        self.sets[self.recovered_index()].contains(&id)
    }

    /// Iterate the union of all infectious sub-states.
    pub fn infectious(&self) -> HashSet<AgentId> {
        let mut out = HashSet::new();
        for &i in &self.infectious_indices().collect::<Vec<_>>() {
            out.extend(self.sets[i].iter().copied());
        }
        out
    }

    /// Population counts per sub-state, in index order (Susceptible first,
    /// Recovered last) — the basis of the telemetry "state populations
    /// vector" (`spec.md` §3).
    pub fn state_counts(&self) -> Vec<usize> {
        self.sets.iter().map(|s| s.len()).collect()
    }

    pub fn num_states(&self) -> usize {
        self.sets.len()
    }

    /// Remove `id` from Susceptible if present, returning whether it was
    /// removed. Used by every spread channel so that a susceptible agent is
    /// infected through at most one channel per round (`spec.md` §5,
    /// "first writer wins").
    pub fn try_infect(&mut self, id: AgentId) -> bool {
        self.sets[0].remove(&id)
    }

    /// Force-set an agent's initial sub-state without going through
    /// `try_infect` (used only by population setup, never mid-round):
    /// removes `id` from Susceptible and inserts it directly at `index`.
    pub fn seed_at(&mut self, id: AgentId, index: usize) {
        self.sets[0].remove(&id);
        self.sets[index].insert(id);
    }

    pub fn mark_immune(&mut self, id: AgentId) {
        self.sets[0].remove(&id);
        let r = self.recovered_index();
        self.sets[r].insert(id);
    }

    /// Step 13, `spec.md` §4.5: every agent already in an exposed/infectious
    /// sub-state advances by one; the last infectious sub-state advances
    /// into Recovered (absorbing, P3); `newly_infected` occupies the first
    /// infected sub-state.
    pub fn advance(&mut self, newly_infected: HashSet<AgentId>) {
        let recovered = self.recovered_index();
        let last_infectious = *self.infectious_indices().end();
        for i in (self.first_infected_index()..=last_infectious).rev() {
            let moved = std::mem::take(&mut self.sets[i]);
            if i == last_infectious {
                self.sets[recovered].extend(moved);
            } else {
                self.sets[i + 1] = moved;
            }
        }
        self.sets[self.first_infected_index()] = newly_infected;
    }

    /// True once every exposed/infectious sub-state is empty (`spec.md` §4.5
    /// step 3, and P8): the epidemic has run its course and every
    /// subsequent round reports zero new infections.
    pub fn is_extinguished(&self) -> bool {
        (self.exposed_indices().chain(self.infectious_indices())).all(|i| self.sets[i].is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_has_seven_states() {
        let sp = StatePartition::new(DiseaseProfile::Default, 0..10);
        assert_eq!(sp.num_states(), 7);
        assert_eq!(sp.recovered_index(), 6);
        assert_eq!(sp.exposed_indices(), 1..4);
        assert_eq!(sp.infectious_indices(), 4..=5);
    }

    #[test]
    fn short_incubation_has_four_states_and_no_exposed() {
        let sp = StatePartition::new(DiseaseProfile::ShortIncubation, 0..10);
        assert_eq!(sp.num_states(), 4);
        assert_eq!(sp.recovered_index(), 3);
        assert_eq!(sp.exposed_indices(), 1..1);
        assert_eq!(sp.infectious_indices(), 1..=2);
    }

    #[test]
    fn try_infect_is_first_writer_wins() {
        let mut sp = StatePartition::new(DiseaseProfile::Default, 0..3);
        assert!(sp.try_infect(0));
        assert!(!sp.try_infect(0));
    }

    #[test]
    fn advance_shifts_and_recovers() {
        let mut sp = StatePartition::new(DiseaseProfile::ShortIncubation, 0..5);
        sp.seed_at(0, 1); // I1
        sp.seed_at(1, 2); // I2
        sp.advance(HashSet::new());
        // 0: I1 -> I2, 1: I2 -> Recovered
        assert!(sp.is_recovered(1));
        assert!(!sp.is_susceptible(0));
        assert!(!sp.is_recovered(0));

        sp.advance(HashSet::new());
        assert!(sp.is_recovered(0));
    }

    #[test]
    fn newly_infected_enter_first_infected_substate() {
        let mut sp = StatePartition::new(DiseaseProfile::Default, 0..5);
        sp.try_infect(2);
        sp.advance(HashSet::from([2]));
        assert_eq!(sp.state_counts()[1], 1);
    }

    #[test]
    fn is_extinguished_true_when_no_exposed_or_infectious() {
        let sp = StatePartition::new(DiseaseProfile::Default, 0..5);
        assert!(sp.is_extinguished());
    }

    #[test]
    fn p1_state_counts_always_sum_to_population() {
        let mut sp = StatePartition::new(DiseaseProfile::Default, 0..20);
        assert_eq!(sp.state_counts().iter().sum::<usize>(), 20);
        sp.try_infect(3);
        sp.advance(HashSet::from([3]));
        assert_eq!(sp.state_counts().iter().sum::<usize>(), 20);
        sp.mark_immune(5);
        assert_eq!(sp.state_counts().iter().sum::<usize>(), 20);
    }

    #[test]
    fn second_infectious_substate_predicate() {
        let mut sp = StatePartition::new(DiseaseProfile::ShortIncubation, 0..5);
        sp.seed_at(0, 2); // I2 directly
        assert!(sp.is_in_second_infectious_substate(0));
        assert!(!sp.is_in_second_infectious_substate(1));
    }
}

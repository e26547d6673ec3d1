//! Bus classification into the index sets solvers consume.
//!
//! Every solver family partitions the buses the same way: slack buses hold
//! the angle reference, PV buses hold voltage magnitude, PQ buses hold
//! nothing. The partition is recomputed per island, because slicing a grid
//! can strand an island without its slack.

use serde::{Deserialize, Serialize};
use tracing::warn;
use volta_core::diagnostics::Diagnostics;
use volta_core::BusType;

/// Positional index sets over one bus frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationIndices {
    /// Buses with fixed P and Q.
    pub pq: Vec<usize>,
    /// Buses with fixed P and |V|.
    pub pv: Vec<usize>,
    /// Slack (reference) buses.
    pub vd: Vec<usize>,
    /// Union of pq and pv, ascending. The unknown-voltage buses.
    pub no_slack: Vec<usize>,
    /// The effective type per bus after any promotion.
    pub bus_types: Vec<BusType>,
}

impl SimulationIndices {
    /// Partition buses by type, repairing a missing reference.
    ///
    /// If no slack exists, the PV bus with the largest active-power
    /// injection is promoted (ties resolve to the lowest bus index). If
    /// there is no PV bus either, the island is a blackout: it keeps an
    /// empty `vd` and a warning is recorded.
    pub fn classify(
        bus_types: &[BusType],
        p_injection: &[f64],
        diag: &mut Diagnostics,
    ) -> Self {
        let mut types = bus_types.to_vec();
        let mut pq = Vec::new();
        let mut pv = Vec::new();
        let mut vd = Vec::new();
        for (i, t) in types.iter().enumerate() {
            match t {
                BusType::PQ => pq.push(i),
                BusType::PV => pv.push(i),
                BusType::Slack => vd.push(i),
            }
        }

        if vd.is_empty() {
            if let Some(&best) = pv.iter().max_by(|&&a, &&b| {
                p_injection[a]
                    .partial_cmp(&p_injection[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b.cmp(&a)) // ties favor the lowest index
            }) {
                warn!(bus = best, "no slack bus, promoting the largest PV bus");
                diag.add_warning(
                    "bus classification",
                    format!("no slack bus, promoted PV bus {best} to slack"),
                );
                pv.retain(|&i| i != best);
                vd.push(best);
                types[best] = BusType::Slack;
            } else {
                warn!("no slack and no PV buses, the grid is not solvable");
                diag.add_warning(
                    "bus classification",
                    "no slack and no PV buses (blackout)".to_string(),
                );
            }
        }

        let mut no_slack: Vec<usize> = pq.iter().chain(pv.iter()).copied().collect();
        no_slack.sort_unstable();

        Self {
            pq,
            pv,
            vd,
            no_slack,
            bus_types: types,
        }
    }

    pub fn nbus(&self) -> usize {
        self.bus_types.len()
    }

    /// True when the partition has a usable angle reference.
    pub fn has_slack(&self) -> bool {
        !self.vd.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_and_sorts_no_slack() {
        let types = vec![
            BusType::PV,
            BusType::PQ,
            BusType::Slack,
            BusType::PQ,
            BusType::PV,
        ];
        let p = vec![1.0, -0.5, 0.0, -0.3, 2.0];
        let mut diag = Diagnostics::default();
        let idx = SimulationIndices::classify(&types, &p, &mut diag);
        assert_eq!(idx.pq, vec![1, 3]);
        assert_eq!(idx.pv, vec![0, 4]);
        assert_eq!(idx.vd, vec![2]);
        assert_eq!(idx.no_slack, vec![0, 1, 3, 4]);
        assert!(diag.is_empty());
    }

    #[test]
    fn promotes_largest_pv_when_slack_is_missing() {
        let types = vec![BusType::PV, BusType::PQ, BusType::PV];
        let p = vec![5.0, -1.0, 8.0];
        let mut diag = Diagnostics::default();
        let idx = SimulationIndices::classify(&types, &p, &mut diag);
        assert_eq!(idx.vd, vec![2]);
        assert_eq!(idx.pv, vec![0]);
        assert_eq!(idx.bus_types[2], BusType::Slack);
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn promotion_tie_picks_lowest_index() {
        let types = vec![BusType::PV, BusType::PQ, BusType::PV];
        let p = vec![5.0, -1.0, 5.0];
        let mut diag = Diagnostics::default();
        let idx = SimulationIndices::classify(&types, &p, &mut diag);
        assert_eq!(idx.vd, vec![0]);
        assert_eq!(idx.pv, vec![2]);
    }

    #[test]
    fn all_pq_island_is_a_blackout_warning() {
        let types = vec![BusType::PQ, BusType::PQ];
        let p = vec![-1.0, -2.0];
        let mut diag = Diagnostics::default();
        let idx = SimulationIndices::classify(&types, &p, &mut diag);
        assert!(idx.vd.is_empty());
        assert!(!idx.has_slack());
        assert_eq!(idx.no_slack, vec![0, 1]);
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn classification_is_idempotent() {
        let types = vec![BusType::PV, BusType::PQ, BusType::PV];
        let p = vec![5.0, -1.0, 8.0];
        let mut diag = Diagnostics::default();
        let first = SimulationIndices::classify(&types, &p, &mut diag);
        let second = SimulationIndices::classify(&first.bus_types, &p, &mut diag);
        assert_eq!(first, second);
        // The second pass found a valid slack, so no second warning.
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn index_sets_round_trip_through_json() {
        let types = vec![BusType::Slack, BusType::PV, BusType::PQ];
        let p = vec![0.0, 1.0, -1.0];
        let mut diag = Diagnostics::default();
        let idx = SimulationIndices::classify(&types, &p, &mut diag);
        let json = serde_json::to_string(&idx).unwrap();
        let back: SimulationIndices = serde_json::from_str(&json).unwrap();
        assert_eq!(idx, back);
    }
}

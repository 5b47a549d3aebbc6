//! # Sani Marker Selection
//!
//! Decides which segments get a medical responder ("sani") after every segment has been
//! scored. This pass is strictly sequential: in race mode each decision depends on the
//! previous accepted marker.
//!
//! - **Tour**: every segment at or above the risk threshold is marked.
//! - **Race**: consecutive high-risk segments form a [`Cluster`]. Its lower-median segment is
//!   the candidate, accepted only if it is at least `min_spacing` segments after the last
//!   accepted marker. A rejected candidate is dropped with no fallback.

use crate::config::SelectorConfig;
use crate::rider::RaceType;
use crate::{RunMode, Segment};
use log::debug;
use serde::{Deserialize, Serialize};

impl RunMode {
    /// Any race discipline means race mode.
    pub fn for_race_type(race_type: Option<RaceType>) -> Self {
        match race_type {
            Some(_) => RunMode::Race,
            None => RunMode::Tour,
        }
    }
}

/// A maximal run of consecutive high-risk segments, `start..=end` by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub start: usize,
    pub end: usize,
}

impl Cluster {
    /// Number of segments in the run.
    pub fn size(&self) -> usize {
        self.end - self.start + 1
    }

    /// Middle position; the lower one for even lengths.
    pub fn median(&self) -> usize {
        self.start + (self.size() - 1) / 2
    }
}

/// Group positions whose risk is at least `threshold` into maximal runs.
pub fn find_clusters(risks: &[u8], threshold: u8) -> Vec<Cluster> {
    let mut clusters = Vec::new();
    let mut open: Option<usize> = None;

    for (i, &risk) in risks.iter().enumerate() {
        match (risk >= threshold, open) {
            (true, None) => open = Some(i),
            (false, Some(start)) => {
                clusters.push(Cluster { start, end: i - 1 });
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        clusters.push(Cluster {
            start,
            end: risks.len() - 1,
        });
    }
    clusters
}

/// State carried through the race-mode pass. Each run owns its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectorState {
    pub last_marked_index: Option<usize>,
}

impl SelectorState {
    /// Whether a candidate at `index` is far enough from the last marker.
    pub fn accepts(&self, index: usize, min_spacing: usize) -> bool {
        match self.last_marked_index {
            None => true,
            Some(last) => index >= last && index - last >= min_spacing,
        }
    }

    /// Consider one candidate. Returns the new state and whether it was accepted.
    pub fn step(self, candidate: usize, min_spacing: usize) -> (Self, bool) {
        if self.accepts(candidate, min_spacing) {
            (
                SelectorState {
                    last_marked_index: Some(candidate),
                },
                true,
            )
        } else {
            (self, false)
        }
    }
}

/// Positions to mark for the given risks.
pub fn marker_positions(risks: &[u8], mode: RunMode, config: &SelectorConfig) -> Vec<usize> {
    match mode {
        RunMode::Tour => risks
            .iter()
            .enumerate()
            .filter(|(_, r)| **r >= config.risk_threshold)
            .map(|(i, _)| i)
            .collect(),
        RunMode::Race => {
            let clusters = find_clusters(risks, config.risk_threshold);
            let (_, marked) = clusters.iter().fold(
                (SelectorState::default(), Vec::new()),
                |(state, mut marked), cluster| {
                    let candidate = cluster.median();
                    let (state, accepted) = state.step(candidate, config.min_spacing);
                    if accepted {
                        marked.push(candidate);
                    } else {
                        debug!(
                            "[SaniSelector] Suppressed candidate {} (cluster {}..={}), last marker {:?}",
                            candidate, cluster.start, cluster.end, state.last_marked_index
                        );
                    }
                    (state, marked)
                },
            );
            marked
        }
    }
}

/// Set `sani_needed` on the segments that get a marker. No other field is touched.
///
/// Returns the number of marked segments.
///
/// # Example
/// ```
/// use route_risk::selector::marker_positions;
/// use route_risk::{RunMode, SelectorConfig};
///
/// let mut risks = vec![1u8; 30];
/// for r in &mut risks[10..=16] {
///     *r = 4;
/// }
/// assert_eq!(marker_positions(&risks, RunMode::Race, &SelectorConfig::default()), vec![13]);
/// ```
pub fn select_sani_markers(segments: &mut [Segment], mode: RunMode, config: &SelectorConfig) -> usize {
    let risks: Vec<u8> = segments.iter().map(|s| s.risk).collect();
    let marked = marker_positions(&risks, mode, config);

    for s in segments.iter_mut() {
        s.sani_needed = false;
    }
    for &i in &marked {
        segments[i].sani_needed = true;
    }

    debug!(
        "[SaniSelector] {:?} mode: {} markers over {} segments",
        mode,
        marked.len(),
        segments.len()
    );
    marked.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race(risks: &[u8]) -> Vec<usize> {
        marker_positions(risks, RunMode::Race, &SelectorConfig::default())
    }

    fn with_runs(len: usize, runs: &[(usize, usize, u8)]) -> Vec<u8> {
        let mut risks = vec![1u8; len];
        for &(start, end, risk) in runs {
            for r in &mut risks[start..=end] {
                *r = risk;
            }
        }
        risks
    }

    #[test]
    fn test_find_clusters() {
        let risks = [1, 3, 4, 2, 5, 1, 3];
        assert_eq!(
            find_clusters(&risks, 3),
            vec![
                Cluster { start: 1, end: 2 },
                Cluster { start: 4, end: 4 },
                Cluster { start: 6, end: 6 },
            ]
        );
        assert!(find_clusters(&[1, 2, 2], 3).is_empty());
        assert!(find_clusters(&[], 3).is_empty());
    }

    #[test]
    fn test_median_lower_for_even() {
        assert_eq!(Cluster { start: 4, end: 4 }.median(), 4);
        assert_eq!(Cluster { start: 10, end: 16 }.median(), 13);
        assert_eq!(Cluster { start: 10, end: 13 }.median(), 11);
    }

    #[test]
    fn test_single_cluster_marks_median() {
        assert_eq!(race(&with_runs(30, &[(10, 16, 4)])), vec![13]);
    }

    #[test]
    fn test_close_second_cluster_is_suppressed() {
        // Medians 11 and 14: 3 apart
        let risks = with_runs(30, &[(10, 12, 3), (14, 14, 4)]);
        assert_eq!(race(&risks), vec![11]);
    }

    #[test]
    fn test_suppressed_candidate_does_not_move_state() {
        // Medians 10, 13, 16: 13 is too close to 10, 16 is 6 past 10
        let risks = with_runs(30, &[(10, 10, 3), (13, 13, 3), (16, 16, 3)]);
        assert_eq!(race(&risks), vec![10, 16]);
    }

    #[test]
    fn test_spacing_of_exactly_min_is_accepted() {
        // Documented assumption: a distance equal to the minimum is enough
        let risks = with_runs(30, &[(10, 10, 3), (15, 15, 3)]);
        assert_eq!(race(&risks), vec![10, 15]);
        let risks = with_runs(30, &[(10, 10, 3), (14, 14, 3)]);
        assert_eq!(race(&risks), vec![10]);
    }

    #[test]
    fn test_tour_marks_every_high_risk() {
        let risks = [1, 3, 4, 2, 5, 1];
        let marked = marker_positions(&risks, RunMode::Tour, &SelectorConfig::default());
        assert_eq!(marked, vec![1, 2, 4]);
    }

    #[test]
    fn test_state_step() {
        let state = SelectorState::default();
        let (state, ok) = state.step(3, 5);
        assert!(ok);
        assert_eq!(state.last_marked_index, Some(3));
        let (state, ok) = state.step(6, 5);
        assert!(!ok);
        assert_eq!(state.last_marked_index, Some(3));
    }

    #[test]
    fn test_run_mode_for_race_type() {
        assert_eq!(RunMode::for_race_type(None), RunMode::Tour);
        assert_eq!(RunMode::for_race_type(Some(RaceType::Road)), RunMode::Race);
    }
}

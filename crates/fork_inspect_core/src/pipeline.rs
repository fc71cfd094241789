//! Caller-level policies layered over the pure resolver, decoder, and analyzer.
//!
//! The core components never retry or skip on their own; the choices made here
//! (encoding fallback, point salvage, gap handling) are driven by
//! [`InspectSettings`].

use serde::Serialize;

use crate::decode::decode;
use crate::error::{InspectError, Result};
use crate::layout::resolve;
use crate::orbit::{clv_directions, ClvDirection};
use crate::records::{BranchRecord, CovariantVectorsRecord, OrbitRecord, SystemRecord};
use crate::settings::{GapPolicy, InspectSettings};
use crate::subspace::checkpoint_angles;
use crate::types::{
    AngleSeries, CovariantVectorSet, LimitCycleProfile, MeshLayout, PartialLayout, StateEncoding,
    SubspaceSplit,
};

/// A decoded state together with the layout and encoding that explained it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedCycle {
    pub profile: LimitCycleProfile,
    pub layout: MeshLayout,
    pub encoding: StateEncoding,
}

/// A decoded continuation point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchCycle {
    pub index: usize,
    pub param_value: f64,
    #[serde(flatten)]
    pub cycle: DecodedCycle,
}

/// Resolves and decodes `state` under one encoding.
pub fn decode_as(state: &[f64], hint: &PartialLayout, encoding: StateEncoding) -> Result<DecodedCycle> {
    let layout = resolve(state.len(), hint, encoding)?;
    let profile = decode(state, &layout, encoding)?;
    Ok(DecodedCycle {
        profile,
        layout,
        encoding,
    })
}

/// Tries each configured encoding in turn, re-deriving the layout from scratch.
///
/// Only layout mismatches trigger the next encoding; the last error is returned
/// when none succeeds.
pub fn decode_with_fallback(
    state: &[f64],
    hint: &PartialLayout,
    settings: &InspectSettings,
) -> Result<DecodedCycle> {
    let mut last_err = None;
    for encoding in settings.encoding_order() {
        match decode_as(state, hint, encoding) {
            Ok(cycle) => return Ok(cycle),
            Err(err) if err.is_layout_mismatch() => {
                log::debug!(
                    "State of length {} does not fit the {} encoding: {err}",
                    state.len(),
                    encoding.label()
                );
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        InspectError::InvalidLayout("no state encoding configured".to_string())
    }))
}

/// Point indices a branch run visits: the chosen point, or every `stride`-th one.
pub fn select_points(point_count: usize, settings: &InspectSettings) -> Vec<usize> {
    match settings.point_index {
        Some(index) if index < point_count => vec![index],
        Some(_) => Vec::new(),
        None => (0..point_count)
            .step_by(settings.effective_stride())
            .collect(),
    }
}

fn branch_hint(
    branch: &BranchRecord,
    system: Option<&SystemRecord>,
    settings: &InspectSettings,
) -> Result<PartialLayout> {
    if !branch.is_limit_cycle() {
        return Err(InspectError::InvalidRecord(
            "branch is not a limit-cycle continuation".to_string(),
        ));
    }
    Ok(branch.layout_hint(system).merged_with(&settings.layout))
}

/// Decodes the selected point of a branch (the last point by default).
///
/// When the point cannot be explained by any encoding and salvage is enabled,
/// the first other point that decodes is returned instead.
pub fn decode_branch_point(
    branch: &BranchRecord,
    system: Option<&SystemRecord>,
    settings: &InspectSettings,
) -> Result<BranchCycle> {
    let hint = branch_hint(branch, system, settings)?;
    let points = branch.points();
    if points.is_empty() {
        return Err(InspectError::InvalidRecord("branch has no points".to_string()));
    }
    let index = settings.point_index.unwrap_or(points.len() - 1);
    let point = points.get(index).ok_or_else(|| {
        InspectError::InvalidRecord(format!(
            "point index {index} out of range [0, {}]",
            points.len() - 1
        ))
    })?;

    let err = match decode_with_fallback(&point.state, &hint, settings) {
        Ok(cycle) => {
            return Ok(BranchCycle {
                index,
                param_value: point.param_value,
                cycle,
            })
        }
        Err(err) => err,
    };
    if !(settings.salvage_short_points && err.is_layout_mismatch()) {
        return Err(err);
    }

    for (candidate_index, candidate) in points.iter().enumerate() {
        if candidate_index == index {
            continue;
        }
        if let Ok(cycle) = decode_with_fallback(&candidate.state, &hint, settings) {
            log::warn!("Point {index} failed to decode ({err}); using point {candidate_index} instead");
            return Ok(BranchCycle {
                index: candidate_index,
                param_value: candidate.param_value,
                cycle,
            });
        }
    }
    Err(err)
}

/// Decodes every `stride`-th point of a branch, skipping points that fail.
pub fn decode_branch(
    branch: &BranchRecord,
    system: Option<&SystemRecord>,
    settings: &InspectSettings,
) -> Result<Vec<BranchCycle>> {
    let hint = branch_hint(branch, system, settings)?;
    let points = branch.points();
    let mut cycles = Vec::new();
    for index in select_points(points.len(), settings) {
        let point = &points[index];
        match decode_with_fallback(&point.state, &hint, settings) {
            Ok(cycle) => cycles.push(BranchCycle {
                index,
                param_value: point.param_value,
                cycle,
            }),
            Err(err) => log::warn!("Skipping branch point {index}: {err}"),
        }
    }
    if cycles.is_empty() && !points.is_empty() {
        log::warn!("No limit cycles could be decoded from a branch of {} points", points.len());
    }
    Ok(cycles)
}

/// Minimal E^cu/E^ss angle per checkpoint under `policy`.
pub fn angle_series(
    set: &CovariantVectorSet,
    split: SubspaceSplit,
    policy: GapPolicy,
) -> Result<AngleSeries> {
    let mut series = AngleSeries::default();
    for (index, (outcome, checkpoint)) in checkpoint_angles(set, split)
        .into_iter()
        .zip(set.checkpoints())
        .enumerate()
    {
        match (outcome, policy) {
            (Ok(angle), _) => {
                series.times.push(checkpoint.time);
                series.angles_deg.push(angle);
            }
            (Err(err), GapPolicy::Abort) => {
                return Err(InspectError::Checkpoint {
                    index,
                    source: Box::new(err),
                })
            }
            (Err(err), GapPolicy::Skip) => {
                log::warn!("Leaving gap at checkpoint {index} (t = {}): {err}", checkpoint.time);
                series.gaps.push(index);
            }
        }
    }
    Ok(series)
}

/// Angle series for a loader record, using the split and gap policy from `settings`.
pub fn analyze_covariant_vectors(
    record: &CovariantVectorsRecord,
    settings: &InspectSettings,
) -> Result<(SubspaceSplit, AngleSeries)> {
    let set = record.to_vector_set()?;
    let split = match settings.subspace_dim {
        Some(leading) => SubspaceSplit::new(leading, set.dim())?,
        None => SubspaceSplit::default_for(set.dim())?,
    };
    let series = angle_series(&set, split, settings.gap_policy)?;
    Ok((split, series))
}

/// Checkpoints inside the configured window, strided. Open window ends take the
/// first and last checkpoint times.
pub fn window_checkpoints(set: &CovariantVectorSet, settings: &InspectSettings) -> Result<CovariantVectorSet> {
    let (first, last) = set
        .time_span()
        .ok_or_else(|| InspectError::InvalidRecord("no covariant vector checkpoints".to_string()))?;
    let start = settings.clv_window.start.unwrap_or(first);
    let end = settings.clv_window.end.unwrap_or(last);
    set.window(start, end, settings.clv_stride)
}

/// Unit directions of the configured CLVs over the window, anchored on the
/// interpolated orbit state when the orbit carries samples.
pub fn orbit_clv_directions(orbit: &OrbitRecord, settings: &InspectSettings) -> Result<Vec<ClvDirection>> {
    let set = window_checkpoints(&orbit.vector_set()?, settings)?;
    let trajectory = orbit.trajectory(set.dim())?;
    clv_directions(&set, trajectory.as_ref(), &settings.clv_vectors, settings.max_arrows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::records::ClvVectors;
    use crate::settings::TimeWindow;
    use crate::types::Checkpoint;
    use nalgebra::DMatrix;
    use serde_json::json;

    fn ramp(len: usize) -> Vec<f64> {
        let mut state: Vec<f64> = (0..len).map(|i| i as f64).collect();
        if let Some(last) = state.last_mut() {
            *last = 2.5;
        }
        state
    }

    #[test]
    fn fallback_switches_to_profile_encoding() {
        // (ntst*ncol + 1) * dim + 1 = 21 * 2 + 1 = 43 for ntst=5, ncol=4, dim=2.
        let state = ramp(43);
        let hint = PartialLayout::new(Some(5), Some(4), None);
        let cycle = decode_with_fallback(&state, &hint, &InspectSettings::default())
            .expect("profile encoding should explain the state");
        assert_eq!(cycle.encoding, StateEncoding::Profile);
        assert_eq!(cycle.layout, MeshLayout::new(5, 4, 2));
        assert_eq!(cycle.profile.len(), 22);
        assert_eq!(cycle.profile.period, 2.5);
    }

    #[test]
    fn primary_encoding_wins_when_it_fits() {
        let state = ramp(301);
        let cycle = decode_with_fallback(&state, &PartialLayout::default(), &InspectSettings::default())
            .expect("mesh-stage encoding should explain the state");
        assert_eq!(cycle.encoding, StateEncoding::MeshStage);
        assert_eq!(cycle.layout, MeshLayout::new(20, 4, 3));
    }

    #[test]
    fn disabled_fallback_reports_primary_error() {
        let state = ramp(43);
        let hint = PartialLayout::new(Some(5), Some(4), None);
        let settings = InspectSettings {
            fallback_encoding: None,
            ..InspectSettings::default()
        };
        let err = decode_with_fallback(&state, &hint, &settings).expect_err("mesh-stage cannot fit");
        assert_eq!(err.kind(), ErrorKind::InvalidLayout);
    }

    #[test]
    fn select_points_honours_index_and_stride() {
        let mut settings = InspectSettings {
            stride: 3,
            ..InspectSettings::default()
        };
        assert_eq!(select_points(8, &settings), vec![0, 3, 6]);
        settings.point_index = Some(5);
        assert_eq!(select_points(8, &settings), vec![5]);
        settings.point_index = Some(9);
        assert!(select_points(8, &settings).is_empty());
    }

    fn cycle_branch() -> BranchRecord {
        serde_json::from_value(json!({
            "type": "continuation",
            "branchType": "limit_cycle",
            "data": {
                "points": [
                    { "state": ramp(301), "param_value": 0.1 },
                    { "state": ramp(301), "param_value": 0.2 },
                    { "state": ramp(12), "param_value": 0.3 }
                ],
                "branch_type": { "type": "LimitCycle", "ntst": 20, "ncol": 4 }
            }
        }))
        .expect("branch should deserialize")
    }

    #[test]
    fn branch_point_salvages_a_decodable_point() {
        let branch = cycle_branch();
        let cycle = decode_branch_point(&branch, None, &InspectSettings::default())
            .expect("salvage should find a point");
        assert_eq!(cycle.index, 0);
        assert_eq!(cycle.param_value, 0.1);
        assert_eq!(cycle.cycle.layout, MeshLayout::new(20, 4, 3));

        let strict = InspectSettings {
            salvage_short_points: false,
            ..InspectSettings::default()
        };
        assert!(decode_branch_point(&branch, None, &strict).is_err());

        let chosen = InspectSettings {
            point_index: Some(1),
            ..InspectSettings::default()
        };
        let cycle = decode_branch_point(&branch, None, &chosen).expect("point 1 decodes");
        assert_eq!(cycle.index, 1);
    }

    #[test]
    fn branch_decode_skips_failing_points() {
        let branch = cycle_branch();
        let cycles = decode_branch(&branch, None, &InspectSettings::default())
            .expect("branch should decode");
        let indices: Vec<usize> = cycles.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert!(cycles.iter().all(|c| c.cycle.profile.is_closed()));
    }

    #[test]
    fn equilibrium_branch_is_rejected() {
        let branch: BranchRecord = serde_json::from_value(json!({
            "branchType": "equilibrium",
            "data": { "points": [{ "state": [1.0, 2.0], "param_value": 0.0 }] }
        }))
        .expect("branch should deserialize");
        let err = decode_branch(&branch, None, &InspectSettings::default()).expect_err("not a cycle");
        assert_eq!(err.kind(), ErrorKind::InvalidRecord);
    }

    fn mixed_set() -> CovariantVectorSet {
        let mut collapsed = DMatrix::identity(3, 3);
        collapsed.row_mut(2).fill(0.0);
        collapsed.row_mut(1).fill(0.0);
        CovariantVectorSet::new(
            3,
            vec![
                Checkpoint { time: 0.0, vectors: DMatrix::identity(3, 3) },
                Checkpoint { time: 0.5, vectors: collapsed },
                Checkpoint { time: 1.0, vectors: DMatrix::identity(3, 3) },
            ],
        )
        .expect("set should build")
    }

    #[test]
    fn abort_policy_surfaces_the_failing_checkpoint() {
        let split = SubspaceSplit::new(1, 3).expect("split should be valid");
        let err = angle_series(&mixed_set(), split, GapPolicy::Abort).expect_err("checkpoint 1 collapses");
        match err {
            InspectError::Checkpoint { index, ref source } => {
                assert_eq!(index, 1);
                assert!(matches!(**source, InspectError::DegenerateSubspace(_)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn skip_policy_records_gaps_without_fabricating_angles() {
        let split = SubspaceSplit::new(1, 3).expect("split should be valid");
        let series = angle_series(&mixed_set(), split, GapPolicy::Skip).expect("series should build");
        assert_eq!(series.times, vec![0.0, 1.0]);
        assert_eq!(series.gaps, vec![1]);
        assert_eq!(series.angles_deg.len(), 2);
        assert!(series.angles_deg.iter().all(|a| (a - 90.0).abs() < 1e-6));
    }

    #[test]
    fn record_analysis_uses_default_split() {
        let record = CovariantVectorsRecord {
            dim: Some(3),
            times: vec![0.0],
            vectors: ClvVectors::Nested(vec![vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![1.0, 1.0, 1.0],
            ]]),
        };
        let (split, series) = analyze_covariant_vectors(&record, &InspectSettings::default())
            .expect("analysis should succeed");
        assert_eq!(split.leading(), 2);
        // Angle between the xy-plane and (1, 1, 1) is atan(1 / sqrt(2)).
        let expected = (1.0_f64 / 2.0_f64.sqrt()).atan().to_degrees();
        assert!((series.angles_deg[0] - expected).abs() < 1e-9);

        let bad = InspectSettings {
            subspace_dim: Some(3),
            ..InspectSettings::default()
        };
        assert!(analyze_covariant_vectors(&record, &bad).is_err());
    }

    fn sampled_orbit() -> OrbitRecord {
        let block = json!([[2.0, 0.0, 0.0], [0.0, 0.0, 5.0], [0.0, 1.0, 0.0]]);
        let vectors = vec![block; 5];
        serde_json::from_value(json!({
            "type": "orbit",
            "data": [[0.0, 0.0, 0.0, 0.0], [4.0, 4.0, 8.0, 0.0]],
            "covariantVectors": {
                "dim": 3,
                "times": [0.0, 1.0, 2.0, 3.0, 4.0],
                "vectors": vectors
            }
        }))
        .expect("orbit should deserialize")
    }

    #[test]
    fn window_defaults_to_the_full_span() {
        let set = sampled_orbit().vector_set().expect("vector set should build");
        let all = window_checkpoints(&set, &InspectSettings::default()).expect("window covers everything");
        assert_eq!(all.len(), 5);

        let settings = InspectSettings {
            clv_window: TimeWindow { start: Some(1.0), end: None },
            clv_stride: 2,
            ..InspectSettings::default()
        };
        let windowed = window_checkpoints(&set, &settings).expect("window has checkpoints");
        let times: Vec<f64> = windowed.checkpoints().iter().map(|c| c.time).collect();
        assert_eq!(times, vec![1.0, 3.0]);
    }

    #[test]
    fn orbit_directions_follow_window_and_selection() {
        let settings = InspectSettings {
            clv_window: TimeWindow { start: Some(1.0), end: Some(3.0) },
            clv_vectors: vec![0, 1],
            ..InspectSettings::default()
        };
        let directions = orbit_clv_directions(&sampled_orbit(), &settings).expect("directions should sample");
        assert_eq!(directions.len(), 6);
        assert_eq!(directions[0].time, 1.0);
        assert_eq!(directions[0].direction, vec![1.0, 0.0, 0.0]);
        assert_eq!(directions[1].direction, vec![0.0, 0.0, 1.0]);
        assert_eq!(directions[0].base, Some(vec![1.0, 2.0, 0.0]));

        let inverted = InspectSettings {
            clv_window: TimeWindow { start: Some(3.0), end: Some(1.0) },
            ..InspectSettings::default()
        };
        let err = orbit_clv_directions(&sampled_orbit(), &inverted).expect_err("window is inverted");
        assert_eq!(err.kind(), ErrorKind::InvalidRecord);
    }
}

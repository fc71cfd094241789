//! Sampled orbits and unit CLV directions anchored along them.

use serde::Serialize;

use crate::error::{InspectError, Result};
use crate::types::CovariantVectorSet;

/// Default cap on the number of directions sampled from one dataset.
pub const DEFAULT_MAX_ARROWS: usize = 150;

/// Orbit samples: `states[i]` at `times[i]`, times non-decreasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Vec<Vec<f64>>,
}

impl Trajectory {
    pub fn new(times: Vec<f64>, states: Vec<Vec<f64>>) -> Result<Self> {
        if times.is_empty() || times.len() != states.len() {
            return Err(InspectError::InvalidRecord(format!(
                "orbit needs matching non-empty times and states, got {} and {}",
                times.len(),
                states.len()
            )));
        }
        if times.windows(2).any(|pair| !(pair[0] <= pair[1])) {
            return Err(InspectError::InvalidRecord(
                "orbit times must be non-decreasing".to_string(),
            ));
        }
        let width = states[0].len();
        if let Some(idx) = states.iter().position(|state| state.len() != width) {
            return Err(InspectError::InvalidRecord(format!(
                "orbit sample {idx} has {} components, expected {width}",
                states[idx].len()
            )));
        }
        Ok(Self { times, states })
    }

    /// Rows of `[t, x_0, .., x_{dim-1}, ..]`. Columns past the state are dropped.
    pub fn from_rows(rows: &[Vec<f64>], dim: usize) -> Result<Self> {
        let mut times = Vec::with_capacity(rows.len());
        let mut states = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            if row.len() < dim + 1 {
                return Err(InspectError::InvalidRecord(format!(
                    "orbit row {idx} has {} entries, need time plus {dim} state components",
                    row.len()
                )));
            }
            times.push(row[0]);
            states.push(row[1..=dim].to_vec());
        }
        Self::new(times, states)
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn states(&self) -> &[Vec<f64>] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Interpolated state at `t`, clamped to the sampled range.
    pub fn state_at(&self, t: f64) -> Vec<f64> {
        interpolate_state(&self.times, &self.states, t).unwrap_or_default()
    }
}

/// Linear interpolation of `states` at `t`, clamped to the first and last sample.
///
/// `times` must be sorted. Returns `None` when there are no samples.
pub fn interpolate_state(times: &[f64], states: &[Vec<f64>], t: f64) -> Option<Vec<f64>> {
    let n = times.len().min(states.len());
    if n == 0 {
        return None;
    }
    if t <= times[0] {
        return Some(states[0].clone());
    }
    if t >= times[n - 1] {
        return Some(states[n - 1].clone());
    }
    // First sample at or after `t`; the clamps above keep it in 1..n.
    let idx = times[..n].partition_point(|&sample| sample < t);
    let (t0, t1) = (times[idx - 1], times[idx]);
    let weight = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
    Some(
        states[idx - 1]
            .iter()
            .zip(&states[idx])
            .map(|(a, b)| (1.0 - weight) * a + weight * b)
            .collect(),
    )
}

/// A unit covariant vector at one checkpoint, optionally anchored on the orbit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClvDirection {
    /// Position within the checkpoints the directions were sampled from.
    pub checkpoint: usize,
    pub time: f64,
    pub vector_index: usize,
    pub base: Option<Vec<f64>>,
    pub direction: Vec<f64>,
}

/// Unit directions of the chosen CLVs at every checkpoint of `set`.
///
/// Out-of-range indices are ignored. When `checkpoints * indices` exceeds
/// `max_arrows`, only the leading `max(1, max_arrows / indices)` checkpoints are
/// kept. Zero vectors have no direction and are left out.
pub fn clv_directions(
    set: &CovariantVectorSet,
    trajectory: Option<&Trajectory>,
    vector_indices: &[usize],
    max_arrows: usize,
) -> Result<Vec<ClvDirection>> {
    let mut indices: Vec<usize> = vector_indices.to_vec();
    indices.sort_unstable();
    indices.dedup();
    let (indices, ignored): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&idx| idx < set.dim());
    if !ignored.is_empty() {
        log::warn!("Ignoring vector indices {ignored:?} outside dimension {}", set.dim());
    }
    if indices.is_empty() {
        return Err(InspectError::InvalidRecord(format!(
            "no vector index below dimension {} was requested",
            set.dim()
        )));
    }

    let mut checkpoint_count = set.len();
    let requested = checkpoint_count * indices.len();
    if requested > max_arrows {
        checkpoint_count = (max_arrows / indices.len()).max(1);
        log::warn!("Requested {requested} directions, keeping the first {checkpoint_count} checkpoints");
    }

    let mut directions = Vec::with_capacity(checkpoint_count * indices.len());
    for (position, checkpoint) in set.checkpoints().iter().take(checkpoint_count).enumerate() {
        let base = trajectory.map(|orbit| orbit.state_at(checkpoint.time));
        for &vector_index in &indices {
            let vector = checkpoint.vectors.row(vector_index);
            let norm = vector.norm();
            if !(norm > 0.0 && norm.is_finite()) {
                log::debug!("CLV {vector_index} at t = {} has no direction", checkpoint.time);
                continue;
            }
            directions.push(ClvDirection {
                checkpoint: position,
                time: checkpoint.time,
                vector_index,
                base: base.clone(),
                direction: vector.iter().map(|component| component / norm).collect(),
            });
        }
    }
    Ok(directions)
}

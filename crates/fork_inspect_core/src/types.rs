//! Value types shared by the decoding and subspace pipelines.
//!
//! Every type here is produced fresh per analysis call; none of them hold
//! references back into loader records.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{InspectError, Result};

/// How a limit-cycle continuation point packs its collocation unknowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum StateEncoding {
    /// `[mesh_0 .. mesh_{ntst-1}, stage_0 .. stage_{ntst*ncol-1}, period]`
    MeshStage,
    /// `[point_0 .. point_{ntst*ncol}, period]`
    Profile,
}

impl StateEncoding {
    pub fn label(self) -> &'static str {
        match self {
            StateEncoding::MeshStage => "mesh_stage",
            StateEncoding::Profile => "profile",
        }
    }

    /// Parses the labels used by settings files and the wasm bridge.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "mesh_stage" | "mesh+stage" | "meshstage" => Some(StateEncoding::MeshStage),
            "profile" => Some(StateEncoding::Profile),
            _ => None,
        }
    }

    /// The other encoding, used by the fallback policy.
    pub fn alternate(self) -> Self {
        match self {
            StateEncoding::MeshStage => StateEncoding::Profile,
            StateEncoding::Profile => StateEncoding::MeshStage,
        }
    }
}

impl TryFrom<String> for StateEncoding {
    type Error = String;

    fn try_from(label: String) -> std::result::Result<Self, Self::Error> {
        StateEncoding::from_label(&label)
            .ok_or_else(|| format!("unknown state encoding \"{label}\""))
    }
}

/// Collocation mesh geometry: `ntst` intervals of degree `ncol` in a `dim`-dimensional
/// phase space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshLayout {
    pub ntst: usize,
    pub ncol: usize,
    pub dim: usize,
}

impl MeshLayout {
    pub fn new(ntst: usize, ncol: usize, dim: usize) -> Self {
        Self { ntst, ncol, dim }
    }

    /// Number of samples the encoding stores, before the profile is closed.
    pub fn point_count(&self, encoding: StateEncoding) -> usize {
        let stages = self.ntst.saturating_mul(self.ncol);
        match encoding {
            StateEncoding::MeshStage => self.ntst.saturating_add(stages),
            StateEncoding::Profile => stages.saturating_add(1),
        }
    }

    /// Flat state length this layout implies, including the trailing period.
    ///
    /// Saturates instead of overflowing so an absurd hint simply fails to match.
    pub fn required_length(&self, encoding: StateEncoding) -> usize {
        self.point_count(encoding)
            .saturating_mul(self.dim)
            .saturating_add(1)
    }

    pub fn is_positive(&self) -> bool {
        self.ntst > 0 && self.ncol > 0 && self.dim > 0
    }
}

/// Whatever subset of layout metadata a record carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialLayout {
    pub ntst: Option<usize>,
    pub ncol: Option<usize>,
    pub dim: Option<usize>,
}

impl PartialLayout {
    pub fn new(ntst: Option<usize>, ncol: Option<usize>, dim: Option<usize>) -> Self {
        Self { ntst, ncol, dim }
    }

    pub fn is_empty(&self) -> bool {
        self.ntst.is_none() && self.ncol.is_none() && self.dim.is_none()
    }

    pub fn complete(&self) -> Option<MeshLayout> {
        match (self.ntst, self.ncol, self.dim) {
            (Some(ntst), Some(ncol), Some(dim)) => Some(MeshLayout::new(ntst, ncol, dim)),
            _ => None,
        }
    }

    /// Fields set on `overrides` win over the ones stored here.
    pub fn merged_with(&self, overrides: &PartialLayout) -> PartialLayout {
        PartialLayout {
            ntst: overrides.ntst.or(self.ntst),
            ncol: overrides.ncol.or(self.ncol),
            dim: overrides.dim.or(self.dim),
        }
    }
}

impl From<MeshLayout> for PartialLayout {
    fn from(layout: MeshLayout) -> Self {
        PartialLayout::new(Some(layout.ntst), Some(layout.ncol), Some(layout.dim))
    }
}

/// One traversal of a limit cycle. The last point always repeats the first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitCycleProfile {
    pub dim: usize,
    pub points: Vec<Vec<f64>>,
    pub period: f64,
}

impl LimitCycleProfile {
    /// Builds a closed profile from open samples. `samples` must be non-empty.
    pub(crate) fn closed(dim: usize, mut samples: Vec<Vec<f64>>, period: f64) -> Self {
        if let Some(first) = samples.first().cloned() {
            samples.push(first);
        }
        Self {
            dim,
            points: samples,
            period,
        }
    }

    /// Number of points including the closing duplicate.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points before closing.
    pub fn samples(&self) -> &[Vec<f64>] {
        match self.points.len() {
            0 => &[],
            n => &self.points[..n - 1],
        }
    }

    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => self.points.len() > 1 && first == last,
            _ => false,
        }
    }

    /// One coordinate across every point, or `None` if `axis` is out of range.
    pub fn component(&self, axis: usize) -> Option<Vec<f64>> {
        if axis >= self.dim {
            return None;
        }
        Some(self.points.iter().map(|p| p[axis]).collect())
    }
}

/// Index splitting covariant vectors into a leading (E^cu) and trailing (E^ss) block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubspaceSplit(usize);

impl SubspaceSplit {
    pub fn new(leading: usize, dim: usize) -> Result<Self> {
        if leading == 0 || leading >= dim {
            return Err(InspectError::InvalidRecord(format!(
                "E^cu dimension must be between 1 and {}, got {leading}",
                dim.saturating_sub(1)
            )));
        }
        Ok(Self(leading))
    }

    /// `min(2, dim - 1)`; requires `dim >= 2`.
    pub fn default_for(dim: usize) -> Result<Self> {
        Self::new(2.min(dim.saturating_sub(1)), dim)
    }

    pub fn leading(self) -> usize {
        self.0
    }

    /// Number of trailing vectors in dimension `dim`, or `None` if the split leaves none.
    pub fn trailing(self, dim: usize) -> Option<usize> {
        dim.checked_sub(self.0).filter(|&count| count > 0)
    }
}

/// Covariant vectors at one instant. Row `i` of `vectors` is the `i`-th CLV.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub time: f64,
    pub vectors: DMatrix<f64>,
}

/// CLVs over a trajectory window, all sharing one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariantVectorSet {
    dim: usize,
    checkpoints: Vec<Checkpoint>,
}

impl CovariantVectorSet {
    pub fn new(dim: usize, checkpoints: Vec<Checkpoint>) -> Result<Self> {
        if dim < 2 {
            return Err(InspectError::InvalidRecord(format!(
                "covariant vectors need dimension >= 2 to split, got {dim}"
            )));
        }
        let mut previous = f64::NEG_INFINITY;
        for (idx, checkpoint) in checkpoints.iter().enumerate() {
            if checkpoint.vectors.nrows() != dim || checkpoint.vectors.ncols() != dim {
                return Err(InspectError::InvalidRecord(format!(
                    "checkpoint {idx} holds a {}x{} matrix, expected {dim}x{dim}",
                    checkpoint.vectors.nrows(),
                    checkpoint.vectors.ncols()
                )));
            }
            if checkpoint.time < previous {
                return Err(InspectError::InvalidRecord(format!(
                    "checkpoint times must be non-decreasing (t[{idx}] = {} < {previous})",
                    checkpoint.time
                )));
            }
            previous = checkpoint.time;
        }
        Ok(Self { dim, checkpoints })
    }

    /// Reads the CLV runner's flat output: `times.len()` row-major `dim x dim` blocks
    /// whose columns are the covariant vectors. The vectors become rows here.
    pub fn from_flat(dim: usize, times: &[f64], vectors: &[f64]) -> Result<Self> {
        let block = dim * dim;
        if block == 0 || vectors.len() != times.len() * block {
            return Err(InspectError::InvalidRecord(format!(
                "expected {} vector entries for {} checkpoints of dimension {dim}, got {}",
                times.len() * block,
                times.len(),
                vectors.len()
            )));
        }
        let checkpoints = times
            .iter()
            .zip(vectors.chunks_exact(block))
            .map(|(&time, chunk)| Checkpoint {
                time,
                vectors: DMatrix::from_column_slice(dim, dim, chunk),
            })
            .collect();
        Self::new(dim, checkpoints)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Times of the first and last checkpoint.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        Some((self.checkpoints.first()?.time, self.checkpoints.last()?.time))
    }

    /// Checkpoints with `t_start <= time <= t_end`, keeping every `stride`-th one.
    /// Zero stride is treated as one. An inverted or empty window is an error.
    pub fn window(&self, t_start: f64, t_end: f64, stride: usize) -> Result<Self> {
        if !(t_start <= t_end) {
            return Err(InspectError::InvalidRecord(format!(
                "window end {t_end} precedes start {t_start}"
            )));
        }
        let checkpoints: Vec<Checkpoint> = self
            .checkpoints
            .iter()
            .filter(|checkpoint| checkpoint.time >= t_start && checkpoint.time <= t_end)
            .step_by(stride.max(1))
            .cloned()
            .collect();
        if checkpoints.is_empty() {
            return Err(InspectError::InvalidRecord(format!(
                "no checkpoints in the window [{t_start}, {t_end}]"
            )));
        }
        Ok(Self {
            dim: self.dim,
            checkpoints,
        })
    }
}

/// Minimal E^cu/E^ss angles over time. `gaps` lists checkpoints that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AngleSeries {
    pub times: Vec<f64>,
    pub angles_deg: Vec<f64>,
    pub gaps: Vec<usize>,
}

impl AngleSeries {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

//! Record shapes handed over by the data loader.
//!
//! Branch metadata has changed shape over time: mesh parameters may sit in an
//! internally tagged `branch_type`, an externally tagged one, or a separate
//! `limitCycleMeta` block. All of them reduce to a [`PartialLayout`].

use nalgebra::DMatrix;
use serde::de::IgnoredAny;
use serde::Deserialize;

use crate::error::{InspectError, Result};
use crate::orbit::Trajectory;
use crate::types::{Checkpoint, CovariantVectorSet, PartialLayout};

/// States longer than this are treated as limit cycles when a branch declares nothing.
pub const UNDECLARED_CYCLE_MIN_STATE: usize = 20;

/// CLV matrices in either stored shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClvVectors {
    /// One nested matrix per checkpoint, one vector per row.
    Nested(Vec<Vec<Vec<f64>>>),
    /// The CLV runner's output: row-major blocks back to back, vectors in columns.
    Flat(Vec<f64>),
}

impl Default for ClvVectors {
    fn default() -> Self {
        ClvVectors::Nested(Vec::new())
    }
}

/// CLVs as stored on an orbit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CovariantVectorsRecord {
    #[serde(default, alias = "dimension")]
    pub dim: Option<usize>,
    #[serde(default)]
    pub times: Vec<f64>,
    #[serde(default)]
    pub vectors: ClvVectors,
}

impl CovariantVectorsRecord {
    /// Dimension as declared, else the row count of the first nested matrix.
    pub fn dimension(&self) -> Option<usize> {
        self.dim.or_else(|| match &self.vectors {
            ClvVectors::Nested(matrices) => matrices.first().map(|matrix| matrix.len()),
            ClvVectors::Flat(_) => None,
        })
    }

    pub fn to_vector_set(&self) -> Result<CovariantVectorSet> {
        let dim = self
            .dimension()
            .ok_or_else(|| InspectError::InvalidRecord("covariant vector record is empty".into()))?;
        let matrices = match &self.vectors {
            ClvVectors::Flat(values) => return CovariantVectorSet::from_flat(dim, &self.times, values),
            ClvVectors::Nested(matrices) => matrices,
        };
        if self.times.len() != matrices.len() {
            return Err(InspectError::InvalidRecord(format!(
                "{} times for {} checkpoints",
                self.times.len(),
                matrices.len()
            )));
        }

        let mut checkpoints = Vec::with_capacity(matrices.len());
        for (idx, (matrix, &time)) in matrices.iter().zip(&self.times).enumerate() {
            if matrix.len() != dim || matrix.iter().any(|row| row.len() != dim) {
                return Err(InspectError::InvalidRecord(format!(
                    "checkpoint {idx} is not a {dim}x{dim} matrix"
                )));
            }
            checkpoints.push(Checkpoint {
                time,
                vectors: DMatrix::from_fn(dim, dim, |i, j| matrix[i][j]),
            });
        }
        CovariantVectorSet::new(dim, checkpoints)
    }
}

/// An orbit object: sampled rows `[t, x_0, .., x_{dim-1}, ..]` plus optional CLVs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrbitRecord {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Vec<Vec<f64>>,
    #[serde(rename = "covariantVectors", default)]
    pub covariant_vectors: Option<CovariantVectorsRecord>,
}

impl OrbitRecord {
    /// The sampled orbit restricted to `dim` state columns, or `None` if no rows were stored.
    pub fn trajectory(&self, dim: usize) -> Result<Option<Trajectory>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        Trajectory::from_rows(&self.data, dim).map(Some)
    }

    pub fn vector_set(&self) -> Result<CovariantVectorSet> {
        if let Some(kind) = self.kind.as_deref() {
            if kind != "orbit" {
                return Err(InspectError::InvalidRecord(format!(
                    "expected an orbit object, got \"{kind}\""
                )));
            }
        }
        self.covariant_vectors
            .as_ref()
            .ok_or_else(|| InspectError::InvalidRecord("orbit has no covariant vectors".into()))?
            .to_vector_set()
    }
}

/// System metadata, used for the phase-space dimension.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemRecord {
    #[serde(default)]
    pub dim: Option<usize>,
    #[serde(rename = "varNames", default)]
    pub var_names: Vec<String>,
}

impl SystemRecord {
    pub fn dimension(&self) -> Option<usize> {
        match self.dim {
            Some(dim) if dim > 0 => Some(dim),
            _ if !self.var_names.is_empty() => Some(self.var_names.len()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchPoint {
    pub state: Vec<f64>,
    #[serde(default)]
    pub param_value: f64,
}

/// `{ "type": "LimitCycle", "ntst": .., "ncol": .. }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum TaggedBranchType {
    Equilibrium,
    LimitCycle {
        #[serde(default)]
        ntst: usize,
        #[serde(default)]
        ncol: usize,
    },
    #[serde(other)]
    Other,
}

/// `{ "LimitCycle": { "ntst": .., "ncol": .. } }` or `"Equilibrium"`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum KeyedBranchType {
    Equilibrium,
    LimitCycle {
        #[serde(default)]
        ntst: usize,
        #[serde(default)]
        ncol: usize,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BranchTypeRecord {
    Tagged(TaggedBranchType),
    Keyed(KeyedBranchType),
    Unrecognized(IgnoredAny),
}

impl BranchTypeRecord {
    /// `Some((ntst, ncol))` for limit-cycle branches, `None` otherwise.
    fn limit_cycle_mesh(&self) -> Option<(usize, usize)> {
        match self {
            BranchTypeRecord::Tagged(TaggedBranchType::LimitCycle { ntst, ncol })
            | BranchTypeRecord::Keyed(KeyedBranchType::LimitCycle { ntst, ncol }) => {
                Some((*ntst, *ncol))
            }
            _ => None,
        }
    }

    fn is_declared(&self) -> bool {
        !matches!(self, BranchTypeRecord::Unrecognized(_))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitCycleMeta {
    #[serde(rename = "meshPoints", default)]
    pub mesh_points: Option<usize>,
    #[serde(default)]
    pub degree: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchData {
    #[serde(default)]
    pub points: Vec<BranchPoint>,
    #[serde(default)]
    pub branch_type: Option<BranchTypeRecord>,
}

/// A continuation branch object.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchRecord {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(rename = "branchType", default)]
    pub branch_kind: Option<String>,
    #[serde(rename = "parameterName", default)]
    pub parameter_name: Option<String>,
    #[serde(rename = "limitCycleMeta", default)]
    pub limit_cycle_meta: Option<LimitCycleMeta>,
    pub data: BranchData,
}

impl BranchRecord {
    pub fn points(&self) -> &[BranchPoint] {
        &self.data.points
    }

    /// Name of the continuation parameter, `"param"` when the record omits it.
    pub fn parameter_label(&self) -> &str {
        self.parameter_name.as_deref().unwrap_or("param")
    }

    /// Mesh metadata in whichever shape the record carries. Zero counts are absent.
    pub fn layout_hint(&self, system: Option<&SystemRecord>) -> PartialLayout {
        let positive = |value: usize| (value > 0).then_some(value);
        let (ntst, ncol) = match self
            .data
            .branch_type
            .as_ref()
            .and_then(BranchTypeRecord::limit_cycle_mesh)
        {
            Some((ntst, ncol)) if ntst > 0 || ncol > 0 => (positive(ntst), positive(ncol)),
            _ => match &self.limit_cycle_meta {
                Some(meta) => (
                    meta.mesh_points.and_then(positive),
                    meta.degree.and_then(positive),
                ),
                None => (None, None),
            },
        };
        PartialLayout::new(ntst, ncol, system.and_then(SystemRecord::dimension))
    }

    pub fn is_limit_cycle(&self) -> bool {
        if let Some(kind) = self.branch_kind.as_deref() {
            if kind == "limit_cycle" {
                return true;
            }
        }
        match &self.data.branch_type {
            Some(branch_type) if branch_type.is_declared() => {
                branch_type.limit_cycle_mesh().is_some()
            }
            _ if self.branch_kind.is_some() => false,
            _ => self
                .data
                .points
                .first()
                .map_or(false, |point| point.state.len() > UNDECLARED_CYCLE_MIN_STATE),
        }
    }
}

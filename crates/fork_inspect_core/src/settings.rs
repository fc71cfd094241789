//! Caller-supplied choices that the inspection scripts used to prompt for.

use serde::{Deserialize, Serialize};

use crate::orbit::DEFAULT_MAX_ARROWS;
use crate::types::{PartialLayout, StateEncoding};

/// Time bounds for CLV sampling. Unset ends default to the first and last checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeWindow {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// What to do with checkpoints whose subspaces collapse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Fail the whole series at the first degenerate checkpoint.
    #[default]
    Abort,
    /// Leave the checkpoint out and record its index in the series gaps.
    Skip,
}

/// Settings for decoding branches and analyzing CLV datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectSettings {
    /// Continuation point to decode; the last point when unset.
    pub point_index: Option<usize>,
    /// Decode every `stride`-th point of a branch. Zero is treated as one.
    pub stride: usize,
    /// Mesh fields that override whatever the branch metadata declares.
    pub layout: PartialLayout,
    pub primary_encoding: StateEncoding,
    /// Encoding retried when the primary cannot explain a state. `None` disables the retry.
    pub fallback_encoding: Option<StateEncoding>,
    /// Decode another point of the branch when the selected one is too short.
    pub salvage_short_points: bool,
    /// Number of leading CLVs spanning E^cu; `min(2, dim - 1)` when unset.
    pub subspace_dim: Option<usize>,
    pub gap_policy: GapPolicy,
    pub clv_window: TimeWindow,
    /// Keep every `clv_stride`-th checkpoint inside the window. Zero is treated as one.
    pub clv_stride: usize,
    /// Which CLVs to sample directions for, by row index.
    pub clv_vectors: Vec<usize>,
    /// Cap on the total number of sampled directions.
    pub max_arrows: usize,
}

impl Default for InspectSettings {
    fn default() -> Self {
        Self {
            point_index: None,
            stride: 1,
            layout: PartialLayout::default(),
            primary_encoding: StateEncoding::MeshStage,
            fallback_encoding: Some(StateEncoding::Profile),
            salvage_short_points: true,
            subspace_dim: None,
            gap_policy: GapPolicy::Abort,
            clv_window: TimeWindow::default(),
            clv_stride: 1,
            clv_vectors: vec![0],
            max_arrows: DEFAULT_MAX_ARROWS,
        }
    }
}

impl InspectSettings {
    pub fn effective_stride(&self) -> usize {
        self.stride.max(1)
    }

    /// Encodings to try, in order, without repeats.
    pub fn encoding_order(&self) -> Vec<StateEncoding> {
        let mut order = vec![self.primary_encoding];
        if let Some(fallback) = self.fallback_encoding {
            if fallback != self.primary_encoding {
                order.push(fallback);
            }
        }
        order
    }
}

//! Serializable payloads handed back to JavaScript, plus error formatting.

use fork_inspect_core::pipeline::{BranchCycle, DecodedCycle};
use fork_inspect_core::{
    AngleSeries, ClvDirection, ErrorKind, InspectError, MeshLayout, StateEncoding, SubspaceSplit,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct CyclePayload {
    pub(crate) index: Option<usize>,
    pub(crate) parameter_name: Option<String>,
    pub(crate) param_value: Option<f64>,
    pub(crate) points: Vec<Vec<f64>>,
    pub(crate) period: f64,
    pub(crate) layout: MeshLayout,
    pub(crate) encoding: StateEncoding,
}

impl From<DecodedCycle> for CyclePayload {
    fn from(cycle: DecodedCycle) -> Self {
        CyclePayload {
            index: None,
            parameter_name: None,
            param_value: None,
            points: cycle.profile.points,
            period: cycle.profile.period,
            layout: cycle.layout,
            encoding: cycle.encoding,
        }
    }
}

impl CyclePayload {
    pub(crate) fn for_branch(branch_cycle: BranchCycle, parameter_name: &str) -> Self {
        CyclePayload {
            index: Some(branch_cycle.index),
            parameter_name: Some(parameter_name.to_string()),
            param_value: Some(branch_cycle.param_value),
            ..CyclePayload::from(branch_cycle.cycle)
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AngleSeriesPayload {
    pub(crate) split: usize,
    pub(crate) times: Vec<f64>,
    pub(crate) angles: Vec<f64>,
    pub(crate) gaps: Vec<usize>,
}

impl AngleSeriesPayload {
    pub(crate) fn new(split: SubspaceSplit, series: AngleSeries) -> Self {
        AngleSeriesPayload {
            split: split.leading(),
            times: series.times,
            angles: series.angles_deg,
            gaps: series.gaps,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DirectionsPayload {
    pub(crate) count: usize,
    pub(crate) directions: Vec<ClvDirection>,
}

impl From<Vec<ClvDirection>> for DirectionsPayload {
    fn from(directions: Vec<ClvDirection>) -> Self {
        DirectionsPayload {
            count: directions.len(),
            directions,
        }
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidLayout => "InvalidLayout",
        ErrorKind::AmbiguousLayout => "AmbiguousLayout",
        ErrorKind::ShortState => "ShortState",
        ErrorKind::DegenerateSubspace => "DegenerateSubspace",
        ErrorKind::InvalidRecord => "InvalidRecord",
    }
}

/// `"<Kind>: <message>"`, so the UI can branch on the prefix.
pub(crate) fn describe_error(err: &InspectError) -> String {
    format!("{}: {}", kind_label(err.kind()), err)
}

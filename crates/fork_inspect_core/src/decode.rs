//! Reconstruction of limit-cycle profiles from flat collocation states.

use crate::error::{InspectError, Result};
use crate::layout::required_length;
use crate::types::{LimitCycleProfile, MeshLayout, StateEncoding};

/// Decodes one continuation point into a closed profile along the cycle.
///
/// Mesh+stage states are stored block by block; the decoded points are
/// interleaved back into their order along the orbit. The period is read from the
/// entry right after the point blocks and is not checked for plausibility.
pub fn decode(state: &[f64], layout: &MeshLayout, encoding: StateEncoding) -> Result<LimitCycleProfile> {
    if !layout.is_positive() {
        return Err(InspectError::InvalidLayout(format!(
            "layout {layout:?} has a zero count"
        )));
    }
    let required = required_length(layout, encoding);
    if state.len() < required {
        return Err(InspectError::ShortState {
            required,
            actual: state.len(),
        });
    }

    let dim = layout.dim;
    let samples = match encoding {
        StateEncoding::Profile => split_points(&state[..required - 1], dim),
        StateEncoding::MeshStage => {
            let mesh_len = layout.ntst * dim;
            let mesh = split_points(&state[..mesh_len], dim);
            let stages = split_points(&state[mesh_len..required - 1], dim);
            interleave(mesh, stages, layout.ncol)
        }
    };

    let period = state[required - 1];
    if !(period.is_finite() && period > 0.0) {
        log::warn!("Decoded limit cycle has non-positive period {period}");
    }
    if state.len() > required {
        log::debug!(
            "Ignoring {} trailing entries beyond the {} encoding",
            state.len() - required,
            encoding.label()
        );
    }

    Ok(LimitCycleProfile::closed(dim, samples, period))
}

fn split_points(data: &[f64], dim: usize) -> Vec<Vec<f64>> {
    data.chunks_exact(dim).map(|chunk| chunk.to_vec()).collect()
}

/// Mesh point `i` followed by its `ncol` stage points, for every interval.
fn interleave(mesh: Vec<Vec<f64>>, stages: Vec<Vec<f64>>, ncol: usize) -> Vec<Vec<f64>> {
    let mut ordered = Vec::with_capacity(mesh.len() + stages.len());
    let mut stages = stages.into_iter();
    for point in mesh {
        ordered.push(point);
        ordered.extend(stages.by_ref().take(ncol));
    }
    ordered
}

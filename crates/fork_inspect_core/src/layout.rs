//! Mesh layout inference for flat collocation states.
//!
//! Continuation points only store a flat vector. The mesh that produced it is
//! recovered from the declared metadata when it is consistent, otherwise from an
//! ordered search over common mesh sizes, otherwise from the default mesh.

use crate::error::{InspectError, Result};
use crate::types::{MeshLayout, PartialLayout, StateEncoding};

/// Phase-space dimensions in search priority. Low dimensions dominate real data.
pub const CANDIDATE_DIMS: [usize; 4] = [3, 2, 4, 5];
/// Collocation degrees in search priority.
pub const CANDIDATE_NCOLS: [usize; 3] = [4, 3, 5];
/// Mesh interval counts in search priority, including doubled meshes.
pub const CANDIDATE_NTSTS: [usize; 6] = [20, 40, 10, 80, 30, 60];

pub const DEFAULT_NTST: usize = 20;
pub const DEFAULT_NCOL: usize = 4;

/// Solves the length equation of `encoding` for `dim`.
///
/// Returns `None` unless the solution is a positive integer.
pub fn solve_dim(
    state_len: usize,
    ntst: usize,
    ncol: usize,
    encoding: StateEncoding,
) -> Option<usize> {
    if state_len < 2 || ntst == 0 || ncol == 0 {
        return None;
    }
    let per_dim = MeshLayout::new(ntst, ncol, 1).point_count(encoding);
    let payload = state_len - 1;
    if per_dim == 0 || payload % per_dim != 0 {
        return None;
    }
    match payload / per_dim {
        0 => None,
        dim => Some(dim),
    }
}

/// Solves the length equation of `encoding` for the collocation degree `ncol`.
///
/// Returns `None` unless the solution is a positive integer.
pub fn solve_ncol(
    state_len: usize,
    ntst: usize,
    dim: usize,
    encoding: StateEncoding,
) -> Option<usize> {
    if state_len < 2 || ntst == 0 || dim == 0 {
        return None;
    }
    let payload = state_len - 1;
    if payload % dim != 0 {
        return None;
    }
    let points = payload / dim;
    // mesh+stage stores ntst * (ncol + 1) points, profile stores ntst * ncol + 1.
    let offset = match encoding {
        StateEncoding::MeshStage => ntst,
        StateEncoding::Profile => 1,
    };
    let stages = points.checked_sub(offset)?;
    if stages % ntst != 0 {
        return None;
    }
    match stages / ntst {
        0 => None,
        ncol => Some(ncol),
    }
}

/// Flat length implied by `layout` under `encoding`.
pub fn required_length(layout: &MeshLayout, encoding: StateEncoding) -> usize {
    layout.required_length(encoding)
}

/// Resolves the mesh layout of a state of length `state_len`.
///
/// The returned layout always reproduces `state_len` exactly under `encoding`.
pub fn resolve(state_len: usize, hint: &PartialLayout, encoding: StateEncoding) -> Result<MeshLayout> {
    validate_hint(hint)?;

    if let Some(layout) = hint.complete() {
        if layout.required_length(encoding) == state_len {
            log::debug!("Using declared mesh layout {layout:?} ({})", encoding.label());
            return Ok(layout);
        }
        log::warn!(
            "Declared mesh layout {layout:?} implies {} entries under {} encoding, state has {state_len}; searching instead",
            layout.required_length(encoding),
            encoding.label()
        );
        return search_or_default(state_len, &PartialLayout::default(), encoding);
    }

    if let (Some(ntst), Some(ncol), None) = (hint.ntst, hint.ncol, hint.dim) {
        return solve_dim(state_len, ntst, ncol, encoding)
            .map(|dim| MeshLayout::new(ntst, ncol, dim))
            .ok_or_else(|| {
                InspectError::InvalidLayout(format!(
                    "ntst={ntst}, ncol={ncol} imply a non-integral or non-positive dimension for state length {state_len} ({} encoding)",
                    encoding.label()
                ))
            });
    }

    if let (Some(ntst), None, Some(dim)) = (hint.ntst, hint.ncol, hint.dim) {
        return solve_ncol(state_len, ntst, dim, encoding)
            .map(|ncol| MeshLayout::new(ntst, ncol, dim))
            .ok_or_else(|| {
                InspectError::InvalidLayout(format!(
                    "ntst={ntst}, dim={dim} imply a non-integral or non-positive collocation degree for state length {state_len} ({} encoding)",
                    encoding.label()
                ))
            });
    }

    search_or_default(state_len, hint, encoding)
}

fn validate_hint(hint: &PartialLayout) -> Result<()> {
    for (name, value) in [("ntst", hint.ntst), ("ncol", hint.ncol), ("dim", hint.dim)] {
        if value == Some(0) {
            return Err(InspectError::InvalidLayout(format!("{name} must be positive")));
        }
    }
    Ok(())
}

fn search_or_default(
    state_len: usize,
    pins: &PartialLayout,
    encoding: StateEncoding,
) -> Result<MeshLayout> {
    if let Some(layout) = candidates(pins).find(|c| c.required_length(encoding) == state_len) {
        log::debug!("Inferred mesh layout {layout:?} from state length {state_len}");
        return Ok(layout);
    }

    let ntst = pins.ntst.unwrap_or(DEFAULT_NTST);
    let ncol = pins.ncol.unwrap_or(DEFAULT_NCOL);
    match solve_dim(state_len, ntst, ncol, encoding) {
        Some(dim) if pins.dim.map_or(true, |pinned| pinned == dim) => {
            log::warn!(
                "No candidate mesh matched state length {state_len}; falling back to ntst={ntst}, ncol={ncol}, dim={dim}"
            );
            Ok(MeshLayout::new(ntst, ncol, dim))
        }
        _ => Err(InspectError::AmbiguousLayout {
            state_len,
            detail: format!(
                "searched {} candidates and the ntst={ntst}, ncol={ncol} default under {} encoding",
                candidates(pins).count(),
                encoding.label()
            ),
        }),
    }
}

/// Candidate layouts in priority order: dimension outermost, mesh size innermost.
///
/// Any field set on `pins` replaces that axis with the single pinned value.
pub fn candidates(pins: &PartialLayout) -> impl Iterator<Item = MeshLayout> {
    let dims = axis(pins.dim, &CANDIDATE_DIMS);
    let ncols = axis(pins.ncol, &CANDIDATE_NCOLS);
    let ntsts = axis(pins.ntst, &CANDIDATE_NTSTS);
    dims.into_iter().flat_map(move |dim| {
        let ntsts = ntsts.clone();
        ncols.clone().into_iter().flat_map(move |ncol| {
            ntsts
                .clone()
                .into_iter()
                .map(move |ntst| MeshLayout::new(ntst, ncol, dim))
        })
    })
}

fn axis(pinned: Option<usize>, preference: &[usize]) -> Vec<usize> {
    match pinned {
        Some(value) => vec![value],
        None => preference.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn candidates_follow_declared_priority() {
        let all: Vec<MeshLayout> = candidates(&PartialLayout::default()).collect();
        assert_eq!(all.len(), 4 * 3 * 6);
        assert_eq!(all[0], MeshLayout::new(20, 4, 3));
        assert_eq!(all[1], MeshLayout::new(40, 4, 3));
        assert_eq!(all[6], MeshLayout::new(20, 3, 3));
        assert_eq!(all[18], MeshLayout::new(20, 4, 2));
        assert_eq!(all.last(), Some(&MeshLayout::new(60, 5, 5)));
    }

    #[test]
    fn pinned_axes_collapse_to_one_value() {
        let pins = PartialLayout::new(None, Some(7), Some(2));
        let pinned: Vec<MeshLayout> = candidates(&pins).collect();
        assert_eq!(pinned.len(), CANDIDATE_NTSTS.len());
        assert!(pinned.iter().all(|l| l.ncol == 7 && l.dim == 2));
    }

    #[test]
    fn solve_dim_requires_exact_positive_integer() {
        assert_eq!(solve_dim(301, 20, 4, StateEncoding::MeshStage), Some(3));
        assert_eq!(solve_dim(244, 20, 4, StateEncoding::Profile), Some(3));
        assert_eq!(solve_dim(302, 20, 4, StateEncoding::MeshStage), None);
        assert_eq!(solve_dim(1, 20, 4, StateEncoding::MeshStage), None);
        assert_eq!(solve_dim(301, 0, 4, StateEncoding::MeshStage), None);
    }

    #[test]
    fn solve_ncol_requires_exact_positive_integer() {
        assert_eq!(solve_ncol(301, 20, 3, StateEncoding::MeshStage), Some(4));
        assert_eq!(solve_ncol(244, 20, 3, StateEncoding::Profile), Some(4));
        // ncol = 0 would leave only the mesh block.
        assert_eq!(solve_ncol(61, 20, 3, StateEncoding::MeshStage), None);
        assert_eq!(solve_ncol(302, 20, 3, StateEncoding::MeshStage), None);
        assert_eq!(solve_ncol(4, 20, 3, StateEncoding::Profile), None);
        assert_eq!(solve_ncol(301, 20, 0, StateEncoding::MeshStage), None);
    }

    #[test]
    fn mesh_and_dimension_hint_solves_degree_outside_the_grid() {
        let hint = PartialLayout::new(Some(60), None, Some(3));
        for encoding in [StateEncoding::MeshStage, StateEncoding::Profile] {
            let len = MeshLayout::new(60, 6, 3).required_length(encoding);
            let layout = resolve(len, &hint, encoding).expect("layout should resolve");
            assert_eq!(layout, MeshLayout::new(60, 6, 3));
        }
    }

    #[test]
    fn mesh_and_dimension_hint_with_fractional_degree_is_invalid() {
        let hint = PartialLayout::new(Some(20), None, Some(3));
        assert_err_contains(resolve(302, &hint, StateEncoding::MeshStage), "collocation degree");
    }

    #[test]
    fn correct_full_hint_is_used_verbatim() {
        let hint = PartialLayout::new(Some(7), Some(2), Some(6));
        let len = MeshLayout::new(7, 2, 6).required_length(StateEncoding::MeshStage);
        let layout = resolve(len, &hint, StateEncoding::MeshStage).expect("layout should resolve");
        assert_eq!(layout, MeshLayout::new(7, 2, 6));
    }

    #[test]
    fn wrong_full_hint_falls_through_to_search() {
        let hint = PartialLayout::new(Some(50), Some(4), Some(3));
        let layout = resolve(301, &hint, StateEncoding::MeshStage).expect("layout should resolve");
        assert_eq!(layout, MeshLayout::new(20, 4, 3));
    }

    #[test]
    fn mesh_hint_solves_dimension_algebraically() {
        let hint = PartialLayout::new(Some(7), Some(3), None);
        let len = MeshLayout::new(7, 3, 9).required_length(StateEncoding::Profile);
        let layout = resolve(len, &hint, StateEncoding::Profile).expect("layout should resolve");
        assert_eq!(layout, MeshLayout::new(7, 3, 9));
    }

    #[test]
    fn mesh_hint_with_fractional_dimension_is_invalid() {
        let hint = PartialLayout::new(Some(20), Some(4), None);
        let result = resolve(302, &hint, StateEncoding::MeshStage);
        assert_err_contains(result, "invalid layout");
    }

    #[test]
    fn zero_hint_fields_are_invalid() {
        let hint = PartialLayout::new(Some(0), None, None);
        assert_err_contains(resolve(301, &hint, StateEncoding::MeshStage), "ntst must be positive");
    }

    #[test]
    fn collisions_resolve_to_the_earliest_candidate() {
        // 301 = 20*3*5 + 1 = 30*2*5 + 1: dim 3 precedes dim 2.
        assert_eq!(
            MeshLayout::new(30, 4, 2).required_length(StateEncoding::MeshStage),
            301
        );
        let layout = resolve(301, &PartialLayout::default(), StateEncoding::MeshStage)
            .expect("layout should resolve");
        assert_eq!(layout, MeshLayout::new(20, 4, 3));

        // 401 = 40*2*5 + 1 = 20*4*5 + 1: dim 2 is preferred over dim 4.
        let layout = resolve(401, &PartialLayout::default(), StateEncoding::MeshStage)
            .expect("layout should resolve");
        assert_eq!(layout, MeshLayout::new(40, 4, 2));
    }

    #[test]
    fn pinned_dimension_steers_the_search() {
        let hint = PartialLayout::new(None, None, Some(2));
        let layout = resolve(301, &hint, StateEncoding::MeshStage).expect("layout should resolve");
        assert_eq!(layout, MeshLayout::new(30, 4, 2));
    }

    #[test]
    fn default_mesh_covers_lengths_outside_the_grid() {
        // dim 7 is outside the grid; ntst=20, ncol=4 still explains the length.
        let len = MeshLayout::new(20, 4, 7).required_length(StateEncoding::MeshStage);
        let layout = resolve(len, &PartialLayout::default(), StateEncoding::MeshStage)
            .expect("layout should resolve");
        assert_eq!(layout, MeshLayout::new(20, 4, 7));
    }

    #[test]
    fn unexplained_lengths_are_ambiguous() {
        assert_err_contains(
            resolve(302, &PartialLayout::default(), StateEncoding::MeshStage),
            "ambiguous layout",
        );
        assert_err_contains(
            resolve(0, &PartialLayout::default(), StateEncoding::Profile),
            "ambiguous layout",
        );
    }

    #[test]
    fn pinned_dimension_must_agree_with_default_mesh() {
        let len = MeshLayout::new(20, 4, 7).required_length(StateEncoding::MeshStage);
        let hint = PartialLayout::new(None, None, Some(6));
        assert_err_contains(resolve(len, &hint, StateEncoding::MeshStage), "ambiguous layout");
    }

    #[test]
    fn resolve_is_deterministic() {
        let first = resolve(244, &PartialLayout::default(), StateEncoding::Profile);
        for _ in 0..5 {
            assert_eq!(resolve(244, &PartialLayout::default(), StateEncoding::Profile), first);
        }
        assert_eq!(first, Ok(MeshLayout::new(20, 4, 3)));
    }
}

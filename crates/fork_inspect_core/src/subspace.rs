//! Principal angles between the E^cu and E^ss spans of covariant Lyapunov vectors.
//!
//! Each checkpoint is handled independently: its CLVs are split into a leading
//! and a trailing block, both blocks are orthonormalized with rank detection,
//! and the smallest principal angle is read off the singular values of the
//! cross Gram matrix.

use nalgebra::linalg::ColPivQR;
use nalgebra::DMatrix;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{InspectError, Result};
use crate::types::{CovariantVectorSet, SubspaceSplit};

/// Orthonormal basis for the column span of `matrix`.
///
/// Columns whose pivoted QR diagonal falls below
/// `max(rows, cols) * eps * max|R|` are dropped, so a basis built from repeated
/// or zero columns shrinks instead of carrying null directions.
pub fn orthonormal_basis(matrix: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if matrix.ncols() == 0 || matrix.nrows() == 0 {
        return Err(InspectError::DegenerateSubspace(
            "subspace has no basis vectors".to_string(),
        ));
    }
    if let Some(bad) = matrix.iter().find(|value| !value.is_finite()) {
        return Err(InspectError::InvalidRecord(format!(
            "basis vectors contain a non-finite entry ({bad})"
        )));
    }

    let qr = ColPivQR::new(matrix.clone());
    let q = qr.q();
    let r = qr.r();

    let scale = r.amax();
    let tol = matrix.nrows().max(matrix.ncols()) as f64 * f64::EPSILON * scale;
    let keep: Vec<usize> = (0..r.nrows().min(r.ncols()))
        .filter(|&i| r[(i, i)].abs() > tol)
        .collect();

    if keep.is_empty() {
        return Err(InspectError::DegenerateSubspace(format!(
            "all {} columns collapsed during orthonormalization",
            matrix.ncols()
        )));
    }
    if keep.len() < matrix.ncols() {
        log::debug!(
            "Dropped {} numerically dependent columns from a {}-column basis",
            matrix.ncols() - keep.len(),
            matrix.ncols()
        );
    }
    Ok(q.select_columns(keep.iter()))
}

/// Smallest principal angle, in degrees, between the column spans of `a` and `b`.
pub fn minimal_principal_angle(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<f64> {
    if a.nrows() != b.nrows() {
        return Err(InspectError::InvalidRecord(format!(
            "subspaces live in different ambient dimensions ({} vs {})",
            a.nrows(),
            b.nrows()
        )));
    }
    let qa = orthonormal_basis(a)?;
    let qb = orthonormal_basis(b)?;
    let gram = qa.transpose() * qb;
    let largest = gram
        .singular_values()
        .iter()
        .fold(0.0_f64, |acc, s| acc.max(s.abs()));
    let cos_theta = largest.clamp(-1.0, 1.0);
    Ok(cos_theta.acos().to_degrees())
}

/// Leading and trailing CLV blocks of one checkpoint, vectors as columns.
pub fn split_checkpoint(
    vectors: &DMatrix<f64>,
    split: SubspaceSplit,
) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    let dim = vectors.nrows();
    let leading = split.leading();
    let trailing = split.trailing(dim).ok_or_else(|| split_error(split, dim))?;
    let center_unstable = vectors.rows(0, leading).transpose();
    let stable = vectors.rows(leading, trailing).transpose();
    Ok((center_unstable, stable))
}

fn split_error(split: SubspaceSplit, dim: usize) -> InspectError {
    InspectError::InvalidRecord(format!(
        "split {} leaves no stable vectors in dimension {dim}",
        split.leading()
    ))
}

/// Angle at every checkpoint. Failures stay in place; nothing is substituted.
pub fn checkpoint_angles(set: &CovariantVectorSet, split: SubspaceSplit) -> Vec<Result<f64>> {
    if split.trailing(set.dim()).is_none() {
        return vec![Err(split_error(split, set.dim())); set.len()];
    }
    evaluate_checkpoints(set, split)
}

fn checkpoint_angle(vectors: &DMatrix<f64>, split: SubspaceSplit) -> Result<f64> {
    let (center_unstable, stable) = split_checkpoint(vectors, split)?;
    minimal_principal_angle(&center_unstable, &stable)
}

#[cfg(feature = "parallel")]
fn evaluate_checkpoints(set: &CovariantVectorSet, split: SubspaceSplit) -> Vec<Result<f64>> {
    set.checkpoints()
        .par_iter()
        .map(|checkpoint| checkpoint_angle(&checkpoint.vectors, split))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn evaluate_checkpoints(set: &CovariantVectorSet, split: SubspaceSplit) -> Vec<Result<f64>> {
    set.checkpoints()
        .iter()
        .map(|checkpoint| checkpoint_angle(&checkpoint.vectors, split))
        .collect()
}

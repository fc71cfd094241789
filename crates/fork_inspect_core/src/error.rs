//! Error kinds reported by layout resolution, decoding, and subspace analysis.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, InspectError>;

/// Failures surfaced to callers. Each kind implies a different corrective action,
/// so they are never folded into one another.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InspectError {
    /// Layout metadata contradicts itself (zero counts, non-integral implied dimension).
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// Neither the candidate grid nor the default mesh reproduces the state length.
    #[error("ambiguous layout: no mesh layout reproduces state length {state_len} ({detail})")]
    AmbiguousLayout { state_len: usize, detail: String },

    #[error("short state: layout requires {required} entries, state has {actual}")]
    ShortState { required: usize, actual: usize },

    #[error("degenerate subspace: {0}")]
    DegenerateSubspace(String),

    /// Loader input that cannot be interpreted (length mismatches, bad split).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A single checkpoint failed during a series run.
    #[error("checkpoint {index}: {source}")]
    Checkpoint {
        index: usize,
        #[source]
        source: Box<InspectError>,
    },
}

/// Stable discriminant for branching on failures without matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidLayout,
    AmbiguousLayout,
    ShortState,
    DegenerateSubspace,
    InvalidRecord,
}

impl InspectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InspectError::InvalidLayout(_) => ErrorKind::InvalidLayout,
            InspectError::AmbiguousLayout { .. } => ErrorKind::AmbiguousLayout,
            InspectError::ShortState { .. } => ErrorKind::ShortState,
            InspectError::DegenerateSubspace(_) => ErrorKind::DegenerateSubspace,
            InspectError::InvalidRecord(_) => ErrorKind::InvalidRecord,
            InspectError::Checkpoint { source, .. } => source.kind(),
        }
    }

    /// True for failures that a different state encoding might resolve.
    pub fn is_layout_mismatch(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ShortState | ErrorKind::AmbiguousLayout | ErrorKind::InvalidLayout
        )
    }
}

pub mod decode;
pub mod error;
pub mod layout;
pub mod orbit;
pub mod pipeline;
pub mod records;
pub mod settings;
pub mod subspace;
/// The `fork_inspect_core` crate decodes and analyzes artifacts written by the Fork CLI.
/// Everything here is a pure function over loaded arrays; discovery, JSON parsing and
/// plotting belong to the caller.
///
/// Key components:
/// - **Layout**: infers `(ntst, ncol, dim)` of a flat collocation state from its length.
/// - **Decode**: rebuilds a closed limit-cycle profile and its period from a flat state.
/// - **Subspace**: minimal principal angles between E^cu and E^ss spans of CLVs.
/// - **Orbit**: interpolated orbit states and unit CLV directions over a time window.
/// - **Pipeline**: encoding fallback, branch point selection and gap handling driven by `InspectSettings`.
pub mod types;

pub use error::{ErrorKind, InspectError, Result};
pub use orbit::{ClvDirection, Trajectory};
pub use settings::{GapPolicy, InspectSettings, TimeWindow};
pub use types::{
    AngleSeries, Checkpoint, CovariantVectorSet, LimitCycleProfile, MeshLayout, PartialLayout,
    StateEncoding, SubspaceSplit,
};

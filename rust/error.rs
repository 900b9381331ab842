use thiserror::Error;

use crate::dispatch::{Dtype, Metric};

/// Why the dispatch table could not be populated.
///
/// Stored once and handed to every caller, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No compiled-in tier supported by this CPU implements the pair. The serial
    /// tier has no requirements, so this means the kernel registry is broken.
    #[error("no compiled-in kernel for `{metric}` over `{dtype}` is supported by this CPU")]
    NoSatisfyingTier { metric: Metric, dtype: Dtype },

    /// Population panicked. The panic is caught so the cell still settles on a
    /// terminal state.
    #[error("dispatch table population panicked: {message}")]
    PopulationPanicked { message: String },
}

use thiserror::Error;

/// Errors that terminate the solve of a single island.
///
/// Non-convergence is deliberately not represented here: exhausting the
/// iteration budget is a normal result carrying the last iterate.
#[derive(Debug, Error)]
pub enum PowerFlowError {
    /// The island cannot be solved as given: it is skipped and the
    /// remaining islands are solved normally.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The Newton iteration broke down (singular factorization or a
    /// non-finite iterate). Fatal for the island, no retry.
    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl PowerFlowError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, PowerFlowError::Configuration(_))
    }
}

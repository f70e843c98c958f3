use thiserror::Error;

use crate::scheduler::RegistryError;

/// Errors surfaced synchronously to callers of the match and subscription services.
#[derive(Error, Debug)]
pub enum ServiceError {
    // Input errors
    #[error("alias '{0}' not found")]
    AliasNotFound(String),

    #[error("alias '{0}' found, but it is not linked to a football api team")]
    UnlinkedAlias(String),

    #[error("invalid subscriber url '{0}'")]
    InvalidUrl(String),

    // Lookups
    #[error("match not found: {0}")]
    MatchNotFound(String),

    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("match {0} does not exist")]
    WrongMatchId(i64),

    #[error("subscription already exists for match {0}")]
    SubscriptionAlreadyExists(i64),

    #[error("fixture {0} is already tracked for another match")]
    FixtureAlreadyTracked(i64),

    #[error("match {0} is not scheduled")]
    MatchNotScheduled(i64),

    // External data anomalies
    #[error("unexpected number of fixtures: {0}")]
    UnexpectedResultCount(String),

    #[error("incorrect fixture status: fixture {fixture_id} has status '{status}', expected 'NS'")]
    IncorrectFixtureStatus { fixture_id: i64, status: String },

    #[error("football api request failed: {0:#}")]
    Provider(anyhow::Error),

    // Scheduling
    #[error("failed to schedule result acquiring: {0}")]
    Scheduling(#[from] RegistryError),

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl ServiceError {
    /// Input problems and external-data anomalies the caller can act on.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            ServiceError::AliasNotFound(_)
                | ServiceError::UnlinkedAlias(_)
                | ServiceError::InvalidUrl(_)
                | ServiceError::WrongMatchId(_)
                | ServiceError::MatchNotScheduled(_)
                | ServiceError::UnexpectedResultCount(_)
                | ServiceError::IncorrectFixtureStatus { .. }
        )
    }
}

/// Storage errors arrive as `anyhow::Error`; typed ones raised by the storage
/// layer are recovered, everything else becomes `Internal`.
impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ServiceError>() {
            Ok(typed) => typed,
            Err(err) => ServiceError::Internal(err),
        }
    }
}

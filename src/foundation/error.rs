/// Crate-wide result alias.
pub type GxResult<T> = Result<T, GxError>;

/// Errors surfaced by the surface cache, stage engine and session.
///
/// `AllocationFailure` is the only kind a caller is expected to recover from (by degrading the
/// session configuration). `ConfigurationMismatch` and `StalePreload` report orchestration bugs.
#[derive(thiserror::Error, Debug)]
pub enum GxError {
    /// Fast memory or host memory budget exhausted.
    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    /// A stage was applied without configuration, or with surfaces of the wrong shape.
    #[error("configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    /// A surface was sampled while its current shadow slot was not resolved.
    #[error("stale preload: {0}")]
    StalePreload(String),

    /// Invalid user-provided input (frame buffers, options).
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GxError {
    /// Build an [`GxError::AllocationFailure`].
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::AllocationFailure(msg.into())
    }

    /// Build a [`GxError::ConfigurationMismatch`].
    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::ConfigurationMismatch(msg.into())
    }

    /// Build a [`GxError::StalePreload`].
    pub fn stale(msg: impl Into<String>) -> Self {
        Self::StalePreload(msg.into())
    }

    /// Build a [`GxError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`GxError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for errors a session setup caller can recover from by degrading its options.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AllocationFailure(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;

//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts via `#[from]`.
//! The core catches integration-owned failures at the dispatch boundary;
//! nothing here is ever allowed to crash the process.

/// A string that does not parse as a `domain.object_id` entity identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid entity id `{0}`, expected `domain.object_id` (lowercase letters, digits, underscores)")]
pub struct InvalidEntityId(pub String);

/// Errors surfaced by the hub core to callers.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Malformed entity id — a caller error, nothing was mutated.
    #[error(transparent)]
    InvalidEntityId(#[from] InvalidEntityId),

    /// Service call addressed to an unregistered `(domain, service)` pair.
    #[error("unknown service `{domain}.{service}`")]
    UnknownService {
        /// Domain part of the requested service.
        domain: String,
        /// Name part of the requested service.
        service: String,
    },

    /// The worker pool refused new work (shutdown in progress).
    #[error("worker pool rejected the job: {0}")]
    PoolUnavailable(String),

    /// Failure reported by integration-owned code (a component `setup`
    /// or a service handler).
    #[error("integration failure: {0}")]
    Integration(String),
}

impl HubError {
    /// Build an [`Integration`](Self::Integration) failure from any message.
    ///
    /// Integrations use this to report that their setup or handler did not
    /// succeed without defining their own error types.
    #[must_use]
    pub fn integration(message: impl Into<String>) -> Self {
        Self::Integration(message.into())
    }
}

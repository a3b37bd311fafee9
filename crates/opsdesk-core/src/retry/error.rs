//! Errors surfaced by interruptible executions.

use thiserror::Error;

/// Outcome of an execution that can be cancelled or time out.
///
/// Plain [`execute`](super::RetryExecutor::execute) calls never produce this
/// type: they surface the operation's own error untouched. Cancellable entry
/// points wrap it in [`RetryError::Operation`] so that an interruption stays
/// distinguishable from a failure of the operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The operation failed terminally or exhausted its attempts.
    #[error(transparent)]
    Operation(E),

    /// The cancellation token fired.
    #[error("Retry cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Attempts started before cancellation
        attempts: u32,
    },

    /// The execution deadline passed.
    #[error("Retry deadline exceeded after {attempts} attempt(s)")]
    DeadlineExceeded {
        /// Attempts started before the deadline
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Whether the execution was interrupted rather than failing on its own.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::DeadlineExceeded { .. })
    }

    /// Whether the cancellation token fired.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The operation error, if the execution was not interrupted.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => None,
        }
    }

    /// Borrow the operation error, if any.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => None,
        }
    }
}

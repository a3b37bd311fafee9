//! Tagged failure classification.
//!
//! The layer that produces an error also decides what kind of failure it is.
//! Retry predicates then match on [`FailureKind`] instead of inspecting
//! messages or duck-typing status fields.

use std::io;

/// What went wrong, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The backend could not be reached or the connection dropped.
    Network,
    /// The request did not complete in time.
    Timeout,
    /// The backend reported an internal failure (5xx).
    Server,
    /// The request itself is wrong: validation, not-found, auth (4xx).
    Client,
    /// Anything that fits none of the above.
    Other,
}

impl FailureKind {
    /// Whether a failure of this kind may succeed when attempted again.
    ///
    /// Only network, timeout and server failures are transient.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Server)
    }

    /// Classify an HTTP-style status code.
    ///
    /// ```rust
    /// use opsdesk_core::retry::FailureKind;
    ///
    /// assert_eq!(FailureKind::from_status(503), FailureKind::Server);
    /// assert_eq!(FailureKind::from_status(404), FailureKind::Client);
    /// assert_eq!(FailureKind::from_status(408), FailureKind::Timeout);
    /// ```
    pub fn from_status(status: u16) -> Self {
        match status {
            408 => Self::Timeout,
            400..=499 => Self::Client,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

/// Errors that know their own [`FailureKind`].
///
/// # Examples
///
/// ```rust
/// use opsdesk_core::retry::{Classify, FailureKind};
///
/// #[derive(Debug)]
/// enum FetchError {
///     Offline,
///     Rejected(u16),
/// }
///
/// impl Classify for FetchError {
///     fn failure_kind(&self) -> FailureKind {
///         match self {
///             FetchError::Offline => FailureKind::Network,
///             FetchError::Rejected(status) => FailureKind::from_status(*status),
///         }
///     }
/// }
///
/// assert!(FetchError::Offline.is_transient());
/// assert!(!FetchError::Rejected(422).is_transient());
/// ```
pub trait Classify {
    /// The kind of failure this error represents.
    fn failure_kind(&self) -> FailureKind;

    /// Shorthand for `self.failure_kind().is_transient()`.
    fn is_transient(&self) -> bool {
        self.failure_kind().is_transient()
    }
}

impl<T: Classify + ?Sized> Classify for &T {
    fn failure_kind(&self) -> FailureKind {
        (**self).failure_kind()
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn failure_kind(&self) -> FailureKind {
        (**self).failure_kind()
    }
}

impl<T: Classify + ?Sized> Classify for std::sync::Arc<T> {
    fn failure_kind(&self) -> FailureKind {
        (**self).failure_kind()
    }
}

impl Classify for io::Error {
    fn failure_kind(&self) -> FailureKind {
        match self.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FailureKind::Timeout,

            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkDown => FailureKind::Network,

            io::ErrorKind::InvalidInput
            | io::ErrorKind::InvalidData
            | io::ErrorKind::NotFound
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::AlreadyExists
            | io::ErrorKind::Unsupported => FailureKind::Client,

            _ => FailureKind::Other,
        }
    }
}

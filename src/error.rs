use std::os::unix::io::RawFd;

/// The primary error type used by fibers-poll.
///
/// Every variant is fatal for the operation that produced it: nothing is
/// retried and no partial result is kept.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A watch token was used after its watch was removed, or on another
    /// event base.
    #[error("invalid watch token provided to the event base")]
    InvalidToken,

    /// More events fired in one iteration than the event buffer can hold.
    ///
    /// The caller is expected to grow the buffer before registering more
    /// watches than it has room for.
    #[error("max events fired on fd({fd}): buffer holds {capacity} records")]
    BufferFull {
        /// The descriptor that had no room left.
        fd: RawFd,
        /// The capacity of the buffer in use.
        capacity: usize,
    },

    /// Writing to the wake descriptor failed for a reason other than the
    /// pipe being full.
    #[error("failed to signal the wake descriptor")]
    Wake(#[source] std::io::Error),

    /// An error from the polling system or the OS.
    #[error("underlying IO error")]
    IoError(#[from] std::io::Error),
}

/// [`Result`][core::result::Result] alias using fibers-poll's error type.
pub type Result<T> = core::result::Result<T, Error>;

impl From<rustix::io::Errno> for Error {
    fn from(err: rustix::io::Errno) -> Self {
        Into::<std::io::Error>::into(err).into()
    }
}

impl From<Error> for std::io::Error {
    /// Converts fibers-poll's error type into a [`std::io::Error`].
    fn from(err: Error) -> Self {
        match err {
            Error::IoError(source) => source,
            Error::Wake(source) => Self::new(source.kind(), source),
            Error::InvalidToken => Self::new(std::io::ErrorKind::InvalidInput, err.to_string()),
            Error::BufferFull { .. } => Self::new(std::io::ErrorKind::OutOfMemory, err.to_string()),
        }
    }
}

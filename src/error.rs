//!
//! The error type returned by engine and channel construction/teardown
//!

use std::error::Error as StdError;
use std::fmt;

/// Errors that can occur when constructing or tearing down the channelizer
///
/// A callback returning `false` during [`Engine::feed`](crate::Engine::feed) is
/// *not* represented here: that is a soft, per-call failure signaled through
/// `feed`'s boolean return value, not an exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A parameter was outside its valid range
    ///
    /// The string names which parameter and what range it must fall in.
    InvalidParams(&'static str),
    /// A buffer or plan size computed from the parameters would not fit in
    /// memory, or overflowed before an allocation was attempted
    OutOfMemory,
    /// `close_channel` was called with a handle that does not belong to this
    /// engine, or that has already been closed
    InvalidHandle,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::InvalidParams(reason) => write!(f, "invalid parameters: {}", reason),
            Error::OutOfMemory => write!(f, "buffer size overflowed before allocation"),
            Error::InvalidHandle => {
                write!(f, "channel handle is stale or does not belong to this engine")
            }
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display_does_not_panic() {
        let _ = Error::InvalidParams("bw").to_string();
        let _ = Error::OutOfMemory.to_string();
        let _ = Error::InvalidHandle.to_string();
    }
}

//! Error types for ninawire.

use thiserror::Error;

use crate::transport::TransportError;

/// Main error type for all driver operations.
#[derive(Debug, Error)]
pub enum NinaError {
    /// Raw bus transfer failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The readiness signal never reached the required level within its window.
    #[error("bus readiness timeout")]
    BusTimeout,

    /// No start marker arrived within the reply window.
    #[error("timed out waiting for reply frame")]
    ReplyTimeout,

    /// The peer signaled an explicit error marker, or refused a command.
    #[error("peer signaled an error")]
    PeerError,

    /// The reply carried fewer bytes or parameters than the caller required.
    #[error("reply shorter than required")]
    ShortReply,

    /// A request parameter does not fit its length field.
    #[error("parameter too long for its length field")]
    ParamTooLong,

    /// The peer accepted fewer payload bytes than were offered.
    #[error("partial send: peer accepted {sent} bytes")]
    PartialSend {
        /// Cumulative bytes accepted before the short chunk ended the write.
        sent: usize,
    },

    /// The socket allocator reported exhaustion.
    #[error("no sockets available")]
    SocketExhausted,

    /// Hostname lookup failed or returned a malformed address.
    #[error("DNS resolution failed")]
    DnsFailed,

    /// The peer reported the association attempt as failed.
    #[error("association failed")]
    AssociationFailed,

    /// Association did not reach a terminal state within the deadline.
    #[error("association timed out")]
    AssociationTimeout,
}

/// Result type alias using NinaError.
pub type Result<T> = std::result::Result<T, NinaError>;

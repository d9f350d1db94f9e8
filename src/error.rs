use std::error;
use std::fmt;




/**
 * Error to represent failures of the message-passing layer during a ghost
 * exchange. Precondition violations on the hierarchy itself are not
 * represented here; they are programming errors and panic.
 */
#[derive(Debug)]
pub enum Error {
    Encode(rmp_serde::encode::Error),
    Decode(rmp_serde::decode::Error),
    UnexpectedPeer(usize),
    ProtocolMismatch(String),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use Error::*;

        match self {
            Encode(e) => write!(fmt, "failed to encode message: {}", e),
            Decode(e) => write!(fmt, "failed to decode message: {}", e),
            UnexpectedPeer(rank) => write!(fmt, "message from unexpected peer rank {}", rank),
            ProtocolMismatch(what) => write!(fmt, "exchange protocol mismatch: {}", what),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Encode(e) => Some(e),
            Error::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Encode(e)
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Decode(e)
    }
}

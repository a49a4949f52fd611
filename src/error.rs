//! Error type shared by the decoder, the skip engine, the map scanner and the demultiplexer.
//!
//! Errors fall into four groups:
//!
//! - **Transport**: [`CodecError::Io`], passed through verbatim from the byte source or sink.
//!   End of input at a unit boundary is reported separately as [`CodecError::EndOfInput`].
//! - **Protocol shape**: unknown tag byte, wrong unit where a specific one was required,
//!   subtree nested deeper than the skip bound, abnormally terminated binary stream.
//! - **Scanner**: missing mandatory key, unknown key under strict policy, wrong value type
//!   for a registered key.
//! - **Contract**: a binary stream handle dropped before its terminator.
//!
//! `CodecError` is `Clone` so the demultiplexer can hand the same terminal error to every
//! reader of both logical streams.

use crate::unit::UnitType;
use std::io;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    #[error("IO: {0}")]
    Io(#[source] Arc<io::Error>),
    #[error("end of input")]
    EndOfInput,
    #[error("unknown unit received (tag byte {0:#04x})")]
    UnknownUnit(u8),
    #[error("unexpected unit received: {0}")]
    UnexpectedUnit(UnitType),
    #[error("received data is too deeply nested to skip")]
    TooDeeplyNested,
    #[error("binstream terminated abnormally")]
    AbnormalStreamEnd,
    #[error("binstream handle was dropped before its terminator; decoder position is lost")]
    StreamAbandoned,
    #[error("text key is not valid UTF-8")]
    InvalidTextKey,
    #[error("mandatory key {0} is missing")]
    KeyMissing(u8),
    #[error("unknown key {0} found")]
    UnknownKey(u8),
    #[error("unexpected unit type for key {key}: expected {expected}, found {found}")]
    UnexpectedTypeForKey {
        key: u8,
        expected: UnitType,
        found: UnitType,
    },
    #[error("error while skipping: {cause}; previous error was: {pending}")]
    DrainFailed {
        cause: Box<CodecError>,
        pending: Box<CodecError>,
    },
    #[error("action failed: {0}")]
    Action(String),
}

impl CodecError {
    /// True for a clean end of input at a unit boundary.
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, CodecError::EndOfInput)
    }

    /// Wraps this error so it can travel through `std::io::Read`/`Write` and be recovered
    /// by the `From<io::Error>` conversion below.
    pub(crate) fn into_io(self) -> io::Error {
        let kind = match &self {
            CodecError::Io(e) => e.kind(),
            CodecError::AbnormalStreamEnd | CodecError::EndOfInput => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, self)
    }
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().map_or(false, |inner| inner.is::<CodecError>()) {
            return CodecError::Io(Arc::new(e));
        }
        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<CodecError>()) {
            Some(Ok(codec)) => *codec,
            Some(Err(other)) => CodecError::Io(Arc::new(io::Error::new(kind, other))),
            None => CodecError::Io(Arc::new(io::Error::from(kind))),
        }
    }
}

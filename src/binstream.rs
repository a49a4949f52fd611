//! Chunked binary stream sub-protocol.
//!
//! After the `BinStream` tag the payload is a sequence of frames, each an `i32` little-endian
//! length followed by that many bytes, and ends with a frame of length `-1`:
//!
//! ```text
//! 0a | 05 00 00 00 "hello" | 02 00 00 00 ", " | ff ff ff ff
//! ```
//!
//! [`BinStreamWriter`] produces this framing through `std::io::Write`; [`BinStreamReader`]
//! consumes it through `std::io::Read` and owns the decoder lock until the terminator is read.

use crate::decode::SourceGuard;
use crate::error::{CodecError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Write};
use tracing::{debug, warn};

const TERMINATOR: i32 = -1;

#[derive(Debug, Clone)]
enum StreamState {
    Open,
    Exhausted,
    Failed(CodecError),
}

/// Reader for the payload of one `BinStream` unit.
///
/// Holds the decoder's lock from the moment the unit is decoded. The lock is released exactly
/// once, when the `-1` terminator is consumed, either by reading to the end or by
/// [`fast_forward`](Self::fast_forward). Dropping the reader earlier (including after an I/O
/// failure) marks the decoder as abandoned: its position inside the stream is unknown, so every
/// later `read_unit` fails with [`CodecError::StreamAbandoned`].
pub struct BinStreamReader {
    guard: Option<SourceGuard>,
    remaining: usize,
    state: StreamState,
}

impl BinStreamReader {
    pub(crate) fn new(guard: SourceGuard) -> Self {
        BinStreamReader {
            guard: Some(guard),
            remaining: 0,
            state: StreamState::Open,
        }
    }

    /// True once the terminator has been consumed and the decoder released.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, StreamState::Exhausted)
    }

    /// Discard the rest of the stream up to and including its terminator.
    pub fn fast_forward(&mut self) -> Result<u64> {
        io::copy(self, &mut io::sink()).map_err(CodecError::from)
    }

    /// Read the rest of the stream into memory.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_to_end(&mut out)?;
        Ok(out)
    }

    fn finish(&mut self) {
        self.state = StreamState::Exhausted;
        self.remaining = 0;
        // Sole release path for a stream-held decoder lock.
        drop(self.guard.take());
        debug!("binstream terminated");
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let guard = match self.guard.as_mut() {
            Some(g) => g,
            None => return Ok(0),
        };
        while self.remaining == 0 {
            let len = guard.reader.read_i32::<LittleEndian>().map_err(abnormal)?;
            if len < 0 {
                self.finish();
                return Ok(0);
            }
            self.remaining = len as usize;
        }

        let want = buf.len().min(self.remaining);
        let n = guard.reader.read(&mut buf[..want]).map_err(abnormal)?;
        if n == 0 {
            return Err(CodecError::AbnormalStreamEnd);
        }
        self.remaining -= n;
        Ok(n)
    }
}

fn abnormal(e: io::Error) -> CodecError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        CodecError::AbnormalStreamEnd
    } else {
        e.into()
    }
}

impl Read for BinStreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.state {
            StreamState::Exhausted => return Ok(0),
            StreamState::Failed(e) => return Err(e.clone().into_io()),
            StreamState::Open => {}
        }
        if buf.is_empty() {
            return Ok(0);
        }
        match self.read_chunk(buf) {
            Ok(n) => Ok(n),
            Err(CodecError::Io(e)) if e.kind() == io::ErrorKind::Interrupted => {
                Err(io::Error::from(io::ErrorKind::Interrupted))
            }
            Err(e) => {
                self.state = StreamState::Failed(e.clone());
                Err(e.into_io())
            }
        }
    }
}

impl Drop for BinStreamReader {
    fn drop(&mut self) {
        if let Some(mut guard) = self.guard.take() {
            warn!(state = ?self.state, "binstream dropped before its terminator; decoder abandoned");
            guard.abandoned = true;
        }
    }
}

impl fmt::Debug for BinStreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinStreamReader")
            .field("remaining", &self.remaining)
            .field("state", &self.state)
            .finish()
    }
}

#[derive(Debug)]
enum WriterState {
    Open,
    Closed,
    Failed(CodecError),
}

/// Writer for the payload of one `BinStream` unit, created by
/// [`init_bin_stream`](crate::encode::init_bin_stream).
///
/// Each non-empty `write` emits one chunk; an empty write emits nothing. [`close`](Self::close)
/// emits the terminator and is idempotent. After a failed write every later call returns the
/// stored error. An unclosed writer is closed best-effort on drop.
pub struct BinStreamWriter<W: Write> {
    inner: W,
    state: WriterState,
}

impl<W: Write> BinStreamWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        BinStreamWriter {
            inner,
            state: WriterState::Open,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, WriterState::Closed)
    }

    /// Terminate the stream.
    pub fn close(&mut self) -> io::Result<()> {
        match &self.state {
            WriterState::Closed => return Ok(()),
            WriterState::Failed(e) => return Err(e.clone().into_io()),
            WriterState::Open => {}
        }
        if let Err(e) = self.inner.write_i32::<LittleEndian>(TERMINATOR) {
            return Err(self.fail(e));
        }
        self.state = WriterState::Closed;
        Ok(())
    }

    fn fail(&mut self, e: io::Error) -> io::Error {
        let stored = CodecError::from(e);
        self.state = WriterState::Failed(stored.clone());
        stored.into_io()
    }
}

impl<W: Write> Write for BinStreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.state {
            WriterState::Closed => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "binstream already closed",
                ))
            }
            WriterState::Failed(e) => return Err(e.clone().into_io()),
            WriterState::Open => {}
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let n = buf.len().min(i32::MAX as usize);
        if let Err(e) = self.inner.write_i32::<LittleEndian>(n as i32) {
            return Err(self.fail(e));
        }
        if let Err(e) = self.inner.write_all(&buf[..n]) {
            return Err(self.fail(e));
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Drop for BinStreamWriter<W> {
    fn drop(&mut self) {
        if matches!(self.state, WriterState::Open) {
            if let Err(e) = self.close() {
                debug!(error = %e, "closing binstream on drop failed");
            }
        }
    }
}

impl<W: Write> fmt::Debug for BinStreamWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinStreamWriter")
            .field("state", &self.state)
            .finish()
    }
}

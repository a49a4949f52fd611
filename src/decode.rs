//! Decoding units from a byte source.
//!
//! [`UnitReader`] is the one capability every downstream helper is written against: the
//! pair readers and skip engine in [`walk`](crate::walk), the [map scanner](crate::scan) and
//! the [demultiplexer](crate::demux). [`Decoder`] implements it over any `std::io::Read`;
//! demultiplexer branches implement it over a hand-off queue.
//!
//! ## Exclusive access
//!
//! The decoder keeps its source behind a mutex and acquires it at the start of every
//! [`read_unit`](UnitReader::read_unit). For every unit except `BinStream` the lock is released
//! before returning. For `BinStream` the owned guard moves into the returned
//! [`BinStreamReader`], which releases it when the stream terminator is consumed (or the
//! stream is fast-forwarded). Until then any further `read_unit` on the same decoder blocks:
//! calling it from the thread that holds the stream deadlocks. This is a caller contract.

use crate::binstream::BinStreamReader;
use crate::error::{CodecError, Result};
use crate::unit::{Unit, UnitType};
use byteorder::{LittleEndian, ReadBytesExt};
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;
use tracing::trace;

/// Decode the next unit.
pub trait UnitReader {
    fn read_unit(&self) -> Result<Unit>;
}

impl<T: UnitReader + ?Sized> UnitReader for &T {
    fn read_unit(&self) -> Result<Unit> {
        (**self).read_unit()
    }
}

impl<T: UnitReader + ?Sized> UnitReader for Box<T> {
    fn read_unit(&self) -> Result<Unit> {
        (**self).read_unit()
    }
}

impl<T: UnitReader + ?Sized> UnitReader for Arc<T> {
    fn read_unit(&self) -> Result<Unit> {
        (**self).read_unit()
    }
}

/// Byte source plus the poison flag set when a stream handle is dropped mid-stream.
pub(crate) struct SharedSource {
    pub(crate) reader: Box<dyn Read + Send>,
    pub(crate) abandoned: bool,
}

pub(crate) type SourceGuard = ArcMutexGuard<RawMutex, SharedSource>;

/// [`UnitReader`] over a `std::io::Read` source.
pub struct Decoder {
    source: Arc<Mutex<SharedSource>>,
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("locked", &self.source.is_locked())
            .finish()
    }
}

impl Decoder {
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        Decoder {
            source: Arc::new(Mutex::new(SharedSource {
                reader: Box::new(reader),
                abandoned: false,
            })),
        }
    }

    /// True while a unit is being decoded or a returned binary stream is still open.
    pub fn is_locked(&self) -> bool {
        self.source.is_locked()
    }
}

impl UnitReader for Decoder {
    fn read_unit(&self) -> Result<Unit> {
        let mut guard = self.source.lock_arc();
        if guard.abandoned {
            return Err(CodecError::StreamAbandoned);
        }

        let tag = match guard.reader.read_u8() {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(CodecError::EndOfInput),
            Err(e) => return Err(e.into()),
        };
        let ut = UnitType::try_from(tag)?;
        trace!(unit = ut.name(), "decoding unit");

        let r = &mut guard.reader;
        let unit = match ut {
            UnitType::Nil => Unit::Nil,
            UnitType::Request => Unit::Request(r.read_u16::<LittleEndian>()?),
            UnitType::Answer => Unit::Answer(r.read_u16::<LittleEndian>()?),
            UnitType::Event => Unit::Event(r.read_u16::<LittleEndian>()?),
            UnitType::Bin => Unit::Bin(read_bin(r)?),
            UnitType::Number => Unit::Number(r.read_i64::<LittleEndian>()?),
            UnitType::List => Unit::List,
            UnitType::TextKVMap => Unit::TextKVMap,
            UnitType::IdKVMap => Unit::IdKVMap,
            UnitType::UKey => Unit::UKey(r.read_u8()?),
            UnitType::BinStream => return Ok(Unit::BinStream(BinStreamReader::new(guard))),
            UnitType::Term => Unit::Term,
            UnitType::Bool => Unit::Bool(r.read_u8()? != 0),
            UnitType::Byte => Unit::Byte(r.read_u8()?),
        };
        Ok(unit)
    }
}

/// Length-prefixed block. Grows with the data actually received rather than trusting the
/// declared length for the allocation.
fn read_bin<R: Read + ?Sized>(r: &mut R) -> Result<Vec<u8>> {
    let len = r.read_u32::<LittleEndian>()? as u64;
    let mut buf = Vec::new();
    let got = r.take(len).read_to_end(&mut buf)? as u64;
    if got < len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(buf)
}

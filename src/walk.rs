//! Structure-only traversal: key/value pair readers and the bounded-depth skip engine.
//!
//! Everything here is written against [`UnitReader`], so it works the same on a raw
//! [`Decoder`](crate::decode::Decoder) and on a [demultiplexer](crate::demux) branch.
//!
//! ## Skipping
//!
//! [`skip_unit`] consumes an already decoded unit together with everything nested in it:
//!
//! | Unit | Skipped by |
//! |------|------------|
//! | scalars, `Term` | nothing to do |
//! | `List` | reading units until `Term`, skipping each |
//! | `TextKVMap` / `IdKVMap` | reading pairs until the map ends, skipping each value; text keys are not UTF-8 checked |
//! | `BinStream` | [`fast_forward`](crate::binstream::BinStreamReader::fast_forward) |
//!
//! Recursion carries a remaining-depth counter starting at [`MAX_SKIP_DEPTH`]. The counter is
//! checked on entry, so a subtree deeper than the bound fails with
//! [`CodecError::TooDeeplyNested`] before the call stack can grow further.

use crate::decode::UnitReader;
use crate::error::{CodecError, Result};
use crate::unit::{Unit, UnitType};

/// Remaining-depth budget [`skip_unit`] starts with.
pub const MAX_SKIP_DEPTH: usize = 16;

/// One entry of an IdKVMap body.
#[derive(Debug)]
pub struct IdKVPair {
    pub key: u8,
    pub value: Unit,
}

/// One entry of a TextKVMap body.
#[derive(Debug)]
pub struct TextKVPair {
    pub key: String,
    pub value: Unit,
}

/// Read a `UKey` + value pair. `Ok(None)` means the map's `Term` was read.
pub fn read_id_kv_pair<U: UnitReader + ?Sized>(ur: &U) -> Result<Option<IdKVPair>> {
    let key = match ur.read_unit()? {
        Unit::UKey(k) => k,
        Unit::Term => return Ok(None),
        other => return Err(CodecError::UnexpectedUnit(other.unit_type())),
    };
    let value = ur.read_unit()?;
    Ok(Some(IdKVPair { key, value }))
}

/// Read a `Bin` (UTF-8 key) + value pair. `Ok(None)` means the map's `Term` was read.
///
/// A key that is not valid UTF-8 yields [`CodecError::InvalidTextKey`] after its value has been
/// skipped, so the stream is positioned after the pair.
pub fn read_text_kv_pair<U: UnitReader + ?Sized>(ur: &U) -> Result<Option<TextKVPair>> {
    let (raw, value) = match read_raw_text_pair(ur)? {
        Some(pair) => pair,
        None => return Ok(None),
    };
    match String::from_utf8(raw) {
        Ok(key) => Ok(Some(TextKVPair { key, value })),
        Err(_) => {
            skip_unit(ur, value)?;
            Err(CodecError::InvalidTextKey)
        }
    }
}

/// Key bytes and value of a TextKVMap entry, without UTF-8 validation.
fn read_raw_text_pair<U: UnitReader + ?Sized>(ur: &U) -> Result<Option<(Vec<u8>, Unit)>> {
    let raw = match ur.read_unit()? {
        Unit::Bin(b) => b,
        Unit::Term => return Ok(None),
        other => return Err(CodecError::UnexpectedUnit(other.unit_type())),
    };
    let value = ur.read_unit()?;
    Ok(Some((raw, value)))
}

/// Discard `unit` and everything nested inside it.
pub fn skip_unit<U: UnitReader + ?Sized>(ur: &U, unit: Unit) -> Result<()> {
    skip_unit_with_depth(ur, unit, MAX_SKIP_DEPTH)
}

/// [`skip_unit`] with a caller-chosen depth budget.
pub fn skip_unit_with_depth<U: UnitReader + ?Sized>(ur: &U, unit: Unit, depth: usize) -> Result<()> {
    if depth == 0 {
        return Err(CodecError::TooDeeplyNested);
    }

    match unit {
        Unit::Nil
        | Unit::Request(_)
        | Unit::Answer(_)
        | Unit::Event(_)
        | Unit::Bin(_)
        | Unit::Number(_)
        | Unit::UKey(_)
        | Unit::Term
        | Unit::Bool(_)
        | Unit::Byte(_) => Ok(()),
        Unit::List => loop {
            match ur.read_unit()? {
                Unit::Term => return Ok(()),
                item => skip_unit_with_depth(ur, item, depth - 1)?,
            }
        },
        Unit::TextKVMap => {
            // Keys are not UTF-8 checked while skipping.
            while let Some((_, value)) = read_raw_text_pair(ur)? {
                skip_unit_with_depth(ur, value, depth - 1)?;
            }
            Ok(())
        }
        Unit::IdKVMap => {
            while let Some(pair) = read_id_kv_pair(ur)? {
                skip_unit_with_depth(ur, pair.value, depth - 1)?;
            }
            Ok(())
        }
        Unit::BinStream(mut stream) => stream.fast_forward().map(|_| ()),
    }
}

/// Read one unit and skip it.
pub fn skip_next<U: UnitReader + ?Sized>(ur: &U) -> Result<()> {
    let unit = ur.read_unit()?;
    skip_unit(ur, unit)
}

/// Read one unit and require it to be of type `expected`.
///
/// On a mismatch the unit is skipped so the stream stays well-formed and
/// [`CodecError::UnexpectedUnit`] is returned. If that skip fails, its error is returned
/// instead: the stream is then in an unknown state, which matters more than the mismatch.
pub fn read_expect<U: UnitReader + ?Sized>(ur: &U, expected: UnitType) -> Result<Unit> {
    let unit = ur.read_unit()?;
    let found = unit.unit_type();
    if found == expected {
        return Ok(unit);
    }
    skip_unit(ur, unit)?;
    Err(CodecError::UnexpectedUnit(found))
}

//! Declarative extraction of known fields from an IdKVMap.
//!
//! Register one expectation per numeric key (value type, mandatory or optional, action to run)
//! and let [`IdKVMapScanner::scan`] walk the map body up to its `Term`:
//!
//! ```no_run
//! use binproto::{Decoder, IdKVMapScanner, UnitType};
//! use binproto::scan::{store_number, store_bool};
//!
//! # fn demo(decoder: &Decoder) -> binproto::Result<()> {
//! let mut id = 0i64;
//! let mut verbose = false;
//! let mut scanner = IdKVMapScanner::new()
//!     .field(1, UnitType::Number, store_number(&mut id))
//!     .optional(2, UnitType::Bool, store_bool(&mut verbose));
//! scanner.scan(decoder, false)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error semantics
//!
//! Recoverable problems (unknown key under the strict policy, wrong value type, a
//! [`ActionOutcome::Recoverable`] action result) are remembered and the scanner switches to
//! drain-only mode: the remaining units up to `Term` are skipped without further processing,
//! leaving the stream positioned right after the map. The remembered error is then returned and
//! the mandatory-key check is not performed.
//!
//! A [`ActionOutcome::Fatal`] result is returned at once without draining; the stream position is
//! undefined afterwards and the connection should be abandoned.
//!
//! Actions run as soon as their pair is read, so an error from a later field can be reported
//! after earlier actions have already stored their values.

use crate::decode::UnitReader;
use crate::error::{CodecError, Result};
use crate::unit::{Unit, UnitType};
use crate::walk::skip_unit;
use std::collections::BTreeMap;
use std::io::{self, Write};
use tracing::debug;

/// Result of a getter action.
#[derive(Debug)]
pub enum ActionOutcome {
    /// The value was handled; the stream is positioned right after it.
    Done,
    /// The value could not be used, but the stream is positioned right after it.
    Recoverable(CodecError),
    /// The stream position is unknown.
    Fatal(CodecError),
}

pub type GetterAction<'a> = Box<dyn FnMut(Unit, &dyn UnitReader) -> ActionOutcome + 'a>;

/// Expectation for one key of an IdKVMap.
pub struct UKeyGetter<'a> {
    unit_type: UnitType,
    optional: bool,
    action: GetterAction<'a>,
    captured: bool,
}

impl<'a> UKeyGetter<'a> {
    pub fn new<F>(unit_type: UnitType, optional: bool, action: F) -> Self
    where
        F: FnMut(Unit, &dyn UnitReader) -> ActionOutcome + 'a,
    {
        UKeyGetter {
            unit_type,
            optional,
            action: Box::new(action),
            captured: false,
        }
    }

    pub fn unit_type(&self) -> UnitType {
        self.unit_type
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// True if the key was found and its action completed during the last scan.
    pub fn captured(&self) -> bool {
        self.captured
    }
}

/// Table of [`UKeyGetter`]s keyed by UKey.
#[derive(Default)]
pub struct IdKVMapScanner<'a> {
    getters: BTreeMap<u8, UKeyGetter<'a>>,
}

impl<'a> IdKVMapScanner<'a> {
    pub fn new() -> Self {
        IdKVMapScanner {
            getters: BTreeMap::new(),
        }
    }

    /// Register a mandatory key.
    pub fn field<F>(self, key: u8, unit_type: UnitType, action: F) -> Self
    where
        F: FnMut(Unit, &dyn UnitReader) -> ActionOutcome + 'a,
    {
        self.getter(key, UKeyGetter::new(unit_type, false, action))
    }

    /// Register an optional key.
    pub fn optional<F>(self, key: u8, unit_type: UnitType, action: F) -> Self
    where
        F: FnMut(Unit, &dyn UnitReader) -> ActionOutcome + 'a,
    {
        self.getter(key, UKeyGetter::new(unit_type, true, action))
    }

    /// Register a prepared getter, replacing any previous one for `key`.
    pub fn getter(mut self, key: u8, getter: UKeyGetter<'a>) -> Self {
        self.getters.insert(key, getter);
        self
    }

    pub fn captured(&self, key: u8) -> bool {
        self.getters.get(&key).map_or(false, UKeyGetter::captured)
    }

    /// Consume an IdKVMap body through its `Term`. The reader must be positioned right after the
    /// `IdKVMap` opening.
    pub fn scan<U: UnitReader + ?Sized>(&mut self, ur: &U, fail_on_unknown: bool) -> Result<()> {
        let dyn_ur: &dyn UnitReader = &ur;
        for getter in self.getters.values_mut() {
            getter.captured = false;
        }

        let mut pending: Option<CodecError> = None;
        loop {
            let unit = ur.read_unit()?;
            if let Unit::Term = unit {
                break;
            }

            if let Some(p) = &pending {
                if let Err(e) = skip_unit(ur, unit) {
                    return Err(CodecError::DrainFailed {
                        cause: Box::new(e),
                        pending: Box::new(p.clone()),
                    });
                }
                continue;
            }

            let key = match unit {
                Unit::UKey(k) => k,
                other => return Err(CodecError::UnexpectedUnit(other.unit_type())),
            };
            let value = ur.read_unit()?;

            let getter = match self.getters.get_mut(&key) {
                Some(g) => g,
                None => {
                    skip_unit(ur, value)?;
                    if fail_on_unknown {
                        debug!(key, "unknown key in IdKVMap, draining");
                        pending = Some(CodecError::UnknownKey(key));
                    }
                    continue;
                }
            };

            let found = value.unit_type();
            if found != getter.unit_type {
                skip_unit(ur, value)?;
                debug!(key, expected = getter.unit_type.name(), found = found.name(), "unexpected value type, draining");
                pending = Some(CodecError::UnexpectedTypeForKey {
                    key,
                    expected: getter.unit_type,
                    found,
                });
                continue;
            }

            match (getter.action)(value, dyn_ur) {
                ActionOutcome::Done => getter.captured = true,
                ActionOutcome::Recoverable(e) => {
                    debug!(key, error = %e, "action failed, draining");
                    pending = Some(e);
                }
                ActionOutcome::Fatal(e) => return Err(e),
            }
        }

        if let Some(e) = pending {
            return Err(e);
        }
        match self.getters.iter().find(|(_, g)| !g.optional && !g.captured) {
            Some((&key, _)) => Err(CodecError::KeyMissing(key)),
            None => Ok(()),
        }
    }
}

/// Skip a value whose type did not match what an action can store.
///
/// Reached when a stock action is registered under a different unit type than the one it
/// stores, or called directly outside [`IdKVMapScanner::scan`].
fn reject(unit: Unit, ur: &dyn UnitReader) -> ActionOutcome {
    let found = unit.unit_type();
    match skip_unit(ur, unit) {
        Ok(()) => ActionOutcome::Recoverable(CodecError::UnexpectedUnit(found)),
        Err(e) => ActionOutcome::Fatal(e),
    }
}

// Stock actions. Each one also accepts any other unit: it skips it and reports
// `Recoverable(UnexpectedUnit)`, or `Fatal` if the skip fails.

/// Skip the value; useful when only the presence of a key matters.
pub fn skip_value() -> impl FnMut(Unit, &dyn UnitReader) -> ActionOutcome {
    |unit: Unit, ur: &dyn UnitReader| match skip_unit(ur, unit) {
        Ok(()) => ActionOutcome::Done,
        Err(e) => ActionOutcome::Fatal(e),
    }
}

pub fn store_number(slot: &mut i64) -> impl FnMut(Unit, &dyn UnitReader) -> ActionOutcome + '_ {
    move |unit: Unit, ur: &dyn UnitReader| match unit {
        Unit::Number(n) => {
            *slot = n;
            ActionOutcome::Done
        }
        other => reject(other, ur),
    }
}

pub fn store_bin(slot: &mut Vec<u8>) -> impl FnMut(Unit, &dyn UnitReader) -> ActionOutcome + '_ {
    move |unit: Unit, ur: &dyn UnitReader| match unit {
        Unit::Bin(b) => {
            *slot = b;
            ActionOutcome::Done
        }
        other => reject(other, ur),
    }
}

pub fn store_bool(slot: &mut bool) -> impl FnMut(Unit, &dyn UnitReader) -> ActionOutcome + '_ {
    move |unit: Unit, ur: &dyn UnitReader| match unit {
        Unit::Bool(b) => {
            *slot = b;
            ActionOutcome::Done
        }
        other => reject(other, ur),
    }
}

pub fn store_byte(slot: &mut u8) -> impl FnMut(Unit, &dyn UnitReader) -> ActionOutcome + '_ {
    move |unit: Unit, ur: &dyn UnitReader| match unit {
        Unit::Byte(b) => {
            *slot = b;
            ActionOutcome::Done
        }
        other => reject(other, ur),
    }
}

/// Copy a BinStream value into `w`.
///
/// If the copy fails the rest of the stream is fast-forwarded and the failure is recoverable;
/// if fast-forwarding fails too the stream is corrupted and the failure is fatal.
pub fn copy_bin_stream<'a, W: Write + 'a>(
    mut w: W,
) -> impl FnMut(Unit, &dyn UnitReader) -> ActionOutcome + 'a {
    move |unit: Unit, ur: &dyn UnitReader| {
        let mut stream = match unit {
            Unit::BinStream(s) => s,
            other => return reject(other, ur),
        };
        match io::copy(&mut stream, &mut w) {
            Ok(_) => ActionOutcome::Done,
            Err(e) => {
                let err = CodecError::from(e);
                match stream.fast_forward() {
                    Ok(_) => ActionOutcome::Recoverable(err),
                    Err(ff) => ActionOutcome::Fatal(ff),
                }
            }
        }
    }
}

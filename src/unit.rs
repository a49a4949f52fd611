//! Unit vocabulary: the closed set of tags and the payload each one carries.

use crate::binstream::BinStreamReader;
use crate::error::CodecError;
use std::fmt;

/// Tag byte of a unit on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum UnitType {
    Nil = 0,
    Request = 1,
    Answer = 2,
    Event = 3,
    Bin = 4,
    Number = 5,
    List = 6,
    TextKVMap = 7,
    IdKVMap = 8,
    UKey = 9,
    BinStream = 10,
    Term = 11,
    Bool = 12,
    Byte = 13,
}

impl UnitType {
    pub const ALL: [UnitType; 14] = [
        UnitType::Nil,
        UnitType::Request,
        UnitType::Answer,
        UnitType::Event,
        UnitType::Bin,
        UnitType::Number,
        UnitType::List,
        UnitType::TextKVMap,
        UnitType::IdKVMap,
        UnitType::UKey,
        UnitType::BinStream,
        UnitType::Term,
        UnitType::Bool,
        UnitType::Byte,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UnitType::Nil => "Nil",
            UnitType::Request => "Request",
            UnitType::Answer => "Answer",
            UnitType::Event => "Event",
            UnitType::Bin => "Bin",
            UnitType::Number => "Number",
            UnitType::List => "List",
            UnitType::TextKVMap => "TextKVMap",
            UnitType::IdKVMap => "IdKVMap",
            UnitType::UKey => "UKey",
            UnitType::BinStream => "BinStream",
            UnitType::Term => "Term",
            UnitType::Bool => "Bool",
            UnitType::Byte => "Byte",
        }
    }

    /// List, TextKVMap and IdKVMap open a container that a Term closes.
    pub fn is_opening(self) -> bool {
        matches!(self, UnitType::List | UnitType::TextKVMap | UnitType::IdKVMap)
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), *self as u8)
    }
}

impl TryFrom<u8> for UnitType {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        UnitType::ALL
            .get(tag as usize)
            .copied()
            .ok_or(CodecError::UnknownUnit(tag))
    }
}

/// One decoded unit.
///
/// Container openings (`List`, `TextKVMap`, `IdKVMap`) carry no payload; their body follows
/// as further units up to the matching `Term`. A `BinStream` carries the live reader for its
/// chunked payload, which holds the decoder until it reaches the stream terminator.
#[derive(Debug)]
pub enum Unit {
    Nil,
    Request(u16),
    Answer(u16),
    Event(u16),
    Bin(Vec<u8>),
    Number(i64),
    List,
    TextKVMap,
    IdKVMap,
    UKey(u8),
    BinStream(BinStreamReader),
    Term,
    Bool(bool),
    Byte(u8),
}

impl Unit {
    pub fn unit_type(&self) -> UnitType {
        match self {
            Unit::Nil => UnitType::Nil,
            Unit::Request(_) => UnitType::Request,
            Unit::Answer(_) => UnitType::Answer,
            Unit::Event(_) => UnitType::Event,
            Unit::Bin(_) => UnitType::Bin,
            Unit::Number(_) => UnitType::Number,
            Unit::List => UnitType::List,
            Unit::TextKVMap => UnitType::TextKVMap,
            Unit::IdKVMap => UnitType::IdKVMap,
            Unit::UKey(_) => UnitType::UKey,
            Unit::BinStream(_) => UnitType::BinStream,
            Unit::Term => UnitType::Term,
            Unit::Bool(_) => UnitType::Bool,
            Unit::Byte(_) => UnitType::Byte,
        }
    }

    pub fn is_opening(&self) -> bool {
        self.unit_type().is_opening()
    }

    /// Code of a Request, Answer or Event.
    pub fn code(&self) -> Option<u16> {
        match self {
            Unit::Request(c) | Unit::Answer(c) | Unit::Event(c) => Some(*c),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<i64> {
        match self {
            Unit::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn bin(&self) -> Option<&[u8]> {
        match self {
            Unit::Bin(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_bin(self) -> Option<Vec<u8>> {
        match self {
            Unit::Bin(b) => Some(b),
            _ => None,
        }
    }

    pub fn ukey(&self) -> Option<u8> {
        match self {
            Unit::UKey(k) => Some(*k),
            _ => None,
        }
    }

    pub fn byte(&self) -> Option<u8> {
        match self {
            Unit::Byte(b) => Some(*b),
            _ => None,
        }
    }

    pub fn boolean(&self) -> Option<bool> {
        match self {
            Unit::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<BinStreamReader> {
        match self {
            Unit::BinStream(s) => Some(s),
            _ => None,
        }
    }
}

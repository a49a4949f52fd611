//! # binproto: tagged binary unit codec
//!
//! A self-describing binary wire protocol built from tagged *units*: scalars, container
//! openings closed by `Term`, and a chunked binary stream. Request/answer/event style
//! protocols are built on top of it.
//!
//! ## Wire format
//!
//! | Tag | Unit | Payload |
//! |-----|------|---------|
//! | 0 | Nil | none |
//! | 1 | Request | `u16` LE code |
//! | 2 | Answer | `u16` LE code |
//! | 3 | Event | `u16` LE code |
//! | 4 | Bin | `u32` LE length, bytes |
//! | 5 | Number | `i64` LE |
//! | 6 | List | none; units until `Term` |
//! | 7 | TextKVMap | none; (Bin key, value) pairs until `Term` |
//! | 8 | IdKVMap | none; (UKey, value) pairs until `Term` |
//! | 9 | UKey | 1 byte |
//! | 10 | BinStream | chunks of `i32` LE length > 0 + bytes, ended by `-1` |
//! | 11 | Term | none |
//! | 12 | Bool | 1 byte, 0 = false |
//! | 13 | Byte | 1 byte |
//!
//! ## Modules
//!
//! - [`encode`]: one function per unit kind.
//! - [`decode`]: [`UnitReader`] and the [`Decoder`] over `std::io::Read`.
//! - [`binstream`]: chunked stream reader/writer; the reader owns the decoder lock.
//! - [`walk`]: key/value pair readers, bounded-depth skipping, [`read_expect`].
//! - [`scan`]: declarative IdKVMap field extraction.
//! - [`demux`]: splitting events from other traffic.
//! - [`dump`], [`command`], [`config`]: support for the `binproto-debug` harness.
//!
//! ## Example
//!
//! ```
//! use binproto::{encode, read_expect, Decoder, UnitType};
//!
//! let mut buf = Vec::new();
//! encode::init_request(&mut buf, 42).unwrap();
//! encode::send_number(&mut buf, -7).unwrap();
//!
//! let decoder = Decoder::new(std::io::Cursor::new(buf));
//! let request = read_expect(&decoder, UnitType::Request).unwrap();
//! assert_eq!(request.code(), Some(42));
//! let n = read_expect(&decoder, UnitType::Number).unwrap();
//! assert_eq!(n.number(), Some(-7));
//! ```

pub mod binstream;
pub mod command;
pub mod config;
pub mod decode;
pub mod demux;
pub mod dump;
pub mod encode;
pub mod error;
pub mod scan;
pub mod unit;
pub mod walk;

pub use binstream::{BinStreamReader, BinStreamWriter};
pub use decode::{Decoder, UnitReader};
pub use demux::{Demux, DemuxBranch};
pub use error::{CodecError, Result};
pub use scan::{ActionOutcome, IdKVMapScanner, UKeyGetter};
pub use unit::{Unit, UnitType};
pub use walk::{
    read_expect, read_id_kv_pair, read_text_kv_pair, skip_next, skip_unit, skip_unit_with_depth,
    IdKVPair, TextKVPair, MAX_SKIP_DEPTH,
};

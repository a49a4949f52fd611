//! Encoding units onto a byte sink.
//!
//! One function per unit kind. Each writes the tag byte and payload and reports only I/O
//! failures: nothing checks that containers are balanced or that keys precede values.

use crate::binstream::BinStreamWriter;
use crate::unit::UnitType;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

fn send_tag<W: Write + ?Sized>(w: &mut W, ut: UnitType) -> io::Result<()> {
    w.write_u8(ut as u8)
}

fn send_code<W: Write + ?Sized>(w: &mut W, ut: UnitType, code: u16) -> io::Result<()> {
    let mut buf = [ut as u8, 0, 0];
    buf[1..].copy_from_slice(&code.to_le_bytes());
    w.write_all(&buf)
}

fn send_typed_byte<W: Write + ?Sized>(w: &mut W, ut: UnitType, b: u8) -> io::Result<()> {
    w.write_all(&[ut as u8, b])
}

pub fn send_nil<W: Write + ?Sized>(w: &mut W) -> io::Result<()> {
    send_tag(w, UnitType::Nil)
}

pub fn init_request<W: Write + ?Sized>(w: &mut W, code: u16) -> io::Result<()> {
    send_code(w, UnitType::Request, code)
}

pub fn init_answer<W: Write + ?Sized>(w: &mut W, code: u16) -> io::Result<()> {
    send_code(w, UnitType::Answer, code)
}

pub fn init_event<W: Write + ?Sized>(w: &mut W, code: u16) -> io::Result<()> {
    send_code(w, UnitType::Event, code)
}

/// Tag, `u32` little-endian length, raw bytes.
pub fn send_bin<W: Write + ?Sized>(w: &mut W, data: &[u8]) -> io::Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "bin payload longer than u32::MAX")
    })?;
    send_tag(w, UnitType::Bin)?;
    w.write_u32::<LittleEndian>(len)?;
    w.write_all(data)
}

/// A text key is a Bin holding the UTF-8 bytes of `key`.
pub fn send_text_key<W: Write + ?Sized>(w: &mut W, key: &str) -> io::Result<()> {
    send_bin(w, key.as_bytes())
}

pub fn send_number<W: Write + ?Sized>(w: &mut W, n: i64) -> io::Result<()> {
    send_tag(w, UnitType::Number)?;
    w.write_i64::<LittleEndian>(n)
}

pub fn init_list<W: Write + ?Sized>(w: &mut W) -> io::Result<()> {
    send_tag(w, UnitType::List)
}

pub fn init_text_kv_map<W: Write + ?Sized>(w: &mut W) -> io::Result<()> {
    send_tag(w, UnitType::TextKVMap)
}

pub fn init_id_kv_map<W: Write + ?Sized>(w: &mut W) -> io::Result<()> {
    send_tag(w, UnitType::IdKVMap)
}

pub fn send_ukey<W: Write + ?Sized>(w: &mut W, key: u8) -> io::Result<()> {
    send_typed_byte(w, UnitType::UKey, key)
}

pub fn send_bool<W: Write + ?Sized>(w: &mut W, b: bool) -> io::Result<()> {
    send_typed_byte(w, UnitType::Bool, u8::from(b))
}

pub fn send_byte<W: Write + ?Sized>(w: &mut W, b: u8) -> io::Result<()> {
    send_typed_byte(w, UnitType::Byte, b)
}

pub fn send_term<W: Write + ?Sized>(w: &mut W) -> io::Result<()> {
    send_tag(w, UnitType::Term)
}

/// Write the `BinStream` tag and return a writer for its chunks. Pass `&mut sink` to keep
/// using the sink after the stream is closed.
pub fn init_bin_stream<W: Write>(mut w: W) -> io::Result<BinStreamWriter<W>> {
    send_tag(&mut w, UnitType::BinStream)?;
    Ok(BinStreamWriter::new(w))
}

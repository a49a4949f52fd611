//! Human-readable rendering of a unit stream, used by the `binproto-debug` harness.

use crate::decode::UnitReader;
use crate::error::Result;
use crate::unit::Unit;
use std::fmt::Write as _;
use std::io::{self, Read, Write};

const HEX_LINE: usize = 16;

/// Print every unit from `ur` on its own line until the source ends.
///
/// Each line starts with `prefix`, followed by one space of indentation per open container.
/// Bin payloads are quoted; BinStream payloads are hex-dumped below their unit line. A clean end
/// of input returns `Ok(())`; any other decode error is returned.
pub fn display_units<U, W>(ur: &U, prefix: &str, out: &mut W) -> Result<()>
where
    U: UnitReader + ?Sized,
    W: Write + ?Sized,
{
    let mut depth = 0usize;
    loop {
        let unit = match ur.read_unit() {
            Ok(u) => u,
            Err(e) if e.is_end_of_input() => return Ok(()),
            Err(e) => return Err(e),
        };
        if let Unit::Term = unit {
            depth = depth.saturating_sub(1);
        }
        let indent = " ".repeat(depth);
        match unit {
            Unit::BinStream(mut stream) => {
                writeln!(out, "{prefix}{indent}Binstream")?;
                hex_dump(&mut stream, out)?;
            }
            other => {
                writeln!(out, "{prefix}{indent}{}", describe(&other))?;
                if other.is_opening() {
                    depth += 1;
                }
            }
        }
    }
}

/// One-line description of a unit without its nested content.
pub fn describe(unit: &Unit) -> String {
    match unit {
        Unit::Nil => "Nil".to_string(),
        Unit::Request(c) => format!("Request {c}"),
        Unit::Answer(c) => format!("Answer {c}"),
        Unit::Event(c) => format!("Event {c}"),
        Unit::Bin(b) => format!("Bin {:?}", String::from_utf8_lossy(b)),
        Unit::Number(n) => format!("Num {n}"),
        Unit::List => "List".to_string(),
        Unit::TextKVMap => "TextKVMap".to_string(),
        Unit::IdKVMap => "IdKVMap".to_string(),
        Unit::UKey(k) => format!("UKey {k}"),
        Unit::BinStream(_) => "Binstream".to_string(),
        Unit::Term => "Term".to_string(),
        Unit::Bool(b) => format!("Bool {b}"),
        Unit::Byte(b) => format!("Byte {b}"),
    }
}

/// Hex-dump everything `r` yields, 16 bytes per line. Returns the number of bytes dumped.
pub fn hex_dump<R, W>(r: &mut R, out: &mut W) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut offset = 0u64;
    let mut line = [0u8; HEX_LINE];
    loop {
        let mut filled = 0;
        while filled < HEX_LINE {
            match r.read(&mut line[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        if filled == 0 {
            return Ok(offset);
        }
        writeln!(out, "{}", hex_line(offset, &line[..filled]))?;
        offset += filled as u64;
        if filled < HEX_LINE {
            return Ok(offset);
        }
    }
}

/// `00000000  68 65 6c 6c 6f 2c 20 77  6f 72 6c 64 21           |hello, world!|`
pub fn hex_line(offset: u64, bytes: &[u8]) -> String {
    let mut s = format!("{offset:08x}  ");
    for i in 0..HEX_LINE {
        match bytes.get(i) {
            Some(b) => {
                let _ = write!(s, "{b:02x} ");
            }
            None => s.push_str("   "),
        }
        if i == 7 {
            s.push(' ');
        }
    }
    s.push_str(" |");
    s.extend(bytes.iter().map(|&b| {
        if b.is_ascii_graphic() || b == b' ' {
            b as char
        } else {
            '.'
        }
    }));
    s.push('|');
    s
}

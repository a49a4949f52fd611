//! Line-oriented command language of the debug harness.
//!
//! Each input line names one encoder operation and its argument, e.g. `request 42`,
//! `bin "hello\n"`, `ukey 0x10`, `binstream ./payload.bin`. Verbs are case-insensitive.
//! Numbers accept `0x`, `0o`, `0b` and leading-zero octal prefixes.

use crate::encode;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

pub const USAGE: &str = "One of:
Nil
Request <num>
Answer <num>
Event <num>
Bin <quoted string>
Number <num>
List
TextKVMap
IdKVMap
UKey <num>
Bool <true|false>
Byte <num>
BinStream <file>
Term
";

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
    #[error("{0} expects an argument")]
    MissingArgument(&'static str),
    #[error("could not parse number {text:?}: {reason}")]
    InvalidNumber { text: String, reason: String },
    #[error("could not interpret string: {0}")]
    InvalidString(String),
    #[error("could not open '{}': {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("IO: {0}")]
    Io(#[from] io::Error),
}

impl CommandError {
    /// Encoder I/O failures leave the connection unusable; everything else only rejects the line.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::Io(_))
    }

    /// Malformed input, after which the usage text should be shown again.
    pub fn wants_usage(&self) -> bool {
        !matches!(self, CommandError::Io(_) | CommandError::Open { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
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
    Bool(bool),
    Byte(u8),
    BinStream(PathBuf),
    Term,
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(None);
        }
        let (verb, arg) = match line.trim_start().split_once(' ') {
            Some((v, a)) => (v, Some(a.trim())),
            None => (line.trim(), None),
        };
        let arg = arg.filter(|a| !a.is_empty());

        let cmd = match verb.to_ascii_lowercase().as_str() {
            "nil" => Command::Nil,
            "request" => Command::Request(parse_int(require(arg, "request")?)?),
            "answer" => Command::Answer(parse_int(require(arg, "answer")?)?),
            "event" => Command::Event(parse_int(require(arg, "event")?)?),
            "bin" => Command::Bin(unquote(require(arg, "bin")?)?),
            "number" => Command::Number(parse_int(require(arg, "number")?)?),
            "list" => Command::List,
            "textkvmap" => Command::TextKVMap,
            "idkvmap" => Command::IdKVMap,
            "ukey" => Command::UKey(parse_int(require(arg, "ukey")?)?),
            "bool" => Command::Bool(parse_bool(require(arg, "bool")?)?),
            "byte" => Command::Byte(parse_int(require(arg, "byte")?)?),
            "binstream" => Command::BinStream(PathBuf::from(require(arg, "binstream")?)),
            "term" => Command::Term,
            _ => return Err(CommandError::UnknownCommand(verb.to_string())),
        };
        Ok(Some(cmd))
    }

    /// Encode this command onto `w`.
    pub fn send<W: Write + ?Sized>(&self, w: &mut W) -> Result<(), CommandError> {
        match self {
            Command::Nil => encode::send_nil(w)?,
            Command::Request(c) => encode::init_request(w, *c)?,
            Command::Answer(c) => encode::init_answer(w, *c)?,
            Command::Event(c) => encode::init_event(w, *c)?,
            Command::Bin(b) => encode::send_bin(w, b)?,
            Command::Number(n) => encode::send_number(w, *n)?,
            Command::List => encode::init_list(w)?,
            Command::TextKVMap => encode::init_text_kv_map(w)?,
            Command::IdKVMap => encode::init_id_kv_map(w)?,
            Command::UKey(k) => encode::send_ukey(w, *k)?,
            Command::Bool(b) => encode::send_bool(w, *b)?,
            Command::Byte(b) => encode::send_byte(w, *b)?,
            Command::BinStream(path) => {
                let mut file = File::open(path).map_err(|source| CommandError::Open {
                    path: path.clone(),
                    source,
                })?;
                let mut stream = encode::init_bin_stream(w)?;
                io::copy(&mut file, &mut stream)?;
                stream.close()?;
            }
            Command::Term => encode::send_term(w)?,
        }
        Ok(())
    }
}

fn require<'a>(arg: Option<&'a str>, verb: &'static str) -> Result<&'a str, CommandError> {
    arg.ok_or(CommandError::MissingArgument(verb))
}

fn invalid_number(text: &str, reason: impl ToString) -> CommandError {
    CommandError::InvalidNumber {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_int<T: TryFrom<i128>>(text: &str) -> Result<T, CommandError> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(d) = lower.strip_prefix("0x") {
        (16, d)
    } else if let Some(d) = lower.strip_prefix("0o") {
        (8, d)
    } else if let Some(d) = lower.strip_prefix("0b") {
        (2, d)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };
    let digits = digits.replace('_', "");
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(invalid_number(text, "invalid syntax"));
    }
    let magnitude = i128::from_str_radix(&digits, radix).map_err(|e| invalid_number(text, e))?;
    let value = if negative { -magnitude } else { magnitude };
    T::try_from(value).map_err(|_| invalid_number(text, "value out of range"))
}

fn parse_bool(text: &str) -> Result<bool, CommandError> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(CommandError::InvalidString(format!("not a boolean: {text:?}"))),
    }
}

/// Decode a double-quoted string with backslash escapes, or a raw backquoted string.
fn unquote(text: &str) -> Result<Vec<u8>, CommandError> {
    let bad = |why: &str| CommandError::InvalidString(why.to_string());

    if text.len() >= 2 && text.starts_with('`') && text.ends_with('`') {
        let inner = &text[1..text.len() - 1];
        if inner.contains('`') {
            return Err(bad("backquote inside raw string"));
        }
        return Ok(inner.as_bytes().to_vec());
    }
    if text.len() < 2 || !text.starts_with('"') || !text.ends_with('"') {
        return Err(bad("missing quotes"));
    }

    let inner = &text[1..text.len() - 1];
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Err(bad("unescaped quote")),
            '\\' => {
                let esc = chars.next().ok_or_else(|| bad("trailing backslash"))?;
                match esc {
                    'n' => out.push(b'\n'),
                    't' => out.push(b'\t'),
                    'r' => out.push(b'\r'),
                    'a' => out.push(0x07),
                    'b' => out.push(0x08),
                    'f' => out.push(0x0c),
                    'v' => out.push(0x0b),
                    '\\' => out.push(b'\\'),
                    '"' => out.push(b'"'),
                    '\'' => out.push(b'\''),
                    'x' => {
                        let hex: String = chars.by_ref().take(2).collect();
                        let b = u8::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|_| hex.len() == 2)
                            .ok_or_else(|| bad("invalid \\x escape"))?;
                        out.push(b);
                    }
                    'u' => {
                        let hex: String = chars.by_ref().take(4).collect();
                        let ch = u32::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|_| hex.len() == 4)
                            .and_then(char::from_u32)
                            .ok_or_else(|| bad("invalid \\u escape"))?;
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                    }
                    _ => return Err(bad("unknown escape sequence")),
                }
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    Ok(out)
}

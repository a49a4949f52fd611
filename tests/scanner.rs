//! IdKVMap scanner: mandatory/optional keys, unknown-key policy, type checks and action outcomes.

use binproto::encode::*;
use binproto::scan::{copy_bin_stream, skip_value, store_bin, store_bool, store_byte, store_number};
use binproto::{
    ActionOutcome, CodecError, Decoder, IdKVMapScanner, UKeyGetter, Unit, UnitReader, UnitType,
};
use std::io::{self, Cursor, Write};

/// Map body (the `IdKVMap` opening already consumed): keys 1, 2, 3 (a list) and 4, then `Term`.
const BODY: &[u8] = &[
    0x09, 0x01, // UKey(1)
    0x05, 0x2a, 0, 0, 0, 0, 0, 0, 0, // Number(42)
    0x09, 0x02, // UKey(2)
    0x0c, 0x00, // Bool(false)
    0x09, 0x03, // UKey(3)
    0x06, // List
    0x05, 0x01, 0, 0, 0, 0, 0, 0, 0, // Number(1)
    0x05, 0x02, 0, 0, 0, 0, 0, 0, 0, // Number(2)
    0x05, 0x03, 0, 0, 0, 0, 0, 0, 0, // Number(3)
    0x0b, // Term
    0x09, 0x04, // UKey(4)
    0x04, 0x02, 0, 0, 0, b'h', b'i', // Bin("hi")
    0x0b, // Term
];

/// Same as [`BODY`] without key 2.
const BODY_WITHOUT_2: &[u8] = &[
    0x09, 0x01, // UKey(1)
    0x05, 0x2a, 0, 0, 0, 0, 0, 0, 0, // Number(42)
    0x09, 0x03, // UKey(3)
    0x06, // List
    0x05, 0x01, 0, 0, 0, 0, 0, 0, 0, // Number(1)
    0x05, 0x02, 0, 0, 0, 0, 0, 0, 0, // Number(2)
    0x05, 0x03, 0, 0, 0, 0, 0, 0, 0, // Number(3)
    0x0b, // Term
    0x09, 0x04, // UKey(4)
    0x04, 0x02, 0, 0, 0, b'h', b'i', // Bin("hi")
    0x0b, // Term
];

fn decoder(bytes: &[u8]) -> Decoder {
    Decoder::new(Cursor::new(bytes.to_vec()))
}

fn assert_consumed(ur: &Decoder) {
    assert!(ur.read_unit().expect_err("map fully consumed").is_end_of_input());
}

#[test]
fn test_regular_map() {
    let ur = decoder(BODY);
    let mut n1 = 0i64;
    let mut b2 = true;
    let mut bs4 = Vec::new();

    let mut scanner = IdKVMapScanner::new()
        .field(1, UnitType::Number, store_number(&mut n1))
        .field(2, UnitType::Bool, store_bool(&mut b2))
        .field(4, UnitType::Bin, store_bin(&mut bs4))
        .optional(5, UnitType::Nil, skip_value());
    scanner.scan(&ur, false).expect("scan");

    assert!(scanner.captured(1));
    assert!(scanner.captured(2));
    assert!(scanner.captured(4));
    assert!(!scanner.captured(5));
    assert!(!scanner.captured(3));
    drop(scanner);

    assert_eq!(n1, 42);
    assert!(!b2);
    assert_eq!(bs4, b"hi");
    assert_consumed(&ur);
}

fn skipping_scanner<'a>() -> IdKVMapScanner<'a> {
    IdKVMapScanner::new()
        .field(1, UnitType::Number, skip_value())
        .field(2, UnitType::Bool, skip_value())
        .field(4, UnitType::Bin, skip_value())
        .optional(5, UnitType::Nil, skip_value())
}

#[test]
fn test_fail_on_unknown() {
    let ur = decoder(BODY);
    let mut scanner = skipping_scanner();
    match scanner.scan(&ur, true) {
        Err(CodecError::UnknownKey(3)) => {}
        other => panic!("expected UnknownKey(3), got {other:?}"),
    }
    // Key 4 came after the unknown key and was only drained.
    assert!(scanner.captured(1));
    assert!(!scanner.captured(4));
    assert_consumed(&ur);
}

#[test]
fn test_unknown_key_tolerated_when_lenient() {
    let ur = decoder(BODY);
    skipping_scanner().scan(&ur, false).expect("scan");
    assert_consumed(&ur);
}

#[test]
fn test_missing_mandatory() {
    let ur = decoder(BODY_WITHOUT_2);
    match skipping_scanner().scan(&ur, false) {
        Err(CodecError::KeyMissing(2)) => {}
        other => panic!("expected KeyMissing(2), got {other:?}"),
    }
    assert_consumed(&ur);
}

#[test]
fn test_type_mismatch_drains_map() {
    let ur = decoder(BODY);
    let mut n4 = 0i64;
    let mut scanner = IdKVMapScanner::new()
        .field(1, UnitType::Number, skip_value())
        .field(4, UnitType::Number, store_number(&mut n4));
    match scanner.scan(&ur, false) {
        Err(CodecError::UnexpectedTypeForKey {
            key,
            expected,
            found,
        }) => {
            assert_eq!(key, 4);
            assert_eq!(expected, UnitType::Number);
            assert_eq!(found, UnitType::Bin);
        }
        other => panic!("expected UnexpectedTypeForKey, got {other:?}"),
    }
    drop(scanner);
    assert_eq!(n4, 0);
    assert_consumed(&ur);
}

#[test]
fn test_pending_error_wins_over_missing_key() {
    let ur = decoder(BODY_WITHOUT_2);
    let mut scanner = skipping_scanner();
    assert!(matches!(scanner.scan(&ur, true), Err(CodecError::UnknownKey(3))));
    assert_consumed(&ur);
}

#[test]
fn test_non_key_unit_in_map() {
    let mut w = Vec::new();
    send_number(&mut w, 1).unwrap();
    send_term(&mut w).unwrap();
    let ur = decoder(&w);
    assert!(matches!(
        skipping_scanner().scan(&ur, false),
        Err(CodecError::UnexpectedUnit(UnitType::Number))
    ));
}

#[test]
fn test_recoverable_action_drains() {
    let ur = decoder(BODY);
    let mut scanner = IdKVMapScanner::new()
        .field(1, UnitType::Number, |_unit: Unit, _ur: &dyn UnitReader| {
            ActionOutcome::Recoverable(CodecError::Action("out of range".to_string()))
        })
        .optional(4, UnitType::Bin, skip_value());
    match scanner.scan(&ur, false) {
        Err(CodecError::Action(msg)) => assert_eq!(msg, "out of range"),
        other => panic!("expected Action error, got {other:?}"),
    }
    assert!(!scanner.captured(1));
    assert!(!scanner.captured(4));
    assert_consumed(&ur);
}

#[test]
fn test_fatal_action_stops_at_once() {
    let ur = decoder(BODY);
    let mut scanner = IdKVMapScanner::new().field(2, UnitType::Bool, |_unit: Unit, _ur: &dyn UnitReader| {
        ActionOutcome::Fatal(CodecError::Action("boom".to_string()))
    });
    assert!(matches!(scanner.scan(&ur, false), Err(CodecError::Action(_))));
    // Not drained: key 3 is next.
    assert_eq!(ur.read_unit().unwrap().ukey(), Some(3));
}

#[test]
fn test_captured_reset_between_scans() {
    let mut w = Vec::new();
    send_ukey(&mut w, 7).unwrap();
    send_byte(&mut w, 9).unwrap();
    send_term(&mut w).unwrap();
    send_term(&mut w).unwrap();
    let ur = decoder(&w);

    let mut b = 0u8;
    let mut scanner = IdKVMapScanner::new().optional(7, UnitType::Byte, store_byte(&mut b));
    scanner.scan(&ur, false).unwrap();
    assert!(scanner.captured(7));
    scanner.scan(&ur, false).unwrap();
    assert!(!scanner.captured(7));
    drop(scanner);
    assert_eq!(b, 9);
}

#[test]
fn test_getter_accessors() {
    let getter = UKeyGetter::new(UnitType::Bin, true, skip_value());
    assert_eq!(getter.unit_type(), UnitType::Bin);
    assert!(getter.is_optional());
    assert!(!getter.captured());
}

fn stream_body(payload: &[u8]) -> Vec<u8> {
    let mut w = Vec::new();
    send_ukey(&mut w, 1).unwrap();
    {
        let mut bs = init_bin_stream(&mut w).unwrap();
        for chunk in payload.chunks(4) {
            bs.write_all(chunk).unwrap();
        }
        bs.close().unwrap();
    }
    send_ukey(&mut w, 2).unwrap();
    send_bool(&mut w, true).unwrap();
    send_term(&mut w).unwrap();
    w
}

#[test]
fn test_copy_bin_stream() {
    let ur = decoder(&stream_body(b"hello, world!"));
    let mut out = Vec::new();
    let mut flag = false;
    let mut scanner = IdKVMapScanner::new()
        .field(1, UnitType::BinStream, copy_bin_stream(&mut out))
        .field(2, UnitType::Bool, store_bool(&mut flag));
    scanner.scan(&ur, false).expect("scan");
    drop(scanner);
    assert_eq!(out, b"hello, world!");
    assert!(flag);
    assert_consumed(&ur);
}

struct RefusingSink;

impl Write for RefusingSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_copy_bin_stream_failure_is_recoverable() {
    let ur = decoder(&stream_body(b"hello, world!"));
    let mut scanner = IdKVMapScanner::new()
        .field(1, UnitType::BinStream, copy_bin_stream(RefusingSink))
        .optional(2, UnitType::Bool, skip_value());
    match scanner.scan(&ur, false) {
        Err(CodecError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::Other),
        other => panic!("expected Io error, got {other:?}"),
    }
    assert!(!ur.is_locked());
    assert_consumed(&ur);
}

#[test]
fn test_drain_failure_reports_both_errors() {
    let mut w = Vec::new();
    send_ukey(&mut w, 9).unwrap();
    send_nil(&mut w).unwrap();
    send_ukey(&mut w, 1).unwrap();
    init_list(&mut w).unwrap();
    w.push(0x0e); // unknown tag inside the drained list
    let ur = decoder(&w);
    match skipping_scanner().scan(&ur, true) {
        Err(CodecError::DrainFailed { cause, pending }) => {
            assert!(matches!(*pending, CodecError::UnknownKey(9)));
            assert!(matches!(*cause, CodecError::UnknownUnit(0x0e)));
        }
        other => panic!("expected DrainFailed, got {other:?}"),
    }
}

#[test]
fn test_stock_action_under_other_type_rejects_value() {
    let ur = decoder(BODY);
    let mut n = 7i64;
    let mut scanner = IdKVMapScanner::new()
        .field(4, UnitType::Bin, store_number(&mut n))
        .optional(1, UnitType::Number, skip_value());
    assert!(matches!(
        scanner.scan(&ur, false),
        Err(CodecError::UnexpectedUnit(UnitType::Bin))
    ));
    assert!(!scanner.captured(4));
    drop(scanner);
    assert_eq!(n, 7);
    assert_consumed(&ur);
}

#[test]
fn test_stock_action_called_directly() {
    let mut w = Vec::new();
    init_list(&mut w).unwrap();
    send_nil(&mut w).unwrap();
    send_term(&mut w).unwrap();
    send_byte(&mut w, 3).unwrap();
    let ur = decoder(&w);

    let mut flag = false;
    let mut action = store_bool(&mut flag);
    let unit = ur.read_unit().unwrap();
    match action(unit, &ur as &dyn UnitReader) {
        ActionOutcome::Recoverable(CodecError::UnexpectedUnit(UnitType::List)) => {}
        other => panic!("expected Recoverable(UnexpectedUnit), got {other:?}"),
    }
    // The rejected list was skipped.
    assert_eq!(ur.read_unit().unwrap().byte(), Some(3));
}

//! Decoder fuzz target: feed arbitrary bytes to the decoder and the skip engine.
//! Neither may panic; every input ends in a clean end of input or an error.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let decoder = binproto::Decoder::new(std::io::Cursor::new(data.to_vec()));
    while binproto::skip_next(&decoder).is_ok() {}
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}

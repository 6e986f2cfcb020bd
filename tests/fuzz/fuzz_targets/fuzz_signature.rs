#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoder must not panic on any descriptor.
    if let Ok(s) = std::str::from_utf8(data) {
        let (name, signature) = s.split_once('\n').unwrap_or(("m", s));
        let _ = covgate::signature::decode_method_name(name, signature);
    }
});

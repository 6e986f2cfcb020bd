#![no_main]
use covgate::aggregate::rollup;
use covgate::parsers::java::JavaParser;
use covgate::parsers::CoverageParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing and rollup must not panic on any input.
    if let Ok(mut tree) = JavaParser::default().parse_bytes(data, "fuzz") {
        rollup(&mut tree);
    }
});

#![no_main]
use libfuzzer_sys::fuzz_target;
use recordqa::{DirectiveParser, SpanMode};

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        for mode in [SpanMode::Lexical, SpanMode::Balanced] {
            let parser = DirectiveParser::new("patients").with_mode(mode);
            if let Ok(d) = parser.parse(s) {
                assert!(s.contains(d.span));
            }
        }
    }
});

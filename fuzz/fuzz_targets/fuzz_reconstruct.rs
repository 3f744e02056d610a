#![no_main]
use libfuzzer_sys::fuzz_target;
use recordqa::{Directive, OperationKind, reconstruct};

fuzz_target!(|input: (u8, &str)| {
    let (k, span) = input;
    if span.len() > 8192 { return; }
    let kind = OperationKind::ALL[usize::from(k) % OperationKind::ALL.len()];
    // never a partially built query: success means the kind matches
    if let Ok(q) = reconstruct(&Directive { kind, span }) {
        assert_eq!(q.kind(), kind);
    }
});

#![no_main]
use libfuzzer_sys::fuzz_target;
use recordqa::store::{compile_filter, eval_filter};

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    let Ok(s) = std::str::from_utf8(data) else { return };
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(s) else { return };
    let Ok(doc) = bson::Document::try_from(map) else { return };
    if let Ok(f) = compile_filter(&doc) {
        let _ = eval_filter(&doc, &f);
    }
});

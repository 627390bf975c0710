#![no_main]

use keyfind::matcher::{LocaleDictionary, RecordContext};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz ripgrep JSON line parsing with arbitrary bytes
    // Submatch columns may point anywhere; parsing must never panic
    let dictionary = LocaleDictionary::from_entries([("common.ok", "确定")]);
    let ctx = RecordContext {
        dictionary: &dictionary,
        key_prefix: "I18N.",
        replacement: Some("x"),
    };
    if let Ok(records) = ctx.parse_line(data) {
        for record in records {
            let _ = record.diff();
            let _ = record.range.is_well_formed();
        }
    }
});

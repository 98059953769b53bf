#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Single hook line
        if let Ok(change) = gitward_access::Change::parse(s) {
            let _ = change.action();
            let _ = change.ref_name();
            // Display must re-parse to the same change
            let reparsed = gitward_access::Change::parse(&change.to_string());
            assert_eq!(reparsed.ok(), Some(change));
        }

        // Whole pre-receive input
        if let Ok(changes) = gitward_access::Changes::parse(s) {
            assert!(!changes.is_any());
            for change in changes.as_slice() {
                let _ = change.is_create();
                let _ = change.is_delete();
            }
        }

        let _ = gitward_access::is_blank_sha(s);
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use rfx_runtime::KeyPath;

fuzz_target!(|data: &[u8]| {
    let Ok(dotted) = std::str::from_utf8(data) else {
        return;
    };
    let path = KeyPath::parse(dotted);
    assert!(path.segments().iter().all(|segment| !segment.is_empty()));
    assert_eq!(KeyPath::parse(&path.to_string()), path);
});

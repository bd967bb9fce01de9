#![no_main]
use elfgraph::Archive;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(archive) = Archive::from_bytes(data.to_vec(), None) else {
        return;
    };
    for file in archive.elfs().take(16).flatten() {
        let _ = file.arhdr();
        let _ = file.syms();
    }
});

#![no_main]
use bytes::Bytes;
use elfgraph::formats::elf::ElfImage;
use elfgraph::ElfFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(image) = ElfImage::parse(Bytes::copy_from_slice(data)) else {
        return;
    };
    let Ok(file) = ElfFile::from_accessor(Box::new(image), None) else {
        return;
    };
    let Ok(sections) = file.sections() else {
        return;
    };
    for section in sections {
        let _ = section.name();
        let _ = section.link_scn();
        if let Ok(relas) = section.relas() {
            for rela in relas {
                let _ = rela.sym();
            }
        }
        if let Ok(header) = section.header() {
            let _ = file.deref(header.sh_addr, header.sh_size.min(64));
            let _ = section.str_at_addr(header.sh_addr);
        }
    }
    if let Ok(syms) = file.syms() {
        for sym in syms {
            let _ = sym.contents();
        }
    }
});

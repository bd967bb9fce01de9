use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use elfgraph::formats::elf::{
    ElfClass, RawDataBlock, RawRelocation, RawSectionHeader, SyntheticElf, SHF_ALLOC,
    SHT_PROGBITS, SHT_RELA, SHT_SYMTAB,
};
use elfgraph::graph::range;
use elfgraph::ElfFile;
use std::hint::black_box;

const SECTION_SIZE: u64 = 1 << 20;

fn relocated_file(count: u64) -> ElfFile {
    let mut elf = SyntheticElf::new(ElfClass::Elf64);
    let text = elf.add_progbits(".text", 0x40_0000, &vec![0x90u8; SECTION_SIZE as usize]);
    let strtab = elf.add_strtab(".strtab");
    let symtab = elf.add_symtab(".symtab", SHT_SYMTAB, strtab);
    let rela = elf.add_reloc_section(".rela.text", SHT_RELA, symtab, text);
    let stride = SECTION_SIZE / count;
    for i in (0..count).rev() {
        elf.add_relocation(
            rela,
            RawRelocation {
                r_offset: 0x40_0000 + i * stride,
                r_info: 0,
                r_addend: Some(0),
            },
        );
    }
    ElfFile::from_accessor(Box::new(elf), None).expect("synthetic file opens")
}

fn bench_relas_in_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("relas_in_range");
    for count in [1_000u64, 100_000] {
        let file = relocated_file(count);
        let text = file.section(2).expect(".text");
        // Warm the sorted relocation cache
        text.relas_in_range(0, 1).expect("query");

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                text.relas_in_range(black_box(0x40_8000), black_box(0x1000))
                    .expect("query")
                    .len()
            })
        });
    }
    group.finish();
}

fn bench_mem_in_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("mem_in_range");
    let blocks: Vec<RawDataBlock> = (0..256u64)
        .map(|i| RawDataBlock::new(i * 4096, vec![i as u8; 4096]))
        .collect();

    for size in [64u64, 64 * 1024] {
        group.throughput(Throughput::Bytes(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| range::mem_in_range(&blocks, 0x1000, black_box(0x1000 + 4000), size))
        });
    }
    group.finish();
}

fn bench_deref(c: &mut Criterion) {
    let mut elf = SyntheticElf::new(ElfClass::Elf64);
    for i in 0..64u64 {
        elf.add_section(
            &format!(".data.{}", i),
            RawSectionHeader {
                sh_type: SHT_PROGBITS,
                sh_flags: SHF_ALLOC,
                sh_addr: 0x10_0000 + i * 0x1000,
                ..Default::default()
            },
            vec![RawDataBlock::new(0, vec![i as u8; 0x1000])],
        );
    }
    let file = ElfFile::from_accessor(Box::new(elf), None).expect("synthetic file opens");

    c.bench_function("deref", |b| {
        b.iter(|| {
            file.deref(black_box(0x12_0010), black_box(16))
                .expect("no overlap")
                .map(|d| d.bytes.len())
        })
    });
}

criterion_group!(benches, bench_relas_in_range, bench_mem_in_range, bench_deref);
criterion_main!(benches);

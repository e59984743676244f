//! Shared helpers for integration tests.
//!
//! - [`ElfBuilder`] emits small but well-formed little-endian ELF64 images
//!   with a chosen set of load segments and symbol tables.
//! - [`install_real_clock`] swaps the mock clock for `std::time::Instant`.

#![allow(dead_code)]

use std::sync::OnceLock;
use std::time::Instant;

use speedbump::platform;

// =============================================================================
// ELF64 Image Builder
// =============================================================================

const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;
const SHDR_SIZE: usize = 64;
const SYM_SIZE: usize = 24;

const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHT_DYNSYM: u32 = 11;
const PT_LOAD: u32 = 1;

/// Virtual address of the default load segment.
pub const DEFAULT_LOAD_VADDR: u64 = 0x40_0000;
/// Size of the default load segment. Its file offset is 0.
pub const DEFAULT_LOAD_SIZE: u64 = 0x1_0000;

/// Load segment: (vaddr, file offset, memory size).
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub vaddr: u64,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Symtab,
    Dynsym,
}

#[derive(Debug, Clone)]
struct Table {
    kind: TableKind,
    symbols: Vec<(String, u64)>,
}

/// Builds synthetic ELF64 executables.
#[derive(Debug, Clone)]
pub struct ElfBuilder {
    class: u8,
    segments: Vec<Segment>,
    tables: Vec<Table>,
}

impl ElfBuilder {
    pub fn new() -> Self {
        Self {
            class: 2,
            segments: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Add a `PT_LOAD` segment. Without any, one default segment is emitted.
    pub fn segment(mut self, vaddr: u64, offset: u64, size: u64) -> Self {
        self.segments.push(Segment {
            vaddr,
            offset,
            size,
        });
        self
    }

    /// Append a `.symtab`/`.strtab` pair.
    pub fn symtab(self, symbols: &[(&str, u64)]) -> Self {
        self.table(TableKind::Symtab, symbols)
    }

    /// Append a `.dynsym`/`.dynstr` pair.
    pub fn dynsym(self, symbols: &[(&str, u64)]) -> Self {
        self.table(TableKind::Dynsym, symbols)
    }

    fn table(mut self, kind: TableKind, symbols: &[(&str, u64)]) -> Self {
        self.tables.push(Table {
            kind,
            symbols: symbols
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
        });
        self
    }

    /// Override `EI_CLASS` (1 = ELF32). The layout stays 64-bit.
    pub fn class(mut self, class: u8) -> Self {
        self.class = class;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let segments = if self.segments.is_empty() {
            vec![Segment {
                vaddr: DEFAULT_LOAD_VADDR,
                offset: 0,
                size: DEFAULT_LOAD_SIZE,
            }]
        } else {
            self.segments.clone()
        };

        let mut out = vec![0u8; EHDR_SIZE + PHDR_SIZE * segments.len()];
        let mut shstrtab = StringTable::new();
        let mut sections = vec![SectionHeader::default()];

        align(&mut out, 16);
        let text_offset = out.len();
        out.extend_from_slice(&[0x90; 64]);
        sections.push(SectionHeader {
            name: shstrtab.add(".text"),
            kind: SHT_PROGBITS,
            flags: 0x6,
            offset: text_offset as u64,
            size: 64,
            addralign: 16,
            ..Default::default()
        });

        for table in &self.tables {
            let (kind, symtab_name, strtab_name) = match table.kind {
                TableKind::Symtab => (SHT_SYMTAB, ".symtab", ".strtab"),
                TableKind::Dynsym => (SHT_DYNSYM, ".dynsym", ".dynstr"),
            };

            let mut strings = StringTable::new();
            let mut symbols = vec![0u8; SYM_SIZE];
            for (name, value) in &table.symbols {
                let name = strings.add(name);
                put_u32(&mut symbols, name);
                symbols.push(0x12); // STB_GLOBAL | STT_FUNC
                symbols.push(0);
                put_u16(&mut symbols, 1);
                put_u64(&mut symbols, *value);
                put_u64(&mut symbols, 16);
            }

            align(&mut out, 8);
            let symbols_offset = out.len();
            out.extend_from_slice(&symbols);
            let strings_offset = out.len();
            out.extend_from_slice(&strings.bytes);

            let symtab_index = sections.len();
            sections.push(SectionHeader {
                name: shstrtab.add(symtab_name),
                kind,
                offset: symbols_offset as u64,
                size: symbols.len() as u64,
                link: (symtab_index + 1) as u32,
                info: 1,
                addralign: 8,
                entsize: SYM_SIZE as u64,
                ..Default::default()
            });
            sections.push(SectionHeader {
                name: shstrtab.add(strtab_name),
                kind: SHT_STRTAB,
                offset: strings_offset as u64,
                size: strings.bytes.len() as u64,
                addralign: 1,
                ..Default::default()
            });
        }

        let shstrndx = sections.len();
        let shstrtab_name = shstrtab.add(".shstrtab");
        let shstrtab_offset = out.len();
        out.extend_from_slice(&shstrtab.bytes);
        sections.push(SectionHeader {
            name: shstrtab_name,
            kind: SHT_STRTAB,
            offset: shstrtab_offset as u64,
            size: shstrtab.bytes.len() as u64,
            addralign: 1,
            ..Default::default()
        });

        align(&mut out, 8);
        let shoff = out.len();
        for section in &sections {
            section.write(&mut out);
        }

        let mut header = Vec::with_capacity(EHDR_SIZE);
        header.extend_from_slice(&[0x7f, b'E', b'L', b'F', self.class, 1, 1, 0]);
        header.extend_from_slice(&[0; 8]);
        put_u16(&mut header, 2); // ET_EXEC
        put_u16(&mut header, 62); // EM_X86_64
        put_u32(&mut header, 1);
        put_u64(&mut header, segments[0].vaddr);
        put_u64(&mut header, EHDR_SIZE as u64);
        put_u64(&mut header, shoff as u64);
        put_u32(&mut header, 0);
        put_u16(&mut header, EHDR_SIZE as u16);
        put_u16(&mut header, PHDR_SIZE as u16);
        put_u16(&mut header, segments.len() as u16);
        put_u16(&mut header, SHDR_SIZE as u16);
        put_u16(&mut header, sections.len() as u16);
        put_u16(&mut header, shstrndx as u16);
        out[..EHDR_SIZE].copy_from_slice(&header);

        let mut program_headers = Vec::with_capacity(PHDR_SIZE * segments.len());
        for segment in &segments {
            put_u32(&mut program_headers, PT_LOAD);
            put_u32(&mut program_headers, 0x5); // PF_R | PF_X
            put_u64(&mut program_headers, segment.offset);
            put_u64(&mut program_headers, segment.vaddr);
            put_u64(&mut program_headers, segment.vaddr);
            put_u64(&mut program_headers, segment.size);
            put_u64(&mut program_headers, segment.size);
            put_u64(&mut program_headers, 0x1000);
        }
        out[EHDR_SIZE..EHDR_SIZE + program_headers.len()].copy_from_slice(&program_headers);

        out
    }
}

impl Default for ElfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One-symbol executable with `symbol` at `DEFAULT_LOAD_VADDR + offset`.
pub fn simple_elf(symbol: &str, offset: u64) -> Vec<u8> {
    ElfBuilder::new()
        .symtab(&[(symbol, DEFAULT_LOAD_VADDR + offset)])
        .build()
}

/// `e_shoff` of an image produced by [`ElfBuilder`].
pub fn section_header_offset(image: &[u8]) -> usize {
    u64::from_le_bytes(image[40..48].try_into().unwrap()) as usize
}

/// Cut the image in the middle of its section header table.
pub fn truncate_section_headers(image: &[u8]) -> Vec<u8> {
    image[..section_header_offset(image) + SHDR_SIZE / 2].to_vec()
}

/// Point section `index`'s `sh_offset` at `value`.
pub fn patch_section_offset(image: &mut [u8], index: usize, value: u64) {
    let at = section_header_offset(image) + index * SHDR_SIZE + 24;
    image[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

#[derive(Debug, Default)]
struct SectionHeader {
    name: u32,
    kind: u32,
    flags: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
    addralign: u64,
    entsize: u64,
}

impl SectionHeader {
    fn write(&self, out: &mut Vec<u8>) {
        put_u32(out, self.name);
        put_u32(out, self.kind);
        put_u64(out, self.flags);
        put_u64(out, 0);
        put_u64(out, self.offset);
        put_u64(out, self.size);
        put_u32(out, self.link);
        put_u32(out, self.info);
        put_u64(out, self.addralign);
        put_u64(out, self.entsize);
    }
}

struct StringTable {
    bytes: Vec<u8>,
}

impl StringTable {
    fn new() -> Self {
        Self { bytes: vec![0] }
    }

    fn add(&mut self, name: &str) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.push(0);
        offset
    }
}

fn align(out: &mut Vec<u8>, to: usize) {
    while out.len() % to != 0 {
        out.push(0);
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

// =============================================================================
// Real Clock
// =============================================================================

static EPOCH: OnceLock<Instant> = OnceLock::new();

fn real_time_ns() -> u64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Drive delays from the host's monotonic clock for the rest of the process.
pub fn install_real_clock() {
    platform::register_clock_hook(real_time_ns);
}

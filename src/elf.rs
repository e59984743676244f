//! ELF64 symbol resolution.
//!
//! Turns a symbol name inside an ELF64 image into the file offset a probe is
//! attached at:
//!
//! 1. Check the ELF magic and the 64-bit class.
//! 2. Walk the section headers in order and search every `SHT_SYMTAB` and
//!    `SHT_DYNSYM` section for an exact name match. The first match wins,
//!    whichever table it comes from. A match that is undefined or has value
//!    0 (an import) does not resolve.
//! 3. Find the `PT_LOAD` segment whose virtual range contains the symbol's
//!    address and translate: `p_offset + (st_value - p_vaddr)`.
//!
//! The image is untrusted. Every read goes through `object`'s bounds-checked
//! accessors; a corrupt table degrades to an error, never a panic.

use alloc::string::String;

use object::elf::{ELFCLASS64, ELFMAG, FileHeader64, PT_LOAD, SHN_UNDEF, SHT_DYNSYM, SHT_SYMTAB};
use object::read::elf::{FileHeader, ProgramHeader, SectionHeader, Sym, SymbolTable};
use object::{Endianness, SectionIndex};

/// Why a symbol could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Missing ELF magic.
    #[error("not an ELF image")]
    NotElf,
    /// ELF, but not ELFCLASS64.
    #[error("unsupported ELF class (only ELF64 is supported)")]
    UnsupportedClass,
    /// A header or table could not be read.
    #[error("malformed ELF: {0}")]
    Malformed(&'static str),
    /// No symbol table contains the name.
    #[error("symbol not found")]
    SymbolNotFound,
    /// The symbol's address is outside every loadable segment.
    #[error("symbol address {0:#x} is not in any PT_LOAD segment")]
    NotMapped(u64),
}

impl ResolveError {
    /// Whether the image itself is unusable, as opposed to the symbol.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::NotElf | Self::UnsupportedClass)
    }
}

/// Which kind of symbol table produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolTableKind {
    /// `SHT_SYMTAB`
    Static,
    /// `SHT_DYNSYM`
    Dynamic,
}

/// A successfully resolved symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSymbol {
    /// File offset to attach the probe at.
    pub offset: u64,
    /// Symbol value (virtual address).
    pub vaddr: u64,
    /// Table the symbol was found in.
    pub table: SymbolTableKind,
    /// Name of the section holding that table, if the section name table is readable.
    pub section: Option<String>,
}

/// Resolve `symbol` in `image` to a file offset.
pub fn resolve_symbol_offset(image: &[u8], symbol: &str) -> Result<u64, ResolveError> {
    resolve(image, symbol).map(|resolved| resolved.offset)
}

/// Resolve `symbol` in `image`, returning the full resolution details.
pub fn resolve(image: &[u8], symbol: &str) -> Result<ResolvedSymbol, ResolveError> {
    check_ident(image)?;

    let header = FileHeader64::<Endianness>::parse(image)
        .map_err(|_| ResolveError::Malformed("file header"))?;
    let endian = header
        .endian()
        .map_err(|_| ResolveError::Malformed("data encoding"))?;
    let sections = header
        .sections(endian, image)
        .map_err(|_| ResolveError::Malformed("section header table"))?;

    let mut found = None;
    for (index, section) in sections.iter().enumerate() {
        let table = match section.sh_type(endian) {
            SHT_SYMTAB => SymbolTableKind::Static,
            SHT_DYNSYM => SymbolTableKind::Dynamic,
            _ => continue,
        };

        // Bad link or truncated table: skip this one, keep scanning the rest.
        let Ok(symbols) = SymbolTable::parse(endian, image, &sections, SectionIndex(index), section)
        else {
            trace!("speed_bump: skipping unreadable symbol table in section {}", index);
            continue;
        };

        let strings = symbols.strings();
        let hit = symbols.symbols().iter().find(|sym| {
            sym.name(endian, strings)
                .is_ok_and(|name| name == symbol.as_bytes())
        });

        if let Some(sym) = hit {
            let section_name = sections
                .section_name(endian, section)
                .ok()
                .map(|name| String::from_utf8_lossy(name).into_owned());
            found = Some((sym, table, section_name));
            break;
        }
    }

    let (sym, table, section) = found.ok_or(ResolveError::SymbolNotFound)?;
    let vaddr = sym.st_value(endian);
    // Offset 0 would place the probe on the ELF header.
    if vaddr == 0 || sym.st_shndx(endian) == SHN_UNDEF {
        debug!("speed_bump: {} is undefined in this image", symbol);
        return Err(ResolveError::SymbolNotFound);
    }

    let segments = header
        .program_headers(endian, image)
        .map_err(|_| ResolveError::Malformed("program header table"))?;

    let offset = segments
        .iter()
        .filter(|ph| ph.p_type(endian) == PT_LOAD)
        .find_map(|ph| {
            let start = ph.p_vaddr(endian);
            let end = start.checked_add(ph.p_memsz(endian))?;
            if vaddr < start || vaddr >= end {
                return None;
            }
            ph.p_offset(endian).checked_add(vaddr - start)
        })
        .ok_or(ResolveError::NotMapped(vaddr))?;

    debug!(
        "speed_bump: resolved {} in {} at vaddr={:#x} offset={:#x}",
        symbol,
        section.as_deref().unwrap_or("<unnamed>"),
        vaddr,
        offset
    );

    Ok(ResolvedSymbol {
        offset,
        vaddr,
        table,
        section,
    })
}

/// Index of the class byte in `e_ident`.
const EI_CLASS: usize = 4;

fn check_ident(image: &[u8]) -> Result<(), ResolveError> {
    if image.get(..ELFMAG.len()) != Some(&ELFMAG[..]) {
        return Err(ResolveError::NotElf);
    }
    match image.get(EI_CLASS) {
        Some(&ELFCLASS64) => Ok(()),
        Some(_) => Err(ResolveError::UnsupportedClass),
        None => Err(ResolveError::Malformed("identification")),
    }
}

//! ELF32-BE-MIPS parsing for the PS2 recompiler pipeline.
//!
//! Parses just enough of the ELF container to drive the analyzer (§4.1 of
//! the design): section/symbol/relocation tables and `PT_LOAD` segments
//! loaded into a byte buffer addressable by guest virtual address.

mod error;

pub use error::ElfError;

use std::collections::BTreeMap;

const EI_MAG: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFDATA2MSB: u8 = 2;
const EM_MIPS: u16 = 8;
const ET_EXEC: u16 = 2;

const PT_LOAD: u32 = 1;
pub const PF_X: u32 = 0x1;
pub const PF_W: u32 = 0x2;
pub const PF_R: u32 = 0x4;

const SHT_SYMTAB: u32 = 2;
const SHT_RELA: u32 = 4;
const SHT_REL: u32 = 9;

/// A loadable ELF segment (`PT_LOAD`), with its `PF_X`/`PF_W`/`PF_R` flags.
#[derive(Debug, Clone)]
pub struct Segment {
    pub offset: u32,
    pub vaddr: u32,
    pub filesz: u32,
    pub memsz: u32,
    pub flags: u32,
}

impl Segment {
    pub fn is_executable(&self) -> bool {
        self.flags & PF_X != 0
    }
}

#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub sh_type: u32,
    pub flags: u32,
    pub addr: u32,
    pub offset: u32,
    pub size: u32,
    pub link: u32,
    pub info: u32,
}

impl Section {
    pub fn is_executable(&self) -> bool {
        self.flags & 0x4 != 0 // SHF_EXECINSTR
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.addr <= addr && addr < self.addr.wrapping_add(self.size)
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub value: u32,
    pub size: u32,
    pub shndx: u16,
    pub info: u8,
}

impl Symbol {
    /// STT_FUNC == 2
    pub fn is_function(&self) -> bool {
        self.info & 0xf == 2
    }
}

#[derive(Debug, Clone)]
pub struct Relocation {
    pub offset: u32,
    pub sym_index: u32,
    pub r_type: u32,
}

/// The parsed ELF: headers plus a guest-address-indexed image built from
/// `PT_LOAD` segments (bss tail zero-filled to `memsz`).
pub struct ElfFile {
    pub entry_point: u32,
    pub sections: Vec<Section>,
    pub symbols: Vec<Symbol>,
    pub relocations: Vec<Relocation>,
    pub segments: Vec<Segment>,
    image: BTreeMap<u32, Vec<u8>>,
}

impl ElfFile {
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        if data.len() < 52 {
            return Err(ElfError::Truncated {
                expected: 52,
                actual: data.len(),
            });
        }
        if data[0..4] != EI_MAG {
            return Err(ElfError::InvalidElf("bad magic"));
        }
        if data[4] != ELFCLASS32 {
            return Err(ElfError::InvalidElf("not ELFCLASS32"));
        }
        if data[5] != ELFDATA2MSB {
            return Err(ElfError::InvalidElf("not big-endian"));
        }

        let e_type = be16(data, 16)?;
        let e_machine = be16(data, 18)?;
        if e_machine != EM_MIPS {
            return Err(ElfError::InvalidElf("e_machine is not EM_MIPS"));
        }
        if e_type != ET_EXEC {
            return Err(ElfError::InvalidElf("e_type is not ET_EXEC"));
        }

        let entry_point = be32(data, 24)?;
        let e_phoff = be32(data, 28)? as usize;
        let e_shoff = be32(data, 32)? as usize;
        let e_phentsize = be16(data, 42)? as usize;
        let e_phnum = be16(data, 44)? as usize;
        let e_shentsize = be16(data, 46)? as usize;
        let e_shnum = be16(data, 48)? as usize;
        let e_shstrndx = be16(data, 50)? as usize;

        let mut segments = Vec::with_capacity(e_phnum);
        for i in 0..e_phnum {
            let base = e_phoff + i * e_phentsize;
            let p_type = be32(data, base)?;
            if p_type != PT_LOAD {
                continue;
            }
            let offset = be32(data, base + 4)?;
            let vaddr = be32(data, base + 8)?;
            let filesz = be32(data, base + 16)?;
            let memsz = be32(data, base + 20)?;
            let flags = be32(data, base + 24)?;
            segments.push(Segment {
                offset,
                vaddr,
                filesz,
                memsz,
                flags,
            });
        }

        let mut raw_sections = Vec::with_capacity(e_shnum);
        for i in 0..e_shnum {
            let base = e_shoff + i * e_shentsize;
            let name_off = be32(data, base)?;
            let sh_type = be32(data, base + 4)?;
            let flags = be32(data, base + 8)?;
            let addr = be32(data, base + 12)?;
            let offset = be32(data, base + 16)?;
            let size = be32(data, base + 20)?;
            let link = be32(data, base + 24)?;
            let info = be32(data, base + 28)?;
            raw_sections.push((name_off, sh_type, flags, addr, offset, size, link, info));
        }

        let shstrtab_off = if e_shstrndx < raw_sections.len() {
            raw_sections[e_shstrndx].4 as usize
        } else {
            0
        };

        let mut sections = Vec::with_capacity(raw_sections.len());
        for (name_off, sh_type, flags, addr, offset, size, link, info) in &raw_sections {
            let name = read_cstr(data, shstrtab_off + *name_off as usize).unwrap_or_default();
            sections.push(Section {
                name,
                sh_type: *sh_type,
                flags: *flags,
                addr: *addr,
                offset: *offset,
                size: *size,
                link: *link,
                info: *info,
            });
        }

        let mut symbols = Vec::new();
        for sec in &sections {
            if sec.sh_type != SHT_SYMTAB {
                continue;
            }
            let strtab = sections
                .get(sec.link as usize)
                .map(|s| s.offset as usize)
                .unwrap_or(0);
            let count = sec.size as usize / 16;
            for i in 0..count {
                let base = sec.offset as usize + i * 16;
                let name_off = be32(data, base)?;
                let value = be32(data, base + 4)?;
                let size = be32(data, base + 8)?;
                let info = *data.get(base + 12).ok_or(ElfError::Truncated {
                    expected: base + 13,
                    actual: data.len(),
                })?;
                let shndx = be16(data, base + 14)?;
                let name = read_cstr(data, strtab + name_off as usize).unwrap_or_default();
                symbols.push(Symbol {
                    name,
                    value,
                    size,
                    shndx,
                    info,
                });
            }
        }

        let mut relocations = Vec::new();
        for sec in &sections {
            if sec.sh_type != SHT_REL && sec.sh_type != SHT_RELA {
                continue;
            }
            let entsize = if sec.sh_type == SHT_REL { 8 } else { 12 };
            let count = sec.size as usize / entsize;
            for i in 0..count {
                let base = sec.offset as usize + i * entsize;
                let r_offset = be32(data, base)?;
                let r_info = be32(data, base + 4)?;
                relocations.push(Relocation {
                    offset: r_offset,
                    sym_index: r_info >> 8,
                    r_type: r_info & 0xff,
                });
            }
        }

        let mut image = BTreeMap::new();
        for seg in &segments {
            let start = seg.offset as usize;
            let filesz = seg.filesz as usize;
            let memsz = seg.memsz as usize;
            let end = start.checked_add(filesz).ok_or(ElfError::InvalidElf(
                "segment file offset overflow",
            ))?;
            let bytes = data
                .get(start..end)
                .ok_or(ElfError::Truncated {
                    expected: end,
                    actual: data.len(),
                })?;
            let mut buf = vec![0u8; memsz.max(filesz)];
            buf[..filesz].copy_from_slice(bytes);
            image.insert(seg.vaddr, buf);
        }

        Ok(ElfFile {
            entry_point,
            sections,
            symbols,
            relocations,
            segments,
            image,
        })
    }

    /// Read `len` bytes starting at guest virtual address `addr` from the
    /// loaded segment image, if a segment covers the whole range.
    pub fn read_bytes(&self, addr: u32, len: usize) -> Option<&[u8]> {
        for (&vaddr, buf) in self.image.iter() {
            if addr >= vaddr && (addr as u64 + len as u64) <= (vaddr as u64 + buf.len() as u64) {
                let off = (addr - vaddr) as usize;
                return buf.get(off..off + len);
            }
        }
        None
    }

    pub fn read_word(&self, addr: u32) -> Option<u32> {
        let b = self.read_bytes(addr, 4)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Executable segments, per §4.1: "Executable segments (`PF_X`) are
    /// registered as code regions."
    pub fn code_regions(&self) -> Vec<(u32, u32)> {
        self.segments
            .iter()
            .filter(|s| s.is_executable())
            .map(|s| (s.vaddr, s.vaddr.wrapping_add(s.memsz)))
            .collect()
    }

    pub fn find_section_containing(&self, addr: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains(addr))
    }
}

fn be16(data: &[u8], off: usize) -> Result<u16, ElfError> {
    let b = data.get(off..off + 2).ok_or(ElfError::Truncated {
        expected: off + 2,
        actual: data.len(),
    })?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn be32(data: &[u8], off: usize) -> Result<u32, ElfError> {
    let b = data.get(off..off + 4).ok_or(ElfError::Truncated {
        expected: off + 4,
        actual: data.len(),
    })?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_cstr(data: &[u8], off: usize) -> Option<String> {
    let slice = data.get(off..)?;
    let end = slice.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&slice[..end]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_minimal_elf(entry: u32) -> Vec<u8> {
        // Header (52 bytes) + one PT_LOAD covering [entry, entry+8) with
        // two NOPs, no sections.
        let mut data = vec![0u8; 52 + 32 + 8];
        data[0..4].copy_from_slice(&EI_MAG);
        data[4] = ELFCLASS32;
        data[5] = ELFDATA2MSB;
        data[16..18].copy_from_slice(&ET_EXEC.to_be_bytes());
        data[18..20].copy_from_slice(&EM_MIPS.to_be_bytes());
        data[24..28].copy_from_slice(&entry.to_be_bytes());
        data[28..32].copy_from_slice(&52u32.to_be_bytes()); // e_phoff
        data[42..44].copy_from_slice(&32u16.to_be_bytes()); // e_phentsize
        data[44..46].copy_from_slice(&1u16.to_be_bytes()); // e_phnum

        let ph = 52;
        data[ph..ph + 4].copy_from_slice(&PT_LOAD.to_be_bytes());
        data[ph + 4..ph + 8].copy_from_slice(&84u32.to_be_bytes()); // offset
        data[ph + 8..ph + 12].copy_from_slice(&entry.to_be_bytes()); // vaddr
        data[ph + 16..ph + 20].copy_from_slice(&8u32.to_be_bytes()); // filesz
        data[ph + 20..ph + 24].copy_from_slice(&8u32.to_be_bytes()); // memsz
        data[ph + 24..ph + 28].copy_from_slice(&(PF_X | PF_R).to_be_bytes());
        data
    }

    #[test]
    fn parses_entry_point_and_segment() {
        let data = build_minimal_elf(0x00100000);
        let elf = ElfFile::parse(&data).unwrap();
        assert_eq!(elf.entry_point, 0x00100000);
        assert_eq!(elf.segments.len(), 1);
        assert!(elf.segments[0].is_executable());
        assert_eq!(elf.read_word(0x00100000), Some(0));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = build_minimal_elf(0x100000);
        data[0] = 0;
        assert!(matches!(
            ElfFile::parse(&data),
            Err(ElfError::InvalidElf(_))
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        let data = vec![0u8; 10];
        assert!(matches!(ElfFile::parse(&data), Err(ElfError::Truncated { .. })));
    }

    #[test]
    fn code_regions_cover_executable_segments_only() {
        let data = build_minimal_elf(0x100000);
        let elf = ElfFile::parse(&data).unwrap();
        let regions = elf.code_regions();
        assert_eq!(regions, vec![(0x100000, 0x100008)]);
    }
}

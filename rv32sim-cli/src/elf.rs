//! Loads a little-endian 32-bit ELF's `PT_LOAD` segments into a [`Core`]'s memory image.

use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use log::debug;
use rv32sim_core::Core;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("not a valid ELF file: {0}")]
    Parse(#[from] goblin::error::Error),
    #[error("64-bit ELFs are not supported")]
    Is64Bit,
    #[error("segment [{0:#010x}..{1:#010x}) lies outside the configured memory image")]
    OutOfRange(u32, u32),
}

/// Parses `bytes` as an ELF image, copies every `PT_LOAD` segment into `core`'s memory at
/// `p_vaddr - mem_base`, and returns the entry point address.
pub fn load_elf(core: &mut Core, mem_base: u32, mem_size: u32, bytes: &[u8]) -> Result<u32, LoadError> {
    let elf = Elf::parse(bytes)?;
    if elf.is_64 {
        return Err(LoadError::Is64Bit);
    }

    for header in elf.program_headers.iter().filter(|h| h.p_type == PT_LOAD) {
        let vaddr = header.p_vaddr as u32;
        let memsz = header.p_memsz as u32;
        let end = vaddr
            .checked_add(memsz)
            .ok_or(LoadError::OutOfRange(vaddr, u32::MAX))?;
        if vaddr < mem_base || end > mem_base.wrapping_add(mem_size) {
            return Err(LoadError::OutOfRange(vaddr, end));
        }

        debug!(
            "loading PT_LOAD segment: file range [{:#010x}..{:#010x}) to pmem [{:#010x}..{:#010x})",
            header.p_offset,
            header.p_offset + header.p_filesz,
            vaddr,
            end,
        );

        let mut image = vec![0u8; memsz as usize];
        let file_range = header.file_range();
        let file_bytes = &bytes[file_range];
        image[..file_bytes.len()].copy_from_slice(file_bytes);
        core.load_segment(vaddr, &image);
    }

    Ok(elf.entry as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rv32sim_core::Config;

    /// Builds a minimal little-endian ELF32 image with one `PT_LOAD` segment containing
    /// `payload`, loaded at `vaddr`, with entry point `entry`.
    fn build_elf32(vaddr: u32, entry: u32, payload: &[u8]) -> Vec<u8> {
        const EHSIZE: u32 = 52;
        const PHENTSIZE: u32 = 32;
        let phoff = EHSIZE;
        let data_off = phoff + PHENTSIZE;

        let mut bytes = Vec::new();
        // e_ident
        bytes.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0]);
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.extend_from_slice(&2u16.to_le_bytes()); // e_type = ET_EXEC
        bytes.extend_from_slice(&243u16.to_le_bytes()); // e_machine = EM_RISCV
        bytes.extend_from_slice(&1u32.to_le_bytes()); // e_version
        bytes.extend_from_slice(&entry.to_le_bytes()); // e_entry
        bytes.extend_from_slice(&phoff.to_le_bytes()); // e_phoff
        bytes.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
        bytes.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        bytes.extend_from_slice(&(EHSIZE as u16).to_le_bytes()); // e_ehsize
        bytes.extend_from_slice(&(PHENTSIZE as u16).to_le_bytes()); // e_phentsize
        bytes.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
        bytes.extend_from_slice(&0u16.to_le_bytes()); // e_shentsize
        bytes.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
        bytes.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
        assert_eq!(bytes.len() as u32, EHSIZE);

        // program header
        bytes.extend_from_slice(&PT_LOAD.to_le_bytes()); // p_type
        bytes.extend_from_slice(&data_off.to_le_bytes()); // p_offset
        bytes.extend_from_slice(&vaddr.to_le_bytes()); // p_vaddr
        bytes.extend_from_slice(&vaddr.to_le_bytes()); // p_paddr
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes()); // p_filesz
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes()); // p_memsz
        bytes.extend_from_slice(&1u32.to_le_bytes()); // p_flags (PF_X)
        bytes.extend_from_slice(&4u32.to_le_bytes()); // p_align
        assert_eq!(bytes.len() as u32, data_off);

        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn loads_segment_at_the_right_offset() {
        let mem_base = 0x8000_0000u32;
        let mem_size = 0x1000u32;
        let payload = [0x13, 0x00, 0x00, 0x00]; // addi x0, x0, 0
        let elf = build_elf32(mem_base + 0x10, mem_base + 0x10, &payload);

        let mut core = Core::new(Config {
            mem_base,
            mem_size,
            ..Config::default()
        });
        let entry = load_elf(&mut core, mem_base, mem_size, &elf).unwrap();
        assert_eq!(entry, mem_base + 0x10);

        let mut read_back = [0u8; 4];
        core.read_memory_debug(mem_base + 0x10, &mut read_back)
            .unwrap();
        assert_eq!(read_back, payload);
    }

    #[test]
    fn rejects_segments_outside_the_memory_image() {
        let mem_base = 0x8000_0000u32;
        let mem_size = 0x1000u32;
        let elf = build_elf32(mem_base + mem_size, mem_base, &[0u8; 4]);

        let mut core = Core::new(Config {
            mem_base,
            mem_size,
            ..Config::default()
        });
        let result = load_elf(&mut core, mem_base, mem_size, &elf);
        assert!(matches!(result, Err(LoadError::OutOfRange(_, _))));
    }

    #[test]
    fn rejects_non_elf_input() {
        let mem_base = 0x8000_0000u32;
        let mem_size = 0x1000u32;
        let mut core = Core::new(Config {
            mem_base,
            mem_size,
            ..Config::default()
        });
        let result = load_elf(&mut core, mem_base, mem_size, b"not an elf file");
        assert!(matches!(result, Err(LoadError::Parse(_))));
    }
}

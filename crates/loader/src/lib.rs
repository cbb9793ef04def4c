// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, Context, Result};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::sym::{STT_FUNC, STT_OBJECT};
use goblin::elf::Elf;
use labwired_iss_core::memory::ProgramImage;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// Load an ELF file, or a raw binary placed at `load_address` (0 when absent).
pub fn load_firmware(path: &Path, load_address: Option<u32>) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read firmware: {:?}", path))?;
    if buffer.starts_with(ELF_MAGIC) {
        if load_address.is_some() {
            warn!("Ignoring load address for ELF image {:?}", path);
        }
        load_elf_bytes(&buffer).with_context(|| format!("Failed to load ELF image {:?}", path))
    } else {
        load_binary_bytes(buffer, load_address.unwrap_or(0))
    }
}

pub fn load_elf(path: &Path) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    load_elf_bytes(&buffer)
}

pub fn load_elf_bytes(buffer: &[u8]) -> Result<ProgramImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    if elf.is_64 {
        anyhow::bail!("64-bit ELF images are not supported");
    }
    if elf.header.e_machine != goblin::elf::header::EM_ARM {
        anyhow::bail!(
            "ELF machine type {} is not ARM",
            goblin::elf::header::machine_to_str(elf.header.e_machine)
        );
    }

    let entry = u32::try_from(elf.entry).map_err(|_| anyhow!("Entry point out of range"))?;
    info!("ELF Entry Point: {:#x}", entry);

    let mut program_image = ProgramImage::new(entry);
    program_image.big_endian = !elf.little_endian;

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD {
            continue;
        }
        // Physical address (LMA) is where the bytes live at reset
        let start_addr = ph.p_paddr as u32;
        let size = ph.p_filesz as usize;
        let offset = ph.p_offset as usize;

        if size == 0 {
            continue;
        }

        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes, Offset={:#x}",
            start_addr, size, offset
        );

        let end = offset
            .checked_add(size)
            .filter(|&end| end <= buffer.len())
            .ok_or_else(|| anyhow!("Segment out of bounds in ELF file"))?;
        program_image.add_segment(start_addr, buffer[offset..end].to_vec());
    }

    if program_image.segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    Ok(program_image)
}

pub fn load_binary(path: &Path, load_address: u32) -> Result<ProgramImage> {
    let buffer =
        fs::read(path).with_context(|| format!("Failed to read binary file: {:?}", path))?;
    load_binary_bytes(buffer, load_address)
}

/// A raw image runs from its first byte.
pub fn load_binary_bytes(buffer: Vec<u8>, load_address: u32) -> Result<ProgramImage> {
    if buffer.is_empty() {
        anyhow::bail!("Binary image is empty");
    }
    if load_address as u64 + buffer.len() as u64 > 1 << 32 {
        anyhow::bail!(
            "Binary image of {} bytes does not fit at {:#010x}",
            buffer.len(),
            load_address
        );
    }
    info!(
        "Raw binary: {} bytes at {:#010x}",
        buffer.len(),
        load_address
    );
    let mut image = ProgramImage::new(load_address);
    image.add_segment(load_address, buffer);
    Ok(image)
}

/// Function and data symbols of an ELF image, sorted by address.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub addr: u32,
    pub size: u32,
}

impl SymbolTable {
    pub fn from_file(path: &Path) -> Result<Self> {
        let buffer = fs::read(path)
            .with_context(|| format!("Failed to read ELF for symbols: {:?}", path))?;
        Self::from_elf_bytes(&buffer)
    }

    pub fn from_elf_bytes(buffer: &[u8]) -> Result<Self> {
        let elf = Elf::parse(buffer).context("Failed to parse ELF for symbols")?;
        let mut symbols: Vec<Symbol> = elf
            .syms
            .iter()
            .filter(|sym| sym.st_value != 0 && sym.st_name != 0)
            .filter(|sym| matches!(sym.st_type(), STT_FUNC | STT_OBJECT))
            .filter_map(|sym| {
                let name = elf.strtab.get_at(sym.st_name)?;
                // Thumb functions carry the state bit in their address
                let addr = if sym.st_type() == STT_FUNC {
                    sym.st_value & !1
                } else {
                    sym.st_value
                };
                Some(Symbol {
                    name: name.to_string(),
                    addr: addr as u32,
                    size: sym.st_size as u32,
                })
            })
            .collect();
        symbols.sort_by_key(|s| s.addr);
        debug!("Loaded {} symbols", symbols.len());
        Ok(Self { symbols })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn resolve(&self, name: &str) -> Option<u32> {
        self.symbols.iter().find(|s| s.name == name).map(|s| s.addr)
    }

    /// Symbol covering `addr` and the offset into it. Sizeless symbols cover
    /// everything up to the next symbol.
    pub fn lookup(&self, addr: u32) -> Option<(&str, u32)> {
        let idx = self.symbols.partition_point(|s| s.addr <= addr);
        let sym = self.symbols.get(idx.checked_sub(1)?)?;
        let offset = addr - sym.addr;
        if sym.size != 0 && offset >= sym.size {
            return None;
        }
        Some((sym.name.as_str(), offset))
    }
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod cp15;
pub mod flat;

pub use cp15::SystemControl;
pub use flat::FlatMemory;

use crate::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramImage {
    pub entry_point: u32,
    pub segments: Vec<Segment>,
    pub big_endian: bool,
}

impl ProgramImage {
    pub fn new(entry_point: u32) -> Self {
        Self {
            entry_point,
            segments: Vec::new(),
            big_endian: false,
        }
    }

    pub fn add_segment(&mut self, start_addr: u32, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }

    /// Build an image from little-endian instruction words placed at `base`.
    pub fn from_words(base: u32, words: &[u32]) -> Self {
        let mut image = Self::new(base);
        let data = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        image.add_segment(base, data);
        image
    }
}

/// Fault status codes, as reported in the CP15 fault status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Fault {
    Alignment = 0x1,
    SectionTranslation = 0x5,
    PageTranslation = 0x7,
    SectionDomain = 0x9,
    PageDomain = 0xB,
    SectionPermission = 0xD,
    SubpagePermission = 0xF,
}

impl Fault {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code & 0xF {
            0x1 | 0x3 => Some(Fault::Alignment),
            0x5 => Some(Fault::SectionTranslation),
            0x7 => Some(Fault::PageTranslation),
            0x9 => Some(Fault::SectionDomain),
            0xB => Some(Fault::PageDomain),
            0xD => Some(Fault::SectionPermission),
            0xF => Some(Fault::SubpagePermission),
            _ => None,
        }
    }
}

pub type AccessResult<T> = Result<T, Fault>;

/// The bus/MMU side of the interpreter.
///
/// Sub-word reads return the value zero-extended in the low bits. Word reads at
/// unaligned addresses return the aligned word (the core rotates it) unless the
/// port raises [`Fault::Alignment`].
pub trait MemoryPort {
    fn read_byte(&mut self, va: u32) -> AccessResult<u32>;
    fn read_halfword(&mut self, va: u32) -> AccessResult<u32>;
    fn read_word(&mut self, va: u32) -> AccessResult<u32>;
    fn write_byte(&mut self, va: u32, data: u32) -> AccessResult<()>;
    fn write_halfword(&mut self, va: u32, data: u32) -> AccessResult<()>;
    fn write_word(&mut self, va: u32, data: u32) -> AccessResult<()>;

    /// Instruction fetch, always a word access.
    fn fetch_instruction(&mut self, va: u32) -> AccessResult<u32> {
        self.read_word(va & !3)
    }

    /// MRC. `Err(())` makes the core take the undefined-instruction exception.
    fn coprocessor_read(&mut self, _instr: u32) -> Result<u32, ()> {
        Err(())
    }

    /// MCR. `Err(())` makes the core take the undefined-instruction exception.
    fn coprocessor_write(&mut self, _instr: u32, _data: u32) -> Result<(), ()> {
        Err(())
    }

    fn vector_base(&self) -> u32 {
        0
    }

    /// Record the fault status and address of a failed access.
    fn report_fault(&mut self, _fault: Fault, _address: u32) {}

    /// True once after a wait-for-interrupt coprocessor operation was executed.
    fn take_wait_for_interrupt(&mut self) -> bool {
        false
    }

    /// Untimed access used by the debugger.
    fn debug_read(&mut self, _addr: u32) -> SimResult<u8> {
        Err(SimulationError::Unimplemented("MemoryPort::debug_read"))
    }

    fn debug_write(&mut self, _addr: u32, _value: u8) -> SimResult<()> {
        Err(SimulationError::Unimplemented("MemoryPort::debug_write"))
    }
}

/// A contiguous block of RAM.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub data: Vec<u8>,
    pub base_addr: u32,
}

impl MemoryRegion {
    pub fn new(size: usize, base_addr: u32) -> Self {
        Self {
            data: vec![0; size],
            base_addr,
        }
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base_addr && ((addr - self.base_addr) as usize) < self.data.len()
    }

    pub fn end(&self) -> u64 {
        self.base_addr as u64 + self.data.len() as u64
    }

    pub fn read_u8(&self, addr: u32) -> Option<u8> {
        if self.contains(addr) {
            Some(self.data[(addr - self.base_addr) as usize])
        } else {
            None
        }
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> bool {
        if self.contains(addr) {
            self.data[(addr - self.base_addr) as usize] = value;
            true
        } else {
            false
        }
    }

    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        let end_addr = segment.start_addr as u64 + segment.data.len() as u64;
        if segment.start_addr >= self.base_addr && end_addr <= self.end() {
            let offset = (segment.start_addr - self.base_addr) as usize;
            self.data[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_read_write_bounds() {
        let mut mem = MemoryRegion::new(1024, 0x1000);

        assert!(mem.write_u8(0x1000, 42));
        assert!(mem.write_u8(0x13FF, 99));
        assert!(!mem.write_u8(0x0FFF, 1));
        assert!(!mem.write_u8(0x1400, 1));

        assert_eq!(mem.read_u8(0x1000), Some(42));
        assert_eq!(mem.read_u8(0x13FF), Some(99));
        assert_eq!(mem.read_u8(0x1400), None);
    }

    #[test]
    fn test_load_from_segment_rejects_overhang() {
        let mut mem = MemoryRegion::new(1024, 0x1000);
        let overhang = Segment {
            start_addr: 0x13FE,
            data: vec![10, 20, 30],
        };
        assert!(!mem.load_from_segment(&overhang));
        assert_eq!(mem.read_u8(0x13FE), Some(0));

        let exact = Segment {
            start_addr: 0x13FE,
            data: vec![0xAA, 0xBB],
        };
        assert!(mem.load_from_segment(&exact));
        assert_eq!(mem.read_u8(0x13FF), Some(0xBB));
    }

    #[test]
    fn test_region_at_top_of_address_space() {
        let mem = MemoryRegion::new(0x1_0000, 0xFFFF_0000);
        assert!(mem.contains(0xFFFF_FFFF));
        assert_eq!(mem.end(), 0x1_0000_0000);
    }

    #[test]
    fn test_fault_codes() {
        assert_eq!(Fault::Alignment.code(), 1);
        assert_eq!(Fault::SubpagePermission.code(), 0xF);
        assert_eq!(Fault::from_code(0x5), Some(Fault::SectionTranslation));
        assert_eq!(Fault::from_code(0x0), None);
    }
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::cp15::{Cp15Effect, SystemControl};
use super::{AccessResult, Fault, MemoryPort, MemoryRegion, ProgramImage};
use crate::{SimResult, SimulationError};
use anyhow::Context;
use tracing::{debug, warn};

/// Reference memory port: RAM regions with identity mapping and a CP15 model.
#[derive(Debug, Clone)]
pub struct FlatMemory {
    pub regions: Vec<MemoryRegion>,
    pub cp15: SystemControl,
    pub big_endian: bool,
    wfi_pending: bool,
}

impl FlatMemory {
    pub fn new(device_id: u32) -> Self {
        Self {
            regions: Vec::new(),
            cp15: SystemControl::new(device_id),
            big_endian: false,
            wfi_pending: false,
        }
    }

    pub fn with_region(mut self, base: u32, size: usize) -> Self {
        self.add_region(base, size);
        self
    }

    pub fn add_region(&mut self, base: u32, size: usize) {
        debug!("Mapping RAM region {:#010x} (+{:#x})", base, size);
        self.regions.push(MemoryRegion::new(size, base));
    }

    pub fn load_image(&mut self, image: &ProgramImage) -> anyhow::Result<()> {
        for segment in &image.segments {
            let region = self
                .regions
                .iter_mut()
                .find(|r| r.contains(segment.start_addr))
                .with_context(|| {
                    format!(
                        "segment at {:#010x} ({} bytes) is not backed by any memory region",
                        segment.start_addr,
                        segment.data.len()
                    )
                })?;
            if !region.load_from_segment(segment) {
                anyhow::bail!(
                    "segment at {:#010x} ({} bytes) overruns its memory region",
                    segment.start_addr,
                    segment.data.len()
                );
            }
        }
        Ok(())
    }

    fn region(&self, addr: u32) -> Option<&MemoryRegion> {
        self.regions.iter().find(|r| r.contains(addr))
    }

    fn peek(&self, addr: u32) -> AccessResult<u8> {
        self.region(addr)
            .and_then(|r| r.read_u8(addr))
            .ok_or(Fault::SectionTranslation)
    }

    fn poke(&mut self, addr: u32, value: u8) -> AccessResult<()> {
        match self.regions.iter_mut().find(|r| r.contains(addr)) {
            Some(r) => {
                r.write_u8(addr, value);
                Ok(())
            }
            None => Err(Fault::SectionTranslation),
        }
    }

    fn read_bytes<const N: usize>(&self, addr: u32) -> AccessResult<[u8; N]> {
        let mut bytes = [0u8; N];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.peek(addr.wrapping_add(i as u32))?;
        }
        Ok(bytes)
    }

    fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> AccessResult<()> {
        // probe first so a faulting access leaves memory untouched
        for i in 0..bytes.len() {
            self.peek(addr.wrapping_add(i as u32))?;
        }
        for (i, b) in bytes.iter().enumerate() {
            self.poke(addr.wrapping_add(i as u32), *b)?;
        }
        Ok(())
    }

    fn check_alignment(&self, va: u32, size: u32) -> AccessResult<u32> {
        if va & (size - 1) != 0 {
            warn!("Unaligned {}-byte access at {:#010x}", size, va);
            if self.cp15.alignment_check() {
                return Err(Fault::Alignment);
            }
        }
        Ok(va & !(size - 1))
    }
}

impl MemoryPort for FlatMemory {
    fn read_byte(&mut self, va: u32) -> AccessResult<u32> {
        Ok(self.peek(va)? as u32)
    }

    fn read_halfword(&mut self, va: u32) -> AccessResult<u32> {
        let addr = self.check_alignment(va, 2)?;
        let bytes = self.read_bytes::<2>(addr)?;
        Ok(if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        } as u32)
    }

    fn read_word(&mut self, va: u32) -> AccessResult<u32> {
        let addr = self.check_alignment(va, 4)?;
        let bytes = self.read_bytes::<4>(addr)?;
        Ok(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    fn write_byte(&mut self, va: u32, data: u32) -> AccessResult<()> {
        self.poke(va, data as u8)
    }

    fn write_halfword(&mut self, va: u32, data: u32) -> AccessResult<()> {
        let addr = self.check_alignment(va, 2)?;
        let bytes = if self.big_endian {
            (data as u16).to_be_bytes()
        } else {
            (data as u16).to_le_bytes()
        };
        self.write_bytes(addr, &bytes)
    }

    fn write_word(&mut self, va: u32, data: u32) -> AccessResult<()> {
        let addr = self.check_alignment(va, 4)?;
        let bytes = if self.big_endian {
            data.to_be_bytes()
        } else {
            data.to_le_bytes()
        };
        self.write_bytes(addr, &bytes)
    }

    fn fetch_instruction(&mut self, va: u32) -> AccessResult<u32> {
        let bytes = self.read_bytes::<4>(va & !3)?;
        Ok(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    fn coprocessor_read(&mut self, instr: u32) -> Result<u32, ()> {
        if (instr >> 8) & 0xF != 15 {
            return Err(());
        }
        self.cp15.read(instr)
    }

    fn coprocessor_write(&mut self, instr: u32, data: u32) -> Result<(), ()> {
        if (instr >> 8) & 0xF != 15 {
            return Err(());
        }
        if self.cp15.write(instr, data)? == Cp15Effect::WaitForInterrupt {
            self.wfi_pending = true;
        }
        Ok(())
    }

    fn vector_base(&self) -> u32 {
        self.cp15.vector_base()
    }

    fn report_fault(&mut self, fault: Fault, address: u32) {
        debug!("Memory fault {:?} at {:#010x}", fault, address);
        self.cp15.set_fault(fault, address);
    }

    fn take_wait_for_interrupt(&mut self) -> bool {
        std::mem::take(&mut self.wfi_pending)
    }

    fn debug_read(&mut self, addr: u32) -> SimResult<u8> {
        self.peek(addr)
            .map_err(|_| SimulationError::MemoryViolation(addr))
    }

    fn debug_write(&mut self, addr: u32, value: u8) -> SimResult<()> {
        self.poke(addr, value)
            .map_err(|_| SimulationError::MemoryViolation(addr))
    }
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Single, halfword, doubleword and swap transfers.
//!
//! Every transfer computes its writeback value before touching memory. Whether
//! the base is written back after a faulting access depends on the configured
//! abort model; R15 is never used as a writeback target.

use crate::cpu::{ArmCore, Cycle};
use crate::decoder::arm::{bit, bits, rd, rm, rn};
use crate::memory::MemoryPort;

/// Addressing fields common to the transfer encodings.
#[derive(Debug, Clone, Copy)]
struct Addressing {
    /// Address used for the access.
    addr: u32,
    /// Base plus or minus the offset, the writeback value.
    updated: u32,
    pre: bool,
    writeback: bool,
}

impl Addressing {
    fn new(base: u32, offset: u32, instr: u32) -> Self {
        let updated = if bit(instr, 23) {
            base.wrapping_add(offset)
        } else {
            base.wrapping_sub(offset)
        };
        let pre = bit(instr, 24);
        Self {
            addr: if pre { updated } else { base },
            updated,
            pre,
            writeback: bit(instr, 21),
        }
    }

    /// Post-indexed forms always write back, pre-indexed ones only with W.
    fn writes_back(&self) -> bool {
        !self.pre || self.writeback
    }
}

/// Sign-extend the low `width` bits.
#[inline]
fn sign_extend(value: u32, width: u32) -> u32 {
    let shift = 32 - width;
    (((value << shift) as i32) >> shift) as u32
}

impl<M: MemoryPort> ArmCore<M> {
    fn write_back_base(&mut self, instr: u32, mode: &Addressing, allowed: bool) {
        let n = rn(instr);
        if allowed && mode.writes_back() && n != 15 {
            self.regs.regs[n] = mode.updated;
        }
    }

    /// Outcome of a faulting access with respect to base writeback.
    #[inline]
    fn writeback_after_abort(&self) -> bool {
        self.config.base_updated_abort
    }

    /// LDR, STR, LDRB, STRB (0x40-0x7F).
    pub(super) fn exec_single_transfer(&mut self, instr: u32) {
        let register_offset = bit(instr, 25);
        if register_offset && bit(instr, 4) {
            return self.undefined(instr);
        }
        let offset = if register_offset {
            self.ls_reg_rhs(instr)
        } else {
            instr & 0xFFF
        };
        let mode = Addressing::new(self.lhs(instr), offset, instr);
        let byte = bit(instr, 22);

        let allowed = match (bit(instr, 20), byte) {
            (true, false) => self.load_word_to(instr, mode.addr),
            (true, true) => self.load_narrow_to(instr, mode.addr, 8, false),
            (false, false) => self.store_word_from(instr, mode.addr),
            (false, true) => self.store_byte_from(instr, mode.addr),
        };
        self.write_back_base(instr, &mode, allowed);
    }

    /// LDRH, LDRSB, LDRSH and STRH in the data-processing register space.
    pub(super) fn exec_halfword_transfer(&mut self, instr: u32, load: bool) {
        let mode = Addressing::new(self.lhs(instr), self.ls7_rhs(instr), instr);
        let allowed = if !load {
            self.store_halfword_from(instr, mode.addr)
        } else {
            match bits(instr, 5, 6) {
                1 => self.load_narrow_to(instr, mode.addr, 16, false),
                2 => self.load_narrow_to(instr, mode.addr, 8, true),
                _ => self.load_narrow_to(instr, mode.addr, 16, true),
            }
        };
        self.write_back_base(instr, &mode, allowed);
    }

    /// Word load; unaligned addresses rotate the aligned word. Returns whether
    /// the base may still be written back.
    fn load_word_to(&mut self, instr: u32, addr: u32) -> bool {
        self.bus_used_inc_pc_s();
        let Some(word) = self.load_word(addr, Cycle::NonSeq) else {
            return self.writeback_after_abort();
        };
        let dest = rd(instr);
        self.write_dest_load(dest, word.rotate_right((addr & 3) * 8));
        self.icycles(1);
        dest != rn(instr)
    }

    fn load_narrow_to(&mut self, instr: u32, addr: u32, width: u32, signed: bool) -> bool {
        self.bus_used_inc_pc_s();
        let loaded = if width == 8 {
            self.load_byte(addr)
        } else {
            self.load_halfword(addr)
        };
        let Some(mut value) = loaded else {
            return self.writeback_after_abort();
        };
        if signed {
            value = sign_extend(value, width);
        }
        let dest = rd(instr);
        self.write_dest(dest, value);
        self.icycles(1);
        dest != rn(instr)
    }

    fn store_word_from(&mut self, instr: u32, addr: u32) -> bool {
        self.bus_used_inc_pc_n();
        let value = self.regs.regs[rd(instr)];
        self.store_word(addr, value, Cycle::NonSeq) || self.writeback_after_abort()
    }

    fn store_byte_from(&mut self, instr: u32, addr: u32) -> bool {
        self.bus_used_inc_pc_n();
        let value = self.regs.regs[rd(instr)] & 0xFF;
        self.store_byte(addr, value) || self.writeback_after_abort()
    }

    fn store_halfword_from(&mut self, instr: u32, addr: u32) -> bool {
        self.bus_used_inc_pc_n();
        let value = self.regs.regs[rd(instr)] & 0xFFFF;
        self.store_halfword(addr, value) || self.writeback_after_abort()
    }

    /// Checks shared by LDRD and STRD. Returns the addressing on success.
    fn double_addressing(&mut self, instr: u32) -> Option<Addressing> {
        let mode = Addressing::new(self.lhs(instr), self.ls7_rhs(instr), instr);
        let (d, n) = (rd(instr), rn(instr));
        if mode.writeback && !mode.pre {
            return None;
        }
        if d & 1 != 0 || mode.addr & 7 != 0 {
            return None;
        }
        if mode.writes_back() && (n == d || n == d + 1) {
            return None;
        }
        Some(mode)
    }

    /// LDRD: two word loads into an even/odd register pair.
    pub(super) fn exec_load_double(&mut self, instr: u32) {
        self.bus_used_inc_pc_s();
        let Some(mode) = self.double_addressing(instr).filter(|_| rd(instr) != 14) else {
            return self.undefined(instr);
        };
        let first = self.load_word(mode.addr, Cycle::NonSeq);
        let second = self.load_word(mode.addr.wrapping_add(4), Cycle::NonSeq);
        self.icycles(2);
        match (first, second) {
            (Some(lo), Some(hi)) => {
                let d = rd(instr);
                self.regs.regs[d] = lo;
                self.regs.regs[d + 1] = hi;
                self.write_back_base(instr, &mode, true);
            }
            _ => {
                let allowed = self.writeback_after_abort();
                self.write_back_base(instr, &mode, allowed);
            }
        }
    }

    /// STRD: two word stores from an even/odd register pair.
    pub(super) fn exec_store_double(&mut self, instr: u32) {
        self.bus_used_inc_pc_s();
        let Some(mode) = self.double_addressing(instr).filter(|_| rn(instr) != 15) else {
            return self.undefined(instr);
        };
        let d = rd(instr);
        let (lo, hi) = (self.regs.regs[d], self.regs.regs[d + 1]);
        let first = self.store_word(mode.addr, lo, Cycle::NonSeq);
        let second = self.store_word(mode.addr.wrapping_add(4), hi, Cycle::NonSeq);
        let allowed = (first && second) || self.writeback_after_abort();
        self.write_back_base(instr, &mode, allowed);
    }

    /// SWP and SWPB: load from [Rn], store Rm there, then write the loaded value to Rd.
    pub(super) fn exec_swap(&mut self, instr: u32, byte: bool) {
        let addr = self.lhs(instr);
        self.bus_used_inc_pc_s();
        let source = self.regs.regs[rm(instr)];
        let loaded = if byte {
            self.load_byte(addr)
        } else {
            self.load_word(addr, Cycle::NonSeq)
                .map(|w| w.rotate_right((addr & 3) * 8))
        };
        let Some(value) = loaded else {
            return;
        };
        let stored = if byte {
            self.store_byte(addr, source & 0xFF)
        } else {
            self.store_word(addr, source, Cycle::NonSeq)
        };
        if stored {
            self.write_dest(rd(instr), value);
        }
        self.icycles(1);
    }
}

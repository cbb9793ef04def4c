// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Barrel shifter and operand fetch.

use super::tables::IMMED_TABLE;
use super::ArmCore;
use crate::decoder::arm::{bit, bits, rm, rn, rs, split_imm8};
use crate::memory::MemoryPort;

#[inline(always)]
fn bit_of(value: u32, n: u32) -> bool {
    (value >> n) & 1 != 0
}

/// Shift by an immediate amount. LSR/ASR #0 encode a shift by 32, ROR #0 is RRX.
pub(crate) fn shift_imm(base: u32, kind: u32, amount: u32, carry_in: bool) -> (u32, bool) {
    match (kind, amount) {
        (0, 0) => (base, carry_in),
        (0, n) => (base << n, bit_of(base, 32 - n)),
        (1, 0) => (0, bit_of(base, 31)),
        (1, n) => (base >> n, bit_of(base, n - 1)),
        (2, 0) => (((base as i32) >> 31) as u32, bit_of(base, 31)),
        (2, n) => (((base as i32) >> n) as u32, bit_of(base, n - 1)),
        (_, 0) => ((base >> 1) | ((carry_in as u32) << 31), bit_of(base, 0)),
        (_, n) => (base.rotate_right(n), bit_of(base, n - 1)),
    }
}

/// Shift by the bottom byte of a register.
pub(crate) fn shift_reg(base: u32, kind: u32, amount: u32, carry_in: bool) -> (u32, bool) {
    if amount == 0 {
        return (base, carry_in);
    }
    match kind {
        0 => match amount {
            1..=31 => (base << amount, bit_of(base, 32 - amount)),
            32 => (0, bit_of(base, 0)),
            _ => (0, false),
        },
        1 => match amount {
            1..=31 => (base >> amount, bit_of(base, amount - 1)),
            32 => (0, bit_of(base, 31)),
            _ => (0, false),
        },
        2 => {
            if amount >= 32 {
                (((base as i32) >> 31) as u32, bit_of(base, 31))
            } else {
                (((base as i32) >> amount) as u32, bit_of(base, amount - 1))
            }
        }
        _ => {
            let rot = amount & 31;
            if rot == 0 {
                (base, bit_of(base, 31))
            } else {
                (base.rotate_right(rot), bit_of(base, rot - 1))
            }
        }
    }
}

impl<M: MemoryPort> ArmCore<M> {
    /// First ALU operand; R15 reads word aligned.
    #[inline]
    pub(crate) fn lhs(&self, instr: u32) -> u32 {
        let n = rn(instr);
        if n == 15 {
            self.regs.regs[15] & !3
        } else {
            self.regs.regs[n]
        }
    }

    /// Shifted register operand of a data-processing instruction, with the
    /// shifter carry out. A register-specified shift costs an internal cycle and
    /// advances R15 first.
    pub(crate) fn dp_reg_rhs(&mut self, instr: u32) -> (u32, bool) {
        let kind = bits(instr, 5, 6);
        if !bit(instr, 4) {
            let base = self.regs.regs[rm(instr)];
            return shift_imm(base, kind, bits(instr, 7, 11), self.regs.c);
        }
        self.inc_pc();
        self.icycles(1);
        let base = self.regs.regs[rm(instr)];
        let amount = self.regs.regs[rs(instr)] & 0xFF;
        shift_reg(base, kind, amount, self.regs.c)
    }

    /// Rotated immediate operand, with the carry out of the rotation.
    #[inline]
    pub(crate) fn dp_imm_rhs(&self, instr: u32) -> (u32, bool) {
        let field = instr & 0xFFF;
        let value = IMMED_TABLE[field as usize];
        if field > 0xFF {
            (value, bit_of(value, 31))
        } else {
            (value, self.regs.c)
        }
    }

    /// Register offset of a word/byte transfer (immediate shift only).
    #[inline]
    pub(crate) fn ls_reg_rhs(&self, instr: u32) -> u32 {
        let base = self.regs.regs[rm(instr)];
        shift_imm(base, bits(instr, 5, 6), bits(instr, 7, 11), self.regs.c).0
    }

    /// Offset of a halfword/doubleword transfer: split immediate or Rm.
    #[inline]
    pub(crate) fn ls7_rhs(&self, instr: u32) -> u32 {
        if bit(instr, 22) {
            split_imm8(instr)
        } else {
            self.regs.regs[rm(instr)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_shift_special_amounts() {
        // LSR #32, ASR #32, RRX
        assert_eq!(shift_imm(0x8000_0001, 1, 0, false), (0, true));
        assert_eq!(shift_imm(0x8000_0000, 2, 0, false), (0xFFFF_FFFF, true));
        assert_eq!(shift_imm(0x0000_0003, 3, 0, true), (0x8000_0001, true));
        // LSL #0 keeps the carry
        assert_eq!(shift_imm(0x1234, 0, 0, true), (0x1234, true));
        assert_eq!(shift_imm(0x8000_0001, 0, 1, false), (0x0000_0002, true));
        assert_eq!(shift_imm(0x0000_0011, 3, 4, false), (0x1000_0001, false));
    }

    #[test]
    fn test_register_shift_ranges() {
        assert_eq!(shift_reg(0xF0, 0, 0, true), (0xF0, true));
        assert_eq!(shift_reg(0x1, 0, 32, false), (0, true));
        assert_eq!(shift_reg(0x1, 0, 33, true), (0, false));
        assert_eq!(shift_reg(0x8000_0000, 1, 32, false), (0, true));
        assert_eq!(shift_reg(0x8000_0000, 1, 200, true), (0, false));
        assert_eq!(shift_reg(0x8000_0000, 2, 40, false), (0xFFFF_FFFF, true));
        assert_eq!(shift_reg(0x8000_0001, 3, 32, false), (0x8000_0001, true));
        assert_eq!(shift_reg(0x0000_0001, 3, 33, false), (0x8000_0000, true));
    }
}

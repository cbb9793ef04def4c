// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! v5e DSP extension: halfword multiplies and saturating arithmetic.
//!
//! Each `exec_dsp_*` returns false when the encoding belongs to something
//! else in the same primary slot.

use crate::cpu::flags::{add_overflow, sub_overflow};
use crate::cpu::ArmCore;
use crate::decoder::arm::{bit, bits};
use crate::memory::MemoryPort;

/// Signed 16-bit half of `value`; the top half when `top` is set.
#[inline]
fn half(value: u32, top: bool) -> i32 {
    let h = if top { value >> 16 } else { value };
    h as u16 as i16 as i32
}

/// Clamp an overflowed result to the limit on the side of the true result.
#[inline]
fn saturate(result: u32) -> u32 {
    if result >> 31 == 0 {
        0x8000_0000
    } else {
        0x7FFF_FFFF
    }
}

/// Saturating add; the flag reports saturation.
fn qadd(a: u32, b: u32) -> (u32, bool) {
    let result = a.wrapping_add(b);
    if add_overflow(a, b, result) {
        (saturate(result), true)
    } else {
        (result, false)
    }
}

fn qsub(a: u32, b: u32) -> (u32, bool) {
    let result = a.wrapping_sub(b);
    if sub_overflow(a, b, result) {
        (saturate(result), true)
    } else {
        (result, false)
    }
}

#[inline]
fn is_halfword_multiply(instr: u32) -> bool {
    !bit(instr, 4) && bit(instr, 7)
}

impl<M: MemoryPort> ArmCore<M> {
    #[inline]
    fn operands(&self, instr: u32) -> (u32, u32, u32, u32) {
        let r = &self.regs.regs;
        (
            r[bits(instr, 0, 3) as usize],
            r[bits(instr, 8, 11) as usize],
            r[bits(instr, 12, 15) as usize],
            r[bits(instr, 16, 19) as usize],
        )
    }

    #[inline]
    fn set_q_if(&mut self, saturated: bool) {
        if saturated {
            self.regs.q = true;
        }
    }

    /// SMLAxy, QADD.
    pub(super) fn exec_dsp_10(&mut self, instr: u32) -> bool {
        let (m, s, acc, n) = self.operands(instr);
        if is_halfword_multiply(instr) {
            let product = half(m, bit(instr, 5)).wrapping_mul(half(s, bit(instr, 6))) as u32;
            let result = product.wrapping_add(acc);
            self.set_q_if(add_overflow(product, acc, result));
            self.regs.regs[bits(instr, 16, 19) as usize] = result;
            return true;
        }
        if bits(instr, 4, 11) == 5 {
            let (result, sat) = qadd(m, n);
            self.set_q_if(sat);
            self.regs.regs[bits(instr, 12, 15) as usize] = result;
            return true;
        }
        false
    }

    /// SMLAWy, SMULWy, QSUB.
    pub(super) fn exec_dsp_12(&mut self, instr: u32) -> bool {
        let (m, s, acc, n) = self.operands(instr);
        let accumulate = !bit(instr, 5);
        if is_halfword_multiply(instr) && (accumulate || bits(instr, 12, 15) == 0) {
            let wide = (m as i32 as i64) * (half(s, bit(instr, 6)) as i64);
            let mut result = (wide >> 16) as u32;
            if accumulate {
                let sum = result.wrapping_add(acc);
                self.set_q_if(add_overflow(result, acc, sum));
                result = sum;
            }
            self.regs.regs[bits(instr, 16, 19) as usize] = result;
            return true;
        }
        if bits(instr, 4, 11) == 5 {
            let (result, sat) = qsub(m, n);
            self.set_q_if(sat);
            self.regs.regs[bits(instr, 12, 15) as usize] = result;
            return true;
        }
        false
    }

    /// SMLALxy, QDADD.
    pub(super) fn exec_dsp_14(&mut self, instr: u32) -> bool {
        let (m, s, lo, hi) = self.operands(instr);
        if is_halfword_multiply(instr) {
            let product = half(m, bit(instr, 5)) as i64 * half(s, bit(instr, 6)) as i64;
            let acc = ((hi as u64) << 32) | lo as u64;
            let result = acc.wrapping_add(product as u64);
            self.regs.regs[bits(instr, 12, 15) as usize] = result as u32;
            self.regs.regs[bits(instr, 16, 19) as usize] = (result >> 32) as u32;
            return true;
        }
        if bits(instr, 4, 11) == 5 {
            let (doubled, sat_double) = qadd(hi, hi);
            let (result, sat) = qadd(m, doubled);
            self.set_q_if(sat_double || sat);
            self.regs.regs[bits(instr, 12, 15) as usize] = result;
            return true;
        }
        false
    }

    /// SMULxy, QDSUB.
    pub(super) fn exec_dsp_16(&mut self, instr: u32) -> bool {
        let (m, s, _, n) = self.operands(instr);
        if is_halfword_multiply(instr) && bits(instr, 12, 15) == 0 {
            let product = half(m, bit(instr, 5)).wrapping_mul(half(s, bit(instr, 6)));
            self.regs.regs[bits(instr, 16, 19) as usize] = product as u32;
            return true;
        }
        if bits(instr, 4, 11) == 5 {
            let (doubled, sat_double) = qadd(n, n);
            let (result, sat) = qsub(m, doubled);
            self.set_q_if(sat_double || sat);
            self.regs.regs[bits(instr, 12, 15) as usize] = result;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_selection() {
        assert_eq!(half(0x8000_7FFF, false), 0x7FFF);
        assert_eq!(half(0x8000_7FFF, true), -0x8000);
    }

    #[test]
    fn test_saturating_arithmetic() {
        assert_eq!(qadd(0x7FFF_FFFF, 1), (0x7FFF_FFFF, true));
        assert_eq!(qadd(0x8000_0000, 0xFFFF_FFFF), (0x8000_0000, true));
        assert_eq!(qadd(1, 2), (3, false));
        assert_eq!(qsub(0x8000_0000, 1), (0x8000_0000, true));
        assert_eq!(qsub(0x7FFF_FFFF, 0xFFFF_FFFF), (0x7FFF_FFFF, true));
        assert_eq!(qsub(5, 7), (0xFFFF_FFFE, false));
    }
}

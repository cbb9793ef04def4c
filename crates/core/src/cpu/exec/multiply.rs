// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::tables::mult_cycles;
use crate::cpu::ArmCore;
use crate::decoder::arm::bits;
use crate::memory::MemoryPort;

/// Internal cycles of the long multiplies: two plus the significant bytes of
/// the multiplier (its magnitude when signed).
fn long_mult_cycles(rm_val: u32, signed: bool) -> u32 {
    let mut value = rm_val;
    if signed {
        value = (value as i32).unsigned_abs();
        if value >> 31 != 0 {
            value = !value;
        }
    }
    let significant = if value & 0xFFFF_FF00 == 0 {
        1
    } else if value & 0xFFFF_0000 == 0 {
        2
    } else if value & 0xFF00_0000 == 0 {
        3
    } else {
        4
    };
    2 + significant
}

impl<M: MemoryPort> ArmCore<M> {
    /// MUL and MLA. Rd = Rm yields 0 (MUL) or the accumulator (MLA).
    pub(super) fn exec_mul(&mut self, instr: u32, accumulate: bool, set_flags: bool) {
        let dest = bits(instr, 16, 19) as usize;
        let m = bits(instr, 0, 3) as usize;
        let rs_val = self.regs.regs[bits(instr, 8, 11) as usize];
        let acc = self.regs.regs[bits(instr, 12, 15) as usize];

        if m == dest {
            let result = if accumulate { acc } else { 0 };
            self.regs.regs[dest] = result;
            if set_flags {
                self.regs.neg_zero(result);
            }
        } else if dest != 15 {
            let mut result = self.regs.regs[m].wrapping_mul(rs_val);
            if accumulate {
                result = result.wrapping_add(acc);
            }
            self.regs.regs[dest] = result;
            if set_flags {
                self.regs.neg_zero(result);
            }
        }
        self.icycles(mult_cycles(rs_val));
    }

    /// UMULL, UMLAL, SMULL and SMLAL (primary 0x08-0x0F).
    pub(super) fn exec_mul_long(&mut self, instr: u32, p: u32) {
        let hi = bits(instr, 16, 19) as usize;
        let lo = bits(instr, 12, 15) as usize;
        let s = bits(instr, 8, 11) as usize;
        let m = bits(instr, 0, 3) as usize;
        let signed = p & 0x04 != 0;
        let accumulate = p & 0x02 != 0;
        let set_flags = p & 0x01 != 0;

        if [hi, lo, s, m].contains(&15) || hi == lo || hi == m || lo == m {
            tracing::warn!(
                "Unpredictable long multiply {:#010x} at {:#010x} ignored",
                instr,
                self.pipeline.pc
            );
            return;
        }

        let rm_val = self.regs.regs[m];
        let rs_val = self.regs.regs[s];
        let mut result = if signed {
            ((rm_val as i32 as i64) * (rs_val as i32 as i64)) as u64
        } else {
            rm_val as u64 * rs_val as u64
        };
        if accumulate {
            let acc = ((self.regs.regs[hi] as u64) << 32) | self.regs.regs[lo] as u64;
            result = result.wrapping_add(acc);
        }
        let (res_hi, res_lo) = ((result >> 32) as u32, result as u32);
        self.regs.regs[hi] = res_hi;
        self.regs.regs[lo] = res_lo;
        if set_flags {
            self.regs.neg_zero(res_hi | (res_lo >> 16) | (res_lo & 0xFFFF));
        }
        let extra = accumulate as u32;
        self.icycles(long_mult_cycles(rm_val, signed) + extra);
    }
}

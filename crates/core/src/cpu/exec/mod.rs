// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Primary dispatch on bits 27:20.
//!
//! Several encodings share a primary index and are told apart by secondary
//! fields. The guards inside each arm are tried in a fixed priority order; the
//! data-processing interpretation is always the last resort.

mod block;
mod coproc;
mod data_proc;
mod dsp;
mod multiply;
mod psr;
mod transfer;

use super::{ArmCore, Vector, ARM_ABORT_WORD, THUMB_ABORT_WORD};
use crate::decoder::arm::{bit, bits, branch_offset, primary, rd, rm};
use crate::memory::MemoryPort;

/// Halfword/signed load encoding in the data-processing register space.
#[inline]
fn is_halfword_load(instr: u32) -> bool {
    let pattern = if bit(instr, 22) {
        bits(instr, 4, 7) & 9 == 9
    } else {
        bits(instr, 4, 11) & 0xF9 == 9
    };
    pattern && bits(instr, 5, 6) != 0
}

#[inline]
fn is_halfword_store(instr: u32) -> bool {
    if bit(instr, 22) {
        bits(instr, 4, 7) == 0xB
    } else {
        bits(instr, 4, 11) == 0xB
    }
}

impl<M: MemoryPort> ArmCore<M> {
    pub(super) fn execute(&mut self, instr: u32) {
        match primary(instr) {
            p @ 0x00..=0x1F => self.exec_register_space(instr, p),
            p @ 0x20..=0x3F => self.exec_immediate_space(instr, p),
            0x40..=0x7F => self.exec_single_transfer(instr),
            0x80..=0x9F => self.exec_block_transfer(instr),
            p @ 0xA0..=0xBF => self.exec_branch(instr, p >= 0xB0),
            p @ 0xC0..=0xEF => self.exec_coprocessor(instr, p),
            _ => self.exec_swi(instr),
        }
    }

    /// Condition field 0xF on v5: BLX(1), PLD and the coprocessor forms.
    pub(super) fn execute_unconditional(&mut self, instr: u32) {
        match bits(instr, 25, 27) {
            5 => {
                let pc = self.pipeline.pc;
                self.regs.regs[14] = pc.wrapping_add(4);
                let dest = pc
                    .wrapping_add(8)
                    .wrapping_add(branch_offset(instr))
                    .wrapping_add((bit(instr, 24) as u32) << 1)
                    | 1;
                self.write_r15_branch(dest);
            }
            _ if instr & 0xFC70_F000 == 0xF450_F000 => {
                // PLD
            }
            6 => self.exec_coprocessor(instr, primary(instr)),
            _ => self.undefined(instr),
        }
    }

    /// 0x00-0x1F: data processing with a register operand and everything that
    /// hides in its encoding space.
    fn exec_register_space(&mut self, instr: u32, p: u32) {
        let op = (p >> 1) & 0xF;

        if p & 1 != 0 {
            if is_halfword_load(instr) {
                return self.exec_halfword_transfer(instr, true);
            }
            if bits(instr, 4, 7) == 9 {
                match p {
                    0x01 | 0x03 => return self.exec_mul(instr, p == 0x03, true),
                    0x09..=0x0F => return self.exec_mul_long(instr, p),
                    _ => {}
                }
            }
            if (0x11..=0x17).contains(&p) {
                let (rhs, carry) = self.dp_reg_rhs(instr);
                return self.exec_compare(instr, op, rhs, carry);
            }
            let (rhs, carry) = self.dp_reg_rhs(instr);
            return self.exec_alu(instr, op, true, rhs, carry);
        }

        if self.config.is_v5e {
            let handled = match p {
                0x10 => self.exec_dsp_10(instr),
                0x12 => self.exec_dsp_12(instr),
                0x14 => self.exec_dsp_14(instr),
                0x16 => self.exec_dsp_16(instr),
                _ => false,
            };
            if handled {
                return;
            }
        }
        if p == 0x12 && self.config.is_v5 && bits(instr, 4, 7) == 3 {
            return self.exec_blx_register(instr);
        }
        if is_halfword_store(instr) {
            return self.exec_halfword_transfer(instr, false);
        }
        if p == 0x12 && bits(instr, 4, 27) == 0x12_FFF1 {
            return self.write_r15_branch(self.regs.regs[rm(instr)]);
        }
        // post-indexed doubleword transfers with W set are not LDRD/STRD
        let post_wb = p < 0x10 && p & 0x02 != 0;
        if self.config.is_v5 && !post_wb {
            match bits(instr, 4, 7) {
                0xD => return self.exec_load_double(instr),
                0xF => return self.exec_store_double(instr),
                _ => {}
            }
        }
        if bits(instr, 4, 7) == 9 {
            match p {
                0x00 | 0x02 => return self.exec_mul(instr, p == 0x02, false),
                0x08..=0x0E => return self.exec_mul_long(instr, p),
                0x10 | 0x14 if bits(instr, 8, 11) == 0 => {
                    return self.exec_swap(instr, p == 0x14)
                }
                _ => {}
            }
        }

        match p {
            0x10 | 0x14 => {
                if bits(instr, 0, 11) == 0 && bits(instr, 16, 19) == 0xF {
                    self.exec_mrs(instr, p == 0x14);
                }
            }
            0x12 => {
                if self.config.is_v5 && bits(instr, 4, 7) == 7 {
                    tracing::debug!("BKPT at {:#010x}", self.pipeline.pc);
                    self.take_exception(Vector::PrefetchAbort);
                } else if rd(instr) == 15 {
                    let (rhs, _) = self.dp_reg_rhs(instr);
                    self.exec_msr(instr, false, rhs & !super::registers::T_BIT);
                }
            }
            0x16 => {
                if self.config.is_v5
                    && bits(instr, 4, 11) == 0xF1
                    && bits(instr, 16, 19) == 0xF
                {
                    self.exec_clz(instr);
                } else if rd(instr) == 15 {
                    let (rhs, _) = self.dp_reg_rhs(instr);
                    self.exec_msr(instr, true, rhs);
                }
            }
            _ => {
                let (rhs, carry) = self.dp_reg_rhs(instr);
                self.exec_alu(instr, op, false, rhs, carry);
            }
        }
    }

    /// 0x20-0x3F: data processing with a rotated immediate, and MSR immediate.
    fn exec_immediate_space(&mut self, instr: u32, p: u32) {
        let op = (p >> 1) & 0xF;
        let (rhs, carry) = self.dp_imm_rhs(instr);
        match p {
            0x30 | 0x34 => {}
            0x32 => {
                if rd(instr) == 15 {
                    self.exec_msr(instr, false, rhs);
                }
            }
            0x36 => {
                if rd(instr) == 15 {
                    self.exec_msr(instr, true, rhs);
                }
            }
            0x31 | 0x33 | 0x35 | 0x37 => self.exec_compare(instr, op, rhs, carry),
            _ => self.exec_alu(instr, op, p & 1 != 0, rhs, carry),
        }
    }

    fn exec_branch(&mut self, instr: u32, link: bool) {
        let pc = self.pipeline.pc;
        if link {
            self.regs.regs[14] = pc.wrapping_add(4);
        }
        self.regs.regs[15] = pc.wrapping_add(8).wrapping_add(branch_offset(instr));
        self.pipeline.flush();
    }

    fn exec_swi(&mut self, instr: u32) {
        let abort_word = if self.regs.t {
            THUMB_ABORT_WORD
        } else {
            ARM_ABORT_WORD
        };
        if instr == abort_word {
            self.take_exception(Vector::PrefetchAbort);
        } else {
            self.take_exception(Vector::Swi);
        }
    }
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::ArmCore;
use crate::decoder::arm::rd;
use crate::memory::MemoryPort;

impl<M: MemoryPort> ArmCore<M> {
    /// Data-processing operation `op` (bits 24:21) other than the test group.
    /// `rhs` must already be evaluated: a register-specified shift advances R15,
    /// which the first operand then observes.
    pub(super) fn exec_alu(
        &mut self,
        instr: u32,
        op: u32,
        set_flags: bool,
        rhs: u32,
        shift_carry: bool,
    ) {
        let lhs = self.lhs(instr);
        let dest = rd(instr);
        let carry = self.regs.c as u32;

        let result = match op {
            0x0 => lhs & rhs,
            0x1 => lhs ^ rhs,
            0x2 => lhs.wrapping_sub(rhs),
            0x3 => rhs.wrapping_sub(lhs),
            0x4 => lhs.wrapping_add(rhs),
            0x5 => lhs.wrapping_add(rhs).wrapping_add(carry),
            0x6 => lhs.wrapping_sub(rhs).wrapping_sub(1 - carry),
            0x7 => rhs.wrapping_sub(lhs).wrapping_sub(1 - carry),
            0xC => lhs | rhs,
            0xD => rhs,
            0xE => lhs & !rhs,
            0xF => !rhs,
            _ => {
                tracing::warn!("Test opcode {:#x} routed to the ALU path", op);
                return;
            }
        };

        if !set_flags {
            return self.write_dest(dest, result);
        }
        // R15 destinations restore the CPSR instead of setting flags
        if dest != 15 {
            match op {
                0x2 | 0x6 => self.regs.set_sub_flags(lhs, rhs, result),
                0x3 | 0x7 => self.regs.set_sub_flags(rhs, lhs, result),
                0x4 | 0x5 => self.regs.set_add_flags(lhs, rhs, result),
                _ => self.regs.c = shift_carry,
            }
        }
        self.write_sdest(dest, result);
    }

    /// TST, TEQ, CMP and CMN. With Rd = R15 the old "P" form copies SPSR to CPSR.
    pub(super) fn exec_compare(&mut self, instr: u32, op: u32, rhs: u32, shift_carry: bool) {
        if rd(instr) == 15 {
            let spsr = self.regs.current_spsr();
            self.regs.set_cpsr(spsr);
            return;
        }
        let lhs = self.lhs(instr);
        match op {
            0x8 => {
                self.regs.neg_zero(lhs & rhs);
                self.regs.c = shift_carry;
            }
            0x9 => {
                self.regs.neg_zero(lhs ^ rhs);
                self.regs.c = shift_carry;
            }
            0xA => self.regs.set_sub_flags(lhs, rhs, lhs.wrapping_sub(rhs)),
            _ => self.regs.set_add_flags(lhs, rhs, lhs.wrapping_add(rhs)),
        }
    }
}

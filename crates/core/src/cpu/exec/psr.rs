// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Status register moves, interworking branches and CLZ.

use crate::cpu::registers::T_BIT;
use crate::cpu::ArmCore;
use crate::decoder::arm::{rd, rm};
use crate::memory::MemoryPort;

impl<M: MemoryPort> ArmCore<M> {
    /// MRS. The CPSR form reads without the T bit.
    pub(super) fn exec_mrs(&mut self, instr: u32, spsr: bool) {
        let value = if spsr {
            self.regs.current_spsr()
        } else {
            self.regs.cpsr() & !T_BIT
        };
        self.write_dest(rd(instr), value);
    }

    /// MSR with an already evaluated operand.
    pub(super) fn exec_msr(&mut self, instr: u32, spsr: bool, value: u32) {
        if spsr {
            self.regs.fix_spsr(instr, value);
        } else {
            self.regs.fix_cpsr(instr, value);
        }
    }

    /// BLX(2): branch to Rm with interworking, link to the next instruction.
    pub(super) fn exec_blx_register(&mut self, instr: u32) {
        let pc = self.pipeline.pc;
        let link = if self.regs.t {
            pc.wrapping_add(2) | 1
        } else {
            pc.wrapping_add(4)
        };
        let target = self.regs.regs[rm(instr)];
        self.write_r15_branch(target);
        self.regs.regs[14] = link;
    }

    pub(super) fn exec_clz(&mut self, instr: u32) {
        let value = self.regs.regs[rm(instr)];
        self.write_dest(rd(instr), value.leading_zeros());
    }
}

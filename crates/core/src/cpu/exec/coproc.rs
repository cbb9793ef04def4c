// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Coprocessor space. Only register transfers are routed to the memory port;
//! LDC, STC and CDP have no attached coprocessor and are undefined.

use crate::cpu::ArmCore;
use crate::decoder::arm::{bit, cp_num, rd};
use crate::memory::MemoryPort;

impl<M: MemoryPort> ArmCore<M> {
    fn coprocessor_allowed(&self, instr: u32) -> bool {
        cp_num(instr) >= self.config.coprocessor_min
    }

    /// 0xC0-0xEF.
    pub(super) fn exec_coprocessor(&mut self, instr: u32, p: u32) {
        if p < 0xE0 {
            if !self.coprocessor_allowed(instr) {
                tracing::debug!("Access to CP{} denied", cp_num(instr));
            }
            return self.undefined(instr);
        }
        if !bit(instr, 4) {
            return self.undefined(instr);
        }
        if !self.coprocessor_allowed(instr) {
            tracing::debug!("Access to CP{} denied", cp_num(instr));
            return self.undefined(instr);
        }
        if p & 1 == 0 {
            self.exec_mcr(instr);
        } else {
            self.exec_mrc(instr);
        }
    }

    fn exec_mcr(&mut self, instr: u32) {
        let d = rd(instr);
        let value = if d == 15 {
            self.regs.regs[15].wrapping_add(self.isize())
        } else {
            self.regs.regs[d]
        };
        if self.mem.coprocessor_write(instr, value).is_err() {
            return self.undefined(instr);
        }
        self.bus_used_inc_pc_n();
        self.ccycles(1);
        if self.mem.take_wait_for_interrupt() {
            self.wait_for_interrupt();
        }
    }

    /// MRC. With Rd = R15 only the top four bits land, in the condition flags.
    fn exec_mrc(&mut self, instr: u32) {
        let Ok(value) = self.mem.coprocessor_read(instr) else {
            return self.undefined(instr);
        };
        self.bus_used_inc_pc_n();
        self.ccycles(1);
        self.icycles(1);
        let d = rd(instr);
        if d == 15 {
            self.regs.n = bit(value, 31);
            self.regs.z = bit(value, 30);
            self.regs.c = bit(value, 29);
            self.regs.v = bit(value, 28);
        } else {
            self.regs.regs[d] = value;
        }
    }
}

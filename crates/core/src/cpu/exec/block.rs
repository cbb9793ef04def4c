// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! LDM and STM, including the user-bank (`^`) forms.

use crate::cpu::tables::lsm_num_regs;
use crate::cpu::{ArmCore, Cycle, Mode};
use crate::decoder::arm::{bit, rn};
use crate::memory::MemoryPort;

/// Start address and writeback value of a block transfer.
fn block_addresses(base: u32, bytes: u32, pre: bool, up: bool) -> (u32, u32) {
    match (pre, up) {
        (false, false) => {
            let lowest = base.wrapping_sub(bytes);
            (lowest.wrapping_add(4), lowest)
        }
        (false, true) => (base, base.wrapping_add(bytes)),
        (true, false) => (base.wrapping_sub(bytes), base.wrapping_sub(bytes)),
        (true, true) => (base.wrapping_add(4), base.wrapping_add(bytes)),
    }
}

/// Registers named in a list, lowest first.
fn listed(list: u32) -> impl Iterator<Item = usize> {
    (0..16).filter(move |i| list & (1 << i) != 0)
}

impl<M: MemoryPort> ArmCore<M> {
    /// 0x80-0x9F.
    pub(super) fn exec_block_transfer(&mut self, instr: u32) {
        let list = instr & 0xFFFF;
        if list == 0 {
            return self.undefined(instr);
        }
        let bytes = lsm_num_regs(list);
        let (start, updated) = block_addresses(self.lhs(instr), bytes, bit(instr, 24), bit(instr, 23));
        let n = rn(instr);
        let writeback = (bit(instr, 21) && n != 15).then_some((n, updated));
        let original = (n, self.regs.regs[n]);

        match (bit(instr, 20), bit(instr, 22)) {
            (true, false) => self.load_multiple(list, start, writeback, original),
            (true, true) => self.load_multiple_user(list, start, writeback, original),
            (false, user) => self.store_multiple(list, start, user, writeback),
        }
    }

    /// Loads words until the first fault. Returns the loaded values (absent
    /// entries after a fault) and whether the sequence completed.
    fn load_sequence(&mut self, list: u32, start: u32) -> ([Option<u32>; 16], bool) {
        let mut values = [None; 16];
        let mut addr = start;
        let mut cycle = Cycle::NonSeq;
        for i in listed(list) {
            match self.load_word(addr, cycle) {
                Some(v) => values[i] = Some(v),
                None => return (values, false),
            }
            cycle = Cycle::Seq;
            addr = addr.wrapping_add(4);
        }
        (values, true)
    }

    fn block_writeback(&mut self, writeback: Option<(usize, u32)>, completed: bool) {
        if let Some((n, updated)) = writeback {
            if completed || self.config.base_updated_abort {
                self.regs.regs[n] = updated;
            }
        }
    }

    /// An aborted load never leaves a loaded value in its base register: it
    /// holds either the original or (base-updated model) the writeback value.
    fn restore_base(&mut self, (n, value): (usize, u32), writeback: Option<(usize, u32)>) {
        if n == 15 {
            return;
        }
        match writeback {
            Some((_, updated)) if self.config.base_updated_abort => self.regs.regs[n] = updated,
            _ => self.regs.regs[n] = value,
        }
    }

    fn load_multiple(
        &mut self,
        list: u32,
        start: u32,
        writeback: Option<(usize, u32)>,
        original: (usize, u32),
    ) {
        self.bus_used_inc_pc_s();
        let (values, completed) = self.load_sequence(list, start);
        for (i, value) in values.iter().enumerate().take(15) {
            if let Some(v) = value {
                self.regs.regs[i] = *v;
            }
        }
        if completed {
            if let Some(pc) = values[15] {
                if self.config.is_v5 {
                    self.write_r15_branch(pc);
                } else {
                    self.write_r15(pc);
                }
            }
        }
        self.icycles(1);
        self.block_writeback(writeback, completed);
        if !completed {
            self.restore_base(original, writeback);
        }
    }

    /// LDM with S: without R15 in the list the user bank is loaded; with R15 it
    /// is an exception return that restores CPSR from the SPSR.
    fn load_multiple_user(
        &mut self,
        list: u32,
        start: u32,
        writeback: Option<(usize, u32)>,
        original: (usize, u32),
    ) {
        self.bus_used_inc_pc_s();
        let (values, completed) = self.load_sequence(list, start);
        let user = Mode::User.bits();
        let returns = list & (1 << 15) != 0;
        for (i, value) in values.iter().enumerate().take(15) {
            if let Some(v) = value {
                if returns {
                    self.regs.regs[i] = *v;
                } else {
                    self.regs.set_reg(user, i, *v);
                }
            }
        }
        self.block_writeback(writeback, completed);
        if !completed {
            self.restore_base(original, writeback);
        }
        if completed && returns {
            if self.regs.current_bank().has_spsr() {
                let spsr = self.regs.current_spsr();
                self.regs.set_cpsr(spsr);
            }
            if let Some(pc) = values[15] {
                self.write_r15(pc);
            }
        }
        self.icycles(1);
    }

    /// STM. With S set the user-bank registers are stored.
    fn store_multiple(
        &mut self,
        list: u32,
        start: u32,
        user: bool,
        writeback: Option<(usize, u32)>,
    ) {
        if user || !self.regs.t {
            self.bus_used_inc_pc_n();
        }
        let mut addr = start;
        let mut cycle = Cycle::NonSeq;
        let mut completed = true;
        for i in listed(list) {
            let value = if user {
                self.regs.get_reg(Mode::User.bits(), i)
            } else {
                self.regs.regs[i]
            };
            if !self.store_word(addr, value, cycle) {
                completed = false;
                break;
            }
            cycle = Cycle::Seq;
            addr = addr.wrapping_add(4);
        }
        self.block_writeback(writeback, completed);
    }
}

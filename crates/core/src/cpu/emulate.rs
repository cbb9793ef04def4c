// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::registers::{F_BIT, I_BIT};
use super::{ArmCore, Cycle, FetchFlags, FetchKind, RunMode, Vector, THUMB_ABORT_WORD};
use crate::debug::SIGTRAP;
use crate::decoder::arm::cond;
use crate::decoder::ThumbOutcome;
use crate::memory::MemoryPort;

impl<M: MemoryPort> ArmCore<M> {
    /// Retire one instruction (or take one exception).
    pub fn step(&mut self) {
        self.aborted = None;
        self.abort_signal = false;
        self.advance_pipeline();

        if self.reset_line {
            self.take_exception(Vector::Reset);
            return self.retire();
        }
        if self.fiq_line && self.regs.int_bits & F_BIT == 0 {
            self.take_exception(Vector::Fiq);
            return self.retire();
        }
        if self.irq_line && self.regs.int_bits & I_BIT == 0 {
            self.take_exception(Vector::Irq);
            return self.retire();
        }

        if !self.debug_hook() {
            return self.retire();
        }

        self.counters.num_instrs += 1;
        let pc = self.pipeline.pc;
        let mut instr = self.pipeline.instr;
        for observer in &self.observers {
            observer.on_step_start(pc, instr);
        }

        if self.regs.t && instr != THUMB_ABORT_WORD {
            let mut ctx = super::ThumbContext {
                regs: &mut self.regs,
                pipeline: &mut self.pipeline,
            };
            match self
                .thumb
                .decode(&mut ctx, pc, instr as u16, (instr >> 16) as u16)
            {
                ThumbOutcome::Decoded(arm) => instr = arm,
                ThumbOutcome::AlreadyHandled => return self.retire(),
                ThumbOutcome::Undefined => {
                    self.undefined(instr & 0xFFFF);
                    return self.retire();
                }
            }
        }

        tracing::trace!("pc={:#010x} instr={:#010x}", pc, instr);

        let condition = cond(instr);
        if condition == 0xF {
            if self.config.is_v5 {
                self.execute_unconditional(instr);
            }
        } else if self.regs.condition_passed(condition) {
            self.execute(instr);
        }

        if let Some(vector) = self.aborted.take() {
            self.take_exception(vector);
        }
        self.retire();
    }

    /// Run until `max_steps` instructions have retired. Returns the number run.
    pub fn run(&mut self, max_steps: u64) -> u64 {
        for observer in &self.observers {
            observer.on_simulation_start();
        }
        let mut steps = 0;
        while steps < max_steps {
            self.step();
            steps += 1;
        }
        for observer in &self.observers {
            observer.on_simulation_stop();
        }
        steps
    }

    /// Fetch stage: act on the request left by the previous instruction.
    fn advance_pipeline(&mut self) {
        let isize = self.isize();
        match self.pipeline.next.kind() {
            FetchKind::Sequential | FetchKind::NonSequential => {
                let cycle = if self.pipeline.next.contains(FetchFlags::NONSEQ) {
                    Cycle::NonSeq
                } else {
                    Cycle::Seq
                };
                self.regs.regs[15] = self.regs.regs[15].wrapping_add(isize);
                self.pipeline.pc = self.pipeline.pc.wrapping_add(isize);
                let fetched = self.fetch(self.pipeline.pc.wrapping_add(2 * isize), cycle);
                self.pipeline.shift(fetched);
            }
            FetchKind::PcIncedSequential | FetchKind::PcIncedNonSequential => {
                let cycle = if self.pipeline.next.contains(FetchFlags::NONSEQ) {
                    Cycle::NonSeq
                } else {
                    Cycle::Seq
                };
                self.pipeline.pc = self.pipeline.pc.wrapping_add(isize);
                let fetched = self.fetch(self.pipeline.pc.wrapping_add(2 * isize), cycle);
                self.pipeline.shift(fetched);
            }
            FetchKind::Prime => {
                let pc = self.regs.regs[15] & if self.regs.t { !1 } else { !3 };
                self.pipeline.pc = pc;
                self.regs.regs[15] = pc.wrapping_add(2 * isize);
                self.pipeline.instr = self.fetch(pc, Cycle::NonSeq);
                self.pipeline.decoded = self.fetch(pc.wrapping_add(isize), Cycle::Seq);
                self.pipeline.loaded = self.fetch(pc.wrapping_add(2 * isize), Cycle::Seq);
            }
        }
        self.pipeline.next = FetchFlags::empty();
        self.mid_step = true;
    }

    /// Debugger hook run before every instruction. Returns false when the
    /// pending instruction must not execute.
    fn debug_hook(&mut self) -> bool {
        let Some(mut dbg) = self.debugger.take() else {
            return true;
        };
        let attached = dbg.check_remote(self);
        if attached {
            let trapped = match self.run_mode {
                RunMode::Once => true,
                RunMode::Run => {
                    self.breakpoints.contains(self.pipeline.pc) || dbg.check_ctrl_c()
                }
            };
            if trapped {
                tracing::debug!("Debugger trap at {:#010x}", self.pipeline.pc);
                self.run_mode = RunMode::Run;
                dbg.handle_signal(self, SIGTRAP);
            }
        } else {
            self.run_mode = RunMode::Run;
        }
        self.debugger = Some(dbg);

        if self.pc_changed {
            self.pc_changed = false;
            self.pipeline.flush();
            return false;
        }
        true
    }

    /// End of an instruction: report internal cycles to the host.
    fn retire(&mut self) {
        self.mid_step = false;
        let delta = self.counters.num_icycles - self.counters.previous_icycles;
        self.counters.previous_icycles = self.counters.num_icycles;
        if let Err(err) = self.host.exec_cycles(delta) {
            self.report_host_error(err);
        }
        for observer in &self.observers {
            observer.on_step_end(delta as u32);
        }
    }

    /// The CP15 wait-for-interrupt operation completed.
    pub(crate) fn wait_for_interrupt(&mut self) {
        tracing::trace!("Wait for interrupt at {:#010x}", self.pipeline.pc);
        if let Err(err) = self.host.idle() {
            self.report_host_error(err);
        }
        if let Some(dbg) = self.debugger.as_mut() {
            if dbg.check_ctrl_c() {
                self.run_mode = RunMode::Once;
            }
        }
    }
}

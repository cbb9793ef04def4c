// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The ARM v4/v5/v5e interpreter.

pub mod exception;
pub mod flags;
pub mod modes;
pub mod pipeline;
pub mod registers;
pub mod tables;

mod emulate;
mod exec;
mod operands;

pub use exception::Vector;
pub use modes::{Bank, Mode};
pub use pipeline::{FetchFlags, FetchKind, Pipeline};
pub use registers::RegisterFile;

use crate::config::CoreConfig;
use crate::debug::{BreakpointError, BreakpointSet, CoreRegisters, DebugTarget, Debugger};
use crate::decoder::{ThumbBridge, ThumbState, ThumbTranslator};
use crate::host::{Host, UnboundHost};
use crate::memory::{Fault, MemoryPort, ProgramImage};
use crate::{SimResult, SimulationError, SimulationObserver};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// SWI encoding planted by a fetch abort; executing it takes the prefetch abort.
pub const ARM_ABORT_WORD: u32 = 0xEFFF_FFFF;
/// Thumb state counterpart of [`ARM_ABORT_WORD`].
pub const THUMB_ABORT_WORD: u32 = 0xEFFF_DFFF;

/// Bus cycle tallies, in the S/N/I/C classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCounters {
    pub num_scycles: u64,
    pub num_ncycles: u64,
    pub num_icycles: u64,
    pub num_ccycles: u64,
    pub num_instrs: u64,
    /// `num_icycles` at the last report to the host.
    pub previous_icycles: u64,
}

impl CycleCounters {
    pub fn total(&self) -> u64 {
        self.num_scycles + self.num_ncycles + self.num_icycles + self.num_ccycles
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cycle {
    Seq,
    NonSeq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Run,
    /// Stop before the next instruction.
    Once,
}

/// Interpreter state plus the collaborators it was built with.
pub struct ArmCore<M: MemoryPort> {
    pub regs: RegisterFile,
    pub pipeline: Pipeline,
    pub config: CoreConfig,
    pub mem: M,
    pub breakpoints: BreakpointSet,
    pub counters: CycleCounters,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
    host: Box<dyn Host>,
    thumb: Box<dyn ThumbBridge>,
    debugger: Option<Box<dyn Debugger>>,
    aborted: Option<Vector>,
    abort_signal: bool,
    reset_line: bool,
    irq_line: bool,
    fiq_line: bool,
    run_mode: RunMode,
    pc_changed: bool,
    /// Between the fetch stage and retirement of the current instruction.
    mid_step: bool,
    host_error_logged: bool,
}

impl<M: MemoryPort> std::fmt::Debug for ArmCore<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmCore")
            .field("regs", &self.regs)
            .field("pipeline", &self.pipeline)
            .field("config", &self.config)
            .field("counters", &self.counters)
            .field("debugger_attached", &self.debugger.is_some())
            .finish_non_exhaustive()
    }
}

impl<M: MemoryPort> ArmCore<M> {
    pub fn new(config: CoreConfig, mem: M) -> Self {
        let thumb = Box::new(ThumbTranslator::new(config.is_v5));
        Self {
            regs: RegisterFile::new(),
            pipeline: Pipeline::new(),
            config,
            mem,
            breakpoints: BreakpointSet::new(),
            counters: CycleCounters::default(),
            observers: Vec::new(),
            host: Box::new(UnboundHost),
            thumb,
            debugger: None,
            aborted: None,
            abort_signal: false,
            reset_line: false,
            irq_line: false,
            fiq_line: false,
            run_mode: RunMode::Run,
            pc_changed: false,
            mid_step: false,
            host_error_logged: false,
        }
    }

    pub fn with_host(mut self, host: impl Host + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn with_thumb_bridge(mut self, bridge: impl ThumbBridge + 'static) -> Self {
        self.thumb = Box::new(bridge);
        self
    }

    pub fn attach_debugger(&mut self, debugger: Box<dyn Debugger>) {
        self.debugger = Some(debugger);
    }

    pub fn detach_debugger(&mut self) -> Option<Box<dyn Debugger>> {
        self.run_mode = RunMode::Run;
        self.debugger.take()
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    /// Architectural reset: Supervisor mode, interrupts masked, ARM state, PC 0.
    pub fn reset(&mut self) {
        self.regs = RegisterFile::new();
        self.pipeline = Pipeline::new();
        self.counters = CycleCounters::default();
        self.aborted = None;
        self.abort_signal = false;
        self.pc_changed = false;
        self.mid_step = false;
        self.run_mode = RunMode::Run;
        tracing::debug!("Core reset, CPSR={:#010x}", self.regs.cpsr());
    }

    /// Redirect execution; the pipeline is refilled before the next instruction.
    pub fn set_pc(&mut self, pc: u32) {
        self.regs.regs[15] = pc;
        self.pipeline.pc = pc;
        self.pipeline.flush();
    }

    /// Address of the next instruction to execute. Inside the debugger hook that
    /// is the instruction the pipeline has just fetched.
    pub fn pc(&self) -> u32 {
        if self.pipeline.next.contains(FetchFlags::PRIME) {
            self.regs.regs[15]
        } else if self.mid_step {
            self.pipeline.pc
        } else {
            self.pipeline.pc.wrapping_add(self.isize())
        }
    }

    pub fn load_image(&mut self, image: &ProgramImage) -> SimResult<()> {
        for segment in &image.segments {
            for (i, byte) in segment.data.iter().enumerate() {
                let addr = segment.start_addr.wrapping_add(i as u32);
                self.mem.debug_write(addr, *byte).map_err(|e| {
                    SimulationError::ImageLoad(format!(
                        "segment at {:#010x}: {}",
                        segment.start_addr, e
                    ))
                })?;
            }
        }
        self.set_pc(image.entry_point);
        Ok(())
    }

    pub fn set_irq(&mut self, level: bool) {
        self.irq_line = level;
    }

    pub fn set_fiq(&mut self, level: bool) {
        self.fiq_line = level;
    }

    pub fn set_reset(&mut self, level: bool) {
        self.reset_line = level;
    }

    #[inline]
    pub(crate) fn isize(&self) -> u32 {
        if self.regs.t {
            2
        } else {
            4
        }
    }

    /// Enter the exception `vector`: bank switch, SPSR save, LR, vector fetch.
    pub fn take_exception(&mut self, vector: Vector) {
        let thumb = self.regs.t;
        let old_cpsr = self.regs.cpsr();
        let target = vector.target_mode().bits();
        let pipelined_pc = self.pipeline.pc.wrapping_add(2 * self.isize());
        let lr = (pipelined_pc as i64 - vector.link_offset(thumb)) as u32;

        self.regs.set_cpsr(exception::entry_cpsr(old_cpsr, vector));
        self.regs.set_spsr(target, old_cpsr);
        self.regs.regs[14] = lr;
        self.regs.regs[15] = vector.offset().wrapping_add(self.mem.vector_base());
        self.pipeline.flush();

        tracing::debug!(
            "Exception {:?} at pc={:#010x}, lr={:#010x}, cpsr={:#010x}",
            vector,
            self.pipeline.pc,
            lr,
            old_cpsr
        );
        for observer in &self.observers {
            observer.on_exception(vector);
        }
    }

    // Memory wrappers. A fault reports itself to the port and defers a data
    // abort to the end of the instruction.

    #[inline]
    fn count(&mut self, cycle: Cycle) {
        match cycle {
            Cycle::Seq => self.counters.num_scycles += 1,
            Cycle::NonSeq => self.counters.num_ncycles += 1,
        }
    }

    fn data_abort(&mut self, fault: Fault, addr: u32) {
        tracing::debug!("Data abort ({:?}) at {:#010x}", fault, addr);
        self.mem.report_fault(fault, addr);
        self.abort_signal = true;
        if self.aborted.is_none() {
            self.aborted = Some(Vector::DataAbort);
        }
    }

    pub(crate) fn load_word(&mut self, addr: u32, cycle: Cycle) -> Option<u32> {
        self.count(cycle);
        match self.mem.read_word(addr) {
            Ok(v) => Some(v),
            Err(fault) => {
                self.data_abort(fault, addr);
                None
            }
        }
    }

    pub(crate) fn load_halfword(&mut self, addr: u32) -> Option<u32> {
        self.count(Cycle::NonSeq);
        match self.mem.read_halfword(addr) {
            Ok(v) => Some(v),
            Err(fault) => {
                self.data_abort(fault, addr);
                None
            }
        }
    }

    pub(crate) fn load_byte(&mut self, addr: u32) -> Option<u32> {
        self.count(Cycle::NonSeq);
        match self.mem.read_byte(addr) {
            Ok(v) => Some(v),
            Err(fault) => {
                self.data_abort(fault, addr);
                None
            }
        }
    }

    pub(crate) fn store_word(&mut self, addr: u32, value: u32, cycle: Cycle) -> bool {
        self.count(cycle);
        match self.mem.write_word(addr, value) {
            Ok(()) => true,
            Err(fault) => {
                self.data_abort(fault, addr);
                false
            }
        }
    }

    pub(crate) fn store_halfword(&mut self, addr: u32, value: u32) -> bool {
        self.count(Cycle::NonSeq);
        match self.mem.write_halfword(addr, value) {
            Ok(()) => true,
            Err(fault) => {
                self.data_abort(fault, addr);
                false
            }
        }
    }

    pub(crate) fn store_byte(&mut self, addr: u32, value: u32) -> bool {
        self.count(Cycle::NonSeq);
        match self.mem.write_byte(addr, value) {
            Ok(()) => true,
            Err(fault) => {
                self.data_abort(fault, addr);
                false
            }
        }
    }

    /// Instruction fetch. A faulting fetch yields the abort word, which raises the
    /// prefetch abort only if it reaches execution.
    fn fetch(&mut self, addr: u32, cycle: Cycle) -> u32 {
        self.count(cycle);
        if self.regs.t {
            return self.fetch_thumb(addr);
        }
        match self.mem.fetch_instruction(addr) {
            Ok(word) => word,
            Err(fault) => {
                tracing::debug!("Prefetch fault ({:?}) at {:#010x}", fault, addr);
                ARM_ABORT_WORD
            }
        }
    }

    /// Thumb fetch: the addressed halfword in the low half, the following one in
    /// the high half (zero if that one is not fetchable).
    fn fetch_thumb(&mut self, addr: u32) -> u32 {
        let lane = |word: u32, a: u32, be: bool| -> u32 {
            let shift = ((a & 2) ^ if be { 2 } else { 0 }) * 8;
            (word >> shift) & 0xFFFF
        };
        let be = self.config.big_endian;
        let word = match self.mem.fetch_instruction(addr & !3) {
            Ok(w) => w,
            Err(fault) => {
                tracing::debug!("Prefetch fault ({:?}) at {:#010x}", fault, addr);
                return THUMB_ABORT_WORD;
            }
        };
        let low = lane(word, addr, be);
        let next = addr.wrapping_add(2);
        let high = if next & 2 != 0 {
            lane(word, next, be)
        } else {
            self.mem
                .fetch_instruction(next)
                .map(|w| lane(w, next, be))
                .unwrap_or(0)
        };
        low | (high << 16)
    }

    // R15 writes

    /// Plain PC write; keeps the current instruction set.
    pub(crate) fn write_r15(&mut self, src: u32) {
        let mask = if self.regs.t { !1 } else { !3 };
        self.regs.regs[15] = src & mask;
        self.pipeline.flush();
    }

    /// PC write that also restores CPSR from the SPSR of the active bank.
    pub(crate) fn write_sr15(&mut self, src: u32) {
        if self.regs.current_bank().has_spsr() {
            let spsr = self.regs.current_spsr();
            self.regs.set_cpsr(spsr);
        }
        self.write_r15(src);
    }

    /// Interworking PC write: bit 0 selects Thumb state.
    pub(crate) fn write_r15_branch(&mut self, src: u32) {
        self.regs.t = src & 1 != 0;
        self.write_r15(src);
    }

    /// Destination write of an ALU result.
    #[inline]
    pub(crate) fn write_dest(&mut self, rd: usize, value: u32) {
        if rd == 15 {
            self.write_r15(value);
        } else {
            self.regs.regs[rd] = value;
        }
    }

    /// Flag-setting destination write; to R15 it returns from an exception.
    #[inline]
    pub(crate) fn write_sdest(&mut self, rd: usize, value: u32) {
        if rd == 15 {
            self.write_sr15(value);
        } else {
            self.regs.regs[rd] = value;
            self.regs.neg_zero(value);
        }
    }

    /// Load destination write; interworks on v5.
    #[inline]
    pub(crate) fn write_dest_load(&mut self, rd: usize, value: u32) {
        if rd != 15 {
            self.regs.regs[rd] = value;
        } else if self.config.is_v5 {
            self.write_r15_branch(value);
        } else {
            self.write_r15(value);
        }
    }

    // Pipeline bookkeeping requested by the executing instruction.

    /// R15 moves on now (register-specified shifts read PC+12).
    #[inline]
    pub(crate) fn inc_pc(&mut self) {
        self.regs.regs[15] = self.regs.regs[15].wrapping_add(self.isize());
        self.pipeline.next |= FetchFlags::PC_INCED;
    }

    /// The instruction used the bus; the next fetch stays sequential.
    #[inline]
    pub(crate) fn bus_used_inc_pc_s(&mut self) {
        if !self.config.is_v4 {
            self.inc_pc();
        }
    }

    /// The instruction used the bus; the next fetch is non-sequential.
    #[inline]
    pub(crate) fn bus_used_inc_pc_n(&mut self) {
        if !self.config.is_v4 {
            self.inc_pc();
        }
        self.pipeline.next |= FetchFlags::NONSEQ;
    }

    #[inline]
    pub(crate) fn icycles(&mut self, n: u32) {
        self.counters.num_icycles += n as u64;
    }

    #[inline]
    pub(crate) fn ccycles(&mut self, n: u32) {
        self.counters.num_ccycles += n as u64;
    }

    pub(crate) fn undefined(&mut self, instr: u32) {
        tracing::debug!(
            "Undefined instruction {:#010x} at {:#010x}",
            instr,
            self.pipeline.pc
        );
        self.take_exception(Vector::Undefined);
    }

    fn report_host_error(&mut self, err: SimulationError) {
        if !self.host_error_logged {
            tracing::error!("Host hook failed: {}", err);
            self.host_error_logged = true;
        }
    }
}

/// Split borrow of the core handed to the Thumb bridge.
struct ThumbContext<'a> {
    regs: &'a mut RegisterFile,
    pipeline: &'a mut Pipeline,
}

impl ThumbState for ThumbContext<'_> {
    fn reg(&self, idx: usize) -> u32 {
        self.regs.regs[idx]
    }

    fn set_reg(&mut self, idx: usize, value: u32) {
        self.regs.regs[idx] = value;
    }

    fn condition_passed(&self, cond: u32) -> bool {
        self.regs.condition_passed(cond)
    }

    fn branch(&mut self, dest: u32) {
        let mask = if self.regs.t { !1 } else { !3 };
        self.regs.regs[15] = dest & mask;
        self.pipeline.flush();
    }

    fn exit_thumb(&mut self) {
        self.regs.t = false;
    }
}

impl<M: MemoryPort> DebugTarget for ArmCore<M> {
    fn read_registers(&self) -> CoreRegisters {
        let mut r = [0u32; 15];
        r.copy_from_slice(&self.regs.regs[..15]);
        CoreRegisters {
            r,
            pc: self.pc(),
            cpsr: self.regs.cpsr(),
        }
    }

    fn write_registers(&mut self, regs: &CoreRegisters) {
        self.regs.set_cpsr(regs.cpsr);
        self.regs.regs[..15].copy_from_slice(&regs.r);
        DebugTarget::set_pc(self, regs.pc);
    }

    fn set_pc(&mut self, pc: u32) {
        if pc != self.pc() {
            ArmCore::set_pc(self, pc);
            self.pc_changed = true;
        }
    }

    fn set_single_step(&mut self, enabled: bool) {
        self.run_mode = if enabled { RunMode::Once } else { RunMode::Run };
    }

    fn insert_breakpoint(&mut self, addr: u32) -> Result<usize, BreakpointError> {
        self.breakpoints.insert(addr)
    }

    fn remove_breakpoint(&mut self, addr: u32) {
        self.breakpoints.remove(addr);
    }

    fn read_memory(&mut self, addr: u32, buf: &mut [u8]) -> SimResult<()> {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.mem.debug_read(addr.wrapping_add(i as u32))?;
        }
        Ok(())
    }

    fn write_memory(&mut self, addr: u32, data: &[u8]) -> SimResult<()> {
        for (i, b) in data.iter().enumerate() {
            self.mem.debug_write(addr.wrapping_add(i as u32), *b)?;
        }
        Ok(())
    }
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! ARM v4/v5/v5e instruction-set interpreter.
//!
//! The core executes against a [`memory::MemoryPort`] and reports to a
//! [`host::Host`]; a [`debug::Debugger`] may be attached to stop and inspect it.

pub mod config;
pub mod cpu;
pub mod debug;
pub mod decoder;
pub mod host;
pub mod memory;
pub mod snapshot;


pub use config::CoreConfig;
pub use cpu::{ArmCore, CycleCounters, Mode, Vector};
pub use memory::{FlatMemory, MemoryPort, ProgramImage};

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u32),
    #[error("Image load failed: {0}")]
    ImageLoad(String),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self) {}
    fn on_step_start(&self, _pc: u32, _opcode: u32) {}
    fn on_step_end(&self, _cycles: u32) {}
    fn on_exception(&self, _vector: Vector) {}
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use labwired_iss_core::{SimulationObserver, Vector};
use labwired_iss_loader::SymbolTable;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Logs every executed instruction, annotated with the enclosing symbol when
/// the image carried a symbol table.
#[derive(Debug, Default)]
pub struct TraceObserver {
    symbols: SymbolTable,
    instructions: AtomicU64,
    exceptions: AtomicU64,
}

impl TraceObserver {
    pub fn new(symbols: SymbolTable) -> Self {
        Self {
            symbols,
            ..Self::default()
        }
    }

    pub fn instructions(&self) -> u64 {
        self.instructions.load(Ordering::Relaxed)
    }

    pub fn exceptions(&self) -> u64 {
        self.exceptions.load(Ordering::Relaxed)
    }

    fn location(&self, pc: u32) -> String {
        match self.symbols.lookup(pc) {
            Some((name, 0)) => format!(" <{}>", name),
            Some((name, offset)) => format!(" <{}+{:#x}>", name, offset),
            None => String::new(),
        }
    }
}

impl SimulationObserver for TraceObserver {
    fn on_simulation_start(&self) {
        debug!("Trace started ({} symbols)", self.symbols.len());
    }

    fn on_simulation_stop(&self) {
        debug!(
            "Trace stopped after {} instructions, {} exceptions",
            self.instructions(),
            self.exceptions()
        );
    }

    fn on_step_start(&self, pc: u32, opcode: u32) {
        self.instructions.fetch_add(1, Ordering::Relaxed);
        debug!("{:#010x}{}: {:08x}", pc, self.location(pc), opcode);
    }

    fn on_exception(&self, vector: Vector) {
        self.exceptions.fetch_add(1, Ordering::Relaxed);
        debug!("Exception: {:?}", vector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labwired_iss_core::{ArmCore, CoreConfig, FlatMemory, ProgramImage};
    use std::sync::Arc;

    #[test]
    fn test_observer_counts_steps_and_exceptions() {
        let mut mem = FlatMemory::new(0x4106_9260).with_region(0, 0x1000);
        // Vectors spin in place; 0x100: MOV r0, #1; UDF
        mem.load_image(&ProgramImage::from_words(0, &[0xEAFF_FFFE; 8]))
            .unwrap();
        mem.load_image(&ProgramImage::from_words(0x100, &[0xE3A0_0001, 0xE7F0_00F0]))
            .unwrap();
        let mut core = ArmCore::new(CoreConfig::arm926ejs(), mem);
        core.set_pc(0x100);

        let trace = Arc::new(TraceObserver::default());
        core.add_observer(trace.clone());
        core.run(6);

        assert!(trace.instructions() >= 3);
        assert_eq!(trace.exceptions(), 1);
        assert_eq!(core.regs.regs[0], 1);
    }

    #[test]
    fn test_location_without_symbols_is_empty() {
        assert_eq!(TraceObserver::default().location(0x8000), "");
    }
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use bitflags::bitflags;

bitflags! {
    /// Requests accumulated by the executing instruction about the next fetch.
    /// They OR together; any request containing `PRIME` refills the pipeline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FetchFlags: u8 {
        const NONSEQ = 1 << 0;
        const PC_INCED = 1 << 1;
        const PRIME = 1 << 2;
    }
}

/// Kind of the next instruction fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Sequential,
    NonSequential,
    PcIncedSequential,
    PcIncedNonSequential,
    Prime,
}

impl FetchFlags {
    pub fn kind(self) -> FetchKind {
        if self.contains(FetchFlags::PRIME) {
            return FetchKind::Prime;
        }
        match (
            self.contains(FetchFlags::PC_INCED),
            self.contains(FetchFlags::NONSEQ),
        ) {
            (false, false) => FetchKind::Sequential,
            (false, true) => FetchKind::NonSequential,
            (true, false) => FetchKind::PcIncedSequential,
            (true, true) => FetchKind::PcIncedNonSequential,
        }
    }
}

/// The three-deep prefetch buffer.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub next: FetchFlags,
    /// Address of the instruction being executed.
    pub pc: u32,
    pub instr: u32,
    pub decoded: u32,
    pub loaded: u32,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            next: FetchFlags::PRIME,
            ..Default::default()
        }
    }

    pub fn flush(&mut self) {
        self.next |= FetchFlags::PRIME;
    }

    /// Shift `instr <- decoded <- loaded` and take `fetched` as the new `loaded`.
    pub fn shift(&mut self, fetched: u32) -> u32 {
        self.instr = self.decoded;
        self.decoded = self.loaded;
        self.loaded = fetched;
        self.instr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_combinations() {
        assert_eq!(FetchFlags::empty().kind(), FetchKind::Sequential);
        assert_eq!(FetchFlags::NONSEQ.kind(), FetchKind::NonSequential);
        assert_eq!(FetchFlags::PC_INCED.kind(), FetchKind::PcIncedSequential);
        assert_eq!(
            (FetchFlags::PC_INCED | FetchFlags::NONSEQ).kind(),
            FetchKind::PcIncedNonSequential
        );
        assert_eq!(
            (FetchFlags::PRIME | FetchFlags::PC_INCED).kind(),
            FetchKind::Prime
        );
    }

    #[test]
    fn test_shift_moves_stages() {
        let mut p = Pipeline::new();
        p.shift(1);
        p.shift(2);
        assert_eq!(p.shift(3), 1);
        assert_eq!((p.decoded, p.loaded), (2, 3));
    }
}

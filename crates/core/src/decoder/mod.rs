// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod arm;
pub mod thumb;

pub use thumb::ThumbTranslator;

/// Result of handing a 16-bit instruction to a [`ThumbBridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbOutcome {
    /// Take the undefined-instruction exception.
    Undefined,
    /// The bridge executed the instruction itself (branches, BL halves).
    AlreadyHandled,
    /// Execute this ARM encoding in its place.
    Decoded(u32),
}

/// The slice of core state a Thumb bridge may touch.
pub trait ThumbState {
    fn reg(&self, idx: usize) -> u32;
    fn set_reg(&mut self, idx: usize, value: u32);
    fn condition_passed(&self, cond: u32) -> bool;
    /// Continue execution at `dest` (refills the pipeline).
    fn branch(&mut self, dest: u32);
    /// Leave Thumb state; takes effect with the next branch.
    fn exit_thumb(&mut self);
}

/// Turns Thumb instructions into something the ARM executor understands.
pub trait ThumbBridge: Send {
    /// `pc` is the address of `tinstr`; `lookahead` is the halfword after it.
    fn decode(
        &mut self,
        cpu: &mut dyn ThumbState,
        pc: u32,
        tinstr: u16,
        lookahead: u16,
    ) -> ThumbOutcome;
}

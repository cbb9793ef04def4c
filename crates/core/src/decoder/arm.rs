// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Field extraction for 32-bit ARM encodings.

/// Bits `lo..=hi` of `instr`, shifted down.
#[inline(always)]
pub const fn bits(instr: u32, lo: u32, hi: u32) -> u32 {
    (instr >> lo) & ((1u32 << (hi - lo) << 1).wrapping_sub(1))
}

#[inline(always)]
pub const fn bit(instr: u32, n: u32) -> bool {
    (instr >> n) & 1 != 0
}

/// Destination register, bits 15:12.
#[inline(always)]
pub const fn rd(instr: u32) -> usize {
    ((instr >> 12) & 0xF) as usize
}

/// First operand / base register, bits 19:16.
#[inline(always)]
pub const fn rn(instr: u32) -> usize {
    ((instr >> 16) & 0xF) as usize
}

/// Second operand register, bits 3:0.
#[inline(always)]
pub const fn rm(instr: u32) -> usize {
    (instr & 0xF) as usize
}

/// Shift / multiplier register, bits 11:8.
#[inline(always)]
pub const fn rs(instr: u32) -> usize {
    ((instr >> 8) & 0xF) as usize
}

/// Primary dispatch index, bits 27:20.
#[inline(always)]
pub const fn primary(instr: u32) -> u32 {
    (instr >> 20) & 0xFF
}

#[inline(always)]
pub const fn cond(instr: u32) -> u32 {
    instr >> 28
}

/// Coprocessor number, bits 11:8.
#[inline(always)]
pub const fn cp_num(instr: u32) -> u32 {
    (instr >> 8) & 0xF
}

/// Sign-extended 24-bit branch offset, in bytes.
#[inline(always)]
pub const fn branch_offset(instr: u32) -> u32 {
    (((instr << 8) as i32) >> 6) as u32
}

/// Split 8-bit immediate of the halfword and doubleword transfers.
#[inline(always)]
pub const fn split_imm8(instr: u32) -> u32 {
    (instr & 0xF) | ((instr >> 4) & 0xF0)
}

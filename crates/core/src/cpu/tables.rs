// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Decode lookup tables, built at compile time.

/// Data-processing immediates: `imm8` rotated right by twice the rotate field.
pub static IMMED_TABLE: [u32; 4096] = build_immed_table();

/// Bytes transferred for each 8-bit slice of an LDM/STM register list.
pub static BIT_LIST: [u32; 256] = build_bit_list();

/// Internal multiply cycles indexed by the position of the highest set bit of Rs.
pub static MULT_TABLE: [u32; 32] = build_mult_table();

const fn build_immed_table() -> [u32; 4096] {
    let mut table = [0u32; 4096];
    let mut i = 0;
    while i < 4096 {
        let imm = (i & 0xFF) as u32;
        let rot = ((i >> 8) * 2) as u32;
        table[i] = imm.rotate_right(rot);
        i += 1;
    }
    table
}

const fn build_bit_list() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u32).count_ones() * 4;
        i += 1;
    }
    table
}

const fn build_mult_table() -> [u32; 32] {
    let mut table = [0u32; 32];
    let mut i = 0;
    while i < 32 {
        let cycles = (i as u32 + 1) / 2 + 1;
        table[i] = if cycles > 16 { 16 } else { cycles };
        i += 1;
    }
    table
}

/// Bytes covered by a 16-bit register list.
#[inline]
pub fn lsm_num_regs(list: u32) -> u32 {
    BIT_LIST[(list & 0xFF) as usize] + BIT_LIST[((list >> 8) & 0xFF) as usize]
}

/// Internal cycles taken by MUL/MLA for the given multiplier value.
#[inline]
pub fn mult_cycles(rs: u32) -> u32 {
    if rs == 0 {
        return 1;
    }
    MULT_TABLE[(31 - rs.leading_zeros()) as usize]
}

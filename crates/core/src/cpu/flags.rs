// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Carry and overflow predicates shared by the ALU instructions.

use super::registers::RegisterFile;

#[inline(always)]
fn neg(x: u32) -> bool {
    x >> 31 != 0
}

#[inline(always)]
fn pos(x: u32) -> bool {
    x >> 31 == 0
}

#[inline]
pub fn add_overflow(a: u32, b: u32, result: u32) -> bool {
    (neg(a) && neg(b) && pos(result)) || (pos(a) && pos(b) && neg(result))
}

#[inline]
pub fn sub_overflow(a: u32, b: u32, result: u32) -> bool {
    (neg(a) && pos(b) && pos(result)) || (pos(a) && neg(b) && neg(result))
}

#[inline]
pub fn add_carry(a: u32, b: u32, result: u32) -> bool {
    (neg(a) && neg(b)) || (neg(a) && pos(result)) || (neg(b) && pos(result))
}

/// Carry out of `a - b`, i.e. "no borrow".
#[inline]
pub fn sub_carry(a: u32, b: u32, result: u32) -> bool {
    (neg(a) && pos(b)) || (neg(a) && pos(result)) || (pos(b) && pos(result))
}

/// 32-bit add that also reports the carry out.
#[inline]
pub fn add32(a: u32, b: u32) -> (u32, bool) {
    a.overflowing_add(b)
}

impl RegisterFile {
    #[inline]
    pub fn neg_zero(&mut self, result: u32) {
        self.n = neg(result);
        self.z = result == 0;
    }

    /// Flags of `a + b` (plus an optional carry in, already folded into `result`).
    /// Operands below 2^30 cannot set N, C or V, so the predicates are skipped.
    pub fn set_add_flags(&mut self, a: u32, b: u32, result: u32) {
        self.z = result == 0;
        if (a | b) >> 30 == 0 {
            self.n = false;
            self.c = false;
            self.v = false;
            return;
        }
        self.n = neg(result);
        self.c = add_carry(a, b, result);
        self.v = add_overflow(a, b, result);
    }

    /// Flags of `a - b` (minus an optional borrow). With both operands positive
    /// and `a < b` the subtraction always borrows and never overflows.
    pub fn set_sub_flags(&mut self, a: u32, b: u32, result: u32) {
        self.neg_zero(result);
        if a >= b || (a | b) >> 31 != 0 {
            self.c = sub_carry(a, b, result);
            self.v = sub_overflow(a, b, result);
        } else {
            self.c = false;
            self.v = false;
        }
    }

    /// Evaluate a 4-bit condition field against the cached flags.
    /// `0xF` is handled by the caller (it is an extension space on v5).
    #[inline(always)]
    pub fn condition_passed(&self, cond: u32) -> bool {
        let (n, z, c, v) = (self.n, self.z, self.c, self.v);
        match cond & 0xF {
            0x0 => z,              // EQ
            0x1 => !z,             // NE
            0x2 => c,              // CS/HS
            0x3 => !c,             // CC/LO
            0x4 => n,              // MI
            0x5 => !n,             // PL
            0x6 => v,              // VS
            0x7 => !v,             // VC
            0x8 => c && !z,        // HI
            0x9 => !c || z,        // LS
            0xA => n == v,         // GE
            0xB => n != v,         // LT
            0xC => !z && (n == v), // GT
            0xD => z || (n != v),  // LE
            0xE => true,           // AL
            _ => false,            // NV
        }
    }
}

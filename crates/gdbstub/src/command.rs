// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Parsing of RSP command payloads.

use crate::packet::from_hex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    SoftwareBreakpoint,
    HardwareBreakpoint,
    WriteWatchpoint,
    Other(u32),
}

impl From<u32> for PointKind {
    fn from(value: u32) -> Self {
        match value {
            0 => PointKind::SoftwareBreakpoint,
            1 => PointKind::HardwareBreakpoint,
            2 => PointKind::WriteWatchpoint,
            other => PointKind::Other(other),
        }
    }
}

/// Reply to a file-I/O request: `F<retcode>[,<errno>][,C]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallReply {
    pub retval: i64,
    pub errno: u32,
    /// The user interrupted the call; the target stops after completion.
    pub ctrl_c: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    QueryHaltReason,
    Continue(Option<u32>),
    Step(Option<u32>),
    ReadRegisters,
    WriteRegisters(Vec<u8>),
    ReadMemory { addr: u32, len: usize },
    WriteMemory { addr: u32, data: Vec<u8> },
    InsertPoint { kind: PointKind, addr: u32, len: u32 },
    RemovePoint { kind: PointKind, addr: u32, len: u32 },
    SyscallReply(SyscallReply),
    Detach,
    /// Anything this engine does not implement.
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("malformed '{0}' packet")]
pub struct MalformedPacket(pub char);

/// Cursor over a payload with the number parsers the commands share.
struct Fields<'a> {
    rest: &'a [u8],
}

impl<'a> Fields<'a> {
    fn new(rest: &'a [u8]) -> Self {
        Self { rest }
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    /// Leading hex digits; `None` when there are none.
    fn hex(&mut self) -> Option<u64> {
        let digits = self
            .rest
            .iter()
            .take_while(|b| b.is_ascii_hexdigit())
            .count();
        if digits == 0 || digits > 16 {
            return None;
        }
        let text = std::str::from_utf8(&self.rest[..digits]).ok()?;
        self.rest = &self.rest[digits..];
        u64::from_str_radix(text, 16).ok()
    }

    fn hex_u32(&mut self) -> Option<u32> {
        self.hex().and_then(|v| u32::try_from(v).ok())
    }

    fn signed_hex(&mut self) -> Option<i64> {
        if self.eat(b'-') {
            self.hex().map(|v| (v as i64).wrapping_neg())
        } else {
            self.hex().map(|v| v as i64)
        }
    }

    fn eat(&mut self, expected: u8) -> bool {
        match self.rest.first() {
            Some(&b) if b == expected => {
                self.rest = &self.rest[1..];
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, expected: u8) -> Option<()> {
        self.eat(expected).then_some(())
    }

    fn remainder(&self) -> &'a [u8] {
        self.rest
    }
}

impl Command {
    pub fn parse(payload: &[u8]) -> Result<Command, MalformedPacket> {
        let Some((&head, body)) = payload.split_first() else {
            return Ok(Command::Unsupported);
        };
        let mut f = Fields::new(body);
        let cmd = match head {
            b'?' => Some(Command::QueryHaltReason),
            b'c' => f.optional_addr().map(Command::Continue),
            b's' => f.optional_addr().map(Command::Step),
            b'g' => Some(Command::ReadRegisters),
            b'G' => from_hex(body).map(Command::WriteRegisters),
            b'm' => f.read_memory(),
            b'M' => f.write_memory(),
            b'Z' => f.point().map(|(kind, addr, len)| Command::InsertPoint { kind, addr, len }),
            b'z' => f.point().map(|(kind, addr, len)| Command::RemovePoint { kind, addr, len }),
            b'F' => f.syscall_reply().map(Command::SyscallReply),
            b'D' => Some(Command::Detach),
            _ => Some(Command::Unsupported),
        };
        cmd.ok_or(MalformedPacket(head as char))
    }
}

impl Fields<'_> {
    fn optional_addr(&mut self) -> Option<Option<u32>> {
        if self.is_empty() {
            Some(None)
        } else {
            self.hex_u32().map(Some)
        }
    }

    fn read_memory(&mut self) -> Option<Command> {
        let addr = self.hex_u32()?;
        self.expect(b',')?;
        let len = usize::try_from(self.hex()?).ok()?;
        Some(Command::ReadMemory { addr, len })
    }

    fn write_memory(&mut self) -> Option<Command> {
        let addr = self.hex_u32()?;
        self.expect(b',')?;
        let len = usize::try_from(self.hex()?).ok()?;
        self.expect(b':')?;
        let data = from_hex(self.remainder())?;
        (data.len() == len).then_some(Command::WriteMemory { addr, data })
    }

    fn point(&mut self) -> Option<(PointKind, u32, u32)> {
        let kind = PointKind::from(self.hex_u32()?);
        self.expect(b',')?;
        let addr = self.hex_u32()?;
        self.expect(b',')?;
        let len = self.hex_u32()?;
        Some((kind, addr, len))
    }

    fn syscall_reply(&mut self) -> Option<SyscallReply> {
        let retval = self.signed_hex()?;
        let errno = if self.eat(b',') && !self.remainder().starts_with(b"C") {
            self.hex_u32()?
        } else {
            0
        };
        self.eat(b',');
        let ctrl_c = self.remainder().first() == Some(&b'C');
        Some(SyscallReply {
            retval,
            errno,
            ctrl_c,
        })
    }
}

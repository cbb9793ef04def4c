// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! One attached client: the blocking command loop and packet I/O.

use crate::command::{Command, PointKind, SyscallReply};
use crate::packet::{self, Frame, PacketReader, INTERRUPT};
use crate::syscall::{self, SyscallArg};
use crate::{registers, RspError, RspResult};
use gdbstub::common::Signal;
use labwired_iss_core::debug::{DebugTarget, SIGTRAP};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpStream;

/// Largest `m` request served; the hex reply must fit one packet.
pub const MAX_MEMORY_READ: usize = (packet::PACKET_BUFFER_SIZE - 1) / 2;

/// Byte stream to a debugger client.
pub trait Connection: Send {
    /// Blocking read. `Ok(0)` means the peer closed the connection.
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Non-blocking read. `Ok(None)` when nothing is pending.
    fn try_read_bytes(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn try_read_bytes(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        self.set_nonblocking(true)?;
        let result = match self.read(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        };
        self.set_nonblocking(false)?;
        result
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data)?;
        self.flush()
    }
}

/// Completion callback for a file-I/O request.
pub type SyscallCallback = Box<dyn FnMut(SyscallReply) + Send>;

/// What the command loop does after a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Serve,
    Resume,
    Detach,
}

pub struct RspSession<C: Connection> {
    conn: C,
    reader: PacketReader,
    /// Bytes read from the connection but not yet consumed.
    pending: VecDeque<u8>,
    last_signal: u8,
    syscall_callback: Option<SyscallCallback>,
}

impl<C: Connection> RspSession<C> {
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            reader: PacketReader::new(),
            pending: VecDeque::new(),
            last_signal: SIGTRAP,
            syscall_callback: None,
        }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Frame `payload` and send it until the client acknowledges with `+`.
    pub fn put_packet(&mut self, payload: &str) -> RspResult<()> {
        let wire = packet::encode(payload.as_bytes());
        tracing::trace!("RSP reply: {}", payload);
        loop {
            self.conn.write_bytes(&wire)?;
            match self.next_byte()? {
                None => return Err(RspError::Disconnected),
                Some(b'+') => return Ok(()),
                Some(other) => tracing::debug!("RSP retransmit after {:?}", other as char),
            }
        }
    }

    /// Next input byte, blocking on the connection only when nothing is
    /// pending. `None` once the peer has closed.
    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if self.pending.is_empty() {
            let mut buf = [0u8; 256];
            let n = self.conn.read_bytes(&mut buf)?;
            self.pending.extend(&buf[..n]);
        }
        Ok(self.pending.pop_front())
    }

    /// Report `signal` (0 reports nothing) and serve commands until the client
    /// resumes the target. Single-stepping is disarmed on entry.
    pub fn handle_signal(&mut self, target: &mut dyn DebugTarget, signal: u8) -> RspResult<()> {
        target.set_single_step(false);
        if signal != 0 {
            self.last_signal = signal;
            self.put_packet(&format!("S{:02x}", signal))?;
        }
        self.serve(target)
    }

    fn serve(&mut self, target: &mut dyn DebugTarget) -> RspResult<()> {
        self.reader.reset();
        loop {
            let byte = self.next_byte()?.ok_or(RspError::Disconnected)?;
            let Some(frame) = self.reader.feed(byte) else {
                continue;
            };
            match frame {
                Frame::Corrupt => self.conn.write_bytes(b"-")?,
                Frame::Packet(payload) => {
                    self.conn.write_bytes(b"+")?;
                    match self.dispatch(target, &payload)? {
                        Flow::Serve => {}
                        Flow::Resume => return Ok(()),
                        Flow::Detach => return Err(RspError::Disconnected),
                    }
                }
            }
        }
    }

    /// Consume input up to an interrupt request; true if one was found.
    /// Bytes after the interrupt are kept for the next stop.
    pub fn check_interrupt(&mut self) -> RspResult<bool> {
        if let Some(pos) = self.pending.iter().position(|&b| b == INTERRUPT) {
            self.pending.drain(..=pos);
            return Ok(true);
        }
        let mut buf = [0u8; 256];
        match self.conn.try_read_bytes(&mut buf)? {
            None => Ok(false),
            Some(0) => Err(RspError::Disconnected),
            Some(n) => match buf[..n].iter().position(|&b| b == INTERRUPT) {
                Some(pos) => {
                    self.pending.extend(&buf[pos + 1..n]);
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    /// Send a file-I/O request and serve commands until the client replies
    /// and the target is resumed. `callback` receives the reply.
    pub fn syscall(
        &mut self,
        target: &mut dyn DebugTarget,
        fmt: &str,
        args: &[SyscallArg],
        callback: SyscallCallback,
    ) -> RspResult<()> {
        self.syscall_callback = Some(callback);
        let request = syscall::format_request(fmt, args);
        self.put_packet(&request)?;
        self.handle_signal(target, 0)
    }

    /// Tell the client the program exited.
    pub fn end(&mut self, code: u8) -> RspResult<()> {
        self.put_packet(&format!("W{:02x}", code))
    }

    fn dispatch(&mut self, target: &mut dyn DebugTarget, payload: &[u8]) -> RspResult<Flow> {
        tracing::trace!("RSP command: {}", String::from_utf8_lossy(payload));
        let cmd = match Command::parse(payload) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::debug!("{}", e);
                self.put_packet("E22")?;
                return Ok(Flow::Serve);
            }
        };
        match cmd {
            Command::QueryHaltReason => {
                self.put_packet(&format!("S{:02x}", self.last_signal))?;
            }
            Command::Continue(addr) => {
                if let Some(addr) = addr {
                    target.set_pc(addr);
                }
                return Ok(Flow::Resume);
            }
            Command::Step(addr) => {
                if let Some(addr) = addr {
                    target.set_pc(addr);
                }
                target.set_single_step(true);
                return Ok(Flow::Resume);
            }
            Command::ReadRegisters => {
                let block = registers::serialize(&target.read_registers());
                self.put_packet(&packet::to_hex(&block))?;
            }
            Command::WriteRegisters(bytes) => match registers::deserialize(&bytes) {
                Some(regs) => {
                    target.write_registers(&regs);
                    self.put_packet("OK")?;
                }
                None => self.put_packet("E22")?,
            },
            Command::ReadMemory { addr, len } => {
                if len > MAX_MEMORY_READ {
                    self.put_packet("E22")?;
                    return Ok(Flow::Serve);
                }
                let mut data = vec![0u8; len];
                match target.read_memory(addr, &mut data) {
                    Ok(()) => self.put_packet(&packet::to_hex(&data))?,
                    Err(e) => {
                        tracing::debug!("Debugger read at {:#010x} failed: {}", addr, e);
                        self.put_packet("E14")?;
                    }
                }
            }
            Command::WriteMemory { addr, data } => match target.write_memory(addr, &data) {
                Ok(()) => self.put_packet("OK")?,
                Err(e) => {
                    tracing::debug!("Debugger write at {:#010x} failed: {}", addr, e);
                    self.put_packet("E14")?;
                }
            },
            Command::InsertPoint { kind, addr, len } => {
                let inserted = match kind {
                    PointKind::SoftwareBreakpoint | PointKind::HardwareBreakpoint => {
                        target.insert_breakpoint(addr).map(|_| ()).map_err(|e| {
                            tracing::warn!("Breakpoint at {:#010x} rejected: {}", addr, e);
                        })
                    }
                    PointKind::WriteWatchpoint => target.insert_watchpoint(addr, len).map_err(|e| {
                        tracing::debug!("Watchpoint at {:#010x} rejected: {}", addr, e);
                    }),
                    PointKind::Other(_) => Err(()),
                };
                self.put_packet(if inserted.is_ok() { "OK" } else { "E22" })?;
            }
            Command::RemovePoint { kind, addr, len } => {
                let removed = match kind {
                    PointKind::SoftwareBreakpoint | PointKind::HardwareBreakpoint => {
                        target.remove_breakpoint(addr);
                        true
                    }
                    PointKind::WriteWatchpoint => target.remove_watchpoint(addr, len).is_ok(),
                    PointKind::Other(_) => false,
                };
                self.put_packet(if removed { "OK" } else { "E22" })?;
            }
            Command::SyscallReply(reply) => {
                match self.syscall_callback.as_mut() {
                    Some(callback) => callback(reply),
                    None => tracing::warn!("Syscall reply {:?} without a pending request", reply),
                }
                if reply.ctrl_c {
                    self.put_packet(&format!("T{:02x}", Signal::SIGINT.0))?;
                } else {
                    return Ok(Flow::Resume);
                }
            }
            Command::Detach => {
                self.put_packet("OK")?;
                return Ok(Flow::Detach);
            }
            Command::Unsupported => self.put_packet("")?,
        }
        Ok(Flow::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labwired_iss_core::debug::{BreakpointError, BreakpointSet, CoreRegisters};
    use labwired_iss_core::{SimResult, SimulationError};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted client: `input` is what the client sends.
    #[derive(Default)]
    struct ScriptedClient {
        input: VecDeque<u8>,
        output: Vec<u8>,
        /// Bytes returned per blocking read; `None` means one.
        burst: Option<usize>,
    }

    impl ScriptedClient {
        fn new(script: &[u8]) -> Self {
            Self {
                input: script.iter().copied().collect(),
                output: Vec::new(),
                burst: None,
            }
        }

        /// A client that pipelines its traffic into reads of up to `size` bytes.
        fn bursty(script: &[u8], size: usize) -> Self {
            Self {
                burst: Some(size),
                ..Self::new(script)
            }
        }

        fn sent(&self) -> String {
            String::from_utf8_lossy(&self.output).into_owned()
        }
    }

    impl Connection for ScriptedClient {
        /// One byte per call unless bursty, as a client that waits for each
        /// reply would send.
        fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self
                .burst
                .unwrap_or(1)
                .min(buf.len())
                .min(self.input.len());
            for (slot, b) in buf.iter_mut().zip(self.input.drain(..n)) {
                *slot = b;
            }
            Ok(n)
        }

        fn try_read_bytes(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
            if self.input.is_empty() {
                return Ok(None);
            }
            let n = buf.len().min(self.input.len());
            for (slot, b) in buf.iter_mut().zip(self.input.drain(..n)) {
                *slot = b;
            }
            Ok(Some(n))
        }

        fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
            self.output.extend_from_slice(data);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeTarget {
        regs: CoreRegisters,
        memory: Vec<u8>,
        breakpoints: BreakpointSet,
        single_step: bool,
    }

    impl FakeTarget {
        fn new() -> Self {
            Self {
                memory: (0..=255).collect(),
                ..Default::default()
            }
        }
    }

    impl DebugTarget for FakeTarget {
        fn read_registers(&self) -> CoreRegisters {
            self.regs
        }
        fn write_registers(&mut self, regs: &CoreRegisters) {
            self.regs = *regs;
        }
        fn set_pc(&mut self, pc: u32) {
            self.regs.pc = pc;
        }
        fn set_single_step(&mut self, enabled: bool) {
            self.single_step = enabled;
        }
        fn insert_breakpoint(&mut self, addr: u32) -> Result<usize, BreakpointError> {
            self.breakpoints.insert(addr)
        }
        fn remove_breakpoint(&mut self, addr: u32) {
            self.breakpoints.remove(addr);
        }
        fn read_memory(&mut self, addr: u32, buf: &mut [u8]) -> SimResult<()> {
            let start = addr as usize;
            let src = self
                .memory
                .get(start..start + buf.len())
                .ok_or(SimulationError::MemoryViolation(addr))?;
            buf.copy_from_slice(src);
            Ok(())
        }
        fn write_memory(&mut self, addr: u32, data: &[u8]) -> SimResult<()> {
            let start = addr as usize;
            let dst = self
                .memory
                .get_mut(start..start + data.len())
                .ok_or(SimulationError::MemoryViolation(addr))?;
            dst.copy_from_slice(data);
            Ok(())
        }
    }

    /// Client traffic: each packet followed by the ack for the engine's reply.
    fn script(packets: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for p in packets {
            out.extend(packet::encode(p.as_bytes()));
            out.push(b'+');
        }
        out
    }

    fn run(packets: &[&str], target: &mut FakeTarget) -> (RspResult<()>, String) {
        let mut session = RspSession::new(ScriptedClient::new(&script(packets)));
        let result = session.handle_signal(target, 0);
        let sent = session.connection().sent();
        (result, sent)
    }

    fn reply(payload: &str) -> String {
        format!("+{}", String::from_utf8_lossy(&packet::encode(payload.as_bytes())))
    }

    #[test]
    fn test_unsupported_gets_empty_reply() {
        let mut target = FakeTarget::new();
        let (result, sent) = run(&["qSupported", "c"], &mut target);
        assert!(result.is_ok());
        assert_eq!(sent, format!("{}+", reply("")));
    }

    #[test]
    fn test_halt_reason_defaults_to_trap() {
        let mut target = FakeTarget::new();
        let (_, sent) = run(&["?", "c"], &mut target);
        assert!(sent.starts_with(&reply("S05")));
    }

    #[test]
    fn test_step_with_address() {
        let mut target = FakeTarget::new();
        let (result, _) = run(&["s8004"], &mut target);
        assert!(result.is_ok());
        assert_eq!(target.regs.pc, 0x8004);
        assert!(target.single_step);
    }

    #[test]
    fn test_memory_read_and_errors() {
        let mut target = FakeTarget::new();
        let (_, sent) = run(&["m10,4", "m1000,4", "m0,1000", "c"], &mut target);
        let expected = [reply("10111213"), reply("E14"), reply("E22")].concat();
        assert!(sent.starts_with(&expected), "got {}", sent);
    }

    #[test]
    fn test_memory_write() {
        let mut target = FakeTarget::new();
        let (_, sent) = run(&["M20,2:beef", "c"], &mut target);
        assert!(sent.starts_with(&reply("OK")));
        assert_eq!(&target.memory[0x20..0x22], &[0xBE, 0xEF]);
    }

    #[test]
    fn test_breakpoint_capacity_reports_error() {
        let mut target = FakeTarget::new();
        let mut packets: Vec<String> = (0..17).map(|i| format!("Z0,{:x},4", i * 4)).collect();
        packets.push("z0,0,4".into());
        packets.push("c".into());
        let refs: Vec<&str> = packets.iter().map(String::as_str).collect();
        let (_, sent) = run(&refs, &mut target);
        let expected = [reply("OK").repeat(16), reply("E22"), reply("OK")].concat();
        assert!(sent.starts_with(&expected), "got {}", sent);
        assert_eq!(target.breakpoints.len(), 15);
    }

    #[test]
    fn test_watchpoint_without_hook_is_rejected() {
        let mut target = FakeTarget::new();
        let (_, sent) = run(&["Z2,100,4", "z2,100,4", "Z3,100,4", "c"], &mut target);
        let expected = [reply("E22"), reply("E22"), reply("E22")].concat();
        assert!(sent.starts_with(&expected), "got {}", sent);
    }

    #[test]
    fn test_register_round_trip() {
        let mut target = FakeTarget::new();
        target.regs.r[3] = 0xCAFE_F00D;
        target.regs.cpsr = 0xD3;
        let block = packet::to_hex(&registers::serialize(&target.regs));
        let mut edited = target.regs;
        edited.r[0] = 7;
        let write = format!("G{}", packet::to_hex(&registers::serialize(&edited)));
        let (_, sent) = run(&["g", &write, "G00", "c"], &mut target);
        let expected = [reply(&block), reply("OK"), reply("E22")].concat();
        assert!(sent.starts_with(&expected), "got {}", sent);
        assert_eq!(target.regs, edited);
    }

    #[test]
    fn test_corrupt_packet_is_nacked() {
        let mut target = FakeTarget::new();
        let mut session = RspSession::new(ScriptedClient::new(b"$g#00$c#63"));
        assert!(session.handle_signal(&mut target, 0).is_ok());
        assert_eq!(session.connection().sent(), "-+");
    }

    #[test]
    fn test_put_packet_retransmits_until_acked() {
        let mut session = RspSession::new(ScriptedClient::new(b"-x+"));
        session.put_packet("OK").unwrap();
        assert_eq!(session.connection().sent(), "$OK#9a".repeat(3));
    }

    #[test]
    fn test_signal_is_reported_and_remembered() {
        let mut target = FakeTarget::new();
        target.single_step = true;
        let mut client = script(&[]);
        client.push(b'+');
        client.extend(script(&["?", "c"]));
        let mut session = RspSession::new(ScriptedClient::new(&client));
        assert!(session.handle_signal(&mut target, 2).is_ok());
        assert!(!target.single_step);
        let sent = session.connection().sent();
        let s02 = String::from_utf8_lossy(&packet::encode(b"S02")).into_owned();
        assert!(sent.starts_with(&format!("{}{}", s02, reply("S02"))), "got {}", sent);
    }

    #[test]
    fn test_disconnect_and_detach() {
        let mut target = FakeTarget::new();
        let (result, _) = run(&["g"], &mut target);
        assert!(matches!(result, Err(RspError::Disconnected)));
        let (result, sent) = run(&["D"], &mut target);
        assert!(matches!(result, Err(RspError::Disconnected)));
        assert_eq!(sent, reply("OK"));
    }

    #[test]
    fn test_syscall_round_trip() {
        let mut target = FakeTarget::new();
        // ack the request, answer it, then resume after the ctrl-c trap
        let mut client = vec![b'+'];
        client.extend(script(&["F-1,2,C", "c"]));
        let mut session = RspSession::new(ScriptedClient::new(&client));
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        session
            .syscall(
                &mut target,
                "close,%x",
                &[SyscallArg::Word(3)],
                Box::new(move |r| *sink.lock().unwrap() = Some(r)),
            )
            .unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            Some(SyscallReply {
                retval: -1,
                errno: 2,
                ctrl_c: true
            })
        );
        let sent = session.connection().sent();
        let request = String::from_utf8_lossy(&packet::encode(b"Fclose,00000003")).into_owned();
        assert_eq!(sent, format!("{}{}+", request, reply("T02")));
    }

    #[test]
    fn test_interrupt_check() {
        let mut session = RspSession::new(ScriptedClient::new(&[INTERRUPT]));
        assert!(session.check_interrupt().unwrap());
        assert!(!session.check_interrupt().unwrap());
    }

    #[test]
    fn test_interrupt_in_same_read_as_continue() {
        let mut target = FakeTarget::new();
        let mut client = packet::encode(b"c");
        client.push(INTERRUPT);
        let mut session = RspSession::new(ScriptedClient::bursty(&client, 256));
        assert!(session.handle_signal(&mut target, 0).is_ok());
        assert_eq!(session.connection().sent(), "+");
        assert!(session.check_interrupt().unwrap());
        assert!(!session.check_interrupt().unwrap());
    }

    #[test]
    fn test_pipelined_packets_survive_resume() {
        let mut target = FakeTarget::new();
        target.regs.pc = 0x1234;
        // continue, then an interrupt, then a register read queued behind it
        let mut client = packet::encode(b"c");
        client.push(INTERRUPT);
        client.extend(script(&["g", "c"]));
        let mut session = RspSession::new(ScriptedClient::bursty(&client, 256));

        assert!(session.handle_signal(&mut target, 0).is_ok());
        assert!(session.check_interrupt().unwrap());
        assert!(session.handle_signal(&mut target, 0).is_ok());

        let sent = session.connection().sent();
        let block = packet::to_hex(&registers::serialize(&target.regs));
        let regs = String::from_utf8_lossy(&packet::encode(block.as_bytes())).into_owned();
        assert_eq!(sent, format!("++{}+", regs));
    }
}

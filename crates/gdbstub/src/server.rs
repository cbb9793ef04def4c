// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::session::{RspSession, SyscallCallback};
use crate::syscall::SyscallArg;
use crate::{RspError, RspResult};
use labwired_iss_core::debug::{DebugTarget, Debugger};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};

/// Default port GDB clients connect to.
pub const DEFAULT_PORT: u16 = 12345;

/// TCP front end: accepts one client at a time without stalling the core.
pub struct RspServer {
    listener: TcpListener,
    session: Option<RspSession<TcpStream>>,
    wait_for_attach: bool,
}

impl RspServer {
    /// Listen on `0.0.0.0:port`. With `wait_for_attach` the first
    /// [`Debugger::check_remote`] blocks until a client connects.
    pub fn bind(port: u16, wait_for_attach: bool) -> RspResult<Self> {
        Self::bind_addr(SocketAddr::from(([0, 0, 0, 0], port)), wait_for_attach)
    }

    pub fn bind_addr(addr: SocketAddr, wait_for_attach: bool) -> RspResult<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        tracing::info!("GDB server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            session: None,
            wait_for_attach,
        })
    }

    pub fn local_addr(&self) -> RspResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn is_attached(&self) -> bool {
        self.session.is_some()
    }

    fn accept(&mut self) -> RspResult<Option<TcpStream>> {
        let block = std::mem::take(&mut self.wait_for_attach);
        if block {
            tracing::info!(
                "GDB server waiting for connection on {}",
                self.listener.local_addr()?
            );
            self.listener.set_nonblocking(false)?;
        }
        let accepted = self.listener.accept();
        if block {
            self.listener.set_nonblocking(true)?;
        }
        match accepted {
            Ok((stream, peer)) => {
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                tracing::info!("GDB client connected from {}", peer);
                Ok(Some(stream))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop the session after `err`; the core runs free again.
    fn close(&mut self, target: Option<&mut dyn DebugTarget>, err: &RspError) {
        match err {
            RspError::Disconnected => tracing::info!("GDB client disconnected"),
            other => tracing::warn!("GDB session closed: {}", other),
        }
        if let Some(target) = target {
            target.set_single_step(false);
        }
        self.session = None;
    }

    /// Ask the client to perform a file-I/O call on the target's behalf and
    /// serve commands until it answers.
    pub fn syscall(
        &mut self,
        target: &mut dyn DebugTarget,
        fmt: &str,
        args: &[SyscallArg],
        callback: SyscallCallback,
    ) -> RspResult<()> {
        let session = self.session.as_mut().ok_or(RspError::Disconnected)?;
        let result = session.syscall(target, fmt, args, callback);
        if let Err(e) = &result {
            self.close(Some(target), e);
        }
        result
    }
}

impl Debugger for RspServer {
    fn check_remote(&mut self, target: &mut dyn DebugTarget) -> bool {
        if self.session.is_some() {
            return true;
        }
        let stream = match self.accept() {
            Ok(Some(stream)) => stream,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("GDB accept failed: {}", e);
                return false;
            }
        };
        let mut session = RspSession::new(stream);
        // First contact: serve the client until it resumes the core.
        match session.handle_signal(target, 0) {
            Ok(()) => {
                self.session = Some(session);
                true
            }
            Err(e) => {
                self.close(Some(target), &e);
                false
            }
        }
    }

    fn check_ctrl_c(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.check_interrupt() {
            Ok(interrupted) => interrupted,
            Err(e) => {
                self.close(None, &e);
                false
            }
        }
    }

    fn handle_signal(&mut self, target: &mut dyn DebugTarget, signal: u8) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.handle_signal(target, signal) {
            self.close(Some(target), &e);
        }
    }

    fn end(&mut self, code: u8) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.end(code) {
            self.close(None, &e);
        }
    }
}

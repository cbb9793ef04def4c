// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! GDB Remote Serial Protocol engine.
//!
//! [`RspServer`] plugs into the interpreter as its [`Debugger`]: the core polls
//! it before every instruction, and on a trap the server blocks the core while
//! it serves the client's commands through [`DebugTarget`].
//!
//! [`Debugger`]: labwired_iss_core::debug::Debugger
//! [`DebugTarget`]: labwired_iss_core::debug::DebugTarget

pub mod command;
pub mod packet;
pub mod registers;
pub mod server;
pub mod session;
pub mod syscall;

pub use command::SyscallReply;
pub use server::{RspServer, DEFAULT_PORT};
pub use session::{Connection, RspSession, SyscallCallback};
pub use syscall::SyscallArg;

use labwired_iss_core::SimulationError;

#[derive(Debug, thiserror::Error)]
pub enum RspError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("client disconnected")]
    Disconnected,
    #[error("target error: {0}")]
    Target(#[from] SimulationError),
}

pub type RspResult<T> = Result<T, RspError>;

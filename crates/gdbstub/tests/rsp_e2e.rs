// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use labwired_iss_core::{ArmCore, CoreConfig, FlatMemory, ProgramImage};
use labwired_iss_gdbstub::RspServer;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

fn compute_checksum(data: &str) -> String {
    let sum: u8 = data.as_bytes().iter().fold(0, |acc, &x| acc.wrapping_add(x));
    format!("{:02x}", sum)
}

fn send_packet(stream: &mut TcpStream, data: &str) {
    let packet = format!("${}#{}", data, compute_checksum(data));
    stream.write_all(packet.as_bytes()).unwrap();
    stream.flush().unwrap();
}

/// Read one packet, check its checksum, acknowledge it and return the payload.
fn read_packet(stream: &mut TcpStream) -> String {
    let mut byte = [0u8; 1];
    let mut next = |stream: &mut TcpStream| -> u8 {
        match stream.read(&mut byte) {
            Ok(1) => byte[0],
            other => panic!("Timed out reading GDB packet: {:?}", other),
        }
    };
    while next(stream) != b'$' {}
    let mut payload = String::new();
    loop {
        match next(stream) {
            b'#' => break,
            c => payload.push(c as char),
        }
    }
    let sum: String = [next(stream) as char, next(stream) as char].iter().collect();
    assert_eq!(sum, compute_checksum(&payload), "bad checksum on {:?}", payload);
    stream.write_all(b"+").unwrap();
    payload
}

fn command(stream: &mut TcpStream, data: &str) -> String {
    send_packet(stream, data);
    read_packet(stream)
}

/// Start a core running `words` at `base` under a GDB server that waits for
/// the client, and connect to it.
fn start_target(base: u32, words: &'static [u32]) -> TcpStream {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
    let server = RspServer::bind_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)), true).unwrap();
    let addr = server.local_addr().unwrap();

    thread::spawn(move || {
        let mem = FlatMemory::new(0x4106_9260).with_region(0, 0x10000);
        let mut core = ArmCore::new(CoreConfig::arm926ejs(), mem);
        core.mem
            .load_image(&ProgramImage::from_words(0, &[0xEAFF_FFFE]))
            .unwrap();
        if base != 0 {
            core.load_image(&ProgramImage::from_words(base, words)).unwrap();
        }
        core.attach_debugger(Box::new(server));
        loop {
            core.run(10_000);
        }
    });

    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

/// Word `index` of a `g` reply, decoded from little-endian hex.
fn reg(block: &str, index: usize) -> u32 {
    let hex = &block[index * 8..index * 8 + 8];
    u32::from_le_bytes(u32::from_str_radix(hex, 16).unwrap().to_be_bytes())
}

const CPSR_INDEX: usize = (16 * 4 + 8 * 12 + 4) / 4;

#[test]
fn test_registers_at_reset() {
    let mut stream = start_target(0, &[]);
    let block = command(&mut stream, "g");
    assert_eq!(block.len(), 2 * (16 * 4 + 8 * 12 + 4 + 4));
    let (gprs, cpsr) = block.split_at(CPSR_INDEX * 8);
    assert!(gprs.bytes().all(|c| c == b'0'), "got {}", block);
    // Supervisor mode, IRQ and FIQ disabled
    assert_eq!(cpsr, "d3000000");
}

static PROGRAM: [u32; 3] = [
    0xE3A0_0001, // 0x8000: MOV r0, #1
    0xE280_0001, // 0x8004: ADD r0, r0, #1
    0xEAFF_FFFD, // 0x8008: B 0x8004
];

#[test]
fn test_step_breakpoint_and_interrupt() {
    let mut stream = start_target(0x8000, &PROGRAM);

    assert_eq!(command(&mut stream, "?"), "S05");
    let block = command(&mut stream, "g");
    assert_eq!(reg(&block, 15), 0x8000);

    // Single step: MOV retires and the core traps before the ADD.
    assert_eq!(command(&mut stream, "s"), "S05");
    let block = command(&mut stream, "g");
    assert_eq!(reg(&block, 0), 1);
    assert_eq!(reg(&block, 15), 0x8004);

    assert_eq!(command(&mut stream, "Z0,8008,4"), "OK");
    assert_eq!(command(&mut stream, "c"), "S05");
    let block = command(&mut stream, "g");
    assert_eq!(reg(&block, 0), 2);
    assert_eq!(reg(&block, 15), 0x8008);
    assert_eq!(command(&mut stream, "z0,8008,4"), "OK");

    // Free run, then stop it with an interrupt byte.
    send_packet(&mut stream, "c");
    thread::sleep(Duration::from_millis(50));
    stream.write_all(&[0x03]).unwrap();
    assert_eq!(read_packet(&mut stream), "S05");
    let block = command(&mut stream, "g");
    assert!(reg(&block, 0) > 2);

    assert_eq!(command(&mut stream, "m8000,4"), "0100a0e3");
    assert_eq!(command(&mut stream, "M9000,4:efbeadde"), "OK");
    assert_eq!(command(&mut stream, "m9000,4"), "efbeadde");
    assert_eq!(command(&mut stream, "m20000,4"), "E14");
    assert_eq!(command(&mut stream, "qSupported"), "");

    // Resume at a new address; the core continues from there.
    assert_eq!(command(&mut stream, "Z0,8004,4"), "OK");
    assert_eq!(command(&mut stream, "c8000"), "S05");
    let block = command(&mut stream, "g");
    assert_eq!(reg(&block, 0), 1);
    assert_eq!(reg(&block, 15), 0x8004);

    assert_eq!(command(&mut stream, "D"), "OK");
}

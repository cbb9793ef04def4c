// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! File-I/O requests (`F` packets) sent to the client on behalf of the target.

use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallArg {
    /// Consumed by `%x`.
    Word(u32),
    /// Consumed by `%lx`.
    Wide(u64),
    /// Consumed by `%s`: target pointer and length, including the terminator.
    Str { addr: u32, len: u32 },
}

/// Render the request payload for `fmt`, e.g. `"open,%s,%x,%x"`.
///
/// Directives that are unknown or whose argument has the wrong shape are
/// skipped with a warning.
pub fn format_request(fmt: &str, args: &[SyscallArg]) -> String {
    let mut out = String::from("F");
    let mut args = args.iter();
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let directive = match chars.next() {
            Some('l') => match chars.next() {
                Some('x') => "lx",
                _ => {
                    tracing::warn!("Bad syscall format string {:?}", fmt);
                    continue;
                }
            },
            Some('x') => "x",
            Some('s') => "s",
            other => {
                tracing::warn!("Bad syscall format directive {:?} in {:?}", other, fmt);
                continue;
            }
        };
        // Writing to a String cannot fail.
        let _ = match (directive, args.next()) {
            ("x", Some(SyscallArg::Word(v))) => write!(out, "{:08x}", v),
            ("lx", Some(SyscallArg::Wide(v))) => write!(out, "{:016x}", v),
            ("s", Some(SyscallArg::Str { addr, len })) => write!(out, "{:08x}/{:x}", addr, len),
            (_, arg) => {
                tracing::warn!("Syscall argument {:?} does not match %{}", arg, directive);
                Ok(())
            }
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_request() {
        let req = format_request(
            "open,%s,%x,%x",
            &[
                SyscallArg::Str {
                    addr: 0x8100,
                    len: 12,
                },
                SyscallArg::Word(0x241),
                SyscallArg::Word(0o644),
            ],
        );
        assert_eq!(req, "Fopen,00008100/c,00000241,000001a4");
    }

    #[test]
    fn test_wide_argument() {
        let req = format_request("lseek,%x,%lx,%x", &[
            SyscallArg::Word(3),
            SyscallArg::Wide(0x1_0000_0000),
            SyscallArg::Word(0),
        ]);
        assert_eq!(req, "Flseek,00000003,0000000100000000,00000000");
    }

    #[test]
    fn test_bad_directives_are_skipped() {
        assert_eq!(format_request("close,%d", &[SyscallArg::Word(1)]), "Fclose,");
        assert_eq!(format_request("read,%lq", &[]), "Fread,");
        // argument of the wrong shape
        assert_eq!(format_request("close,%x", &[SyscallArg::Wide(1)]), "Fclose,");
    }
}

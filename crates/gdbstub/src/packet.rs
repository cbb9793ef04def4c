// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! RSP framing: `$<payload>#<checksum>`.

/// Size of the receive buffer. One byte is reserved, so the longest accepted
/// payload is `PACKET_BUFFER_SIZE - 1` bytes.
pub const PACKET_BUFFER_SIZE: usize = 4096;

/// Byte a client sends to interrupt a running target.
pub const INTERRUPT: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Idle,
    ReadingLine,
    Checksum1,
    Checksum2,
}

/// Outcome of a completed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Checksum matched; acknowledge with `+` and dispatch.
    Packet(Vec<u8>),
    /// Checksum mismatch; answer `-` to request retransmission.
    Corrupt,
}

/// Byte-at-a-time frame decoder.
#[derive(Debug)]
pub struct PacketReader {
    state: ReadState,
    line: Vec<u8>,
    /// High nibble of the received checksum; `None` after a non-hex digit.
    checksum: Option<u8>,
}

impl Default for PacketReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketReader {
    pub fn new() -> Self {
        Self {
            state: ReadState::Idle,
            line: Vec::with_capacity(PACKET_BUFFER_SIZE),
            checksum: None,
        }
    }

    pub fn reset(&mut self) {
        self.state = ReadState::Idle;
        self.line.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.state == ReadState::Idle
    }

    /// Feed one byte. Bytes outside a frame (acks, stray interrupts) are ignored.
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            ReadState::Idle => {
                if byte == b'$' {
                    self.line.clear();
                    self.state = ReadState::ReadingLine;
                }
                None
            }
            ReadState::ReadingLine => {
                if byte == b'#' {
                    self.state = ReadState::Checksum1;
                } else if self.line.len() >= PACKET_BUFFER_SIZE - 1 {
                    tracing::warn!("Dropping oversized RSP packet");
                    self.reset();
                } else {
                    self.line.push(byte);
                }
                None
            }
            ReadState::Checksum1 => {
                self.checksum = hex_digit(byte).map(|high| high << 4);
                self.state = ReadState::Checksum2;
                None
            }
            ReadState::Checksum2 => {
                let received = self
                    .checksum
                    .zip(hex_digit(byte))
                    .map(|(high, low)| high | low);
                self.state = ReadState::Idle;
                let computed = checksum(&self.line);
                if received == Some(computed) {
                    Some(Frame::Packet(std::mem::take(&mut self.line)))
                } else {
                    tracing::debug!(
                        "RSP checksum mismatch: got {:?}, computed {:02x}",
                        received,
                        computed
                    );
                    self.line.clear();
                    Some(Frame::Corrupt)
                }
            }
        }
    }
}

/// Modulo-256 sum of the payload bytes.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Frame `payload` for the wire.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let sum = checksum(payload);
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(b'$');
    out.extend_from_slice(payload);
    out.push(b'#');
    out.push(to_hex_digit(sum >> 4));
    out.push(to_hex_digit(sum & 0xF));
    out
}

#[inline]
pub fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[inline]
pub fn to_hex_digit(v: u8) -> u8 {
    match v {
        0..=9 => b'0' + v,
        _ => b'a' + v - 10,
    }
}

/// Lowercase hex rendering of `bytes`, two digits per byte.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(to_hex_digit(b >> 4) as char);
        out.push(to_hex_digit(b & 0xF) as char);
    }
    out
}

/// Decode pairs of hex digits. Fails on an odd length or a non-hex digit.
pub fn from_hex(text: &[u8]) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    text.chunks_exact(2)
        .map(|pair| Some((hex_digit(pair[0])? << 4) | hex_digit(pair[1])?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(reader: &mut PacketReader, bytes: &[u8]) -> Vec<Frame> {
        bytes.iter().filter_map(|&b| reader.feed(b)).collect()
    }

    #[test]
    fn test_known_checksum() {
        assert_eq!(encode(b"g"), b"$g#67".to_vec());
        assert_eq!(encode(b""), b"$#00".to_vec());
        assert_eq!(encode(b"OK"), b"$OK#9a".to_vec());
    }

    #[test]
    fn test_encode_then_read_recovers_payload() {
        let payloads: [&[u8]; 4] = [b"?", b"m8000,4", b"Z0,1000,4", &[0x7F, b'a', b'}', 0x20]];
        let mut reader = PacketReader::new();
        for payload in payloads {
            let frames = feed_all(&mut reader, &encode(payload));
            assert_eq!(frames, vec![Frame::Packet(payload.to_vec())]);
            assert!(reader.is_idle());
        }
    }

    #[test]
    fn test_corrupt_checksum_is_rejected() {
        let mut reader = PacketReader::new();
        for corrupt_at in [4usize, 5] {
            let mut wire = encode(b"s");
            wire[corrupt_at] = if wire[corrupt_at] == b'0' { b'1' } else { b'0' };
            assert_eq!(feed_all(&mut reader, &wire), vec![Frame::Corrupt]);
        }
        // the decoder recovers for the next packet
        assert_eq!(
            feed_all(&mut reader, b"$c#63"),
            vec![Frame::Packet(b"c".to_vec())]
        );
    }

    #[test]
    fn test_non_hex_checksum_digit_is_rejected() {
        // both payloads have a zero nibble in their checksum: "" is 00, "P" is 50
        let mut reader = PacketReader::new();
        for payload in [&b""[..], b"P"] {
            for corrupt_at in [payload.len() + 2, payload.len() + 3] {
                for bad in [b'z', b'g', b'#', INTERRUPT] {
                    let mut wire = encode(payload);
                    wire[corrupt_at] = bad;
                    assert_eq!(
                        feed_all(&mut reader, &wire),
                        vec![Frame::Corrupt],
                        "{:?}",
                        String::from_utf8_lossy(&wire)
                    );
                    assert!(reader.is_idle());
                }
            }
        }
        assert_eq!(feed_all(&mut reader, b"$#0z"), vec![Frame::Corrupt]);
        assert_eq!(feed_all(&mut reader, b"$P#5g"), vec![Frame::Corrupt]);
        assert_eq!(
            feed_all(&mut reader, b"$c#63"),
            vec![Frame::Packet(b"c".to_vec())]
        );
    }

    #[test]
    fn test_noise_between_frames_is_ignored() {
        let mut reader = PacketReader::new();
        let frames = feed_all(&mut reader, b"+-\x03$?#3f+");
        assert_eq!(frames, vec![Frame::Packet(b"?".to_vec())]);
    }

    #[test]
    fn test_oversized_packet_is_dropped() {
        let mut reader = PacketReader::new();
        let mut wire = vec![b'$'];
        wire.extend(std::iter::repeat(b'a').take(PACKET_BUFFER_SIZE));
        wire.extend_from_slice(b"#00");
        assert!(feed_all(&mut reader, &wire).is_empty());
        assert!(reader.is_idle());

        let longest = vec![b'a'; PACKET_BUFFER_SIZE - 1];
        let frames = feed_all(&mut reader, &encode(&longest));
        assert_eq!(frames, vec![Frame::Packet(longest)]);
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(to_hex(&[0x00, 0xAB, 0x7F]), "00ab7f");
        assert_eq!(from_hex(b"00aB7f"), Some(vec![0x00, 0xAB, 0x7F]));
        assert_eq!(from_hex(b"abc"), None);
        assert_eq!(from_hex(b"zz"), None);
        assert_eq!(hex_digit(b'F'), Some(15));
        assert_eq!(hex_digit(b'#'), None);
    }
}

//! Datagram encoder
//!
//! Builds the four record blocks for a given L/C/filter setting. The layout
//! is fixed by the controller firmware and must match byte for byte.

use tracing::trace;

/// Size of one `xN=V&` record
pub const RECORD_LEN: usize = 5;

/// Records in block A (`a0`..`a5`)
const BLOCK_A_RECORDS: usize = 6;
/// Records in block B (`b0`..`b4`)
const BLOCK_B_RECORDS: usize = 5;
/// Records in block C1 (`c0`..`c2`)
const BLOCK_C1_RECORDS: usize = 3;
/// Records in block C2 (`c5`)
const BLOCK_C2_RECORDS: usize = 1;

/// Total length of a concatenated datagram
pub const DATAGRAM_LEN: usize =
    (BLOCK_A_RECORDS + BLOCK_B_RECORDS + BLOCK_C1_RECORDS + BLOCK_C2_RECORDS) * RECORD_LEN;

/// The four record blocks of one control datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBlocks {
    a: [u8; BLOCK_A_RECORDS * RECORD_LEN],
    b: [u8; BLOCK_B_RECORDS * RECORD_LEN],
    c1: [u8; BLOCK_C1_RECORDS * RECORD_LEN],
    c2: [u8; BLOCK_C2_RECORDS * RECORD_LEN],
}

impl MessageBlocks {
    /// Block A: L-bank relays 1-6 (`a0`..`a5`)
    pub fn a(&self) -> &[u8] {
        &self.a
    }

    /// Block B: L-bank relay 7 (`b0`) and C-bank relays 1-4 (`b1`..`b4`)
    pub fn b(&self) -> &[u8] {
        &self.b
    }

    /// Block C1: C-bank relays 6-8 (`c0`..`c2`)
    pub fn c1(&self) -> &[u8] {
        &self.c1
    }

    /// Block C2: filter relay (`c5`)
    pub fn c2(&self) -> &[u8] {
        &self.c2
    }

    /// Concatenate the blocks in transmission order (A, B, C1, C2)
    pub fn to_datagram(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DATAGRAM_LEN);
        out.extend_from_slice(&self.a);
        out.extend_from_slice(&self.b);
        out.extend_from_slice(&self.c1);
        out.extend_from_slice(&self.c2);
        out
    }
}

/// Write a single `<port><pin>=<0|1>&` record into `dst`
fn write_record(dst: &mut [u8], port: u8, pin: u8, on: bool) {
    debug_assert!(pin < 10);
    dst[0] = port;
    dst[1] = b'0' + pin;
    dst[2] = b'=';
    dst[3] = if on { b'1' } else { b'0' };
    dst[4] = b'&';
}

#[inline]
fn bit(value: u8, n: u8) -> bool {
    (value >> n) & 1 == 1
}

/// Encode an L/C/filter setting into the four record blocks
///
/// `l` is expected in `0..=127`. Bit 7 of `l` has no relay and is ignored;
/// callers validate operator input before it gets here.
pub fn encode(l: u8, c: u8, highpass: bool) -> MessageBlocks {
    let mut blocks = MessageBlocks {
        a: [0; BLOCK_A_RECORDS * RECORD_LEN],
        b: [0; BLOCK_B_RECORDS * RECORD_LEN],
        c1: [0; BLOCK_C1_RECORDS * RECORD_LEN],
        c2: [0; BLOCK_C2_RECORDS * RECORD_LEN],
    };

    for (i, rec) in blocks.a.chunks_exact_mut(RECORD_LEN).enumerate() {
        let i = i as u8;
        write_record(rec, b'a', i, bit(l, i));
    }

    // b0 carries the last L relay, b1..b4 the low C relays
    for (i, rec) in blocks.b.chunks_exact_mut(RECORD_LEN).enumerate() {
        let i = i as u8;
        let on = if i == 0 { bit(l, 6) } else { bit(c, i - 1) };
        write_record(rec, b'b', i, on);
    }

    for (j, rec) in blocks.c1.chunks_exact_mut(RECORD_LEN).enumerate() {
        let j = j as u8;
        write_record(rec, b'c', j, bit(c, j + 5));
    }

    write_record(&mut blocks.c2, b'c', 5, highpass);

    trace!("Encoded L={} C={} HP={}", l, c, highpass);
    blocks
}

//! Blake2b-256 with the CKB domain personalization.
//!
//! CKB derives every consensus hash from RFC 7693 Blake2b parameterized with
//! digest length 32 and the 16-byte personalization `ckb-default-hash`. The
//! header pow-hash fed to Eaglesong is produced here, so the output has to be
//! bit-exact with the node's.

pub const DIGEST_SIZE: usize = 32;
pub const PERSONALIZATION: &[u8; 16] = b"ckb-default-hash";

const BLOCK_SIZE: usize = 128;

const IV: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

const SIGMA: [[usize; 16]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
];

/// Streaming hasher. The parameter block is fixed: digest 32, no key,
/// fanout 1, depth 1, zero salt, `ckb-default-hash` personalization.
#[derive(Clone)]
pub struct Blake2b {
    h: [u64; 8],
    buffer: [u8; BLOCK_SIZE],
    buffered: usize,
    counter: u64,
}

impl Blake2b {
    pub fn new() -> Self {
        // RFC 7693 §2.5: h[i] = IV[i] xor LE word i of the parameter block.
        // Word 0 packs digest_length, key_length, fanout and depth; words 6
        // and 7 carry the personalization.
        let mut h = IV;
        h[0] ^= 0x0101_0020;
        h[6] ^= u64::from_le_bytes(PERSONALIZATION[0..8].try_into().expect("8 bytes"));
        h[7] ^= u64::from_le_bytes(PERSONALIZATION[8..16].try_into().expect("8 bytes"));

        Self {
            h,
            buffer: [0u8; BLOCK_SIZE],
            buffered: 0,
            counter: 0,
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        // A full buffer is only compressed once more input shows up, so the
        // final block handed to `finalize` is never empty.
        while !data.is_empty() {
            if self.buffered == BLOCK_SIZE {
                self.counter += BLOCK_SIZE as u64;
                let block = self.buffer;
                self.compress(&block, self.counter, false);
                self.buffered = 0;
            }

            let take = data.len().min(BLOCK_SIZE - self.buffered);
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&data[..take]);
            self.buffered += take;
            data = &data[take..];
        }
    }

    pub fn finalize(mut self) -> [u8; DIGEST_SIZE] {
        let total = self.counter + self.buffered as u64;
        self.buffer[self.buffered..].fill(0);
        let block = self.buffer;
        self.compress(&block, total, true);

        let mut out = [0u8; DIGEST_SIZE];
        for (i, chunk) in out.chunks_exact_mut(8).enumerate() {
            chunk.copy_from_slice(&self.h[i].to_le_bytes());
        }
        out
    }

    fn compress(&mut self, block: &[u8; BLOCK_SIZE], counter: u64, last: bool) {
        let mut m = [0u64; 16];
        for (i, word) in m.iter_mut().enumerate() {
            *word = u64::from_le_bytes(block[i * 8..(i + 1) * 8].try_into().expect("8 bytes"));
        }

        let mut v = [0u64; 16];
        v[..8].copy_from_slice(&self.h);
        v[8..].copy_from_slice(&IV);
        v[12] ^= counter;
        if last {
            v[14] ^= u64::MAX;
        }

        fn g(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, x: u64, y: u64) {
            v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
            v[d] = (v[d] ^ v[a]).rotate_right(32);
            v[c] = v[c].wrapping_add(v[d]);
            v[b] = (v[b] ^ v[c]).rotate_right(24);
            v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
            v[d] = (v[d] ^ v[a]).rotate_right(16);
            v[c] = v[c].wrapping_add(v[d]);
            v[b] = (v[b] ^ v[c]).rotate_right(63);
        }

        for round in 0..12 {
            let s = &SIGMA[round % 10];
            g(&mut v, 0, 4, 8, 12, m[s[0]], m[s[1]]);
            g(&mut v, 1, 5, 9, 13, m[s[2]], m[s[3]]);
            g(&mut v, 2, 6, 10, 14, m[s[4]], m[s[5]]);
            g(&mut v, 3, 7, 11, 15, m[s[6]], m[s[7]]);
            g(&mut v, 0, 5, 10, 15, m[s[8]], m[s[9]]);
            g(&mut v, 1, 6, 11, 12, m[s[10]], m[s[11]]);
            g(&mut v, 2, 7, 8, 13, m[s[12]], m[s[13]]);
            g(&mut v, 3, 4, 9, 14, m[s[14]], m[s[15]]);
        }

        for i in 0..8 {
            self.h[i] ^= v[i] ^ v[i + 8];
        }
    }
}

impl Default for Blake2b {
    fn default() -> Self {
        Self::new()
    }
}

pub fn ckb_blake2b(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut hasher = Blake2b::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn case(input: &[u8], expected: &str) {
        assert_eq!(hex::encode(ckb_blake2b(input)), expected);
    }

    #[test]
    fn empty_input() {
        case(
            b"",
            "44f4c69744d5f8c55d642062949dcae49bc4e7ef43d388c5a12f42b5633d163e",
        );
    }

    #[test]
    fn short_input() {
        case(
            b"hello",
            "2da1289373a9f6b7ed21db948f4dc5d942cf4023eaef1d5a2b1a45b9d12d1036",
        );
    }

    #[test]
    fn raw_header_sized_input() {
        // 192 zero bytes, the size of a packed raw header.
        case(
            &[0u8; 192],
            "dd45d8653e8fe80a8e41c00d018f6b955c991ae7a2094c513fbb685c9c569630",
        );
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data: Vec<u8> = (0u32..1000).map(|i| (i % 251) as u8).collect();

        for split in [0, 1, 64, 127, 128, 129, 500, 999, 1000] {
            let mut hasher = Blake2b::new();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            assert_eq!(hasher.finalize(), ckb_blake2b(&data), "split at {split}");
        }
    }

    #[test]
    fn block_boundary_inputs_differ() {
        // 127, 128 and 129 bytes exercise the buffered-block edge.
        let a = ckb_blake2b(&[0xaa; 127]);
        let b = ckb_blake2b(&[0xaa; 128]);
        let c = ckb_blake2b(&[0xaa; 129]);
        assert_ne!(a, b);
        assert_ne!(b, c);
    }
}

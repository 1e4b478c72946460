//! Eaglesong proof-of-work hashing.
//!
//! Shares are verified by hashing the 48-byte pow message (32-byte header
//! pow-hash followed by the 16-byte nonce in little-endian order) with
//! Eaglesong and comparing the digest against a target. The permutation
//! itself comes from the `eaglesong` crate, the Nervos reference
//! implementation the node uses, so the digests here agree bit for bit with
//! what the chain accepts.

use super::*;

pub const POW_MESSAGE_SIZE: usize = 48;

pub fn eaglesong_hash(data: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    eaglesong::eaglesong(data, &mut output);
    output
}

/// `pow_hash || nonce` with the nonce in little-endian byte order.
pub fn pow_message(pow_hash: &[u8; 32], nonce: Nonce) -> [u8; POW_MESSAGE_SIZE] {
    let mut message = [0u8; POW_MESSAGE_SIZE];
    message[..32].copy_from_slice(pow_hash);
    message[32..].copy_from_slice(&u128::from(nonce).to_le_bytes());
    message
}

pub fn share_hash(pow_hash: &[u8; 32], nonce: Nonce) -> [u8; 32] {
    eaglesong_hash(&pow_message(pow_hash, nonce))
}

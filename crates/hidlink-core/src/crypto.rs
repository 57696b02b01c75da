//! Cryptographic collaborators for the handshake.
//!
//! Two concerns live here: answering the device's authentication
//! challenge, and the optional AES-CBC cipher for encrypted channel
//! sessions on firmware that supports it. The handshake itself never
//! touches key material beyond handing it to these collaborators.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use sha2::{Digest, Sha256};

use crate::protocol::constants::SUB_BLOCK;

/// Shared-key length used by the dongle (AES-128).
pub const KEY_LEN: usize = 16;

/// Derive the 16-byte shared key from a user password.
pub fn key_from_password(password: &str) -> [u8; KEY_LEN] {
    let digest = Sha256::digest(password.as_bytes());
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&digest[..KEY_LEN]);
    key
}

/// Computes the response to a device authentication challenge.
///
/// Injected into the handshake so tests can substitute a recording
/// implementation and deployments can swap the primitive.
pub trait Authenticator: Send + Sync {
    /// Compute the response bytes for `challenge` under `key`. The raw
    /// key must never appear in the output.
    fn respond(&self, key: &[u8; KEY_LEN], challenge: &[u8]) -> Vec<u8>;
}

/// Default authenticator: AES-128 over the challenge blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesAuthenticator;

impl Authenticator for AesAuthenticator {
    fn respond(&self, key: &[u8; KEY_LEN], challenge: &[u8]) -> Vec<u8> {
        let cipher = Aes128::new(GenericArray::from_slice(key));
        let mut out = challenge.to_vec();
        let pad = out.len() % SUB_BLOCK;
        if pad != 0 {
            out.resize(out.len() + SUB_BLOCK - pad, 0);
        }
        for chunk in out.chunks_exact_mut(SUB_BLOCK) {
            let block = GenericArray::from_mut_slice(chunk);
            cipher.encrypt_block(block);
        }
        out
    }
}

/// AES-128-CBC cipher for encrypted channel sessions.
///
/// Chaining state persists across packets in both directions, matching
/// the dongle firmware: the IV advances with every encrypted block.
pub struct ChannelCipher {
    cipher: Aes128,
    enc_iv: [u8; SUB_BLOCK],
    dec_iv: [u8; SUB_BLOCK],
}

impl ChannelCipher {
    pub fn new(key: &[u8; KEY_LEN], iv: [u8; SUB_BLOCK]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
            enc_iv: iv,
            dec_iv: iv,
        }
    }

    /// Encrypt a block-aligned buffer in place.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        debug_assert_eq!(data.len() % SUB_BLOCK, 0);
        for chunk in data.chunks_exact_mut(SUB_BLOCK) {
            for (b, iv) in chunk.iter_mut().zip(self.enc_iv.iter()) {
                *b ^= iv;
            }
            let block = GenericArray::from_mut_slice(chunk);
            self.cipher.encrypt_block(block);
            self.enc_iv.copy_from_slice(chunk);
        }
    }

    /// Decrypt a block-aligned buffer in place.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        debug_assert_eq!(data.len() % SUB_BLOCK, 0);
        for chunk in data.chunks_exact_mut(SUB_BLOCK) {
            let mut next_iv = [0u8; SUB_BLOCK];
            next_iv.copy_from_slice(chunk);
            let block = GenericArray::from_mut_slice(chunk);
            self.cipher.decrypt_block(block);
            for (b, iv) in chunk.iter_mut().zip(self.dec_iv.iter()) {
                *b ^= iv;
            }
            self.dec_iv = next_iv;
        }
    }
}

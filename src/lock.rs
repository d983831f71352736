//! Lock key material and the challenge-response used to unlock a beacon.
//!
//! The key itself never crosses the link: the client proves possession by
//! returning `AES-128-ECB(key, challenge)`, and a replacement key is sent
//! encrypted under the current one.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::LOCK_KEY_LEN;
use crate::error::AppError;

pub type Block = [u8; LOCK_KEY_LEN];

#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct LockKey(Block);

impl LockKey {
    pub fn generate() -> Self {
        let mut key = [0u8; LOCK_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        let lock_key = Self(key);
        key.zeroize();
        lock_key
    }

    pub fn from_bytes(bytes: Block) -> Self {
        Self(bytes)
    }

    pub fn from_hex(text: &str) -> Result<Self, AppError> {
        let cleaned: String = text.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
        let bytes = hex::decode(cleaned).map_err(|e| AppError::InvalidLockKey(e.to_string()))?;
        let key: Block = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AppError::InvalidLockKey(format!("expected {} bytes, got {}", LOCK_KEY_LEN, bytes.len())))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &Block {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Expected unlock value for `challenge`.
    pub fn respond(&self, challenge: &Block) -> Block {
        let cipher = Aes128::new(GenericArray::from_slice(&self.0));
        let mut block = GenericArray::clone_from_slice(challenge);
        cipher.encrypt_block(&mut block);
        to_block(&block)
    }

    pub fn verify(&self, challenge: &Block, response: &Block) -> bool {
        constant_time_eq(&self.respond(challenge), response)
    }

    /// Encrypts `next` for transfer, as a client does when rotating the key.
    pub fn wrap(&self, next: &LockKey) -> Block {
        self.respond(&next.0)
    }

    /// Recovers a key sent encrypted under this one.
    pub fn unwrap_key(&self, wrapped: &Block) -> LockKey {
        let cipher = Aes128::new(GenericArray::from_slice(&self.0));
        let mut block = GenericArray::clone_from_slice(wrapped);
        cipher.decrypt_block(&mut block);
        LockKey(to_block(&block))
    }
}

impl fmt::Debug for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LockKey(..)")
    }
}

pub fn new_challenge() -> Block {
    let mut challenge = [0u8; LOCK_KEY_LEN];
    OsRng.fill_bytes(&mut challenge);
    challenge
}

fn to_block(bytes: &[u8]) -> Block {
    let mut block = [0u8; LOCK_KEY_LEN];
    block.copy_from_slice(bytes);
    block
}

fn constant_time_eq(a: &Block, b: &Block) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

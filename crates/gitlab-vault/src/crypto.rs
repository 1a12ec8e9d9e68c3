//! Secret codec: scrypt key derivation + AES-256-GCM.
//!
//! Blob format (all components lowercase hex, `:`-delimited):
//!
//! ```text
//! salt(16B) : iv(16B) : tag(16B) : ciphertext(N)
//! ```
//!
//! A fresh salt and IV are drawn from the OS RNG on every call. The
//! per-blob key is `scrypt(master_key, salt)` with N=2^14, r=8, p=1, so
//! blobs written by other scrypt/AES-GCM implementations using the same
//! parameters remain readable.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::types::{MasterKey, VaultError, VaultResult};

/// AES-256-GCM with a 16-byte nonce.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

const SEPARATOR: char = ':';

fn derive_key(master_key: &MasterKey, salt: &[u8]) -> VaultResult<Zeroizing<[u8; KEY_LEN]>> {
    let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN)
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(master_key.as_bytes(), salt, &params, key.as_mut_slice())
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

fn cipher_for(key: &[u8; KEY_LEN]) -> Aes256Gcm16 {
    Aes256Gcm16::new(GenericArray::from_slice(key))
}

/// Encrypt `plaintext` into a self-describing blob.
pub fn encrypt(plaintext: &str, master_key: &MasterKey) -> VaultResult<String> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(master_key, &salt)?;
    let cipher = cipher_for(&key);

    let mut buffer = plaintext.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| VaultError::EncryptionFailed)?;

    Ok([
        hex::encode(salt),
        hex::encode(iv),
        hex::encode(tag),
        hex::encode(buffer),
    ]
    .join(&SEPARATOR.to_string()))
}

/// Decrypt a blob produced by [`encrypt`]. Fails closed: any tampering,
/// corruption or wrong key yields [`VaultError::DecryptionFailed`].
pub fn decrypt(blob: &str, master_key: &MasterKey) -> VaultResult<String> {
    let parts: Vec<&str> = blob.split(SEPARATOR).collect();
    if parts.len() != 4 {
        return Err(VaultError::MalformedBlob(parts.len()));
    }

    let salt = decode_component(parts[0], Some(SALT_LEN))?;
    let iv = decode_component(parts[1], Some(IV_LEN))?;
    let tag = decode_component(parts[2], Some(TAG_LEN))?;
    let mut buffer = decode_component(parts[3], None)?;

    let key = derive_key(master_key, &salt)?;
    let cipher = cipher_for(&key);

    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(&iv),
            b"",
            &mut buffer,
            GenericArray::from_slice(&tag),
        )
        .map_err(|_| VaultError::DecryptionFailed)?;

    String::from_utf8(buffer).map_err(|_| VaultError::DecryptionFailed)
}

fn decode_component(part: &str, expected_len: Option<usize>) -> VaultResult<Vec<u8>> {
    let bytes = hex::decode(part).map_err(|_| VaultError::DecryptionFailed)?;
    match expected_len {
        Some(len) if bytes.len() != len => Err(VaultError::DecryptionFailed),
        _ => Ok(bytes),
    }
}

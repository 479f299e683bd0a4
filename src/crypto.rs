//! Cryptographic building blocks shared by the Payer and the Matcher
//!
//! - **hash160**: SHA-256 followed by RIPEMD-160
//! - **Scalar reduction**: arbitrary bytes → secp256k1 secret key (mod group order)
//! - **Hybrid encryption**: ephemeral ECDH on secp256k1 + HKDF-SHA256 + AES-256-GCM,
//!   used for Payer → Matcher requests
//! - **Session encryption**: HKDF-SHA256 over the session key + AES-256-GCM,
//!   used for Matcher → Payer responses
//!
//! # Wire Formats
//!
//! ```text
//! hybrid:  [1 byte version][33 bytes ephemeral pubkey][12 bytes nonce][ciphertext + 16 byte tag]
//! session: [1 byte version][12 bytes nonce][ciphertext + 16 byte tag]
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use bitcoin::hashes::{hash160, Hash};
use hkdf::Hkdf;
use num_bigint::BigUint;
use secp256k1::ecdh::SharedSecret;
use secp256k1::rand::{thread_rng, RngCore};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{BritError, Result};

/// Current version byte for both ciphertext formats
const FORMAT_VERSION: u8 = 1;

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const PUBKEY_SIZE: usize = 33;

/// Length of a session key in bytes
pub const SESSION_KEY_LEN: usize = 32;

const REQUEST_INFO: &[u8] = b"brit/payer-request/v1";
const RESPONSE_INFO: &[u8] = b"brit/matcher-response/v1";

/// SHA-256 then RIPEMD-160
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

/// Reduce big-endian bytes modulo the secp256k1 group order
///
/// Fails with `InvalidInput` in the (negligible) case the result is zero.
pub fn reduce_mod_order(bytes: &[u8]) -> Result<SecretKey> {
    let order = BigUint::from_bytes_be(&secp256k1::constants::CURVE_ORDER);
    let scalar = BigUint::from_bytes_be(bytes) % order;

    let be = scalar.to_bytes_be();
    let mut buf = Zeroizing::new([0u8; 32]);
    buf[32 - be.len()..].copy_from_slice(&be);

    SecretKey::from_slice(buf.as_ref())
        .map_err(|_| BritError::invalid_input("scalar reduces to zero modulo the curve order"))
}

/// Generate a fresh random session key
pub fn generate_session_key() -> Zeroizing<[u8; SESSION_KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; SESSION_KEY_LEN]);
    thread_rng().fill_bytes(key.as_mut());
    key
}

fn derive_key(ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut key = Zeroizing::new([0u8; 32]);
    hk.expand(info, key.as_mut())
        .map_err(|e| BritError::EncryptionFailure(format!("key derivation: {}", e)))?;
    Ok(key)
}

fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    thread_rng().fill_bytes(&mut nonce);
    nonce
}

fn aead_seal(key: &[u8; 32], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| BritError::EncryptionFailure(e.to_string()))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| BritError::EncryptionFailure(e.to_string()))
}

fn aead_open(key: &[u8; 32], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| BritError::DecryptionFailure(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| BritError::IntegrityCheckFailed("authentication tag mismatch".to_string()))
}

fn check_version(data: &[u8], min_len: usize) -> Result<()> {
    if data.len() < min_len {
        return Err(BritError::DecryptionFailure(format!(
            "ciphertext too short: {} bytes (minimum {})",
            data.len(),
            min_len
        )));
    }
    if data[0] != FORMAT_VERSION {
        return Err(BritError::DecryptionFailure(format!(
            "unsupported ciphertext version {}",
            data[0]
        )));
    }
    Ok(())
}

/// Encrypt `plaintext` so that only the holder of `recipient`'s secret key can read it
pub fn seal_to_public_key(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let secp = Secp256k1::new();
    let (ephemeral_sk, ephemeral_pk) = secp.generate_keypair(&mut thread_rng());
    let ephemeral_bytes = ephemeral_pk.serialize();

    let shared = Zeroizing::new(SharedSecret::new(recipient, &ephemeral_sk).secret_bytes());
    let key = derive_key(shared.as_ref(), Some(&ephemeral_bytes), REQUEST_INFO)?;

    let nonce = random_nonce();
    let ciphertext = aead_seal(&key, &nonce, plaintext)?;

    let mut out = Vec::with_capacity(1 + PUBKEY_SIZE + NONCE_SIZE + ciphertext.len());
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&ephemeral_bytes);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Inverse of [`seal_to_public_key`]
pub fn open_with_secret_key(secret: &SecretKey, data: &[u8]) -> Result<Vec<u8>> {
    check_version(data, 1 + PUBKEY_SIZE + NONCE_SIZE + TAG_SIZE)?;

    let ephemeral_bytes = &data[1..1 + PUBKEY_SIZE];
    let nonce = &data[1 + PUBKEY_SIZE..1 + PUBKEY_SIZE + NONCE_SIZE];
    let ciphertext = &data[1 + PUBKEY_SIZE + NONCE_SIZE..];

    let ephemeral_pk = PublicKey::from_slice(ephemeral_bytes)
        .map_err(|e| BritError::DecryptionFailure(format!("ephemeral key: {}", e)))?;
    let shared = Zeroizing::new(SharedSecret::new(&ephemeral_pk, secret).secret_bytes());
    let key = derive_key(shared.as_ref(), Some(ephemeral_bytes), REQUEST_INFO)?;

    aead_open(&key, nonce, ciphertext)
}

/// Encrypt under a shared session key
pub fn seal_with_session_key(session_key: &[u8; SESSION_KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let key = derive_key(session_key, None, RESPONSE_INFO)?;
    let nonce = random_nonce();
    let ciphertext = aead_seal(&key, &nonce, plaintext)?;

    let mut out = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Inverse of [`seal_with_session_key`]
pub fn open_with_session_key(session_key: &[u8; SESSION_KEY_LEN], data: &[u8]) -> Result<Vec<u8>> {
    check_version(data, 1 + NONCE_SIZE + TAG_SIZE)?;

    let nonce = &data[1..1 + NONCE_SIZE];
    let ciphertext = &data[1 + NONCE_SIZE..];
    let key = derive_key(session_key, None, RESPONSE_INFO)?;

    aead_open(&key, nonce, ciphertext)
}

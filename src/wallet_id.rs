//! BRIT wallet identity
//!
//! A `BritWalletId` is a one-way, deterministic 160-bit identifier for a wallet
//! seed. Matchers only ever see this id, never the seed or any wallet address.
//!
//! # Derivation
//!
//! ```text
//! seed bytes ─► unsigned big integer ─► decimal string
//!            ─► scrypt(decimal, BRIT_SCRYPT_SALT)        (N = 2^14, r = 8, p = 1)
//!            ─► mod secp256k1 order ─► scalar · G
//!            ─► uncompressed point ─► hash160 ─► 20 byte id
//! ```
//!
//! The chain is fixed: existing Matcher deployments recognise wallets by it.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use scrypt::Params;
use secp256k1::{PublicKey, Secp256k1};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{hash160, reduce_mod_order};
use crate::{BritError, Result};

/// Length of a wallet id in bytes
pub const WALLET_ID_LEN: usize = 20;

/// Scrypt salt for wallet ids: the largest prime below 2^64 (18446744073709551557)
///
/// Must never be swapped with the salt used for wallet password keys.
pub const BRIT_SCRYPT_SALT: [u8; 8] = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xc5];

const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const SCRYPT_KEY_LEN: usize = 32;

/// Deterministic 20-byte wallet identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BritWalletId([u8; WALLET_ID_LEN]);

impl BritWalletId {
    /// Derive the wallet id from a wallet seed
    ///
    /// # Errors
    /// `InvalidInput` if `seed` is empty.
    pub fn derive(seed: &[u8]) -> Result<Self> {
        if seed.is_empty() {
            return Err(BritError::invalid_input("wallet seed is empty"));
        }

        let decimal = Zeroizing::new(BigUint::from_bytes_be(seed).to_str_radix(10));

        let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, SCRYPT_KEY_LEN)
            .map_err(|e| BritError::invalid_input(format!("scrypt parameters: {}", e)))?;
        let mut derived = Zeroizing::new([0u8; SCRYPT_KEY_LEN]);
        scrypt::scrypt(decimal.as_bytes(), &BRIT_SCRYPT_SALT, &params, &mut derived[..])
            .map_err(|e| BritError::invalid_input(format!("scrypt output: {}", e)))?;

        let scalar = reduce_mod_order(&derived[..])?;
        let secp = Secp256k1::signing_only();
        let point = PublicKey::from_secret_key(&secp, &scalar);

        let id = Self(hash160(&point.serialize_uncompressed()));
        log::debug!("Derived BRIT wallet id {}", id);
        Ok(id)
    }

    /// Wrap previously derived id bytes (no re-derivation)
    pub fn from_bytes(bytes: [u8; WALLET_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; WALLET_ID_LEN] = bytes.try_into().map_err(|_| {
            BritError::invalid_input(format!(
                "wallet id must be {} bytes, got {}",
                WALLET_ID_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| BritError::invalid_input(format!("wallet id hex: {}", e)))?;
        Self::from_slice(&bytes)
    }

    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bitcoin::base58::decode(s.trim())
            .map_err(|e| BritError::invalid_input(format!("wallet id base58: {}", e)))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; WALLET_ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_base58(&self) -> String {
        bitcoin::base58::encode(&self.0)
    }

    /// The id as an unsigned big integer (request wire form)
    pub fn to_big_uint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// Inverse of [`to_big_uint`](Self::to_big_uint); rejects values wider than 160 bits
    pub fn from_big_uint(value: &BigUint) -> Result<Self> {
        let be = value.to_bytes_be();
        if be.len() > WALLET_ID_LEN {
            return Err(BritError::invalid_input("wallet id integer exceeds 160 bits"));
        }
        let mut bytes = [0u8; WALLET_ID_LEN];
        bytes[WALLET_ID_LEN - be.len()..].copy_from_slice(&be);
        Ok(Self(bytes))
    }
}

impl fmt::Display for BritWalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BritWalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BritWalletId({})", self.to_hex())
    }
}

impl FromStr for BritWalletId {
    type Err = BritError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl From<BritWalletId> for String {
    fn from(id: BritWalletId) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for BritWalletId {
    type Error = BritError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_hex(&s)
    }
}
